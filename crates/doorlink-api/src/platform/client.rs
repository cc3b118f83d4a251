// Eliona platform REST client
//
// Base path: the configured API endpoint (e.g. `http://api-v2:3000/v2`)
// Auth: X-API-Key header

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::models::{AssetRecord, DataRecord, DataSubtype, NewAsset};
use crate::error::Error;
use crate::transport::TransportConfig;
use crate::websocket::{self, ReconnectConfig};

pub(crate) const API_KEY_HEADER: &str = "X-API-Key";
const LISTENER_CHANNEL_SIZE: usize = 256;

/// Async client for the Eliona platform API.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from the API endpoint and token.
    ///
    /// Injects `X-API-Key` as a default header on every request.
    pub fn from_api_key(
        base_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid API key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            api_key: api_key.clone(),
        })
    }

    /// The normalized API base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Assets ───────────────────────────────────────────────────────

    /// Create or update an asset.
    ///
    /// `PUT /assets`
    pub async fn upsert_asset(&self, asset: &NewAsset) -> Result<AssetRecord, Error> {
        debug!(gai = %asset.global_asset_identifier, project = %asset.project_id, "upserting asset");
        self.put("assets", asset).await
    }

    /// Check whether an asset still exists.
    ///
    /// `GET /assets/{id}`: 404 means gone, anything else non-2xx is an error.
    pub async fn asset_exists(&self, asset_id: i32) -> Result<bool, Error> {
        let url = self.url(&format!("assets/{asset_id}"))?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(parse_error(status, resp).await)
        }
    }

    // ── Data ─────────────────────────────────────────────────────────

    /// Upsert the heap record of an asset for one subtype.
    ///
    /// `PUT /data`
    pub async fn upsert_data(&self, record: &DataRecord) -> Result<(), Error> {
        let url = self.url("data")?;
        debug!(asset_id = record.asset_id, subtype = record.subtype.as_str(), "PUT {url}");

        let resp = self.http.put(url).json(record).send().await?;
        handle_empty(resp).await
    }

    /// Read the latest heap record of an asset for one subtype.
    ///
    /// `GET /data?assetId={id}&dataSubtype={subtype}`
    pub async fn latest_data(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
    ) -> Result<Option<DataRecord>, Error> {
        let url = self.url("data")?;
        debug!(asset_id, subtype = subtype.as_str(), "GET {url}");

        let resp = self
            .http
            .get(url)
            .query(&[
                ("assetId", asset_id.to_string()),
                ("dataSubtype", subtype.as_str().to_owned()),
            ])
            .send()
            .await?;
        let records: Vec<DataRecord> = handle_response(resp).await?;
        Ok(records.into_iter().next())
    }

    // ── Data listener ────────────────────────────────────────────────

    /// WebSocket URL of the data listener for one subtype.
    pub fn data_listener_url(&self, subtype: DataSubtype) -> Result<Url, Error> {
        let mut url = self.url("data-listener")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| Error::WebSocketConnect(format!(
            "cannot derive WebSocket URL from {}",
            self.base_url
        )))?;
        url.query_pairs_mut()
            .append_pair("dataSubtype", subtype.as_str());
        Ok(url)
    }

    /// Stream data records of one subtype.
    ///
    /// Spawns the listener loop and returns the receiving end of its
    /// channel. The loop reconnects with a fixed delay until `cancel` fires
    /// or the receiver is dropped.
    pub fn listen(
        &self,
        subtype: DataSubtype,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DataRecord>, Error> {
        let url = self.data_listener_url(subtype)?;
        let (tx, rx) = mpsc::channel(LISTENER_CHANNEL_SIZE);
        websocket::spawn_data_listener(url, self.api_key.clone(), reconnect, cancel, tx);
        Ok(rx)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        handle_response(resp).await
    }
}

/// Make sure the base URL ends with `/` so relative joins keep the path.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, body))
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Error::Authentication {
            message: format!("platform rejected the API key (HTTP {status})"),
        };
    }

    let raw = resp.text().await.unwrap_or_default();
    Error::Http {
        status: status.as_u16(),
        message: if raw.is_empty() {
            status.to_string()
        } else {
            raw.chars().take(200).collect()
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> PlatformClient {
        let key: SecretString = "token".to_string().into();
        PlatformClient::from_api_key(base, &key, &TransportConfig::default()).unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let c = client("http://api-v2:3000/v2");
        assert_eq!(c.base_url().as_str(), "http://api-v2:3000/v2/");
        assert_eq!(
            c.url("assets/5").unwrap().as_str(),
            "http://api-v2:3000/v2/assets/5"
        );
    }

    #[test]
    fn listener_url_switches_scheme() {
        let c = client("https://eliona.example.com/api/v2/");
        let url = c.data_listener_url(DataSubtype::Output).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://eliona.example.com/api/v2/data-listener?dataSubtype=output"
        );

        let plain = client("http://localhost:3000/v2");
        assert!(
            plain
                .data_listener_url(DataSubtype::Output)
                .unwrap()
                .as_str()
                .starts_with("ws://localhost:3000/v2/")
        );
    }
}

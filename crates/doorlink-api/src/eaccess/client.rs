// eAccess JSON-RPC HTTP client
//
// Wraps `reqwest::Client` with the vendor's request envelope, HTTP Basic
// auth, the mandatory `Referer` header and result unwrapping. Method
// wrappers live in `methods.rs` as inherent methods to keep this module
// focused on transport mechanics.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const JSONRPC_VERSION: &str = "2.0";
/// The controller ignores the id, every call uses the same one.
const REQUEST_ID: &str = "m";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Raw HTTP client for one eAccess server.
///
/// Stateless: every call is an independent `POST {base}/rpc`. The
/// `result` member of the response is deserialized into the caller's type,
/// a JSON-RPC `error` member becomes [`Error::Rpc`].
#[derive(Clone)]
pub struct EAccessClient {
    http: reqwest::Client,
    rpc_url: Url,
    referer: String,
    username: String,
    password: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for EAccessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EAccessClient")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl EAccessClient {
    /// Create a client for the eAccess server at `base_url`.
    ///
    /// `base_url` is the server root as configured by the tenant, e.g.
    /// `https://eaccess.example.com:8443`. It is also sent verbatim as the
    /// `Referer` header, which the server requires.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url, username, password, transport.timeout)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        username: &str,
        password: &SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let root = base_url.trim_end_matches('/');
        let rpc_url = Url::parse(&format!("{root}/rpc"))?;
        Ok(Self {
            http,
            rpc_url,
            referer: base_url.to_owned(),
            username: username.to_owned(),
            password: password.clone(),
            timeout,
        })
    }

    /// The JSON-RPC endpoint this client posts to.
    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one JSON-RPC call and deserialize its `result`.
    ///
    /// A missing or `null` result is handed to the deserializer as `null`,
    /// so callers asking for an `Option<T>` get `None` instead of an error.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[Value],
    ) -> Result<T, Error> {
        debug!(method, url = %self.rpc_url, "JSON-RPC call");

        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: REQUEST_ID,
            method,
            params,
        };

        let resp = self
            .http
            .post(self.rpc_url.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(reqwest::header::REFERER, &self.referer)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let result = self.parse_envelope(resp).await?;
        trace!(method, %result, "JSON-RPC result");

        serde_json::from_value(result).map_err(|e| Error::Protocol {
            method: method.to_owned(),
            message: e.to_string(),
        })
    }

    /// Check the HTTP status, then unwrap the `{result, error}` envelope.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "eAccess rejected the configured credentials".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let envelope: RpcResponse =
            serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, body.clone()))?;

        match envelope.error {
            Some(err) => Err(Error::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(envelope.result),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

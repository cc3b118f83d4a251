//! Platform data-listener stream with auto-reconnect.
//!
//! Connects to the platform's `data-listener` WebSocket and forwards every
//! parsed [`DataRecord`] into a bounded [`tokio::sync::mpsc`] channel. A
//! dropped connection is retried after a fixed delay, for as long as the
//! consumer holds the receiver and the cancellation token is live.
//!
//! # Example
//!
//! ```rust,ignore
//! use doorlink_api::{DataSubtype, PlatformClient, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut rx = client.listen(DataSubtype::Output, ReconnectConfig::default(), cancel.clone())?;
//!
//! while let Some(record) = rx.recv().await {
//!     println!("asset {}: {:?}", record.asset_id, record.data);
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::platform::client::API_KEY_HEADER;
use crate::platform::models::DataRecord;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy for the data listener.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause between a dropped connection and the next attempt. Default: 50ms.
    pub delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(50),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Retry forever with the given delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_retries: None,
        }
    }
}

/// Spawn the listener loop on the current runtime.
pub(crate) fn spawn_data_listener(
    url: Url,
    api_key: SecretString,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<DataRecord>,
) {
    tokio::spawn(async move {
        listen_loop(url, api_key, reconnect, cancel, tx).await;
    });
}

// ── Background reconnection loop ─────────────────────────────────────

/// connect → read → on drop, wait `delay` → reconnect.
async fn listen_loop(
    url: Url,
    api_key: SecretString,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<DataRecord>,
) {
    let mut attempt: u32 = 0;

    loop {
        if tx.is_closed() {
            tracing::debug!("data listener receiver dropped");
            break;
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &api_key, &tx, &cancel) => result,
        };

        match result {
            Ok(()) => {
                tracing::info!("data listener disconnected, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "data listener error");
                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(max_retries = max, "data listener retry limit reached, giving up");
                        break;
                    }
                }
                attempt = attempt.saturating_add(1);
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect.delay) => {}
        }
    }

    tracing::debug!("data listener loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and forward frames until it drops.
async fn connect_and_read(
    url: &Url,
    api_key: &SecretString,
    tx: &mpsc::Sender<DataRecord>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to data listener");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri)
        .with_header(API_KEY_HEADER, api_key.expose_secret());

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("data listener connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            () = tx.closed() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        for record in parse_frame(&text) {
                            if tx.send(record).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "data listener closed by server");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => return Ok(()),
                    // Ping is answered by tungstenite; Binary and Pong carry nothing for us
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse one text frame: either a single data record or an array of them.
///
/// Malformed frames are logged and skipped.
fn parse_frame(text: &str) -> Vec<DataRecord> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "unparsable data listener frame");
            return Vec::new();
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<DataRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed data record");
                None
            }
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────

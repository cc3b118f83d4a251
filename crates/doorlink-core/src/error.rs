// ── Core error types ──
//
// Domain errors from doorlink-core. Callers never see JSON-RPC envelopes
// or HTTP status codes directly: the `From<doorlink_api::Error>` impl
// translates transport-layer failures into these variants.

use thiserror::Error;

/// Failures of the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The backing store failed (connection lost, constraint, I/O).
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Remote errors ────────────────────────────────────────────────
    /// The door controller answered, but not with what we asked for.
    #[error("Vendor protocol error: {message}")]
    Protocol { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Local errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration {config_id} not found")]
    ConfigurationNotFound { config_id: i64 },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the failure came from an unreachable or slow remote.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<doorlink_api::Error> for CoreError {
    fn from(err: doorlink_api::Error) -> Self {
        use doorlink_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::Rpc { code, message } => CoreError::Protocol {
                message: format!("JSON-RPC error {code}: {message}"),
            },
            Api::Protocol { method, message } => CoreError::Protocol {
                message: format!("{method}: {message}"),
            },
            Api::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            Api::Deserialization { message, body: _ } => CoreError::Api {
                message,
                status: None,
            },
        }
    }
}

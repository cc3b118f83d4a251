//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use doorlink_config::ConfigError;
use doorlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(doorlink::connection_failed),
        help("Check that the endpoint is running and reachable from this host.")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(code(doorlink::timeout))]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(doorlink::auth_failed),
        help("Verify the platform API token and the eAccess credentials.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for {target}")]
    #[diagnostic(
        code(doorlink::no_credentials),
        help(
            "Set API_TOKEN or [platform] api_token_env for the platform,\n\
             password or password_env for an eAccess configuration,\n\
             or store the secret in the system keyring under service 'doorlink'."
        )
    )]
    NoCredentials { target: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(doorlink::api_error))]
    ApiError { code: String, message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(doorlink::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Store error: {message}")]
    #[diagnostic(code(doorlink::store))]
    Store { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(doorlink::validation),
        help("Fix the field in the configuration file or its DOORLINK_ override.")
    )]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(doorlink::config))]
    Config(Box<figment::Error>),

    #[error("Could not render configuration: {message}")]
    #[diagnostic(code(doorlink::render))]
    Render { message: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Protocol { message } => CliError::ApiError {
                code: "protocol".into(),
                message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map(|s| s.to_string()).unwrap_or_default(),
                message,
            },

            CoreError::Store(e) => CliError::Store {
                message: e.to_string(),
            },

            CoreError::ConfigurationNotFound { config_id } => CliError::NotFound {
                resource_type: "configuration".into(),
                identifier: config_id.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { target } => CliError::NoCredentials { target },
            ConfigError::Serialization(e) => CliError::Render {
                message: e.to_string(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
        }
    }
}

impl From<doorlink_api::Error> for CliError {
    fn from(err: doorlink_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

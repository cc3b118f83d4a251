//! Configuration for the doorlink service.
//!
//! Layered loading (built-in defaults, TOML file, environment), credential
//! resolution (env, keyring, plaintext) and translation into the runtime
//! types of `doorlink-core` and `doorlink-api`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doorlink_api::{ReconnectConfig, TlsMode, TransportConfig};
use doorlink_core::model::MAX_OPENABLE_DURATION_SECS;
use doorlink_core::{Configuration, ServiceConfig};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "doorlink";
/// Keyring entry holding the platform API token.
pub const KEYRING_TOKEN_ENTRY: &str = "api-token";
/// Prefix of the layered environment variables (`DOORLINK_PLATFORM__API_TOKEN`).
pub const ENV_PREFIX: &str = "DOORLINK_";
/// Platform endpoint variable set by the platform's app runtime.
pub const LEGACY_ENDPOINT_ENV: &str = "API_ENDPOINT";
/// Platform token variable set by the platform's app runtime.
pub const LEGACY_TOKEN_ENV: &str = "API_TOKEN";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for {target}")]
    NoCredentials { target: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub eaccess: EAccessSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub listener: ListenerSettings,

    /// eAccess tenants seeded into the store at startup.
    #[serde(default)]
    pub configurations: Vec<TenantSettings>,
}

/// Connection to the platform REST and WebSocket API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformSettings {
    /// Base URL of the API, e.g. "https://eliona.example/api/v2".
    pub api_endpoint: Option<String>,

    /// API token (plaintext, prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_platform_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            api_token: None,
            api_token_env: None,
            timeout: default_platform_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

/// TLS settings shared by every eAccess connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EAccessSettings {
    /// Accept self-signed certificates. Door controllers usually ship one.
    #[serde(default = "default_true")]
    pub insecure: bool,

    pub ca_cert: Option<PathBuf>,
}

impl Default for EAccessSettings {
    fn default() -> Self {
        Self {
            insecure: true,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Seconds between configuration reloads.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerSettings {
    /// Consume the platform event stream and actuate doors.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// One eAccess tenant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenantSettings {
    pub id: i64,

    /// Server root, e.g. "https://eaccess.local:8443". Calls go to `{url}/rpc`.
    pub url: String,

    pub username: String,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between reconciliation runs.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Per-call eAccess timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Seconds a door stays open when the access point has no override.
    /// At most one day.
    #[serde(default = "default_openable_duration")]
    pub default_openable_duration: u64,

    #[serde(default)]
    pub project_ids: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_platform_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    1
}
fn default_reconnect_delay_ms() -> u64 {
    50
}
fn default_refresh_interval() -> u64 {
    doorlink_core::model::DEFAULT_REFRESH_INTERVAL_SECS
}
fn default_request_timeout() -> u64 {
    doorlink_core::model::DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_openable_duration() -> u64 {
    doorlink_core::model::DEFAULT_OPENABLE_DURATION_SECS
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "doorlink", "doorlink").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("doorlink");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered provider stack: defaults, TOML file, legacy variables,
/// then `DOORLINK_` variables with `__` as the nesting separator.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::raw()
                .only(&[LEGACY_ENDPOINT_ENV])
                .map(|_| "platform.api_endpoint".into()),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the configuration from `path` (or the default location) and the
/// environment. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    Ok(config)
}

// ── Validation ──────────────────────────────────────────────────────

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value).map_err(|e| invalid(field, format!("{e}: {value}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(field, format!("expected http or https, got '{other}'"))),
    }
}

fn check_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(())
}

impl Config {
    /// Check every field that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self
            .platform
            .api_endpoint
            .as_deref()
            .ok_or_else(|| invalid("platform.api_endpoint", "missing"))?;
        check_http_url("platform.api_endpoint", endpoint)?;
        check_positive("platform.timeout", self.platform.timeout)?;
        check_positive("scheduler.poll_interval", self.scheduler.poll_interval)?;

        let mut seen = HashSet::new();
        for (i, tenant) in self.configurations.iter().enumerate() {
            let field = |name: &str| format!("configurations[{i}].{name}");

            if tenant.id <= 0 {
                return Err(invalid(field("id"), "must be a positive integer"));
            }
            if !seen.insert(tenant.id) {
                return Err(invalid(field("id"), format!("duplicate id {}", tenant.id)));
            }
            check_http_url(&field("url"), &tenant.url)?;
            if tenant.username.trim().is_empty() {
                return Err(invalid(field("username"), "must not be empty"));
            }
            check_positive(&field("refresh_interval"), tenant.refresh_interval)?;
            check_positive(&field("request_timeout"), tenant.request_timeout)?;
            if tenant.default_openable_duration > MAX_OPENABLE_DURATION_SECS {
                return Err(invalid(
                    field("default_openable_duration"),
                    format!("must be at most {MAX_OPENABLE_DURATION_SECS} seconds"),
                ));
            }
            if tenant.project_ids.iter().any(|p| p.trim().is_empty()) {
                return Err(invalid(field("project_ids"), "contains an empty project id"));
            }
        }
        Ok(())
    }

    /// Validate, resolve credentials and build the runtime settings.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        self.validate()?;

        let configurations = self
            .configurations
            .iter()
            .map(tenant_to_configuration)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            platform_url: self.platform.api_endpoint.clone().unwrap_or_default(),
            api_token: resolve_api_token(&self.platform)?,
            platform_transport: TransportConfig {
                tls: tls_mode(self.platform.insecure, self.platform.ca_cert.as_ref()),
                timeout: Duration::from_secs(self.platform.timeout),
            },
            eaccess_tls: tls_mode(self.eaccess.insecure, self.eaccess.ca_cert.as_ref()),
            reconnect: ReconnectConfig::fixed(Duration::from_millis(
                self.listener.reconnect_delay_ms,
            )),
            service: ServiceConfig {
                poll_interval: Duration::from_secs(self.scheduler.poll_interval),
                listen_events: self.listener.enabled,
            },
            configurations,
        })
    }

    /// A copy with every plaintext secret masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.platform.api_token.is_some() {
            config.platform.api_token = Some(REDACTED.into());
        }
        for tenant in &mut config.configurations {
            if tenant.password.is_some() {
                tenant.password = Some(REDACTED.into());
            }
        }
        config
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn tls_mode(insecure: bool, ca_cert: Option<&PathBuf>) -> TlsMode {
    if insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(path) = ca_cert {
        TlsMode::CustomCa(path.clone())
    } else {
        TlsMode::System
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the platform API token.
///
/// Order: the variable named by `api_token_env`, `API_TOKEN`, the system
/// keyring, the plaintext `api_token`.
pub fn resolve_api_token(platform: &PlatformSettings) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = platform.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Platform runtime variable
    if let Ok(val) = std::env::var(LEGACY_TOKEN_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Some(secret) = keyring_secret(KEYRING_TOKEN_ENTRY) {
        return Ok(secret);
    }

    // 4. Plaintext in config
    if let Some(ref token) = platform.api_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        target: "the platform API".into(),
    })
}

/// Resolve a tenant password: `password_env`, keyring entry
/// `config/{id}/password`, plaintext `password`.
pub fn resolve_password(tenant: &TenantSettings) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = tenant.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(secret) = keyring_secret(&format!("config/{}/password", tenant.id)) {
        return Ok(secret);
    }

    if let Some(ref pw) = tenant.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        target: format!("configuration {}", tenant.id),
    })
}

fn keyring_secret(entry: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, entry).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the store record of a tenant, resolving its password.
pub fn tenant_to_configuration(tenant: &TenantSettings) -> Result<Configuration, ConfigError> {
    let password = resolve_password(tenant)?;
    let mut config = Configuration::new(tenant.url.clone(), tenant.username.clone(), password);
    config.id = tenant.id;
    config.enabled = tenant.enabled;
    config.refresh_interval_secs = tenant.refresh_interval;
    config.request_timeout_secs = tenant.request_timeout;
    config.default_openable_duration_secs = tenant.default_openable_duration;
    config.project_ids.clone_from(&tenant.project_ids);
    Ok(config)
}

/// Everything the binary needs to wire the service.
#[derive(Debug)]
pub struct Settings {
    pub platform_url: String,
    pub api_token: SecretString,
    pub platform_transport: TransportConfig,
    pub eaccess_tls: TlsMode,
    pub reconnect: ReconnectConfig,
    pub service: ServiceConfig,
    pub configurations: Vec<Configuration>,
}

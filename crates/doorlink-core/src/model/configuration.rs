use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OPENABLE_DURATION_SECS: u64 = 30;
/// Longest open window a door is ever held for (one day).
pub const MAX_OPENABLE_DURATION_SECS: u64 = 86_400;

/// One tenant connection to an eAccess server.
///
/// `active` is a runtime flag owned by the scheduler, `initialized` records
/// whether the openable-duration property was provisioned on the server.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub id: i64,
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub enabled: bool,
    pub active: bool,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub default_openable_duration_secs: u64,
    pub project_ids: Vec<String>,
    pub initialized: bool,
}

impl Configuration {
    /// An enabled, inactive, uninitialized configuration with default timings.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            id: 0,
            url: url.into(),
            username: username.into(),
            password,
            enabled: true,
            active: false,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_openable_duration_secs: DEFAULT_OPENABLE_DURATION_SECS,
            project_ids: Vec::new(),
            initialized: false,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Door controller seam ──
//
// The reconciler and the actuator talk to eAccess through `Vendor`, and
// obtain one per configuration from a `VendorConnector`. The production
// connector keeps one `EAccessClient` per configuration and rebuilds it
// when the URL, credentials or request timeout change.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};

use doorlink_api::{DeviceEntry, DeviceStatus, EAccessClient, Location, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::model::Configuration;

/// Operations the engine needs from one eAccess server.
#[async_trait]
pub trait Vendor: Send + Sync {
    async fn devices(&self) -> Result<Vec<DeviceEntry>, CoreError>;

    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, CoreError>;

    async fn location(&self, access_point_id: &str) -> Result<Location, CoreError>;

    /// Raw per-location duration override, `None` when unset.
    async fn openable_duration(&self, location_id: &str) -> Result<Option<String>, CoreError>;

    async fn init_openable_duration(&self) -> Result<bool, CoreError>;

    /// Open for `duration_secs`; zero forces the door closed.
    async fn open(&self, location_id: &str, duration_secs: u64) -> Result<bool, CoreError>;
}

/// Builds a [`Vendor`] for a configuration.
pub trait VendorConnector: Send + Sync {
    fn connect(&self, config: &Configuration) -> Result<Arc<dyn Vendor>, CoreError>;
}

#[async_trait]
impl Vendor for EAccessClient {
    async fn devices(&self) -> Result<Vec<DeviceEntry>, CoreError> {
        Ok(self.list_devices().await?)
    }

    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, CoreError> {
        Ok(EAccessClient::device_status(self, device_id).await?)
    }

    async fn location(&self, access_point_id: &str) -> Result<Location, CoreError> {
        Ok(EAccessClient::location(self, access_point_id).await?)
    }

    async fn openable_duration(&self, location_id: &str) -> Result<Option<String>, CoreError> {
        Ok(EAccessClient::openable_duration(self, location_id).await?)
    }

    async fn init_openable_duration(&self) -> Result<bool, CoreError> {
        Ok(EAccessClient::init_openable_duration(self).await?)
    }

    async fn open(&self, location_id: &str, duration_secs: u64) -> Result<bool, CoreError> {
        Ok(self.open_access_point(location_id, duration_secs).await?)
    }
}

/// Connector producing [`EAccessClient`]s, cached per configuration id.
#[derive(Clone, Default)]
pub struct EAccessConnector {
    tls: TlsMode,
    clients: Arc<DashMap<i64, CachedClient>>,
}

/// A built client plus the settings it was built from.
struct CachedClient {
    url: String,
    username: String,
    password: SecretString,
    timeout_secs: u64,
    client: Arc<EAccessClient>,
}

impl CachedClient {
    fn built_for(&self, config: &Configuration) -> bool {
        self.url == config.url
            && self.username == config.username
            && self.password.expose_secret() == config.password.expose_secret()
            && self.timeout_secs == config.request_timeout_secs
    }
}

impl EAccessConnector {
    pub fn new(tls: TlsMode) -> Self {
        Self {
            tls,
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Number of cached clients.
    pub fn cached(&self) -> usize {
        self.clients.len()
    }
}

impl VendorConnector for EAccessConnector {
    fn connect(&self, config: &Configuration) -> Result<Arc<dyn Vendor>, CoreError> {
        if let Some(cached) = self.clients.get(&config.id) {
            if cached.built_for(config) {
                return Ok(Arc::clone(&cached.client) as Arc<dyn Vendor>);
            }
        }

        let transport = TransportConfig {
            tls: self.tls.clone(),
            timeout: config.request_timeout(),
        };
        let client = Arc::new(EAccessClient::new(
            &config.url,
            &config.username,
            &config.password,
            &transport,
        )?);
        self.clients.insert(
            config.id,
            CachedClient {
                url: config.url.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
                timeout_secs: config.request_timeout_secs,
                client: Arc::clone(&client),
            },
        );
        Ok(client)
    }
}

// ── Platform seam ──
//
// Asset creation, existence checks, telemetry and the attribute event
// stream, as the engine sees them. `ElionaPlatform` adapts the REST and
// WebSocket client from doorlink-api.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use doorlink_api::{DataRecord, DataSubtype, NewAsset, PlatformClient, ReconnectConfig};

use crate::error::CoreError;

/// Asset type of every door asset created on the platform.
pub const ASSET_TYPE: &str = "glutz_device";

/// An attribute change pushed by the platform.
pub type AttributeEvent = DataRecord;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Create (or update) the asset for a device, returning its id.
    async fn create_asset(
        &self,
        project_id: &str,
        global_asset_id: &str,
        name: &str,
    ) -> Result<i32, CoreError>;

    async fn asset_exists(&self, asset_id: i32) -> Result<bool, CoreError>;

    async fn upsert_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
        payload: Map<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Most recent attribute values of one subtype, if any were recorded.
    async fn latest_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
    ) -> Result<Option<Map<String, Value>>, CoreError>;

    /// Stream `output` attribute changes until `cancel` fires.
    fn subscribe_events(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<AttributeEvent>, CoreError>;
}

/// [`Platform`] backed by the Eliona API.
#[derive(Debug, Clone)]
pub struct ElionaPlatform {
    client: PlatformClient,
    reconnect: ReconnectConfig,
}

impl ElionaPlatform {
    pub fn new(client: PlatformClient, reconnect: ReconnectConfig) -> Self {
        Self { client, reconnect }
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }
}

#[async_trait]
impl Platform for ElionaPlatform {
    async fn create_asset(
        &self,
        project_id: &str,
        global_asset_id: &str,
        name: &str,
    ) -> Result<i32, CoreError> {
        let asset = NewAsset {
            project_id: project_id.to_owned(),
            global_asset_identifier: global_asset_id.to_owned(),
            name: name.to_owned(),
            asset_type: ASSET_TYPE.to_owned(),
            description: Some(name.to_owned()),
        };
        Ok(self.client.upsert_asset(&asset).await?.id)
    }

    async fn asset_exists(&self, asset_id: i32) -> Result<bool, CoreError> {
        Ok(self.client.asset_exists(asset_id).await?)
    }

    async fn upsert_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
        payload: Map<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let record = DataRecord {
            asset_id,
            subtype,
            timestamp: Some(timestamp),
            data: payload,
        };
        Ok(self.client.upsert_data(&record).await?)
    }

    async fn latest_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
    ) -> Result<Option<Map<String, Value>>, CoreError> {
        let record = self.client.latest_data(asset_id, subtype).await?;
        Ok(record.map(|r| r.data))
    }

    fn subscribe_events(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<AttributeEvent>, CoreError> {
        Ok(self
            .client
            .listen(DataSubtype::Output, self.reconnect.clone(), cancel)?)
    }
}

// ── Persistence seam ──
//
// Configuration records and device mappings live behind `MappingStore`.
// The reconciler and the door actuator share one store; the only
// guarantee the core relies on is that mapping inserts are unique per
// `(config_id, project_id, device_id)`.

mod memory;

use async_trait::async_trait;

pub use memory::InMemoryStore;

use crate::error::StoreError;
use crate::model::{Configuration, DeviceMapping};

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository for configurations and device mappings.
#[async_trait]
pub trait MappingStore: Send + Sync {
    // ── Configurations ───────────────────────────────────────────────

    /// All configurations, ordered by id.
    async fn list_configs(&self) -> StoreResult<Vec<Configuration>>;

    async fn get_config(&self, config_id: i64) -> StoreResult<Option<Configuration>>;

    /// Insert a configuration, assigning a fresh id. The input id is ignored.
    async fn insert_config(&self, config: Configuration) -> StoreResult<Configuration>;

    /// Insert or replace the configuration with `config.id`.
    async fn upsert_config(&self, config: Configuration) -> StoreResult<Configuration>;

    /// Remove a configuration and its mappings.
    async fn delete_config(&self, config_id: i64) -> StoreResult<()>;

    async fn set_active(&self, config_id: i64, active: bool) -> StoreResult<()>;

    /// Record that the openable-duration property is provisioned.
    async fn set_initialized(&self, config_id: i64) -> StoreResult<()>;

    /// Mark every configuration inactive.
    async fn set_all_inactive(&self) -> StoreResult<()>;

    // ── Device mappings ──────────────────────────────────────────────

    async fn get_mapping(
        &self,
        config_id: i64,
        project_id: &str,
        device_id: &str,
    ) -> StoreResult<Option<DeviceMapping>>;

    /// The mapping pointing at a platform asset, if any.
    async fn mapping_by_asset(&self, asset_id: i32) -> StoreResult<Option<DeviceMapping>>;

    /// Mappings of one configuration, or of all when `config_id` is `None`.
    async fn list_mappings(&self, config_id: Option<i64>) -> StoreResult<Vec<DeviceMapping>>;

    /// Persist a new mapping. Fails with [`StoreError::Duplicate`] when the
    /// key is already taken.
    async fn insert_mapping(&self, mapping: DeviceMapping) -> StoreResult<()>;
}

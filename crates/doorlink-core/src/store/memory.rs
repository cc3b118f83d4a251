use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MappingStore, StoreResult};
use crate::error::StoreError;
use crate::model::{Configuration, DeviceMapping, MappingKey};

#[derive(Default)]
struct Tables {
    configs: BTreeMap<i64, Configuration>,
    mappings: HashMap<MappingKey, DeviceMapping>,
}

/// In-memory implementation of [`MappingStore`].
///
/// Holds configurations in id order and mappings keyed uniquely, so
/// concurrent duplicate inserts are rejected the same way a unique
/// index would reject them.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn config_not_found(config_id: i64) -> StoreError {
    StoreError::NotFound {
        entity: "configuration",
        key: config_id.to_string(),
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn list_configs(&self) -> StoreResult<Vec<Configuration>> {
        let tables = self.tables.read().await;
        Ok(tables.configs.values().cloned().collect())
    }

    async fn get_config(&self, config_id: i64) -> StoreResult<Option<Configuration>> {
        let tables = self.tables.read().await;
        Ok(tables.configs.get(&config_id).cloned())
    }

    async fn insert_config(&self, mut config: Configuration) -> StoreResult<Configuration> {
        let mut tables = self.tables.write().await;
        config.id = tables.configs.keys().next_back().map_or(1, |last| last + 1);
        tables.configs.insert(config.id, config.clone());
        Ok(config)
    }

    async fn upsert_config(&self, config: Configuration) -> StoreResult<Configuration> {
        if config.id <= 0 {
            return Err(StoreError::Backend(format!(
                "cannot upsert configuration with id {}",
                config.id
            )));
        }
        let mut tables = self.tables.write().await;
        tables.configs.insert(config.id, config.clone());
        Ok(config)
    }

    async fn delete_config(&self, config_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .configs
            .remove(&config_id)
            .ok_or_else(|| config_not_found(config_id))?;
        tables.mappings.retain(|key, _| key.config_id != config_id);
        Ok(())
    }

    async fn set_active(&self, config_id: i64, active: bool) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let config = tables
            .configs
            .get_mut(&config_id)
            .ok_or_else(|| config_not_found(config_id))?;
        config.active = active;
        Ok(())
    }

    async fn set_initialized(&self, config_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let config = tables
            .configs
            .get_mut(&config_id)
            .ok_or_else(|| config_not_found(config_id))?;
        config.initialized = true;
        Ok(())
    }

    async fn set_all_inactive(&self) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for config in tables.configs.values_mut() {
            config.active = false;
        }
        Ok(())
    }

    async fn get_mapping(
        &self,
        config_id: i64,
        project_id: &str,
        device_id: &str,
    ) -> StoreResult<Option<DeviceMapping>> {
        let tables = self.tables.read().await;
        Ok(tables
            .mappings
            .get(&MappingKey::new(config_id, project_id, device_id))
            .cloned())
    }

    async fn mapping_by_asset(&self, asset_id: i32) -> StoreResult<Option<DeviceMapping>> {
        let tables = self.tables.read().await;
        Ok(tables
            .mappings
            .values()
            .find(|m| m.asset_id == asset_id)
            .cloned())
    }

    async fn list_mappings(&self, config_id: Option<i64>) -> StoreResult<Vec<DeviceMapping>> {
        let tables = self.tables.read().await;
        let mut mappings: Vec<DeviceMapping> = tables
            .mappings
            .values()
            .filter(|m| config_id.is_none_or(|id| m.config_id == id))
            .cloned()
            .collect();
        mappings.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(mappings)
    }

    async fn insert_mapping(&self, mapping: DeviceMapping) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = mapping.key();
        if tables.mappings.contains_key(&key) {
            return Err(StoreError::Duplicate {
                entity: "device mapping",
                key: key.to_string(),
            });
        }
        tables.mappings.insert(key, mapping);
        Ok(())
    }
}

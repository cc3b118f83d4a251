// Shared fakes for doorlink-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use doorlink_api::{DataSubtype, DeviceEntry, DeviceStatus, Location};
use doorlink_core::store::StoreResult;
use doorlink_core::{
    AttributeEvent, Configuration, CoreError, DeviceMapping, InMemoryStore, MappingStore,
    Platform, StoreError, Vendor, VendorConnector,
};

// ── Vendor ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct VendorState {
    pub devices: Vec<DeviceEntry>,
    pub failing_status: HashSet<String>,
    pub duration_override: Option<String>,
    pub open_ok: bool,
    pub open_errors: bool,
    pub close_ok: bool,
    pub init_ok: bool,
    pub inventory_calls: usize,
    pub init_calls: usize,
    /// Every `openAccessPoint` call as `(location, seconds)`.
    pub opens: Vec<(String, u64)>,
}

impl Default for VendorState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            failing_status: HashSet::new(),
            duration_override: None,
            open_ok: true,
            open_errors: false,
            close_ok: true,
            init_ok: true,
            inventory_calls: 0,
            init_calls: 0,
            opens: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeVendor {
    pub state: Mutex<VendorState>,
}

impl FakeVendor {
    pub fn with_devices(ids: &[&str]) -> Arc<Self> {
        let vendor = Self::default();
        vendor.state.lock().unwrap().devices = ids
            .iter()
            .map(|id| DeviceEntry {
                device_id: (*id).to_owned(),
                access_point_id: format!("AP-{id}"),
                device_type: Some(1),
                id: None,
                label: None,
            })
            .collect();
        Arc::new(vendor)
    }

    pub fn update(&self, f: impl FnOnce(&mut VendorState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn opens(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().opens.clone()
    }

    pub fn inventory_calls(&self) -> usize {
        self.state.lock().unwrap().inventory_calls
    }
}

fn protocol(message: &str) -> CoreError {
    CoreError::Protocol {
        message: message.to_owned(),
    }
}

#[async_trait]
impl Vendor for FakeVendor {
    async fn devices(&self) -> Result<Vec<DeviceEntry>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.inventory_calls += 1;
        Ok(state.devices.clone())
    }

    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, CoreError> {
        if self.state.lock().unwrap().failing_status.contains(device_id) {
            return Err(CoreError::Timeout { timeout_secs: 120 });
        }
        Ok(DeviceStatus {
            battery_level: 88.0,
            openings: 3,
            operating_mode: 1,
            firmware: "3.0.1".into(),
        })
    }

    async fn location(&self, access_point_id: &str) -> Result<Location, CoreError> {
        Ok(Location {
            building: "HQ".into(),
            room: "Floor 1".into(),
            access_point: format!("Door {access_point_id}"),
        })
    }

    async fn openable_duration(&self, _location_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.state.lock().unwrap().duration_override.clone())
    }

    async fn init_openable_duration(&self) -> Result<bool, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.init_calls += 1;
        Ok(state.init_ok)
    }

    async fn open(&self, location_id: &str, duration_secs: u64) -> Result<bool, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.opens.push((location_id.to_owned(), duration_secs));
        if duration_secs == 0 {
            return Ok(state.close_ok);
        }
        if state.open_errors {
            return Err(protocol("door offline"));
        }
        Ok(state.open_ok)
    }
}

/// Connector handing out the same fake for every configuration.
pub struct FakeConnector(pub Arc<FakeVendor>);

impl VendorConnector for FakeConnector {
    fn connect(&self, _config: &Configuration) -> Result<Arc<dyn Vendor>, CoreError> {
        Ok(Arc::clone(&self.0) as Arc<dyn Vendor>)
    }
}

// ── Platform ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PlatformState {
    pub next_asset_id: i32,
    pub assets: HashSet<i32>,
    /// `(project, global asset id, name)` per created asset.
    pub created: Vec<(String, String, String)>,
    pub telemetry: Vec<(i32, DataSubtype, Map<String, Value>)>,
    pub latest: HashMap<(i32, DataSubtype), Map<String, Value>>,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            next_asset_id: 100,
            assets: HashSet::new(),
            created: Vec::new(),
            telemetry: Vec::new(),
            latest: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    pub state: Mutex<PlatformState>,
    pub events: Mutex<Option<mpsc::Receiver<AttributeEvent>>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A platform whose event stream is fed by the returned sender.
    pub fn with_events() -> (Arc<Self>, mpsc::Sender<AttributeEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let platform = Self::default();
        *platform.events.lock().unwrap() = Some(rx);
        (Arc::new(platform), tx)
    }

    pub fn update(&self, f: impl FnOnce(&mut PlatformState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn add_asset(&self, asset_id: i32) {
        self.state.lock().unwrap().assets.insert(asset_id);
    }

    pub fn set_openable(&self, asset_id: i32, value: i64) {
        let mut data = Map::new();
        data.insert("openable".into(), json!(value));
        self.state
            .lock()
            .unwrap()
            .latest
            .insert((asset_id, DataSubtype::Input), data);
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    pub fn pushes(&self, subtype: DataSubtype) -> Vec<i32> {
        self.state
            .lock()
            .unwrap()
            .telemetry
            .iter()
            .filter(|(_, s, _)| *s == subtype)
            .map(|(id, _, _)| *id)
            .collect()
    }

    /// `openable` values pushed for an asset, in order.
    pub fn openable_history(&self, asset_id: i32) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .telemetry
            .iter()
            .filter(|(id, s, _)| *id == asset_id && *s == DataSubtype::Input)
            .filter_map(|(_, _, data)| data.get("openable").and_then(Value::as_i64))
            .collect()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_asset(
        &self,
        project_id: &str,
        global_asset_id: &str,
        name: &str,
    ) -> Result<i32, CoreError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_asset_id;
        state.next_asset_id += 1;
        state.assets.insert(id);
        state
            .created
            .push((project_id.to_owned(), global_asset_id.to_owned(), name.to_owned()));
        Ok(id)
    }

    async fn asset_exists(&self, asset_id: i32) -> Result<bool, CoreError> {
        Ok(self.state.lock().unwrap().assets.contains(&asset_id))
    }

    async fn upsert_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
        payload: Map<String, Value>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        state.telemetry.push((asset_id, subtype, payload.clone()));
        state.latest.insert((asset_id, subtype), payload);
        Ok(())
    }

    async fn latest_telemetry(
        &self,
        asset_id: i32,
        subtype: DataSubtype,
    ) -> Result<Option<Map<String, Value>>, CoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .latest
            .get(&(asset_id, subtype))
            .cloned())
    }

    fn subscribe_events(
        &self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<AttributeEvent>, CoreError> {
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| CoreError::Config {
                message: "event stream already taken".into(),
            })
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// In-memory store with injectable failures and races.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: InMemoryStore,
    /// `list_configs` calls left to fail.
    pub list_failures: AtomicUsize,
    /// Mapping written by "another writer" just before the next insert.
    pub racing_mapping: Mutex<Option<DeviceMapping>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_list_configs(&self, times: usize) {
        self.list_failures.store(times, Ordering::SeqCst);
    }

    pub fn race_next_insert(&self, mapping: DeviceMapping) {
        *self.racing_mapping.lock().unwrap() = Some(mapping);
    }
}

#[async_trait]
impl MappingStore for ScriptedStore {
    async fn list_configs(&self) -> StoreResult<Vec<Configuration>> {
        let failing = self
            .list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.list_configs().await
    }

    async fn get_config(&self, config_id: i64) -> StoreResult<Option<Configuration>> {
        self.inner.get_config(config_id).await
    }

    async fn insert_config(&self, config: Configuration) -> StoreResult<Configuration> {
        self.inner.insert_config(config).await
    }

    async fn upsert_config(&self, config: Configuration) -> StoreResult<Configuration> {
        self.inner.upsert_config(config).await
    }

    async fn delete_config(&self, config_id: i64) -> StoreResult<()> {
        self.inner.delete_config(config_id).await
    }

    async fn set_active(&self, config_id: i64, active: bool) -> StoreResult<()> {
        self.inner.set_active(config_id, active).await
    }

    async fn set_initialized(&self, config_id: i64) -> StoreResult<()> {
        self.inner.set_initialized(config_id).await
    }

    async fn set_all_inactive(&self) -> StoreResult<()> {
        self.inner.set_all_inactive().await
    }

    async fn get_mapping(
        &self,
        config_id: i64,
        project_id: &str,
        device_id: &str,
    ) -> StoreResult<Option<DeviceMapping>> {
        self.inner.get_mapping(config_id, project_id, device_id).await
    }

    async fn mapping_by_asset(&self, asset_id: i32) -> StoreResult<Option<DeviceMapping>> {
        self.inner.mapping_by_asset(asset_id).await
    }

    async fn list_mappings(&self, config_id: Option<i64>) -> StoreResult<Vec<DeviceMapping>> {
        self.inner.list_mappings(config_id).await
    }

    async fn insert_mapping(&self, mapping: DeviceMapping) -> StoreResult<()> {
        let racing = self.racing_mapping.lock().unwrap().take();
        if let Some(racing) = racing {
            self.inner.insert_mapping(racing).await?;
        }
        self.inner.insert_mapping(mapping).await
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn configuration(project_ids: &[&str]) -> Configuration {
    let mut config = Configuration::new("https://eaccess.test", "admin", "pw".to_string().into());
    config.project_ids = project_ids.iter().map(|p| (*p).to_owned()).collect();
    config
}

pub async fn store_with(config: Configuration) -> (Arc<InMemoryStore>, Configuration) {
    let store = Arc::new(InMemoryStore::new());
    let stored = store.insert_config(config).await.unwrap();
    (store, stored)
}

/// Store one configuration plus a mapping `device -> asset_id` at `AP-{device}`.
pub async fn mapped_door(
    default_duration: u64,
    device: &str,
    asset_id: i32,
) -> (Arc<InMemoryStore>, Configuration) {
    let mut config = configuration(&["1"]);
    config.default_openable_duration_secs = default_duration;
    let (store, config) = store_with(config).await;
    store
        .insert_mapping(DeviceMapping {
            config_id: config.id,
            project_id: "1".into(),
            device_id: device.into(),
            asset_id,
            location_id: format!("AP-{device}"),
        })
        .await
        .unwrap();
    (store, config)
}

pub fn open_event(asset_id: i32, value: f64) -> AttributeEvent {
    AttributeEvent {
        asset_id,
        subtype: DataSubtype::Output,
        timestamp: None,
        data: json!({ "open": value }).as_object().cloned().unwrap(),
    }
}

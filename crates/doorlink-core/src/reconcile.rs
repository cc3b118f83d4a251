// ── Reconciliation cycle ──
//
// One fetch-map-push pass for a single configuration: read the device
// inventory from eAccess, make sure every device has a platform asset in
// every target project, and push input/info telemetry for each.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use doorlink_api::DataSubtype;

use crate::convert::{info_payload, input_payload};
use crate::error::{CoreError, StoreError};
use crate::model::{Configuration, Device, DeviceMapping};
use crate::platform::Platform;
use crate::store::MappingStore;
use crate::vendor::{Vendor, VendorConnector};

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub config_id: i64,
    /// Devices in the inventory.
    pub devices: usize,
    /// Mappings created this cycle.
    pub mappings_created: usize,
    /// Mappings whose asset no longer exists on the platform.
    pub skipped_missing_asset: usize,
    /// Devices that received input + info telemetry.
    pub telemetry_pushed: usize,
    /// Whether the openable-duration property got provisioned this cycle.
    pub initialized_now: bool,
}

/// Runs reconciliation cycles against shared collaborators.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn MappingStore>,
    platform: Arc<dyn Platform>,
    connector: Arc<dyn VendorConnector>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn MappingStore>,
        platform: Arc<dyn Platform>,
        connector: Arc<dyn VendorConnector>,
    ) -> Self {
        Self {
            store,
            platform,
            connector,
        }
    }

    /// Run one cycle for `config`.
    ///
    /// Any vendor failure while collecting devices aborts the cycle before
    /// telemetry is pushed. A mapping whose asset disappeared is skipped
    /// and left in place.
    #[instrument(name = "reconcile", skip_all, fields(config_id = config.id))]
    pub async fn run_cycle(&self, config: &Configuration) -> Result<CycleReport, CoreError> {
        let vendor = self.connector.connect(config)?;
        let mut report = CycleReport {
            config_id: config.id,
            ..CycleReport::default()
        };

        let entries = vendor.devices().await?;
        report.devices = entries.len();
        debug!(devices = entries.len(), "fetched device inventory");

        if !config.initialized {
            report.initialized_now = self
                .provision_openable_duration(config, vendor.as_ref())
                .await?;
        }

        let devices = collect_devices(vendor.as_ref(), entries).await?;

        for project_id in &config.project_ids {
            for device in &devices {
                let resolved = self.resolve_mapping(config, project_id, device).await?;
                let Some((mapping, created)) = resolved else {
                    report.skipped_missing_asset += 1;
                    continue;
                };
                if created {
                    report.mappings_created += 1;
                }
                self.push_telemetry(&mapping, device).await?;
                report.telemetry_pushed += 1;
            }
        }

        info!(
            devices = report.devices,
            created = report.mappings_created,
            pushed = report.telemetry_pushed,
            skipped = report.skipped_missing_asset,
            "reconciliation cycle complete"
        );
        Ok(report)
    }

    async fn provision_openable_duration(
        &self,
        config: &Configuration,
        vendor: &dyn Vendor,
    ) -> Result<bool, CoreError> {
        if !vendor.init_openable_duration().await? {
            debug!("openable duration property not acknowledged, retrying next cycle");
            return Ok(false);
        }
        self.store.set_initialized(config.id).await?;
        info!("openable duration property provisioned");
        Ok(true)
    }

    /// Find or create the mapping for one device in one project.
    ///
    /// Returns `None` when the mapped asset is gone, and whether the
    /// mapping was created by this call otherwise.
    async fn resolve_mapping(
        &self,
        config: &Configuration,
        project_id: &str,
        device: &Device,
    ) -> Result<Option<(DeviceMapping, bool)>, CoreError> {
        if let Some(mapping) = self
            .store
            .get_mapping(config.id, project_id, &device.device_id)
            .await?
        {
            if self.platform.asset_exists(mapping.asset_id).await? {
                return Ok(Some((mapping, false)));
            }
            warn!(
                asset_id = mapping.asset_id,
                device_id = %device.device_id,
                project_id,
                "mapped asset no longer exists, skipping device"
            );
            return Ok(None);
        }

        let name = device.asset_name();
        let asset_id = self
            .platform
            .create_asset(project_id, &device.device_id, &name)
            .await?;
        debug!(asset_id, device_id = %device.device_id, %name, "created asset");

        let mapping = DeviceMapping {
            config_id: config.id,
            project_id: project_id.to_owned(),
            device_id: device.device_id.clone(),
            asset_id,
            location_id: device.access_point_id.clone(),
        };

        match self.store.insert_mapping(mapping.clone()).await {
            Ok(()) => Ok(Some((mapping, true))),
            Err(StoreError::Duplicate { .. }) => {
                debug!(device_id = %device.device_id, "mapping inserted concurrently, re-reading");
                let existing = self
                    .store
                    .get_mapping(config.id, project_id, &device.device_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "device mapping",
                        key: mapping.key().to_string(),
                    })?;
                Ok(Some((existing, false)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn push_telemetry(
        &self,
        mapping: &DeviceMapping,
        device: &Device,
    ) -> Result<(), CoreError> {
        let now = Utc::now();
        self.platform
            .upsert_telemetry(mapping.asset_id, DataSubtype::Input, input_payload(device), now)
            .await?;
        self.platform
            .upsert_telemetry(mapping.asset_id, DataSubtype::Info, info_payload(device), now)
            .await?;
        Ok(())
    }
}

/// Fetch status and location for every inventory entry, in order.
///
/// Fails fast: the first error aborts the whole batch.
async fn collect_devices(
    vendor: &dyn Vendor,
    entries: Vec<doorlink_api::DeviceEntry>,
) -> Result<Vec<Device>, CoreError> {
    let mut devices = Vec::with_capacity(entries.len());
    for entry in entries {
        let status = vendor.device_status(&entry.device_id).await?;
        let location = vendor.location(&entry.access_point_id).await?;
        devices.push(Device::from_vendor(entry, status, location));
    }
    Ok(devices)
}

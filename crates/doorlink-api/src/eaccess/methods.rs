// eAccess access point and device methods
//
// The subset of the eAccess model the sync engine needs: device inventory,
// device status, location path, the openable-duration property and the
// open command.

use serde_json::{Value, json};
use tracing::debug;

use super::client::EAccessClient;
use super::models::{DeviceEntry, DeviceStatus, Location};
use crate::error::Error;

/// Access point property holding a per-door open duration override in seconds.
pub const OPENABLE_DURATION_PROPERTY: &str = "/Properties/Eliona/Openable Duration [s]";

const GET_MODEL: &str = "eAccess.getModel";
const GET_ACCESS_POINT_PROPERTY: &str = "eAccess.getAccessPointProperty";
const SET_ACCESS_POINT_PROPERTY: &str = "eAccess.setAccessPointProperty";
const OPEN_ACCESS_POINT: &str = "eAccess.openAccessPoint";

/// Format seconds as the zero-padded `HH:MM:SS` the open command expects.
///
/// Hours are not wrapped at 24.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

impl EAccessClient {
    /// List all devices known to the server.
    ///
    /// `eAccess.getModel("Devices")`
    pub async fn list_devices(&self) -> Result<Vec<DeviceEntry>, Error> {
        debug!("listing devices");
        self.call(GET_MODEL, &[json!("Devices")]).await
    }

    /// Fetch the status of one device.
    ///
    /// `eAccess.getModel("DeviceStatus", {"deviceid": ..})`. The server
    /// answers with a list; only the first entry is meaningful.
    pub async fn device_status(&self, device_id: &str) -> Result<DeviceStatus, Error> {
        debug!(device_id, "fetching device status");
        let statuses: Vec<DeviceStatus> = self
            .call(
                GET_MODEL,
                &[json!("DeviceStatus"), json!({ "deviceid": device_id })],
            )
            .await?;
        statuses.into_iter().next().ok_or_else(|| Error::Protocol {
            method: GET_MODEL.into(),
            message: format!("empty status list for device {device_id}"),
        })
    }

    /// Resolve the location path of an access point.
    ///
    /// `eAccess.getAccessPointProperty("location", accessPointId)`
    pub async fn location(&self, access_point_id: &str) -> Result<Location, Error> {
        debug!(access_point_id, "fetching access point location");
        let path: Vec<String> = self
            .call(
                GET_ACCESS_POINT_PROPERTY,
                &[json!("location"), json!(access_point_id)],
            )
            .await?;
        Location::from_path(path)
    }

    /// Read the openable-duration override of an access point.
    ///
    /// Returns `None` when the property is unset (empty string or `null`).
    /// The raw string is returned untouched, parsing is up to the caller.
    pub async fn openable_duration(&self, location_id: &str) -> Result<Option<String>, Error> {
        debug!(location_id, "reading openable duration property");
        let value: Option<String> = self
            .call(
                GET_ACCESS_POINT_PROPERTY,
                &[json!(OPENABLE_DURATION_PROPERTY), json!(location_id)],
            )
            .await?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    /// Provision the openable-duration property on the server.
    ///
    /// `eAccess.setAccessPointProperty(property, "", "0")`. Returns the
    /// server's boolean acknowledgement. Safe to repeat.
    pub async fn init_openable_duration(&self) -> Result<bool, Error> {
        debug!("provisioning openable duration property");
        self.call(
            SET_ACCESS_POINT_PROPERTY,
            &[json!(OPENABLE_DURATION_PROPERTY), json!(""), json!("0")],
        )
        .await
    }

    /// Open an access point for `duration_secs` seconds.
    ///
    /// `eAccess.openAccessPoint(locationId, {"Duration": "HH:MM:SS"})`.
    /// A zero duration forces the door closed.
    pub async fn open_access_point(
        &self,
        location_id: &str,
        duration_secs: u64,
    ) -> Result<bool, Error> {
        let duration = format_duration(duration_secs);
        debug!(location_id, %duration, "opening access point");
        let params: [Value; 2] = [json!(location_id), json!({ "Duration": duration })];
        self.call(OPEN_ACCESS_POINT, &params).await
    }
}

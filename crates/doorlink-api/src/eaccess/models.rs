// Wire types for eAccess JSON-RPC results.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One entry of the `getModel("Devices")` inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    #[serde(rename = "deviceid")]
    pub device_id: String,
    pub access_point_id: String,
    #[serde(default)]
    pub device_type: Option<i64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// One entry of the `getModel("DeviceStatus", ...)` result.
///
/// Field coverage varies with the lock hardware, so everything defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatus {
    pub battery_level: f64,
    pub openings: i64,
    pub operating_mode: i64,
    pub firmware: String,
}

/// Location path of an access point: `[building, room, accessPoint]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub building: String,
    pub room: String,
    pub access_point: String,
}

impl Location {
    /// Build from the raw path returned by `getAccessPointProperty("location", ..)`.
    ///
    /// The path must have at least three segments; extra trailing
    /// segments are ignored.
    pub fn from_path(path: Vec<String>) -> Result<Self, Error> {
        let mut segments = path.into_iter();
        match (segments.next(), segments.next(), segments.next()) {
            (Some(building), Some(room), Some(access_point)) => Ok(Self {
                building,
                room,
                access_point,
            }),
            _ => Err(Error::Protocol {
                method: "eAccess.getAccessPointProperty".into(),
                message: "location path has fewer than three segments".into(),
            }),
        }
    }
}

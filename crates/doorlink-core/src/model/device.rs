use serde::Serialize;

/// A door device as reported by the eAccess server in one cycle.
///
/// Refetched every cycle and never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub device_id: String,
    pub access_point_id: String,
    pub battery_level: f64,
    pub openings: i64,
    pub operating_mode: i64,
    pub firmware: String,
    pub building: String,
    pub room: String,
    pub access_point: String,
}

impl Device {
    /// Display name of the platform asset: `"{accessPoint}, {room}, {building}"`.
    pub fn asset_name(&self) -> String {
        format!("{}, {}, {}", self.access_point, self.room, self.building)
    }
}

/// Durable link between a vendor device and a platform asset.
///
/// Unique per `(config_id, project_id, device_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceMapping {
    pub config_id: i64,
    pub project_id: String,
    pub device_id: String,
    pub asset_id: i32,
    /// Access point id used to address the door in vendor commands.
    pub location_id: String,
}

impl DeviceMapping {
    pub fn key(&self) -> MappingKey {
        MappingKey::new(self.config_id, &self.project_id, &self.device_id)
    }
}

/// Unique key of a [`DeviceMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingKey {
    pub config_id: i64,
    pub project_id: String,
    pub device_id: String,
}

impl MappingKey {
    pub fn new(config_id: i64, project_id: &str, device_id: &str) -> Self {
        Self {
            config_id,
            project_id: project_id.to_owned(),
            device_id: device_id.to_owned(),
        }
    }
}

impl std::fmt::Display for MappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.config_id, self.project_id, self.device_id)
    }
}

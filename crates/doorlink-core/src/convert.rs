// ── API-to-domain type conversions ──
//
// Bridges raw `doorlink_api` wire types into the domain model, and domain
// values into the attribute maps the platform stores as telemetry.

use serde_json::{Map, Value, json};

use doorlink_api::{DeviceEntry, DeviceStatus, Location};

use crate::model::{Device, MAX_OPENABLE_DURATION_SECS, Openable};

/// Attribute carrying the door-open request on the `output` subtype.
pub const OPEN_ATTRIBUTE: &str = "open";
/// Attribute carrying the door status on the `input` subtype.
pub const OPENABLE_ATTRIBUTE: &str = "openable";

// ── Vendor → domain ────────────────────────────────────────────────

impl Device {
    /// Merge one inventory entry with its status and resolved location.
    pub fn from_vendor(entry: DeviceEntry, status: DeviceStatus, location: Location) -> Self {
        Self {
            device_id: entry.device_id,
            access_point_id: entry.access_point_id,
            battery_level: status.battery_level,
            openings: status.openings,
            operating_mode: status.operating_mode,
            firmware: status.firmware,
            building: location.building,
            room: location.room,
            access_point: location.access_point,
        }
    }
}

// ── Domain → telemetry ─────────────────────────────────────────────

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `input` payload: battery level and opening count.
pub fn input_payload(device: &Device) -> Map<String, Value> {
    object(json!({
        "batteryLevel": device.battery_level,
        "openings": device.openings,
    }))
}

/// `info` payload: location labels, operating mode and firmware.
pub fn info_payload(device: &Device) -> Map<String, Value> {
    object(json!({
        "building": device.building,
        "room": device.room,
        "accessPoint": device.access_point,
        "operatingMode": device.operating_mode,
        "firmware": device.firmware,
    }))
}

/// `input` payload recording a door outcome.
pub fn openable_payload(value: Openable) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(OPENABLE_ATTRIBUTE.into(), Value::from(value.code()));
    map
}

// ── Telemetry → domain ─────────────────────────────────────────────

/// Numeric attribute value, accepting both JSON numbers and numeric strings.
fn numeric(data: &Map<String, Value>, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether an `output` payload requests the door to open (`open == 1`).
pub fn is_open_request(data: &Map<String, Value>) -> bool {
    numeric(data, OPEN_ATTRIBUTE).is_some_and(|v| (v - 1.0).abs() < f64::EPSILON)
}

/// Whether an `input` payload reports the door as currently opened.
pub fn reports_opened(data: &Map<String, Value>) -> bool {
    numeric(data, OPENABLE_ATTRIBUTE).is_some_and(|v| (v - 1.0).abs() < f64::EPSILON)
}

/// Parse the vendor's openable-duration override (whole seconds).
///
/// Values above [`MAX_OPENABLE_DURATION_SECS`] are rejected like any other
/// unusable value.
pub fn parse_duration_override(raw: &str) -> Option<u64> {
    raw.trim()
        .parse()
        .ok()
        .filter(|secs| *secs <= MAX_OPENABLE_DURATION_SECS)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn device() -> Device {
        Device::from_vendor(
            DeviceEntry {
                device_id: "D1".into(),
                access_point_id: "AP1".into(),
                device_type: None,
                id: None,
                label: None,
            },
            DeviceStatus {
                battery_level: 75.0,
                openings: 4,
                operating_mode: 2,
                firmware: "1.9".into(),
            },
            Location {
                building: "HQ".into(),
                room: "Lobby".into(),
                access_point: "Main door".into(),
            },
        )
    }

    #[test]
    fn asset_name_is_access_point_room_building() {
        assert_eq!(device().asset_name(), "Main door, Lobby, HQ");
    }

    #[test]
    fn payload_shapes() {
        let d = device();
        assert_eq!(
            Value::Object(input_payload(&d)),
            json!({ "batteryLevel": 75.0, "openings": 4 })
        );
        assert_eq!(
            Value::Object(info_payload(&d)),
            json!({
                "building": "HQ",
                "room": "Lobby",
                "accessPoint": "Main door",
                "operatingMode": 2,
                "firmware": "1.9"
            })
        );
        assert_eq!(
            Value::Object(openable_payload(Openable::Failed)),
            json!({ "openable": 2 })
        );
    }

    #[test]
    fn open_request_detection() {
        assert!(is_open_request(&object(json!({ "open": 1.0 }))));
        assert!(is_open_request(&object(json!({ "open": 1 }))));
        assert!(is_open_request(&object(json!({ "open": "1" }))));
        assert!(!is_open_request(&object(json!({ "open": 0 }))));
        assert!(!is_open_request(&object(json!({ "other": 1 }))));
    }

    #[test]
    fn duration_override_parsing() {
        assert_eq!(parse_duration_override(" 10 "), Some(10));
        assert_eq!(parse_duration_override("ten"), None);
        assert_eq!(parse_duration_override("-5"), None);
        assert_eq!(parse_duration_override("86400"), Some(86_400));
        assert_eq!(parse_duration_override("86401"), None);
        assert_eq!(parse_duration_override("18446744073709551615"), None);
    }
}

// ── Domain model ──
//
// Canonical types shared by the reconciler, the scheduler and the door
// actuator. Wire types stay in doorlink-api; `convert.rs` bridges them.

pub mod configuration;
pub mod device;
pub mod door;

pub use configuration::{
    Configuration, DEFAULT_OPENABLE_DURATION_SECS, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, MAX_OPENABLE_DURATION_SECS,
};
pub use device::{Device, DeviceMapping, MappingKey};
pub use door::{DoorState, Openable};

// Glutz eAccess JSON-RPC API.

pub mod client;
pub mod methods;
pub mod models;

pub use client::EAccessClient;
pub use methods::{OPENABLE_DURATION_PROPERTY, format_duration};
pub use models::{DeviceEntry, DeviceStatus, Location};

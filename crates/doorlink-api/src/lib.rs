// doorlink-api: Async clients for the Glutz eAccess JSON-RPC API and the Eliona platform API

pub mod eaccess;
pub mod error;
pub mod platform;
pub mod transport;
pub mod websocket;

pub use eaccess::{DeviceEntry, DeviceStatus, EAccessClient, Location};
pub use error::Error;
pub use platform::{AssetRecord, DataRecord, DataSubtype, NewAsset, PlatformClient};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::ReconnectConfig;

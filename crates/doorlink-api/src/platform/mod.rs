// Eliona platform API
//
// REST client for assets and heap data plus the data-listener stream.

pub mod client;
pub mod models;

pub use client::PlatformClient;
pub use models::{AssetRecord, DataRecord, DataSubtype, NewAsset};

// Wire types for the Eliona platform API (v2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute subtype of a data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSubtype {
    Input,
    Output,
    Info,
    Status,
    Property,
}

impl DataSubtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Info => "info",
            Self::Status => "status",
            Self::Property => "property",
        }
    }
}

/// Asset payload for `PUT /assets`.
///
/// The platform upserts on `(projectId, globalAssetIdentifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub project_id: String,
    pub global_asset_identifier: String,
    pub name: String,
    pub asset_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Asset as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: i32,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub global_asset_identifier: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
}

/// One heap record: the latest attribute values of an asset for a subtype.
///
/// Used both for `PUT /data` and for frames on the data-listener WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecord {
    pub asset_id: i32,
    pub subtype: DataSubtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

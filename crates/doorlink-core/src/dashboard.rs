// ── Dashboard template ──
//
// "Glutz Doors" dashboard for one project: one widget per mapped door
// asset with the open setpoint, the open current value and the door
// status attribute.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::convert::{OPEN_ATTRIBUTE, OPENABLE_ATTRIBUTE};
use crate::model::DeviceMapping;

pub const DASHBOARD_NAME: &str = "Glutz Doors";
pub const WIDGET_TYPE: &str = "Glutz Door";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub name: String,
    pub project_id: String,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub widget_type_name: String,
    pub asset_id: i32,
    pub details: Value,
    pub data: Vec<WidgetData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetData {
    pub element_sequence: Option<i32>,
    pub asset_id: i32,
    pub data: Map<String, Value>,
}

fn element(
    sequence: i32,
    asset_id: i32,
    attribute: &str,
    subtype: &str,
    key: &str,
    description: &str,
) -> WidgetData {
    let data = match json!({
        "aggregatedDataField": null,
        "aggregatedDataType": "heap",
        "attribute": attribute,
        "description": description,
        "key": key,
        "seq": 0,
        "subtype": subtype,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    WidgetData {
        element_sequence: Some(sequence),
        asset_id,
        data,
    }
}

fn door_widget(asset_id: i32) -> Widget {
    Widget {
        widget_type_name: WIDGET_TYPE.into(),
        asset_id,
        details: json!({ "size": 1, "timespan": 7 }),
        data: vec![
            element(1, asset_id, OPEN_ATTRIBUTE, "output", "_SETPOINT", "Open door"),
            element(1, asset_id, OPEN_ATTRIBUTE, "output", "_CURRENT", "Open"),
            element(2, asset_id, OPENABLE_ATTRIBUTE, "input", "", "Door Status: "),
        ],
    }
}

/// Build the dashboard of `project_id` from the known mappings.
///
/// Mappings of other projects are ignored; an asset shared by several
/// mappings gets a single widget.
pub fn door_dashboard(project_id: &str, mappings: &[DeviceMapping]) -> Dashboard {
    let mut asset_ids: Vec<i32> = mappings
        .iter()
        .filter(|m| m.project_id == project_id)
        .map(|m| m.asset_id)
        .collect();
    asset_ids.sort_unstable();
    asset_ids.dedup();

    Dashboard {
        name: DASHBOARD_NAME.into(),
        project_id: project_id.to_owned(),
        widgets: asset_ids.into_iter().map(door_widget).collect(),
    }
}

//! JSON interchange document for out-of-process renderers.
//!
//! The document is the serde form of [`Flowchart`]: colors as `#rrggbbaa`
//! strings, enums as lowercase names and directions as `TB`/`LR`/`BT`/`RL`.

use crate::error::Result;
use crate::graph_ast::Flowchart;

pub fn to_json(flowchart: &Flowchart) -> Result<String> {
    Ok(serde_json::to_string(flowchart)?)
}

pub fn to_json_pretty(flowchart: &Flowchart) -> Result<String> {
    Ok(serde_json::to_string_pretty(flowchart)?)
}

/// Reads a document written by [`to_json`]. Geometry and layout metrics are
/// restored as written, so a computed layout stays computed.
pub fn from_json(json: &str) -> Result<Flowchart> {
    Ok(serde_json::from_str(json)?)
}

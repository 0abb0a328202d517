//! Model metadata as shipped with Video AI
//!
//! Each `*.json` document in the models directory describes one model family:
//! which backends it was exported for, which scale tiers exist per backend and
//! which block sizes each net template was compiled for.
//!
//! Maps are [`IndexMap`]s so iteration follows document order, which keeps the
//! resolved file lists stable between runs.

pub mod loader;

pub use loader::{default_metadata_dir, load_metadata_dir};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// One model family
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(rename = "shortName")]
    pub id: String,
    #[serde(deserialize_with = "version_string")]
    pub version: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub gui: GuiInfo,
    #[serde(default)]
    pub backends: IndexMap<String, BackendSpec>,
}

/// Presentation details used by the Video AI UI
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GuiInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

/// Artifact layout of a model for one backend
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSpec {
    /// Hardware family codes this variant is restricted to. Empty means ungated.
    #[serde(default)]
    pub capabilities: Vec<i64>,
    #[serde(default)]
    pub scales: IndexMap<String, ScaleSpec>,
}

/// Net templates and exported block sizes of one scale tier
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaleSpec {
    /// Filename templates, e.g. `fgnet-fp32-[H]x[W]-[S]x-ox.tz`
    #[serde(default)]
    pub nets: Vec<String>,
    /// Flattened (height, width) pairs
    #[serde(default)]
    pub blocks: Vec<i64>,
}

// Model versions show up both as numbers and as strings
fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for version, got {other}"
        ))),
    }
}

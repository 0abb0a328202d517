use crate::error::{Result, VaimmError};
use crate::metadata::MetadataRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// File whose presence marks a Video AI models directory
const MARKER_FILE: &str = "alq-13.json";

/// Load every model record from the `*.json` files in `dir`
///
/// Files are read in filename order. Documents without a `backends` section
/// (presets, settings) are skipped.
pub fn load_metadata_dir(dir: &Path) -> Result<Vec<MetadataRecord>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        VaimmError::Metadata(format!("Cannot read metadata directory {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        if let Some(record) = read_record(&path)? {
            records.push(record);
        }
    }

    tracing::debug!("Loaded {} model records from {}", records.len(), dir.display());
    Ok(records)
}

fn read_record(path: &Path) -> Result<Option<MetadataRecord>> {
    let content = fs::read(path)?;

    let value: serde_json::Value = serde_json::from_slice(&content)
        .map_err(|e| VaimmError::Metadata(format!("Failed to parse {}: {e}", path.display())))?;

    if value.get("backends").is_none() {
        tracing::debug!("Skipping {} (no backends)", path.display());
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| VaimmError::Metadata(format!("Invalid model record in {}: {e}", path.display())))
}

/// Find the Video AI models directory in one of the usual install locations
#[must_use]
pub fn default_metadata_dir() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(program_data) = std::env::var("PROGRAMDATA") {
        candidates.push(
            PathBuf::from(program_data)
                .join("Topaz Labs LLC")
                .join("Topaz Video AI")
                .join("models"),
        );
    }
    candidates.push(PathBuf::from(
        "/Applications/Topaz Video AI.app/Contents/Resources/models",
    ));
    candidates.push(PathBuf::from("/opt/TopazVideoAIBETA/models"));

    candidates
        .into_iter()
        .find(|dir| dir.join(MARKER_FILE).exists())
}

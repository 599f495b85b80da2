//! Whole-document JSON files for the small local stores.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Read a JSON document. A missing or blank file reads as `T::default()`.
pub(crate) fn read_or_default<T>(path: &Path, what: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))?;
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {what}: {}", path.display()))
}

/// Replace the document through a temp file and a rename, so readers see
/// either the old or the new content.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {what} directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, data).with_context(|| format!("Failed to write {what}: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {what}: {}", path.display()))?;
    Ok(())
}

//! Loading model manifests and JSON payloads from files and strings.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ManifestError;
use crate::metadata::ModelManifest;

/// Load a model manifest from a file path.
///
/// # Errors
///
/// Returns `ManifestError::FileNotFound` if the file doesn't exist,
/// or `ManifestError::InvalidJson` if the file isn't a valid manifest.
pub fn load_manifest(path: &Path) -> Result<ModelManifest, ManifestError> {
    load_json_file(path)
}

/// Load a model manifest from a JSON string.
///
/// # Errors
///
/// Returns `ManifestError::InvalidJson` if the string isn't a valid manifest.
pub fn load_manifest_str(content: &str) -> Result<ModelManifest, ManifestError> {
    serde_json::from_str(content).map_err(|source| ManifestError::InvalidJson { source })
}

/// Load a JSON payload from a file path.
///
/// # Errors
///
/// Returns `ManifestError::FileNotFound` if the file doesn't exist,
/// or `ManifestError::InvalidJson` if the file isn't valid JSON.
pub fn load_payload(path: &Path) -> Result<Value, ManifestError> {
    load_json_file(path)
}

fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ManifestError::InvalidJson { source })
}

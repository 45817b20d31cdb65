//! Export of detection results.
use std::path::{Path, PathBuf};

use common::protocol::DetectionResult;

use crate::error::ExportError;

/// File name of exported results.
pub const EXPORT_FILE_NAME: &str = "detection_results.json";

/// Serialized detection result, ready to be saved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportArtifact {
    pub file_name: &'static str,
    pub contents: String,
}

impl ExportArtifact {
    /// Write the artifact into `dir` and release the buffer.
    pub fn save(self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let path = dir.as_ref().join(self.file_name);
        std::fs::write(&path, self.contents.as_bytes()).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!("Exported detection results to {}", path.display());

        Ok(path)
    }
}

/// Serialize exactly the given result as pretty-printed JSON.
pub fn export(result: Option<&DetectionResult>) -> Result<ExportArtifact, ExportError> {
    let result = result.ok_or(ExportError::NoResult)?;
    let contents = serde_json::to_string_pretty(result)?;

    Ok(ExportArtifact {
        file_name: EXPORT_FILE_NAME,
        contents,
    })
}

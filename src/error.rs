//! Error taxonomy
//!
//! Asset and layout problems are fatal for their spread and carry enough
//! context (element id, file path, field) to fix the input. Geometry and
//! rotation problems never appear here: the resolver recovers from spine
//! intrusions and the validator reports the rest.

use std::path::PathBuf;
use thiserror::Error;

/// Missing or corrupt source raster or font.
#[derive(Debug, Error)]
#[error("Asset load failed for element '{element_id}' ({}): {reason}", .path.display())]
pub struct AssetLoadError {
    pub element_id: String,
    pub path: PathBuf,
    pub reason: String,
}

impl AssetLoadError {
    pub fn new(element_id: impl Into<String>, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            element_id: element_id.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Malformed layout description; raised before composition starts.
#[derive(Debug, Error)]
#[error("Layout error{}: {field}: {message}", .element_id.as_ref().map(|id| format!(" in element '{id}'")).unwrap_or_default())]
pub struct LayoutError {
    pub element_id: Option<String>,
    pub field: String,
    pub message: String,
}

impl LayoutError {
    pub fn element(element_id: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            element_id: Some(element_id.to_string()),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn spread(field: &str, message: impl Into<String>) -> Self {
        Self {
            element_id: None,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SpreadError {
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Layout requires engine >= {required}, current is {current}")]
    EngineVersionMismatch { required: String, current: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("PNG encoding error: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_names_element() {
        let err = LayoutError::element("L_photo_01", "position", "expected [x, y]");
        assert_eq!(
            err.to_string(),
            "Layout error in element 'L_photo_01': position: expected [x, y]"
        );
        let err = LayoutError::spread("spread_id", "must not be empty");
        assert_eq!(err.to_string(), "Layout error: spread_id: must not be empty");
    }

    #[test]
    fn test_asset_error_names_path() {
        let err = AssetLoadError::new("R_box", "/tmp/assets/box.png", "not found");
        let msg = SpreadError::from(err).to_string();
        assert!(msg.contains("R_box"));
        assert!(msg.contains("/tmp/assets/box.png"));
    }
}

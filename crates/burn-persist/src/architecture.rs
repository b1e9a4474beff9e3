//! Architecture document
//!
//! The text half of a persisted model. The document wraps the model's own
//! serde representation in a small envelope:
//!
//! ```json
//! {
//!   "class_name": "Sequential",
//!   "format_version": 1,
//!   "generator": "burn-persist 0.1.0",
//!   "config": { "...": "..." }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest document version this crate writes and reads
pub const FORMAT_VERSION: u32 = 1;

/// Value written to the `generator` field
pub const GENERATOR: &str = concat!("burn-persist ", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ArchitectureError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Class mismatch: expected {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },

    #[error("Unsupported format version {found} (supported 1 to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Invalid layer {layer}: {reason}")]
    InvalidLayer { layer: String, reason: String },
}

impl ArchitectureError {
    /// Shorthand for [`ArchitectureError::InvalidLayer`]
    pub fn invalid_layer(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        ArchitectureError::InvalidLayer {
            layer: layer.into(),
            reason: reason.into(),
        }
    }
}

fn default_format_version() -> u32 {
    1
}

/// Envelope around a model's architecture config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDocument<C> {
    /// Model family, e.g. `Sequential`
    pub class_name: String,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub generator: Option<String>,
    pub config: C,
}

impl<C> ArchitectureDocument<C> {
    pub fn new(class_name: impl Into<String>, config: C) -> Self {
        Self {
            class_name: class_name.into(),
            format_version: FORMAT_VERSION,
            generator: Some(GENERATOR.to_string()),
            config,
        }
    }

    /// Rejects documents with an unknown version or for another model family
    pub fn check(&self, expected_class: &str) -> Result<(), ArchitectureError> {
        if !(1..=FORMAT_VERSION).contains(&self.format_version) {
            return Err(ArchitectureError::UnsupportedVersion {
                found: self.format_version,
                supported: FORMAT_VERSION,
            });
        }
        if self.class_name != expected_class {
            return Err(ArchitectureError::ClassMismatch {
                expected: expected_class.to_string(),
                found: self.class_name.clone(),
            });
        }
        Ok(())
    }
}

impl<C: Serialize> ArchitectureDocument<C> {
    pub fn to_json(&self) -> Result<String, ArchitectureError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<C: DeserializeOwned> ArchitectureDocument<C> {
    pub fn from_json(json: &str) -> Result<Self, ArchitectureError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Document with an untyped config, for tools that don't know the model type
pub type RawArchitecture = ArchitectureDocument<serde_json::Value>;

impl RawArchitecture {
    /// Parse the config as the model's own architecture type
    pub fn into_typed<C: DeserializeOwned>(
        self,
    ) -> Result<ArchitectureDocument<C>, ArchitectureError> {
        Ok(ArchitectureDocument {
            class_name: self.class_name,
            format_version: self.format_version,
            generator: self.generator,
            config: serde_json::from_value(self.config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widths {
        widths: Vec<usize>,
    }

    #[test]
    fn test_document_json_shape() {
        let doc = ArchitectureDocument::new("Mlp", Widths { widths: vec![4, 8] });
        let json = doc.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["class_name"], "Mlp");
        assert_eq!(value["format_version"], 1);
        assert_eq!(value["config"]["widths"][1], 8);

        let back = ArchitectureDocument::<Widths>::from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_missing_version_defaults_to_one() {
        let json = r#"{"class_name": "Mlp", "config": {"widths": [2]}}"#;
        let doc = ArchitectureDocument::<Widths>::from_json(json).unwrap();
        assert_eq!(doc.format_version, 1);
        assert!(doc.generator.is_none());
        doc.check("Mlp").unwrap();
    }

    #[test]
    fn test_check_rejects_other_class() {
        let doc = ArchitectureDocument::new("Mlp", Widths { widths: vec![] });
        let err = doc.check("Sequential").unwrap_err();
        assert!(matches!(err, ArchitectureError::ClassMismatch { .. }));
    }

    #[test]
    fn test_check_rejects_newer_version() {
        let mut doc = ArchitectureDocument::new("Mlp", Widths { widths: vec![] });
        doc.format_version = FORMAT_VERSION + 1;
        let err = doc.check("Mlp").unwrap_err();
        assert!(matches!(err, ArchitectureError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_check_rejects_version_zero() {
        let json = r#"{"class_name": "Mlp", "format_version": 0, "config": {"widths": []}}"#;
        let doc = RawArchitecture::from_json(json).unwrap();
        match doc.check("Mlp").unwrap_err() {
            ArchitectureError::UnsupportedVersion { found, supported } => {
                assert_eq!(found, 0);
                assert_eq!(supported, FORMAT_VERSION);
            }
            other => panic!("expected an unsupported version, got {other}"),
        }
    }

    #[test]
    fn test_into_typed() {
        let json = r#"{"class_name": "Mlp", "config": {"widths": [3, 1]}}"#;
        let doc = RawArchitecture::from_json(json).unwrap().into_typed::<Widths>().unwrap();
        assert_eq!(doc.config, Widths { widths: vec![3, 1] });
        assert_eq!(doc.format_version, 1);

        let json = r#"{"class_name": "Mlp", "config": {"graph": []}}"#;
        let err = RawArchitecture::from_json(json)
            .unwrap()
            .into_typed::<Widths>()
            .unwrap_err();
        assert!(matches!(err, ArchitectureError::Json(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = RawArchitecture::from_json("{not json").unwrap_err();
        assert!(matches!(err, ArchitectureError::Json(_)));
    }
}

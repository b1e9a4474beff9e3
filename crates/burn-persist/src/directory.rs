//! On-disk layout of a persisted model

use std::fs;
use std::path::{Path, PathBuf};

use crate::architecture::RawArchitecture;
use crate::error::PersistError;

/// File name of the architecture document
///
/// The spelling is load-bearing: directories written by earlier tools use it.
pub const ARCHITECTURE_FILE: &str = "architechture.json";

/// File name of the weights container
pub const WEIGHTS_FILE: &str = "weights.h5";

/// A directory holding an architecture document and a weights container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDirectory {
    root: PathBuf,
}

impl ModelDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn architecture_path(&self) -> PathBuf {
        self.root.join(ARCHITECTURE_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.root.join(WEIGHTS_FILE)
    }

    /// True when both artifacts are present
    pub fn exists(&self) -> bool {
        self.architecture_path().is_file() && self.weights_path().is_file()
    }

    /// Create the directory and any missing parents
    pub fn create(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.root).map_err(|e| PersistError::io(&self.root, e))
    }

    /// Read the architecture document without knowing the model type
    pub fn read_architecture(&self) -> Result<RawArchitecture, PersistError> {
        let path = self.architecture_path();
        let text = fs::read_to_string(&path).map_err(|e| PersistError::io(&path, e))?;
        Ok(RawArchitecture::from_json(&text)?)
    }
}

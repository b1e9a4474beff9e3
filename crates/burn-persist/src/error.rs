//! Top-level error for save/load

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::architecture::ArchitectureError;
use crate::weights::WeightsError;

/// Error returned by [`save_model`](crate::save_model) and
/// [`load_model`](crate::load_model)
#[derive(Error, Debug)]
pub enum PersistError {
    /// Filesystem error on one of the directory's artifacts
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The architecture document could not be written, parsed or rebuilt
    #[error("Architecture error: {0}")]
    Architecture(#[from] ArchitectureError),

    /// The weights container could not be written, read or applied
    #[error("Weights error: {0}")]
    Weights(#[from] WeightsError),
}

impl PersistError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the failure was a missing directory or artifact
    pub fn is_not_found(&self) -> bool {
        match self {
            PersistError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

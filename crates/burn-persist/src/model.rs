//! The contract a model type implements to be persisted

use burn::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::architecture::ArchitectureError;

/// A burn module that can be rebuilt from a structure description
///
/// [`architecture`](Self::architecture) and
/// [`from_architecture`](Self::from_architecture) round-trip the structure.
/// The parameters travel as the module's record, so the field names from
/// `#[derive(Module)]` are the names in the weights container.
pub trait PersistentModel<B: Backend>: Module<B> {
    /// Serializable description of the model's structure
    type Architecture: Serialize + DeserializeOwned;

    /// Model family written to the architecture document, e.g. `Sequential`
    const CLASS_NAME: &'static str;

    /// Describe the structure, without parameter values
    fn architecture(&self) -> Self::Architecture;

    /// Build an untrained shell from a structure description
    fn from_architecture(
        architecture: &Self::Architecture,
        device: &B::Device,
    ) -> Result<Self, ArchitectureError>;
}

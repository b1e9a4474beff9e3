//! save_model / load_model

use std::fs;
use std::path::Path;

use burn::prelude::*;

use crate::architecture::ArchitectureDocument;
use crate::directory::ModelDirectory;
use crate::error::PersistError;
use crate::model::PersistentModel;
use crate::options::SaveOptions;
use crate::weights;

/// Save a model to `directory` with default options
///
/// Creates the directory and any missing parents, then writes
/// `architechture.json` and `weights.h5`, overwriting existing files.
pub fn save_model<B, M, P>(model: &M, directory: P) -> Result<(), PersistError>
where
    B: Backend,
    M: PersistentModel<B>,
    P: AsRef<Path>,
{
    save_model_with::<B, M, P>(model, directory, &SaveOptions::default())
}

/// Save a model to `directory`
pub fn save_model_with<B, M, P>(
    model: &M,
    directory: P,
    options: &SaveOptions,
) -> Result<(), PersistError>
where
    B: Backend,
    M: PersistentModel<B>,
    P: AsRef<Path>,
{
    let dir = ModelDirectory::new(directory.as_ref());
    dir.create()?;

    let document = ArchitectureDocument::new(M::CLASS_NAME, model.architecture());
    let json = document.to_json()?;
    let architecture_path = dir.architecture_path();
    fs::write(&architecture_path, &json).map_err(|e| PersistError::io(&architecture_path, e))?;
    tracing::debug!(
        path = %architecture_path.display(),
        bytes = json.len(),
        "wrote architecture document"
    );

    let bytes = weights::to_bytes::<B, M>(model.clone(), options.precision)?;
    let weights_path = dir.weights_path();
    fs::write(&weights_path, &bytes).map_err(|e| PersistError::io(&weights_path, e))?;
    tracing::debug!(
        path = %weights_path.display(),
        params = model.num_params(),
        bytes = bytes.len(),
        precision = options.precision.as_str(),
        "wrote weights container"
    );

    tracing::info!(
        class = M::CLASS_NAME,
        directory = %dir.root().display(),
        "saved model"
    );
    Ok(())
}

/// Load a model previously written by [`save_model`]
///
/// Checks the document's class and version, rebuilds the shell from its
/// config, then fills the shell from `weights.h5`.
pub fn load_model<B, M, P>(directory: P, device: &B::Device) -> Result<M, PersistError>
where
    B: Backend,
    M: PersistentModel<B>,
    P: AsRef<Path>,
{
    let dir = ModelDirectory::new(directory.as_ref());

    let document = dir.read_architecture()?;
    document.check(M::CLASS_NAME)?;
    let document = document.into_typed::<M::Architecture>()?;
    tracing::debug!(
        path = %dir.architecture_path().display(),
        format_version = document.format_version,
        "read architecture document"
    );

    let shell = M::from_architecture(&document.config, device)?;

    let weights_path = dir.weights_path();
    let bytes = fs::read(&weights_path).map_err(|e| PersistError::io(&weights_path, e))?;
    tracing::debug!(
        path = %weights_path.display(),
        bytes = bytes.len(),
        "read weights container"
    );

    let model = weights::load_into::<B, M>(shell, bytes, device)?;

    tracing::info!(
        class = M::CLASS_NAME,
        directory = %dir.root().display(),
        params = model.num_params(),
        "loaded model"
    );
    Ok(model)
}

//! Model persistence for Burn
//!
//! A persisted model is a directory with two files:
//!
//! - `architechture.json` - the model's structure as a JSON document,
//!   enough to rebuild an untrained shell
//! - `weights.h5` - the module's record in burn's named MessagePack format,
//!   keyed by parameter field path
//!
//! Any burn module implementing [`PersistentModel`] can be saved and loaded:
//!
//! ```ignore
//! use burn_persist::{load_model, save_model};
//!
//! save_model(&model, "checkpoints/mnist")?;
//! let restored: MyModel<Backend> = load_model("checkpoints/mnist", &device)?;
//! ```
//!
//! # Precision
//!
//! Weights are stored as f32 by default. [`SaveOptions::with_precision`]
//! with [`Precision::Half`] stores f16 instead; loading widens to the
//! backend's float type.
//!
//! # Failure
//!
//! Errors from the filesystem, the JSON document and the weights container
//! are returned as [`PersistError`]. Nothing is retried and a save that fails
//! halfway leaves whatever it had already written.

pub mod architecture;
pub mod directory;
pub mod error;
pub mod model;
pub mod options;
pub mod store;
pub mod weights;

pub use architecture::{ArchitectureDocument, ArchitectureError, RawArchitecture, FORMAT_VERSION};
pub use directory::{ModelDirectory, ARCHITECTURE_FILE, WEIGHTS_FILE};
pub use error::PersistError;
pub use model::PersistentModel;
pub use options::SaveOptions;
pub use store::{load_model, save_model, save_model_with};
pub use weights::{Precision, WeightsError};

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::{Linear, LinearConfig};
    use burn::prelude::*;
    use burn_ndarray::NdArray;
    use serde::{Deserialize, Serialize};

    type TestBackend = NdArray<f32>;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TinyMlpConfig {
        input: usize,
        hidden: usize,
        output: usize,
    }

    #[derive(Module, Debug)]
    struct TinyMlp<B: Backend> {
        fc1: Linear<B>,
        fc2: Linear<B>,
    }

    impl<B: Backend> TinyMlp<B> {
        fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
            self.fc2.forward(burn::tensor::activation::relu(self.fc1.forward(x)))
        }
    }

    impl<B: Backend> PersistentModel<B> for TinyMlp<B> {
        type Architecture = TinyMlpConfig;
        const CLASS_NAME: &'static str = "TinyMlp";

        fn architecture(&self) -> TinyMlpConfig {
            let [input, hidden] = self.fc1.weight.val().dims();
            let [_, output] = self.fc2.weight.val().dims();
            TinyMlpConfig { input, hidden, output }
        }

        fn from_architecture(
            config: &TinyMlpConfig,
            device: &B::Device,
        ) -> Result<Self, ArchitectureError> {
            if config.hidden == 0 {
                return Err(ArchitectureError::invalid_layer("fc1", "hidden size is zero"));
            }
            Ok(Self {
                fc1: LinearConfig::new(config.input, config.hidden).init(device),
                fc2: LinearConfig::new(config.hidden, config.output).init(device),
            })
        }
    }

    fn tiny(input: usize, hidden: usize, output: usize) -> TinyMlp<TestBackend> {
        let device = Default::default();
        TinyMlp::from_architecture(&TinyMlpConfig { input, hidden, output }, &device).unwrap()
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.to_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_round_trip_same_parameters_and_output() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = tiny(3, 5, 2);

        save_model(&model, tmp.path()).unwrap();
        let restored: TinyMlp<TestBackend> = load_model(tmp.path(), &device).unwrap();

        assert_eq!(restored.architecture(), model.architecture());
        assert_eq!(values(restored.fc1.weight.val()), values(model.fc1.weight.val()));

        let x = Tensor::<TestBackend, 2>::from_floats([[0.1, -0.2, 0.3], [1.0, 0.5, -1.5]], &device);
        assert_eq!(values(restored.forward(x.clone())), values(model.forward(x)));
    }

    #[test]
    fn test_save_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("new").join("nested").join("dir");

        save_model(&tiny(2, 2, 2), &nested).unwrap();

        assert!(nested.join(ARCHITECTURE_FILE).is_file());
        assert!(nested.join(WEIGHTS_FILE).is_file());
        assert!(ModelDirectory::new(&nested).exists());
    }

    #[test]
    fn test_load_missing_directory_is_not_found() {
        let device = Default::default();
        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>("/nonexistent", &device)
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn test_load_missing_weights_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 3, 1), tmp.path()).unwrap();
        std::fs::remove_file(tmp.path().join(WEIGHTS_FILE)).unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn test_mismatched_weights_fail_with_shape_error() {
        let tmp = tempfile::tempdir().unwrap();
        let small = tmp.path().join("small");
        let wide = tmp.path().join("wide");
        let device = Default::default();

        save_model(&tiny(3, 4, 2), &small).unwrap();
        save_model(&tiny(3, 8, 2), &wide).unwrap();
        std::fs::copy(wide.join(WEIGHTS_FILE), small.join(WEIGHTS_FILE)).unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(&small, &device).unwrap_err();
        match err {
            PersistError::Weights(WeightsError::ShapeMismatch {
                name,
                expected,
                actual,
            }) => {
                assert!(name.starts_with("fc1.bias"), "{name}");
                assert_eq!(expected, vec![4]);
                assert_eq!(actual, vec![8]);
            }
            other => panic!("expected a shape mismatch, got {other}"),
        }
    }

    #[test]
    fn test_undecodable_weights_fail_with_record_error() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 3, 1), tmp.path()).unwrap();
        std::fs::write(tmp.path().join(WEIGHTS_FILE), b"\x89HDF\r\n\x1a\n").unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        assert!(
            matches!(err, PersistError::Weights(WeightsError::Record(_))),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_class_mismatch_in_document() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 2, 2), tmp.path()).unwrap();

        let path = tmp.path().join(ARCHITECTURE_FILE);
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("\"TinyMlp\"", "\"Sequential\"")).unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        assert!(matches!(
            err,
            PersistError::Architecture(ArchitectureError::ClassMismatch { .. })
        ));
    }

    #[test]
    fn test_newer_document_rejected_before_config_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 2, 2), tmp.path()).unwrap();
        std::fs::write(
            tmp.path().join(ARCHITECTURE_FILE),
            r#"{"class_name": "TinyMlp", "format_version": 2, "config": {"graph": []}}"#,
        )
        .unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        assert!(
            matches!(
                err,
                PersistError::Architecture(ArchitectureError::UnsupportedVersion { found: 2, .. })
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_foreign_class_rejected_before_config_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 2, 2), tmp.path()).unwrap();
        std::fs::write(
            tmp.path().join(ARCHITECTURE_FILE),
            r#"{"class_name": "Functional", "format_version": 1, "config": {"graph": []}}"#,
        )
        .unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        match err {
            PersistError::Architecture(ArchitectureError::ClassMismatch { expected, found }) => {
                assert_eq!(expected, "TinyMlp");
                assert_eq!(found, "Functional");
            }
            other => panic!("expected a class mismatch, got {other}"),
        }
    }

    #[test]
    fn test_malformed_document() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        save_model(&tiny(2, 2, 2), tmp.path()).unwrap();
        std::fs::write(tmp.path().join(ARCHITECTURE_FILE), "{\"class_name\": ").unwrap();

        let err = load_model::<TestBackend, TinyMlp<TestBackend>, _>(tmp.path(), &device)
            .unwrap_err();
        assert!(matches!(err, PersistError::Architecture(ArchitectureError::Json(_))));
    }

    #[test]
    fn test_half_precision_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = tiny(4, 6, 3);

        let full = tmp.path().join("full");
        let half = tmp.path().join("half");
        save_model(&model, &full).unwrap();
        let options = SaveOptions::new().with_precision(Precision::Half);
        save_model_with(&model, &half, &options).unwrap();

        let full_size = std::fs::metadata(full.join(WEIGHTS_FILE)).unwrap().len();
        let half_size = std::fs::metadata(half.join(WEIGHTS_FILE)).unwrap().len();
        assert!(half_size < full_size, "{half_size} vs {full_size}");

        let restored: TinyMlp<TestBackend> = load_model(&half, &device).unwrap();
        let before = values(model.fc1.weight.val());
        let after = values(restored.fc1.weight.val());
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }
}

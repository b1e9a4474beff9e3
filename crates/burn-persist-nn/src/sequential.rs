//! Sequential model

use burn::prelude::*;
use burn_persist::{ArchitectureError, PersistentModel};

use crate::config::{LayerSummary, SequentialConfig};
use crate::features::Features;
use crate::layers::Layer;

/// A linear stack of layers
///
/// The model keeps the config it was built from, which is what gets written
/// as its architecture document.
#[derive(Module, Debug)]
pub struct Sequential<B: Backend> {
    pub layers: Vec<Layer<B>>,
    #[module(skip)]
    config: SequentialConfig,
}

impl SequentialConfig {
    /// Validate the stack and build an untrained model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Sequential<B>, ArchitectureError> {
        let shapes = self.shapes()?;
        let layers = self
            .layers
            .iter()
            .zip(shapes.iter())
            .map(|(layer, input)| Layer::init(layer, input, device))
            .collect();

        tracing::debug!(
            layers = self.layers.len(),
            output = %shapes.last().map(|s| s.to_string()).unwrap_or_default(),
            "built sequential model"
        );

        Ok(Sequential {
            layers,
            config: self.clone(),
        })
    }
}

impl<B: Backend> Sequential<B> {
    pub fn config(&self) -> &SequentialConfig {
        &self.config
    }

    pub fn summary(&self) -> Vec<LayerSummary> {
        // The config was validated when the model was built
        self.config.summary().unwrap_or_default()
    }

    /// Run the stack on a batch
    ///
    /// # Panics
    ///
    /// If the input's rank or dtype doesn't match the model's input spec.
    pub fn forward(&self, input: impl Into<Features<B>>) -> Features<B> {
        self.layers
            .iter()
            .zip(self.config.layers.iter())
            .fold(input.into(), |x, (layer, config)| layer.forward(config.name(), x))
    }
}

impl<B: Backend> PersistentModel<B> for Sequential<B> {
    type Architecture = SequentialConfig;
    const CLASS_NAME: &'static str = "Sequential";

    fn architecture(&self) -> SequentialConfig {
        self.config.clone()
    }

    fn from_architecture(
        architecture: &SequentialConfig,
        device: &B::Device,
    ) -> Result<Self, ArchitectureError> {
        architecture.init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::config::{ActivationSpec, DenseSpec, DropoutSpec, InputSpec};
    use burn_ndarray::NdArray;
    use burn_persist::weights::{load_into, to_bytes};
    use burn_persist::{Precision, WeightsError};

    type TestBackend = NdArray<f32>;

    fn mlp() -> SequentialConfig {
        SequentialConfig::new(InputSpec::float([3]))
            .with_layer(DenseSpec::new(4).with_activation(Activation::Tanh))
            .with_layer(DropoutSpec::new(0.5))
            .with_layer(DenseSpec::new(2))
    }

    #[test]
    fn test_init_and_forward() {
        let device = Default::default();
        let model = mlp().init::<TestBackend>(&device).unwrap();

        assert_eq!(model.layers.len(), 3);
        assert_eq!(model.num_params(), 3 * 4 + 4 + 4 * 2 + 2);

        let summary = model.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[1].name, "dropout");
        assert_eq!(
            summary.iter().map(|l| l.params).sum::<usize>(),
            model.num_params()
        );

        let x = Tensor::<TestBackend, 2>::ones([5, 3], &device);
        let y = model.forward(x);
        assert_eq!(y.dims(), vec![5, 2]);
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let device = Default::default();
        let config = SequentialConfig::new(InputSpec::float([3])).with_layer(DenseSpec::new(0));
        assert!(config.init::<TestBackend>(&device).is_err());
    }

    #[test]
    fn test_weights_follow_layer_positions() {
        let device = Default::default();
        let model = mlp().init::<TestBackend>(&device).unwrap();
        let bytes = to_bytes::<TestBackend, _>(model.clone(), Precision::Full).unwrap();

        let shell = mlp().init::<TestBackend>(&device).unwrap();
        let restored = load_into::<TestBackend, _>(shell, bytes, &device).unwrap();

        let x = Tensor::<TestBackend, 2>::from_floats([[0.5, -1.0, 2.0]], &device);
        assert_eq!(
            restored.forward(x.clone()).to_vec().unwrap(),
            model.forward(x).to_vec().unwrap()
        );
    }

    #[test]
    fn test_swapped_layer_kind_is_layout_mismatch() {
        let device = Default::default();
        let model = mlp().init::<TestBackend>(&device).unwrap();
        let bytes = to_bytes::<TestBackend, _>(model, Precision::Full).unwrap();

        let shell = SequentialConfig::new(InputSpec::float([3]))
            .with_layer(DenseSpec::new(4).with_activation(Activation::Tanh))
            .with_layer(ActivationSpec::new(Activation::Relu))
            .with_layer(DenseSpec::new(2))
            .init::<TestBackend>(&device)
            .unwrap();

        let err = load_into::<TestBackend, _>(shell, bytes, &device).unwrap_err();
        assert!(
            matches!(err, WeightsError::LayoutMismatch { .. }),
            "unexpected error: {err}"
        );
    }
}

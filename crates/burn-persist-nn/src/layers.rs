//! Layer modules built from [`LayerConfig`]s

use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;

use crate::activation::Activation;
use crate::config::{FeatureShape, LayerConfig, Padding};
use crate::features::{Features, FloatOp};

/// Fully connected layer with an optional activation
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    pub linear: Linear<B>,
    #[module(skip)]
    pub activation: Activation,
}

/// 2D convolution with an optional activation
#[derive(Module, Debug)]
pub struct Conv2dLayer<B: Backend> {
    pub conv: Conv2d<B>,
    #[module(skip)]
    pub activation: Activation,
}

/// Collapse every dimension from `start_dim` on
#[derive(Module, Clone, Debug)]
pub struct FlattenLayer {
    pub start_dim: usize,
}

/// Layer normalization over the last dimension
#[derive(Module, Debug)]
pub struct LayerNormLayer<B: Backend> {
    pub gamma: Param<Tensor<B, 1>>,
    pub beta: Param<Tensor<B, 1>>,
    #[module(skip)]
    pub epsilon: f64,
}

impl<B: Backend> LayerNormLayer<B> {
    pub fn new(size: usize, epsilon: f64, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([size], device)),
            beta: Param::from_tensor(Tensor::zeros([size], device)),
            epsilon,
        }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let last_dim = D - 1;
        let mean = x.clone().mean_dim(last_dim);
        let var = x.clone().var_bias(last_dim);

        let x_norm = (x - mean) / (var + self.epsilon).sqrt();

        x_norm * self.gamma.val().unsqueeze() + self.beta.val().unsqueeze()
    }
}

impl<B: Backend> FloatOp<B> for LayerNormLayer<B> {
    fn apply<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.forward(x)
    }
}

/// Standalone activation layer
#[derive(Module, Clone, Debug)]
pub struct ActivationLayer {
    #[module(skip)]
    pub activation: Activation,
}

struct DropoutOp<'a>(&'a Dropout);

impl<B: Backend> FloatOp<B> for DropoutOp<'_> {
    fn apply<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.0.forward(x)
    }
}

/// One layer of a [`Sequential`](crate::Sequential)
#[derive(Module, Debug)]
pub enum Layer<B: Backend> {
    Dense(DenseLayer<B>),
    Conv2d(Conv2dLayer<B>),
    MaxPool2d(MaxPool2d),
    Flatten(FlattenLayer),
    Embedding(Embedding<B>),
    LayerNorm(LayerNormLayer<B>),
    Dropout(Dropout),
    Activation(ActivationLayer),
}

impl<B: Backend> Layer<B> {
    /// Build an untrained layer for a validated config and its input shape
    pub fn init(config: &LayerConfig, input: &FeatureShape, device: &B::Device) -> Self {
        let last = input.dims.last().copied().unwrap_or(0);
        match config {
            LayerConfig::Dense(spec) => Layer::Dense(DenseLayer {
                linear: LinearConfig::new(last, spec.units)
                    .with_bias(spec.use_bias)
                    .init(device),
                activation: spec.activation,
            }),
            LayerConfig::Conv2d(spec) => {
                let channels = input.dims.first().copied().unwrap_or(0);
                let padding = match spec.padding {
                    Padding::Valid => PaddingConfig2d::Valid,
                    Padding::Same => PaddingConfig2d::Same,
                };
                Layer::Conv2d(Conv2dLayer {
                    conv: Conv2dConfig::new([channels, spec.filters], [spec.kernel_size; 2])
                        .with_stride([spec.strides; 2])
                        .with_padding(padding)
                        .with_bias(spec.use_bias)
                        .init(device),
                    activation: spec.activation,
                })
            }
            LayerConfig::MaxPooling2d(spec) => Layer::MaxPool2d(
                MaxPool2dConfig::new([spec.pool_size; 2])
                    .with_strides([spec.stride(); 2])
                    .init(),
            ),
            LayerConfig::Flatten(_) => Layer::Flatten(FlattenLayer { start_dim: 1 }),
            LayerConfig::Embedding(spec) => {
                Layer::Embedding(EmbeddingConfig::new(spec.input_dim, spec.output_dim).init(device))
            }
            LayerConfig::LayerNorm(spec) => {
                Layer::LayerNorm(LayerNormLayer::new(last, spec.epsilon, device))
            }
            LayerConfig::Dropout(spec) => Layer::Dropout(DropoutConfig::new(spec.rate).init()),
            LayerConfig::Activation(spec) => Layer::Activation(ActivationLayer {
                activation: spec.activation,
            }),
        }
    }

    pub fn forward(&self, name: &str, x: Features<B>) -> Features<B> {
        match self {
            Layer::Dense(layer) => match x {
                Features::Flat(t) => Features::Flat(layer.activation.forward(layer.linear.forward(t))),
                Features::Sequence(t) => {
                    Features::Sequence(layer.activation.forward(layer.linear.forward(t)))
                }
                other => panic!("{name}: Dense expects flat or sequence features, got {}", other.kind()),
            },
            Layer::Conv2d(layer) => match x {
                Features::Image(t) => Features::Image(layer.activation.forward(layer.conv.forward(t))),
                other => panic!("{name}: Conv2D expects image features, got {}", other.kind()),
            },
            Layer::MaxPool2d(pool) => match x {
                Features::Image(t) => Features::Image(pool.forward(t)),
                other => panic!("{name}: MaxPooling2D expects image features, got {}", other.kind()),
            },
            Layer::Flatten(flatten) => match x {
                Features::Sequence(t) => Features::Flat(t.flatten(flatten.start_dim, 2)),
                Features::Image(t) => Features::Flat(t.flatten(flatten.start_dim, 3)),
                other => panic!("{name}: Flatten expects rank 3 or 4 features, got {}", other.kind()),
            },
            Layer::Embedding(embedding) => match x {
                Features::Tokens(ids) => Features::Sequence(embedding.forward(ids)),
                other => panic!("{name}: Embedding expects token ids, got {}", other.kind()),
            },
            Layer::LayerNorm(norm) => x.map_float(name, norm),
            Layer::Dropout(dropout) => x.map_float(name, &DropoutOp(dropout)),
            Layer::Activation(layer) => x.map_float(name, &layer.activation),
        }
    }
}

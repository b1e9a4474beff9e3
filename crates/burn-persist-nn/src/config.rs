//! Sequential architecture: input spec, layer specs and shape inference
//!
//! Layers serialize Keras style, as `{"class_name": ..., "config": {...}}`.
//! Shapes below never include the batch dimension.

use std::collections::HashSet;
use std::fmt;

use burn_persist::ArchitectureError;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

fn default_epsilon() -> f64 {
    1e-3
}

/// Element type of the model input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDtype {
    #[default]
    Float,
    /// Token ids, consumed by an `Embedding` first layer
    Int,
}

/// Shape and dtype of one input sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub shape: Vec<usize>,
    #[serde(default)]
    pub dtype: InputDtype,
}

impl InputSpec {
    pub fn float(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            shape: shape.into(),
            dtype: InputDtype::Float,
        }
    }

    /// Token ids of a fixed sequence length
    pub fn tokens(seq_len: usize) -> Self {
        Self {
            shape: vec![seq_len],
            dtype: InputDtype::Int,
        }
    }
}

/// Padding mode for `Conv2D`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    #[default]
    Valid,
    /// Output keeps the input's height and width; stride 1 and odd kernels only
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSpec {
    #[serde(default)]
    pub name: String,
    pub units: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_true")]
    pub use_bias: bool,
}

impl DenseSpec {
    pub fn new(units: usize) -> Self {
        Self {
            name: String::new(),
            units,
            activation: Activation::Linear,
            use_bias: true,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2dSpec {
    #[serde(default)]
    pub name: String,
    pub filters: usize,
    pub kernel_size: usize,
    #[serde(default = "default_one")]
    pub strides: usize,
    #[serde(default)]
    pub padding: Padding,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_true")]
    pub use_bias: bool,
}

impl Conv2dSpec {
    pub fn new(filters: usize, kernel_size: usize) -> Self {
        Self {
            name: String::new(),
            filters,
            kernel_size,
            strides: 1,
            padding: Padding::Valid,
            activation: Activation::Linear,
            use_bias: true,
        }
    }

    pub fn with_strides(mut self, strides: usize) -> Self {
        self.strides = strides;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxPooling2dSpec {
    #[serde(default)]
    pub name: String,
    pub pool_size: usize,
    /// Defaults to `pool_size`
    #[serde(default)]
    pub strides: Option<usize>,
}

impl MaxPooling2dSpec {
    pub fn new(pool_size: usize) -> Self {
        Self {
            name: String::new(),
            pool_size,
            strides: None,
        }
    }

    pub fn with_strides(mut self, strides: usize) -> Self {
        self.strides = Some(strides);
        self
    }

    pub fn stride(&self) -> usize {
        self.strides.unwrap_or(self.pool_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenSpec {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    #[serde(default)]
    pub name: String,
    /// Vocabulary size
    pub input_dim: usize,
    pub output_dim: usize,
}

impl EmbeddingSpec {
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            name: String::new(),
            input_dim,
            output_dim,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNormSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for LayerNormSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            epsilon: default_epsilon(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropoutSpec {
    #[serde(default)]
    pub name: String,
    pub rate: f64,
}

impl DropoutSpec {
    pub fn new(rate: f64) -> Self {
        Self {
            name: String::new(),
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationSpec {
    #[serde(default)]
    pub name: String,
    pub activation: Activation,
}

impl ActivationSpec {
    pub fn new(activation: Activation) -> Self {
        Self {
            name: String::new(),
            activation,
        }
    }
}

/// One layer of a sequential stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class_name", content = "config")]
pub enum LayerConfig {
    Dense(DenseSpec),
    #[serde(rename = "Conv2D")]
    Conv2d(Conv2dSpec),
    #[serde(rename = "MaxPooling2D")]
    MaxPooling2d(MaxPooling2dSpec),
    Flatten(FlattenSpec),
    Embedding(EmbeddingSpec),
    #[serde(rename = "LayerNormalization")]
    LayerNorm(LayerNormSpec),
    Dropout(DropoutSpec),
    Activation(ActivationSpec),
}

macro_rules! impl_from_spec {
    ($($spec:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$spec> for LayerConfig {
                fn from(spec: $spec) -> Self {
                    LayerConfig::$variant(spec)
                }
            }
        )*
    };
}

impl_from_spec! {
    DenseSpec => Dense,
    Conv2dSpec => Conv2d,
    MaxPooling2dSpec => MaxPooling2d,
    FlattenSpec => Flatten,
    EmbeddingSpec => Embedding,
    LayerNormSpec => LayerNorm,
    DropoutSpec => Dropout,
    ActivationSpec => Activation,
}

/// Shape of the features between two layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureShape {
    pub dims: Vec<usize>,
    pub dtype: InputDtype,
}

impl FeatureShape {
    fn float(dims: Vec<usize>) -> Self {
        Self {
            dims,
            dtype: InputDtype::Float,
        }
    }
}

impl fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)?;
        if self.dtype == InputDtype::Int {
            write!(f, " int")?;
        }
        Ok(())
    }
}

impl LayerConfig {
    pub fn name(&self) -> &str {
        match self {
            LayerConfig::Dense(s) => &s.name,
            LayerConfig::Conv2d(s) => &s.name,
            LayerConfig::MaxPooling2d(s) => &s.name,
            LayerConfig::Flatten(s) => &s.name,
            LayerConfig::Embedding(s) => &s.name,
            LayerConfig::LayerNorm(s) => &s.name,
            LayerConfig::Dropout(s) => &s.name,
            LayerConfig::Activation(s) => &s.name,
        }
    }

    fn name_mut(&mut self) -> &mut String {
        match self {
            LayerConfig::Dense(s) => &mut s.name,
            LayerConfig::Conv2d(s) => &mut s.name,
            LayerConfig::MaxPooling2d(s) => &mut s.name,
            LayerConfig::Flatten(s) => &mut s.name,
            LayerConfig::Embedding(s) => &mut s.name,
            LayerConfig::LayerNorm(s) => &mut s.name,
            LayerConfig::Dropout(s) => &mut s.name,
            LayerConfig::Activation(s) => &mut s.name,
        }
    }

    /// Rename the layer
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        *self.name_mut() = name.into();
        self
    }

    /// Keras class name, as written to the architecture document
    pub fn class_name(&self) -> &'static str {
        match self {
            LayerConfig::Dense(_) => "Dense",
            LayerConfig::Conv2d(_) => "Conv2D",
            LayerConfig::MaxPooling2d(_) => "MaxPooling2D",
            LayerConfig::Flatten(_) => "Flatten",
            LayerConfig::Embedding(_) => "Embedding",
            LayerConfig::LayerNorm(_) => "LayerNormalization",
            LayerConfig::Dropout(_) => "Dropout",
            LayerConfig::Activation(_) => "Activation",
        }
    }

    /// Prefix used when auto-naming layers
    pub fn base_name(&self) -> &'static str {
        match self {
            LayerConfig::Dense(_) => "dense",
            LayerConfig::Conv2d(_) => "conv2d",
            LayerConfig::MaxPooling2d(_) => "max_pooling2d",
            LayerConfig::Flatten(_) => "flatten",
            LayerConfig::Embedding(_) => "embedding",
            LayerConfig::LayerNorm(_) => "layer_normalization",
            LayerConfig::Dropout(_) => "dropout",
            LayerConfig::Activation(_) => "activation",
        }
    }

    /// Output shape for `input`, or why the layer cannot accept it
    pub fn output_shape(
        &self,
        input: &FeatureShape,
        is_first: bool,
    ) -> Result<FeatureShape, ArchitectureError> {
        let name = self.name();
        let invalid = |reason: String| ArchitectureError::invalid_layer(name, reason);

        if input.dtype == InputDtype::Int && !matches!(self, LayerConfig::Embedding(_)) {
            return Err(invalid(format!(
                "{} cannot consume token ids; start with an Embedding layer",
                self.class_name()
            )));
        }

        match self {
            LayerConfig::Dense(spec) => {
                if spec.units == 0 {
                    return Err(invalid("units must be positive".into()));
                }
                if input.dims.len() > 2 {
                    return Err(invalid(format!(
                        "expects rank 1 or 2 input, got {}",
                        input
                    )));
                }
                let mut dims = input.dims.clone();
                if let Some(last) = dims.last_mut() {
                    *last = spec.units;
                }
                Ok(FeatureShape::float(dims))
            }
            LayerConfig::Conv2d(spec) => {
                let [_, height, width] = image_dims(input).map_err(invalid)?;
                if spec.filters == 0 || spec.kernel_size == 0 || spec.strides == 0 {
                    return Err(invalid(
                        "filters, kernel_size and strides must be positive".into(),
                    ));
                }
                match spec.padding {
                    Padding::Same => {
                        if spec.strides != 1 {
                            return Err(invalid("same padding requires strides of 1".into()));
                        }
                        if spec.kernel_size % 2 == 0 {
                            return Err(invalid("same padding requires an odd kernel".into()));
                        }
                        Ok(FeatureShape::float(vec![spec.filters, height, width]))
                    }
                    Padding::Valid => {
                        let h = window_out(height, spec.kernel_size, spec.strides).map_err(invalid)?;
                        let w = window_out(width, spec.kernel_size, spec.strides).map_err(invalid)?;
                        Ok(FeatureShape::float(vec![spec.filters, h, w]))
                    }
                }
            }
            LayerConfig::MaxPooling2d(spec) => {
                let [channels, height, width] = image_dims(input).map_err(invalid)?;
                if spec.pool_size == 0 || spec.stride() == 0 {
                    return Err(invalid("pool_size and strides must be positive".into()));
                }
                let h = window_out(height, spec.pool_size, spec.stride()).map_err(invalid)?;
                let w = window_out(width, spec.pool_size, spec.stride()).map_err(invalid)?;
                Ok(FeatureShape::float(vec![channels, h, w]))
            }
            LayerConfig::Flatten(_) => {
                if input.dims.len() < 2 {
                    return Err(invalid(format!("expects rank 2 or more, got {}", input)));
                }
                Ok(FeatureShape::float(vec![input.dims.iter().product()]))
            }
            LayerConfig::Embedding(spec) => {
                if !is_first || input.dtype != InputDtype::Int {
                    return Err(invalid(
                        "must be the first layer and consume int token ids".into(),
                    ));
                }
                if spec.input_dim == 0 || spec.output_dim == 0 {
                    return Err(invalid("input_dim and output_dim must be positive".into()));
                }
                if input.dims.len() != 1 {
                    return Err(invalid(format!("expects [seq_len] input, got {}", input)));
                }
                Ok(FeatureShape::float(vec![input.dims[0], spec.output_dim]))
            }
            LayerConfig::LayerNorm(spec) => {
                if spec.epsilon <= 0.0 {
                    return Err(invalid("epsilon must be positive".into()));
                }
                Ok(input.clone())
            }
            LayerConfig::Dropout(spec) => {
                if !(0.0..1.0).contains(&spec.rate) {
                    return Err(invalid(format!("rate {} outside [0, 1)", spec.rate)));
                }
                Ok(input.clone())
            }
            LayerConfig::Activation(_) => Ok(input.clone()),
        }
    }

    /// Number of trainable values for `input`
    pub fn param_count(&self, input: &FeatureShape) -> usize {
        let last = input.dims.last().copied().unwrap_or(0);
        match self {
            LayerConfig::Dense(spec) => last * spec.units + usize::from(spec.use_bias) * spec.units,
            LayerConfig::Conv2d(spec) => {
                let channels = input.dims.first().copied().unwrap_or(0);
                spec.filters * channels * spec.kernel_size * spec.kernel_size
                    + usize::from(spec.use_bias) * spec.filters
            }
            LayerConfig::Embedding(spec) => spec.input_dim * spec.output_dim,
            LayerConfig::LayerNorm(_) => 2 * last,
            _ => 0,
        }
    }
}

fn image_dims(input: &FeatureShape) -> Result<[usize; 3], String> {
    match input.dims.as_slice() {
        &[c, h, w] => Ok([c, h, w]),
        _ => Err(format!("expects [channels, height, width], got {}", input)),
    }
}

fn window_out(size: usize, window: usize, stride: usize) -> Result<usize, String> {
    if window > size {
        return Err(format!("window {} larger than input size {}", window, size));
    }
    Ok((size - window) / stride + 1)
}

/// Per-layer line of [`SequentialConfig::summary`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub class_name: &'static str,
    pub output_shape: FeatureShape,
    pub params: usize,
}

/// Architecture of a [`Sequential`](crate::Sequential) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialConfig {
    pub input: InputSpec,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl SequentialConfig {
    pub fn new(input: InputSpec) -> Self {
        Self {
            input,
            layers: Vec::new(),
        }
    }

    /// Append a layer, naming it `dense`, `dense_1`, ... if it has no name
    pub fn with_layer(mut self, layer: impl Into<LayerConfig>) -> Self {
        let mut layer = layer.into();
        if layer.name().is_empty() {
            let base = layer.base_name();
            let mut index = self
                .layers
                .iter()
                .filter(|l| l.base_name() == base)
                .count();
            let mut candidate = unique_name(base, index);
            while self.layers.iter().any(|l| l.name() == candidate) {
                index += 1;
                candidate = unique_name(base, index);
            }
            *layer.name_mut() = candidate;
        }
        self.layers.push(layer);
        self
    }

    fn input_shape(&self) -> FeatureShape {
        FeatureShape {
            dims: self.input.shape.clone(),
            dtype: self.input.dtype,
        }
    }

    /// Input shape of every layer followed by the model output shape
    pub fn shapes(&self) -> Result<Vec<FeatureShape>, ArchitectureError> {
        if self.input.shape.is_empty() || self.input.shape.contains(&0) {
            return Err(ArchitectureError::invalid_layer(
                "input",
                format!("shape {:?} must be non-empty and positive", self.input.shape),
            ));
        }
        if self.input.shape.len() > 3 {
            return Err(ArchitectureError::invalid_layer(
                "input",
                format!("shape {:?} has more than 3 dims", self.input.shape),
            ));
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if layer.name().is_empty() {
                return Err(ArchitectureError::invalid_layer(
                    layer.class_name(),
                    "layer name is empty",
                ));
            }
            if !seen.insert(layer.name()) {
                return Err(ArchitectureError::invalid_layer(
                    layer.name(),
                    "duplicate layer name",
                ));
            }
        }

        let mut shapes = vec![self.input_shape()];
        for (i, layer) in self.layers.iter().enumerate() {
            let next = layer.output_shape(&shapes[i], i == 0)?;
            shapes.push(next);
        }

        if let Some(last) = shapes.last() {
            if last.dtype == InputDtype::Int {
                return Err(ArchitectureError::invalid_layer(
                    "input",
                    "token ids must pass through an Embedding layer",
                ));
            }
        }
        Ok(shapes)
    }

    /// Validate the stack and return its output shape
    pub fn output_shape(&self) -> Result<FeatureShape, ArchitectureError> {
        let mut shapes = self.shapes()?;
        // shapes always holds at least the input
        Ok(shapes.pop().unwrap_or_else(|| self.input_shape()))
    }

    pub fn summary(&self) -> Result<Vec<LayerSummary>, ArchitectureError> {
        let shapes = self.shapes()?;
        Ok(self
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerSummary {
                name: layer.name().to_string(),
                class_name: layer.class_name(),
                output_shape: shapes[i + 1].clone(),
                params: layer.param_count(&shapes[i]),
            })
            .collect())
    }

    /// Total trainable values
    pub fn param_count(&self) -> Result<usize, ArchitectureError> {
        Ok(self.summary()?.iter().map(|l| l.params).sum())
    }
}

fn unique_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, index)
    }
}

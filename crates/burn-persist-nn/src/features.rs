//! Rank-tagged tensors flowing between layers

use burn::prelude::*;
use burn::tensor::DataError;

/// Batched input or intermediate output of a [`Sequential`](crate::Sequential)
///
/// The batch dimension is always first.
#[derive(Debug, Clone)]
pub enum Features<B: Backend> {
    /// Token ids, `[batch, seq]`
    Tokens(Tensor<B, 2, Int>),
    /// `[batch, features]`
    Flat(Tensor<B, 2>),
    /// `[batch, seq, features]`
    Sequence(Tensor<B, 3>),
    /// `[batch, channels, height, width]`
    Image(Tensor<B, 4>),
}

/// A rank-polymorphic float operation
pub(crate) trait FloatOp<B: Backend> {
    fn apply<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D>;
}

impl<B: Backend> Features<B> {
    /// Shape including the batch dimension
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Features::Tokens(t) => t.dims().to_vec(),
            Features::Flat(t) => t.dims().to_vec(),
            Features::Sequence(t) => t.dims().to_vec(),
            Features::Image(t) => t.dims().to_vec(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Features::Tokens(_) => "tokens",
            Features::Flat(_) => "flat",
            Features::Sequence(_) => "sequence",
            Features::Image(_) => "image",
        }
    }

    /// Flat values in row-major order, widened to f32
    pub fn to_vec(&self) -> Result<Vec<f32>, DataError> {
        let data = match self {
            Features::Tokens(t) => t.to_data().convert::<f32>(),
            Features::Flat(t) => t.to_data().convert::<f32>(),
            Features::Sequence(t) => t.to_data().convert::<f32>(),
            Features::Image(t) => t.to_data().convert::<f32>(),
        };
        data.to_vec::<f32>()
    }

    pub(crate) fn map_float(self, layer: &str, op: &impl FloatOp<B>) -> Self {
        match self {
            Features::Flat(t) => Features::Flat(op.apply(t)),
            Features::Sequence(t) => Features::Sequence(op.apply(t)),
            Features::Image(t) => Features::Image(op.apply(t)),
            Features::Tokens(_) => panic!("{layer}: expected float features, got token ids"),
        }
    }
}

impl<B: Backend> From<Tensor<B, 2, Int>> for Features<B> {
    fn from(t: Tensor<B, 2, Int>) -> Self {
        Features::Tokens(t)
    }
}

impl<B: Backend> From<Tensor<B, 2>> for Features<B> {
    fn from(t: Tensor<B, 2>) -> Self {
        Features::Flat(t)
    }
}

impl<B: Backend> From<Tensor<B, 3>> for Features<B> {
    fn from(t: Tensor<B, 3>) -> Self {
        Features::Sequence(t)
    }
}

impl<B: Backend> From<Tensor<B, 4>> for Features<B> {
    fn from(t: Tensor<B, 4>) -> Self {
        Features::Image(t)
    }
}

//! Activation functions referenced by name in layer configs

use burn::prelude::*;
use burn::tensor::activation;
use serde::{Deserialize, Serialize};

use crate::features::FloatOp;

/// Elementwise activation, serialized by its lowercase name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity
    #[default]
    Linear,
    Relu,
    Gelu,
    Sigmoid,
    Tanh,
    /// Softmax over the last dimension
    Softmax,
}

impl Activation {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Linear => x,
            Activation::Relu => activation::relu(x),
            Activation::Gelu => activation::gelu(x),
            Activation::Sigmoid => activation::sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::Softmax => activation::softmax(x, D - 1),
        }
    }
}

impl<B: Backend> FloatOp<B> for Activation {
    fn apply<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.forward(x)
    }
}

//! Keras-style sequential models for burn-persist
//!
//! A [`Sequential`] is a stack of layers described by a
//! [`SequentialConfig`]. The config is the model's architecture document;
//! the layers' parameters go to the weights container under their position
//! in the stack, e.g. `layers.2.Dense.linear.weight`.
//!
//! ```ignore
//! use burn_persist::{load_model, save_model};
//! use burn_persist_nn::{Activation, DenseSpec, InputSpec, Sequential, SequentialConfig};
//!
//! let config = SequentialConfig::new(InputSpec::float([784]))
//!     .with_layer(DenseSpec::new(128).with_activation(Activation::Relu))
//!     .with_layer(DenseSpec::new(10).with_activation(Activation::Softmax));
//! let model = config.init::<MyBackend>(&device)?;
//!
//! save_model(&model, "models/mnist")?;
//! let restored: Sequential<MyBackend> = load_model("models/mnist", &device)?;
//! ```
//!
//! # Layers
//!
//! | Class | Parameters |
//! |---|---|
//! | `Dense` | `weight [in, units]`, `bias [units]` |
//! | `Conv2D` | `weight [filters, channels, k, k]`, `bias [filters]` |
//! | `MaxPooling2D` | - |
//! | `Flatten` | - |
//! | `Embedding` | `weight [input_dim, output_dim]` |
//! | `LayerNormalization` | `gamma [d]`, `beta [d]` |
//! | `Dropout` | - |
//! | `Activation` | - |

pub mod activation;
pub mod config;
pub mod features;
pub mod layers;
pub mod sequential;

pub use activation::Activation;
pub use config::{
    ActivationSpec, Conv2dSpec, DenseSpec, DropoutSpec, EmbeddingSpec, FeatureShape, FlattenSpec,
    InputDtype, InputSpec, LayerConfig, LayerNormSpec, LayerSummary, MaxPooling2dSpec, Padding,
    SequentialConfig,
};
pub use features::Features;
pub use layers::Layer;
pub use sequential::Sequential;

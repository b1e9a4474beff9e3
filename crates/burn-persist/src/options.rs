//! Save options

use crate::weights::Precision;

/// Options for [`save_model_with`](crate::save_model_with)
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Storage precision of the weights container
    pub precision: Precision,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

//! Weights container
//!
//! The binary half of a persisted model: the module's record, written by
//! burn's named MessagePack recorder. Entries are keyed by the module's field
//! path (`fc1.weight`, `layers.0.Dense.linear.bias`, ...), so the mapping
//! from parameters to stored tensors comes from `#[derive(Module)]`.
//!
//! Loading checks the stored record against the shell before applying it:
//! the same fields, the same number of entries in every `Vec`, the same enum
//! variants and the same tensor shapes.

use burn::prelude::*;
use burn::record::{
    FullPrecisionSettings, HalfPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder,
    RecorderError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeightsError {
    /// Error from the Burn recorder, including undecodable containers
    #[error("Record error: {0}")]
    Record(#[from] RecorderError),

    #[error("Failed to inspect record: {0}")]
    Inspect(#[from] serde_json::Error),

    #[error("Layout mismatch at {name}: model has {expected}, container holds {found}")]
    LayoutMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Parameter count mismatch: model has {expected}, container holds {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },
}

/// Storage precision of the weights container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// f32 weights
    #[default]
    Full,
    /// f16 weights, roughly half the file size
    Half,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Full => "full",
            Precision::Half => "half",
        }
    }
}

/// Create a recorder for full precision (f32) containers
pub fn full_precision_recorder() -> NamedMpkBytesRecorder<FullPrecisionSettings> {
    NamedMpkBytesRecorder::new()
}

/// Create a recorder for half precision (f16) containers
pub fn half_precision_recorder() -> NamedMpkBytesRecorder<HalfPrecisionSettings> {
    NamedMpkBytesRecorder::new()
}

/// Serialize a module's parameters at the given precision
pub fn to_bytes<B: Backend, M: Module<B>>(
    module: M,
    precision: Precision,
) -> Result<Vec<u8>, WeightsError> {
    let record = module.into_record();
    let bytes = match precision {
        Precision::Full => Recorder::<B>::record(&full_precision_recorder(), record, ())?,
        Precision::Half => Recorder::<B>::record(&half_precision_recorder(), record, ())?,
    };
    Ok(bytes)
}

/// Fill `shell` with the parameters stored in `bytes`
///
/// Containers of either precision load; values are widened to the backend's
/// float type.
pub fn load_into<B: Backend, M: Module<B>>(
    shell: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M, WeightsError> {
    // Full precision settings read half precision records too, the element
    // type travels with each tensor
    let record: M::Record = Recorder::<B>::load(&full_precision_recorder(), bytes, device)?;

    let found = Record::<B>::into_item::<FullPrecisionSettings>(record);
    let expected = Record::<B>::into_item::<FullPrecisionSettings>(shell.clone().into_record());
    check_layout(
        &serde_json::to_value(&expected)?,
        &serde_json::to_value(&found)?,
        &mut Vec::new(),
    )?;

    let record = <M::Record as Record<B>>::from_item::<FullPrecisionSettings>(found, device);
    let expected = shell.num_params();
    let model = shell.load_record(record);
    let actual = model.num_params();
    if actual != expected {
        return Err(WeightsError::ParamCountMismatch { expected, actual });
    }

    Ok(model)
}

/// Compare two serialized records field by field, ignoring tensor contents
fn check_layout(
    expected: &Value,
    found: &Value,
    path: &mut Vec<String>,
) -> Result<(), WeightsError> {
    match (expected, found) {
        (Value::Object(e), Value::Object(f)) => {
            if e.len() != f.len() || e.keys().any(|key| !f.contains_key(key)) {
                return Err(layout_mismatch(path, expected, found));
            }
            let mut keys: Vec<&String> = e.keys().collect();
            keys.sort();
            for key in keys {
                let (e_value, f_value) = (&e[key], &f[key]);
                match key.as_str() {
                    // tensor payload and parameter ids differ between any two models
                    "bytes" | "dtype" | "id" => {}
                    "shape" => {
                        if e_value != f_value {
                            return Err(WeightsError::ShapeMismatch {
                                name: join(path),
                                expected: dims(e_value),
                                actual: dims(f_value),
                            });
                        }
                    }
                    "param" => check_layout(e_value, f_value, path)?,
                    _ => {
                        path.push(key.clone());
                        check_layout(e_value, f_value, path)?;
                        path.pop();
                    }
                }
            }
            Ok(())
        }
        (Value::Array(e), Value::Array(f)) => {
            if is_numeric(e) && is_numeric(f) {
                return Ok(());
            }
            if e.len() != f.len() {
                return Err(layout_mismatch(path, expected, found));
            }
            for (i, (e_item, f_item)) in e.iter().zip(f).enumerate() {
                path.push(i.to_string());
                check_layout(e_item, f_item, path)?;
                path.pop();
            }
            Ok(())
        }
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
            Err(layout_mismatch(path, expected, found))
        }
        _ => Ok(()),
    }
}

fn layout_mismatch(path: &[String], expected: &Value, found: &Value) -> WeightsError {
    WeightsError::LayoutMismatch {
        name: join(path),
        expected: describe(expected),
        found: describe(found),
    }
}

fn join(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("{{{}}}", map.keys().cloned().collect::<Vec<_>>().join(", ")),
        Value::Array(items) => format!("{} entries", items.len()),
        Value::Null => "nothing".to_string(),
        _ => "a value".to_string(),
    }
}

fn dims(value: &Value) -> Vec<usize> {
    value
        .as_array()
        .map(|shape| shape.iter().filter_map(Value::as_u64).map(|d| d as usize).collect())
        .unwrap_or_default()
}

fn is_numeric(values: &[Value]) -> bool {
    values.iter().all(Value::is_number)
}

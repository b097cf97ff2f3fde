//! GBDT model wrapper for defect classification
//!
//! Wraps the `gbdt` crate to provide:
//! - Model loading from gbdt-rs native JSON
//! - Single-instance inference over classifier inputs
//!
//! Label convention follows the `LogLikelyhood` loss: 1.0 is defective,
//! -1.0 is clean, and the model output is P(defective).
//!
//! Note: the gbdt crate internally uses `f32` (`ValueType`), while instances
//! store `f64`. Conversions happen at the crate boundary. Missing inputs are
//! passed as `VALUE_TYPE_UNKNOWN` so the trees take their missing branch;
//! ±inf and NaN go through unchanged and land on the outlier side of splits.
//! `VALUE_TYPE_UNKNOWN` is `f32::MIN`, so a real value that rounds to
//! `f32::MIN` is indistinguishable from a missing one.
//!
//! gbdt-rs has no accessor for the fitted feature count. It is read once from
//! the serialized `conf.feature_size` and used as the model's input width.

use std::panic::{self, AssertUnwindSafe};

use gbdt::decision_tree::{Data, ValueType, VALUE_TYPE_UNKNOWN};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use super::model::ProbabilityModel;
use super::{ClassificationError, ModelLoadError};

#[inline]
fn inputs_to_f32(inputs: &[Option<f64>]) -> Vec<ValueType> {
    inputs
        .iter()
        .map(|v| match v {
            Some(x) => *x as ValueType,
            None => VALUE_TYPE_UNKNOWN,
        })
        .collect()
}

/// Fitted feature count recorded in the model config; 0 means unrecorded.
fn recorded_feature_size(model: &GBDT) -> Option<usize> {
    let value = serde_json::to_value(model).ok()?;
    value
        .get("conf")?
        .get("feature_size")?
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|&n| n > 0)
}

#[derive(Deserialize)]
struct StoredGbdt {
    model: GBDT,
}

impl From<StoredGbdt> for GbdtClassifier {
    fn from(stored: StoredGbdt) -> Self {
        Self::from_trained(stored.model)
    }
}

/// Thin wrapper around `gbdt::gradient_boost::GBDT`.
#[derive(Serialize, Deserialize)]
#[serde(from = "StoredGbdt")]
pub struct GbdtClassifier {
    model: GBDT,
    #[serde(skip)]
    feature_size: Option<usize>,
}

impl std::fmt::Debug for GbdtClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbdtClassifier").finish_non_exhaustive()
    }
}

impl GbdtClassifier {
    /// Load a model from a JSON string (gbdt-rs native format).
    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let model: GBDT = serde_json::from_str(json)?;
        Ok(Self::from_trained(model))
    }

    /// Wrap an already-trained `GBDT` instance.
    pub fn from_trained(model: GBDT) -> Self {
        let feature_size = recorded_feature_size(&model);
        Self {
            model,
            feature_size,
        }
    }

    /// Return a reference to the underlying GBDT model.
    pub fn inner(&self) -> &GBDT {
        &self.model
    }
}

impl ProbabilityModel for GbdtClassifier {
    fn input_size(&self) -> Option<usize> {
        self.feature_size
    }

    fn probability(&self, inputs: &[Option<f64>]) -> Result<f64, ClassificationError> {
        if let Some(expected) = self.feature_size {
            if inputs.len() != expected {
                return Err(ClassificationError::InputSize {
                    expected,
                    found: inputs.len(),
                });
            }
        }

        let data = vec![Data::new_test_data(inputs_to_f32(inputs), None)];

        // gbdt indexes feature vectors without bounds checks
        let preds = panic::catch_unwind(AssertUnwindSafe(|| self.model.predict(&data)))
            .map_err(|_| ClassificationError::Model("GBDT inference panicked".into()))?;

        preds
            .first()
            .map(|&p| p as f64)
            .ok_or_else(|| ClassificationError::Model("GBDT returned no prediction".into()))
    }
}

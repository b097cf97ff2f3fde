//! Probabilistic defect classifiers
//!
//! Two model kinds are supported, both persisted as JSON:
//! - `logistic`: weights over the raw features (pure Rust)
//! - `gbdt`: gradient boosted trees via the `gbdt` crate
//!
//! [`Classifier`] pairs a model with the feature columns it was fitted on and
//! refuses instances built against any other schema.

use serde::{Deserialize, Serialize};

use super::features::{Schema, LABEL_FEATURE};
use super::gbdt_model::GbdtClassifier;
use super::instance::Instance;
use super::{ClassificationError, ModelLoadError};

/// A fitted model turning classifier inputs into P(defective).
pub trait ProbabilityModel: Send + Sync {
    /// Number of inputs the model was fitted on, if the model records it
    fn input_size(&self) -> Option<usize>;

    /// Probability of class 1 (defective). `inputs` excludes the label column.
    fn probability(&self, inputs: &[Option<f64>]) -> Result<f64, ClassificationError>;
}

/// Logistic regression over the raw feature columns
///
/// Missing and non-finite inputs are replaced by the training mean of the
/// column before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    intercept: f64,
    weights: Vec<f64>,
    means: Vec<f64>,
}

impl LogisticClassifier {
    pub fn new(intercept: f64, weights: Vec<f64>, means: Vec<f64>) -> Self {
        Self {
            intercept,
            weights,
            means,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    fn validate(&self) -> Result<(), String> {
        if self.weights.len() != self.means.len() {
            return Err(format!(
                "logistic model has {} weights but {} means",
                self.weights.len(),
                self.means.len()
            ));
        }
        let all_finite = std::iter::once(&self.intercept)
            .chain(&self.weights)
            .chain(&self.means)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err("logistic model parameters must be finite".into());
        }
        Ok(())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ProbabilityModel for LogisticClassifier {
    fn input_size(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn probability(&self, inputs: &[Option<f64>]) -> Result<f64, ClassificationError> {
        if inputs.len() != self.weights.len() {
            return Err(ClassificationError::InputSize {
                expected: self.weights.len(),
                found: inputs.len(),
            });
        }

        let z = self
            .weights
            .iter()
            .zip(&self.means)
            .zip(inputs)
            .fold(self.intercept, |acc, ((w, mean), x)| {
                let x = x.filter(|v| v.is_finite()).unwrap_or(*mean);
                acc + w * x
            });

        Ok(sigmoid(z))
    }
}

/// Serializable model, tagged by `kind`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    Logistic(LogisticClassifier),
    Gbdt(GbdtClassifier),
}

impl ClassifierModel {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::Logistic(_) => "logistic",
            ClassifierModel::Gbdt(_) => "gbdt",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ClassifierModel::Logistic(m) => m.validate(),
            ClassifierModel::Gbdt(_) => Ok(()),
        }
    }

    fn as_model(&self) -> &dyn ProbabilityModel {
        match self {
            ClassifierModel::Logistic(m) => m,
            ClassifierModel::Gbdt(m) => m,
        }
    }
}

impl ProbabilityModel for ClassifierModel {
    fn input_size(&self) -> Option<usize> {
        self.as_model().input_size()
    }

    fn probability(&self, inputs: &[Option<f64>]) -> Result<f64, ClassificationError> {
        self.as_model().probability(inputs)
    }
}

impl From<LogisticClassifier> for ClassifierModel {
    fn from(model: LogisticClassifier) -> Self {
        ClassifierModel::Logistic(model)
    }
}

impl From<GbdtClassifier> for ClassifierModel {
    fn from(model: GbdtClassifier) -> Self {
        ClassifierModel::Gbdt(model)
    }
}

/// A model bound to the feature columns it was fitted on
#[derive(Debug)]
pub struct Classifier {
    feature_names: Vec<String>,
    model: ClassifierModel,
}

impl Classifier {
    /// Bind `model` to `feature_names` (label column included, in schema order).
    pub fn new(
        feature_names: Vec<String>,
        model: impl Into<ClassifierModel>,
    ) -> Result<Self, ModelLoadError> {
        let model = model.into();
        model.validate().map_err(ModelLoadError::Inconsistent)?;

        let inputs = feature_names
            .iter()
            .filter(|n| n.as_str() != LABEL_FEATURE)
            .count();
        if let Some(size) = model.input_size() {
            if size != inputs {
                return Err(ModelLoadError::Inconsistent(format!(
                    "{} model expects {} inputs but the schema has {} features",
                    model.kind(),
                    size,
                    inputs
                )));
            }
        }

        Ok(Self {
            feature_names,
            model,
        })
    }

    /// Bind `model` to the columns of `schema`
    pub fn for_schema(
        schema: &Schema,
        model: impl Into<ClassifierModel>,
    ) -> Result<Self, ModelLoadError> {
        Self::new(schema.feature_names(), model)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    fn check_schema(&self, schema: &Schema) -> Result<(), ClassificationError> {
        if schema.len() != self.feature_names.len() {
            return Err(ClassificationError::SchemaMismatch(format!(
                "expected {} features, found {}",
                self.feature_names.len(),
                schema.len()
            )));
        }
        let mismatch = self
            .feature_names
            .iter()
            .zip(schema.names())
            .enumerate()
            .find(|(_, (expected, found))| expected.as_str() != *found);
        if let Some((idx, (expected, found))) = mismatch {
            return Err(ClassificationError::SchemaMismatch(format!(
                "column {idx} is '{found}', expected '{expected}'"
            )));
        }
        Ok(())
    }

    /// Probability that the instance is defective, in `[0, 1]`.
    pub fn predict(&self, instance: &Instance<'_>) -> Result<f64, ClassificationError> {
        self.check_schema(instance.schema())?;
        let p = self.model.probability(&instance.inputs())?;
        if !p.is_finite() {
            return Err(ClassificationError::NonFiniteOutput(p));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

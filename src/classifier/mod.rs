//! Defect classification for measured methods
//!
//! Pipeline: raw metrics → feature registry → instance → classifier + rules.
//!
//! - [`features`] fixes the schema: which feature is derived from which
//!   metrics, and in which column order the models expect them.
//! - [`instance`] turns one method's metrics into a feature vector.
//! - [`model`] / [`gbdt_model`] score an instance with P(defective).
//! - [`rules`] explains an instance with the messages of matching rules.

pub mod features;
pub mod gbdt_model;
pub mod instance;
pub mod model;
pub mod rules;

pub use features::{Converter, FeatureSpec, Schema, LABEL_FEATURE, NUM_FEATURES};
pub use gbdt_model::GbdtClassifier;
pub use instance::{build_instance, build_instances, Instance};
pub use model::{Classifier, ClassifierModel, LogisticClassifier, ProbabilityModel};
pub use rules::{Condition, Rule, RuleSet, Statement, DEFAULT_COMMENT};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a predictor or model artifact
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Predictor resource wasn't found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read predictor from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't read predictor because it has unexpected format: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Not a fault predictor bundle (format '{0}')")]
    UnrecognizedFormat(String),

    #[error("Unsupported predictor bundle version {found} (supported: {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Inconsistent predictor: {0}")]
    Inconsistent(String),
}

/// Errors raised while turning an instance into a prediction
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Instance schema does not match the classifier: {0}")]
    SchemaMismatch(String),

    #[error("Model expects {expected} inputs, got {found}")]
    InputSize { expected: usize, found: usize },

    #[error("Model produced a non-finite probability ({0})")]
    NonFiniteOutput(f64),

    #[error("Model evaluation failed: {0}")]
    Model(String),

    #[error("Error occurred during classification of '{object}': {source}")]
    Batch {
        object: String,
        #[source]
        source: Box<ClassificationError>,
    },
}

impl ClassificationError {
    /// The innermost error, unwrapping batch context
    pub fn root_cause(&self) -> &ClassificationError {
        match self {
            ClassificationError::Batch { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

//! Configuration for fault predictions
//!
//! This module handles:
//! - Which predictor bundle to use (bundled default or an explicit file)
//! - Parallel analysis threshold

mod user_config;

pub use user_config::{PredictorConfig, MODEL_ENV, PARALLEL_THRESHOLD_ENV};

use std::ops::Deref;

use tracing::debug;

use crate::classifier::ModelLoadError;
use crate::predictor::FaultPredictor;

/// Predictor selected by a [`PredictorConfig`]
#[derive(Debug)]
pub enum PredictorHandle {
    /// Process-wide bundled predictor
    Default(&'static FaultPredictor),
    /// Predictor read from `model_path`, owned by the caller
    Loaded(Box<FaultPredictor>),
}

impl Deref for PredictorHandle {
    type Target = FaultPredictor;

    fn deref(&self) -> &FaultPredictor {
        match self {
            PredictorHandle::Default(p) => *p,
            PredictorHandle::Loaded(p) => p.as_ref(),
        }
    }
}

impl PredictorConfig {
    /// Explicit `model_path` via [`FaultPredictor::load`], otherwise the
    /// cached bundled predictor.
    pub fn open_predictor(&self) -> Result<PredictorHandle, ModelLoadError> {
        match &self.model_path {
            Some(path) => {
                debug!("Using predictor from {}", path.display());
                FaultPredictor::load(path).map(|p| PredictorHandle::Loaded(Box::new(p)))
            }
            None => FaultPredictor::load_default().map(PredictorHandle::Default),
        }
    }
}

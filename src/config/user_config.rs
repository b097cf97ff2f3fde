//! User-level configuration for fault predictions
//!
//! Supports loading config from:
//! - Environment variables
//! - ~/.config/fault-predictions/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::predictor::{AnalysisOptions, DEFAULT_PARALLEL_THRESHOLD};

/// Path of a predictor bundle overriding the bundled one
pub const MODEL_ENV: &str = "FAULT_PREDICTIONS_MODEL";

/// Minimum batch size for parallel analysis
pub const PARALLEL_THRESHOLD_ENV: &str = "FAULT_PREDICTIONS_PARALLEL_THRESHOLD";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictorConfig {
    /// Predictor bundle to use instead of the bundled default
    pub model_path: Option<PathBuf>,

    /// Batches at least this large run on the rayon pool (default: 256, 0 disables)
    pub parallel_threshold: Option<usize>,
}

impl PredictorConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/fault-predictions/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = PredictorConfig::default();

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            config.merge(Self::from_file(&path)?);
        }

        // Environment variables override everything
        config.apply_env_with(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Parse a single TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fault-predictions").join("config.toml"))
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.model_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(PARALLEL_THRESHOLD_ENV).filter(|v| !v.trim().is_empty()) {
            let threshold = raw.trim().parse::<usize>().with_context(|| {
                format!("{PARALLEL_THRESHOLD_ENV} must be a non-negative integer, got '{raw}'")
            })?;
            self.parallel_threshold = Some(threshold);
        }
        Ok(())
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: PredictorConfig) {
        if other.model_path.is_some() {
            self.model_path = other.model_path;
        }
        if other.parallel_threshold.is_some() {
            self.parallel_threshold = other.parallel_threshold;
        }
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold.unwrap_or(DEFAULT_PARALLEL_THRESHOLD)
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            parallel_threshold: self.parallel_threshold(),
        }
    }
}

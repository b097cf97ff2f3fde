//! Fault predictions for measured methods
//!
//! Turns per-method software metrics into a defectiveness probability and a
//! short human-readable explanation:
//!
//! ```no_run
//! use fault_predictions::{FaultPredictor, Metric, MetricsSnapshot};
//!
//! let source = MetricsSnapshot::new()
//!     .with_object("Parser.parse()", &[(Metric::CyclomaticComplexity, 15.0)]);
//! let predictor = FaultPredictor::load_default()?;
//! for entity in predictor.analyze(&source)? {
//!     println!("{entity}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The crate emits `tracing` events but never installs a subscriber.

pub mod classifier;
pub mod config;
pub mod metrics;
pub mod models;
pub mod predictor;

pub use classifier::{ClassificationError, ModelLoadError, DEFAULT_COMMENT};
pub use config::{PredictorConfig, PredictorHandle};
pub use metrics::{Metric, MetricsSnapshot, MetricsSource};
pub use models::AnalyzedEntity;
pub use predictor::{AnalysisOptions, DefaultPredictor, FaultPredictor};

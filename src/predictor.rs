//! Fault predictor: classifier plus explanation rules
//!
//! A predictor is persisted as a single JSON bundle:
//!
//! ```json
//! {
//!   "format": "fault-predictor",
//!   "version": 1,
//!   "schema": ["branch_count", "...", "defects"],
//!   "classifier": { "kind": "logistic", "...": "..." },
//!   "rules": [ { "statements": [ ... ], "message": "..." } ]
//! }
//! ```
//!
//! The bundled default predictor is compiled into the crate and deserialized
//! once per process on first use.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{
    build_instance, ClassificationError, Classifier, ClassifierModel, ModelLoadError, RuleSet,
    Schema, Statement,
};
use crate::metrics::MetricsSource;
use crate::models::AnalyzedEntity;

/// Default predictor shipped with the crate
pub const DEFAULT_PREDICTOR_JSON: &str = include_str!("../models/default_predictor.json");

/// Value of the bundle `format` field
pub const BUNDLE_FORMAT: &str = "fault-predictor";

/// Bundle version this build reads and writes
pub const BUNDLE_VERSION: u32 = 1;

/// Batches at least this large are classified on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 256;

/// Knobs for a single `analyze` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Minimum batch size for parallel classification; 0 disables it
    pub parallel_threshold: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl AnalysisOptions {
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: 0,
        }
    }

    fn use_parallel(&self, batch: usize) -> bool {
        self.parallel_threshold > 0 && batch >= self.parallel_threshold
    }
}

#[derive(Deserialize)]
struct BundleHeader {
    format: Option<String>,
    version: Option<u32>,
}

#[derive(Serialize)]
struct BundleRef<'a> {
    format: &'a str,
    version: u32,
    schema: &'a [String],
    classifier: &'a ClassifierModel,
    rules: &'a RuleSet,
}

#[derive(Deserialize)]
struct Bundle {
    schema: Vec<String>,
    classifier: ClassifierModel,
    #[serde(default)]
    rules: RuleSet,
}

/// Trained classifier paired with its explanation rules
#[derive(Debug)]
pub struct FaultPredictor {
    classifier: Classifier,
    rules: RuleSet,
}

impl FaultPredictor {
    pub fn new(classifier: Classifier, rules: RuleSet) -> Self {
        Self { classifier, rules }
    }

    /// Append an explanation rule after the existing ones
    pub fn add_rule(&mut self, message: impl Into<String>, statements: Vec<Statement>) {
        self.rules.add_rule(message, statements);
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify every object the source measured, in enumeration order.
    pub fn analyze(
        &self,
        source: &dyn MetricsSource,
    ) -> Result<Vec<AnalyzedEntity>, ClassificationError> {
        self.analyze_with(source, &AnalysisOptions::default())
    }

    /// Like [`analyze`](Self::analyze) with explicit options.
    ///
    /// The first failing object aborts the batch; the error names it.
    pub fn analyze_with(
        &self,
        source: &dyn MetricsSource,
        options: &AnalysisOptions,
    ) -> Result<Vec<AnalyzedEntity>, ClassificationError> {
        let objects = source.measured_objects();
        if objects.is_empty() {
            return Ok(Vec::new());
        }

        let schema = Schema::standard();
        let classify = |object: &String| {
            self.analyze_object(source, schema, object)
                .map_err(|e| ClassificationError::Batch {
                    object: object.clone(),
                    source: Box::new(e),
                })
        };

        let entities = if options.use_parallel(objects.len()) {
            debug!("Classifying {} methods in parallel", objects.len());
            objects
                .par_iter()
                .map(classify)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            debug!("Classifying {} methods", objects.len());
            objects
                .iter()
                .map(classify)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(entities)
    }

    fn analyze_object(
        &self,
        source: &dyn MetricsSource,
        schema: &Schema,
        object: &str,
    ) -> Result<AnalyzedEntity, ClassificationError> {
        let instance = build_instance(source, schema, object);
        let probability = self.classifier.predict(&instance)?;
        let comment = self.rules.explain(&instance);
        Ok(AnalyzedEntity::new(object, comment, probability))
    }

    /// Serialize to the bundle format (pretty-printed)
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&BundleRef {
            format: BUNDLE_FORMAT,
            version: BUNDLE_VERSION,
            schema: self.classifier.feature_names(),
            classifier: self.classifier.model(),
            rules: &self.rules,
        })
    }

    /// Parse a bundle from JSON text
    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        Self::from_slice(json.as_bytes())
    }

    /// Parse a bundle from raw bytes. Invalid UTF-8 is reported as malformed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let header: BundleHeader = serde_json::from_slice(bytes)?;
        match header.format.as_deref() {
            Some(BUNDLE_FORMAT) => {}
            other => {
                return Err(ModelLoadError::UnrecognizedFormat(
                    other.unwrap_or("<missing>").to_string(),
                ))
            }
        }
        match header.version {
            Some(BUNDLE_VERSION) => {}
            other => {
                return Err(ModelLoadError::UnsupportedVersion {
                    found: other.unwrap_or(0),
                    expected: BUNDLE_VERSION,
                })
            }
        }

        let bundle: Bundle = serde_json::from_slice(bytes)?;
        let classifier = Classifier::new(bundle.schema, bundle.classifier)?;
        Ok(Self::new(classifier, bundle.rules))
    }

    /// Save to disk
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)?;
        debug!("Fault predictor saved to {}", path.display());
        Ok(())
    }

    /// Load from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModelLoadError::NotFound(path.to_path_buf()),
            _ => ModelLoadError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let predictor = Self::from_slice(&bytes)?;
        info!(
            "Loaded {} fault predictor with {} rules from {}",
            predictor.classifier.model().kind(),
            predictor.rules.len(),
            path.display()
        );
        Ok(predictor)
    }

    /// The bundled default predictor, deserialized on first use and shared
    /// by every caller afterwards.
    pub fn load_default() -> Result<&'static FaultPredictor, ModelLoadError> {
        DEFAULT_PREDICTOR.get()
    }
}

static DEFAULT_PREDICTOR: DefaultPredictor = DefaultPredictor::embedded(DEFAULT_PREDICTOR_JSON);

#[derive(Debug)]
enum PredictorSource {
    Embedded(&'static str),
    Path(PathBuf),
}

/// Lazily loaded, process-lifetime predictor.
///
/// Initialization runs at most once successfully; concurrent first callers
/// all observe the same instance. A failed load is not cached, so every call
/// after a failure retries and reports the error again.
#[derive(Debug)]
pub struct DefaultPredictor {
    source: PredictorSource,
    cell: OnceLock<FaultPredictor>,
}

impl DefaultPredictor {
    pub const fn embedded(json: &'static str) -> Self {
        Self {
            source: PredictorSource::Embedded(json),
            cell: OnceLock::new(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: PredictorSource::Path(path.into()),
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Result<&FaultPredictor, ModelLoadError> {
        if let Some(predictor) = self.cell.get() {
            return Ok(predictor);
        }

        let loaded = match &self.source {
            PredictorSource::Embedded(json) => {
                let predictor = FaultPredictor::from_json(json)?;
                debug!("Initialized bundled fault predictor");
                predictor
            }
            PredictorSource::Path(path) => FaultPredictor::load(path)?,
        };

        // A concurrent caller may have won the race; its instance is kept.
        Ok(self.cell.get_or_init(|| loaded))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::gbdt_model::tests::{make_inputs, train_small_model};
    use crate::classifier::{
        Converter, FeatureSpec, GbdtClassifier, LogisticClassifier, Rule, DEFAULT_COMMENT,
        LABEL_FEATURE, NUM_FEATURES,
    };
    use crate::metrics::{Metric, MetricsSnapshot};

    const INPUTS: usize = NUM_FEATURES - 1;

    fn complexity_predictor() -> FaultPredictor {
        let mut weights = vec![0.0; INPUTS];
        weights[2] = 0.4; // cyclomatic_complexity
        let model = LogisticClassifier::new(-4.0, weights, vec![0.0; INPUTS]);
        let classifier = Classifier::for_schema(Schema::standard(), model).unwrap();
        let mut predictor = FaultPredictor::new(classifier, RuleSet::default());
        predictor.add_rule(
            "high complexity",
            vec![Statement::greater("cyclomatic_complexity", 10.0)],
        );
        predictor
    }

    fn many_methods(n: usize) -> MetricsSnapshot {
        (0..n).fold(MetricsSnapshot::new(), |snapshot, i| {
            snapshot.with_object(
                &format!("C{}.m{}()", i % 7, i),
                &[
                    (Metric::CyclomaticComplexity, (i % 23) as f64),
                    (Metric::LinesOfCode, (i % 90) as f64),
                ],
            )
        })
    }

    #[test]
    fn test_analyze_single_method() {
        let predictor = complexity_predictor();
        let source = MetricsSnapshot::new()
            .with_object("Foo.bar()", &[(Metric::CyclomaticComplexity, 15.0)]);

        let results = predictor.analyze(&source).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "Foo.bar()");
        assert_eq!(results[0].comment(), "high complexity");
        assert!((0.0..=1.0).contains(&results[0].probability()));
    }

    #[test]
    fn test_analyze_empty_source() {
        let predictor = complexity_predictor();
        let results = predictor.analyze(&MetricsSnapshot::new()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let predictor = complexity_predictor();
        let source = many_methods(300);

        let sequential = predictor
            .analyze_with(&source, &AnalysisOptions::sequential())
            .unwrap();
        let parallel = predictor
            .analyze_with(&source, &AnalysisOptions { parallel_threshold: 8 })
            .unwrap();

        assert_eq!(sequential.len(), 300);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential[0].name(), "C0.m0()");
        assert_eq!(sequential[299].name(), "C5.m299()");
    }

    #[test]
    fn test_model_failure_aborts_batch_with_context() {
        // Bound to a schema the analyzer never builds
        let names = vec!["branch_count".to_string(), LABEL_FEATURE.to_string()];
        let model = LogisticClassifier::new(0.0, vec![1.0], vec![0.0]);
        let predictor = FaultPredictor::new(Classifier::new(names, model).unwrap(), RuleSet::default());

        let source = many_methods(3);
        let err = predictor.analyze(&source).unwrap_err();
        match &err {
            ClassificationError::Batch { object, .. } => assert_eq!(object, "C0.m0()"),
            other => panic!("expected batch error, got {other}"),
        }
        assert!(matches!(err.root_cause(), ClassificationError::SchemaMismatch(_)));
    }

    #[test]
    fn test_bundle_round_trip_is_byte_stable() {
        let predictor = complexity_predictor();
        let json = predictor.to_json().unwrap();
        let reloaded = FaultPredictor::from_json(&json).unwrap();
        assert_eq!(reloaded.to_json().unwrap(), json);
        assert_eq!(reloaded.rules(), predictor.rules());

        let source = many_methods(40);
        assert_eq!(
            predictor.analyze(&source).unwrap(),
            reloaded.analyze(&source).unwrap()
        );
    }

    #[test]
    fn test_gbdt_bundle_round_trip() {
        let classifier =
            Classifier::for_schema(Schema::standard(), GbdtClassifier::from_trained(train_small_model()))
                .unwrap();
        let rules: RuleSet = vec![Rule::new(
            "long method",
            vec![Statement::greater("total_loc", 10.0)],
        )]
        .into_iter()
        .collect();
        let predictor = FaultPredictor::new(classifier, rules);

        let json = predictor.to_json().unwrap();
        assert!(json.contains("\"kind\": \"gbdt\""));
        let reloaded = FaultPredictor::from_json(&json).unwrap();

        let values = make_inputs(2.0, true);
        let metrics: Vec<(Metric, f64)> = vec![
            (Metric::BranchCount, values[0]),
            (Metric::CyclomaticComplexity, values[2]),
            (Metric::LinesOfCode, values[21]),
        ];
        let source = MetricsSnapshot::new().with_object("m", &metrics);
        let a = predictor.analyze(&source).unwrap();
        let b = reloaded.analyze(&source).unwrap();
        assert_eq!(a[0].name(), b[0].name());
        assert_eq!(a[0].comment(), "long method");
        assert_eq!(a[0].comment(), b[0].comment());
        assert!((a[0].probability() - b[0].probability()).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_foreign_bundles() {
        let err = FaultPredictor::from_json(r#"{"format":"weka","version":1}"#).unwrap_err();
        assert!(matches!(err, ModelLoadError::UnrecognizedFormat(ref f) if f == "weka"));

        let err = FaultPredictor::from_json(r#"{"version":1}"#).unwrap_err();
        assert!(matches!(err, ModelLoadError::UnrecognizedFormat(_)));

        let err = FaultPredictor::from_json(r#"{"format":"fault-predictor","version":7}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::UnsupportedVersion {
                found: 7,
                expected: 1
            }
        ));

        let err = FaultPredictor::from_json("not json").unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed(_)));

        let err = FaultPredictor::from_slice(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed(_)));
    }

    #[test]
    fn test_rejects_inconsistent_bundle() {
        let json = r#"{
            "format": "fault-predictor",
            "version": 1,
            "schema": ["branch_count", "total_loc", "defects"],
            "classifier": {"kind": "logistic", "intercept": 0.0, "weights": [1.0], "means": [0.0]},
            "rules": []
        }"#;
        let err = FaultPredictor::from_json(json).unwrap_err();
        assert!(matches!(err, ModelLoadError::Inconsistent(_)));
    }

    #[test]
    fn test_bundle_without_rules_uses_default_comment() {
        let schema = Schema::new(vec![
            FeatureSpec::new("branch_count", Converter::metric(Metric::BranchCount)),
            FeatureSpec::new(LABEL_FEATURE, Converter::Label),
        ]);
        let json = r#"{
            "format": "fault-predictor",
            "version": 1,
            "schema": ["branch_count", "defects"],
            "classifier": {"kind": "logistic", "intercept": 0.0, "weights": [0.0], "means": [0.0]}
        }"#;
        let predictor = FaultPredictor::from_json(json).unwrap();
        assert!(predictor.rules().is_empty());

        let source = MetricsSnapshot::new().with_object("m", &[(Metric::BranchCount, 2.0)]);
        let instance = build_instance(&source, &schema, "m");
        assert_eq!(predictor.rules().explain(&instance), DEFAULT_COMMENT);
        assert!((predictor.classifier().predict(&instance).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_default_predictor_is_shared() {
        let a = FaultPredictor::load_default().unwrap();
        let b = FaultPredictor::load_default().unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(DEFAULT_PREDICTOR.is_loaded());
        assert!(!a.rules().is_empty());
        assert_eq!(a.classifier().feature_names(), Schema::standard().feature_names());
    }

    #[test]
    fn test_default_predictor_json_is_current_format() {
        let predictor = FaultPredictor::from_json(DEFAULT_PREDICTOR_JSON).unwrap();
        assert_eq!(predictor.classifier().model().kind(), "logistic");
    }

    #[test]
    fn test_embedded_cell_does_not_cache_failure() {
        let cell = DefaultPredictor::embedded("{}");
        assert!(matches!(cell.get(), Err(ModelLoadError::UnrecognizedFormat(_))));
        assert!(!cell.is_loaded());
        assert!(matches!(cell.get(), Err(ModelLoadError::UnrecognizedFormat(_))));
    }
}

//! Feature converter registry
//!
//! Maps each classifier feature to a conversion rule over raw method metrics.
//! The registration order below is the column order the shipped models were
//! trained with, so it must not be reshuffled:
//!
//!   0..3   branching (branch, condition, cyclomatic counts)
//!   3..9   density / design / size
//!   9..17  Halstead family
//!  17..22  operand/operator counts and total LOC
//!  22      class label (`defects`), always missing at inference time

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::metrics::{Metric, MetricsSource};

/// Name of the class attribute; always the last schema column.
pub const LABEL_FEATURE: &str = "defects";

/// Halstead delivered-bugs estimate: volume / 3000.
pub const HALSTEAD_ERROR_SCALE: f64 = 1.0 / 3000.0;

/// Halstead programming time in seconds: effort / 18.
pub const HALSTEAD_TIME_SCALE: f64 = 1.0 / 18.0;

/// Number of columns in the standard schema, label included.
pub const NUM_FEATURES: usize = 23;

/// How a feature value is derived from raw metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    /// `metric - Σ subtract`; missing if any operand is missing
    Difference {
        metric: Metric,
        subtract: &'static [Metric],
    },
    /// `metric * factor`
    Scaled { metric: Metric, factor: f64 },
    /// `numerator / denominator`, plain IEEE-754 division
    Quotient {
        numerator: Metric,
        denominator: Metric,
    },
    /// Dependent variable; unknown at prediction time
    Label,
}

impl Converter {
    /// Single metric, nothing subtracted
    pub const fn metric(metric: Metric) -> Self {
        Converter::Difference {
            metric,
            subtract: &[],
        }
    }

    /// Resolve the feature value for `object`. `None` means missing.
    pub fn convert(&self, source: &dyn MetricsSource, object: &str) -> Option<f64> {
        match self {
            Converter::Difference { metric, subtract } => {
                let mut value = source.value(*metric, object)?;
                for m in subtract.iter() {
                    value -= source.value(*m, object)?;
                }
                Some(value)
            }
            Converter::Scaled { metric, factor } => {
                source.value(*metric, object).map(|v| v * factor)
            }
            Converter::Quotient {
                numerator,
                denominator,
            } => {
                let n = source.value(*numerator, object)?;
                let d = source.value(*denominator, object)?;
                // x / 0.0 is ±inf (or NaN for 0/0); classifiers treat those as outliers
                Some(n / d)
            }
            Converter::Label => None,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Converter::Label)
    }
}

/// One schema column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub converter: Converter,
}

impl FeatureSpec {
    pub const fn new(name: &'static str, converter: Converter) -> Self {
        Self { name, converter }
    }
}

/// Ordered set of feature columns.
#[derive(Debug, Clone)]
pub struct Schema {
    features: Vec<FeatureSpec>,
    index: HashMap<&'static str, usize>,
}

static STANDARD_SCHEMA: OnceLock<Schema> = OnceLock::new();

impl Schema {
    /// Build a schema from ordered columns. If a name is registered twice,
    /// lookups by name resolve to the first column.
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        let mut index = HashMap::with_capacity(features.len());
        for (i, spec) in features.iter().enumerate() {
            index.entry(spec.name).or_insert(i);
        }
        Self { features, index }
    }

    /// The registry every shipped predictor was trained against.
    pub fn standard() -> &'static Schema {
        STANDARD_SCHEMA.get_or_init(|| Schema::new(standard_features()))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().map(|f| f.name)
    }

    /// Owned column names, as persisted in predictor bundles.
    pub fn feature_names(&self) -> Vec<String> {
        self.names().map(str::to_string).collect()
    }

    /// Number of columns fed to a model (everything but the label).
    pub fn input_size(&self) -> usize {
        self.features
            .iter()
            .filter(|f| !f.converter.is_label())
            .count()
    }
}

fn standard_features() -> Vec<FeatureSpec> {
    use Converter::{Label, Quotient, Scaled};
    use Metric::*;

    vec![
        FeatureSpec::new("branch_count", Converter::metric(BranchCount)),
        FeatureSpec::new("condition_count", Converter::metric(ConditionCount)),
        FeatureSpec::new("cyclomatic_complexity", Converter::metric(CyclomaticComplexity)),
        FeatureSpec::new(
            "cyclomatic_density",
            Quotient {
                numerator: CyclomaticComplexity,
                denominator: LinesOfCode,
            },
        ),
        FeatureSpec::new("decision_count", Converter::metric(DecisionCount)),
        FeatureSpec::new("design_complexity", Converter::metric(DesignComplexity)),
        FeatureSpec::new("design_density", Converter::metric(DesignDensity)),
        FeatureSpec::new(
            "executable_loc",
            Converter::Difference {
                metric: LinesOfCode,
                subtract: &[BlankLines, CommentLines],
            },
        ),
        FeatureSpec::new("formal_parameters", Converter::metric(FormalParameters)),
        FeatureSpec::new("halstead_difficulty", Converter::metric(HalsteadDifficulty)),
        FeatureSpec::new("halstead_effort", Converter::metric(HalsteadEffort)),
        FeatureSpec::new(
            "halstead_error",
            Scaled {
                metric: HalsteadVolume,
                factor: HALSTEAD_ERROR_SCALE,
            },
        ),
        FeatureSpec::new("halstead_length", Converter::metric(HalsteadLength)),
        FeatureSpec::new("halstead_level", Converter::metric(HalsteadLevel)),
        FeatureSpec::new(
            "halstead_time",
            Scaled {
                metric: HalsteadEffort,
                factor: HALSTEAD_TIME_SCALE,
            },
        ),
        FeatureSpec::new("halstead_volume", Converter::metric(HalsteadVolume)),
        FeatureSpec::new(
            "normalized_cyclomatic_complexity",
            Quotient {
                numerator: CyclomaticComplexity,
                denominator: LinesOfCode,
            },
        ),
        FeatureSpec::new("total_operands", Converter::metric(Operands)),
        FeatureSpec::new("total_operators", Converter::metric(Operators)),
        FeatureSpec::new("unique_operands", Converter::metric(DistinctOperands)),
        FeatureSpec::new("unique_operators", Converter::metric(DistinctOperators)),
        FeatureSpec::new("total_loc", Converter::metric(LinesOfCode)),
        FeatureSpec::new(LABEL_FEATURE, Label),
    ]
}

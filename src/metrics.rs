//! Raw metric measurements supplied by the host analysis environment
//!
//! The predictor never computes metrics itself. A host hands over a
//! [`MetricsSource`] that knows which methods were measured and, for each
//! (metric, method) pair, the measured value if there is one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Method-level metrics the feature registry reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    BranchCount,
    ConditionCount,
    CyclomaticComplexity,
    DecisionCount,
    DesignComplexity,
    DesignDensity,
    LinesOfCode,
    BlankLines,
    CommentLines,
    FormalParameters,
    HalsteadDifficulty,
    HalsteadEffort,
    HalsteadLength,
    HalsteadLevel,
    HalsteadVolume,
    Operands,
    Operators,
    DistinctOperands,
    DistinctOperators,
}

impl Metric {
    /// Every metric, in declaration order
    pub const ALL: [Metric; 19] = [
        Metric::BranchCount,
        Metric::ConditionCount,
        Metric::CyclomaticComplexity,
        Metric::DecisionCount,
        Metric::DesignComplexity,
        Metric::DesignDensity,
        Metric::LinesOfCode,
        Metric::BlankLines,
        Metric::CommentLines,
        Metric::FormalParameters,
        Metric::HalsteadDifficulty,
        Metric::HalsteadEffort,
        Metric::HalsteadLength,
        Metric::HalsteadLevel,
        Metric::HalsteadVolume,
        Metric::Operands,
        Metric::Operators,
        Metric::DistinctOperands,
        Metric::DistinctOperators,
    ];

    /// Stable snake_case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::BranchCount => "branch_count",
            Metric::ConditionCount => "condition_count",
            Metric::CyclomaticComplexity => "cyclomatic_complexity",
            Metric::DecisionCount => "decision_count",
            Metric::DesignComplexity => "design_complexity",
            Metric::DesignDensity => "design_density",
            Metric::LinesOfCode => "lines_of_code",
            Metric::BlankLines => "blank_lines",
            Metric::CommentLines => "comment_lines",
            Metric::FormalParameters => "formal_parameters",
            Metric::HalsteadDifficulty => "halstead_difficulty",
            Metric::HalsteadEffort => "halstead_effort",
            Metric::HalsteadLength => "halstead_length",
            Metric::HalsteadLevel => "halstead_level",
            Metric::HalsteadVolume => "halstead_volume",
            Metric::Operands => "operands",
            Metric::Operators => "operators",
            Metric::DistinctOperands => "distinct_operands",
            Metric::DistinctOperators => "distinct_operators",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a metric identifier is not one of [`Metric::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// Query interface onto one metrics run
pub trait MetricsSource: Send + Sync {
    /// Measured method identifiers, in the order results must be reported
    fn measured_objects(&self) -> Vec<String>;

    /// Value of `metric` for `object`; `None` when not computed or not applicable
    fn value(&self, metric: Metric, object: &str) -> Option<f64>;
}

/// In-memory snapshot of a metrics run
///
/// Keeps the enumeration order of the measured objects separately from the
/// value table so results come back in the order the host measured them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    objects: Vec<String>,
    #[serde(default)]
    values: HashMap<String, HashMap<Metric, f64>>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a measured object without any values yet.
    /// Registering the same object twice keeps its first position.
    pub fn add_object(&mut self, object: impl Into<String>) {
        let object = object.into();
        if !self.values.contains_key(&object) {
            self.values.insert(object.clone(), HashMap::new());
            self.objects.push(object);
        }
    }

    /// Record a value, registering the object on first use
    pub fn insert(&mut self, object: &str, metric: Metric, value: f64) {
        self.add_object(object);
        if let Some(row) = self.values.get_mut(object) {
            row.insert(metric, value);
        }
    }

    /// Builder form of [`insert`](Self::insert) for a whole row
    pub fn with_object(mut self, object: &str, values: &[(Metric, f64)]) -> Self {
        self.add_object(object);
        for &(metric, value) in values {
            self.insert(object, metric, value);
        }
        self
    }

    /// Parse a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut snapshot: MetricsSnapshot = serde_json::from_str(json)?;
        for object in &snapshot.objects {
            snapshot.values.entry(object.clone()).or_default();
        }
        // Objects that only appear in the value table go last, sorted, so the
        // order stays deterministic.
        let mut extra: Vec<String> = snapshot
            .values
            .keys()
            .filter(|k| !snapshot.objects.contains(k))
            .cloned()
            .collect();
        extra.sort();
        snapshot.objects.extend(extra);
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl MetricsSource for MetricsSnapshot {
    fn measured_objects(&self) -> Vec<String> {
        self.objects.clone()
    }

    fn value(&self, metric: Metric, object: &str) -> Option<f64> {
        self.values.get(object)?.get(&metric).copied()
    }
}

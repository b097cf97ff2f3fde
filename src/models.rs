//! Core data models for fault predictions
//!
//! These records are what the predictor hands over to a presentation layer.
//! They are immutable once built; sorting and rendering are the caller's job.

use serde::{Deserialize, Serialize};

/// Prediction for one measured method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedEntity {
    name: String,
    comment: String,
    probability: f64,
}

impl AnalyzedEntity {
    pub fn new(name: impl Into<String>, comment: impl Into<String>, probability: f64) -> Self {
        Self {
            name: name.into(),
            comment: comment.into(),
            probability,
        }
    }

    /// Method identifier as reported by the metrics source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explanation built from matching rules, or the default comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// P(defective), in [0, 1]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Hard verdict at a caller-chosen cut-off (inclusive)
    pub fn is_defective(&self, threshold: f64) -> bool {
        self.probability >= threshold
    }
}

impl std::fmt::Display for AnalyzedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.3}): {}", self.name, self.probability, self.comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_accessors() {
        let e = AnalyzedEntity::new("Foo.bar()", "high complexity", 0.75);
        assert_eq!(e.name(), "Foo.bar()");
        assert_eq!(e.comment(), "high complexity");
        assert!((e.probability() - 0.75).abs() < f64::EPSILON);
        assert!(e.is_defective(0.5));
        assert!(e.is_defective(0.75));
        assert!(!e.is_defective(0.8));
        assert_eq!(e.to_string(), "Foo.bar() (0.750): high complexity");
    }

    #[test]
    fn test_entity_json() {
        let e = AnalyzedEntity::new("m", "no comment", 0.5);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"name":"m","comment":"no comment","probability":0.5}"#);
    }
}

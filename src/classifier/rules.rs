//! Explanation rules
//!
//! A rule is a conjunction of threshold statements over named features plus
//! the message shown when all of them hold. Rules are kept in a plain ordered
//! list: evaluation order is insertion order, so the same instance always
//! yields the same concatenated comment.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::instance::Instance;

/// Comment used when no rule matches.
pub const DEFAULT_COMMENT: &str = "no comment";

/// Separator between messages of several matching rules.
pub const MESSAGE_SEPARATOR: &str = "; ";

/// Comparison direction of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Greater,
    Less,
}

/// `feature > threshold` or `feature < threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub feature: String,
    pub condition: Condition,
    #[serde(with = "threshold_repr")]
    pub threshold: f64,
}

/// JSON has no literal for ±inf or NaN; those thresholds are written as the
/// strings `"inf"`, `"-inf"` and `"NaN"`. Finite thresholds stay numbers.
mod threshold_repr {
    use serde::de::{self, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ThresholdValue {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match ThresholdValue::deserialize(deserializer)? {
            ThresholdValue::Number(v) => Ok(v),
            ThresholdValue::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(de::Error::invalid_value(
                    Unexpected::Str(other),
                    &"a number, \"inf\", \"-inf\" or \"NaN\"",
                )),
            },
        }
    }
}

impl Statement {
    pub fn new(feature: impl Into<String>, condition: Condition, threshold: f64) -> Self {
        Self {
            feature: feature.into(),
            condition,
            threshold,
        }
    }

    pub fn greater(feature: impl Into<String>, threshold: f64) -> Self {
        Self::new(feature, Condition::Greater, threshold)
    }

    pub fn less(feature: impl Into<String>, threshold: f64) -> Self {
        Self::new(feature, Condition::Less, threshold)
    }

    /// Strict comparison against the instance value. Unknown features,
    /// missing values, NaN and equality never match.
    pub fn matches(&self, instance: &Instance<'_>) -> bool {
        let Some(value) = instance.value(&self.feature) else {
            return false;
        };
        match value.partial_cmp(&self.threshold) {
            Some(Ordering::Greater) => self.condition == Condition::Greater,
            Some(Ordering::Less) => self.condition == Condition::Less,
            _ => false,
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.condition {
            Condition::Greater => ">",
            Condition::Less => "<",
        };
        write!(f, "{} {} {}", self.feature, op, self.threshold)
    }
}

/// Conjunction of statements with its explanatory message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub statements: Vec<Statement>,
    pub message: String,
}

impl Rule {
    pub fn new(message: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            statements,
            message: message.into(),
        }
    }

    /// True when every statement matches
    pub fn matches(&self, instance: &Instance<'_>) -> bool {
        self.statements.iter().all(|s| s.matches(instance))
    }
}

/// Ordered rule list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Append a rule; it is evaluated after every rule added before it.
    pub fn add_rule(&mut self, message: impl Into<String>, statements: Vec<Statement>) {
        self.rules.push(Rule::new(message, statements));
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules matching `instance`, in rule-set order
    pub fn matching(&self, instance: &Instance<'_>) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.matches(instance)).collect()
    }

    /// Messages of all matching rules joined with `"; "`, or
    /// [`DEFAULT_COMMENT`] when none match.
    pub fn explain(&self, instance: &Instance<'_>) -> String {
        let messages: Vec<&str> = self
            .matching(instance)
            .into_iter()
            .map(|r| r.message.as_str())
            .collect();
        if messages.is_empty() {
            DEFAULT_COMMENT.to_string()
        } else {
            messages.join(MESSAGE_SEPARATOR)
        }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

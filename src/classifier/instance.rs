//! Instance builder: raw metrics → fixed-schema feature vector

use super::features::{FeatureSpec, Schema};
use super::ClassificationError;
use crate::metrics::MetricsSource;

/// Feature vector for one measured method.
///
/// `None` marks a missing value. NaN and ±inf are ordinary values here (they
/// come out of quotient features with a zero denominator) and are never
/// confused with missingness.
#[derive(Debug, Clone)]
pub struct Instance<'s> {
    schema: &'s Schema,
    values: Vec<Option<f64>>,
}

impl<'s> Instance<'s> {
    /// Pair a value row with its schema. The row must have one slot per
    /// schema column, label included.
    pub fn new(
        schema: &'s Schema,
        values: Vec<Option<f64>>,
    ) -> Result<Self, ClassificationError> {
        if values.len() != schema.len() {
            return Err(ClassificationError::InputSize {
                expected: schema.len(),
                found: values.len(),
            });
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named feature. `None` if the feature is missing or the
    /// schema has no such column.
    pub fn value(&self, feature: &str) -> Option<f64> {
        let idx = self.schema.index_of(feature)?;
        self.values.get(idx).copied().flatten()
    }

    /// Non-label columns, in schema order: the classifier input.
    pub fn inputs(&self) -> Vec<Option<f64>> {
        self.schema
            .features()
            .iter()
            .zip(&self.values)
            .filter(|(spec, _)| !spec.converter.is_label())
            .map(|(_, v)| *v)
            .collect()
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'s FeatureSpec, Option<f64>)> + '_ {
        self.schema.features().iter().zip(self.values.iter().copied())
    }
}

/// Build the instance for one measured object.
pub fn build_instance<'s>(
    source: &dyn MetricsSource,
    schema: &'s Schema,
    object: &str,
) -> Instance<'s> {
    let values = schema
        .features()
        .iter()
        .map(|spec| spec.converter.convert(source, object))
        .collect();
    Instance { schema, values }
}

/// Build one instance per measured object, in enumeration order.
/// An empty source gives an empty batch.
pub fn build_instances<'s>(source: &dyn MetricsSource, schema: &'s Schema) -> Vec<Instance<'s>> {
    let objects = source.measured_objects();
    tracing::debug!("Building {} instances over {} features", objects.len(), schema.len());
    objects
        .iter()
        .map(|object| build_instance(source, schema, object))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::features::{LABEL_FEATURE, NUM_FEATURES};
    use crate::metrics::{Metric, MetricsSnapshot};

    #[test]
    fn test_single_metric_method() {
        let source = MetricsSnapshot::new().with_object("M", &[(Metric::BranchCount, 5.0)]);
        let instance = build_instance(&source, Schema::standard(), "M");

        assert_eq!(instance.len(), NUM_FEATURES);
        assert_eq!(instance.value("branch_count"), Some(5.0));
        assert_eq!(instance.value("total_loc"), None);
        assert_eq!(instance.value(LABEL_FEATURE), None);
        assert_eq!(instance.values().iter().filter(|v| v.is_some()).count(), 1);
    }

    #[test]
    fn test_full_method_row() {
        let source = MetricsSnapshot::new().with_object(
            "Parser.parse()",
            &[
                (Metric::CyclomaticComplexity, 12.0),
                (Metric::LinesOfCode, 48.0),
                (Metric::BlankLines, 6.0),
                (Metric::CommentLines, 2.0),
                (Metric::HalsteadEffort, 9000.0),
            ],
        );
        let instance = build_instance(&source, Schema::standard(), "Parser.parse()");

        assert_eq!(instance.value("cyclomatic_complexity"), Some(12.0));
        assert_eq!(instance.value("cyclomatic_density"), Some(0.25));
        assert_eq!(instance.value("normalized_cyclomatic_complexity"), Some(0.25));
        assert_eq!(instance.value("executable_loc"), Some(40.0));
        assert!((instance.value("halstead_time").unwrap() - 500.0).abs() < 1e-9);
        assert_eq!(instance.value("halstead_error"), None);
    }

    #[test]
    fn test_nan_is_not_missing() {
        let source = MetricsSnapshot::new().with_object(
            "m",
            &[(Metric::CyclomaticComplexity, 0.0), (Metric::LinesOfCode, 0.0)],
        );
        let instance = build_instance(&source, Schema::standard(), "m");

        let density = instance.value("cyclomatic_density");
        assert!(density.is_some());
        assert!(density.unwrap().is_nan());
    }

    #[test]
    fn test_unknown_feature_is_none() {
        let source = MetricsSnapshot::new().with_object("m", &[(Metric::BranchCount, 1.0)]);
        let instance = build_instance(&source, Schema::standard(), "m");
        assert_eq!(instance.value("no_such_feature"), None);
    }

    #[test]
    fn test_inputs_drop_label() {
        let source = MetricsSnapshot::new().with_object("m", &[(Metric::LinesOfCode, 10.0)]);
        let instance = build_instance(&source, Schema::standard(), "m");
        let inputs = instance.inputs();
        assert_eq!(inputs.len(), NUM_FEATURES - 1);
        assert_eq!(inputs[21], Some(10.0));
    }

    #[test]
    fn test_batch_order_and_empty_source() {
        let source = MetricsSnapshot::new()
            .with_object("z()", &[(Metric::BranchCount, 1.0)])
            .with_object("a()", &[(Metric::BranchCount, 2.0)]);
        let batch = build_instances(&source, Schema::standard());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].value("branch_count"), Some(1.0));
        assert_eq!(batch[1].value("branch_count"), Some(2.0));

        let empty = MetricsSnapshot::new();
        assert!(build_instances(&empty, Schema::standard()).is_empty());
    }

    #[test]
    fn test_new_requires_full_row() {
        let mut row = vec![None; NUM_FEATURES];
        row[0] = Some(1.0);
        let instance = Instance::new(Schema::standard(), row).unwrap();
        assert_eq!(instance.len(), NUM_FEATURES);
        assert_eq!(instance.value("branch_count"), Some(1.0));
        assert_eq!(instance.value("condition_count"), None);

        let short = Instance::new(Schema::standard(), vec![Some(1.0)]).unwrap_err();
        assert!(matches!(
            short,
            ClassificationError::InputSize {
                expected: NUM_FEATURES,
                found: 1
            }
        ));

        let long = Instance::new(Schema::standard(), vec![Some(1.0); NUM_FEATURES + 1]);
        assert!(matches!(
            long,
            Err(ClassificationError::InputSize { found, .. }) if found == NUM_FEATURES + 1
        ));
    }
}

//! Duplicate and uniqueness checks.
//!
//! Both keep one entry per distinct key for the whole stream, so memory grows
//! with the number of distinct keys rather than the number of rows. Approximate
//! structures (bloom filters, sketches) would bound that at the cost of false
//! positives and are not used here.

use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::registry::{BuildContext, ParamReader};
use crate::value::KeyValue;
use crate::{Batch, DataValue, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec};
use std::collections::HashMap;

/// Maps each distinct key to the first row it was seen at.
#[derive(Debug, Default, Clone)]
pub struct KeyTracker {
    first_seen: HashMap<Vec<KeyValue>, u64>,
}

impl KeyTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` at `row`, returning the first row if the key was already seen.
    pub fn observe(&mut self, key: Vec<KeyValue>, row: u64) -> Option<u64> {
        match self.first_seen.get(&key) {
            Some(first) => Some(*first),
            None => {
                self.first_seen.insert(key, row);
                None
            }
        }
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    /// True if nothing was observed yet.
    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

struct DuplicateRule {
    /// `None` until the first batch when no fields were configured.
    fields: Option<Vec<String>>,
    skip_null_keys: bool,
    tracker: KeyTracker,
    collector: FailureCollector,
}

impl DuplicateRule {
    fn key_fields(&mut self, batch: &Batch) -> Vec<String> {
        self.fields
            .get_or_insert_with(|| batch.schema().names().map(str::to_string).collect())
            .clone()
    }
}

fn render_key(values: &[&DataValue]) -> String {
    match values {
        [single] => single.to_string(),
        many => {
            let parts: Vec<String> = many.iter().map(|v| v.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

impl RuleEvaluator for DuplicateRule {
    fn required_fields(&self) -> Vec<String> {
        self.fields.clone().unwrap_or_default()
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, _pass: u8) -> Result<(), EvaluationError> {
        let fields = self.key_fields(batch);
        let columns = fields
            .iter()
            .map(|f| batch.require_column(f))
            .collect::<Result<Vec<_>, _>>()?;
        let label = fields.join(", ");

        for row in mask.selected() {
            let values: Vec<&DataValue> = columns.iter().map(|c| &c[row]).collect();
            if self.skip_null_keys && values.iter().any(|v| v.is_missing()) {
                continue;
            }

            let key = values.iter().map(|v| KeyValue::from(*v)).collect();
            let absolute = batch.offset() + row as u64;
            match self.tracker.observe(key, absolute) {
                None => self.collector.pass(),
                Some(first) => self.collector.fail_with(absolute, &label, || {
                    (render_key(&values), format!("duplicate of row {}", first))
                }),
            }
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = match &self.fields {
            Some(fields) if !fields.is_empty() => fields.join(", "),
            _ => "all columns".to_string(),
        };
        Ok(self.collector.into_outcome(&subject))
    }
}

pub(crate) fn build_duplicate_detection(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    Ok(Box::new(DuplicateRule {
        fields: params.optional_fields()?,
        skip_null_keys: false,
        tracker: KeyTracker::new(),
        collector: ctx.collector(),
    }))
}

pub(crate) fn build_uniqueness(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    Ok(Box::new(DuplicateRule {
        fields: Some(params.fields()?),
        skip_null_keys: true,
        tracker: KeyTracker::new(),
        collector: ctx.collector(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BatchSchema;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn rule(fields: Option<Vec<&str>>, skip_null_keys: bool) -> DuplicateRule {
        DuplicateRule {
            fields: fields.map(|f| f.into_iter().map(String::from).collect()),
            skip_null_keys,
            tracker: KeyTracker::new(),
            collector: FailureCollector::new(10),
        }
    }

    fn batch(rows: Vec<Vec<DataValue>>, offset: u64) -> Batch {
        let schema = Arc::new(BatchSchema::of_strings(&["id", "region"]));
        Batch::from_rows(schema, rows, offset).unwrap()
    }

    #[test]
    fn test_tracker_remembers_first_row() {
        let mut tracker = KeyTracker::new();
        assert_eq!(tracker.observe(vec![KeyValue::Int(1)], 0), None);
        assert_eq!(tracker.observe(vec![KeyValue::Int(1)], 5), Some(0));
        assert_eq!(tracker.observe(vec![KeyValue::Int(1)], 9), Some(0));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_duplicates_across_batches() {
        let mut rule = rule(Some(vec!["id"]), false);
        let first = batch(vec![vec![DataValue::Int(1), "a".into()]], 0);
        let second = batch(
            vec![
                vec![DataValue::Float(1.0), "b".into()],
                vec![DataValue::Int(2), "c".into()],
            ],
            1,
        );
        rule.update(&first, &RowMask::all(1), 1).unwrap();
        rule.update(&second, &RowMask::all(2), 1).unwrap();

        let outcome = Box::new(rule).finalize().unwrap();
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.total_count, 3);
        assert_eq!(outcome.samples[0].row, 1);
        assert_eq!(outcome.samples[0].message, "duplicate of row 0");
    }

    #[test]
    fn test_default_key_is_every_column() {
        let mut rule = rule(None, false);
        let rows = batch(
            vec![
                vec![DataValue::Int(1), "a".into()],
                vec![DataValue::Int(1), "b".into()],
                vec![DataValue::Int(1), "a".into()],
            ],
            0,
        );
        rule.update(&rows, &RowMask::all(3), 1).unwrap();

        let outcome = Box::new(rule).finalize().unwrap();
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.samples[0].value, "(1, a)");
        assert_eq!(outcome.samples[0].field, "id, region");
    }

    #[test]
    fn test_nulls_are_keys_unless_skipped() {
        let rows = batch(
            vec![
                vec![DataValue::Null, "a".into()],
                vec![DataValue::Null, "a".into()],
            ],
            0,
        );

        let mut duplicates = rule(Some(vec!["id"]), false);
        duplicates.update(&rows, &RowMask::all(2), 1).unwrap();
        assert!(duplicates.is_failing());

        let mut unique = rule(Some(vec!["id"]), true);
        unique.update(&rows, &RowMask::all(2), 1).unwrap();
        let outcome = Box::new(unique).finalize().unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.total_count, 0);
    }
}

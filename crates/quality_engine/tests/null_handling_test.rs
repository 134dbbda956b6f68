//! Null handling across rule kinds.
//!
//! Nulls (and NaN) are a failure only for rules whose purpose is presence:
//! - `mandatory_field` fails them
//! - value rules (pattern, allowed values, range, date format) skip them
//! - comparisons fail them unless `skip_nulls` is set
//! - `uniqueness` skips keys with a null part, `duplicate_detection` does not
//! - conditions treat them as incomparable: only `!=` holds

use pretty_assertions::assert_eq;
use quality_core::{EngineSettings, RuleResult, RuleSpec, RuleSpecBuilder};
use quality_engine::{DataValue, MemorySource, NoReferences, Orchestrator, Registry};

fn evaluate(rows: Vec<Vec<DataValue>>, rule: RuleSpec) -> RuleResult {
    let registry = Registry::with_builtins();
    let mut source = MemorySource::from_rows("values", &["v", "w"], rows).with_batch_size(2);
    let mut report = Orchestrator::new(&registry, EngineSettings::default())
        .run(&mut source, &[rule], &NoReferences)
        .unwrap();
    report.results.remove(0)
}

fn with_nulls() -> Vec<Vec<DataValue>> {
    vec![
        vec!["a".into(), DataValue::Int(1)],
        vec![DataValue::Null, DataValue::Int(2)],
        vec![DataValue::Float(f64::NAN), DataValue::Null],
        vec!["".into(), DataValue::Int(4)],
        vec!["a".into(), DataValue::Null],
    ]
}

#[test]
fn test_mandatory_field_fails_null_nan_and_blank() {
    let result = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("mandatory_field").param("field", "v").build(),
    );
    assert_eq!(result.failed_count, 3);
    assert_eq!(result.total_count, 5);
    let rows: Vec<u64> = result.samples.iter().map(|s| s.row).collect();
    assert_eq!(rows, vec![1, 2, 3]);
}

#[test]
fn test_mandatory_field_allow_blank() {
    let result = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("mandatory_field")
            .param("field", "v")
            .param("allow_blank", true)
            .build(),
    );
    assert_eq!(result.failed_count, 2);
}

#[test]
fn test_value_rules_skip_nulls() {
    let rules = vec![
        RuleSpecBuilder::new("pattern_match")
            .param("field", "w")
            .param("pattern", r"\d+")
            .build(),
        RuleSpecBuilder::new("allowed_values")
            .param("field", "w")
            .param("values", vec![1i64, 2, 4])
            .build(),
        RuleSpecBuilder::new("numeric_range")
            .param("field", "w")
            .param("min", 1i64)
            .param("max", 4i64)
            .build(),
    ];

    for rule in rules {
        let kind = rule.kind.clone();
        let result = evaluate(with_nulls(), rule);
        assert!(result.passed, "{} should skip nulls", kind);
        assert_eq!(result.total_count, 3, "{}", kind);
    }
}

#[test]
fn test_comparison_nulls_fail_unless_skipped() {
    let strict = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("cross_field_comparison")
            .param("left", "w")
            .param("operator", "!=")
            .param("right", "v")
            .build(),
    );
    assert_eq!(strict.failed_count, 3);

    let lenient = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("cross_field_comparison")
            .param("left", "w")
            .param("operator", "!=")
            .param("right", "v")
            .param("skip_nulls", true)
            .build(),
    );
    assert!(lenient.passed);
    assert_eq!(lenient.total_count, 2);
}

#[test]
fn test_null_keys_in_duplicates_and_uniqueness() {
    let rows = vec![
        vec![DataValue::Null, DataValue::Int(1)],
        vec![DataValue::Null, DataValue::Int(1)],
        vec!["x".into(), DataValue::Int(1)],
    ];

    let duplicates = evaluate(
        rows.clone(),
        RuleSpecBuilder::new("duplicate_detection").param("field", "v").build(),
    );
    assert_eq!(duplicates.failed_count, 1);
    assert_eq!(duplicates.samples[0].value, "null");

    let unique = evaluate(rows, RuleSpecBuilder::new("uniqueness").param("field", "v").build());
    assert!(unique.passed);
    assert_eq!(unique.total_count, 1);
}

#[test]
fn test_conditions_treat_nulls_as_incomparable() {
    let ne = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("mandatory_field")
            .param("field", "v")
            .condition("w != 2")
            .build(),
    );
    // Rows 0, 2, 3, 4 are selected; 2 (NaN) and 3 (blank) fail.
    assert_eq!(ne.total_count, 4);
    assert_eq!(ne.failed_count, 2);

    let gt = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("mandatory_field")
            .param("field", "v")
            .condition("w > 0")
            .build(),
    );
    assert_eq!(gt.total_count, 3);

    let is_null = evaluate(
        with_nulls(),
        RuleSpecBuilder::new("mandatory_field")
            .param("field", "v")
            .condition("w IS NULL")
            .build(),
    );
    assert_eq!(is_null.total_count, 2);
    assert_eq!(is_null.failed_count, 1);
}

#[test]
fn test_outlier_ignores_nulls() {
    let rows = [Some(10.0), None, Some(11.0), Some(12.0), None, Some(10.5), Some(11.5)]
        .iter()
        .map(|v| vec![DataValue::from(*v), DataValue::Null])
        .collect();
    let result = evaluate(
        rows,
        RuleSpecBuilder::new("statistical_outlier").param("field", "v").build(),
    );
    assert!(result.passed);
    assert_eq!(result.total_count, 5);
}

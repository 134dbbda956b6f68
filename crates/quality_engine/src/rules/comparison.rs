use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::condition::CompareOp;
use crate::registry::{BuildContext, ParamReader};
use crate::value::compare;
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec};

/// Compares two columns of the same row, e.g. `start_date <= end_date`.
struct ComparisonRule {
    left: String,
    right: String,
    op: CompareOp,
    skip_nulls: bool,
    collector: FailureCollector,
}

impl RuleEvaluator for ComparisonRule {
    fn required_fields(&self) -> Vec<String> {
        vec![self.left.clone(), self.right.clone()]
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, _pass: u8) -> Result<(), EvaluationError> {
        let left = batch.require_column(&self.left)?;
        let right = batch.require_column(&self.right)?;
        let field = format!("{}, {}", self.left, self.right);

        for row in mask.selected() {
            let (l, r) = (&left[row], &right[row]);
            let absolute = batch.offset() + row as u64;

            if l.is_missing() || r.is_missing() {
                if self.skip_nulls {
                    continue;
                }
                self.collector.fail_with(absolute, &field, || {
                    (format!("{} vs {}", l, r), "comparison operand is null".to_string())
                });
                continue;
            }

            if self.op.holds(compare(l, r)) {
                self.collector.pass();
            } else {
                let op = self.op;
                let (left_name, right_name) = (&self.left, &self.right);
                self.collector.fail_with(absolute, &field, || {
                    (
                        format!("{} vs {}", l, r),
                        format!("expected {} {} {}", left_name, op, right_name),
                    )
                });
            }
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = format!("{} {} {}", self.left, self.op, self.right);
        Ok(self.collector.into_outcome(&subject))
    }
}

pub(crate) fn build(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let operator = params.required_string("operator")?;
    let op = CompareOp::parse(&operator)
        .ok_or_else(|| params.error(format!("unknown operator '{}'", operator)))?;

    Ok(Box::new(ComparisonRule {
        left: params.required_string("left")?,
        right: params.required_string("right")?,
        op,
        skip_nulls: params.flag("skip_nulls", false)?,
        collector: ctx.collector(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchSchema, DataValue};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn run(op: CompareOp, skip_nulls: bool) -> RuleOutcome {
        let schema = Arc::new(BatchSchema::of_strings(&["start", "end"]));
        let batch = Batch::from_rows(
            schema,
            vec![
                vec!["2024-01-01".into(), "2024-02-01".into()],
                vec!["2024-03-01".into(), "2024-02-01".into()],
                vec![DataValue::Null, "2024-02-01".into()],
            ],
            10,
        )
        .unwrap();
        let mut rule = ComparisonRule {
            left: "start".to_string(),
            right: "end".to_string(),
            op,
            skip_nulls,
            collector: FailureCollector::new(10),
        };
        rule.update(&batch, &RowMask::all(3), 1).unwrap();
        Box::new(rule).finalize().unwrap()
    }

    #[test]
    fn test_dates_compared_per_row() {
        let outcome = run(CompareOp::Le, true);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.total_count, 2);
        assert_eq!(outcome.samples[0].row, 11);
        assert_eq!(outcome.samples[0].message, "expected start <= end");
    }

    #[test]
    fn test_null_operand_fails_by_default() {
        let outcome = run(CompareOp::Le, false);
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.samples[1].message, "comparison operand is null");
    }
}

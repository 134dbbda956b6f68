use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::condition::{CompiledCondition, compile};
use crate::registry::{BuildContext, ParamReader};
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec};

/// Row-level assertion written in the condition language.
struct CustomRule {
    assertion: CompiledCondition,
    collector: FailureCollector,
}

impl RuleEvaluator for CustomRule {
    fn required_fields(&self) -> Vec<String> {
        self.assertion.fields().to_vec()
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, _pass: u8) -> Result<(), EvaluationError> {
        let holds = self.assertion.apply(batch)?;
        let fields = self.assertion.fields();
        let label = fields.join(", ");

        for row in mask.selected() {
            if holds.get(row) {
                self.collector.pass();
                continue;
            }
            let source = self.assertion.source();
            let context = batch.row(row);
            self.collector.fail_with(batch.offset() + row as u64, &label, || {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|f| match context.get(f) {
                        Ok(value) => format!("{}={}", f, value),
                        Err(_) => format!("{}=?", f),
                    })
                    .collect();
                (rendered.join(", "), format!("expression '{}' is false", source))
            });
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = self.assertion.source().to_string();
        Ok(self.collector.into_outcome(&subject))
    }
}

pub(crate) fn build(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let expression = params.required_string("expression")?;
    let assertion = compile(&expression)
        .map_err(|e| ConfigError::invalid_condition(expression.clone(), e.to_string()))?;

    Ok(Box::new(CustomRule {
        assertion,
        collector: ctx.collector(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchSchema, DataValue};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_false_rows_fail_with_rendered_fields() {
        let schema = Arc::new(BatchSchema::of_strings(&["qty", "price"]));
        let batch = Batch::from_rows(
            schema,
            vec![
                vec![DataValue::Int(2), DataValue::Float(9.5)],
                vec![DataValue::Int(0), DataValue::Float(9.5)],
                vec![DataValue::Int(1), DataValue::Null],
            ],
            0,
        )
        .unwrap();

        let mut rule = CustomRule {
            assertion: compile("qty > 0 and price IS NOT NULL").unwrap(),
            collector: FailureCollector::new(10),
        };
        rule.update(&batch, &RowMask::all(3), 1).unwrap();

        let outcome = Box::new(rule).finalize().unwrap();
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.samples[0].value, "qty=0, price=9.5");
        assert_eq!(outcome.samples[1].value, "qty=1, price=null");
        assert_eq!(
            outcome.samples[0].message,
            "expression 'qty > 0 and price IS NOT NULL' is false"
        );
    }
}

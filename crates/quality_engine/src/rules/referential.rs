use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::references::{ReferenceKey, ReferenceSets};
use crate::registry::{BuildContext, ParamReader};
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec};
use std::collections::HashSet;
use std::sync::Arc;

/// Every value of `field` must exist in the key set of another source.
///
/// Keys are compared by their rendered text, so an integer `1` in the primary
/// source matches a `"1"` read from a CSV reference.
struct ReferentialRule {
    field: String,
    key: ReferenceKey,
    skip_nulls: bool,
    keys: Option<Arc<HashSet<String>>>,
    collector: FailureCollector,
}

impl RuleEvaluator for ReferentialRule {
    fn required_fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, _pass: u8) -> Result<(), EvaluationError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| EvaluationError::reference(self.key.to_string(), "key set not loaded"))?;
        let column = batch.require_column(&self.field)?;

        for row in mask.selected() {
            let value = &column[row];
            let absolute = batch.offset() + row as u64;
            if value.is_missing() {
                if !self.skip_nulls {
                    self.collector
                        .fail(absolute, &self.field, value, || "value is null".to_string());
                }
                continue;
            }

            if keys.contains(&value.to_string()) {
                self.collector.pass();
            } else {
                let key = &self.key;
                self.collector
                    .fail(absolute, &self.field, value, || format!("value not found in {}", key));
            }
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = format!("{} -> {}", self.field, self.key);
        Ok(self.collector.into_outcome(&subject))
    }

    fn reference_requirements(&self) -> Vec<ReferenceKey> {
        vec![self.key.clone()]
    }

    fn bind_references(&mut self, sets: &ReferenceSets) -> Result<(), EvaluationError> {
        match sets.get(&self.key) {
            Some(Ok(keys)) => {
                self.keys = Some(Arc::clone(keys));
                Ok(())
            }
            Some(Err(message)) => Err(EvaluationError::reference(
                self.key.to_string(),
                message.clone(),
            )),
            None => Err(EvaluationError::reference(self.key.to_string(), "key set not loaded")),
        }
    }
}

pub(crate) fn build(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let field = params.required_string("field")?;
    let reference = params.required_string("reference")?;
    let reference_field = params
        .string("reference_field")?
        .unwrap_or_else(|| field.clone());

    Ok(Box::new(ReferentialRule {
        key: ReferenceKey::new(reference, reference_field),
        field,
        skip_nulls: params.flag("skip_nulls", true)?,
        keys: None,
        collector: ctx.collector(),
    }))
}

//! Conditional composition: nested rules scoped by a row condition.
//!
//! Rows matching the condition feed the `then` rules, the others feed the
//! `else` rules. Nested rules are built once and keep their state for the
//! whole stream, so a nested duplicate check sees every matching row.

use super::{ActiveRule, RuleEvaluator, RuleOutcome};
use crate::condition::CompiledCondition;
use crate::references::{ReferenceKey, ReferenceSets};
use crate::registry::{BuildContext, ParamReader};
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec, Severity};

struct ConditionalRule {
    condition: CompiledCondition,
    then_rules: Vec<ActiveRule>,
    else_rules: Vec<ActiveRule>,
}

impl ConditionalRule {
    fn nested(&self) -> impl Iterator<Item = &ActiveRule> {
        self.then_rules.iter().chain(&self.else_rules)
    }

    fn nested_mut(&mut self) -> impl Iterator<Item = &mut ActiveRule> {
        self.then_rules.iter_mut().chain(&mut self.else_rules)
    }
}

impl RuleEvaluator for ConditionalRule {
    fn required_fields(&self) -> Vec<String> {
        self.condition.fields().to_vec()
    }

    fn passes(&self) -> u8 {
        self.nested().map(ActiveRule::passes).max().unwrap_or(1)
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, pass: u8) -> Result<(), EvaluationError> {
        let matched = self.condition.apply(batch)?;
        let then_mask = mask.and(&matched);
        let else_mask = mask.and_not(&matched);

        for rule in &mut self.then_rules {
            rule.update(batch, &then_mask, pass);
        }
        for rule in &mut self.else_rules {
            rule.update(batch, &else_mask, pass);
        }
        Ok(())
    }

    fn end_pass(&mut self, pass: u8) -> Result<(), EvaluationError> {
        for rule in self.nested_mut() {
            rule.end_pass(pass);
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.nested().any(ActiveRule::is_failing)
    }

    fn failing_severity(&self, declared: Severity) -> Severity {
        self.nested()
            .filter(|r| r.is_failing())
            .map(ActiveRule::failing_severity)
            .max()
            .unwrap_or(declared)
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let ConditionalRule {
            condition,
            then_rules,
            else_rules,
        } = *self;

        let nested: Vec<_> = then_rules
            .into_iter()
            .chain(else_rules)
            .map(ActiveRule::finalize)
            .collect();

        let failed: Vec<_> = nested.iter().filter(|r| !r.passed).collect();
        let passed = failed.is_empty();
        let severity = failed.iter().map(|r| r.severity).max();
        let message = if passed {
            format!("when {}: all {} nested rules passed", condition.source(), nested.len())
        } else {
            format!(
                "when {}: {} of {} nested rules failed",
                condition.source(),
                failed.len(),
                nested.len()
            )
        };

        Ok(RuleOutcome {
            passed,
            message,
            failed_count: nested.iter().map(|r| r.failed_count).sum(),
            total_count: nested.iter().map(|r| r.total_count).sum(),
            samples: Vec::new(),
            severity,
            nested,
        })
    }

    fn owns_condition(&self) -> bool {
        true
    }

    fn reference_requirements(&self) -> Vec<ReferenceKey> {
        self.nested()
            .flat_map(ActiveRule::reference_requirements)
            .collect()
    }

    fn bind_references(&mut self, sets: &ReferenceSets) -> Result<(), EvaluationError> {
        for rule in self.nested_mut() {
            rule.bind_references(sets);
        }
        Ok(())
    }
}

fn build_branch(
    rules: &[RuleSpec],
    branch: &str,
    ctx: &BuildContext<'_>,
) -> Result<Vec<ActiveRule>, ConfigError> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.enabled)
        .map(|(i, rule)| {
            let id = match &rule.name {
                Some(name) => name.clone(),
                None => format!("{}/{}#{}", ctx.rule_id(), branch, i),
            };
            ctx.build_nested(rule, id)
        })
        .collect()
}

pub(crate) fn build(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let condition = ctx
        .condition()
        .cloned()
        .ok_or_else(|| params.error("a conditional rule requires a 'condition'"))?;
    if spec.then_rules.is_empty() && spec.else_rules.is_empty() {
        return Err(params.error("a conditional rule requires 'then' or 'else' rules"));
    }

    Ok(Box::new(ConditionalRule {
        condition,
        then_rules: build_branch(&spec.then_rules, "then", ctx)?,
        else_rules: build_branch(&spec.else_rules, "else", ctx)?,
    }))
}

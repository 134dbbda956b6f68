use super::RuleEvaluator;
use crate::condition::CompiledCondition;
use crate::references::{ReferenceKey, ReferenceSets};
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{RuleResult, RuleSpec, Severity};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
enum RuleState {
    Active,
    Frozen,
    Errored(String),
}

/// A constructed rule ready to consume batches.
///
/// Once a rule errors (missing field, evaluation error, panic) it stops
/// receiving batches and finalizes to a fixed failed result with zero counts,
/// whatever batch the error happened in.
pub struct ActiveRule {
    id: String,
    kind: String,
    severity: Severity,
    fail_fast: Option<bool>,
    condition: Option<CompiledCondition>,
    fields: Vec<String>,
    evaluator: Box<dyn RuleEvaluator>,
    state: RuleState,
    elapsed: Duration,
}

impl std::fmt::Debug for ActiveRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRule")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("severity", &self.severity)
            .field("state", &self.state)
            .finish()
    }
}

impl ActiveRule {
    /// Wraps an evaluator built from `spec`.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        spec: &RuleSpec,
        condition: Option<CompiledCondition>,
        evaluator: Box<dyn RuleEvaluator>,
    ) -> Self {
        let mut fields = evaluator.required_fields();
        if let Some(condition) = &condition {
            for field in condition.fields() {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }

        Self {
            id: id.into(),
            kind: kind.into(),
            severity: spec.severity,
            fail_fast: spec.fail_fast,
            condition,
            fields,
            evaluator,
            state: RuleState::Active,
            elapsed: Duration::ZERO,
        }
    }

    /// Rule identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized rule kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Declared severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Number of passes the evaluator needs.
    pub fn passes(&self) -> u8 {
        self.evaluator.passes()
    }

    /// Whether the rule still receives batches.
    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active
    }

    /// Whether the rule was stopped by fail-fast.
    pub fn is_frozen(&self) -> bool {
        self.state == RuleState::Frozen
    }

    /// The error that stopped the rule, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            RuleState::Errored(message) => Some(message),
            _ => None,
        }
    }

    /// Whether fail-fast applies, given the engine-wide flag.
    pub fn fail_fast(&self, engine_default: bool) -> bool {
        self.fail_fast.unwrap_or(engine_default)
    }

    /// Whether the rule is already known to fail.
    pub fn is_failing(&self) -> bool {
        match self.state {
            RuleState::Errored(_) => true,
            _ => self.evaluator.is_failing(),
        }
    }

    /// Severity the rule currently fails with.
    pub fn failing_severity(&self) -> Severity {
        match self.state {
            RuleState::Errored(_) => self.severity,
            _ => self.evaluator.failing_severity(self.severity),
        }
    }

    /// Stops feeding batches to this rule.
    pub fn freeze(&mut self) {
        if self.state == RuleState::Active {
            self.state = RuleState::Frozen;
        }
    }

    /// Reference key sets the rule needs.
    pub fn reference_requirements(&self) -> Vec<ReferenceKey> {
        self.evaluator.reference_requirements()
    }

    /// Hands the loaded reference sets to the evaluator.
    pub fn bind_references(&mut self, sets: &ReferenceSets) {
        if self.error().is_none() {
            self.guarded(|evaluator| evaluator.bind_references(sets));
        }
    }

    /// Feeds one batch restricted to the rows selected by `parent`.
    pub fn update(&mut self, batch: &Batch, parent: &RowMask, pass: u8) {
        if !self.is_active() || pass > self.passes() {
            return;
        }

        if let Some(field) = batch.missing_field(&self.fields) {
            let error = EvaluationError::field_not_found(field);
            self.fail(error.to_string());
            return;
        }

        let condition_mask = match &self.condition {
            Some(condition) if !self.evaluator.owns_condition() => Some(condition.apply(batch)),
            _ => None,
        };
        let mask = match condition_mask {
            None => parent.clone(),
            Some(Ok(selected)) => parent.and(&selected),
            Some(Err(error)) => {
                self.fail(error.to_string());
                return;
            }
        };

        self.guarded(|evaluator| evaluator.update(batch, &mask, pass));
    }

    /// Signals the end of a pass.
    pub fn end_pass(&mut self, pass: u8) {
        if self.error().is_some() || pass > self.passes() {
            return;
        }
        self.guarded(|evaluator| evaluator.end_pass(pass));
    }

    /// Turns the rule into an evaluation error when the source stopped
    /// before the rule's last pass ran.
    pub fn mark_incomplete(&mut self, passes_run: u8) {
        if self.error().is_none() && self.passes() > passes_run {
            self.fail(format!("evaluation incomplete: pass {} not run", passes_run + 1));
        }
    }

    /// Produces the final result. Every rule yields exactly one result.
    pub fn finalize(self) -> RuleResult {
        let ActiveRule {
            id,
            kind,
            severity,
            evaluator,
            state,
            mut elapsed,
            ..
        } = self;

        let outcome = match state {
            RuleState::Errored(message) => Err(message),
            RuleState::Active | RuleState::Frozen => {
                let start = Instant::now();
                let finalized = panic::catch_unwind(AssertUnwindSafe(|| evaluator.finalize()));
                elapsed += start.elapsed();
                match finalized {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(error)) => Err(error.to_string()),
                    Err(payload) => {
                        Err(EvaluationError::Panicked(panic_message(payload)).to_string())
                    }
                }
            }
        };

        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        match outcome {
            Ok(outcome) => RuleResult {
                rule: id,
                kind,
                severity: outcome.severity.unwrap_or(severity),
                passed: outcome.passed,
                message: outcome.message,
                failed_count: outcome.failed_count,
                total_count: outcome.total_count,
                samples: outcome.samples,
                duration_ms,
                error: None,
                nested: outcome.nested,
            },
            Err(message) => {
                warn!("Rule '{}' could not be evaluated: {}", id, message);
                RuleResult {
                    rule: id,
                    kind,
                    severity,
                    passed: false,
                    message: format!("rule could not be evaluated: {}", message),
                    failed_count: 0,
                    total_count: 0,
                    samples: Vec::new(),
                    duration_ms,
                    error: Some(message),
                    nested: Vec::new(),
                }
            }
        }
    }

    fn fail(&mut self, message: String) {
        warn!("Rule '{}' stopped: {}", self.id, message);
        self.state = RuleState::Errored(message);
    }

    fn guarded(
        &mut self,
        step: impl FnOnce(&mut dyn RuleEvaluator) -> Result<(), EvaluationError>,
    ) {
        let start = Instant::now();
        let evaluator = self.evaluator.as_mut();
        let result = panic::catch_unwind(AssertUnwindSafe(|| step(evaluator)));
        self.elapsed += start.elapsed();

        match result {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.fail(error.to_string()),
            Err(payload) => {
                self.fail(EvaluationError::Panicked(panic_message(payload)).to_string())
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

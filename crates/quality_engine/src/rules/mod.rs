//! Rule evaluators.
//!
//! Every rule kind implements [`RuleEvaluator`], an incremental fold over the
//! batch stream: `update` is called once per batch (per pass), `finalize` once
//! at the end. Evaluators own all of their state and perform no I/O.
//!
//! [`ActiveRule`] wraps an evaluator with its identity, severity and condition
//! and enforces the shared contract: missing fields, evaluation errors and
//! panics all become a failed result for that rule only.

mod active;
mod collector;
mod comparison;
mod conditional;
mod custom;
mod duplicates;
mod field;
mod outlier;
mod referential;

pub use active::ActiveRule;
pub use collector::FailureCollector;
pub use duplicates::KeyTracker;
pub use outlier::Welford;

use crate::references::{ReferenceKey, ReferenceSets};
use crate::{Batch, EvaluationError, Registry, RowMask};
use quality_core::{FailureSample, RuleResult, Severity};

/// Outcome produced by an evaluator at the end of the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Whether the rule passed
    pub passed: bool,
    /// Human-readable summary
    pub message: String,
    /// Number of failing checks
    pub failed_count: u64,
    /// Number of checks performed
    pub total_count: u64,
    /// Capped failure samples
    pub samples: Vec<FailureSample>,
    /// Effective severity when it differs from the declared one
    pub severity: Option<Severity>,
    /// Results of nested rules
    pub nested: Vec<RuleResult>,
}

/// Incremental evaluation of one rule.
pub trait RuleEvaluator: Send {
    /// Fields that must be present in every batch.
    fn required_fields(&self) -> Vec<String>;

    /// Number of passes over the data (1 or 2).
    fn passes(&self) -> u8 {
        1
    }

    /// Consumes the rows of `batch` selected by `mask`.
    fn update(&mut self, batch: &Batch, mask: &RowMask, pass: u8) -> Result<(), EvaluationError>;

    /// Called after the last batch of each pass.
    fn end_pass(&mut self, _pass: u8) -> Result<(), EvaluationError> {
        Ok(())
    }

    /// Whether the rule is already known to fail.
    fn is_failing(&self) -> bool;

    /// Severity the rule fails with, given its declared severity.
    fn failing_severity(&self, declared: Severity) -> Severity {
        declared
    }

    /// Produces the final outcome.
    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError>;

    /// True if the evaluator interprets the rule condition itself instead of
    /// having it applied as a row filter.
    fn owns_condition(&self) -> bool {
        false
    }

    /// Reference key sets this rule needs before the primary scan.
    fn reference_requirements(&self) -> Vec<ReferenceKey> {
        Vec::new()
    }

    /// Receives the loaded reference key sets.
    fn bind_references(&mut self, _sets: &ReferenceSets) -> Result<(), EvaluationError> {
        Ok(())
    }
}

/// Registers the built-in rule kinds.
pub fn register_builtins(registry: &mut Registry) {
    registry.register("mandatory_field", field::build_mandatory);
    registry.register("pattern_match", field::build_pattern);
    registry.register("allowed_values", field::build_allowed);
    registry.register("numeric_range", field::build_range);
    registry.register("date_format", field::build_date_format);
    registry.register("duplicate_detection", duplicates::build_duplicate_detection);
    registry.register("uniqueness", duplicates::build_uniqueness);
    registry.register("cross_field_comparison", comparison::build);
    registry.register("statistical_outlier", outlier::build);
    registry.register("conditional", conditional::build);
    registry.register("referential_integrity", referential::build);
    registry.register("custom", custom::build);
}

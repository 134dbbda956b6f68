//! Results and reports.
//!
//! Everything here is produced once by the engine and never mutated afterward:
//! a [`RuleResult`] per rule, a [`SourceReport`] per data source and a
//! [`JobReport`] for the whole run. Status rollups are pure functions of the
//! results they summarize.

use crate::{ColumnInfo, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One concrete violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSample {
    /// Absolute row index across all batches
    pub row: u64,

    /// Field the violation was found in
    pub field: String,

    /// Observed value, rendered as text
    pub value: String,

    /// Description of the violation
    pub message: String,
}

/// Final verdict of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Rule identity
    pub rule: String,

    /// Rule kind
    pub kind: String,

    /// Effective severity
    pub severity: Severity,

    /// Whether the rule passed
    pub passed: bool,

    /// Human-readable summary
    pub message: String,

    /// Number of failing checks
    pub failed_count: u64,

    /// Number of checks performed
    pub total_count: u64,

    /// Failure samples, at most the configured cap
    #[serde(default)]
    pub samples: Vec<FailureSample>,

    /// Wall-clock time spent in this rule
    pub duration_ms: f64,

    /// Set when the rule could not be evaluated (missing field, evaluation error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Results of nested rules (conditional rules)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<RuleResult>,
}

impl RuleResult {
    /// Returns true if this result failed with the given severity.
    pub fn failed_with(&self, severity: Severity) -> bool {
        !self.passed && self.severity == severity
    }

    fn zero_timing(&mut self) {
        self.duration_ms = 0.0;
        for nested in &mut self.nested {
            nested.zero_timing();
        }
    }
}

/// Outcome of a source or of the whole job.
///
/// Ordered from best to worst so that rollups take the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every rule passed
    Passed,
    /// Only warning-severity rules failed
    Warning,
    /// At least one error-severity rule failed
    Failed,
    /// Evaluation stopped before the source was fully read
    Aborted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Passed => "PASSED",
            Status::Warning => "WARNING",
            Status::Failed => "FAILED",
            Status::Aborted => "ABORTED",
        };
        f.write_str(label)
    }
}

/// Why a source was not fully evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// An error-severity rule scoped to fail-fast failed
    FailFast {
        /// Rule that triggered the abort
        rule: String,
        /// 1-based number of the last batch processed
        batch: u64,
    },
    /// The batch source failed
    SourceError {
        /// Source error message
        message: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::FailFast { rule, batch } => {
                write!(f, "fail-fast triggered by '{}' after batch {}", rule, batch)
            }
            AbortReason::SourceError { message } => write!(f, "source error: {}", message),
        }
    }
}

/// Lightweight description of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Total row count, when the source knows it up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Columns of the source
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// All results for one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Source name
    pub source: String,

    /// Rolled-up status
    pub status: Status,

    /// Source metadata
    pub metadata: SourceMetadata,

    /// Rows pulled from the source in the first pass
    pub rows_processed: u64,

    /// Batches pulled from the source in the first pass
    pub batches_processed: u64,

    /// Number of passes over the data (2 when a rule needs finalized statistics)
    pub passes: u8,

    /// One result per active rule, in declaration order
    pub results: Vec<RuleResult>,

    /// Set when evaluation stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,

    /// Wall-clock time for the source
    pub duration_ms: f64,
}

impl SourceReport {
    /// Derives the status of a source from its results.
    ///
    /// Aborted sources are always `Aborted`; otherwise a failed error-severity
    /// result fails the source and a failed warning-severity result downgrades
    /// it to `Warning`.
    pub fn derive_status(results: &[RuleResult], aborted: Option<&AbortReason>) -> Status {
        if aborted.is_some() {
            return Status::Aborted;
        }
        if results.iter().any(|r| r.failed_with(Severity::Error)) {
            Status::Failed
        } else if results.iter().any(|r| r.failed_with(Severity::Warning)) {
            Status::Warning
        } else {
            Status::Passed
        }
    }

    /// Number of failed results.
    pub fn failed_rules(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Copy of the report with every timing zeroed.
    pub fn normalized(&self) -> Self {
        let mut report = self.clone();
        report.duration_ms = 0.0;
        for result in &mut report.results {
            result.zero_timing();
        }
        report
    }
}

/// Counts across all sources of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSummary {
    /// Number of sources
    pub sources: usize,
    /// Sources that passed
    pub passed: usize,
    /// Sources with warnings only
    pub warnings: usize,
    /// Sources that failed
    pub failed: usize,
    /// Sources that were aborted
    pub aborted: usize,
    /// Rule results across all sources
    pub rules_total: usize,
    /// Failed rule results across all sources
    pub rules_failed: usize,
}

/// Report for a complete job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    /// Worst status among sources
    pub status: Status,

    /// Counts
    pub summary: JobSummary,

    /// Per-source reports, in input order
    pub sources: Vec<SourceReport>,

    /// Wall-clock time for the whole job
    pub duration_ms: f64,
}

impl JobReport {
    /// Aggregates source reports into a job report.
    pub fn aggregate(sources: Vec<SourceReport>, duration_ms: f64) -> Self {
        let mut summary = JobSummary {
            sources: sources.len(),
            ..Default::default()
        };

        for source in &sources {
            match source.status {
                Status::Passed => summary.passed += 1,
                Status::Warning => summary.warnings += 1,
                Status::Failed => summary.failed += 1,
                Status::Aborted => summary.aborted += 1,
            }
            summary.rules_total += source.results.len();
            summary.rules_failed += source.failed_rules();
        }

        let status = sources
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(Status::Passed);

        Self {
            status,
            summary,
            sources,
            duration_ms,
        }
    }

    /// Returns true if no source failed or was aborted.
    pub fn passed(&self) -> bool {
        self.status <= Status::Warning
    }

    /// Maps the job outcome to a process exit code.
    ///
    /// `0` when every source passed (warnings allowed), `1` when a source failed
    /// or was aborted by fail-fast, `2` when a source could not be read.
    pub fn exit_code(&self) -> i32 {
        let source_error = self
            .sources
            .iter()
            .any(|s| matches!(s.aborted, Some(AbortReason::SourceError { .. })));
        if source_error {
            2
        } else if self.passed() {
            0
        } else {
            1
        }
    }

    /// Returns a copy with every timing field zeroed.
    ///
    /// Two runs over the same input and configuration produce identical
    /// normalized reports.
    pub fn normalized(&self) -> Self {
        Self {
            duration_ms: 0.0,
            sources: self.sources.iter().map(SourceReport::normalized).collect(),
            ..self.clone()
        }
    }
}

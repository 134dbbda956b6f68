use super::RuleOutcome;
use crate::DataValue;
use quality_core::FailureSample;

/// Counts checks and keeps the first failures up to a fixed cap.
///
/// Samples are recorded in stream order, so for a given input the retained
/// samples do not depend on how the input was split into batches.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureCollector {
    cap: usize,
    failed: u64,
    total: u64,
    samples: Vec<FailureSample>,
}

impl FailureCollector {
    /// Creates a collector retaining at most `cap` samples.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            failed: 0,
            total: 0,
            samples: Vec::new(),
        }
    }

    /// Records a passing check.
    pub fn pass(&mut self) {
        self.total += 1;
    }

    /// Records a failing check on a single value.
    pub fn fail(
        &mut self,
        row: u64,
        field: &str,
        value: &DataValue,
        message: impl FnOnce() -> String,
    ) {
        self.fail_with(row, field, || (value.to_string(), message()));
    }

    /// Records a failing check; `describe` yields the rendered value and the
    /// message and is only called while the sample cap is not reached.
    pub fn fail_with(
        &mut self,
        row: u64,
        field: &str,
        describe: impl FnOnce() -> (String, String),
    ) {
        self.total += 1;
        self.failed += 1;
        if self.samples.len() < self.cap {
            let (value, message) = describe();
            self.samples.push(FailureSample {
                row,
                field: field.to_string(),
                value,
                message,
            });
        }
    }

    /// Number of failing checks.
    pub fn failed_count(&self) -> u64 {
        self.failed
    }

    /// Number of checks.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Whether any check failed.
    pub fn is_failing(&self) -> bool {
        self.failed > 0
    }

    /// Retained samples.
    pub fn samples(&self) -> &[FailureSample] {
        &self.samples
    }

    /// Converts the counts into an outcome described by `subject`.
    pub fn into_outcome(self, subject: &str) -> RuleOutcome {
        let passed = self.failed == 0;
        let message = if passed {
            format!("{}: {} checked, all passed", subject, self.total)
        } else {
            format!("{}: {} of {} failed", subject, self.failed, self.total)
        };
        RuleOutcome {
            passed,
            message,
            failed_count: self.failed,
            total_count: self.total,
            samples: self.samples,
            severity: None,
            nested: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cap_is_exact() {
        let mut collector = FailureCollector::new(3);
        for row in 0..10 {
            collector.fail(row, "f", &DataValue::Int(row as i64), || "bad".to_string());
        }
        collector.pass();

        assert_eq!(collector.failed_count(), 10);
        assert_eq!(collector.total_count(), 11);
        let rows: Vec<u64> = collector.samples().iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_cap_counts_without_samples() {
        let mut collector = FailureCollector::new(0);
        collector.fail_with(0, "f", || panic!("not rendered past the cap"));
        assert_eq!(collector.failed_count(), 1);
        assert!(collector.samples().is_empty());
    }

    #[test]
    fn test_outcome_message() {
        let mut collector = FailureCollector::new(5);
        collector.pass();
        collector.fail(1, "email", &DataValue::Null, || "value is null".to_string());
        let outcome = collector.into_outcome("email");
        assert!(!outcome.passed);
        assert_eq!(outcome.message, "email: 1 of 2 failed");
        assert_eq!(outcome.samples[0].value, "null");
    }
}

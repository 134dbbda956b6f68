//! Statistical outlier detection.
//!
//! Outliers can only be judged against statistics of the complete column, so
//! the rule takes two passes: the first accumulates, the second flags. The
//! orchestrator provides the second pass by resetting the source or by
//! replaying buffered batches.

use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::registry::{BuildContext, ParamReader};
use crate::{Batch, EvaluationError, RowMask};
use quality_core::{ConfigError, RuleSpec};

/// Streaming mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the observations.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, if at least two values were seen.
    pub fn std_dev(&self) -> Option<f64> {
        (self.count >= 2).then(|| (self.m2 / (self.count - 1) as f64).sqrt())
    }

    /// Mean and sample standard deviation of every observation except one
    /// occurrence of `x`. `None` when fewer than two other values remain.
    pub fn without(&self, x: f64) -> Option<(f64, f64)> {
        if self.count < 3 {
            return None;
        }
        let n = self.count as f64;
        let mean = (n * self.mean - x) / (n - 1.0);
        let m2 = (self.m2 - (x - self.mean) * (x - mean)).max(0.0);
        Some((mean, (m2 / (n - 2.0)).sqrt()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Method {
    ZScore { threshold: f64, leave_one_out: bool },
    Iqr { k: f64 },
}

struct OutlierRule {
    field: String,
    method: Method,
    stats: Welford,
    /// Every numeric value, kept for IQR quartiles only.
    values: Vec<f64>,
    bounds: Option<(f64, f64)>,
    collector: FailureCollector,
}

/// Quantile by linear interpolation between closest ranks. `sorted` must be non-empty.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

impl OutlierRule {
    /// Returns a failure message when `x` is an outlier.
    fn judge(&self, x: f64) -> Option<String> {
        match self.method {
            Method::ZScore {
                threshold,
                leave_one_out: true,
            } => {
                let (mean, std) = self.stats.without(x)?;
                if std == 0.0 {
                    return (x != mean).then(|| format!("value differs from constant {}", mean));
                }
                let z = (x - mean).abs() / std;
                (z > threshold).then(|| format!("z-score {:.2} exceeds {}", z, threshold))
            }
            Method::ZScore {
                threshold,
                leave_one_out: false,
            } => {
                let std = self.stats.std_dev().filter(|s| *s > 0.0)?;
                let z = (x - self.stats.mean()).abs() / std;
                (z > threshold).then(|| format!("z-score {:.2} exceeds {}", z, threshold))
            }
            Method::Iqr { .. } => {
                let (low, high) = self.bounds?;
                (x < low || x > high).then(|| format!("value outside [{}, {}]", low, high))
            }
        }
    }
}

impl RuleEvaluator for OutlierRule {
    fn required_fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn passes(&self) -> u8 {
        2
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, pass: u8) -> Result<(), EvaluationError> {
        let column = batch.require_column(&self.field)?;

        for row in mask.selected() {
            let value = &column[row];
            if value.is_missing() {
                continue;
            }
            let x = value.to_number().ok_or_else(|| {
                EvaluationError::coercion(&self.field, value.to_string(), "number")
            })?;

            if pass == 1 {
                self.stats.push(x);
                if matches!(self.method, Method::Iqr { .. }) {
                    self.values.push(x);
                }
                continue;
            }

            match self.judge(x) {
                None => self.collector.pass(),
                Some(message) => {
                    self.collector
                        .fail(batch.offset() + row as u64, &self.field, value, || message)
                }
            }
        }
        Ok(())
    }

    fn end_pass(&mut self, pass: u8) -> Result<(), EvaluationError> {
        if let (1, Method::Iqr { k }) = (pass, self.method) {
            if !self.values.is_empty() {
                let mut sorted = std::mem::take(&mut self.values);
                sorted.sort_by(f64::total_cmp);
                let q1 = quantile(&sorted, 0.25);
                let q3 = quantile(&sorted, 0.75);
                let iqr = q3 - q1;
                self.bounds = Some((q1 - k * iqr, q3 + k * iqr));
            }
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = match self.method {
            Method::ZScore { threshold, .. } => format!("{} (zscore > {})", self.field, threshold),
            Method::Iqr { k } => format!("{} (iqr x {})", self.field, k),
        };
        Ok(self.collector.into_outcome(&subject))
    }
}

pub(crate) fn build(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let field = params.required_string("field")?;
    let method = params
        .string("method")?
        .unwrap_or_else(|| "zscore".to_string());

    let method = match method.to_lowercase().as_str() {
        "zscore" | "z_score" | "z-score" => Method::ZScore {
            threshold: params.number_or("threshold", 3.0)?,
            leave_one_out: params.flag("leave_one_out", true)?,
        },
        "iqr" => Method::Iqr {
            k: params.number_or("threshold", 1.5)?,
        },
        other => return Err(params.error(format!("unknown outlier method '{}'", other))),
    };
    let threshold = match method {
        Method::ZScore { threshold, .. } => threshold,
        Method::Iqr { k } => k,
    };
    if threshold <= 0.0 || !threshold.is_finite() {
        return Err(params.error("parameter 'threshold' must be a positive number"));
    }

    Ok(Box::new(OutlierRule {
        field,
        method,
        stats: Welford::new(),
        values: Vec::new(),
        bounds: None,
        collector: ctx.collector(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchSchema, DataValue};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn two_passes(method: Method, values: &[f64]) -> RuleOutcome {
        let schema = Arc::new(BatchSchema::of_strings(&["x"]));
        let rows = values.iter().map(|v| vec![DataValue::Float(*v)]).collect();
        let batch = Batch::from_rows(schema, rows, 0).unwrap();
        let mask = RowMask::all(values.len());

        let mut rule = OutlierRule {
            field: "x".to_string(),
            method,
            stats: Welford::new(),
            values: Vec::new(),
            bounds: None,
            collector: FailureCollector::new(10),
        };
        for pass in 1..=2 {
            rule.update(&batch, &mask, pass).unwrap();
            rule.end_pass(pass).unwrap();
        }
        Box::new(rule).finalize().unwrap()
    }

    fn flagged(outcome: &RuleOutcome) -> Vec<String> {
        outcome.samples.iter().map(|s| s.value.clone()).collect()
    }

    #[test]
    fn test_welford_matches_direct_computation() {
        let mut stats = Welford::new();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(x);
        }
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        assert!((stats.std_dev().unwrap() - 2.138_089_935).abs() < 1e-9);
    }

    #[test]
    fn test_welford_removal() {
        let mut all = Welford::new();
        let mut rest = Welford::new();
        for x in [10.0, 12.0, 11.0, 13.0] {
            all.push(x);
            rest.push(x);
        }
        all.push(1000.0);

        let (mean, std) = all.without(1000.0).unwrap();
        assert!((mean - rest.mean()).abs() < 1e-9);
        assert!((std - rest.std_dev().unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_zscore_flags_single_extreme_value() {
        let method = Method::ZScore {
            threshold: 3.0,
            leave_one_out: true,
        };
        let outcome = two_passes(method, &[10.0, 12.0, 11.0, 13.0, 1000.0]);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(flagged(&outcome), vec!["1000"]);
    }

    #[test]
    fn test_plain_zscore_is_masked_by_the_outlier() {
        let method = Method::ZScore {
            threshold: 3.0,
            leave_one_out: false,
        };
        let outcome = two_passes(method, &[10.0, 12.0, 11.0, 13.0, 1000.0]);
        assert!(outcome.passed);
    }

    #[test]
    fn test_iqr_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 50.0];
        let outcome = two_passes(Method::Iqr { k: 1.5 }, &values);
        assert_eq!(flagged(&outcome), vec!["50"]);
        assert_eq!(outcome.total_count, 8);
    }

    #[test]
    fn test_constant_column_has_no_outliers() {
        let method = Method::ZScore {
            threshold: 3.0,
            leave_one_out: true,
        };
        assert!(two_passes(method, &[5.0, 5.0, 5.0, 5.0]).passed);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), 1.75);
        assert_eq!(quantile(&sorted, 0.75), 3.25);
        assert_eq!(quantile(&[7.0], 0.5), 7.0);
    }
}

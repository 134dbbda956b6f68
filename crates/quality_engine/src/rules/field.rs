//! Per-value rules: each selected cell of each listed field is checked on its own.

use super::{FailureCollector, RuleEvaluator, RuleOutcome};
use crate::registry::{BuildContext, ParamReader};
use crate::{Batch, DataValue, EvaluationError, RowMask};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use quality_core::{ConfigError, RuleSpec};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::collections::HashSet;

pub(crate) enum Verdict {
    Skip,
    Pass,
    Fail(&'static str),
}

pub(crate) trait ValueCheck: Send {
    fn check(&self, value: &DataValue) -> Verdict;

    /// Extra context appended to failure messages.
    fn detail(&self) -> Option<String> {
        None
    }
}

pub(crate) struct FieldRule<C> {
    fields: Vec<String>,
    check: C,
    collector: FailureCollector,
}

impl<C: ValueCheck> FieldRule<C> {
    fn new(fields: Vec<String>, check: C, collector: FailureCollector) -> Self {
        Self {
            fields,
            check,
            collector,
        }
    }
}

impl<C: ValueCheck> RuleEvaluator for FieldRule<C> {
    fn required_fields(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn update(&mut self, batch: &Batch, mask: &RowMask, _pass: u8) -> Result<(), EvaluationError> {
        let columns = self
            .fields
            .iter()
            .map(|f| batch.require_column(f))
            .collect::<Result<Vec<_>, _>>()?;

        for row in mask.selected() {
            for (field, column) in self.fields.iter().zip(&columns) {
                let value = &column[row];
                match self.check.check(value) {
                    Verdict::Skip => {}
                    Verdict::Pass => self.collector.pass(),
                    Verdict::Fail(reason) => {
                        let check = &self.check;
                        let at = batch.offset() + row as u64;
                        self.collector.fail(at, field, value, || match check.detail() {
                            Some(detail) => format!("{} ({})", reason, detail),
                            None => reason.to_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn is_failing(&self) -> bool {
        self.collector.is_failing()
    }

    fn finalize(self: Box<Self>) -> Result<RuleOutcome, EvaluationError> {
        let subject = self.fields.join(", ");
        Ok(self.collector.into_outcome(&subject))
    }
}

fn as_text(value: &DataValue) -> Cow<'_, str> {
    match value {
        DataValue::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

struct MandatoryCheck {
    allow_blank: bool,
}

impl ValueCheck for MandatoryCheck {
    fn check(&self, value: &DataValue) -> Verdict {
        match value {
            v if v.is_missing() => Verdict::Fail("value is null"),
            DataValue::String(s) if !self.allow_blank && s.trim().is_empty() => {
                Verdict::Fail("value is blank")
            }
            _ => Verdict::Pass,
        }
    }
}

pub(crate) fn build_mandatory(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let check = MandatoryCheck {
        allow_blank: params.flag("allow_blank", false)?,
    };
    Ok(Box::new(FieldRule::new(params.fields()?, check, ctx.collector())))
}

struct PatternCheck {
    pattern: String,
    regex: Regex,
}

impl ValueCheck for PatternCheck {
    fn check(&self, value: &DataValue) -> Verdict {
        if value.is_missing() {
            return Verdict::Skip;
        }
        if self.regex.is_match(&as_text(value)) {
            Verdict::Pass
        } else {
            Verdict::Fail("value does not match pattern")
        }
    }

    fn detail(&self) -> Option<String> {
        Some(format!("pattern '{}'", self.pattern))
    }
}

pub(crate) fn build_pattern(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let pattern = params.required_string("pattern")?;
    let anchored = if params.flag("full_match", true)? {
        format!("^(?:{})$", pattern)
    } else {
        pattern.clone()
    };
    let regex = RegexBuilder::new(&anchored)
        .case_insensitive(params.flag("case_insensitive", false)?)
        .build()
        .map_err(|e| params.error(format!("invalid regex pattern '{}': {}", pattern, e)))?;

    let check = PatternCheck { pattern, regex };
    Ok(Box::new(FieldRule::new(params.fields()?, check, ctx.collector())))
}

struct AllowedCheck {
    allowed: HashSet<String>,
    case_sensitive: bool,
    listing: String,
}

impl ValueCheck for AllowedCheck {
    fn check(&self, value: &DataValue) -> Verdict {
        if value.is_missing() {
            return Verdict::Skip;
        }
        let text = as_text(value);
        let found = if self.case_sensitive {
            self.allowed.contains(text.as_ref())
        } else {
            self.allowed.contains(&text.to_lowercase())
        };
        if found {
            Verdict::Pass
        } else {
            Verdict::Fail("value not in allowed set")
        }
    }

    fn detail(&self) -> Option<String> {
        Some(format!("allowed: {}", self.listing))
    }
}

pub(crate) fn build_allowed(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let values = params
        .list("values")?
        .ok_or_else(|| params.error("missing required parameter 'values'"))?;
    if values.is_empty() {
        return Err(params.error("parameter 'values' must not be empty"));
    }
    let case_sensitive = params.flag("case_sensitive", true)?;

    let listing = values.join(", ");
    let allowed = values
        .into_iter()
        .map(|v| if case_sensitive { v } else { v.to_lowercase() })
        .collect();

    let check = AllowedCheck {
        allowed,
        case_sensitive,
        listing,
    };
    Ok(Box::new(FieldRule::new(params.fields()?, check, ctx.collector())))
}

struct RangeCheck {
    min: Option<f64>,
    max: Option<f64>,
    inclusive: bool,
}

impl ValueCheck for RangeCheck {
    fn check(&self, value: &DataValue) -> Verdict {
        if value.is_missing() {
            return Verdict::Skip;
        }
        let Some(x) = value.to_number() else {
            return Verdict::Fail("value is not numeric");
        };
        let below = self
            .min
            .is_some_and(|min| if self.inclusive { x < min } else { x <= min });
        let above = self
            .max
            .is_some_and(|max| if self.inclusive { x > max } else { x >= max });
        if below || above {
            Verdict::Fail("value out of range")
        } else {
            Verdict::Pass
        }
    }

    fn detail(&self) -> Option<String> {
        let (open, close) = if self.inclusive { ('[', ']') } else { ('(', ')') };
        let min = self.min.map(|m| m.to_string()).unwrap_or_else(|| "-inf".into());
        let max = self.max.map(|m| m.to_string()).unwrap_or_else(|| "inf".into());
        Some(format!("expected {}{}, {}{}", open, min, max, close))
    }
}

pub(crate) fn build_range(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let min = params.number("min")?;
    let max = params.number("max")?;
    match (min, max) {
        (None, None) => return Err(params.error("at least one of 'min' or 'max' is required")),
        (Some(lo), Some(hi)) if lo > hi => {
            return Err(params.error(format!("'min' ({}) is greater than 'max' ({})", lo, hi)));
        }
        _ => {}
    }

    let check = RangeCheck {
        min,
        max,
        inclusive: params.flag("inclusive", true)?,
    };
    Ok(Box::new(FieldRule::new(params.fields()?, check, ctx.collector())))
}

struct DateFormatCheck {
    format: String,
}

impl ValueCheck for DateFormatCheck {
    fn check(&self, value: &DataValue) -> Verdict {
        match value {
            v if v.is_missing() => Verdict::Skip,
            DataValue::Date(_) | DataValue::Timestamp(_) => Verdict::Pass,
            other => {
                let text = as_text(other);
                let text = text.trim();
                let parses = NaiveDate::parse_from_str(text, &self.format).is_ok()
                    || NaiveDateTime::parse_from_str(text, &self.format).is_ok();
                if parses {
                    Verdict::Pass
                } else {
                    Verdict::Fail("value does not match date format")
                }
            }
        }
    }

    fn detail(&self) -> Option<String> {
        Some(format!("format '{}'", self.format))
    }
}

pub(crate) fn build_date_format(
    spec: &RuleSpec,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn RuleEvaluator>, ConfigError> {
    let params = ParamReader::new(spec);
    let format = params
        .string("format")?
        .unwrap_or_else(|| "%Y-%m-%d".to_string());
    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        return Err(params.error(format!("invalid date format '{}'", format)));
    }

    let check = DateFormatCheck { format };
    Ok(Box::new(FieldRule::new(params.fields()?, check, ctx.collector())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mandatory_check() {
        let strict = MandatoryCheck { allow_blank: false };
        assert!(matches!(strict.check(&DataValue::Null), Verdict::Fail(_)));
        assert!(matches!(strict.check(&DataValue::Float(f64::NAN)), Verdict::Fail(_)));
        assert!(matches!(strict.check(&"  ".into()), Verdict::Fail("value is blank")));
        assert!(matches!(strict.check(&DataValue::Int(0)), Verdict::Pass));

        let lenient = MandatoryCheck { allow_blank: true };
        assert!(matches!(lenient.check(&"".into()), Verdict::Pass));
    }

    #[test]
    fn test_range_check_bounds() {
        let inclusive = RangeCheck {
            min: Some(0.0),
            max: Some(10.0),
            inclusive: true,
        };
        assert!(matches!(inclusive.check(&DataValue::Int(10)), Verdict::Pass));
        assert!(matches!(inclusive.check(&"11".into()), Verdict::Fail(_)));
        assert!(matches!(inclusive.check(&"abc".into()), Verdict::Fail("value is not numeric")));
        assert!(matches!(inclusive.check(&DataValue::Null), Verdict::Skip));

        let exclusive = RangeCheck {
            min: Some(0.0),
            max: None,
            inclusive: false,
        };
        assert!(matches!(exclusive.check(&DataValue::Int(0)), Verdict::Fail(_)));
        assert_eq!(exclusive.detail().unwrap(), "expected (0, inf)");
    }

    #[test]
    fn test_date_format_check() {
        let check = DateFormatCheck {
            format: "%d/%m/%Y".to_string(),
        };
        assert!(matches!(check.check(&"31/12/2024".into()), Verdict::Pass));
        assert!(matches!(check.check(&"2024-12-31".into()), Verdict::Fail(_)));
        assert!(matches!(check.check(&"31/02/2024".into()), Verdict::Fail(_)));
    }

    #[test]
    fn test_allowed_check_case_folding() {
        let check = AllowedCheck {
            allowed: ["active".to_string()].into_iter().collect(),
            case_sensitive: false,
            listing: "active".to_string(),
        };
        assert!(matches!(check.check(&"ACTIVE".into()), Verdict::Pass));
        assert!(matches!(check.check(&"closed".into()), Verdict::Fail(_)));
    }
}

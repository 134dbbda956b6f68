//! Cell values and the comparison semantics shared by conditions and rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;

/// A value in a batch column.
///
/// Every column can hold `Null`. Float `NaN` behaves like null in comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Null/missing value
    Null,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Date and time without timezone
    Timestamp(NaiveDateTime),
}

impl DataValue {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Returns true if this value is null or a NaN float.
    pub fn is_missing(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::String(_) => "string",
            DataValue::Int(_) => "integer",
            DataValue::Float(_) => "float",
            DataValue::Bool(_) => "boolean",
            DataValue::Date(_) => "date",
            DataValue::Timestamp(_) => "timestamp",
        }
    }

    /// Attempts to get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets this value as a number. Numeric strings are accepted.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            DataValue::Int(i) => Some(*i as f64),
            DataValue::Float(f) => Some(*f),
            DataValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Interprets this value as a point in time. Dates map to midnight.
    pub fn to_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            DataValue::Timestamp(ts) => Some(*ts),
            DataValue::Date(d) => d.and_hms_opt(0, 0, 0),
            DataValue::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    fn to_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            DataValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, DataValue::Int(_) | DataValue::Float(_))
    }

    fn is_temporal(&self) -> bool {
        matches!(self, DataValue::Date(_) | DataValue::Timestamp(_))
    }
}

/// Compares two values.
///
/// Returns `None` when either side is missing or the pair is incomparable.
/// Typed values coerce a string on the other side to their own type; two
/// strings compare numerically, then as dates, then lexicographically.
pub fn compare(left: &DataValue, right: &DataValue) -> Option<Ordering> {
    use DataValue::*;

    if left.is_missing() || right.is_missing() {
        return None;
    }

    match (left, right) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (Date(a), Date(b)) => Some(a.cmp(b)),
        (String(a), String(b)) => {
            if let (Some(x), Some(y)) = (parse_number(a), parse_number(b)) {
                return x.partial_cmp(&y);
            }
            if let (Some(x), Some(y)) = (parse_timestamp(a), parse_timestamp(b)) {
                return Some(x.cmp(&y));
            }
            Some(a.cmp(b))
        }
        _ if left.is_numeric() || right.is_numeric() => {
            let (x, y) = (left.to_number()?, right.to_number()?);
            x.partial_cmp(&y)
        }
        _ if left.is_temporal() || right.is_temporal() => {
            Some(left.to_timestamp()?.cmp(&right.to_timestamp()?))
        }
        (Bool(_), _) | (_, Bool(_)) => Some(left.to_bool()?.cmp(&right.to_bool()?)),
        _ => None,
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "null"),
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Float(v) => write!(f, "{}", v),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DataValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Int(i)
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(d: NaiveDate) -> Self {
        DataValue::Date(d)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

/// Hashable structural form of a value, used for key tracking.
///
/// Integral floats collapse onto integers so `1` and `1.0` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Str(String),
    Int(i64),
    Float(u64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl From<&DataValue> for KeyValue {
    fn from(value: &DataValue) -> Self {
        match value {
            DataValue::Null => KeyValue::Null,
            DataValue::String(s) => KeyValue::Str(s.clone()),
            DataValue::Int(i) => KeyValue::Int(*i),
            DataValue::Float(f) if f.is_nan() => KeyValue::Null,
            DataValue::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
            {
                KeyValue::Int(*f as i64)
            }
            DataValue::Float(f) => KeyValue::Float(f.to_bits()),
            DataValue::Bool(b) => KeyValue::Bool(*b),
            DataValue::Date(d) => KeyValue::Date(*d),
            DataValue::Timestamp(ts) => KeyValue::Timestamp(*ts),
        }
    }
}

/// Parses a trimmed decimal number. Words like `inf` or `nan` are rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let first = s.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 || s.chars().filter(|c| *c == '-').count() != 2 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parses a point in time leniently.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM:SS[.f]`,
/// `YYYY-MM-DDTHH:MM:SS[.f]` and plain dates (midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    if s.len() >= 19 {
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Some(naive);
            }
        }
    }

    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> DataValue {
        DataValue::Date(parse_date(s).unwrap())
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(compare(&DataValue::Int(1), &DataValue::Int(2)), Some(Ordering::Less));
        assert_eq!(compare(&DataValue::Float(2.5), &DataValue::Int(2)), Some(Ordering::Greater));
        assert_eq!(compare(&"10".into(), &DataValue::Int(9)), Some(Ordering::Greater));
    }

    #[test]
    fn test_string_pairs_prefer_numbers_then_dates() {
        assert_eq!(compare(&"10".into(), &"9".into()), Some(Ordering::Greater));
        assert_eq!(
            compare(&"2024-01-10".into(), &"2024-01-09".into()),
            Some(Ordering::Greater)
        );
        assert_eq!(compare(&"b".into(), &"a".into()), Some(Ordering::Greater));
    }

    #[test]
    fn test_dates_and_timestamps() {
        assert_eq!(compare(&date("2024-01-01"), &"2024-01-02".into()), Some(Ordering::Less));
        let ts = DataValue::Timestamp(parse_timestamp("2024-01-01 10:00:00").unwrap());
        assert_eq!(compare(&date("2024-01-01"), &ts), Some(Ordering::Less));
    }

    #[test]
    fn test_missing_and_incomparable() {
        assert_eq!(compare(&DataValue::Null, &DataValue::Int(1)), None);
        assert_eq!(compare(&DataValue::Float(f64::NAN), &DataValue::Int(1)), None);
        assert_eq!(compare(&"abc".into(), &DataValue::Int(1)), None);
        assert_eq!(compare(&true.into(), &DataValue::Int(1)), None);
        assert_eq!(compare(&true.into(), &"true".into()), Some(Ordering::Equal));
    }

    #[test]
    fn test_key_value_normalization() {
        assert_eq!(KeyValue::from(&DataValue::Float(1.0)), KeyValue::Int(1));
        assert_ne!(KeyValue::from(&DataValue::Float(1.5)), KeyValue::Int(1));
        assert_ne!(
            KeyValue::from(&DataValue::String("1".into())),
            KeyValue::from(&DataValue::Int(1))
        );
    }

    #[test]
    fn test_parse_number_rejects_words() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-15T10:30:00Z").is_some());
        assert!(parse_timestamp("2024-01-15 10:30:00").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00.250").is_some());
        assert!(parse_timestamp("2024-01-15").is_some());
        assert!(parse_timestamp("15/01/2024").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataValue::Null.to_string(), "null");
        assert_eq!(DataValue::Float(1.0).to_string(), "1");
        assert_eq!(date("2024-03-01").to_string(), "2024-03-01");
        let ts = DataValue::Timestamp(parse_timestamp("2024-03-01 08:00:00").unwrap());
        assert_eq!(ts.to_string(), "2024-03-01 08:00:00");
    }
}

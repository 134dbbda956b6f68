//! Rule definitions.
//!
//! A [`RuleSpec`] is the declarative, immutable description of one check: which
//! kind of rule to run, how severe a failure is, its kind-specific parameters and
//! an optional row condition restricting the rows it applies to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a rule failure.
///
/// Ordered so that `Warning < Error`; the most severe failure wins when
/// results are rolled up.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Severity {
    /// A failure is reported but does not fail the job
    #[serde(
        rename = "WARNING",
        alias = "warning",
        alias = "Warning",
        alias = "WARN",
        alias = "warn"
    )]
    Warning,
    /// A failure fails the job
    #[default]
    #[serde(rename = "ERROR", alias = "error", alias = "Error")]
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// List of values
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "string",
            ParamValue::List(_) => "list",
        }
    }

    /// Attempts to get this value as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get this value as a float. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempts to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get this value as a list.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders a scalar as the text it would be compared with.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::List(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Kind-specific rule parameters, keyed by name.
///
/// Ordered so that serialized suites and reports are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a parameter by name.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns true if the parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Iterates over parameter names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Declarative definition of one rule.
///
/// # Example
///
/// ```rust
/// use quality_core::{RuleSpec, Severity};
///
/// let spec = RuleSpec::new("numeric_range");
/// assert_eq!(spec.severity, Severity::Error);
/// assert!(spec.enabled);
/// assert_eq!(spec.identity("0"), "numeric_range#0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Optional human-readable identity; generated from the kind when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Rule kind identifier (e.g. "mandatory_field")
    pub kind: String,

    /// Severity of a failure
    #[serde(default)]
    pub severity: Severity,

    /// Kind-specific parameters
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,

    /// Row condition restricting the rows this rule applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Disabled rules are skipped entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-rule override of the engine's fail-fast flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,

    /// Nested rules applied to rows matching the condition (conditional rules)
    #[serde(default, rename = "then", skip_serializing_if = "Vec::is_empty")]
    pub then_rules: Vec<RuleSpec>,

    /// Nested rules applied to rows not matching the condition (conditional rules)
    #[serde(default, rename = "else", skip_serializing_if = "Vec::is_empty")]
    pub else_rules: Vec<RuleSpec>,
}

fn default_enabled() -> bool {
    true
}

impl RuleSpec {
    /// Creates an enabled, error-severity rule of the given kind with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            severity: Severity::Error,
            params: Params::new(),
            condition: None,
            enabled: true,
            fail_fast: None,
            then_rules: Vec::new(),
            else_rules: Vec::new(),
        }
    }

    /// Returns the display identity of this rule at the given position.
    pub fn identity(&self, position: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}#{}", self.kind, position),
        }
    }
}

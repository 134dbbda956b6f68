//! Suite, source and engine configuration types.
//!
//! A [`QualitySuite`] bundles the engine settings, the data sources to check,
//! the reference sources used by referential rules, and the rule lists.

use crate::{ConfigError, RuleSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Default cap on failure samples retained per rule.
pub const DEFAULT_MAX_SAMPLE_FAILURES: usize = 100;

/// Whether a fail-fast trigger stops the whole source or only the failing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailFastScope {
    /// Stop pulling batches for the source
    #[default]
    Source,
    /// Stop feeding the failing rule only
    Rule,
}

/// Settings controlling how the engine streams and evaluates data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Rows per batch
    pub batch_size: usize,

    /// Maximum number of failure samples kept per rule
    pub max_sample_failures: usize,

    /// Abort once an error-severity rule is known to have failed
    pub fail_fast: bool,

    /// What a fail-fast trigger aborts
    pub fail_fast_scope: FailFastScope,

    /// Worker threads used to evaluate sources in parallel (None = runtime default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_sample_failures: DEFAULT_MAX_SAMPLE_FAILURES,
            fail_fast: false,
            fail_fast_scope: FailFastScope::Source,
            parallelism: None,
        }
    }
}

impl EngineSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the per-rule failure sample cap.
    pub fn with_max_sample_failures(mut self, cap: usize) -> Self {
        self.max_sample_failures = cap;
        self
    }

    /// Enables or disables fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Sets the fail-fast scope.
    pub fn with_fail_fast_scope(mut self, scope: FailFastScope) -> Self {
        self.fail_fast_scope = scope;
        self
    }

    /// Sets the number of worker threads.
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    /// Checks that the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidSettings(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.parallelism == Some(0) {
            return Err(ConfigError::InvalidSettings(
                "parallelism must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logical column type of a batch column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// UTF-8 text
    #[default]
    String,
    /// 64-bit signed integer
    #[serde(alias = "int", alias = "int64", alias = "long")]
    Integer,
    /// 64-bit float
    #[serde(alias = "double", alias = "float64", alias = "number")]
    Float,
    /// Boolean
    #[serde(alias = "bool")]
    Boolean,
    /// Calendar date
    Date,
    /// Date and time without timezone
    #[serde(alias = "datetime")]
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub data_type: ColumnType,
}

impl ColumnInfo {
    /// Creates a new column description.
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Physical format of a file-backed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Comma separated values
    Csv,
    /// Tab separated values
    Tsv,
}

impl DataFormat {
    /// Infers the format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "tsv" | "tab" => Some(DataFormat::Tsv),
            _ => None,
        }
    }

    /// Field delimiter for the format.
    pub fn delimiter(&self) -> u8 {
        match self {
            DataFormat::Csv => b',',
            DataFormat::Tsv => b'\t',
        }
    }
}

/// A file-backed data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Unique source name, used in reports and by referential rules
    pub name: String,

    /// File path, relative paths resolve against the suite file
    pub path: String,

    /// File format; inferred from the extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,

    /// Field delimiter override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,

    /// Declared column types; undeclared columns are read as strings
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnType>,

    /// Rules applied to this source only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

impl SourceSpec {
    /// Creates a source spec with no declared columns or rules.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format: None,
            delimiter: None,
            columns: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

/// A complete quality suite: settings, sources and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySuite {
    /// Suite name
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Engine settings
    #[serde(default)]
    pub settings: EngineSettings,

    /// Sources only read to build reference key sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SourceSpec>,

    /// Sources to validate
    pub sources: Vec<SourceSpec>,

    /// Rules applied to every source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

impl QualitySuite {
    /// Returns the rules that apply to a source: suite-wide rules first, then
    /// the source's own rules.
    pub fn rules_for(&self, source: &SourceSpec) -> Vec<RuleSpec> {
        self.rules
            .iter()
            .chain(source.rules.iter())
            .cloned()
            .collect()
    }

    /// Finds a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Finds a reference source by name.
    pub fn reference(&self, name: &str) -> Option<&SourceSpec> {
        self.references.iter().find(|s| s.name == name)
    }

    /// Total number of rule definitions, counting nested rules.
    pub fn rule_count(&self) -> usize {
        fn count(rules: &[RuleSpec]) -> usize {
            rules
                .iter()
                .map(|r| 1 + count(&r.then_rules) + count(&r.else_rules))
                .sum()
        }
        count(&self.rules) + self.sources.iter().map(|s| count(&s.rules)).sum::<usize>()
    }
}

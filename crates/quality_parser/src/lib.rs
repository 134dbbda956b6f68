//! Parser for Data Quality suites (YAML/TOML formats).
//!
//! This module parses suite files into the strongly-typed `QualitySuite`
//! structure and rejects suites that are structurally unusable (no sources,
//! duplicate names, empty paths, invalid settings) before any data is read.
//!
//! # Example
//!
//! ```rust
//! use quality_parser::parse_yaml;
//!
//! let yaml = r#"
//! name: orders_suite
//! sources:
//!   - name: orders
//!     path: orders.csv
//! rules:
//!   - kind: mandatory_field
//!     params:
//!       field: id
//! "#;
//!
//! let suite = parse_yaml(yaml).expect("Failed to parse suite");
//! assert_eq!(suite.name, "orders_suite");
//! ```

use quality_core::QualitySuite;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during suite parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// TOML parsing or deserialization failed
    #[error("Failed to parse TOML: {0}")]
    TomlError(String),

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,

    /// The suite parsed but is structurally unusable
    #[error("Invalid suite: {0}")]
    InvalidSuite(String),
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported suite file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

/// Parse a suite from a YAML string.
///
/// # Example
///
/// ```rust
/// use quality_parser::parse_yaml;
///
/// let yaml = r#"
/// name: events
/// settings:
///   batch_size: 1000
/// sources:
///   - name: events
///     path: events.csv
/// "#;
///
/// let suite = parse_yaml(yaml).unwrap();
/// assert_eq!(suite.settings.batch_size, 1000);
/// ```
pub fn parse_yaml(content: &str) -> Result<QualitySuite> {
    let suite: QualitySuite = serde_yaml_ng::from_str(content)?;
    validate_suite(&suite)?;
    Ok(suite)
}

/// Parse a suite from a TOML string.
///
/// # Example
///
/// ```rust
/// use quality_parser::parse_toml;
///
/// let toml = r#"
/// name = "events"
///
/// [[sources]]
/// name = "events"
/// path = "events.csv"
/// "#;
///
/// let suite = parse_toml(toml).unwrap();
/// assert_eq!(suite.sources[0].name, "events");
/// ```
pub fn parse_toml(content: &str) -> Result<QualitySuite> {
    let suite: QualitySuite =
        toml::from_str(content).map_err(|e| ParserError::TomlError(e.to_string()))?;
    validate_suite(&suite)?;
    Ok(suite)
}

/// Detect the suite format from a file path based on its extension.
///
/// # Supported Extensions
///
/// * `.yaml`, `.yml` → `SuiteFormat::Yaml`
/// * `.toml` → `SuiteFormat::Toml`
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<SuiteFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(SuiteFormat::Yaml),
        "toml" => Ok(SuiteFormat::Toml),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a suite from a file with automatic format detection.
///
/// # Example
///
/// ```no_run
/// use quality_parser::parse_file;
/// use std::path::Path;
///
/// let suite = parse_file(Path::new("suites/orders.yml")).unwrap();
/// println!("Loaded suite: {}", suite.name);
/// ```
pub fn parse_file(path: &Path) -> Result<QualitySuite> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        SuiteFormat::Yaml => parse_yaml(&content),
        SuiteFormat::Toml => parse_toml(&content),
    }
}

/// Checks the structural invariants of a parsed suite.
///
/// Rule kinds and parameters are not checked here; they are resolved by the
/// engine's registry.
pub fn validate_suite(suite: &QualitySuite) -> Result<()> {
    if suite.sources.is_empty() {
        return Err(ParserError::InvalidSuite(
            "at least one source is required".to_string(),
        ));
    }

    for (label, specs) in [("source", &suite.sources), ("reference", &suite.references)] {
        let mut seen = HashSet::new();
        for spec in specs {
            if spec.name.trim().is_empty() {
                return Err(ParserError::InvalidSuite(format!("{} name is empty", label)));
            }
            if spec.path.trim().is_empty() {
                return Err(ParserError::InvalidSuite(format!(
                    "{} '{}' has an empty path",
                    label, spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ParserError::InvalidSuite(format!(
                    "duplicate {} name '{}'",
                    label, spec.name
                )));
            }
        }
    }

    suite
        .settings
        .validate()
        .map_err(|e| ParserError::InvalidSuite(e.to_string()))
}

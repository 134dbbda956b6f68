//! Error types for evaluation, batch sources and condition parsing.

use thiserror::Error;

/// Errors raised while a rule consumes data.
///
/// These never escape the engine: they are converted into a failed
/// `RuleResult` at the rule boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    /// A field named by the rule or its condition is absent from the batch
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// A value could not be interpreted as the type the rule needs
    #[error("cannot interpret value '{value}' of field '{field}' as {expected}")]
    Coercion {
        field: String,
        value: String,
        expected: String,
    },

    /// A reference key set could not be used
    #[error("reference '{reference}' unavailable: {message}")]
    Reference { reference: String, message: String },

    /// The evaluator panicked
    #[error("rule panicked: {0}")]
    Panicked(String),

    /// Any other evaluator-defined failure
    #[error("{0}")]
    Custom(String),
}

impl EvaluationError {
    /// Creates a new field not found error.
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    /// Creates a new coercion error.
    pub fn coercion(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Coercion {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Creates a new reference error.
    pub fn reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by a batch source. Fatal for the source being read.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Data that cannot be turned into a rectangular batch
    #[error("malformed data: {0}")]
    Malformed(String),

    /// The source cannot be rewound
    #[error("source '{0}' does not support reset")]
    ResetUnsupported(String),

    /// A reference source name is not known to the provider
    #[error("unknown reference source '{0}'")]
    UnknownReference(String),
}

impl SourceError {
    /// Creates a new malformed data error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Syntax error in a condition expression.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// Byte offset in the expression
    pub position: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

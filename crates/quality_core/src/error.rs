//! Error types for rule configuration.
//!
//! Configuration errors are structural: they are raised while turning rule
//! specs into evaluators, before a single batch is read, and are never retried.

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while resolving a rule list into runnable evaluators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The rule kind was never registered
    #[error("Unknown rule kind: '{0}'")]
    UnknownRuleKind(String),

    /// Required parameters are missing or have the wrong type
    #[error("Invalid parameters for rule kind '{kind}': {message}")]
    InvalidParams {
        /// Rule kind whose parameters were rejected
        kind: String,
        /// What is wrong with the parameters
        message: String,
    },

    /// A condition expression could not be parsed
    #[error("Invalid condition '{expression}': {message}")]
    InvalidCondition {
        /// The offending expression
        expression: String,
        /// Parser message, including the position
        message: String,
    },

    /// Engine settings are out of range
    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),
}

impl ConfigError {
    /// Creates a new invalid parameters error.
    pub fn invalid_params(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid condition error.
    pub fn invalid_condition(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnknownRuleKind("checksum".to_string());
        assert_eq!(err.to_string(), "Unknown rule kind: 'checksum'");

        let err =
            ConfigError::invalid_params("numeric_range", "missing required parameter 'field'");
        assert_eq!(
            err.to_string(),
            "Invalid parameters for rule kind 'numeric_range': missing required parameter 'field'"
        );
    }
}

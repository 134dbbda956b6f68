//! Builder pattern for creating rules and suites.
//!
//! This module provides ergonomic builders for constructing rule specs and
//! quality suites in code with a fluent API.

use crate::{EngineSettings, ParamValue, Params, QualitySuite, RuleSpec, Severity, SourceSpec};

/// Builder for creating a `RuleSpec`.
///
/// # Example
///
/// ```rust
/// use quality_core::{RuleSpecBuilder, Severity};
///
/// let rule = RuleSpecBuilder::new("numeric_range")
///     .name("amount_range")
///     .severity(Severity::Warning)
///     .param("field", "amount")
///     .param("min", 0)
///     .param("max", 500.0)
///     .condition("status == 'active'")
///     .build();
///
/// assert_eq!(rule.name.as_deref(), Some("amount_range"));
/// assert_eq!(rule.params.len(), 3);
/// ```
#[derive(Debug)]
pub struct RuleSpecBuilder {
    spec: RuleSpec,
}

impl RuleSpecBuilder {
    /// Creates a builder for a rule of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            spec: RuleSpec::new(kind),
        }
    }

    /// Sets the rule name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.spec.severity = severity;
        self
    }

    /// Shorthand for warning severity.
    pub fn warning(self) -> Self {
        self.severity(Severity::Warning)
    }

    /// Sets a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.spec.params.insert(key, value);
        self
    }

    /// Replaces all parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.spec.params = params;
        self
    }

    /// Sets the row condition.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.spec.condition = Some(condition.into());
        self
    }

    /// Enables or disables the rule.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.spec.enabled = enabled;
        self
    }

    /// Overrides the engine fail-fast flag for this rule.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.spec.fail_fast = Some(fail_fast);
        self
    }

    /// Adds a nested rule applied when the condition holds.
    pub fn then_rule(mut self, rule: RuleSpec) -> Self {
        self.spec.then_rules.push(rule);
        self
    }

    /// Adds a nested rule applied when the condition does not hold.
    pub fn else_rule(mut self, rule: RuleSpec) -> Self {
        self.spec.else_rules.push(rule);
        self
    }

    /// Builds the rule spec.
    pub fn build(self) -> RuleSpec {
        self.spec
    }
}

/// Builder for creating a `QualitySuite`.
///
/// # Example
///
/// ```rust
/// use quality_core::{QualitySuiteBuilder, RuleSpecBuilder, SourceSpec};
///
/// let suite = QualitySuiteBuilder::new("orders_suite")
///     .description("Nightly order checks")
///     .source(SourceSpec::new("orders", "data/orders.csv"))
///     .rule(RuleSpecBuilder::new("mandatory_field").param("field", "id").build())
///     .build();
///
/// assert_eq!(suite.sources.len(), 1);
/// assert_eq!(suite.rule_count(), 1);
/// ```
#[derive(Debug)]
pub struct QualitySuiteBuilder {
    suite: QualitySuite,
}

impl QualitySuiteBuilder {
    /// Creates a builder for a suite with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            suite: QualitySuite {
                name: name.into(),
                description: None,
                settings: EngineSettings::default(),
                references: Vec::new(),
                sources: Vec::new(),
                rules: Vec::new(),
            },
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.suite.description = Some(description.into());
        self
    }

    /// Sets the engine settings.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.suite.settings = settings;
        self
    }

    /// Adds a source to validate.
    pub fn source(mut self, source: SourceSpec) -> Self {
        self.suite.sources.push(source);
        self
    }

    /// Adds a reference source.
    pub fn reference(mut self, reference: SourceSpec) -> Self {
        self.suite.references.push(reference);
        self
    }

    /// Adds a suite-wide rule.
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.suite.rules.push(rule);
        self
    }

    /// Builds the suite.
    pub fn build(self) -> QualitySuite {
        self.suite
    }
}

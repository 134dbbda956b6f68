//! Rule registry: maps rule kinds to factories.
//!
//! The registry is a plain value handed to the orchestrator, so callers can add
//! their own kinds next to the built-in ones without touching engine code.

use crate::condition::{CompiledCondition, compile};
use crate::rules::{ActiveRule, FailureCollector, RuleEvaluator, register_builtins};
use quality_core::{ConfigError, EngineSettings, ParamValue, Params, RuleSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds an evaluator from a rule spec.
pub type RuleFactory = Arc<
    dyn Fn(&RuleSpec, &BuildContext<'_>) -> Result<Box<dyn RuleEvaluator>, ConfigError>
        + Send
        + Sync,
>;

/// Registry of rule kinds.
///
/// # Example
///
/// ```rust
/// use quality_engine::Registry;
///
/// let registry = Registry::with_builtins();
/// assert!(registry.contains("Mandatory-Field"));
/// assert!(!registry.contains("checksum"));
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, RuleFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Kind identifiers are case-insensitive and treat `-` like `_`.
pub fn normalize_kind(kind: &str) -> String {
    kind.trim().to_lowercase().replace('-', "_")
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in rule kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Registers (or replaces) the factory for a kind.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&RuleSpec, &BuildContext<'_>) -> Result<Box<dyn RuleEvaluator>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(normalize_kind(kind), Arc::new(factory));
    }

    /// Whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(&normalize_kind(kind))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the rule declared at `position`.
    pub fn construct(
        &self,
        spec: &RuleSpec,
        settings: &EngineSettings,
        position: usize,
    ) -> Result<ActiveRule, ConfigError> {
        self.construct_with_id(spec, settings, spec.identity(&position.to_string()))
    }

    /// Builds a rule with an explicit identity.
    pub fn construct_with_id(
        &self,
        spec: &RuleSpec,
        settings: &EngineSettings,
        id: String,
    ) -> Result<ActiveRule, ConfigError> {
        let kind = normalize_kind(&spec.kind);
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ConfigError::UnknownRuleKind(spec.kind.clone()))?;

        let condition = spec
            .condition
            .as_deref()
            .map(|expression| {
                compile(expression)
                    .map_err(|e| ConfigError::invalid_condition(expression, e.to_string()))
            })
            .transpose()?;

        let ctx = BuildContext {
            registry: self,
            settings,
            rule_id: &id,
            condition: condition.as_ref(),
        };
        let evaluator = (**factory)(spec, &ctx)?;
        Ok(ActiveRule::new(id, kind, spec, condition, evaluator))
    }

    /// Builds every enabled rule; disabled rules keep their position.
    pub fn construct_all(
        &self,
        specs: &[RuleSpec],
        settings: &EngineSettings,
    ) -> Result<Vec<ActiveRule>, ConfigError> {
        specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.enabled)
            .map(|(position, spec)| self.construct(spec, settings, position))
            .collect()
    }
}

/// What a factory gets to see while building an evaluator.
pub struct BuildContext<'a> {
    registry: &'a Registry,
    settings: &'a EngineSettings,
    rule_id: &'a str,
    condition: Option<&'a CompiledCondition>,
}

impl<'a> BuildContext<'a> {
    /// Identity of the rule being built.
    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    /// Engine settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    /// The rule's compiled condition, if it declares one.
    pub fn condition(&self) -> Option<&CompiledCondition> {
        self.condition
    }

    /// A failure collector capped at the configured sample count.
    pub fn collector(&self) -> FailureCollector {
        FailureCollector::new(self.settings.max_sample_failures)
    }

    /// Builds a nested rule through the same registry.
    pub fn build_nested(&self, spec: &RuleSpec, id: String) -> Result<ActiveRule, ConfigError> {
        self.registry.construct_with_id(spec, self.settings, id)
    }
}

/// Typed access to rule parameters with uniform error messages.
pub struct ParamReader<'s> {
    kind: &'s str,
    params: &'s Params,
}

impl<'s> ParamReader<'s> {
    /// Reads the parameters of `spec`.
    pub fn new(spec: &'s RuleSpec) -> Self {
        Self {
            kind: &spec.kind,
            params: &spec.params,
        }
    }

    /// An `InvalidParams` error for this rule kind.
    pub fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::invalid_params(self.kind, message)
    }

    fn mistyped(&self, key: &str, expected: &str, value: &ParamValue) -> ConfigError {
        self.error(format!(
            "parameter '{}' must be a {}, got {}",
            key,
            expected,
            value.type_name()
        ))
    }

    fn missing(&self, key: &str) -> ConfigError {
        self.error(format!("missing required parameter '{}'", key))
    }

    /// Optional text parameter.
    pub fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.mistyped(key, "string", other)),
        }
    }

    /// Required, non-empty text parameter.
    pub fn required_string(&self, key: &str) -> Result<String, ConfigError> {
        match self.string(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(self.error(format!("parameter '{}' must not be empty", key))),
            None => Err(self.missing(key)),
        }
    }

    /// Optional numeric parameter. Integers widen to floats.
    pub fn number(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.mistyped(key, "number", value)),
        }
    }

    /// Numeric parameter with a default.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    /// Boolean parameter with a default.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| self.mistyped(key, "boolean", value)),
        }
    }

    /// Optional list of scalars, rendered as text.
    pub fn list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        let items = value
            .as_list()
            .ok_or_else(|| self.mistyped(key, "list", value))?;
        items
            .iter()
            .map(|item| {
                item.to_text().ok_or_else(|| {
                    self.error(format!("parameter '{}' must not contain nested lists", key))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Target fields from `fields` (list) or `field` (name), if either is set.
    pub fn optional_fields(&self) -> Result<Option<Vec<String>>, ConfigError> {
        let fields = match (self.list("fields")?, self.params.get("field")) {
            (Some(fields), _) => fields,
            (None, None) => return Ok(None),
            (None, Some(ParamValue::List(_))) => self.list("field")?.unwrap_or_default(),
            (None, Some(_)) => vec![self.required_string("field")?],
        };
        if fields.is_empty() {
            return Err(self.error("parameter 'fields' must not be empty"));
        }
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(self.error("field names must not be empty"));
        }
        Ok(Some(fields))
    }

    /// Target fields; at least one is required.
    pub fn fields(&self) -> Result<Vec<String>, ConfigError> {
        self.optional_fields()?.ok_or_else(|| self.missing("field"))
    }
}

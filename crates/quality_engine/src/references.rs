//! Reference key sets for referential integrity checks.
//!
//! Every `(source, field)` pair requested by a rule is scanned once, completely,
//! before any primary source is evaluated. The resulting key sets are immutable
//! and shared between rules and worker threads.

use crate::SourceError;
use crate::sources::{BatchSource, MemorySource};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// A field of a reference source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceKey {
    /// Reference source name
    pub source: String,
    /// Field holding the keys
    pub field: String,
}

impl ReferenceKey {
    /// Creates a new reference key.
    pub fn new(source: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.field)
    }
}

/// Opens reference sources by name.
pub trait ReferenceProvider {
    /// Opens a fresh stream over the named reference source.
    fn open_reference(&self, name: &str) -> Result<Box<dyn BatchSource>, SourceError>;
}

/// A provider with no references at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceProvider for NoReferences {
    fn open_reference(&self, name: &str) -> Result<Box<dyn BatchSource>, SourceError> {
        Err(SourceError::UnknownReference(name.to_string()))
    }
}

/// In-memory reference sources, keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct MemoryReferences {
    sources: BTreeMap<String, MemorySource>,
}

impl MemoryReferences {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source under its own name.
    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.insert(source);
        self
    }

    /// Adds a source under its own name.
    pub fn insert(&mut self, source: MemorySource) {
        self.sources.insert(source.name().to_string(), source);
    }
}

impl ReferenceProvider for MemoryReferences {
    fn open_reference(&self, name: &str) -> Result<Box<dyn BatchSource>, SourceError> {
        self.sources
            .get(name)
            .map(|source| Box::new(source.clone()) as Box<dyn BatchSource>)
            .ok_or_else(|| SourceError::UnknownReference(name.to_string()))
    }
}

/// Loaded key sets. A set that failed to load keeps its error message, which
/// the dependent rules report as their own failure.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
    sets: BTreeMap<ReferenceKey, Result<Arc<HashSet<String>>, String>>,
}

impl ReferenceSets {
    /// Loads every distinct requirement with one full scan each.
    pub fn load(
        requirements: impl IntoIterator<Item = ReferenceKey>,
        provider: &dyn ReferenceProvider,
    ) -> Self {
        let distinct: BTreeSet<ReferenceKey> = requirements.into_iter().collect();
        let mut sets = BTreeMap::new();

        for key in distinct {
            let loaded = match scan(&key, provider) {
                Ok(keys) => {
                    info!("Loaded reference {} ({} distinct keys)", key, keys.len());
                    Ok(Arc::new(keys))
                }
                Err(message) => {
                    warn!("Failed to load reference {}: {}", key, message);
                    Err(message)
                }
            };
            sets.insert(key, loaded);
        }

        Self { sets }
    }

    /// The key set for `key`, if it was requested.
    pub fn get(&self, key: &ReferenceKey) -> Option<&Result<Arc<HashSet<String>>, String>> {
        self.sets.get(key)
    }

    /// Number of requested key sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True if no key set was requested.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

fn scan(key: &ReferenceKey, provider: &dyn ReferenceProvider) -> Result<HashSet<String>, String> {
    let mut source = provider
        .open_reference(&key.source)
        .map_err(|e| e.to_string())?;
    let mut keys = HashSet::new();

    while let Some(batch) = source.next_batch().map_err(|e| e.to_string())? {
        let column = batch.column(&key.field).ok_or_else(|| {
            format!("field '{}' not found in reference '{}'", key.field, key.source)
        })?;
        keys.extend(
            column
                .iter()
                .filter(|value| !value.is_missing())
                .map(|value| value.to_string()),
        );
    }
    Ok(keys)
}

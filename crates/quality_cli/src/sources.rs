//! File-backed sources and references of a suite.
//!
//! Relative paths in the suite resolve against the suite file's directory.
//! Paths given on the command line are used as-is.

use anyhow::{Context, Result, bail};
use quality_core::{QualitySuite, SourceSpec};
use quality_engine::{BatchSource, CsvOptions, CsvSource, ReferenceProvider, SourceError, SourceJob};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved file locations for every source and reference of a suite.
#[derive(Debug, Clone)]
pub struct SuiteFiles {
    sources: Vec<(SourceSpec, PathBuf)>,
    references: BTreeMap<String, (SourceSpec, PathBuf)>,
    batch_size: usize,
}

impl SuiteFiles {
    /// Resolves the paths of `suite`, located at `suite_path`, applying
    /// command-line overrides by name.
    pub fn resolve(
        suite: &QualitySuite,
        suite_path: &Path,
        overrides: &[(String, PathBuf)],
    ) -> Result<Self> {
        let base = suite_path.parent().unwrap_or_else(|| Path::new(""));

        for (name, _) in overrides {
            if suite.source(name).is_none() && suite.reference(name).is_none() {
                bail!("cannot override unknown source '{}'", name);
            }
        }

        let locate = |spec: &SourceSpec| -> PathBuf {
            match overrides.iter().rev().find(|(name, _)| *name == spec.name) {
                Some((_, path)) => path.clone(),
                None => resolve_path(base, &spec.path),
            }
        };

        let sources: Vec<(SourceSpec, PathBuf)> = suite
            .sources
            .iter()
            .map(|spec| (spec.clone(), locate(spec)))
            .collect();

        // Primary sources can be referenced too; declared references win.
        let mut references: BTreeMap<String, (SourceSpec, PathBuf)> = sources
            .iter()
            .map(|(spec, path)| (spec.name.clone(), (spec.clone(), path.clone())))
            .collect();
        for spec in &suite.references {
            references.insert(spec.name.clone(), (spec.clone(), locate(spec)));
        }

        Ok(Self {
            sources,
            references,
            batch_size: suite.settings.batch_size,
        })
    }

    /// Overrides the batch size used to read files.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Whether a name can be resolved as a reference.
    pub fn has_reference(&self, name: &str) -> bool {
        self.references.contains_key(name)
    }

    /// Primary sources with their resolved paths, in suite order.
    pub fn sources(&self) -> &[(SourceSpec, PathBuf)] {
        &self.sources
    }

    /// Opens every primary source and pairs it with its rules.
    pub fn jobs(&self, suite: &QualitySuite) -> Result<Vec<SourceJob>> {
        self.sources()
            .iter()
            .map(|(spec, path)| {
                let source = open(spec, path, self.batch_size).with_context(|| {
                    format!("Failed to open source '{}' at {}", spec.name, path.display())
                })?;
                Ok(SourceJob::new(Box::new(source), suite.rules_for(spec)))
            })
            .collect()
    }
}

impl ReferenceProvider for SuiteFiles {
    fn open_reference(&self, name: &str) -> Result<Box<dyn BatchSource>, SourceError> {
        let (spec, path) = self
            .references
            .get(name)
            .ok_or_else(|| SourceError::UnknownReference(name.to_string()))?;
        Ok(Box::new(open(spec, path, self.batch_size)?))
    }
}

fn open(spec: &SourceSpec, path: &Path, batch_size: usize) -> Result<CsvSource, SourceError> {
    debug!("Opening '{}' from {}", spec.name, path.display());
    CsvSource::open(&spec.name, path, CsvOptions::from_spec(spec, batch_size))
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

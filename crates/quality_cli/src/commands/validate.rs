use anyhow::{Context, Result};
use quality_core::EngineSettings;
use quality_engine::{JobRunner, Registry};
use quality_parser::parse_file;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::OutputFormat;
use crate::commands::check::build_rules;
use crate::output;
use crate::sources::SuiteFiles;

/// Command-line overrides of the suite settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub sources: Vec<(String, PathBuf)>,
    pub batch_size: Option<usize>,
    pub max_samples: Option<usize>,
    pub fail_fast: bool,
    pub parallelism: Option<usize>,
}

impl Overrides {
    fn apply(&self, mut settings: EngineSettings) -> EngineSettings {
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(cap) = self.max_samples {
            settings.max_sample_failures = cap;
        }
        if self.fail_fast {
            settings.fail_fast = true;
        }
        if let Some(threads) = self.parallelism {
            settings.parallelism = Some(threads);
        }
        settings
    }
}

pub fn execute(
    suite_path: &Path,
    overrides: Overrides,
    format: OutputFormat,
    output_path: Option<&Path>,
) -> Result<u8> {
    info!("Validating suite: {}", suite_path.display());

    let mut suite = parse_file(suite_path)
        .with_context(|| format!("Failed to parse suite file: {}", suite_path.display()))?;
    suite.settings = overrides.apply(suite.settings);
    suite
        .settings
        .validate()
        .context("Invalid settings after command-line overrides")?;

    info!(
        "Batch size: {}, max samples: {}, fail-fast: {}",
        suite.settings.batch_size, suite.settings.max_sample_failures, suite.settings.fail_fast
    );

    let registry = Registry::with_builtins();
    let files = SuiteFiles::resolve(&suite, suite_path, &overrides.sources)?
        .with_batch_size(suite.settings.batch_size);

    // Reject bad rules before any file is opened.
    build_rules(&registry, &suite, &files)?;

    if format == OutputFormat::Text {
        output::print_info(&format!(
            "Suite loaded: {} ({} sources, {} rules)",
            suite.name,
            suite.sources.len(),
            suite.rule_count()
        ));
    }

    let jobs = files.jobs(&suite)?;
    let report = JobRunner::new(&registry, suite.settings.clone())
        .run(jobs, &files)
        .context("Failed to run validation")?;

    output::print_job_report(&report, format)?;
    if let Some(path) = output_path {
        output::write_json_report(&report, path)?;
        info!("Report written to {}", path.display());
    }

    Ok(u8::try_from(report.exit_code()).unwrap_or(2))
}

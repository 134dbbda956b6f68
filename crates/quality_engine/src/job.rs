//! Multi-source jobs.
//!
//! All rules of all sources are built, and all reference key sets loaded,
//! before any source is read. Sources are then evaluated independently on a
//! rayon thread pool and rolled up into one [`JobReport`].

use crate::engine::Orchestrator;
use crate::references::{ReferenceProvider, ReferenceSets};
use crate::rules::ActiveRule;
use crate::Registry;
use crate::sources::BatchSource;
use quality_core::{ConfigError, EngineSettings, JobReport, RuleSpec};
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

/// One source and the rules to evaluate against it.
pub struct SourceJob {
    /// Primary data
    pub source: Box<dyn BatchSource>,
    /// Rules in declared order
    pub rules: Vec<RuleSpec>,
}

impl SourceJob {
    /// Creates a new job.
    pub fn new(source: Box<dyn BatchSource>, rules: Vec<RuleSpec>) -> Self {
        Self { source, rules }
    }
}

/// Runs several sources and aggregates their reports.
#[derive(Debug)]
pub struct JobRunner<'r> {
    orchestrator: Orchestrator<'r>,
}

impl<'r> JobRunner<'r> {
    /// Creates a runner over a registry.
    pub fn new(registry: &'r Registry, settings: EngineSettings) -> Self {
        Self {
            orchestrator: Orchestrator::new(registry, settings),
        }
    }

    /// Evaluates every job. Reports keep the order of `jobs`.
    pub fn run(
        &self,
        jobs: Vec<SourceJob>,
        references: &dyn ReferenceProvider,
    ) -> Result<JobReport, ConfigError> {
        let start = Instant::now();
        let settings = self.orchestrator.settings();

        let mut prepared: Vec<(Box<dyn BatchSource>, Vec<ActiveRule>)> = jobs
            .into_iter()
            .map(|job| Ok((job.source, self.orchestrator.prepare(&job.rules)?)))
            .collect::<Result<_, ConfigError>>()?;

        let sets = ReferenceSets::load(
            prepared
                .iter()
                .flat_map(|(_, rules)| rules.iter().flat_map(ActiveRule::reference_requirements)),
            references,
        );
        for (_, rules) in &mut prepared {
            for rule in rules.iter_mut() {
                rule.bind_references(&sets);
            }
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = settings.parallelism {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| ConfigError::InvalidSettings(format!("cannot build thread pool: {}", e)))?;

        info!(
            "Running {} sources on {} threads",
            prepared.len(),
            pool.current_num_threads()
        );

        let orchestrator = &self.orchestrator;
        let reports = pool.install(|| {
            prepared
                .into_par_iter()
                .map(|(mut source, rules)| orchestrator.execute(source.as_mut(), rules))
                .collect::<Vec<_>>()
        });

        let report = JobReport::aggregate(reports, start.elapsed().as_secs_f64() * 1000.0);
        info!(
            "Job finished: {} ({} passed, {} warnings, {} failed, {} aborted)",
            report.status,
            report.summary.passed,
            report.summary.warnings,
            report.summary.failed,
            report.summary.aborted
        );
        Ok(report)
    }
}

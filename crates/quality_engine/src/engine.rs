//! Per-source orchestration.
//!
//! The orchestrator pulls batches from one source, fans each batch out to the
//! active rules in declared order, enforces fail-fast, drives the second pass
//! for rules that need one, and finalizes every rule into a [`SourceReport`].

use crate::references::{ReferenceProvider, ReferenceSets};
use crate::rules::ActiveRule;
use crate::sources::BatchSource;
use crate::{Batch, Registry, RowMask};
use quality_core::{
    AbortReason, ConfigError, EngineSettings, FailFastScope, RuleSpec, Severity, SourceReport,
};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one source run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

/// How the second pass gets its batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Reset,
    Buffer,
}

/// Evaluates rule lists against batch sources.
///
/// # Example
///
/// ```rust
/// use quality_core::{EngineSettings, RuleSpecBuilder, Status};
/// use quality_engine::{DataValue, MemorySource, NoReferences, Orchestrator, Registry};
///
/// let registry = Registry::with_builtins();
/// let orchestrator = Orchestrator::new(&registry, EngineSettings::default());
/// let mut source = MemorySource::from_rows(
///     "users",
///     &["email"],
///     vec![vec!["a@example.com".into()], vec![DataValue::Null]],
/// );
/// let rules = vec![RuleSpecBuilder::new("mandatory_field").param("field", "email").build()];
///
/// let report = orchestrator.run(&mut source, &rules, &NoReferences).unwrap();
/// assert_eq!(report.status, Status::Failed);
/// assert_eq!(report.results[0].failed_count, 1);
/// ```
#[derive(Debug)]
pub struct Orchestrator<'r> {
    registry: &'r Registry,
    settings: EngineSettings,
}

impl<'r> Orchestrator<'r> {
    /// Creates an orchestrator over a registry.
    pub fn new(registry: &'r Registry, settings: EngineSettings) -> Self {
        Self { registry, settings }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Builds the rules; every configuration error surfaces here.
    pub fn prepare(&self, rules: &[RuleSpec]) -> Result<Vec<ActiveRule>, ConfigError> {
        self.settings.validate()?;
        self.registry.construct_all(rules, &self.settings)
    }

    /// Builds the rules, loads their reference sets and evaluates one source.
    pub fn run(
        &self,
        source: &mut dyn BatchSource,
        rules: &[RuleSpec],
        references: &dyn ReferenceProvider,
    ) -> Result<SourceReport, ConfigError> {
        let mut active = self.prepare(rules)?;
        let sets = ReferenceSets::load(
            active.iter().flat_map(ActiveRule::reference_requirements),
            references,
        );
        for rule in &mut active {
            rule.bind_references(&sets);
        }
        Ok(self.execute(source, active))
    }

    /// Evaluates prepared rules against a source.
    ///
    /// Never fails: source errors and fail-fast abort the source, and every
    /// rule is still finalized into exactly one result.
    pub fn execute(
        &self,
        source: &mut dyn BatchSource,
        mut rules: Vec<ActiveRule>,
    ) -> SourceReport {
        let start = Instant::now();
        let name = source.name().to_string();
        let metadata = source.metadata();
        let mut state = RunState::Idle;

        info!("Validating source '{}' with {} rules", name, rules.len());

        let needs_second_pass = rules.iter().any(|r| r.passes() >= 2);
        let replay = match (needs_second_pass, source.can_reset()) {
            (false, _) => None,
            (true, true) => Some(Replay::Reset),
            (true, false) => Some(Replay::Buffer),
        };
        if let Some(replay) = replay {
            info!("Source '{}' needs a second pass, strategy: {:?}", name, replay);
        }

        transition(&name, &mut state, RunState::Streaming);

        let mut buffered: Vec<Batch> = Vec::new();
        let mut rows_processed = 0u64;
        let mut batches_processed = 0u64;
        let mut aborted = None;

        loop {
            let batch = match source.next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    warn!("Source '{}' failed after {} batches: {}", name, batches_processed, e);
                    aborted = Some(AbortReason::SourceError {
                        message: e.to_string(),
                    });
                    break;
                }
            };

            batches_processed += 1;
            rows_processed += batch.num_rows() as u64;
            debug!(
                "Source '{}': batch {} ({} rows) to {} rules",
                name,
                batches_processed,
                batch.num_rows(),
                rules.len()
            );

            feed(&mut rules, &batch, 1);
            if replay == Some(Replay::Buffer) {
                buffered.push(batch);
            }

            if let Some(reason) = self.check_fail_fast(&mut rules, batches_processed) {
                warn!("Source '{}' aborted: {}", name, reason);
                aborted = Some(reason);
                break;
            }
        }
        end_pass(&mut rules, 1);

        let mut passes = 1;
        if let (None, Some(replay)) = (&aborted, replay) {
            match second_pass(source, &mut rules, replay, &buffered) {
                Ok(()) => passes = 2,
                Err(message) => {
                    warn!("Source '{}' failed during the second pass: {}", name, message);
                    aborted = Some(AbortReason::SourceError { message });
                }
            }
        }
        drop(buffered);
        for rule in &mut rules {
            rule.mark_incomplete(passes);
        }

        if aborted.is_some() {
            transition(&name, &mut state, RunState::Failed);
        } else {
            transition(&name, &mut state, RunState::Finalizing);
        }

        let results: Vec<_> = rules.into_iter().map(ActiveRule::finalize).collect();
        let status = SourceReport::derive_status(&results, aborted.as_ref());
        if state == RunState::Finalizing {
            transition(&name, &mut state, RunState::Done);
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Source '{}' finished: {} ({} rows, {} batches, {:.1} ms)",
            name, status, rows_processed, batches_processed, duration_ms
        );

        SourceReport {
            source: name,
            status,
            metadata,
            rows_processed,
            batches_processed,
            passes,
            results,
            aborted,
            duration_ms,
        }
    }

    /// Applies fail-fast after a batch. Returns the abort reason if the source
    /// must stop.
    fn check_fail_fast(&self, rules: &mut [ActiveRule], batch: u64) -> Option<AbortReason> {
        let triggered: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| {
                !rule.is_frozen()
                    && rule.fail_fast(self.settings.fail_fast)
                    && rule.is_failing()
                    && rule.failing_severity() == Severity::Error
            })
            .map(|(i, _)| i)
            .collect();

        match self.settings.fail_fast_scope {
            FailFastScope::Source => triggered.first().map(|&i| AbortReason::FailFast {
                rule: rules[i].id().to_string(),
                batch,
            }),
            FailFastScope::Rule => {
                let mut last_frozen = None;
                for i in triggered {
                    if rules[i].is_active() {
                        debug!("Freezing rule '{}' after batch {}", rules[i].id(), batch);
                        rules[i].freeze();
                        last_frozen = Some(i);
                    }
                }
                let all_stopped = rules.iter().all(|r| !r.is_active());
                match last_frozen {
                    Some(i) if all_stopped => Some(AbortReason::FailFast {
                        rule: rules[i].id().to_string(),
                        batch,
                    }),
                    _ => None,
                }
            }
        }
    }
}

fn transition(source: &str, state: &mut RunState, next: RunState) {
    debug!("Source '{}': {:?} -> {:?}", source, state, next);
    *state = next;
}

fn feed(rules: &mut [ActiveRule], batch: &Batch, pass: u8) {
    let mask = RowMask::all(batch.num_rows());
    for rule in rules.iter_mut() {
        rule.update(batch, &mask, pass);
    }
}

fn end_pass(rules: &mut [ActiveRule], pass: u8) {
    for rule in rules.iter_mut() {
        rule.end_pass(pass);
    }
}

fn second_pass(
    source: &mut dyn BatchSource,
    rules: &mut [ActiveRule],
    replay: Replay,
    buffered: &[Batch],
) -> Result<(), String> {
    match replay {
        Replay::Buffer => {
            for batch in buffered {
                feed(rules, batch, 2);
            }
        }
        Replay::Reset => {
            source.reset().map_err(|e| e.to_string())?;
            while let Some(batch) = source.next_batch().map_err(|e| e.to_string())? {
                feed(rules, &batch, 2);
            }
        }
    }
    end_pass(rules, 2);
    Ok(())
}

//! Recompilation driver
//!
//! Runs the host's [`Recompiler`] over a batch of units. A failing unit is
//! re-queued behind the others, so a unit that depends on a later unit of
//! the same batch gets another chance once that unit is in place. After
//! `retry_budget` failures the unit is given up on; the rest of the batch
//! carries on.

use crate::config::{InstallMode, ReloadConfig};
use crate::error::RecompileFailure;
use crate::journal::{Journal, Level, ReloadEventKind};
use crate::state_machine::{validate_transition, UnitState};
use relive_object::{ExportTable, Unit, UnitRegistry};
use std::collections::VecDeque;
use std::sync::Arc;

/// Produces the new export table of a unit from its current source.
///
/// The returned table is installed only if this returns `Ok`, so a failed
/// attempt leaves the unit exactly as it was.
pub trait Recompiler: Send + Sync {
    /// Recompile `unit`.
    ///
    /// # Errors
    /// Any host error; it is retried and finally reported, never propagated.
    fn recompile(&self, unit: &Arc<Unit>, registry: &UnitRegistry) -> anyhow::Result<ExportTable>;
}

impl<F> Recompiler for F
where
    F: Fn(&Arc<Unit>, &UnitRegistry) -> anyhow::Result<ExportTable> + Send + Sync,
{
    fn recompile(&self, unit: &Arc<Unit>, registry: &UnitRegistry) -> anyhow::Result<ExportTable> {
        self(unit, registry)
    }
}

/// Result of driving one batch
#[derive(Debug, Default)]
pub struct DriverOutcome {
    /// Units that were recompiled and installed, in completion order
    pub succeeded: Vec<Arc<Unit>>,
    /// Units that exhausted their budget, in the order they gave up
    pub failures: Vec<RecompileFailure>,
    /// Total recompiler invocations
    pub attempts: u32,
}

#[derive(Debug)]
struct Progress {
    unit: Arc<Unit>,
    state: UnitState,
    failures: u32,
    last_error: String,
}

impl Progress {
    fn advance(&mut self, to: UnitState) {
        match validate_transition(self.state, to) {
            Ok(()) => self.state = to,
            Err(err) => tracing::error!(unit = self.unit.name(), %err, "transition ignored"),
        }
    }
}

/// Drives recompilation of one batch
pub struct RecompileDriver<'a> {
    recompiler: &'a dyn Recompiler,
    registry: &'a UnitRegistry,
    config: &'a ReloadConfig,
    journal: &'a Journal,
}

impl<'a> RecompileDriver<'a> {
    /// Create a driver
    #[must_use]
    pub fn new(
        recompiler: &'a dyn Recompiler,
        registry: &'a UnitRegistry,
        config: &'a ReloadConfig,
        journal: &'a Journal,
    ) -> Self {
        Self {
            recompiler,
            registry,
            config,
            journal,
        }
    }

    /// Recompile `units` until each has succeeded or run out of attempts
    pub fn run(&self, units: &[Arc<Unit>]) -> DriverOutcome {
        let mut progress: Vec<Progress> = units
            .iter()
            .map(|unit| Progress {
                unit: Arc::clone(unit),
                state: UnitState::Pending,
                failures: 0,
                last_error: String::new(),
            })
            .collect();
        let mut queue: VecDeque<usize> = (0..progress.len()).collect();
        let mut outcome = DriverOutcome::default();
        let mut exhausted = Vec::new();

        while let Some(idx) = queue.pop_front() {
            let entry = &mut progress[idx];
            let name = entry.unit.name().to_string();
            let attempt = entry.failures + 1;
            outcome.attempts += 1;
            self.journal
                .record(Level::Info, &name, ReloadEventKind::RecompileStarted { attempt });

            match self.recompiler.recompile(&entry.unit, self.registry) {
                Ok(table) => {
                    let exports = table.len();
                    self.install(&entry.unit, table);
                    entry.advance(UnitState::Succeeded);
                    self.journal
                        .record(Level::Info, &name, ReloadEventKind::Recompiled { exports });
                    outcome.succeeded.push(Arc::clone(&entry.unit));
                }
                Err(err) => {
                    entry.failures += 1;
                    entry.last_error = format!("{err:#}");
                    if entry.failures < self.config.retry_budget {
                        entry.advance(UnitState::Retrying);
                        self.journal.record(
                            Level::Warn,
                            &name,
                            ReloadEventKind::RecompileRetry {
                                attempt,
                                detail: entry.last_error.clone(),
                            },
                        );
                        queue.push_back(idx);
                    } else {
                        entry.advance(UnitState::Failed);
                        exhausted.push(idx);
                    }
                }
            }
        }

        for idx in exhausted {
            let entry = &progress[idx];
            let failure = RecompileFailure {
                unit: entry.unit.name().to_string(),
                attempts: entry.failures,
                detail: entry.last_error.clone(),
            };
            self.journal.record(
                Level::Error,
                &failure.unit,
                ReloadEventKind::RecompileFailed {
                    attempts: failure.attempts,
                    detail: failure.detail.clone(),
                },
            );
            outcome.failures.push(failure);
        }

        outcome
    }

    fn install(&self, unit: &Unit, table: ExportTable) {
        match self.config.install_mode {
            InstallMode::Merge => unit.merge(table),
            InstallMode::Replace => {
                unit.replace(table);
            }
        }
    }
}

//! Per-call reload session
//!
//! Owns everything one reload or wrap call builds: the snapshot, both
//! caches and the journal. Dropped at the end of the call, so nothing
//! carries over into the next one.

use crate::cache::{InstanceCache, ReferenceCache};
use crate::config::ReloadConfig;
use crate::error::RecompileFailure;
use crate::journal::{Journal, SessionId};
use crate::propagate::{PropagationStats, Propagator};
use crate::report::ReloadReport;
use crate::snapshot::Snapshot;
use relive_object::{IntrospectError, ObjectEnumerator, Unit, UnitRegistry};
use std::sync::Arc;

/// Snapshot, caches and journal for one call
#[derive(Debug)]
pub struct ReloadSession {
    id: SessionId,
    config: ReloadConfig,
    snapshot: Snapshot,
    references: ReferenceCache,
    instances: InstanceCache,
    journal: Journal,
}

impl ReloadSession {
    /// Snapshot `targets` and build both caches.
    ///
    /// # Errors
    /// [`IntrospectError`] if a target cannot be read.
    pub fn open(
        targets: &[Arc<Unit>],
        registry: &UnitRegistry,
        enumerator: &dyn ObjectEnumerator,
        config: ReloadConfig,
    ) -> Result<Self, IntrospectError> {
        let id = SessionId::new();
        let journal = Journal::with_capacity(id, config.journal_capacity);
        let snapshot = Snapshot::capture(targets)?;
        let references = ReferenceCache::build(&registry.units(), &snapshot, &journal);
        let instances = InstanceCache::build(enumerator, &snapshot);

        tracing::debug!(
            session = %id,
            targets = targets.len(),
            bindings = references.len(),
            instances = instances.len(),
            "opened reload session"
        );

        Ok(Self {
            id,
            config,
            snapshot,
            references,
            instances,
            journal,
        })
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[inline]
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    #[inline]
    #[must_use]
    pub fn references(&self) -> &ReferenceCache {
        &self.references
    }

    #[inline]
    #[must_use]
    pub fn instances(&self) -> &InstanceCache {
        &self.instances
    }

    /// Propagate each of `units` in order, summing the changes
    pub fn propagate(&self, units: &[Arc<Unit>]) -> PropagationStats {
        let propagator = Propagator::new(
            &self.snapshot,
            &self.references,
            &self.instances,
            &self.journal,
            &self.config,
        );
        let mut stats = PropagationStats::default();
        for unit in units {
            stats += propagator.propagate(unit);
        }
        stats
    }

    /// Close the session into its report
    #[must_use]
    pub fn finish(
        self,
        reloaded: &[Arc<Unit>],
        failures: Vec<RecompileFailure>,
        stats: PropagationStats,
    ) -> ReloadReport {
        ReloadReport {
            session: self.id,
            reloaded: reloaded.iter().map(|u| u.name().to_string()).collect(),
            failures,
            skipped_units: self.references.skipped_units().to_vec(),
            stats,
            events: self.journal.events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relive_object::{Callable, Value};

    #[test]
    fn finish_carries_skips_and_events() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        b.set("f", Callable::new(&b, "f", |_, _| Ok(Value::Nil)));
        registry.load_sealed("host", "proxy");

        let session =
            ReloadSession::open(&[Arc::clone(&b)], &registry, &registry, ReloadConfig::new()).unwrap();
        let id = session.id();
        let stats = session.propagate(&[Arc::clone(&b)]);
        let report = session.finish(&[b], Vec::new(), stats);

        assert_eq!(report.session, id);
        assert_eq!(report.reloaded, vec!["b".to_string()]);
        assert_eq!(report.skipped_units, vec!["host".to_string()]);
        assert!(report.stats.is_zero());
        assert!(!report.events.is_empty());
    }

    #[test]
    fn sessions_are_independent() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        let first = ReloadSession::open(&[Arc::clone(&b)], &registry, &registry, ReloadConfig::new()).unwrap();
        let second = ReloadSession::open(&[b], &registry, &registry, ReloadConfig::new()).unwrap();
        assert_ne!(first.id(), second.id());
    }
}

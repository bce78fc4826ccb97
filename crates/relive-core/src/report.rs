//! What a reload or wrap call did

use crate::error::RecompileFailure;
use crate::journal::{Level, ReloadEvent, SessionId};
use crate::propagate::PropagationStats;
use serde::Serialize;

/// Outcome of one call. Informational; all repair has already happened.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub session: SessionId,
    /// Units recompiled (or wrapped) and propagated, in completion order
    pub reloaded: Vec<String>,
    /// Units that exhausted their retry budget
    pub failures: Vec<RecompileFailure>,
    /// Units skipped by the reference scan
    pub skipped_units: Vec<String>,
    pub stats: PropagationStats,
    /// Journal of the session
    pub events: Vec<ReloadEvent>,
}

impl ReloadReport {
    /// No unit failed and nothing was skipped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped_units.is_empty()
    }

    /// Failure record of `unit`, if it failed
    #[must_use]
    pub fn failed(&self, unit: &str) -> Option<&RecompileFailure> {
        self.failures.iter().find(|f| f.unit == unit)
    }

    /// Events at exactly `level`
    pub fn events_at(&self, level: Level) -> impl Iterator<Item = &ReloadEvent> {
        self.events.iter().filter(move |e| e.level == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{Journal, ReloadEventKind};

    fn report_with(failures: Vec<RecompileFailure>, skipped: Vec<String>) -> ReloadReport {
        let journal = Journal::new(SessionId::new());
        journal.record(Level::Info, "b", ReloadEventKind::Recompiled { exports: 1 });
        journal.record(Level::Debug, "b", ReloadEventKind::InstanceRetargeted { ty: "b.C".into() });
        ReloadReport {
            session: journal.session(),
            reloaded: vec!["b".into()],
            failures,
            skipped_units: skipped,
            stats: PropagationStats::default(),
            events: journal.events(),
        }
    }

    #[test]
    fn clean_report() {
        let report = report_with(Vec::new(), Vec::new());
        assert!(report.is_clean());
        assert_eq!(report.events_at(Level::Debug).count(), 1);
    }

    #[test]
    fn failures_are_found_by_unit() {
        let failure = RecompileFailure {
            unit: "bad".into(),
            attempts: 10,
            detail: "boom".into(),
        };
        let report = report_with(vec![failure.clone()], Vec::new());
        assert!(!report.is_clean());
        assert_eq!(report.failed("bad"), Some(&failure));
        assert_eq!(report.failed("b"), None);
    }

    #[test]
    fn serializes_to_json() {
        let report = report_with(Vec::new(), vec!["host".into()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped_units"][0], "host");
        assert_eq!(json["events"][0]["kind"], "recompiled");
        assert_eq!(json["events"][1]["level"], "debug");
    }
}

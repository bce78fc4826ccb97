//! Structured per-session journal
//!
//! Every notable thing a reload does is recorded here as a [`ReloadEvent`]
//! and mirrored to `tracing` at the event's [`Level`]. The journal is handed
//! back in the report so callers can inspect what happened without parsing
//! log output.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Identity of one reload or wrap call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Fresh random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a journal event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReloadEventKind {
    /// Recompiler invoked
    RecompileStarted { attempt: u32 },
    /// New table installed
    Recompiled { exports: usize },
    /// Attempt failed, unit re-queued
    RecompileRetry { attempt: u32, detail: String },
    /// Retry budget exhausted
    RecompileFailed { attempts: u32, detail: String },
    /// Unit could not be introspected during the reference scan
    UnitSkipped { reason: String },
    /// External binding overwritten with the new definition
    BindingRepointed { holder: String, local_name: String, target: String },
    /// Old definition has no successor; its holders keep the old one
    SymbolRemoved { name: String, holders: usize },
    /// Old type has no successor; subtypes and instances keep the old one
    TypeRemoved { name: String },
    /// Subtype ancestor entry rewritten
    AncestorRepointed { subtype: String, ancestor: String },
    /// Instance moved to the new type
    InstanceRetargeted { ty: String },
    /// Instance refused the new type
    RetypeRejected { ty: String, reason: String },
    /// Callable or member replaced by the wrapper
    Wrapped { name: String },
}

impl fmt::Display for ReloadEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecompileStarted { attempt } => write!(f, "recompile attempt {attempt}"),
            Self::Recompiled { exports } => write!(f, "recompiled ({exports} exports)"),
            Self::RecompileRetry { attempt, detail } => {
                write!(f, "attempt {attempt} failed, will retry: {detail}")
            }
            Self::RecompileFailed { attempts, detail } => {
                write!(f, "gave up after {attempts} attempt(s): {detail}")
            }
            Self::UnitSkipped { reason } => write!(f, "skipped during reference scan: {reason}"),
            Self::BindingRepointed {
                holder,
                local_name,
                target,
            } => write!(f, "{holder}.{local_name} -> {target}"),
            Self::SymbolRemoved { name, holders } => {
                write!(f, "{name} removed, {holders} holder(s) keep the old definition")
            }
            Self::TypeRemoved { name } => write!(f, "type {name} removed"),
            Self::AncestorRepointed { subtype, ancestor } => {
                write!(f, "{subtype} now derives from new {ancestor}")
            }
            Self::InstanceRetargeted { ty } => write!(f, "instance retargeted to new {ty}"),
            Self::RetypeRejected { ty, reason } => {
                write!(f, "instance of {ty} not retargeted: {reason}")
            }
            Self::Wrapped { name } => write!(f, "wrapped {name}"),
        }
    }
}

/// One journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    /// Monotonic within the session, starting at 0
    pub seq: u64,
    pub session: SessionId,
    pub level: Level,
    /// Unit the event concerns
    pub unit: String,
    #[serde(flatten)]
    pub kind: ReloadEventKind,
}

#[derive(Debug, Default)]
struct JournalInner {
    next_seq: u64,
    events: VecDeque<ReloadEvent>,
}

/// Append-only event journal for one session
#[derive(Debug)]
pub struct Journal {
    session: SessionId,
    capacity: Option<usize>,
    inner: Mutex<JournalInner>,
}

impl Journal {
    /// Unbounded journal
    #[must_use]
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            capacity: None,
            inner: Mutex::new(JournalInner::default()),
        }
    }

    /// Journal keeping at most `capacity` events; the oldest are dropped
    #[must_use]
    pub fn with_capacity(session: SessionId, capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::new(session)
        }
    }

    /// Session this journal belongs to
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Record an event and emit it to `tracing`. Returns its sequence number.
    pub fn record(&self, level: Level, unit: &str, kind: ReloadEventKind) -> u64 {
        match level {
            Level::Debug => tracing::debug!(session = %self.session, unit, "{kind}"),
            Level::Info => tracing::info!(session = %self.session, unit, "{kind}"),
            Level::Warn => tracing::warn!(session = %self.session, unit, "{kind}"),
            Level::Error => tracing::error!(session = %self.session, unit, "{kind}"),
        }

        let mut guard = self.inner.lock();
        let seq = guard.next_seq;
        guard.next_seq += 1;
        guard.events.push_back(ReloadEvent {
            seq,
            session: self.session,
            level,
            unit: unit.to_string(),
            kind,
        });
        if let Some(capacity) = self.capacity {
            while guard.events.len() > capacity {
                guard.events.pop_front();
            }
        }
        seq
    }

    /// Retained events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<ReloadEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    /// Retained events concerning `unit`
    #[must_use]
    pub fn events_for(&self, unit: &str) -> Vec<ReloadEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.unit == unit)
            .cloned()
            .collect()
    }

    /// Number of retained events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// True if nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_numbers_increase() {
        let journal = Journal::new(SessionId::new());
        let first = journal.record(Level::Info, "b", ReloadEventKind::RecompileStarted { attempt: 1 });
        let second = journal.record(Level::Info, "b", ReloadEventKind::Recompiled { exports: 2 });

        assert_eq!((first, second), (0, 1));
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn capacity_drops_oldest() {
        let journal = Journal::with_capacity(SessionId::new(), Some(2));
        for attempt in 1..=3 {
            journal.record(Level::Warn, "b", ReloadEventKind::RecompileStarted { attempt });
        }

        let seqs: Vec<u64> = journal.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn filter_by_unit() {
        let journal = Journal::new(SessionId::new());
        journal.record(Level::Info, "a", ReloadEventKind::Wrapped { name: "a.f".into() });
        journal.record(Level::Info, "b", ReloadEventKind::Wrapped { name: "b.f".into() });

        let events = journal.events_for("b");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ReloadEventKind::Wrapped { name: "b.f".into() });
    }

    #[test]
    fn kind_display() {
        let kind = ReloadEventKind::BindingRepointed {
            holder: "a".into(),
            local_name: "f".into(),
            target: "b.f".into(),
        };
        assert_eq!(kind.to_string(), "a.f -> b.f");
    }
}

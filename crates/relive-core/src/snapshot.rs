//! Old-state snapshot taken before a reload
//!
//! Holds a copy of every target unit's export table and the identity set of
//! every definition in them. The copies keep the old definitions alive for
//! the whole session, which is what keeps their [`DefId`]s meaningful.

use crate::index;
use indexmap::IndexMap;
use relive_object::{DefId, Definition, ExportTable, IntrospectError, TypeDef, Unit, UnitName};
use std::collections::HashSet;
use std::sync::Arc;

/// Pre-reload state of the target units
#[derive(Debug, Default)]
pub struct Snapshot {
    tables: IndexMap<UnitName, (Arc<Unit>, ExportTable)>,
    stale: HashSet<DefId>,
}

impl Snapshot {
    /// Copy the export tables of `units`.
    ///
    /// # Errors
    /// [`IntrospectError`] from the first target that cannot be read. A
    /// target that cannot be read cannot be propagated for, so the whole
    /// call fails.
    pub fn capture(units: &[Arc<Unit>]) -> Result<Self, IntrospectError> {
        let mut snapshot = Self::default();
        for unit in units {
            let table = unit.try_exports()?;
            for (_, def) in index::definitions_in(&table) {
                snapshot.stale.insert(def.id());
            }
            snapshot
                .tables
                .insert(unit.name_arc(), (Arc::clone(unit), table));
        }
        tracing::debug!(
            units = snapshot.tables.len(),
            stale = snapshot.stale.len(),
            "captured snapshot"
        );
        Ok(snapshot)
    }

    /// True if `def` was exported by a target unit before the reload
    #[inline]
    #[must_use]
    pub fn is_stale(&self, def: &Definition) -> bool {
        self.stale.contains(&def.id())
    }

    /// True if the definition with identity `id` is stale
    #[inline]
    #[must_use]
    pub fn is_stale_id(&self, id: DefId) -> bool {
        self.stale.contains(&id)
    }

    /// Export table of `unit` as it was before the reload
    #[must_use]
    pub fn old_exports(&self, unit: &str) -> Option<&ExportTable> {
        self.tables.get(unit).map(|(_, table)| table)
    }

    /// Types `unit` owned before the reload, in export order.
    /// A type exported under two names appears once.
    #[must_use]
    pub fn old_internal_types(&self, unit: &str) -> Vec<Arc<TypeDef>> {
        let Some(table) = self.old_exports(unit) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        index::internal_of(unit, table)
            .into_iter()
            .filter_map(|(_, def)| {
                let id = def.id();
                def.as_type().filter(|_| seen.insert(id)).cloned()
            })
            .collect()
    }

    /// Target units, in the order they were captured
    #[must_use]
    pub fn units(&self) -> Vec<Arc<Unit>> {
        self.tables.values().map(|(unit, _)| Arc::clone(unit)).collect()
    }

    /// Number of stale definitions
    #[inline]
    #[must_use]
    pub fn stale_count(&self) -> usize {
        self.stale.len()
    }
}

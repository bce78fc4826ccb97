//! Propagation engine
//!
//! Pushes a unit's new definitions into the places the caches recorded:
//! external bindings, ancestor lists of subtypes, and live instances.
//! Relations are matched by `(owner, name)` because the old and new
//! definitions share nothing else.

use crate::cache::{InstanceCache, ReferenceCache};
use crate::config::ReloadConfig;
use crate::index;
use crate::journal::{Journal, Level, ReloadEventKind};
use crate::snapshot::Snapshot;
use relive_object::{Definition, QualifiedName, TypeDef, Unit, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::AddAssign;
use std::sync::Arc;

/// Counts of changes actually made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationStats {
    /// External bindings overwritten
    pub bindings_repointed: usize,
    /// Referenced definitions with no successor
    pub removed_symbols: usize,
    /// Subtypes whose ancestor list changed
    pub subtypes_repointed: usize,
    /// Old types with no successor
    pub removed_types: usize,
    /// Instances moved to a new type
    pub instances_retargeted: usize,
    /// Instances that refused the new type
    pub instances_rejected: usize,
}

impl PropagationStats {
    /// True if nothing was changed or found missing
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for PropagationStats {
    fn add_assign(&mut self, rhs: Self) {
        self.bindings_repointed += rhs.bindings_repointed;
        self.removed_symbols += rhs.removed_symbols;
        self.subtypes_repointed += rhs.subtypes_repointed;
        self.removed_types += rhs.removed_types;
        self.instances_retargeted += rhs.instances_retargeted;
        self.instances_rejected += rhs.instances_rejected;
    }
}

/// Applies one unit's current exports to the cached relations
pub struct Propagator<'a> {
    snapshot: &'a Snapshot,
    references: &'a ReferenceCache,
    instances: &'a InstanceCache,
    journal: &'a Journal,
    config: &'a ReloadConfig,
}

impl<'a> Propagator<'a> {
    /// Create a propagator over one session's caches
    #[must_use]
    pub fn new(
        snapshot: &'a Snapshot,
        references: &'a ReferenceCache,
        instances: &'a InstanceCache,
        journal: &'a Journal,
        config: &'a ReloadConfig,
    ) -> Self {
        Self {
            snapshot,
            references,
            instances,
            journal,
            config,
        }
    }

    /// Repair everything that pointed at `unit`'s old definitions
    pub fn propagate(&self, unit: &Arc<Unit>) -> PropagationStats {
        let mut stats = PropagationStats::default();
        let current = index::internal_of(unit.name(), &unit.exports());

        self.repoint_bindings(unit, &current, &mut stats);

        let new_types: Vec<Arc<TypeDef>> = current
            .iter()
            .filter_map(|(_, def)| def.as_type().cloned())
            .collect();
        for old in self.snapshot.old_internal_types(unit.name()) {
            let Some(new) = new_types.iter().find(|t| t.name() == old.name()) else {
                stats.removed_types += 1;
                self.journal.record(
                    Level::Warn,
                    unit.name(),
                    ReloadEventKind::TypeRemoved {
                        name: old.qualified_name().to_string(),
                    },
                );
                continue;
            };
            if Arc::ptr_eq(&old, new) {
                continue;
            }
            self.repoint_subtypes(unit, &old, new, &mut stats);
            self.retarget_instances(unit, &old, new, &mut stats);
        }

        tracing::info!(unit = unit.name(), ?stats, "propagated");
        stats
    }

    fn repoint_bindings(&self, unit: &Unit, current: &[(String, Definition)], stats: &mut PropagationStats) {
        let mut claimed: HashSet<QualifiedName> = HashSet::new();

        for (_, def) in current {
            let key = def.qualified_name();
            if !claimed.insert(key.clone()) {
                continue;
            }
            for binding in self.references.holders(&key) {
                // Only slots that still hold what they held before the reload
                match binding.holder.get(&binding.local_name) {
                    Some(Value::Def(held)) if held == binding.stale && held != *def => {}
                    _ => continue,
                }
                binding
                    .holder
                    .set(binding.local_name.clone(), Value::Def(def.clone()));
                stats.bindings_repointed += 1;
                self.journal.record(
                    Level::Debug,
                    unit.name(),
                    ReloadEventKind::BindingRepointed {
                        holder: binding.holder.name().to_string(),
                        local_name: binding.local_name.clone(),
                        target: key.to_string(),
                    },
                );
            }
        }

        for key in self.references.keys_owned_by(unit.name()) {
            if claimed.contains(&key) {
                continue;
            }
            stats.removed_symbols += 1;
            if self.config.log_removed_symbols {
                self.journal.record(
                    Level::Warn,
                    unit.name(),
                    ReloadEventKind::SymbolRemoved {
                        name: key.to_string(),
                        holders: self.references.holders(&key).len(),
                    },
                );
            }
        }
    }

    fn repoint_subtypes(&self, unit: &Unit, old: &Arc<TypeDef>, new: &Arc<TypeDef>, stats: &mut PropagationStats) {
        for subtype in old.subtypes() {
            let mut changed = false;
            let ancestors: Vec<Arc<TypeDef>> = subtype
                .ancestors()
                .into_iter()
                .map(|ancestor| {
                    if ancestor.owner() == new.owner()
                        && ancestor.name() == new.name()
                        && !Arc::ptr_eq(&ancestor, new)
                    {
                        changed = true;
                        Arc::clone(new)
                    } else {
                        ancestor
                    }
                })
                .collect();
            if !changed {
                continue;
            }
            subtype.set_ancestors(ancestors);
            stats.subtypes_repointed += 1;
            self.journal.record(
                Level::Debug,
                unit.name(),
                ReloadEventKind::AncestorRepointed {
                    subtype: subtype.qualified_name().to_string(),
                    ancestor: new.qualified_name().to_string(),
                },
            );
        }
    }

    fn retarget_instances(&self, unit: &Unit, old: &Arc<TypeDef>, new: &Arc<TypeDef>, stats: &mut PropagationStats) {
        let ty = new.qualified_name().to_string();
        let old_id = Definition::Type(Arc::clone(old)).id();
        for instance in self.instances.instances_of(old_id) {
            if Arc::ptr_eq(&instance.type_def(), new) {
                continue;
            }
            match instance.retarget(new) {
                Ok(()) => {
                    stats.instances_retargeted += 1;
                    self.journal.record(
                        Level::Debug,
                        unit.name(),
                        ReloadEventKind::InstanceRetargeted { ty: ty.clone() },
                    );
                }
                Err(err) => {
                    stats.instances_rejected += 1;
                    self.journal.record(
                        Level::Debug,
                        unit.name(),
                        ReloadEventKind::RetypeRejected {
                            ty: ty.clone(),
                            reason: err.to_string(),
                        },
                    );
                }
            }
        }
    }
}

//! Reference and instance caches
//!
//! Built once per session, after the snapshot and before recompilation, so
//! they record who pointed at the old definitions while those are still
//! the current ones.

use crate::index;
use crate::journal::{Journal, Level, ReloadEventKind};
use crate::snapshot::Snapshot;
use dashmap::DashMap;
use relive_object::{DefId, Definition, Instance, ObjectEnumerator, QualifiedName, Unit};
use std::sync::Arc;

/// A unit holding a copy of a definition owned by another unit
#[derive(Debug, Clone)]
pub struct ExternalBinding {
    /// Unit whose export slot holds the copy
    pub holder: Arc<Unit>,
    /// Name of that slot in the holder
    pub local_name: String,
    /// Definition the slot held when the cache was built
    pub stale: Definition,
}

/// External bindings to stale definitions, keyed by `owner.name`
#[derive(Debug, Default)]
pub struct ReferenceCache {
    bindings: DashMap<QualifiedName, Vec<ExternalBinding>>,
    skipped: Vec<String>,
}

impl ReferenceCache {
    /// Scan `units` for bindings to definitions in `snapshot`.
    ///
    /// Units that refuse introspection are skipped and journaled; their
    /// bindings will not be repaired.
    pub fn build(units: &[Arc<Unit>], snapshot: &Snapshot, journal: &Journal) -> Self {
        let cache = Self::default();
        let mut skipped = Vec::new();

        for unit in units {
            let external = match index::external_members(unit) {
                Ok(defs) => defs,
                Err(err) => {
                    journal.record(
                        Level::Warn,
                        unit.name(),
                        ReloadEventKind::UnitSkipped {
                            reason: err.to_string(),
                        },
                    );
                    skipped.push(unit.name().to_string());
                    continue;
                }
            };
            for (local_name, def) in external {
                if !snapshot.is_stale(&def) {
                    continue;
                }
                cache
                    .bindings
                    .entry(def.qualified_name())
                    .or_default()
                    .push(ExternalBinding {
                        holder: Arc::clone(unit),
                        local_name,
                        stale: def,
                    });
            }
        }

        tracing::debug!(
            keys = cache.bindings.len(),
            skipped = skipped.len(),
            "built reference cache"
        );
        Self { skipped, ..cache }
    }

    /// Holders of the definition named `key`
    #[must_use]
    pub fn holders(&self, key: &QualifiedName) -> Vec<ExternalBinding> {
        self.bindings
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Keys whose definition `unit` owned
    #[must_use]
    pub fn keys_owned_by(&self, unit: &str) -> Vec<QualifiedName> {
        let mut keys: Vec<QualifiedName> = self
            .bindings
            .iter()
            .filter(|entry| entry.key().is_in_unit(unit))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Units skipped during the scan
    #[inline]
    #[must_use]
    pub fn skipped_units(&self) -> &[String] {
        &self.skipped
    }

    /// Number of distinct keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if no binding was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Live instances of stale types, keyed by the type's identity
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: DashMap<DefId, Vec<Arc<Instance>>>,
}

impl InstanceCache {
    /// One pass over `enumerator`, keeping instances whose type is stale
    pub fn build(enumerator: &dyn ObjectEnumerator, snapshot: &Snapshot) -> Self {
        let cache = Self::default();
        for instance in enumerator.live_objects() {
            let id = Definition::Type(instance.type_def()).id();
            if snapshot.is_stale_id(id) {
                cache.instances.entry(id).or_default().push(instance);
            }
        }
        tracing::debug!(types = cache.instances.len(), "built instance cache");
        cache
    }

    /// Cached instances of the type with identity `id`
    #[must_use]
    pub fn instances_of(&self, id: DefId) -> Vec<Arc<Instance>> {
        self.instances
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Total number of cached instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.iter().map(|entry| entry.value().len()).sum()
    }

    /// True if no instance was cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::SessionId;
    use pretty_assertions::assert_eq;
    use relive_object::{Callable, TypeDef, UnitRegistry, Value};

    #[test]
    fn records_external_holders_only() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        let a = registry.load("a");
        let f = Callable::new(&b, "f", |_, _| Ok(Value::Nil));
        b.set("f", Arc::clone(&f));
        a.set("g", Arc::clone(&f));
        let snapshot = Snapshot::capture(&[Arc::clone(&b)]).unwrap();
        let journal = Journal::new(SessionId::new());

        let cache = ReferenceCache::build(&registry.units(), &snapshot, &journal);

        let holders = cache.holders(&QualifiedName::new("b", "f"));
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].holder.name(), "a");
        assert_eq!(holders[0].local_name, "g");
        assert_eq!(cache.keys_owned_by("b"), vec![QualifiedName::new("b", "f")]);
    }

    #[test]
    fn sealed_units_are_skipped() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        registry.load_sealed("host", "proxy");
        let snapshot = Snapshot::capture(&[b]).unwrap();
        let journal = Journal::new(SessionId::new());

        let cache = ReferenceCache::build(&registry.units(), &snapshot, &journal);

        assert_eq!(cache.skipped_units(), ["host".to_string()]);
        assert_eq!(journal.events_for("host")[0].level, Level::Warn);
    }

    #[test]
    fn caches_instances_of_stale_types() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        let c = TypeDef::builder(&b, "C").build();
        let other = TypeDef::builder(&b, "Other").build();
        b.set("C", Arc::clone(&c));
        let _x = c.construct(&[]).unwrap();
        let _y = c.construct(&[]).unwrap();
        let _z = other.construct(&[]).unwrap();
        let snapshot = Snapshot::capture(&[b]).unwrap();

        let cache = InstanceCache::build(&registry, &snapshot);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.instances_of(Definition::Type(c).id()).len(), 2);
    }
}

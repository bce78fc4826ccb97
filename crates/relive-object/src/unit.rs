//! Units and the registry of loaded units
//!
//! A [`Unit`] is a named export table. Its identity is its name and the
//! `Arc` the registry hands out; recompilation changes the table, never the
//! unit.

use crate::error::IntrospectError;
use crate::instance::{Instance, InstanceRegistry, ObjectEnumerator};
use crate::name::UnitName;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Ordered `name -> value` mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportTable {
    entries: IndexMap<String, Value>,
}

impl ExportTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(name.into(), value.into())
    }

    /// Lookup
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Remove an entry, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.shift_remove(name)
    }

    /// True if `name` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ExportTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for ExportTable {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A named namespace of exports
pub struct Unit {
    name: UnitName,
    exports: RwLock<ExportTable>,
    heap: Arc<InstanceRegistry>,
    sealed: Option<String>,
}

impl Unit {
    fn create(name: UnitName, heap: Arc<InstanceRegistry>, sealed: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            exports: RwLock::new(ExportTable::new()),
            heap,
            sealed,
        })
    }

    /// Unit name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the unit name
    #[inline]
    #[must_use]
    pub fn name_arc(&self) -> UnitName {
        Arc::clone(&self.name)
    }

    /// Instance registry that types defined here register into
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<InstanceRegistry> {
        &self.heap
    }

    /// True for host proxies that refuse introspection
    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// Read one export
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.exports.read().get(name).cloned()
    }

    /// Write one export, returning what it replaced
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.exports.write().insert(name, value)
    }

    /// Remove one export
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.exports.write().remove(name)
    }

    /// Copy of the export table, blocking on the lock.
    ///
    /// Unlike [`Unit::try_exports`] this ignores sealing; the unit's owner
    /// may always read its own table.
    #[must_use]
    pub fn exports(&self) -> ExportTable {
        self.exports.read().clone()
    }

    /// Copy of the export table for introspection by third parties.
    ///
    /// # Errors
    /// [`IntrospectError::Sealed`] for sealed units,
    /// [`IntrospectError::Busy`] if the table is being written.
    pub fn try_exports(&self) -> Result<ExportTable, IntrospectError> {
        if let Some(reason) = &self.sealed {
            return Err(IntrospectError::Sealed {
                unit: self.name.to_string(),
                reason: reason.clone(),
            });
        }
        self.exports
            .try_read()
            .map(|table| table.clone())
            .ok_or_else(|| IntrospectError::Busy(self.name.to_string()))
    }

    /// Apply `table` over the current exports under one write lock.
    ///
    /// Names missing from `table` keep their current value.
    pub fn merge(&self, table: ExportTable) {
        let mut exports = self.exports.write();
        for (name, value) in table {
            exports.insert(name, value);
        }
    }

    /// Swap the export table for `table` under one write lock
    pub fn replace(&self, table: ExportTable) -> ExportTable {
        std::mem::replace(&mut *self.exports.write(), table)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.exports.read().names().map(str::to_string).collect();
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("exports", &names)
            .field("sealed", &self.sealed)
            .finish()
    }
}

/// The set of loaded units, plus the instance registry they share
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: RwLock<IndexMap<UnitName, Arc<Unit>>>,
    heap: Arc<InstanceRegistry>,
}

impl UnitRegistry {
    /// Create empty registry with its own instance registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty registry sharing `heap`
    #[must_use]
    pub fn with_heap(heap: Arc<InstanceRegistry>) -> Self {
        Self {
            units: RwLock::new(IndexMap::new()),
            heap,
        }
    }

    /// Get a unit, creating an empty one on first load
    pub fn load(&self, name: &str) -> Arc<Unit> {
        if let Some(unit) = self.get(name) {
            return unit;
        }
        let mut units = self.units.write();
        Arc::clone(units.entry(Arc::from(name)).or_insert_with(|| {
            tracing::debug!(unit = name, "loaded unit");
            Unit::create(Arc::from(name), Arc::clone(&self.heap), None)
        }))
    }

    /// Register a sealed unit (a host proxy that refuses introspection)
    pub fn load_sealed(&self, name: &str, reason: impl Into<String>) -> Arc<Unit> {
        let reason = reason.into();
        tracing::debug!(unit = name, %reason, "loaded sealed unit");
        let unit = Unit::create(Arc::from(name), Arc::clone(&self.heap), Some(reason));
        self.units.write().insert(Arc::from(name), Arc::clone(&unit));
        unit
    }

    /// Loaded unit by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.units.read().get(name).cloned()
    }

    /// Remove a unit from the registry
    pub fn unload(&self, name: &str) -> Option<Arc<Unit>> {
        let unit = self.units.write().shift_remove(name);
        if unit.is_some() {
            tracing::debug!(unit = name, "unloaded unit");
        }
        unit
    }

    /// All loaded units, in load order
    #[must_use]
    pub fn units(&self) -> Vec<Arc<Unit>> {
        self.units.read().values().cloned().collect()
    }

    /// True if `name` is loaded
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.read().contains_key(name)
    }

    /// Number of loaded units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    /// True if nothing is loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    /// Shared instance registry
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<InstanceRegistry> {
        &self.heap
    }
}

impl ObjectEnumerator for UnitRegistry {
    fn live_objects(&self) -> Vec<Arc<Instance>> {
        self.heap.live_objects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_returns_same_unit() {
        let registry = UnitRegistry::new();
        let a = registry.load("a");
        let again = registry.load("a");

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn merge_keeps_names_not_redefined() {
        let registry = UnitRegistry::new();
        let unit = registry.load("a");
        unit.set("x", Value::Int(1));
        unit.set("y", Value::Int(2));

        unit.merge(ExportTable::new().with("y", Value::Int(20)).with("z", Value::Int(30)));

        let names: Vec<_> = unit.exports().names().map(str::to_string).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(unit.get("y"), Some(Value::Int(20)));
    }

    #[test]
    fn replace_drops_names_not_redefined() {
        let registry = UnitRegistry::new();
        let unit = registry.load("a");
        unit.set("x", Value::Int(1));

        let previous = unit.replace(ExportTable::new().with("y", Value::Int(2)));

        assert!(previous.contains("x"));
        assert_eq!(unit.get("x"), None);
        assert_eq!(unit.get("y"), Some(Value::Int(2)));
    }

    #[test]
    fn sealed_units_refuse_introspection() {
        let registry = UnitRegistry::new();
        let unit = registry.load_sealed("native", "lazy proxy");

        let err = unit.try_exports().unwrap_err();
        assert_eq!(
            err,
            IntrospectError::Sealed {
                unit: "native".to_string(),
                reason: "lazy proxy".to_string()
            }
        );
        assert!(unit.exports().is_empty());
    }

    #[test]
    fn busy_table_is_reported() {
        let registry = UnitRegistry::new();
        let unit = registry.load("a");
        let _guard = unit.exports.write();

        assert_eq!(unit.try_exports(), Err(IntrospectError::Busy("a".to_string())));
    }

    #[test]
    fn units_keep_load_order() {
        let registry = UnitRegistry::new();
        registry.load("b");
        registry.load("a");
        registry.load("c");
        registry.unload("a");

        let names: Vec<_> = registry.units().iter().map(|u| u.name().to_string()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}

//! Live instances and their enumeration
//!
//! An [`Instance`] carries its dynamic type behind a lock so it can be
//! retargeted after its type is redefined. [`ObjectEnumerator`] is the
//! capability the reload engine uses to find instances; [`InstanceRegistry`]
//! implements it with weak references recorded at construction time, which
//! is deterministic but only sees instances built through
//! [`TypeDef::construct`](crate::TypeDef::construct) or registered by hand.

use crate::error::{CallError, RetypeError};
use crate::types::{Binding, Layout, TypeDef};
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

/// Heap object with a retargetable dynamic type
pub struct Instance {
    ty: RwLock<Arc<TypeDef>>,
    fields: RwLock<IndexMap<String, Value>>,
}

impl Instance {
    /// Create an instance without registering it anywhere.
    ///
    /// Prefer [`TypeDef::construct`](crate::TypeDef::construct), which makes
    /// the instance visible to reloads.
    #[must_use]
    pub fn new(ty: Arc<TypeDef>) -> Arc<Self> {
        Arc::new(Self {
            ty: RwLock::new(ty),
            fields: RwLock::new(IndexMap::new()),
        })
    }

    /// Current dynamic type
    #[inline]
    #[must_use]
    pub fn type_def(&self) -> Arc<TypeDef> {
        Arc::clone(&self.ty.read())
    }

    /// Point this instance at a new type.
    ///
    /// # Errors
    /// [`RetypeError::Native`] if either type is native,
    /// [`RetypeError::LayoutMismatch`] if the layouts differ. The instance is
    /// left unchanged on error.
    pub fn retarget(&self, new_type: &Arc<TypeDef>) -> Result<(), RetypeError> {
        let mut ty = self.ty.write();
        if Arc::ptr_eq(&ty, new_type) {
            return Ok(());
        }
        check_layout(&ty, new_type)?;
        *ty = Arc::clone(new_type);
        Ok(())
    }

    /// `isinstance` by identity through the ancestor chain
    #[must_use]
    pub fn is_instance_of(&self, ty: &TypeDef) -> bool {
        self.type_def().is_subtype_of(ty)
    }

    /// Read a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Write a field
    pub fn set_field(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.write().insert(name.into(), value)
    }

    /// Call a member resolved on the current dynamic type.
    ///
    /// # Errors
    /// [`CallError::NoSuchMember`] or whatever the member raises.
    pub fn call_method(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let ty = self.type_def();
        let member = ty.resolve(name).ok_or_else(|| CallError::NoSuchMember {
            ty: ty.qualified_name().to_string(),
            member: name.to_string(),
        })?;
        let receiver = match member.binding() {
            Binding::Instance => Some(Value::Object(Arc::clone(self))),
            Binding::Type => Some(Value::from(ty)),
            Binding::Static => None,
        };
        match receiver {
            Some(receiver) => {
                let mut bound = Vec::with_capacity(args.len() + 1);
                bound.push(receiver);
                bound.extend_from_slice(args);
                member.callable().call(&bound)
            }
            None => member.callable().call(args),
        }
    }
}

fn check_layout(from: &TypeDef, to: &TypeDef) -> Result<(), RetypeError> {
    match (from.layout(), to.layout()) {
        (Layout::Native, _) => Err(RetypeError::Native(from.qualified_name().to_string())),
        (_, Layout::Native) => Err(RetypeError::Native(to.qualified_name().to_string())),
        (Layout::Dynamic, Layout::Dynamic) => Ok(()),
        (Layout::Fixed(a), Layout::Fixed(b)) if a == b => Ok(()),
        _ => Err(RetypeError::LayoutMismatch {
            from: from.qualified_name().to_string(),
            to: to.qualified_name().to_string(),
        }),
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.fields.read().keys().cloned().collect();
        f.debug_struct("Instance")
            .field("type", &self.type_def().qualified_name().to_string())
            .field("fields", &fields)
            .finish()
    }
}

/// Best-effort enumeration of live instances
///
/// Implementations may miss instances; those are simply not retargeted.
pub trait ObjectEnumerator: Send + Sync {
    /// Instances that are alive right now
    fn live_objects(&self) -> Vec<Arc<Instance>>;
}

/// Smallest entry count at which `register` sweeps dead entries
const MIN_SWEEP: usize = 64;

/// Weak-reference registry of constructed instances
///
/// Dead entries are swept on registration once the list has doubled since
/// the last sweep, so its length stays within twice the live count.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    live: Mutex<Tracked>,
}

#[derive(Debug, Default)]
struct Tracked {
    entries: Vec<Weak<Instance>>,
    sweep_at: usize,
}

impl Tracked {
    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|w| w.strong_count() > 0);
        self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP);
        before - self.entries.len()
    }
}

impl InstanceRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an instance
    pub fn register(&self, instance: &Arc<Instance>) {
        let mut live = self.live.lock();
        if live.entries.len() >= live.sweep_at.max(MIN_SWEEP) {
            live.sweep();
        }
        live.entries.push(Arc::downgrade(instance));
    }

    /// Drop entries whose instance is gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.live.lock().sweep()
    }

    /// Number of instances still alive
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.lock().entries.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Number of entries held, dead ones included
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.live.lock().entries.len()
    }

    /// True if no tracked instance is alive
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectEnumerator for InstanceRegistry {
    fn live_objects(&self) -> Vec<Arc<Instance>> {
        let mut live = self.live.lock();
        live.sweep();
        live.entries.iter().filter_map(Weak::upgrade).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitRegistry;

    #[test]
    fn retarget_between_dynamic_types() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let old = TypeDef::builder(&unit, "C").method("m", |_, _| Ok(Value::from("b"))).build();
        let new = TypeDef::builder(&unit, "C").method("m", |_, _| Ok(Value::from("b2"))).build();
        let obj = old.construct(&[]).unwrap();

        assert_eq!(obj.call_method("m", &[]).unwrap(), Value::from("b"));
        obj.retarget(&new).unwrap();
        assert_eq!(obj.call_method("m", &[]).unwrap(), Value::from("b2"));
        assert!(obj.is_instance_of(&new));
        assert!(!obj.is_instance_of(&old));
    }

    #[test]
    fn retarget_rejects_native_types() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let old = TypeDef::builder(&unit, "C").layout(Layout::Native).build();
        let new = TypeDef::builder(&unit, "C").layout(Layout::Native).build();
        let obj = Instance::new(Arc::clone(&old));

        assert_eq!(obj.retarget(&new), Err(RetypeError::Native("b.C".to_string())));
        assert!(Arc::ptr_eq(&obj.type_def(), &old));
    }

    #[test]
    fn retarget_checks_fixed_layouts() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let slots = |names: &[&str]| Layout::Fixed(names.iter().map(ToString::to_string).collect());
        let old = TypeDef::builder(&unit, "P").layout(slots(&["x"])).build();
        let same = TypeDef::builder(&unit, "P").layout(slots(&["x"])).build();
        let grown = TypeDef::builder(&unit, "P").layout(slots(&["x", "y"])).build();
        let obj = Instance::new(Arc::clone(&old));

        assert!(matches!(obj.retarget(&grown), Err(RetypeError::LayoutMismatch { .. })));
        assert!(obj.retarget(&same).is_ok());
    }

    #[test]
    fn retarget_to_same_type_is_noop() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let ty = TypeDef::builder(&unit, "C").layout(Layout::Native).build();
        let obj = Instance::new(Arc::clone(&ty));
        assert!(obj.retarget(&ty).is_ok());
    }

    #[test]
    fn registry_forgets_dropped_instances() {
        let registry = InstanceRegistry::new();
        let units = UnitRegistry::new();
        let unit = units.load("b");
        let ty = TypeDef::builder(&unit, "C").build();

        let kept = Instance::new(Arc::clone(&ty));
        registry.register(&kept);
        {
            let dropped = Instance::new(Arc::clone(&ty));
            registry.register(&dropped);
            assert_eq!(registry.live_objects().len(), 2);
        }
        assert_eq!(registry.live_objects().len(), 1);
        assert_eq!(registry.prune(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registration_sweeps_dead_entries() {
        let registry = InstanceRegistry::new();
        let units = UnitRegistry::new();
        let unit = units.load("b");
        let ty = TypeDef::builder(&unit, "C").build();
        let kept: Vec<_> = (0..10).map(|_| Instance::new(Arc::clone(&ty))).collect();
        for obj in &kept {
            registry.register(obj);
        }

        for _ in 0..10_000 {
            let transient = Instance::new(Arc::clone(&ty));
            registry.register(&transient);
        }

        assert_eq!(registry.len(), 10);
        assert!(registry.tracked() <= 2 * MIN_SWEEP, "tracked {}", registry.tracked());
        assert_eq!(registry.live_objects().len(), 10);
    }

    #[test]
    fn static_members_get_no_receiver() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let ty = TypeDef::builder(&unit, "C")
            .static_method("argc", |_, args| Ok(Value::from(args.len() as i64)))
            .method("self_argc", |_, args| Ok(Value::from(args.len() as i64)))
            .build();
        let obj = ty.construct(&[]).unwrap();

        assert_eq!(obj.call_method("argc", &[]).unwrap(), Value::Int(0));
        assert_eq!(obj.call_method("self_argc", &[]).unwrap(), Value::Int(1));
    }
}

//! Type definitions
//!
//! Provides [`TypeDef`] with ordered ancestors, weakly tracked subtypes and
//! members whose [`Binding`] kind is explicit, so a member can be replaced by
//! a wrapped callable without losing how it binds its receiver.

use crate::definition::{Body, Callable};
use crate::error::CallError;
use crate::instance::Instance;
use crate::name::{QualifiedName, UnitName};
use crate::unit::Unit;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// How a member binds when accessed through an instance or a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Binding {
    /// Receives the instance as `args[0]`
    #[default]
    Instance,
    /// Receives the type it was resolved on as `args[0]`
    Type,
    /// Receives no receiver
    Static,
}

/// A callable attached to a type
#[derive(Debug, Clone)]
pub struct Member {
    callable: Arc<Callable>,
    binding: Binding,
}

impl Member {
    /// Create member
    #[inline]
    #[must_use]
    pub fn new(callable: Arc<Callable>, binding: Binding) -> Self {
        Self { callable, binding }
    }

    /// Underlying callable
    #[inline]
    #[must_use]
    pub fn callable(&self) -> &Arc<Callable> {
        &self.callable
    }

    /// Binding kind
    #[inline]
    #[must_use]
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Same binding kind, different callable
    #[inline]
    #[must_use]
    pub fn rebind(&self, callable: Arc<Callable>) -> Self {
        Self {
            callable,
            binding: self.binding,
        }
    }
}

/// Storage layout of a type's instances
///
/// Retargeting an instance is only allowed between compatible layouts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Layout {
    /// Open field map; any dynamic type can take over
    #[default]
    Dynamic,
    /// Fixed slots; only a type with the same slots can take over
    Fixed(Vec<String>),
    /// Host-native storage; never retargeted
    Native,
}

/// Type definition
pub struct TypeDef {
    owner: UnitName,
    name: String,
    home: Weak<Unit>,
    layout: Layout,
    ancestors: RwLock<Vec<Arc<TypeDef>>>,
    subtypes: Mutex<Vec<Weak<TypeDef>>>,
    members: RwLock<IndexMap<String, Member>>,
}

impl TypeDef {
    /// Start building a type whose methods resolve globals in `home`
    #[must_use]
    pub fn builder(home: &Arc<Unit>, name: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            owner: home.name_arc(),
            home: Arc::downgrade(home),
            name: name.into(),
            ancestors: Vec::new(),
            members: IndexMap::new(),
            layout: Layout::Dynamic,
        }
    }

    /// Owning unit
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Intrinsic name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner.name`
    #[inline]
    #[must_use]
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(Arc::clone(&self.owner), self.name.clone())
    }

    /// Instance storage layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Home unit, if still loaded
    #[inline]
    #[must_use]
    pub fn home(&self) -> Option<Arc<Unit>> {
        self.home.upgrade()
    }

    /// Direct ancestors, in declaration order
    #[must_use]
    pub fn ancestors(&self) -> Vec<Arc<TypeDef>> {
        self.ancestors.read().clone()
    }

    /// Direct subtypes that are still alive
    #[must_use]
    pub fn subtypes(&self) -> Vec<Arc<TypeDef>> {
        let mut subtypes = self.subtypes.lock();
        subtypes.retain(|w| w.strong_count() > 0);
        subtypes.iter().filter_map(Weak::upgrade).collect()
    }

    /// Replace the ancestor list.
    ///
    /// Keeps subtype tracking consistent: ancestors that were dropped forget
    /// this type, ancestors that were added learn about it.
    pub fn set_ancestors(self: &Arc<Self>, ancestors: Vec<Arc<TypeDef>>) {
        let previous = std::mem::replace(&mut *self.ancestors.write(), ancestors.clone());
        for old in &previous {
            if !ancestors.iter().any(|a| Arc::ptr_eq(a, old)) {
                old.forget_subtype(self);
            }
        }
        for new in &ancestors {
            if !previous.iter().any(|a| Arc::ptr_eq(a, new)) {
                new.register_subtype(self);
            }
        }
    }

    fn register_subtype(&self, subtype: &Arc<TypeDef>) {
        let mut subtypes = self.subtypes.lock();
        subtypes.retain(|w| w.strong_count() > 0);
        if !subtypes.iter().any(|w| w.as_ptr() == Arc::as_ptr(subtype)) {
            subtypes.push(Arc::downgrade(subtype));
        }
    }

    fn forget_subtype(&self, subtype: &Arc<TypeDef>) {
        self.subtypes
            .lock()
            .retain(|w| w.strong_count() > 0 && w.as_ptr() != Arc::as_ptr(subtype));
    }

    /// Members declared directly on this type, in declaration order
    #[must_use]
    pub fn own_members(&self) -> Vec<(String, Member)> {
        self.members
            .read()
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect()
    }

    /// Member declared directly on this type
    #[must_use]
    pub fn own_member(&self, name: &str) -> Option<Member> {
        self.members.read().get(name).cloned()
    }

    /// Declare or replace a member in place
    pub fn set_member(&self, name: impl Into<String>, member: Member) -> Option<Member> {
        self.members.write().insert(name.into(), member)
    }

    /// Find a member on this type or its ancestors.
    ///
    /// Depth-first, left to right, first match wins; shared ancestors are
    /// visited once.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Member> {
        let mut visited = HashSet::new();
        self.resolve_in(name, &mut visited)
    }

    fn resolve_in(&self, name: &str, visited: &mut HashSet<*const TypeDef>) -> Option<Member> {
        if !visited.insert(self as *const TypeDef) {
            return None;
        }
        if let Some(member) = self.own_member(name) {
            return Some(member);
        }
        self.ancestors()
            .iter()
            .find_map(|ancestor| ancestor.resolve_in(name, visited))
    }

    /// True if `other` is this type or one of its transitive ancestors,
    /// compared by identity
    #[must_use]
    pub fn is_subtype_of(&self, other: &TypeDef) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.ancestors().iter().any(|a| a.is_subtype_of(other))
    }

    /// Construct an instance.
    ///
    /// Registers it with the home unit's instance registry and runs an
    /// `init` member if one resolves.
    ///
    /// # Errors
    /// Whatever `init` raises.
    pub fn construct(self: &Arc<Self>, args: &[Value]) -> Result<Arc<Instance>, CallError> {
        let instance = Instance::new(Arc::clone(self));
        if let Some(home) = self.home() {
            home.heap().register(&instance);
        }
        if self.resolve("init").is_some() {
            instance.call_method("init", args)?;
        }
        Ok(instance)
    }

    /// Call a member through the type itself.
    ///
    /// Type-bound members receive this type as receiver; instance-bound
    /// members receive `args` unchanged (the caller passes the receiver).
    ///
    /// # Errors
    /// [`CallError::NoSuchMember`] or whatever the member raises.
    pub fn call_member(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let member = self.resolve(name).ok_or_else(|| CallError::NoSuchMember {
            ty: self.qualified_name().to_string(),
            member: name.to_string(),
        })?;
        match member.binding() {
            Binding::Type => {
                let mut bound = Vec::with_capacity(args.len() + 1);
                bound.push(Value::from(Arc::clone(self)));
                bound.extend_from_slice(args);
                member.callable().call(&bound)
            }
            Binding::Instance | Binding::Static => member.callable().call(args),
        }
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ancestors: Vec<String> = self
            .ancestors()
            .iter()
            .map(|a| a.qualified_name().to_string())
            .collect();
        f.debug_struct("TypeDef")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("ancestors", &ancestors)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TypeDef`]
#[derive(Debug)]
pub struct TypeBuilder {
    owner: UnitName,
    home: Weak<Unit>,
    name: String,
    ancestors: Vec<Arc<TypeDef>>,
    members: IndexMap<String, Member>,
    layout: Layout,
}

impl TypeBuilder {
    /// Append an ancestor
    #[must_use]
    pub fn extends(mut self, ancestor: &Arc<TypeDef>) -> Self {
        self.ancestors.push(Arc::clone(ancestor));
        self
    }

    /// Set the instance layout
    #[must_use]
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Instance-bound method
    #[must_use]
    pub fn method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&crate::Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.bound(name, Binding::Instance, Arc::new(body))
    }

    /// Type-bound method
    #[must_use]
    pub fn type_method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&crate::Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.bound(name, Binding::Type, Arc::new(body))
    }

    /// Static method
    #[must_use]
    pub fn static_method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&crate::Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.bound(name, Binding::Static, Arc::new(body))
    }

    /// Attach an existing member
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.insert(name.into(), member);
        self
    }

    fn bound(mut self, name: &str, binding: Binding, body: Arc<Body>) -> Self {
        let callable = Callable::with_home(
            Arc::clone(&self.owner),
            name.to_string(),
            self.home.clone(),
            body,
        );
        self.members
            .insert(name.to_string(), Member::new(callable, binding));
        self
    }

    /// Finish the type and register it as a subtype of its ancestors
    #[must_use]
    pub fn build(self) -> Arc<TypeDef> {
        let ty = Arc::new(TypeDef {
            owner: self.owner,
            name: self.name,
            home: self.home,
            layout: self.layout,
            ancestors: RwLock::new(Vec::new()),
            subtypes: Mutex::new(Vec::new()),
            members: RwLock::new(self.members),
        });
        ty.set_ancestors(self.ancestors);
        ty
    }
}

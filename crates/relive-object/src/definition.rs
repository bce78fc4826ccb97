//! Definitions: callables and types, compared by identity
//!
//! Provides [`Definition`], [`DefId`], [`Callable`] and the call-time
//! [`Frame`] through which a body resolves its unit's globals.

use crate::error::CallError;
use crate::name::{QualifiedName, UnitName};
use crate::types::TypeDef;
use crate::unit::Unit;
use crate::value::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Body of a callable. Receivers (instance or type) arrive as `args[0]`.
pub type Body = dyn Fn(&Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync;

/// Identity of a definition
///
/// Derived from the allocation address, so it is only meaningful while the
/// definition is kept alive. Whoever stores a `DefId` must also hold the
/// definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefId(usize);

/// Definition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Function
    Callable,
    /// Type
    Type,
}

/// A callable or type owned by exactly one unit
#[derive(Clone)]
pub enum Definition {
    /// Function definition
    Callable(Arc<Callable>),
    /// Type definition
    Type(Arc<TypeDef>),
}

impl Definition {
    /// Identity of this definition
    #[must_use]
    pub fn id(&self) -> DefId {
        match self {
            Definition::Callable(c) => DefId(Arc::as_ptr(c).cast::<()>() as usize),
            Definition::Type(t) => DefId(Arc::as_ptr(t).cast::<()>() as usize),
        }
    }

    /// Kind of definition
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Callable(_) => DefinitionKind::Callable,
            Definition::Type(_) => DefinitionKind::Type,
        }
    }

    /// Owning unit
    #[must_use]
    pub fn owner(&self) -> &str {
        match self {
            Definition::Callable(c) => c.owner(),
            Definition::Type(t) => t.owner(),
        }
    }

    /// Intrinsic name (not the name it is exported under)
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Definition::Callable(c) => c.name(),
            Definition::Type(t) => t.name(),
        }
    }

    /// `owner.name`
    #[must_use]
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.owner(), self.name())
    }

    /// True if `unit` owns this definition
    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, unit: &str) -> bool {
        self.owner() == unit
    }

    /// Callable, if this is one
    #[inline]
    #[must_use]
    pub fn as_callable(&self) -> Option<&Arc<Callable>> {
        match self {
            Definition::Callable(c) => Some(c),
            Definition::Type(_) => None,
        }
    }

    /// Type, if this is one
    #[inline]
    #[must_use]
    pub fn as_type(&self) -> Option<&Arc<TypeDef>> {
        match self {
            Definition::Type(t) => Some(t),
            Definition::Callable(_) => None,
        }
    }
}

impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Definition::Callable(a), Definition::Callable(b)) => Arc::ptr_eq(a, b),
            (Definition::Type(a), Definition::Type(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Definition {}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Callable(c) => write!(f, "Callable({})", c.qualified_name()),
            Definition::Type(t) => write!(f, "Type({})", t.qualified_name()),
        }
    }
}

/// Function definition
///
/// Holds its owning unit's name and a weak handle to its home unit, which is
/// where the body's globals are resolved at call time. Because lookups go
/// through the home unit on every call, repairing a unit's export slot is
/// enough to redirect every body that reads it.
pub struct Callable {
    owner: UnitName,
    name: String,
    home: Weak<Unit>,
    body: Arc<Body>,
}

impl Callable {
    /// Create a callable whose globals live in `home`
    pub fn new<F>(home: &Arc<Unit>, name: impl Into<String>, body: F) -> Arc<Self>
    where
        F: Fn(&Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::with_home(home.name_arc(), name.into(), Arc::downgrade(home), Arc::new(body))
    }

    /// Create a callable with no home unit (host-native functions)
    pub fn detached<F>(owner: impl Into<UnitName>, name: impl Into<String>, body: F) -> Arc<Self>
    where
        F: Fn(&Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::with_home(owner.into(), name.into(), Weak::new(), Arc::new(body))
    }

    /// Create a replacement for `original` with the same owner, name and
    /// home unit but a new body. This is the shape wrappers are expected to
    /// return.
    pub fn wrapping<F>(original: &Arc<Callable>, body: F) -> Arc<Self>
    where
        F: Fn(&Frame<'_>, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::with_home(
            Arc::clone(&original.owner),
            original.name.clone(),
            original.home.clone(),
            Arc::new(body),
        )
    }

    pub(crate) fn with_home(owner: UnitName, name: String, home: Weak<Unit>, body: Arc<Body>) -> Arc<Self> {
        Arc::new(Self {
            owner,
            name,
            home,
            body,
        })
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

    /// Home unit, if still loaded
    #[inline]
    #[must_use]
    pub fn home(&self) -> Option<Arc<Unit>> {
        self.home.upgrade()
    }

    /// Invoke the body
    ///
    /// # Errors
    /// Whatever the body raises.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        let frame = Frame {
            callable: self,
            globals: self.home.upgrade(),
        };
        (self.body)(&frame, args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Call-time view of the running callable and its globals
pub struct Frame<'a> {
    callable: &'a Callable,
    globals: Option<Arc<Unit>>,
}

impl Frame<'_> {
    /// Callable being executed
    #[inline]
    #[must_use]
    pub fn callable(&self) -> &Callable {
        self.callable
    }

    /// Look up a global in the home unit
    ///
    /// # Errors
    /// [`CallError::HomeUnloaded`] or [`CallError::UndefinedGlobal`].
    pub fn global(&self, name: &str) -> Result<Value, CallError> {
        let unit = self
            .globals
            .as_ref()
            .ok_or_else(|| CallError::HomeUnloaded(self.callable.qualified_name().to_string()))?;
        unit.get(name).ok_or_else(|| CallError::UndefinedGlobal {
            unit: unit.name().to_string(),
            name: name.to_string(),
        })
    }

    /// Resolve a dotted path starting at a global.
    ///
    /// `b.f` reads global `b`, which must hold a unit (qualified access) or a
    /// type (member access), then reads `f` from it.
    ///
    /// # Errors
    /// Missing names or a segment applied to a value without members.
    pub fn resolve(&self, path: &str) -> Result<Value, CallError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self.global(first)?;
        for segment in segments {
            current = match &current {
                Value::Unit(unit) => unit.get(segment).ok_or_else(|| CallError::UndefinedGlobal {
                    unit: unit.name().to_string(),
                    name: segment.to_string(),
                })?,
                Value::Def(Definition::Type(ty)) => ty
                    .resolve(segment)
                    .map(|member| Value::from(Arc::clone(member.callable())))
                    .ok_or_else(|| CallError::NoSuchMember {
                        ty: ty.qualified_name().to_string(),
                        member: segment.to_string(),
                    })?,
                other => {
                    return Err(CallError::TypeMismatch {
                        expected: "unit or type",
                        actual: other.kind(),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Resolve `path` and call it
    ///
    /// # Errors
    /// Resolution errors or whatever the callee raises.
    pub fn call(&self, path: &str, args: &[Value]) -> Result<Value, CallError> {
        self.resolve(path)?.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitRegistry;

    #[test]
    fn definition_id_is_identity() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let f = Callable::new(&unit, "f", |_, _| Ok(Value::Nil));
        let g = Callable::new(&unit, "f", |_, _| Ok(Value::Nil));

        let a = Definition::Callable(Arc::clone(&f));
        let b = Definition::Callable(f);
        let c = Definition::Callable(g);

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.qualified_name(), c.qualified_name());
    }

    #[test]
    fn body_reads_globals_at_call_time() {
        let registry = UnitRegistry::new();
        let unit = registry.load("a");
        unit.set("greeting", Value::from("b"));
        let f = Callable::new(&unit, "f", |frame, _| frame.global("greeting"));

        assert_eq!(f.call(&[]).unwrap(), Value::from("b"));
        unit.set("greeting", Value::from("b2"));
        assert_eq!(f.call(&[]).unwrap(), Value::from("b2"));
    }

    #[test]
    fn resolve_follows_qualified_access() {
        let registry = UnitRegistry::new();
        let b = registry.load("b");
        let a = registry.load("a");
        b.set("f", Value::from(Callable::new(&b, "f", |_, _| Ok(Value::from("b")))));
        a.set("b", Value::from(Arc::clone(&b)));

        let g = Callable::new(&a, "g", |frame, _| frame.call("b.f", &[]));
        assert_eq!(g.call(&[]).unwrap(), Value::from("b"));
    }

    #[test]
    fn missing_global_is_reported() {
        let registry = UnitRegistry::new();
        let unit = registry.load("a");
        let f = Callable::new(&unit, "f", |frame, _| frame.global("nope"));

        let err = f.call(&[]).unwrap_err();
        assert_eq!(
            err,
            CallError::UndefinedGlobal {
                unit: "a".to_string(),
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn detached_callable_has_no_globals() {
        let f = Callable::detached("native", "f", |frame, _| frame.global("x"));
        assert!(matches!(f.call(&[]), Err(CallError::HomeUnloaded(_))));
    }

    #[test]
    fn wrapping_keeps_owner_and_name() {
        let registry = UnitRegistry::new();
        let unit = registry.load("b");
        let f = Callable::new(&unit, "f", |_, _| Ok(Value::Int(1)));
        let inner = Arc::clone(&f);
        let wrapped = Callable::wrapping(&f, move |_, args| {
            let out = inner.call(args)?;
            Ok(Value::from(out.as_int().unwrap_or_default() + 1))
        });

        assert_eq!(wrapped.qualified_name(), f.qualified_name());
        assert!(wrapped.home().is_some());
        assert_eq!(wrapped.call(&[]).unwrap(), Value::Int(2));
    }
}

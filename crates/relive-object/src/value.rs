//! Values held in export tables, fields and call arguments

use crate::definition::{Callable, Definition};
use crate::error::CallError;
use crate::instance::Instance;
use crate::types::TypeDef;
use crate::unit::Unit;
use std::fmt;
use std::sync::Arc;

/// A runtime value
///
/// Reference variants (`Object`, `Def`, `Unit`) compare by identity; scalar
/// variants compare by value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Immutable string
    Str(Arc<str>),
    /// Live instance
    Object(Arc<Instance>),
    /// Callable or type definition
    Def(Definition),
    /// Another unit, used for qualified access (`b.f`)
    Unit(Arc<Unit>),
}

impl Value {
    /// Short name of the variant, for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Object(_) => "object",
            Value::Def(Definition::Callable(_)) => "callable",
            Value::Def(Definition::Type(_)) => "type",
            Value::Unit(_) => "unit",
        }
    }

    /// Definition held by this value
    #[inline]
    #[must_use]
    pub fn as_definition(&self) -> Option<&Definition> {
        match self {
            Value::Def(def) => Some(def),
            _ => None,
        }
    }

    /// Callable held by this value
    #[inline]
    #[must_use]
    pub fn as_callable(&self) -> Option<&Arc<Callable>> {
        self.as_definition().and_then(Definition::as_callable)
    }

    /// Type held by this value
    #[inline]
    #[must_use]
    pub fn as_type(&self) -> Option<&Arc<TypeDef>> {
        self.as_definition().and_then(Definition::as_type)
    }

    /// Instance held by this value
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Unit held by this value
    #[inline]
    #[must_use]
    pub fn as_unit(&self) -> Option<&Arc<Unit>> {
        match self {
            Value::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    /// String contents
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// True for `Nil`
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Call this value.
    ///
    /// Callables run their body; types construct a new instance.
    ///
    /// # Errors
    /// [`CallError::NotCallable`] for anything else, or whatever the body raises.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        match self {
            Value::Def(Definition::Callable(callable)) => callable.call(args),
            Value::Def(Definition::Type(ty)) => ty.construct(args).map(Value::Object),
            other => Err(CallError::NotCallable(other.kind().to_string())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Def(a), Value::Def(b)) => a == b,
            (Value::Unit(a), Value::Unit(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(obj) => write!(f, "Object(<{}>)", obj.type_def().qualified_name()),
            Value::Def(def) => write!(f, "{def:?}"),
            Value::Unit(unit) => write!(f, "Unit({})", unit.name()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Definition> for Value {
    fn from(value: Definition) -> Self {
        Value::Def(value)
    }
}

impl From<Arc<Callable>> for Value {
    fn from(value: Arc<Callable>) -> Self {
        Value::Def(Definition::Callable(value))
    }
}

impl From<Arc<TypeDef>> for Value {
    fn from(value: Arc<TypeDef>) -> Self {
        Value::Def(Definition::Type(value))
    }
}

impl From<Arc<Instance>> for Value {
    fn from(value: Arc<Instance>) -> Self {
        Value::Object(value)
    }
}

impl From<Arc<Unit>> for Value {
    fn from(value: Arc<Unit>) -> Self {
        Value::Unit(value)
    }
}

//! Qualified names for definitions
//!
//! Provides [`QualifiedName`], the `(owning unit, path)` key used to match a
//! definition with its replacement after the original object is discarded.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Name of a unit. Cheap to clone, shared by every definition the unit owns.
pub type UnitName = Arc<str>;

/// Unit-scoped name of a definition or type member
///
/// Unlike a definition's identity, a qualified name survives recompilation:
/// the old and the new `b.C` share it.
///
/// # Structure
/// - `unit`: owning unit (`"b"`)
/// - `path`: segments inside the unit (`["C"]`, or `["C", "m"]` for a member)
///
/// # Example
/// ```
/// use relive_object::QualifiedName;
///
/// let ty = QualifiedName::new("pkg.b", "C");
/// let member = ty.child("m");
/// assert_eq!(member.to_string(), "pkg.b.C.m");
/// assert_eq!(member.name(), "m");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    unit: UnitName,
    path: Vec<String>,
}

impl QualifiedName {
    /// Create a top-level name inside `unit`
    #[inline]
    #[must_use]
    pub fn new(unit: impl Into<UnitName>, name: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            path: vec![name.into()],
        }
    }

    /// Owning unit
    #[inline]
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Path segments inside the unit
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Last segment
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    /// Name nested one level deeper (a member of a type)
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            unit: Arc::clone(&self.unit),
            path,
        }
    }

    /// True if this names something owned by `unit`
    #[inline]
    #[must_use]
    pub fn is_in_unit(&self, unit: &str) -> bool {
        &*self.unit == unit
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

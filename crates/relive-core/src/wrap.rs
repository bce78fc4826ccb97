//! Wrap engine
//!
//! Replaces every callable a unit owns with a wrapped version, and every
//! member declared directly on a type it owns. Types are modified in place,
//! so only callables need propagating afterwards.

use crate::index;
use crate::journal::{Journal, Level, ReloadEventKind};
use relive_object::{Callable, DefId, Definition, ExportTable, IntrospectError, Unit};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Produces the replacement for a callable, given the callable and its
/// qualified name (`owner.name` or `owner.Type.member`).
///
/// The replacement should keep the calling convention of the original;
/// [`Callable::wrapping`] keeps owner, name and home unit.
pub type Wrapper<'a> = dyn Fn(&Arc<Callable>, &str) -> Arc<Callable> + Send + Sync + 'a;

/// Which type members to wrap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// `None` wraps every member
    pub members: Option<HashSet<String>>,
}

impl WrapOptions {
    /// Wrap every member
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap only members with these names. Free callables are always wrapped.
    #[must_use]
    pub fn only_members<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// True if a member called `name` should be wrapped
    #[inline]
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        self.members.as_ref().map_or(true, |names| names.contains(name))
    }
}

/// Wrap everything `unit` owns and install the wrapped callables.
///
/// A definition exported under several names is wrapped once. Returns the
/// number of callables and members wrapped.
///
/// # Errors
/// [`IntrospectError`] if the unit is sealed or busy; nothing is wrapped.
pub fn wrap_unit(
    unit: &Unit,
    wrapper: &Wrapper<'_>,
    options: &WrapOptions,
    journal: &Journal,
) -> Result<usize, IntrospectError> {
    let owned = index::internal_members(unit)?;
    Ok(wrap_owned(unit, owned, wrapper, options, journal))
}

/// Wrap `owned`, the internal definitions of `unit` read beforehand
pub(crate) fn wrap_owned(
    unit: &Unit,
    owned: Vec<(String, Definition)>,
    wrapper: &Wrapper<'_>,
    options: &WrapOptions,
    journal: &Journal,
) -> usize {
    let mut wrapped: HashMap<DefId, Arc<Callable>> = HashMap::new();
    let mut wrapped_types: HashSet<DefId> = HashSet::new();
    let mut updates = ExportTable::new();
    let mut count = 0;

    for (name, def) in owned {
        let id = def.id();
        match def {
            Definition::Callable(callable) => {
                let replacement = wrapped.entry(id).or_insert_with(|| {
                    let qualified = callable.qualified_name().to_string();
                    count += 1;
                    journal.record(
                        Level::Debug,
                        unit.name(),
                        ReloadEventKind::Wrapped {
                            name: qualified.clone(),
                        },
                    );
                    wrapper(&callable, &qualified)
                });
                updates.insert(name, Arc::clone(replacement));
            }
            Definition::Type(ty) => {
                if !wrapped_types.insert(id) {
                    continue;
                }
                for (member_name, member) in ty.own_members() {
                    if !options.includes(&member_name) {
                        continue;
                    }
                    let qualified = index::member_qualified_name(&ty, &member_name).to_string();
                    let replacement = wrapper(member.callable(), &qualified);
                    ty.set_member(member_name, member.rebind(replacement));
                    count += 1;
                    journal.record(
                        Level::Debug,
                        unit.name(),
                        ReloadEventKind::Wrapped { name: qualified },
                    );
                }
            }
        }
    }

    unit.merge(updates);
    tracing::info!(unit = unit.name(), wrapped = count, "wrapped unit");
    count
}

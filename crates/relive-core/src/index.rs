//! Definition indexer
//!
//! Classifies a unit's exports into definitions it owns (internal) and
//! definitions it merely holds a copy of (external).

use relive_object::{Definition, ExportTable, IntrospectError, QualifiedName, TypeDef, Unit};

/// `(export name, definition)` for every export of `table` that is a definition
#[must_use]
pub fn definitions_in(table: &ExportTable) -> Vec<(String, Definition)> {
    table
        .iter()
        .filter_map(|(name, value)| value.as_definition().map(|def| (name.to_string(), def.clone())))
        .collect()
}

/// Every definition `unit` exports.
///
/// # Errors
/// [`IntrospectError`] if the unit is sealed or busy.
pub fn members(unit: &Unit) -> Result<Vec<(String, Definition)>, IntrospectError> {
    Ok(definitions_in(&unit.try_exports()?))
}

/// Definitions exported by `unit` that `unit` owns
///
/// # Errors
/// See [`members`].
pub fn internal_members(unit: &Unit) -> Result<Vec<(String, Definition)>, IntrospectError> {
    let mut defs = members(unit)?;
    defs.retain(|(_, def)| def.is_owned_by(unit.name()));
    Ok(defs)
}

/// Definitions exported by `unit` that another unit owns
///
/// # Errors
/// See [`members`].
pub fn external_members(unit: &Unit) -> Result<Vec<(String, Definition)>, IntrospectError> {
    let mut defs = members(unit)?;
    defs.retain(|(_, def)| !def.is_owned_by(unit.name()));
    Ok(defs)
}

/// Internal definitions of an already-copied table, by owner name
#[must_use]
pub fn internal_of(unit: &str, table: &ExportTable) -> Vec<(String, Definition)> {
    let mut defs = definitions_in(table);
    defs.retain(|(_, def)| def.is_owned_by(unit));
    defs
}

/// `owner.Type.member`
#[inline]
#[must_use]
pub fn member_qualified_name(ty: &TypeDef, member: &str) -> QualifiedName {
    ty.qualified_name().child(member)
}

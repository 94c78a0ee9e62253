use std::collections::HashSet;

use crate::{Error, Result, TypeDeclaration};

/// Names that collide with fixed routes under `/id/types/`.
pub const RESERVED_TYPE_NAMES: &[&str] = &["setup"];

/// Returns `true` if `name` is a segmented lowercase type name.
///
/// Names start with a lowercase ASCII letter and consist of lowercase
/// alphanumeric segments joined by single underscores: `user`, `order_item`,
/// `v2_session`. Empty segments (leading, trailing or doubled underscores) are
/// rejected, as are the [`RESERVED_TYPE_NAMES`].
pub fn is_valid_type_name(name: &str) -> bool {
    if !name.starts_with(|c: char| c.is_ascii_lowercase())
        || RESERVED_TYPE_NAMES.contains(&name)
    {
        return false;
    }
    name.split('_').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

/// Checks a set of type declarations before any of them is served.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the list is empty, a name is reserved
/// or not a valid type name, an id is zero, a description is blank, or a name or id
/// is declared twice.
pub fn validate_declarations(declarations: &[TypeDeclaration]) -> Result<()> {
    if declarations.is_empty() {
        return Err(Error::configuration("at least one type must be declared"));
    }

    let mut names = HashSet::with_capacity(declarations.len());
    let mut ids = HashSet::with_capacity(declarations.len());
    for decl in declarations {
        if RESERVED_TYPE_NAMES.contains(&decl.name.as_str()) {
            return Err(Error::configuration(format!(
                "type name '{}' is reserved",
                decl.name
            )));
        }
        if !is_valid_type_name(&decl.name) {
            return Err(Error::configuration(format!(
                "type name '{}' must be lowercase segments joined by '_'",
                decl.name
            )));
        }
        if decl.id == 0 {
            return Err(Error::configuration(format!(
                "type '{}' must have an id greater than 0",
                decl.name
            )));
        }
        if decl.description.trim().is_empty() {
            return Err(Error::configuration(format!(
                "type '{}' must have a description",
                decl.name
            )));
        }
        if !names.insert(decl.name.as_str()) {
            return Err(Error::configuration(format!(
                "type name '{}' is declared more than once",
                decl.name
            )));
        }
        if !ids.insert(decl.id) {
            return Err(Error::configuration(format!(
                "type '{}' uses id {} which is already taken",
                decl.name, decl.id
            )));
        }
    }
    Ok(())
}

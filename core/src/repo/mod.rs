//! Typed row access, one module per entity.
//!
//! Every function takes the connection explicitly. Lookups by id return `None`
//! when nothing matches. Cross-entity rules live in [`crate::service`].

pub mod custom_food;
pub mod favorite;
pub mod log_entry;
pub mod profile;
pub mod settings;
pub mod system_food;
pub mod template;
pub mod user;

use uuid::Uuid;

/// Macro columns in the order [`crate::models::Macros::from_row`] reads them.
pub(crate) const MACRO_COLUMNS: &str = "kcal, protein, fat, carbs, fibre, sugar, sodium";

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build a `LIKE` pattern matching `query` anywhere, with wildcards escaped by `\`.
pub(crate) fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("phở"), "%phở%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_new_id_unique() {
        assert_ne!(new_id(), new_id());
    }
}

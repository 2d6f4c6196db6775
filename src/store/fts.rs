//! FTS expression translation.
//!
//! SQLite's FTS5 `MATCH` dialect already supports the token syntax this
//! service documents — implicit `AND` between barewords, explicit `OR`
//! and `NOT`, quoted phrases, and trailing-`*` prefix matches — so this
//! module's job is narrow: reject syntactically invalid input as an
//! *input* error (never a storage error) before it reaches SQLite, where
//! an invalid MATCH expression would otherwise surface as an opaque
//! runtime failure deep inside the query.

use crate::errors::StoreError;

/// Validates (and passes through unchanged) a search expression.
pub fn translate(query: &str) -> Result<String, StoreError> {
    if query.trim().is_empty() {
        return Err(StoreError::InvalidQuery("empty search query".to_string()));
    }
    if query.matches('"').count() % 2 != 0 {
        return Err(StoreError::InvalidQuery(
            "unbalanced quote in search query".to_string(),
        ));
    }
    Ok(query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_query() {
        assert!(translate("").is_err());
        assert!(translate("   ").is_err());
    }

    #[test]
    fn rejects_unbalanced_quotes() {
        assert!(translate("\"player spawned").is_err());
    }

    #[test]
    fn passes_through_valid_expressions() {
        assert_eq!(translate("Player").unwrap(), "Player");
        assert_eq!(
            translate("\"Player spawned\" OR Enemy*").unwrap(),
            "\"Player spawned\" OR Enemy*"
        );
        assert_eq!(translate("a NOT b").unwrap(), "a NOT b");
    }
}

//! SQL fingerprinting
//!
//! Collapses many occurrences of the same statement shape onto one Query row.
//! Statements are normalized (literals replaced with `?`, `IN` lists collapsed,
//! whitespace squeezed) and the normalized text is hashed with SHA-256.

use std::sync::OnceLock;

use regex::Regex;

use crate::utils::crypto::sha256_hex;

/// Normalized statement text plus its content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub normalized_sql: String,
    pub hashed_sql: String,
}

impl Fingerprint {
    /// Fingerprint text that is already normalized
    pub fn of_normalized(normalized_sql: impl Into<String>) -> Self {
        let normalized_sql = normalized_sql.into();
        let hashed_sql = sha256_hex(&normalized_sql);
        Self {
            normalized_sql,
            hashed_sql,
        }
    }

    /// Normalize raw SQL, then fingerprint it
    pub fn of_raw(sql: &str) -> Self {
        Self::of_normalized(normalize_sql(sql))
    }
}

fn string_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'(?:[^']|'')*'").expect("Invalid regex"))
}

fn positional_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\d+").expect("Invalid regex"))
}

fn numeric_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("Invalid regex"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"))
}

fn in_list() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bIN\s*\(\s*\?(?:\s*,\s*\?)*\s*\)").expect("Invalid regex"))
}

/// Normalize a SQL statement for fingerprinting.
///
/// Already-normalized text passes through unchanged, so applying this twice
/// yields the same result as applying it once.
pub fn normalize_sql(sql: &str) -> String {
    let sql = string_literal().replace_all(sql, "?");
    let sql = positional_param().replace_all(&sql, "?");
    let sql = numeric_literal().replace_all(&sql, "?");
    let sql = whitespace().replace_all(&sql, " ");
    let sql = in_list().replace_all(&sql, "IN (?)");

    sql.trim().trim_end_matches(';').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_replaced() {
        assert_eq!(
            normalize_sql("SELECT * FROM users WHERE id = 42 AND name = 'bob'"),
            "SELECT * FROM users WHERE id = ? AND name = ?"
        );
    }

    #[test]
    fn test_escaped_quote_in_string() {
        assert_eq!(
            normalize_sql("SELECT 1 FROM t WHERE s = 'it''s'"),
            "SELECT ? FROM t WHERE s = ?"
        );
    }

    #[test]
    fn test_positional_params_replaced() {
        assert_eq!(
            normalize_sql("SELECT * FROM users WHERE id = $1 LIMIT $2"),
            "SELECT * FROM users WHERE id = ? LIMIT ?"
        );
    }

    #[test]
    fn test_identifiers_with_digits_kept() {
        assert_eq!(
            normalize_sql("SELECT t1.col2 FROM table3 t1"),
            "SELECT t1.col2 FROM table3 t1"
        );
    }

    #[test]
    fn test_in_list_collapsed() {
        assert_eq!(
            normalize_sql("SELECT * FROM users WHERE id IN (1, 2, 3)"),
            "SELECT * FROM users WHERE id IN (?)"
        );
        assert_eq!(
            normalize_sql("SELECT * FROM users WHERE id in (?,?)"),
            "SELECT * FROM users WHERE id IN (?)"
        );
    }

    #[test]
    fn test_whitespace_and_semicolon() {
        assert_eq!(
            normalize_sql("  SELECT *\n   FROM users\tWHERE id = 1 ;  "),
            "SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_sql("UPDATE users SET name = 'x' WHERE id IN (1,2)");
        assert_eq!(normalize_sql(&once), once);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::of_raw("SELECT * FROM users WHERE id = 1");
        let b = Fingerprint::of_raw("SELECT  *  FROM users WHERE id = 99;");
        assert_eq!(a, b);
        assert_eq!(a.hashed_sql.len(), 64);
        assert_eq!(a.hashed_sql, sha256_hex("SELECT * FROM users WHERE id = ?"));
    }

    #[test]
    fn test_different_shapes_differ() {
        let a = Fingerprint::of_normalized("SELECT * FROM users WHERE id = ?");
        let b = Fingerprint::of_normalized("SELECT * FROM posts WHERE id = ?");
        assert_ne!(a.hashed_sql, b.hashed_sql);
    }
}

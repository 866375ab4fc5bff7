//! SQLite SQL dialect implementation

use super::SqlDialect;

/// Bind limit of SQLite builds older than 3.32
const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

/// SQLite SQL dialect
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_bind_params(&self) -> usize {
        SQLITE_MAX_VARIABLE_NUMBER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.placeholder(1), "?");
        assert_eq!(dialect.placeholder(5), "?");
    }

    #[test]
    fn test_values_rows() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.values_rows(2, 3), "(?, ?, ?), (?, ?, ?)");
    }

    #[test]
    fn test_rows_per_insert_respects_bind_limit() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.rows_per_insert(9, 100), 100);
        assert_eq!(dialect.rows_per_insert(9, 500), 111);
    }
}

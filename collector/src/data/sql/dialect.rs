//! SQL dialect trait for multi-database support
//!
//! This trait defines the interface for generating database-specific SQL syntax.

/// SQL dialect trait for generating database-specific SQL
///
/// The backends differ in:
/// - Parameter placeholders (? vs $1)
/// - Maximum bind parameters per statement
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Generate a parameter placeholder for the given index (1-based)
    ///
    /// - SQLite: Always returns "?"
    /// - PostgreSQL: Returns "$1", "$2", etc.
    fn placeholder(&self, index: usize) -> String;

    /// Maximum number of bind parameters in one statement
    fn max_bind_params(&self) -> usize;

    /// Comma-separated placeholders for `count` parameters starting at `start`
    fn placeholder_list(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `VALUES` tuples for a multi-row insert: `(?, ?), (?, ?)`
    fn values_rows(&self, rows: usize, columns: usize) -> String {
        (0..rows)
            .map(|row| format!("({})", self.placeholder_list(row * columns + 1, columns)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Rows per multi-row insert that stay within the bind limit
    fn rows_per_insert(&self, columns: usize, preferred: usize) -> usize {
        let limit = self.max_bind_params() / columns.max(1);
        preferred.min(limit).max(1)
    }
}

//! PostgreSQL SQL dialect implementation

use super::SqlDialect;

/// Bind parameter count is a u16 in the wire protocol
const POSTGRES_MAX_BIND_PARAMS: usize = 65_535;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn max_bind_params(&self) -> usize {
        POSTGRES_MAX_BIND_PARAMS
    }
}

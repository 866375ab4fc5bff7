//! SQLite repositories
//!
//! Write functions take a `&mut SqliteConnection` so the persistence body can
//! run them on one pooled connection inside one transaction. Read functions
//! take the pool.

pub mod job;
pub mod maintenance;
pub mod operation;
pub mod persist;
pub mod query;
pub mod request;
pub mod route;

pub use job::{count_job_runs, find_or_create_job, get_job_run, insert_job_run};
pub use maintenance::merge_duplicate_queries;
pub use operation::{insert_operations, list_operations};
pub use persist::{persist_job_run, persist_request};
pub use query::{find_query_by_hash, insert_or_reuse_query, resolve_query};
pub use request::{count_requests, get_request, insert_request};
pub use route::{find_or_create_route, find_route};

#[cfg(test)]
pub(crate) async fn setup_test_pool() -> sqlx::SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(":memory:")
        .await
        .unwrap();
    sqlx::raw_sql(crate::data::sqlite::schema::SCHEMA)
        .execute(&pool)
        .await
        .unwrap();
    pool
}

//! Route repository for PostgreSQL operations

use sqlx::{PgConnection, PgPool};

use crate::data::postgres::PostgresError;
use crate::data::types::RouteRow;

/// Find the route for `(method, path)`, creating it on first use
pub async fn find_or_create_route(
    conn: &mut PgConnection,
    method: &str,
    path: &str,
    now: i64,
) -> Result<i64, PostgresError> {
    sqlx::query(
        r#"
        INSERT INTO routes (method, path, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (method, path) DO NOTHING
        "#,
    )
    .bind(method)
    .bind(path)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM routes WHERE method = $1 AND path = $2")
        .bind(method)
        .bind(path)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

pub async fn find_route(
    pool: &PgPool,
    method: &str,
    path: &str,
) -> Result<Option<RouteRow>, PostgresError> {
    let row = sqlx::query_as::<_, (i64, String, String, i64)>(
        "SELECT id, method, path, created_at FROM routes WHERE method = $1 AND path = $2",
    )
    .bind(method)
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, method, path, created_at)| RouteRow {
        id,
        method,
        path,
        created_at,
    }))
}

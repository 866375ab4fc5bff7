//! Route repository for SQLite operations

use sqlx::{SqliteConnection, SqlitePool};

use crate::data::sqlite::SqliteError;
use crate::data::types::RouteRow;

/// Find the route for `(method, path)`, creating it on first use
pub async fn find_or_create_route(
    conn: &mut SqliteConnection,
    method: &str,
    path: &str,
    now: i64,
) -> Result<i64, SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO routes (method, path, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT (method, path) DO NOTHING
        "#,
    )
    .bind(method)
    .bind(path)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM routes WHERE method = ? AND path = ?")
        .bind(method)
        .bind(path)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

pub async fn find_route(
    pool: &SqlitePool,
    method: &str,
    path: &str,
) -> Result<Option<RouteRow>, SqliteError> {
    let row = sqlx::query_as::<_, (i64, String, String, i64)>(
        "SELECT id, method, path, created_at FROM routes WHERE method = ? AND path = ?",
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

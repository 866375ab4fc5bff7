//! Query fingerprint repository for PostgreSQL operations

use sqlx::{Connection, PgConnection};

use crate::data::error::is_unique_violation;
use crate::data::fingerprint::Fingerprint;
use crate::data::postgres::PostgresError;
use crate::data::types::QueryRow;

type QueryTuple = (i64, String, String, i64);

fn to_row((id, normalized_sql, hashed_sql, created_at): QueryTuple) -> QueryRow {
    QueryRow {
        id,
        normalized_sql,
        hashed_sql,
        created_at,
    }
}

pub async fn find_query_by_hash(
    conn: &mut PgConnection,
    hashed_sql: &str,
) -> Result<Option<QueryRow>, PostgresError> {
    let row = sqlx::query_as::<_, QueryTuple>(
        "SELECT id, normalized_sql, hashed_sql, created_at FROM queries WHERE hashed_sql = $1",
    )
    .bind(hashed_sql)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(to_row))
}

/// Insert a query row, reusing the existing row if another writer won the race.
///
/// A failed statement aborts the whole PostgreSQL transaction, so the insert
/// runs inside a savepoint that is rolled back on unique violation.
pub async fn insert_or_reuse_query(
    conn: &mut PgConnection,
    fingerprint: &Fingerprint,
    now: i64,
) -> Result<QueryRow, PostgresError> {
    let mut savepoint = conn.begin().await?;

    let inserted = sqlx::query_as::<_, QueryTuple>(
        r#"
        INSERT INTO queries (normalized_sql, hashed_sql, created_at)
        VALUES ($1, $2, $3)
        RETURNING id, normalized_sql, hashed_sql, created_at
        "#,
    )
    .bind(&fingerprint.normalized_sql)
    .bind(&fingerprint.hashed_sql)
    .bind(now)
    .fetch_one(&mut *savepoint)
    .await;

    match inserted {
        Ok(row) => {
            savepoint.commit().await?;
            Ok(to_row(row))
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await?;
            tracing::debug!(hashed_sql = %fingerprint.hashed_sql, "Query fingerprint race, reusing winner");
            find_query_by_hash(conn, &fingerprint.hashed_sql)
                .await?
                .ok_or(PostgresError::Database(e))
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e.into())
        }
    }
}

/// Resolve a fingerprint to its query row: look up by digest, insert if absent
pub async fn resolve_query(
    conn: &mut PgConnection,
    fingerprint: &Fingerprint,
    now: i64,
) -> Result<QueryRow, PostgresError> {
    if let Some(row) = find_query_by_hash(conn, &fingerprint.hashed_sql).await? {
        return Ok(row);
    }
    insert_or_reuse_query(conn, fingerprint, now).await
}

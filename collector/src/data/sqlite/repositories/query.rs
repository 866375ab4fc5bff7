//! Query fingerprint repository for SQLite operations

use sqlx::{Connection, SqliteConnection};

use crate::data::error::is_unique_violation;
use crate::data::fingerprint::Fingerprint;
use crate::data::sqlite::SqliteError;
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
    conn: &mut SqliteConnection,
    hashed_sql: &str,
) -> Result<Option<QueryRow>, SqliteError> {
    let row = sqlx::query_as::<_, QueryTuple>(
        "SELECT id, normalized_sql, hashed_sql, created_at FROM queries WHERE hashed_sql = ?",
    )
    .bind(hashed_sql)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(to_row))
}

/// Insert a query row, reusing the existing row if another writer won the race.
///
/// The insert runs inside a savepoint so a unique violation leaves the
/// surrounding transaction usable.
pub async fn insert_or_reuse_query(
    conn: &mut SqliteConnection,
    fingerprint: &Fingerprint,
    now: i64,
) -> Result<QueryRow, SqliteError> {
    let mut savepoint = conn.begin().await?;

    let inserted = sqlx::query_as::<_, QueryTuple>(
        r#"
        INSERT INTO queries (normalized_sql, hashed_sql, created_at)
        VALUES (?, ?, ?)
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
                .ok_or(SqliteError::Database(e))
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e.into())
        }
    }
}

/// Resolve a fingerprint to its query row: look up by digest, insert if absent
pub async fn resolve_query(
    conn: &mut SqliteConnection,
    fingerprint: &Fingerprint,
    now: i64,
) -> Result<QueryRow, SqliteError> {
    if let Some(row) = find_query_by_hash(conn, &fingerprint.hashed_sql).await? {
        return Ok(row);
    }
    insert_or_reuse_query(conn, fingerprint, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::setup_test_pool;

    #[tokio::test]
    async fn test_resolve_reuses_row_for_same_shape() {
        let pool = setup_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = resolve_query(&mut conn, &Fingerprint::of_raw("SELECT * FROM users WHERE id = 1"), 1)
            .await
            .unwrap();
        let b = resolve_query(&mut conn, &Fingerprint::of_raw("SELECT * FROM users WHERE id = 2"), 2)
            .await
            .unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.normalized_sql, "SELECT * FROM users WHERE id = ?");
        assert_eq!(a.created_at, 1);
    }

    #[tokio::test]
    async fn test_losing_writer_reuses_winner() {
        let pool = setup_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let fingerprint = Fingerprint::of_normalized("SELECT * FROM posts");

        // Winner commits first; the loser never saw it in its lookup
        let winner = insert_or_reuse_query(&mut conn, &fingerprint, 10).await.unwrap();
        let loser = insert_or_reuse_query(&mut conn, &fingerprint, 20).await.unwrap();

        assert_eq!(winner, loser);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queries")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_race_inside_outer_transaction_keeps_it_usable() {
        let pool = setup_test_pool().await;
        let fingerprint = Fingerprint::of_normalized("DELETE FROM sessions WHERE id = ?");
        {
            let mut conn = pool.acquire().await.unwrap();
            insert_or_reuse_query(&mut conn, &fingerprint, 1).await.unwrap();
        }

        let mut tx = pool.begin().await.unwrap();
        let reused = insert_or_reuse_query(&mut tx, &fingerprint, 2).await.unwrap();
        let other = resolve_query(&mut tx, &Fingerprint::of_normalized("SELECT ?"), 3)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(reused.created_at, 1);
        assert_ne!(reused.id, other.id);
    }
}

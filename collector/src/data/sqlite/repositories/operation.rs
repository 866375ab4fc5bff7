//! Operation repository for SQLite operations

use sqlx::{SqliteConnection, SqlitePool};

use crate::core::constants::OPERATION_INSERT_BATCH_ROWS;
use crate::data::sql::{SqlDialect, SqliteDialect};
use crate::data::sqlite::SqliteError;
use crate::data::types::{OperationEvent, OperationKind, OperationOwner, OperationRow};
use crate::utils::time::datetime_to_millis;

const OPERATION_COLUMNS: usize = 9;

/// Bulk insert operations for one owner, preserving capture order.
///
/// `query_ids[i]` is the resolved query for `operations[i]` (SQL only).
/// Returns the number of rows written.
pub async fn insert_operations(
    conn: &mut SqliteConnection,
    owner: OperationOwner,
    operations: &[OperationEvent],
    query_ids: &[Option<i64>],
) -> Result<usize, SqliteError> {
    if operations.is_empty() {
        return Ok(0);
    }

    let (request_id, job_run_id) = owner.columns();
    let dialect = SqliteDialect;
    let chunk_rows = dialect.rows_per_insert(OPERATION_COLUMNS, OPERATION_INSERT_BATCH_ROWS);
    let mut written = 0usize;

    for (chunk_index, chunk) in operations.chunks(chunk_rows).enumerate() {
        let sql = format!(
            r#"
            INSERT INTO operations (
                request_id, job_run_id, query_id, position, operation_type,
                label, duration_ms, codebase_location, occurred_at
            )
            VALUES {}
            "#,
            dialect.values_rows(chunk.len(), OPERATION_COLUMNS)
        );

        let mut query = sqlx::query(&sql);
        for (offset, op) in chunk.iter().enumerate() {
            let position = chunk_index * chunk_rows + offset;
            query = query
                .bind(request_id)
                .bind(job_run_id)
                .bind(query_ids.get(position).copied().flatten())
                .bind(position as i64)
                .bind(op.kind.as_str())
                .bind(&op.label)
                .bind(op.duration_ms)
                .bind(op.codebase_location.as_deref())
                .bind(datetime_to_millis(&op.occurred_at));
        }

        written += query.execute(&mut *conn).await?.rows_affected() as usize;
    }

    Ok(written)
}

type OperationTuple = (
    i64,
    Option<i64>,
    Option<i64>,
    i32,
    String,
    String,
    f64,
    Option<String>,
    i64,
    Option<i64>,
);

/// List operations of one owner in capture order
pub async fn list_operations(
    pool: &SqlitePool,
    owner: OperationOwner,
) -> Result<Vec<OperationRow>, SqliteError> {
    let (column, owner_id) = match owner {
        OperationOwner::Request(id) => ("request_id", id),
        OperationOwner::JobRun(id) => ("job_run_id", id),
    };

    let sql = format!(
        r#"
        SELECT id, request_id, job_run_id, position, operation_type, label,
               duration_ms, codebase_location, occurred_at, query_id
        FROM operations
        WHERE {} = ?
        ORDER BY position ASC
        "#,
        column
    );

    let rows = sqlx::query_as::<_, OperationTuple>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(
            |(
                id,
                request_id,
                job_run_id,
                position,
                operation_type,
                label,
                duration_ms,
                codebase_location,
                occurred_at,
                query_id,
            )| {
                let owner = match (request_id, job_run_id) {
                    (Some(request_id), None) => OperationOwner::Request(request_id),
                    (None, Some(job_run_id)) => OperationOwner::JobRun(job_run_id),
                    _ => owner,
                };
                let operation_type = operation_type
                    .parse::<OperationKind>()
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok::<_, SqliteError>(OperationRow {
                    id,
                    owner,
                    position,
                    operation_type,
                    label,
                    duration_ms,
                    codebase_location,
                    occurred_at,
                    query_id,
                })
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::{find_or_create_route, insert_request, setup_test_pool};
    use crate::data::types::RequestPayload;

    async fn seed_request(pool: &SqlitePool, uuid: &str) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        let route_id = find_or_create_route(&mut conn, "GET", "/users", 1).await.unwrap();
        let payload = RequestPayload::new("GET", "/users", 200, 10.0, uuid);
        insert_request(&mut conn, route_id, &payload).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_insert_operations_preserves_order() {
        let pool = setup_test_pool().await;
        let request_id = seed_request(&pool, "uuid-1").await;

        let ops = vec![
            OperationEvent::new(OperationKind::Sql, "SELECT 1", 1.0),
            OperationEvent::new(OperationKind::Template, "users/index", 2.0)
                .with_location("src/views.rs:10"),
            OperationEvent::new(OperationKind::CacheRead, "users:all", 0.5),
        ];
        let mut conn = pool.acquire().await.unwrap();
        let written = insert_operations(
            &mut conn,
            OperationOwner::Request(request_id),
            &ops,
            &[None, None, None],
        )
        .await
        .unwrap();
        drop(conn);
        assert_eq!(written, 3);

        let rows = list_operations(&pool, OperationOwner::Request(request_id))
            .await
            .unwrap();
        let labels: Vec<_> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["SELECT 1", "users/index", "users:all"]);
        assert_eq!(rows[1].codebase_location.as_deref(), Some("src/views.rs:10"));
        assert_eq!(rows[2].operation_type, OperationKind::CacheRead);
        assert!(rows.iter().all(|r| r.owner == OperationOwner::Request(request_id)));
    }

    #[tokio::test]
    async fn test_insert_operations_spans_multiple_chunks() {
        let pool = setup_test_pool().await;
        let request_id = seed_request(&pool, "uuid-2").await;

        let ops: Vec<_> = (0..250)
            .map(|i| OperationEvent::new(OperationKind::Partial, format!("partial-{i}"), 0.1))
            .collect();
        let mut conn = pool.acquire().await.unwrap();
        let written = insert_operations(&mut conn, OperationOwner::Request(request_id), &ops, &[])
            .await
            .unwrap();
        drop(conn);
        assert_eq!(written, 250);

        let rows = list_operations(&pool, OperationOwner::Request(request_id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 250);
        assert_eq!(rows[249].position, 249);
        assert_eq!(rows[249].label, "partial-249");
    }

    #[tokio::test]
    async fn test_operation_without_owner_rejected_by_schema() {
        let pool = setup_test_pool().await;
        let result = sqlx::query(
            "INSERT INTO operations (position, operation_type, label, duration_ms, occurred_at) VALUES (0, 'sql', 'x', 1.0, 0)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}

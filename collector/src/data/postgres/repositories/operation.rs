//! Operation repository for PostgreSQL operations

use sqlx::{PgConnection, PgPool};

use crate::core::constants::OPERATION_INSERT_BATCH_ROWS;
use crate::data::postgres::PostgresError;
use crate::data::sql::{PostgresDialect, SqlDialect};
use crate::data::types::{OperationEvent, OperationKind, OperationOwner, OperationRow};
use crate::utils::time::datetime_to_millis;

const OPERATION_COLUMNS: usize = 9;

/// Bulk insert operations for one owner, preserving capture order
pub async fn insert_operations(
    conn: &mut PgConnection,
    owner: OperationOwner,
    operations: &[OperationEvent],
    query_ids: &[Option<i64>],
) -> Result<usize, PostgresError> {
    if operations.is_empty() {
        return Ok(0);
    }

    let (request_id, job_run_id) = owner.columns();
    let dialect = PostgresDialect;
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
                .bind(i32::try_from(position).unwrap_or(i32::MAX))
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
    pool: &PgPool,
    owner: OperationOwner,
) -> Result<Vec<OperationRow>, PostgresError> {
    let (column, owner_id) = match owner {
        OperationOwner::Request(id) => ("request_id", id),
        OperationOwner::JobRun(id) => ("job_run_id", id),
    };

    let sql = format!(
        r#"
        SELECT id, request_id, job_run_id, position, operation_type, label,
               duration_ms, codebase_location, occurred_at, query_id
        FROM operations
        WHERE {} = $1
        ORDER BY position ASC
        "#,
        column
    );

    let rows = sqlx::query_as::<_, OperationTuple>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

    let mut operations = Vec::with_capacity(rows.len());
    for (
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
    ) in rows
    {
        let owner = match (request_id, job_run_id) {
            (Some(request_id), None) => OperationOwner::Request(request_id),
            (None, Some(job_run_id)) => OperationOwner::JobRun(job_run_id),
            _ => owner,
        };
        let operation_type = operation_type
            .parse::<OperationKind>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        operations.push(OperationRow {
            id,
            owner,
            position,
            operation_type,
            label,
            duration_ms,
            codebase_location,
            occurred_at,
            query_id,
        });
    }
    Ok(operations)
}

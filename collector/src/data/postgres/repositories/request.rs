//! Request repository for PostgreSQL operations

use sqlx::{PgConnection, PgPool};

use crate::data::postgres::PostgresError;
use crate::data::types::{RequestPayload, RequestRow};
use crate::utils::time::datetime_to_millis;

/// Insert a request row (idempotent on `request_uuid`)
///
/// Returns the new id, or `None` when the uuid was already stored.
pub async fn insert_request(
    conn: &mut PgConnection,
    route_id: i64,
    payload: &RequestPayload,
) -> Result<Option<i64>, PostgresError> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO requests (
            route_id, request_uuid, method, path, duration_ms,
            status, is_error, label, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (request_uuid) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(route_id)
    .bind(&payload.unique_id)
    .bind(&payload.method)
    .bind(&payload.path)
    .bind(payload.duration_ms)
    .bind(i32::from(payload.status))
    .bind(payload.is_error)
    .bind(payload.label.as_deref())
    .bind(datetime_to_millis(&payload.occurred_at))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

type RequestTuple = (
    i64,
    i64,
    String,
    String,
    String,
    f64,
    i32,
    bool,
    Option<String>,
    i64,
);

pub async fn get_request(
    pool: &PgPool,
    request_uuid: &str,
) -> Result<Option<RequestRow>, PostgresError> {
    let row = sqlx::query_as::<_, RequestTuple>(
        r#"
        SELECT id, route_id, request_uuid, method, path, duration_ms,
               status, is_error, label, occurred_at
        FROM requests
        WHERE request_uuid = $1
        "#,
    )
    .bind(request_uuid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, route_id, request_uuid, method, path, duration_ms, status, is_error, label, occurred_at)| {
            RequestRow {
                id,
                route_id,
                request_uuid,
                method,
                path,
                duration_ms,
                status,
                is_error,
                label,
                occurred_at,
            }
        },
    ))
}

pub async fn count_requests(pool: &PgPool) -> Result<u64, PostgresError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requests")
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}

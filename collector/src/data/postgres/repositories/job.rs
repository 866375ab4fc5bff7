//! Job and job run repository for PostgreSQL operations

use sqlx::{PgConnection, PgPool};

use crate::data::postgres::PostgresError;
use crate::data::types::{JobRunPayload, JobRunRow, JobRunStatus};
use crate::utils::time::datetime_to_millis;

/// Find the job for `(name, queue)`, creating it on first use
pub async fn find_or_create_job(
    conn: &mut PgConnection,
    name: &str,
    queue: Option<&str>,
    now: i64,
) -> Result<i64, PostgresError> {
    let queue = queue.unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO jobs (name, queue, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (name, queue) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(queue)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM jobs WHERE name = $1 AND queue = $2")
        .bind(name)
        .bind(queue)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Insert a job run row (idempotent on `run_id`)
pub async fn insert_job_run(
    conn: &mut PgConnection,
    job_id: i64,
    payload: &JobRunPayload,
) -> Result<Option<i64>, PostgresError> {
    let attempts = i32::try_from(payload.attempts).unwrap_or(i32::MAX);

    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO job_runs (
            job_id, run_id, duration_ms, status, error_class, error_message,
            attempts, enqueued_at, occurred_at, adapter
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (run_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(job_id)
    .bind(&payload.run_id)
    .bind(payload.duration_ms)
    .bind(payload.status.as_str())
    .bind(payload.error_class.as_deref())
    .bind(payload.error_message.as_deref())
    .bind(attempts)
    .bind(payload.enqueued_at.as_ref().map(datetime_to_millis))
    .bind(datetime_to_millis(&payload.occurred_at))
    .bind(payload.adapter.as_deref())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

type JobRunTuple = (
    i64,
    i64,
    String,
    f64,
    String,
    Option<String>,
    Option<String>,
    i32,
    Option<i64>,
    i64,
    Option<String>,
);

pub async fn get_job_run(pool: &PgPool, run_id: &str) -> Result<Option<JobRunRow>, PostgresError> {
    let row = sqlx::query_as::<_, JobRunTuple>(
        r#"
        SELECT id, job_id, run_id, duration_ms, status, error_class, error_message,
               attempts, enqueued_at, occurred_at, adapter
        FROM job_runs
        WHERE run_id = $1
        "#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    let Some((
        id,
        job_id,
        run_id,
        duration_ms,
        status,
        error_class,
        error_message,
        attempts,
        enqueued_at,
        occurred_at,
        adapter,
    )) = row
    else {
        return Ok(None);
    };

    let status = status
        .parse::<JobRunStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Some(JobRunRow {
        id,
        job_id,
        run_id,
        duration_ms,
        status,
        error_class,
        error_message,
        attempts,
        enqueued_at,
        occurred_at,
        adapter,
    }))
}

pub async fn count_job_runs(pool: &PgPool) -> Result<u64, PostgresError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_runs")
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}

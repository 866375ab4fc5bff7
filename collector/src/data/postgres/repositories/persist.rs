//! Persistence body for captured units of work (PostgreSQL)
//!
//! Same transaction layout as the SQLite body. Concurrent collectors may race
//! on route, job and query rows; the upserts and the fingerprint savepoint
//! absorb that.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use super::{job, operation, query, request, route};
use crate::data::fingerprint::Fingerprint;
use crate::data::postgres::PostgresError;
use crate::data::types::{
    JobRunPayload, OperationEvent, OperationKind, OperationOwner, PersistOutcome, RequestPayload,
};
use crate::utils::time::now_millis;

async fn resolve_operation_queries(
    conn: &mut PgConnection,
    operations: &[OperationEvent],
    now: i64,
) -> Result<Vec<Option<i64>>, PostgresError> {
    let mut resolved: HashMap<String, i64> = HashMap::new();
    let mut query_ids = Vec::with_capacity(operations.len());

    for op in operations {
        if op.kind != OperationKind::Sql {
            query_ids.push(None);
            continue;
        }
        let fingerprint = Fingerprint::of_raw(&op.label);
        if let Some(id) = resolved.get(&fingerprint.hashed_sql) {
            query_ids.push(Some(*id));
            continue;
        }
        let id = query::resolve_query(conn, &fingerprint, now).await?.id;
        resolved.insert(fingerprint.hashed_sql, id);
        query_ids.push(Some(id));
    }

    Ok(query_ids)
}

pub async fn persist_request(
    pool: &PgPool,
    payload: &RequestPayload,
) -> Result<PersistOutcome, PostgresError> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let route_id = route::find_or_create_route(&mut tx, &payload.method, &payload.path, now).await?;

    let Some(request_id) = request::insert_request(&mut tx, route_id, payload).await? else {
        tx.rollback().await?;
        tracing::debug!(request_uuid = %payload.unique_id, "Request already stored, skipping");
        return Ok(PersistOutcome::Duplicate);
    };

    let query_ids = resolve_operation_queries(&mut tx, &payload.operations, now).await?;
    let operations = operation::insert_operations(
        &mut tx,
        OperationOwner::Request(request_id),
        &payload.operations,
        &query_ids,
    )
    .await?;

    tx.commit().await?;

    Ok(PersistOutcome::Created {
        id: request_id,
        operations,
    })
}

pub async fn persist_job_run(
    pool: &PgPool,
    payload: &JobRunPayload,
) -> Result<PersistOutcome, PostgresError> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let job_id =
        job::find_or_create_job(&mut tx, &payload.job_name, payload.queue.as_deref(), now).await?;

    let Some(job_run_id) = job::insert_job_run(&mut tx, job_id, payload).await? else {
        tx.rollback().await?;
        tracing::debug!(run_id = %payload.run_id, "Job run already stored, skipping");
        return Ok(PersistOutcome::Duplicate);
    };

    let query_ids = resolve_operation_queries(&mut tx, &payload.operations, now).await?;
    let operations = operation::insert_operations(
        &mut tx,
        OperationOwner::JobRun(job_run_id),
        &payload.operations,
        &query_ids,
    )
    .await?;

    tx.commit().await?;

    Ok(PersistOutcome::Created {
        id: job_run_id,
        operations,
    })
}

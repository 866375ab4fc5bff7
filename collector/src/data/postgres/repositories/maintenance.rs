//! Query dedup maintenance for PostgreSQL

use sqlx::{PgConnection, PgPool};

use crate::data::postgres::PostgresError;
use crate::data::sql::{PostgresDialect, SqlDialect};
use crate::data::types::MergeReport;
use crate::utils::crypto::sha256_hex;

/// Merge duplicate query rows in one transaction
///
/// Survivor per group is the earliest row, lowest id on ties.
pub async fn merge_duplicate_queries(pool: &PgPool) -> Result<MergeReport, PostgresError> {
    let mut tx = pool.begin().await?;
    let mut report = MergeReport::default();

    let groups: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT normalized_sql
        FROM queries
        GROUP BY normalized_sql
        HAVING COUNT(*) > 1
        ORDER BY MIN(created_at), MIN(id)
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    for normalized_sql in groups {
        merge_group(&mut tx, &normalized_sql, &mut report).await?;
    }

    tx.commit().await?;

    if !report.is_empty() {
        tracing::info!(
            groups = report.groups,
            merged_rows = report.merged_rows,
            operations_repointed = report.operations_repointed,
            hashes_rewritten = report.hashes_rewritten,
            "Merged duplicate queries"
        );
    }
    Ok(report)
}

async fn merge_group(
    conn: &mut PgConnection,
    normalized_sql: &str,
    report: &mut MergeReport,
) -> Result<(), PostgresError> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id, hashed_sql
        FROM queries
        WHERE normalized_sql = $1
        ORDER BY created_at ASC, id ASC
        FOR UPDATE
        "#,
    )
    .bind(normalized_sql)
    .fetch_all(&mut *conn)
    .await?;

    let Some(((survivor_id, survivor_hash), losers)) = rows.split_first() else {
        return Ok(());
    };
    if losers.is_empty() {
        return Ok(());
    }
    report.groups += 1;

    let dialect = PostgresDialect;
    let loser_ids: Vec<i64> = losers.iter().map(|(id, _)| *id).collect();

    for chunk in loser_ids.chunks(dialect.max_bind_params() - 1) {
        let repoint = format!(
            "UPDATE operations SET query_id = $1 WHERE query_id IN ({})",
            dialect.placeholder_list(2, chunk.len())
        );
        let mut query = sqlx::query(&repoint).bind(*survivor_id);
        for id in chunk {
            query = query.bind(*id);
        }
        report.operations_repointed += query.execute(&mut *conn).await?.rows_affected();

        let delete = format!(
            "DELETE FROM queries WHERE id IN ({})",
            dialect.placeholder_list(1, chunk.len())
        );
        let mut query = sqlx::query(&delete);
        for id in chunk {
            query = query.bind(*id);
        }
        report.merged_rows += query.execute(&mut *conn).await?.rows_affected();
    }

    let canonical = sha256_hex(normalized_sql);
    if *survivor_hash != canonical {
        let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM queries WHERE hashed_sql = $1")
            .bind(&canonical)
            .fetch_optional(&mut *conn)
            .await?;

        if owner.is_none() {
            sqlx::query("UPDATE queries SET hashed_sql = $1 WHERE id = $2")
                .bind(&canonical)
                .bind(*survivor_id)
                .execute(&mut *conn)
                .await?;
            report.hashes_rewritten += 1;
        }
    }

    Ok(())
}

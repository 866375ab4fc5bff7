//! Query dedup maintenance for SQLite
//!
//! Rows written before fingerprinting was canonical may share a normalized
//! statement under different digests. Merging keeps the earliest row of each
//! group (ties broken by lowest id), repoints operations at it, deletes the
//! rest and rewrites the survivor's digest to the canonical one.

use sqlx::{SqliteConnection, SqlitePool};

use crate::data::sql::{SqlDialect, SqliteDialect};
use crate::data::sqlite::SqliteError;
use crate::data::types::MergeReport;
use crate::utils::crypto::sha256_hex;

/// Merge duplicate query rows in one transaction
pub async fn merge_duplicate_queries(pool: &SqlitePool) -> Result<MergeReport, SqliteError> {
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
    conn: &mut SqliteConnection,
    normalized_sql: &str,
    report: &mut MergeReport,
) -> Result<(), SqliteError> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id, hashed_sql
        FROM queries
        WHERE normalized_sql = ?
        ORDER BY created_at ASC, id ASC
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

    let dialect = SqliteDialect;
    let loser_ids: Vec<i64> = losers.iter().map(|(id, _)| *id).collect();

    for chunk in loser_ids.chunks(dialect.max_bind_params() - 1) {
        let repoint = format!(
            "UPDATE operations SET query_id = ? WHERE query_id IN ({})",
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
        let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM queries WHERE hashed_sql = ?")
            .bind(&canonical)
            .fetch_optional(&mut *conn)
            .await?;

        if owner.is_none() {
            sqlx::query("UPDATE queries SET hashed_sql = ? WHERE id = ?")
                .bind(&canonical)
                .bind(*survivor_id)
                .execute(&mut *conn)
                .await?;
            report.hashes_rewritten += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::{list_operations, persist_request, setup_test_pool};
    use crate::data::types::{
        OperationEvent, OperationKind, OperationOwner, PersistOutcome, RequestPayload,
    };

    async fn insert_legacy_query(pool: &SqlitePool, sql: &str, hash: &str, created_at: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO queries (normalized_sql, hashed_sql, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(sql)
        .bind(hash)
        .bind(created_at)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn insert_sql_operation(pool: &SqlitePool, uuid: &str, query_id: i64) -> i64 {
        let payload = RequestPayload::new("GET", "/legacy", 200, 1.0, uuid).with_operations(vec![
            OperationEvent::new(OperationKind::Template, "legacy/show", 1.0),
        ]);
        let PersistOutcome::Created { id, .. } = persist_request(pool, &payload).await.unwrap()
        else {
            panic!("expected Created");
        };
        sqlx::query("UPDATE operations SET query_id = ? WHERE request_id = ?")
            .bind(query_id)
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_merge_keeps_earliest_and_repoints() {
        let pool = setup_test_pool().await;
        let sql = "SELECT * FROM users WHERE id = ?";

        let keep = insert_legacy_query(&pool, sql, "legacy-a", 100).await;
        let drop_b = insert_legacy_query(&pool, sql, "legacy-b", 200).await;
        let drop_c = insert_legacy_query(&pool, sql, "legacy-c", 300).await;
        insert_legacy_query(&pool, "SELECT ?", "unrelated", 50).await;

        let r1 = insert_sql_operation(&pool, "uuid-1", drop_b).await;
        let r2 = insert_sql_operation(&pool, "uuid-2", drop_c).await;

        let report = merge_duplicate_queries(&pool).await.unwrap();
        assert_eq!(report.groups, 1);
        assert_eq!(report.merged_rows, 2);
        assert_eq!(report.operations_repointed, 2);
        assert_eq!(report.hashes_rewritten, 1);

        for request_id in [r1, r2] {
            let ops = list_operations(&pool, OperationOwner::Request(request_id))
                .await
                .unwrap();
            assert_eq!(ops[0].query_id, Some(keep));
        }

        let (count, hash): (i64, String) = sqlx::query_as(
            "SELECT COUNT(*), MAX(hashed_sql) FROM queries WHERE normalized_sql = ?",
        )
        .bind(sql)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(hash, sha256_hex(sql));
    }

    #[tokio::test]
    async fn test_merge_tie_breaks_on_lowest_id() {
        let pool = setup_test_pool().await;
        let sql = "DELETE FROM carts WHERE id = ?";
        let first = insert_legacy_query(&pool, sql, "h1", 100).await;
        insert_legacy_query(&pool, sql, "h2", 100).await;

        merge_duplicate_queries(&pool).await.unwrap();

        let remaining: Vec<i64> = sqlx::query_scalar("SELECT id FROM queries")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec![first]);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let pool = setup_test_pool().await;
        let sql = "SELECT * FROM posts";
        insert_legacy_query(&pool, sql, "old-1", 1).await;
        insert_legacy_query(&pool, sql, &sha256_hex(sql), 2).await;

        let first = merge_duplicate_queries(&pool).await.unwrap();
        assert_eq!(first.merged_rows, 1);
        assert_eq!(first.hashes_rewritten, 1);

        let second = merge_duplicate_queries(&pool).await.unwrap();
        assert_eq!(second, MergeReport::default());
    }
}

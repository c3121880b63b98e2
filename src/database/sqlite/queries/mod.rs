
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::BoxStream;
use sqlx::SqlitePool;
use tracing::debug;

pub struct VectorQueries;

impl VectorQueries {
    /// Insert or replace every row in one transaction
    ///
    /// Readers observe either none or all of the rows written by a call.
    #[inline]
    pub async fn upsert_batch(
        pool: &SqlitePool,
        collection: &str,
        rows: &[NewStoredVector],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin upsert transaction")?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO vector_store
                    (collection, id, document, embedding, dimension, metadata, created_date, updated_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    embedding = excluded.embedding,
                    dimension = excluded.dimension,
                    metadata = excluded.metadata,
                    updated_date = excluded.updated_date
                "#,
            )
            .bind(collection)
            .bind(&row.id)
            .bind(&row.document)
            .bind(&row.embedding)
            .bind(row.dimension)
            .bind(&row.metadata)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert vector '{}'", row.id))?;
        }

        tx.commit()
            .await
            .context("Failed to commit upsert transaction")?;

        debug!("Upserted {} rows into '{}'", rows.len(), collection);
        Ok(rows.len() as u64)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool, collection: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vector_store WHERE collection = ?")
                .bind(collection)
                .fetch_one(pool)
                .await
                .context("Failed to count vectors")?;

        Ok(count)
    }

    #[inline]
    pub async fn get_by_id(
        pool: &SqlitePool,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredVector>> {
        let row = sqlx::query_as::<_, StoredVector>(
            r#"
            SELECT collection, id, document, embedding, dimension, metadata, created_date, updated_date
            FROM vector_store WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get vector by id")?;

        Ok(row)
    }

    /// Stream every row of a collection in insertion (rowid) order
    #[inline]
    pub fn stream_collection<'a>(
        pool: &'a SqlitePool,
        collection: &'a str,
    ) -> BoxStream<'a, Result<StoredVector, sqlx::Error>> {
        sqlx::query_as::<_, StoredVector>(
            r#"
            SELECT collection, id, document, embedding, dimension, metadata, created_date, updated_date
            FROM vector_store WHERE collection = ? ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch(pool)
    }

    #[inline]
    pub async fn list_collections(pool: &SqlitePool) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT collection FROM vector_store ORDER BY collection")
                .fetch_all(pool)
                .await
                .context("Failed to list collections")?;

        Ok(names)
    }

    #[inline]
    pub async fn summarize_collections(pool: &SqlitePool) -> Result<Vec<CollectionSummary>> {
        let summaries = sqlx::query_as::<_, CollectionSummary>(
            r#"
            SELECT collection,
                   COUNT(*) AS records,
                   MAX(updated_date) AS last_updated
            FROM vector_store
            GROUP BY collection
            ORDER BY collection
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to summarize collections")?;

        Ok(summaries)
    }
}

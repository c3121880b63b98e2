
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info};

use super::collection::{Collection, Metadata, QueryMatch, validate_upsert};
use super::distance::{EmbeddingMatrix, cosine_distances, encode_embedding};
use super::predicate::{Where, matches_filter};
use crate::database::{Database, NewStoredVector, VectorQueries};
use crate::{PressError, Result};

/// A collection persisted in the shared `vector_store` table
#[derive(Debug, Clone)]
pub struct SqliteCollection {
    name: String,
    database: Database,
    dimension: usize,
}

/// Row data kept for records that pass the filter
struct Candidate {
    id: String,
    document: String,
    metadata: Metadata,
}

impl SqliteCollection {
    #[inline]
    pub fn new(name: impl Into<String>, database: Database, dimension: usize) -> Self {
        Self {
            name: name.into(),
            database,
            dimension,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stream the collection, keeping only rows whose metadata satisfies `filter`
    ///
    /// Metadata is parsed first; the embedding blob of a rejected row is never decoded.
    async fn scan(&self, filter: Option<&Where>) -> Result<(Vec<Candidate>, EmbeddingMatrix)> {
        let mut candidates = Vec::new();
        let mut matrix = EmbeddingMatrix::new(self.dimension);
        let mut scanned = 0usize;

        let mut rows = VectorQueries::stream_collection(self.database.pool(), &self.name);
        while let Some(row) = rows.try_next().await? {
            scanned += 1;
            let metadata: Metadata = serde_json::from_str(&row.metadata).map_err(|e| {
                PressError::Database(format!("corrupt metadata for '{}': {}", row.id, e))
            })?;
            if !matches_filter(filter, &metadata) {
                continue;
            }
            if row.dimension != self.dimension as i64 {
                return Err(PressError::Database(format!(
                    "record '{}' in '{}' has {} components, collection expects {}",
                    row.id, self.name, row.dimension, self.dimension
                )));
            }
            matrix.push_encoded(&row.embedding)?;
            candidates.push(Candidate {
                id: row.id,
                document: row.document,
                metadata,
            });
        }

        debug!(
            "Scanned {} rows of '{}', {} passed the filter",
            scanned,
            self.name,
            candidates.len()
        );
        Ok((candidates, matrix))
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let count = self
            .database
            .count_vectors(&self.name)
            .await
            .map_err(storage_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[inline]
    async fn upsert(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> Result<()> {
        validate_upsert(ids, embeddings, documents, metadatas, Some(self.dimension))?;
        if ids.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(ids.len());
        for (((id, embedding), document), metadata) in
            ids.iter().zip(embeddings).zip(documents).zip(metadatas)
        {
            let metadata = serde_json::to_string(metadata).map_err(|e| {
                PressError::Validation(format!("metadata for '{id}' cannot be stored: {e}"))
            })?;
            rows.push(NewStoredVector {
                id: id.clone(),
                document: document.clone(),
                embedding: encode_embedding(embedding),
                dimension: self.dimension as i64,
                metadata,
            });
        }

        let written = self
            .database
            .upsert_vectors(&self.name, &rows)
            .await
            .map_err(storage_error)?;
        info!("Upserted {} records into '{}'", written, self.name);
        Ok(())
    }

    #[inline]
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&Where>,
    ) -> Result<Vec<Vec<QueryMatch>>> {
        if query_embeddings.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = query_embeddings.iter().find(|q| q.len() != self.dimension) {
            return Err(PressError::Validation(format!(
                "query vector has {} components, '{}' expects {}",
                bad.len(),
                self.name,
                self.dimension
            )));
        }
        if query_embeddings
            .iter()
            .any(|q| q.iter().any(|c| !c.is_finite()))
        {
            return Err(PressError::Validation(format!(
                "query vector for '{}' contains a non-finite component",
                self.name
            )));
        }
        if n_results == 0 {
            return Ok(vec![Vec::new(); query_embeddings.len()]);
        }

        let (candidates, matrix) = self.scan(filter).await?;

        let mut results = Vec::with_capacity(query_embeddings.len());
        for query in query_embeddings {
            let distances = cosine_distances(&matrix, query)?;

            let mut order: Vec<usize> = (0..distances.len()).collect();
            // Stable: equal distances keep scan order
            order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

            let matches = order
                .into_iter()
                .take(n_results)
                .map(|index| {
                    let candidate = &candidates[index];
                    QueryMatch {
                        id: candidate.id.clone(),
                        document: candidate.document.clone(),
                        metadata: candidate.metadata.clone(),
                        distance: distances[index],
                    }
                })
                .collect();
            results.push(matches);
        }

        Ok(results)
    }
}

fn storage_error(err: anyhow::Error) -> PressError {
    PressError::Database(format!("{err:#}"))
}

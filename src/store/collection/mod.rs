#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::predicate::Where;
use crate::{PressError, Result};

/// Scalar metadata value attached to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    /// Equality used by predicates: integers and floats compare numerically
    #[inline]
    pub fn matches(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Int(a), MetadataValue::Float(b))
            | (MetadataValue::Float(b), MetadataValue::Int(a)) => *a as f64 == *b,
            _ => self == other,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Int(i) => write!(f, "{i}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    #[inline]
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    #[inline]
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl From<i64> for MetadataValue {
    #[inline]
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    #[inline]
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    #[inline]
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// One stored record: id, vector, text and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

/// A ranked hit from [`Collection::query`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// A named set of embedding records
///
/// Implementations must make every record of an upsert either invisible or
/// fully visible to concurrent readers.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Number of distinct ids currently stored
    async fn count(&self) -> Result<u64>;

    /// Insert or replace records keyed by id
    ///
    /// All four slices must have equal length and every embedding must have
    /// the collection's dimension. Nothing is written when validation fails.
    async fn upsert(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> Result<()>;

    /// For each query vector, the `n_results` closest records satisfying `filter`,
    /// ascending by cosine distance
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&Where>,
    ) -> Result<Vec<Vec<QueryMatch>>>;

    async fn upsert_records(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let embeddings: Vec<Vec<f32>> = records.iter().map(|r| r.embedding.clone()).collect();
        let documents: Vec<String> = records.iter().map(|r| r.document.clone()).collect();
        let metadatas: Vec<Metadata> = records.iter().map(|r| r.metadata.clone()).collect();
        self.upsert(&ids, &embeddings, &documents, &metadatas).await
    }
}

/// Resolves collection names to collections
pub trait CollectionProvider: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;
}

/// Check upsert arguments before anything is written
///
/// Returns the shared dimension of the embeddings (0 for an empty call).
#[inline]
pub fn validate_upsert(
    ids: &[String],
    embeddings: &[Vec<f32>],
    documents: &[String],
    metadatas: &[Metadata],
    expected_dimension: Option<usize>,
) -> Result<usize> {
    let len = ids.len();
    if embeddings.len() != len || documents.len() != len || metadatas.len() != len {
        return Err(PressError::Validation(format!(
            "upsert sequences differ in length: {} ids, {} embeddings, {} documents, {} metadatas",
            len,
            embeddings.len(),
            documents.len(),
            metadatas.len()
        )));
    }

    let Some(first) = embeddings.first() else {
        return Ok(0);
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(PressError::Validation("embedding is empty".to_string()));
    }
    if let Some(expected) = expected_dimension {
        if dimension != expected {
            return Err(PressError::Validation(format!(
                "embedding for '{}' has {} components, collection expects {}",
                ids[0], dimension, expected
            )));
        }
    }

    let mut seen = HashSet::with_capacity(len);
    for ((id, embedding), metadata) in ids.iter().zip(embeddings).zip(metadatas) {
        if id.is_empty() {
            return Err(PressError::Validation("record id is empty".to_string()));
        }
        if !seen.insert(id.as_str()) {
            return Err(PressError::Validation(format!(
                "id '{id}' appears more than once in one upsert"
            )));
        }
        if embedding.len() != dimension {
            return Err(PressError::Validation(format!(
                "embedding for '{}' has {} components, others in this call have {}",
                id,
                embedding.len(),
                dimension
            )));
        }
        if embedding.iter().any(|c| !c.is_finite()) {
            return Err(PressError::Validation(format!(
                "embedding for '{id}' contains a non-finite component"
            )));
        }
        if let Some((key, _)) = metadata
            .iter()
            .find(|(_, v)| matches!(v, MetadataValue::Float(x) if !x.is_finite()))
        {
            return Err(PressError::Validation(format!(
                "metadata '{key}' of '{id}' is not a finite number"
            )));
        }
    }

    Ok(dimension)
}

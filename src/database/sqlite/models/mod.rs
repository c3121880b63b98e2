
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `vector_store` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StoredVector {
    pub collection: String,
    pub id: String,
    pub document: String,
    /// Little-endian `f32` components
    pub embedding: Vec<u8>,
    pub dimension: i64,
    /// JSON object of scalar metadata
    pub metadata: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Row shape fed to an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStoredVector {
    pub id: String,
    pub document: String,
    pub embedding: Vec<u8>,
    pub dimension: i64,
    pub metadata: String,
}

/// Per-collection record count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CollectionSummary {
    pub collection: String,
    pub records: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoredVector {
    /// Number of `f32` components encoded in the blob
    #[inline]
    pub fn stored_components(&self) -> usize {
        self.embedding.len() / size_of::<f32>()
    }
}

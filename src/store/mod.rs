//! Named vector collections backed by SQLite


pub mod collection;
pub mod distance;
pub mod predicate;
pub mod sqlite;

pub use collection::{
    Collection, CollectionProvider, EmbeddingRecord, Metadata, MetadataValue, QueryMatch,
    validate_upsert,
};
pub use distance::{EmbeddingMatrix, cosine_distances, decode_embedding, encode_embedding};
pub use predicate::Where;
pub use sqlite::SqliteCollection;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::Config;
use crate::database::{CollectionSummary, Database};
use crate::{PressError, Result};

/// Stable, identifier-safe collection name for a language/exam pair
///
/// `("Mandarin Chinese", "HSK")` becomes `lang_mandarin_chinese_hsk`.
#[inline]
pub fn collection_name(language: &str, exam: &str) -> String {
    let slug: String = format!("{language}_{exam}")
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '/' => Some('_'),
            'a'..='z' | '0'..='9' | '_' => Some(c),
            _ => None,
        })
        .collect();
    format!("lang_{slug}")
}

/// Registry of collections sharing one database
///
/// Collections are created lazily: a name only appears in storage after its
/// first upsert.
#[derive(Debug)]
pub struct VectorStore {
    database: Database,
    dimension: usize,
    collections: Mutex<HashMap<String, Arc<SqliteCollection>>>,
}

impl VectorStore {
    #[inline]
    pub fn new(database: Database, dimension: usize) -> Self {
        Self {
            database,
            dimension,
            collections: Mutex::new(HashMap::new()),
        }
    }

    /// Open the database under the configured base directory
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .map_err(|e| PressError::Database(format!("{e:#}")))?;
        Ok(Self::new(database, config.embedding.dimension as usize))
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn get_collection(&self, name: &str) -> Arc<SqliteCollection> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(collections.entry(name.to_string()).or_insert_with(|| {
            debug!("Opening collection '{}'", name);
            Arc::new(SqliteCollection::new(
                name,
                self.database.clone(),
                self.dimension,
            ))
        }))
    }

    #[inline]
    pub fn get_language_collection(&self, language: &str, exam: &str) -> Arc<SqliteCollection> {
        self.get_collection(&collection_name(language, exam))
    }

    /// Names of every collection holding at least one record, sorted
    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.database
            .list_collections()
            .await
            .map_err(|e| PressError::Database(format!("{e:#}")))
    }

    #[inline]
    pub async fn collection_count(&self, name: &str) -> Result<u64> {
        self.get_collection(name).count().await
    }

    #[inline]
    pub async fn summarize(&self) -> Result<Vec<CollectionSummary>> {
        self.database
            .summarize_collections()
            .await
            .map_err(|e| PressError::Database(format!("{e:#}")))
    }
}

impl CollectionProvider for VectorStore {
    #[inline]
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.get_collection(name)
    }
}

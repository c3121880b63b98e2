use super::*;
use crate::database::Database;
use crate::store::{Metadata, VectorStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 3;

/// Returns the same vector for every text and counts calls
struct FixedEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingGateway for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.vector.clone(); texts.len()])
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingGateway for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(PressError::Authentication("HTTP 401".to_string()))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

struct SlowEmbedder;

#[async_trait]
impl EmbeddingGateway for SlowEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![vec![1.0, 0.0, 0.0]; texts.len()])
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Non-empty collection whose queries always fail
struct BrokenCollection;

#[async_trait]
impl Collection for BrokenCollection {
    fn name(&self) -> &str {
        "broken"
    }

    async fn count(&self) -> Result<u64> {
        Ok(3)
    }

    async fn upsert(
        &self,
        _ids: &[String],
        _embeddings: &[Vec<f32>],
        _documents: &[String],
        _metadatas: &[Metadata],
    ) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _query_embeddings: &[Vec<f32>],
        _n_results: usize,
        _filter: Option<&Where>,
    ) -> Result<Vec<Vec<QueryMatch>>> {
        Err(PressError::Database("disk I/O error".to_string()))
    }
}

struct BrokenProvider;

impl CollectionProvider for BrokenProvider {
    fn collection(&self, _name: &str) -> Arc<dyn Collection> {
        Arc::new(BrokenCollection)
    }
}

async fn create_test_store() -> (TempDir, Arc<VectorStore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("Failed to create database");
    (temp_dir, Arc::new(VectorStore::new(database, DIMENSION)))
}

fn chunk_meta(level: &str, content_type: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("language".to_string(), "spanish".into());
    metadata.insert("exam".to_string(), "dele".into());
    metadata.insert("level".to_string(), level.into());
    metadata.insert("content_type".to_string(), content_type.into());
    metadata
}

async fn insert(
    store: &VectorStore,
    id: &str,
    embedding: Vec<f32>,
    document: &str,
    metadata: Metadata,
) {
    store
        .get_language_collection("spanish", "dele")
        .upsert(
            &[id.to_string()],
            &[embedding],
            &[document.to_string()],
            &[metadata],
        )
        .await
        .expect("should insert");
}

fn retriever(embedder: Arc<dyn EmbeddingGateway>, store: Arc<VectorStore>) -> Retriever {
    Retriever::new(embedder, store, RetrievalConfig::default())
}

#[test]
fn retrieval_helpers() {
    let chunk = |id: &str, doc: &str| RetrievedChunk {
        id: id.to_string(),
        document: doc.to_string(),
        metadata: Metadata::new(),
        distance: 0.1,
    };
    let retrieval = Retrieval {
        grammar: vec![chunk("g1", "grammar one")],
        vocabulary: vec![chunk("v1", "vocab one"), chunk("v2", "vocab two")],
    };

    assert!(!retrieval.is_empty());
    assert!(Retrieval::default().is_empty());
    assert_eq!(retrieval.grammar_texts(), vec!["grammar one"]);
    assert_eq!(retrieval.vocabulary_texts(), vec!["vocab one", "vocab two"]);
    assert_eq!(retrieval.provenance_ids(), vec!["g1", "v1", "v2"]);
}

#[test]
fn category_filter_matches_exactly() {
    let filter = category_filter("spanish", "dele", "B1", &ContentType::Grammar);
    assert!(filter.matches(&chunk_meta("B1", "grammar")));
    assert!(!filter.matches(&chunk_meta("B2", "grammar")));
    assert!(!filter.matches(&chunk_meta("B1", "vocabulary")));
}

#[tokio::test]
async fn empty_collection_skips_embedding() {
    let (_temp_dir, store) = create_test_store().await;
    let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);

    let retrieval = retriever(Arc::clone(&embedder) as Arc<dyn EmbeddingGateway>, store)
        .retrieve("la rutina diaria", "spanish", "dele", "B1")
        .await
        .expect("empty collection is not an error");

    assert!(retrieval.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn theme_is_embedded_once() {
    let (_temp_dir, store) = create_test_store().await;
    insert(&store, "g", vec![1.0, 0.0, 0.0], "grammar text", chunk_meta("B1", "grammar")).await;
    insert(&store, "v", vec![1.0, 0.0, 0.0], "vocab text", chunk_meta("B1", "vocabulary")).await;
    let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);

    let retrieval = retriever(Arc::clone(&embedder) as Arc<dyn EmbeddingGateway>, store)
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect("should retrieve");

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(retrieval.provenance_ids(), vec!["g", "v"]);
}

#[tokio::test]
async fn categories_are_independent_and_bounded() {
    let (_temp_dir, store) = create_test_store().await;
    for i in 0..6 {
        insert(
            &store,
            &format!("g{i}"),
            vec![1.0, i as f32, 0.0],
            &format!("grammar point number {i} with distinct words w{i}"),
            chunk_meta("B1", "grammar"),
        )
        .await;
    }
    insert(&store, "v-other", vec![1.0, 0.0, 0.0], "vocab at B2", chunk_meta("B2", "vocabulary")).await;

    let retrieval = retriever(FixedEmbedder::new(vec![1.0, 0.0, 0.0]), store)
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect("should retrieve");

    let ids: Vec<&str> = retrieval.grammar.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["g0", "g1", "g2", "g3"]);
    assert!(retrieval.vocabulary.is_empty());
    assert!(
        retrieval
            .grammar
            .windows(2)
            .all(|pair| pair[0].distance <= pair[1].distance)
    );
}

#[tokio::test]
async fn near_duplicates_keep_the_closer_chunk() {
    let (_temp_dir, store) = create_test_store().await;
    insert(
        &store,
        "close",
        vec![1.0, 0.0, 0.0],
        "Quiero que vengas a la fiesta",
        chunk_meta("B1", "grammar"),
    )
    .await;
    insert(
        &store,
        "far-copy",
        vec![1.0, 1.0, 0.0],
        "quiero que VENGAS a la fiesta",
        chunk_meta("B1", "grammar"),
    )
    .await;
    insert(
        &store,
        "different",
        vec![1.0, 2.0, 0.0],
        "Ojalá que llueva mañana",
        chunk_meta("B1", "grammar"),
    )
    .await;

    let retrieval = retriever(FixedEmbedder::new(vec![1.0, 0.0, 0.0]), store)
        .retrieve("fiestas", "spanish", "dele", "B1")
        .await
        .expect("should retrieve");

    let ids: Vec<&str> = retrieval.grammar.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["close", "different"]);
}

#[tokio::test]
async fn custom_deduplicator_is_used() {
    struct NeverSimilar;
    impl Deduplicator for NeverSimilar {
        fn similarity(&self, _a: &str, _b: &str) -> f32 {
            0.0
        }
    }

    let (_temp_dir, store) = create_test_store().await;
    for id in ["a", "b"] {
        insert(&store, id, vec![1.0, 0.0, 0.0], "identical text", chunk_meta("B1", "vocabulary")).await;
    }

    let retrieval = retriever(FixedEmbedder::new(vec![1.0, 0.0, 0.0]), store)
        .with_deduplicator(Arc::new(NeverSimilar))
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect("should retrieve");
    assert_eq!(retrieval.vocabulary.len(), 2);
}

#[tokio::test]
async fn embedding_failure_aborts_retrieval() {
    let (_temp_dir, store) = create_test_store().await;
    insert(&store, "g", vec![1.0, 0.0, 0.0], "grammar", chunk_meta("B1", "grammar")).await;

    let err = retriever(Arc::new(FailingEmbedder), store)
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect_err("embedding failure must surface");
    assert!(matches!(err, PressError::Authentication(_)));
}

#[tokio::test]
async fn storage_failure_propagates_unchanged() {
    let retriever = Retriever::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        Arc::new(BrokenProvider),
        RetrievalConfig::default(),
    );

    let err = retriever
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect_err("query failure must surface");
    assert!(matches!(err, PressError::Database(ref message) if message == "disk I/O error"));
}

#[tokio::test]
async fn slow_retrieval_times_out() {
    let (_temp_dir, store) = create_test_store().await;
    insert(&store, "g", vec![1.0, 0.0, 0.0], "grammar", chunk_meta("B1", "grammar")).await;

    let config = RetrievalConfig {
        timeout_seconds: 1,
        ..RetrievalConfig::default()
    };
    let err = Retriever::new(Arc::new(SlowEmbedder), store, config)
        .retrieve("theme", "spanish", "dele", "B1")
        .await
        .expect_err("should time out");
    assert!(matches!(err, PressError::Timeout(_)));
    assert!(err.is_retryable());
}

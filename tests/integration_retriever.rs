#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end retrieval over a real on-disk store: JSONL ingest, level
// filtering, category limits and idempotent re-ingest

use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

use lingo_press::config::RetrievalConfig;
use lingo_press::database::Database;
use lingo_press::embeddings::EmbeddingGateway;
use lingo_press::ingest::{ChunkRecord, ContentType, Ingestor, load_chunks_jsonl, make_chunk_id};
use lingo_press::retriever::Retriever;
use lingo_press::store::{Collection, CollectionProvider, MetadataValue, VectorStore};

const DIMENSION: usize = 8;

/// Deterministic byte-bucket embedding
struct BucketEmbedder;

#[async_trait]
impl EmbeddingGateway for BucketEmbedder {
    async fn embed(&self, texts: &[String]) -> lingo_press::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![1.0; DIMENSION];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % DIMENSION] += f32::from(byte) / 255.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

struct Fixture {
    _temp_dir: TempDir,
    store: Arc<VectorStore>,
    ingestor: Ingestor,
    retriever: Retriever,
}

async fn fixture() -> Fixture {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("Failed to create database");
    let store = Arc::new(VectorStore::new(database, DIMENSION));
    let embedder: Arc<dyn EmbeddingGateway> = Arc::new(BucketEmbedder);

    let ingestor = Ingestor::new(Arc::clone(&embedder), Arc::clone(&store));
    let provider = Arc::clone(&store) as Arc<dyn CollectionProvider>;
    let retriever = Retriever::new(embedder, provider, RetrievalConfig::default());

    Fixture {
        _temp_dir: temp_dir,
        store,
        ingestor,
        retriever,
    }
}

fn chinese_chunk(level: &str, content_type: ContentType, index: u32, text: String) -> ChunkRecord {
    ChunkRecord {
        language: "chinese".to_string(),
        exam: "hsk3".to_string(),
        level: level.to_string(),
        content_type,
        source_url: format!("https://hsk.example/{level}"),
        chunk_text: text,
        chunk_index: index,
        grammar_point: None,
    }
}

#[tokio::test]
async fn category_limits_and_level_filter() {
    let fixture = fixture().await;

    let mut chunks = Vec::new();
    for i in 0..10 {
        chunks.push(chinese_chunk(
            "HSK3",
            ContentType::Grammar,
            i,
            format!("grammar pattern {i} example sentence number {i}"),
        ));
    }
    for i in 10..25 {
        chunks.push(chinese_chunk(
            "HSK3",
            ContentType::Vocabulary,
            i,
            format!("vocabulary word {i} with meaning {i}"),
        ));
    }
    // Closer to the theme than anything at HSK3, but the wrong level
    chunks.push(chinese_chunk(
        "HSK5",
        ContentType::Grammar,
        0,
        "daily routine".to_string(),
    ));
    fixture
        .ingestor
        .embed_and_upsert(&chunks)
        .await
        .expect("should ingest");

    let retrieval = fixture
        .retriever
        .retrieve("daily routine", "chinese", "hsk3", "HSK3")
        .await
        .expect("should retrieve");

    assert_eq!(retrieval.grammar.len(), 4);
    assert_eq!(retrieval.vocabulary.len(), 6);

    let level = MetadataValue::from("HSK3");
    for chunk in retrieval.grammar.iter().chain(&retrieval.vocabulary) {
        assert_eq!(chunk.metadata["level"], level);
        assert!(chunk.distance >= 0.0 && chunk.distance <= 2.0);
    }
    for chunk in &retrieval.grammar {
        assert_eq!(chunk.metadata["content_type"], MetadataValue::from("grammar"));
    }
    for chunk in &retrieval.vocabulary {
        assert_eq!(
            chunk.metadata["content_type"],
            MetadataValue::from("vocabulary")
        );
    }
    assert!(
        retrieval
            .vocabulary
            .windows(2)
            .all(|pair| pair[0].distance <= pair[1].distance)
    );
}

#[tokio::test]
async fn other_level_only_yields_nothing() {
    let fixture = fixture().await;

    let chunks: Vec<ChunkRecord> = (0..5)
        .map(|i| {
            chinese_chunk(
                "HSK5",
                ContentType::Grammar,
                i,
                format!("advanced structure {i}"),
            )
        })
        .collect();
    fixture
        .ingestor
        .embed_and_upsert(&chunks)
        .await
        .expect("should ingest");

    let retrieval = fixture
        .retriever
        .retrieve("daily routine", "chinese", "hsk3", "HSK3")
        .await
        .expect("no match is not an error");

    assert!(retrieval.grammar.is_empty());
    assert!(retrieval.vocabulary.is_empty());
}

#[tokio::test]
async fn missing_collection_yields_nothing() {
    let fixture = fixture().await;

    let retrieval = fixture
        .retriever
        .retrieve("travel", "korean", "topik", "TOPIK 2")
        .await
        .expect("missing collection is not an error");
    assert!(retrieval.is_empty());
}

#[tokio::test]
async fn reingesting_same_position_replaces_text() {
    let fixture = fixture().await;
    let record = |text: &str| ChunkRecord {
        language: "chinese".to_string(),
        exam: "hsk3".to_string(),
        level: "HSK3".to_string(),
        content_type: ContentType::Grammar,
        source_url: "https://x".to_string(),
        chunk_text: text.to_string(),
        chunk_index: 0,
        grammar_point: None,
    };

    fixture
        .ingestor
        .embed_and_upsert(&[record("first version of the chunk")])
        .await
        .expect("first ingest");
    fixture
        .ingestor
        .embed_and_upsert(&[record("second version of the chunk")])
        .await
        .expect("second ingest");

    let collection = fixture.store.get_language_collection("chinese", "hsk3");
    assert_eq!(collection.count().await.expect("should count"), 1);

    let stored = fixture
        .store
        .database()
        .get_vector("lang_chinese_hsk3", &make_chunk_id("https://x", 0))
        .await
        .expect("should read")
        .expect("record should exist");
    assert_eq!(stored.document, "second version of the chunk");
}

#[tokio::test]
async fn jsonl_pipeline() {
    let fixture = fixture().await;

    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    for (i, (content_type, text)) in [
        ("grammar", "把 construction moves the object before the verb"),
        ("grammar", "了 marks a completed action"),
        ("vocabulary", "Vocabulary:\n早上 morning\n起床 get up\n刷牙 brush teeth"),
    ]
    .into_iter()
    .enumerate()
    {
        let record = serde_json::json!({
            "language": "chinese",
            "exam": "hsk3",
            "level": "HSK3",
            "content_type": content_type,
            "source_url": "https://hsk.example/routine",
            "chunk_text": text,
            "chunk_index": i,
        });
        writeln!(file, "{record}").expect("should write");
    }

    let chunks = load_chunks_jsonl(file.path()).expect("should load");
    let ids = fixture
        .ingestor
        .embed_and_upsert(&chunks)
        .await
        .expect("should ingest");
    assert_eq!(ids.len(), 3);

    let retrieval = fixture
        .retriever
        .retrieve("morning routine", "chinese", "hsk3", "HSK3")
        .await
        .expect("should retrieve");

    assert_eq!(retrieval.grammar.len(), 2);
    assert_eq!(retrieval.vocabulary.len(), 1);
    assert_eq!(retrieval.vocabulary[0].id, ids[2]);

    let mut provenance = retrieval.provenance_ids();
    provenance.sort();
    let mut expected = ids;
    expected.sort();
    assert_eq!(provenance, expected);
}

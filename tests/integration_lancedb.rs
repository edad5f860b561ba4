#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for the LanceDB collection with realistic data
use portfolio_rag::PortfolioError;
use portfolio_rag::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use tempfile::TempDir;

const DIMENSION: usize = 384;

/// Deterministic unit-ish vector that mostly points along `axis`
fn vector_near(axis: usize, jitter: f32) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| {
            if i == axis {
                1.0
            } else {
                jitter * ((i * 7 + axis) % 13) as f32 / 13.0
            }
        })
        .collect()
}

fn create_realistic_record(
    file_path: &str,
    heading_path: &str,
    content: &str,
    chunk_index: u32,
    vector: Vec<f32>,
) -> EmbeddingRecord {
    EmbeddingRecord::new(
        vector,
        ChunkMetadata {
            file_name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
            file_path: file_path.to_string(),
            heading_path: heading_path.to_string(),
            content: content.to_string(),
            token_count: content.split_whitespace().count() as u32,
            chunk_index,
            created_at: chrono::Utc::now().to_rfc3339(),
        },
    )
}

fn portfolio_records() -> Vec<EmbeddingRecord> {
    vec![
        create_realistic_record(
            "projects/caching.md",
            "Caching Layer",
            "# Caching Layer\n\nIntroduced a read-through cache with Redis.",
            0,
            vector_near(0, 0.05),
        ),
        create_realistic_record(
            "projects/caching.md",
            "Caching Layer > Results",
            "## Results\n\nReduced latency by 40% using caching.",
            1,
            vector_near(0, 0.2),
        ),
        create_realistic_record(
            "projects/kafka.md",
            "Kafka Migration",
            "# Kafka Migration\n\nMoved the order pipeline from RabbitMQ to Kafka.",
            0,
            vector_near(1, 0.05),
        ),
        create_realistic_record(
            "projects/hololens.md",
            "HoloLens Viewer > Situation",
            "## Situation\n\nFrame rate dropped below 30 fps on device.",
            1,
            vector_near(2, 0.05),
        ),
    ]
}

#[tokio::test]
async fn realistic_collection_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("vectors");

    let mut writer = VectorStore::get_or_create(&db_path, "portfolio_collection")
        .await
        .expect("should create vector store");
    let written = writer
        .store_embeddings_batch(portfolio_records())
        .await
        .expect("should store embeddings");
    assert_eq!(written, 4);
    writer.optimize().await.expect("should optimize collection");

    let reader = VectorStore::open_existing(&db_path, "portfolio_collection")
        .await
        .expect("collection exists");
    assert_eq!(reader.vector_dimension(), Some(DIMENSION));
    assert_eq!(reader.count_embeddings().await.expect("should count"), 4);

    let results = reader
        .search_similar(&vector_near(0, 0.0), 3)
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 3);
    assert!(
        results[..2]
            .iter()
            .all(|r| r.chunk_metadata.file_path == "projects/caching.md")
    );
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    for result in &results {
        assert!((result.similarity_score + result.distance - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn large_batch_is_stored_in_one_write() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::get_or_create(&temp_dir.path().join("vectors"), "bulk")
        .await
        .expect("should create vector store");

    let records: Vec<EmbeddingRecord> = (0..500)
        .map(|i| {
            create_realistic_record(
                &format!("notes/{}.md", i % 25),
                "Notes",
                &format!("Observation number {} about the deployment.", i),
                i,
                vector_near((i as usize) % DIMENSION, 0.1),
            )
        })
        .collect();

    let written = store
        .store_embeddings_batch(records)
        .await
        .expect("should store embeddings");
    assert_eq!(written, 500);

    store
        .delete_document("notes/0.md")
        .await
        .expect("should delete document");
    assert_eq!(store.count_embeddings().await.expect("should count"), 480);
}

#[tokio::test]
async fn separate_collections_do_not_mix() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("vectors");

    let mut first = VectorStore::get_or_create(&db_path, "first")
        .await
        .expect("should create vector store");
    first
        .store_embeddings_batch(portfolio_records())
        .await
        .expect("should store embeddings");

    let second = VectorStore::get_or_create(&db_path, "second")
        .await
        .expect("should create vector store");
    assert_eq!(second.count_embeddings().await.expect("should count"), 0);

    let missing = VectorStore::open_existing(&db_path, "second").await;
    assert!(matches!(
        missing,
        Err(PortfolioError::CollectionNotFound(ref name)) if name == "second"
    ));
}

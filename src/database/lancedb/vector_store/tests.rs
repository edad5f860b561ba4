use super::*;
use tempfile::TempDir;

const COLLECTION: &str = "portfolio_collection";

fn record(file_path: &str, chunk_index: u32, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord::new(
        vector,
        ChunkMetadata {
            file_name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
            file_path: file_path.to_string(),
            heading_path: format!("Section {}", chunk_index),
            content: format!("Content of chunk {} in {}", chunk_index, file_path),
            token_count: 6,
            chunk_index,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    )
}

async fn create_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::get_or_create(&temp_dir.path().join("vectors"), COLLECTION)
        .await
        .expect("should create vector store");
    (store, temp_dir)
}

#[tokio::test]
async fn new_store_is_empty() {
    let (store, _temp_dir) = create_store().await;

    assert_eq!(store.collection(), COLLECTION);
    assert_eq!(store.vector_dimension(), None);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
    assert!(
        store
            .search_similar(&[1.0, 0.0, 0.0], 3)
            .await
            .expect("search on empty store succeeds")
            .is_empty()
    );
}

#[tokio::test]
async fn store_creates_collection_with_dimension() {
    let (mut store, _temp_dir) = create_store().await;

    let written = store
        .store_embeddings_batch(vec![
            record("a.md", 0, vec![1.0, 0.0, 0.0]),
            record("a.md", 1, vec![0.0, 1.0, 0.0]),
        ])
        .await
        .expect("should store embeddings");

    assert_eq!(written, 2);
    assert_eq!(store.vector_dimension(), Some(3));
    assert_eq!(store.count_embeddings().await.expect("should count"), 2);
}

#[tokio::test]
async fn search_orders_by_similarity() {
    let (mut store, _temp_dir) = create_store().await;
    store
        .store_embeddings_batch(vec![
            record("far.md", 0, vec![0.0, 0.0, 1.0]),
            record("near.md", 0, vec![0.9, 0.1, 0.0]),
            record("exact.md", 0, vec![1.0, 0.0, 0.0]),
            record("middle.md", 0, vec![0.5, 0.5, 0.0]),
        ])
        .await
        .expect("should store embeddings");

    let results = store
        .search_similar(&[1.0, 0.0, 0.0], 3)
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk_metadata.file_path, "exact.md");
    assert_eq!(results[1].chunk_metadata.file_path, "near.md");
    assert_eq!(results[2].chunk_metadata.file_path, "middle.md");
    assert!((results[0].similarity_score - 1.0).abs() < 1e-4);
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
}

#[tokio::test]
async fn search_returns_at_most_available_entries() {
    let (mut store, _temp_dir) = create_store().await;
    store
        .store_embeddings_batch(vec![record("only.md", 0, vec![0.3, 0.4, 0.5])])
        .await
        .expect("should store embeddings");

    let results = store
        .search_similar(&[0.3, 0.4, 0.5], 10)
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.heading_path, "Section 0");
    assert_eq!(results[0].chunk_metadata.file_name, "only.md");
}

#[tokio::test]
async fn mismatched_dimensions_are_rejected() {
    let (mut store, _temp_dir) = create_store().await;
    store
        .store_embeddings_batch(vec![record("a.md", 0, vec![1.0, 0.0, 0.0])])
        .await
        .expect("should store embeddings");

    let insert = store
        .store_embeddings_batch(vec![record("b.md", 0, vec![1.0, 0.0])])
        .await;
    assert!(matches!(
        insert,
        Err(PortfolioError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));

    let search = store.search_similar(&[1.0, 0.0, 0.0, 0.0], 3).await;
    assert!(matches!(
        search,
        Err(PortfolioError::DimensionMismatch {
            expected: 3,
            actual: 4
        })
    ));
}

#[tokio::test]
async fn delete_document_only_touches_that_file() {
    let (mut store, _temp_dir) = create_store().await;
    store
        .store_embeddings_batch(vec![
            record("keep.md", 0, vec![1.0, 0.0, 0.0]),
            record("drop's.md", 0, vec![0.0, 1.0, 0.0]),
            record("drop's.md", 1, vec![0.0, 0.0, 1.0]),
        ])
        .await
        .expect("should store embeddings");

    store
        .delete_document("drop's.md")
        .await
        .expect("should delete document");

    assert_eq!(store.count_embeddings().await.expect("should count"), 1);
    let results = store
        .search_similar(&[0.0, 1.0, 0.0], 3)
        .await
        .expect("search succeeds");
    assert!(results.iter().all(|r| r.chunk_metadata.file_path == "keep.md"));
}

#[tokio::test]
async fn open_existing_requires_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("vectors");

    let missing_dir = VectorStore::open_existing(&db_path, COLLECTION).await;
    assert!(matches!(
        missing_dir,
        Err(PortfolioError::CollectionNotFound(ref name)) if name == COLLECTION
    ));
    assert!(!db_path.exists(), "opening must not create the database");

    let _writer = VectorStore::get_or_create(&db_path, COLLECTION)
        .await
        .expect("should create vector store");
    let missing_table = VectorStore::open_existing(&db_path, COLLECTION).await;
    let message = missing_table
        .err()
        .expect("table does not exist yet")
        .to_string();
    assert!(message.contains(COLLECTION));
    assert!(message.contains("ingest"));
}

#[tokio::test]
async fn reopened_store_sees_persisted_entries() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("vectors");

    {
        let mut writer = VectorStore::get_or_create(&db_path, COLLECTION)
            .await
            .expect("should create vector store");
        writer
            .store_embeddings_batch(vec![
                record("a.md", 0, vec![0.1, 0.2, 0.3, 0.4]),
                record("a.md", 1, vec![0.4, 0.3, 0.2, 0.1]),
            ])
            .await
            .expect("should store embeddings");
    }

    let reader = VectorStore::open_existing(&db_path, COLLECTION)
        .await
        .expect("collection exists");
    assert_eq!(reader.vector_dimension(), Some(4));
    assert_eq!(reader.count_embeddings().await.expect("should count"), 2);

    let reopened_writer = VectorStore::get_or_create(&db_path, COLLECTION)
        .await
        .expect("should reopen vector store");
    assert_eq!(reopened_writer.vector_dimension(), Some(4));
}

#[tokio::test]
async fn drop_collection_resets_store() {
    let (mut store, temp_dir) = create_store().await;
    store
        .store_embeddings_batch(vec![record("a.md", 0, vec![1.0, 0.0])])
        .await
        .expect("should store embeddings");

    store.drop_collection().await.expect("should drop collection");

    assert_eq!(store.vector_dimension(), None);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
    assert!(
        VectorStore::open_existing(&temp_dir.path().join("vectors"), COLLECTION)
            .await
            .is_err()
    );

    store
        .store_embeddings_batch(vec![record("b.md", 0, vec![1.0, 0.0, 0.0])])
        .await
        .expect("collection is recreated with a new dimension");
    assert_eq!(store.vector_dimension(), Some(3));
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (mut store, _temp_dir) = create_store().await;
    let written = store
        .store_embeddings_batch(Vec::new())
        .await
        .expect("empty batch succeeds");

    assert_eq!(written, 0);
    assert_eq!(store.vector_dimension(), None);
}

#[tokio::test]
async fn check_dimension_writes_nothing() {
    let (mut store, _temp_dir) = create_store().await;

    assert!(
        store
            .check_dimension(&[record("a.md", 0, vec![1.0, 0.0])])
            .is_ok()
    );
    assert!(matches!(
        store.check_dimension(&[
            record("a.md", 0, vec![1.0, 0.0]),
            record("a.md", 1, vec![1.0, 0.0, 0.0]),
        ]),
        Err(PortfolioError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
    assert_eq!(store.vector_dimension(), None);

    store
        .store_embeddings_batch(vec![record("a.md", 0, vec![1.0, 0.0, 0.0])])
        .await
        .expect("should store embeddings");

    assert!(matches!(
        store.check_dimension(&[record("b.md", 0, vec![1.0; 4])]),
        Err(PortfolioError::DimensionMismatch {
            expected: 3,
            actual: 4
        })
    ));
    assert_eq!(store.count_embeddings().await.expect("should count"), 1);
}

#[tokio::test]
async fn document_paths_are_distinct() {
    let (mut store, _temp_dir) = create_store().await;
    assert!(
        store
            .document_paths()
            .await
            .expect("empty store lists no documents")
            .is_empty()
    );

    store
        .store_embeddings_batch(vec![
            record("projects/b.md", 0, vec![1.0, 0.0, 0.0]),
            record("projects/b.md", 1, vec![0.0, 1.0, 0.0]),
            record("a.md", 0, vec![0.0, 0.0, 1.0]),
        ])
        .await
        .expect("should store embeddings");

    let paths: Vec<String> = store
        .document_paths()
        .await
        .expect("should list documents")
        .into_iter()
        .collect();
    assert_eq!(paths, vec!["a.md".to_string(), "projects/b.md".to_string()]);
}

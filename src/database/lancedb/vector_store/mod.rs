#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::{PortfolioError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A named LanceDB collection of chunk vectors
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// `1 - distance`; higher is more similar
    pub similarity_score: f32,
    /// Cosine distance reported by LanceDB
    pub distance: f32,
}

impl VectorStore {
    /// Open the collection for writing, creating the database directory if needed.
    ///
    /// The table itself is created on the first insert, once the vector
    /// dimension is known.
    #[inline]
    pub async fn get_or_create(db_path: &Path, collection: &str) -> Result<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            PortfolioError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let mut store = Self::connect(db_path, collection).await?;
        if store.table_exists().await? {
            store.vector_dimension = Some(store.detect_existing_vector_dimension().await?);
            info!(
                "Opened collection '{}' ({} dimensions)",
                collection,
                store.vector_dimension.unwrap_or_default()
            );
        } else {
            info!(
                "Collection '{}' will be created on first insert",
                collection
            );
        }

        Ok(store)
    }

    /// Open a collection that must already exist.
    ///
    /// Fails with [`PortfolioError::CollectionNotFound`] rather than creating anything.
    #[inline]
    pub async fn open_existing(db_path: &Path, collection: &str) -> Result<Self> {
        if !db_path.exists() {
            return Err(PortfolioError::CollectionNotFound(collection.to_string()));
        }

        let mut store = Self::connect(db_path, collection).await?;
        if !store.table_exists().await? {
            return Err(PortfolioError::CollectionNotFound(collection.to_string()));
        }

        store.vector_dimension = Some(store.detect_existing_vector_dimension().await?);
        debug!(
            "Opened collection '{}' read-only with {:?} dimensions",
            collection, store.vector_dimension
        );
        Ok(store)
    }

    async fn connect(db_path: &Path, collection: &str) -> Result<Self> {
        debug!("Connecting to LanceDB at {}", db_path.display());

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: collection.to_string(),
            vector_dimension: None,
        })
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.table_name
    }

    /// Dimension of stored vectors, `None` until the first insert
    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                PortfolioError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("heading_path", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store multiple embeddings in one write, creating the table if absent.
    ///
    /// Every vector must match the collection's dimension.
    #[inline]
    pub async fn store_embeddings_batch(&mut self, records: Vec<EmbeddingRecord>) -> Result<usize> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(0);
        };

        let vector_dim = self.vector_dimension.unwrap_or(first.vector.len());
        self.check_dimension(&records)?;

        debug!("Storing batch of {} embeddings", records.len());

        if self.vector_dimension.is_none() {
            self.create_table(vector_dim).await?;
        }

        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings in '{}'", records.len(), self.table_name);
        Ok(records.len())
    }

    /// Check that `records` can be stored without writing anything.
    ///
    /// Vectors must be non-empty, agree with each other and with the
    /// collection's dimension once it is known.
    #[inline]
    pub fn check_dimension(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let vector_dim = self.vector_dimension.unwrap_or(first.vector.len());
        if vector_dim == 0 {
            return Err(PortfolioError::Embedding(
                "Cannot store empty vectors".to_string(),
            ));
        }
        match records.iter().find(|r| r.vector.len() != vector_dim) {
            Some(bad) => Err(PortfolioError::DimensionMismatch {
                expected: vector_dim,
                actual: bad.vector.len(),
            }),
            None => Ok(()),
        }
    }

    async fn create_table(&mut self, vector_dim: usize) -> Result<()> {
        info!(
            "Creating collection '{}' with {} dimensions",
            self.table_name, vector_dim
        );

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(vector_dim);
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut file_names = Vec::with_capacity(len);
        let mut file_paths = Vec::with_capacity(len);
        let mut heading_paths = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            file_names.push(record.metadata.file_name.as_str());
            file_paths.push(record.metadata.file_path.as_str());
            heading_paths.push(record.metadata.heading_path.as_str());
            contents.push(record.metadata.content.as_str());
            token_counts.push(record.metadata.token_count);
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| PortfolioError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(file_names)),
            Arc::new(StringArray::from(file_paths)),
            Arc::new(StringArray::from(heading_paths)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(token_counts)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays).map_err(|e| {
            PortfolioError::Database(format!("Failed to create record batch: {}", e))
        })
    }

    /// Find the `limit` entries closest to `query_vector` by cosine similarity.
    ///
    /// Results are ordered by non-increasing similarity. An empty collection
    /// yields no results.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(expected) = self.vector_dimension else {
            debug!("Collection '{}' has no vectors yet", self.table_name);
            return Ok(Vec::new());
        };
        if query_vector.len() != expected {
            return Err(PortfolioError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| {
                PortfolioError::Database(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        search_results.truncate(limit);

        Ok(search_results)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results.try_next().await.map_err(|e| {
            PortfolioError::Database(format!("Failed to read result stream: {}", e))
        })? {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let file_names = string_column(batch, "file_name")?;
        let file_paths = string_column(batch, "file_path")?;
        let heading_paths = string_column(batch, "heading_path")?;
        let contents = string_column(batch, "content")?;
        let token_counts = u32_column(batch, "token_count")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let created_ats = string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance = distances
                    .filter(|d| !d.is_null(row))
                    .map_or(0.0, |d| d.value(row));

                SearchResult {
                    chunk_metadata: ChunkMetadata {
                        file_name: file_names.value(row).to_string(),
                        file_path: file_paths.value(row).to_string(),
                        heading_path: heading_paths.value(row).to_string(),
                        content: contents.value(row).to_string(),
                        token_count: token_counts.value(row),
                        chunk_index: chunk_indices.value(row),
                        created_at: created_ats.value(row).to_string(),
                    },
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(results)
    }

    /// Delete every entry that came from `file_path`
    #[inline]
    pub async fn delete_document(&mut self, file_path: &str) -> Result<()> {
        if self.vector_dimension.is_none() {
            return Ok(());
        }

        debug!("Deleting embeddings for document: {}", file_path);

        let predicate = format!("file_path = '{}'", file_path.replace('\'', "''"));
        self.open_table()
            .await?
            .delete(&predicate)
            .await
            .map_err(|e| {
                PortfolioError::Database(format!("Failed to delete document embeddings: {}", e))
            })?;

        Ok(())
    }

    /// Distinct source paths that have entries in the collection
    #[inline]
    pub async fn document_paths(&self) -> Result<BTreeSet<String>> {
        let mut paths = BTreeSet::new();
        if self.vector_dimension.is_none() {
            return Ok(paths);
        }

        let mut batches = self
            .open_table()
            .await?
            .query()
            .select(Select::columns(&["file_path"]))
            .execute()
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to list documents: {}", e)))?;

        while let Some(batch) = batches.try_next().await.map_err(|e| {
            PortfolioError::Database(format!("Failed to read document list: {}", e))
        })? {
            let file_paths = string_column(&batch, "file_path")?;
            paths.extend((0..batch.num_rows()).map(|row| file_paths.value(row).to_string()));
        }

        Ok(paths)
    }

    /// Drop the whole collection; the next insert recreates it
    #[inline]
    pub async fn drop_collection(&mut self) -> Result<()> {
        if self.table_exists().await? {
            warn!("Dropping collection '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| PortfolioError::Database(format!("Failed to drop table: {}", e)))?;
        }

        self.vector_dimension = None;
        Ok(())
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        if self.vector_dimension.is_none() {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Compact the collection after a large ingest
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        if self.vector_dimension.is_none() {
            return Ok(());
        }

        debug!("Optimizing collection '{}'", self.table_name);

        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| PortfolioError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Collection '{}' optimized", self.table_name);
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PortfolioError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PortfolioError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PortfolioError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| PortfolioError::Database(format!("Invalid {} column type", name)))
}

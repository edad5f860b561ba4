// LanceDB vector database module
// Persists chunk vectors with their text and answers nearest-neighbour queries


pub mod vector_store;

pub use vector_store::{SearchResult, VectorStore};

use serde::{Deserialize, Serialize};

/// One stored vector entry, one per chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// UUID v4
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source file name, e.g. `hololens.md`
    pub file_name: String,
    /// Source path relative to the data directory; replaced as a unit on re-ingest
    pub file_path: String,
    /// Heading path (e.g., "HoloLens Rendering > Results")
    pub heading_path: String,
    /// Raw markdown of the chunk
    pub content: String,
    pub token_count: u32,
    /// Index of this chunk within its document
    pub chunk_index: u32,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Create a record with a fresh id
    #[inline]
    pub fn new(vector: Vec<f32>, metadata: ChunkMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata,
        }
    }
}

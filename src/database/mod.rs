// Database module
// LanceDB collection holding chunk vectors, text and metadata

pub mod lancedb;

pub use self::lancedb::{ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};

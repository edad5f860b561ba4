// Embeddings
// Markdown chunking and the Ollama embedding client

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_markdown, estimate_token_count};
pub use ollama::OllamaClient;

use crate::{PortfolioError, Result};

/// Maps text to fixed-size vectors.
///
/// Implementations must be deterministic for a given model and must return one
/// vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Embed every text in `texts`
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Name of the underlying model, recorded in logs
    fn model_name(&self) -> &str;

    /// Embed a single text, e.g. a user question
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| PortfolioError::Embedding("Empty embedding response".to_string()))
    }
}

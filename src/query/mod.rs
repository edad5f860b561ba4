// Query engine
// Embeds a question, retrieves the closest chunks and asks the language model


use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::lancedb::{SearchResult, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::llm::{Generator, OllamaGenerator, TokenStream};
use crate::prompt::{Persona, grounding};
use crate::{PortfolioError, Result};

/// Asked when `ask` is run without a question
pub const DEFAULT_QUESTION: &str =
    "Tell me about a time you handled a technical conflict between teams.";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Retrieval knobs taken from the `[retrieval]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySettings {
    pub top_k: usize,
    pub persona: Persona,
}

impl Default for QuerySettings {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            persona: Persona::default(),
        }
    }
}

impl QuerySettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            persona: config.retrieval.persona,
        }
    }
}

/// A complete answer with the chunks it was grounded on
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Ordered by non-increasing similarity
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Metrics in the answer that none of the sources mention
    #[inline]
    pub fn unsupported_metrics(&self) -> Vec<String> {
        grounding::unsupported_metrics(&self.text, &join_context(&self.sources))
    }
}

/// An answer still being generated
#[derive(Debug)]
pub struct StreamingAnswer {
    pub fragments: TokenStream,
    pub sources: Vec<SearchResult>,
}

/// Retrieval-augmented question answering over one collection.
///
/// Owned by the caller; nothing is cached between questions.
pub struct QueryEngine {
    settings: QuerySettings,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: VectorStore,
}

impl QueryEngine {
    #[inline]
    pub fn new(
        settings: QuerySettings,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: VectorStore,
    ) -> Self {
        Self {
            settings,
            embedder,
            generator,
            store,
        }
    }

    /// Open the configured collection with the Ollama embedder and generator.
    ///
    /// Fails with [`PortfolioError::CollectionNotFound`] if nothing has been ingested.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let store =
            VectorStore::open_existing(&config.vector_database_path(), &config.ingest.collection)
                .await?;
        let embedder = OllamaClient::new(config)?;
        let generator = OllamaGenerator::new(config)?;

        info!(
            "Query engine ready: collection '{}', embedder {}, generator {}",
            store.collection(),
            embedder.model_name(),
            generator.model_name()
        );

        Ok(Self::new(
            QuerySettings::from_config(config),
            Arc::new(embedder),
            Arc::new(generator),
            store,
        ))
    }

    #[inline]
    pub fn set_persona(&mut self, persona: Persona) {
        self.settings.persona = persona;
    }

    /// Embed `question` and return the `top_k` closest chunks, best first
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let embedder = Arc::clone(&self.embedder);
        let text = question.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| PortfolioError::Embedding(format!("Embedding task failed: {}", e)))??;

        let sources = self
            .store
            .search_similar(&query_vector, self.settings.top_k)
            .await?;

        debug!(
            "Retrieved {} sources: {}",
            sources.len(),
            sources
                .iter()
                .map(|s| format!(
                    "{} ({:.3})",
                    s.chunk_metadata.heading_path, s.similarity_score
                ))
                .join(", ")
        );
        Ok(sources)
    }

    /// Render the persona template around the retrieved context
    #[inline]
    pub fn build_prompt(&self, question: &str, sources: &[SearchResult]) -> String {
        self.settings
            .persona
            .render(&join_context(sources), question)
    }

    /// Answer `question` in one piece
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let sources = self.retrieve(question).await?;
        let prompt = self.build_prompt(question, &sources);

        let generator = Arc::clone(&self.generator);
        let text = tokio::task::spawn_blocking(move || generator.complete(&prompt))
            .await
            .map_err(|e| PortfolioError::Generation(format!("Generation task failed: {}", e)))??;

        Ok(Answer { text, sources })
    }

    /// Answer `question` as a stream of fragments.
    ///
    /// Sources are known before the first fragment arrives.
    #[inline]
    pub async fn answer_streaming(&self, question: &str) -> Result<StreamingAnswer> {
        let sources = self.retrieve(question).await?;
        let prompt = self.build_prompt(question, &sources);
        let fragments = self.generator.stream(&prompt)?;

        Ok(StreamingAnswer { fragments, sources })
    }
}

/// Concatenate chunk texts in retrieval order
#[inline]
pub fn join_context(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .map(|s| s.chunk_metadata.content.as_str())
        .join(CONTEXT_SEPARATOR)
}

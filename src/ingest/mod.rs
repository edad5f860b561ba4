// Document ingestion
// Reads markdown write-ups, chunks them by heading and writes their vectors to the collection


use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, ContentChunk, chunk_markdown};
use crate::embeddings::{Embedder, OllamaClient};
use crate::{PortfolioError, Result};

/// A source markdown file, read once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the data directory, `/`-separated
    pub file_path: String,
    pub file_name: String,
    /// File stem; names the text before the first heading
    pub title: String,
    pub content: String,
}

/// A chunk together with the document it came from
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub file_name: String,
    pub file_path: String,
    pub chunk: ContentChunk,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub entries_written: usize,
    /// Documents no longer in the data directory whose entries were removed
    pub documents_removed: usize,
}

impl Document {
    #[inline]
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .rsplit('/')
            .next()
            .unwrap_or(&file_path)
            .to_string();
        let title = Path::new(&file_name)
            .file_stem()
            .map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned());

        Self {
            file_path,
            file_name,
            title,
            content: content.into(),
        }
    }

    /// Split this document along its headings
    #[inline]
    pub fn chunks(&self, config: &ChunkingConfig) -> Vec<DocumentChunk> {
        chunk_markdown(&self.content, &self.title, config)
            .into_iter()
            .map(|chunk| DocumentChunk {
                file_name: self.file_name.clone(),
                file_path: self.file_path.clone(),
                chunk,
            })
            .collect()
    }
}

impl DocumentChunk {
    fn into_record(self, vector: Vec<f32>, created_at: &str) -> EmbeddingRecord {
        EmbeddingRecord::new(
            vector,
            ChunkMetadata {
                file_name: self.file_name,
                file_path: self.file_path,
                heading_path: self.chunk.heading_path,
                content: self.chunk.content,
                token_count: u32::try_from(self.chunk.token_count).unwrap_or(u32::MAX),
                chunk_index: u32::try_from(self.chunk.chunk_index).unwrap_or(u32::MAX),
                created_at: created_at.to_string(),
            },
        )
    }
}

/// Read every file under `data_dir` whose extension is in `extensions`.
///
/// Directories are walked recursively and documents come back in path order.
#[inline]
pub fn load_documents(data_dir: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !data_dir.is_dir() {
        return Err(PortfolioError::DocumentsNotFound(data_dir.to_path_buf()));
    }

    let mut paths = collect_paths(data_dir, extensions)?;
    paths.sort();

    if paths.is_empty() {
        return Err(PortfolioError::DocumentsNotFound(data_dir.to_path_buf()));
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let relative = path
            .strip_prefix(data_dir)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        debug!("Loaded {} ({} bytes)", relative, content.len());
        documents.push(Document::new(relative, content));
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        data_dir.display()
    );
    Ok(documents)
}

/// Matching files under `dir`; symlinked directories are followed once
fn collect_paths(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_some() => {
                warn!("Skipping symlink loop: {}", e);
                continue;
            }
            Err(e) => return Err(std::io::Error::from(e).into()),
        };

        let matches_extension = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if entry.file_type().is_file() && matches_extension {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

/// Chunks, embeds and stores documents
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    show_progress: bool,
}

impl Ingestor {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            show_progress: console::user_attended_stderr(),
        }
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Write every document's chunks into `store`.
    ///
    /// Existing entries of a document are replaced, so repeated runs over the
    /// same files leave the entry count unchanged.
    #[inline]
    pub async fn ingest(
        &self,
        documents: &[Document],
        store: &mut VectorStore,
    ) -> Result<IngestReport> {
        let per_document: Vec<Vec<DocumentChunk>> = documents
            .iter()
            .map(|doc| doc.chunks(&self.chunking))
            .collect();
        let total_chunks: usize = per_document.iter().map(Vec::len).sum();

        info!(
            "Embedding {} chunks from {} documents with {}",
            total_chunks,
            documents.len(),
            self.embedder.model_name()
        );

        let bar = if self.show_progress {
            ProgressBar::new(total_chunks as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };

        for (document, chunks) in documents.iter().zip(per_document) {
            bar.set_message(document.file_path.clone());

            if chunks.is_empty() {
                warn!("{} produced no chunks", document.file_path);
                store.delete_document(&document.file_path).await?;
                continue;
            }

            let chunk_count = chunks.len();
            let vectors = self.embed_chunks(&chunks).await?;
            let created_at = Utc::now().to_rfc3339();
            let records: Vec<EmbeddingRecord> = chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| chunk.into_record(vector, &created_at))
                .collect();

            // Old entries stay until the replacement is known to fit the collection
            store.check_dimension(&records)?;
            store.delete_document(&document.file_path).await?;
            report.entries_written += store.store_embeddings_batch(records).await?;
            report.chunks += chunk_count;
            bar.inc(chunk_count as u64);

            debug!(
                "Stored {} chunks for {}",
                chunk_count, document.file_path
            );
        }

        bar.finish_and_clear();

        info!(
            "Ingested {} documents into {} entries",
            report.documents, report.entries_written
        );
        Ok(report)
    }

    async fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.chunk.content.clone()).collect();
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);

        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| PortfolioError::Embedding(format!("Embedding task failed: {}", e)))??;

        if vectors.len() != expected {
            return Err(PortfolioError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                expected,
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

/// Remove entries whose source file is not among `documents`.
///
/// Returns the number of documents removed.
#[inline]
pub async fn remove_missing_documents(
    documents: &[Document],
    store: &mut VectorStore,
) -> Result<usize> {
    let present: HashSet<&str> = documents.iter().map(|d| d.file_path.as_str()).collect();
    let stale: Vec<String> = store
        .document_paths()
        .await?
        .into_iter()
        .filter(|path| !present.contains(path.as_str()))
        .collect();

    for path in &stale {
        info!("Removing entries for deleted document {}", path);
        store.delete_document(path).await?;
    }

    Ok(stale.len())
}

/// Ingest the configured data directory with the Ollama embedder.
///
/// With `rebuild`, the collection is dropped before anything is written.
/// Entries of files deleted from the data directory are removed afterwards.
#[inline]
pub async fn ingest_from_config(
    config: &Config,
    data_dir: Option<&Path>,
    rebuild: bool,
) -> Result<IngestReport> {
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
    let documents = load_documents(data_dir, &config.ingest.extensions)?;

    let client = OllamaClient::new(config)?;
    client.health_check()?;

    let mut store =
        VectorStore::get_or_create(&config.vector_database_path(), &config.ingest.collection)
            .await?;
    if rebuild {
        store.drop_collection().await?;
    }

    let ingestor = Ingestor::new(Arc::new(client), config.chunking.clone());
    let mut report = ingestor.ingest(&documents, &mut store).await?;
    report.documents_removed = remove_missing_documents(&documents, &mut store).await?;

    store.optimize().await?;
    Ok(report)
}

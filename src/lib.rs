use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PortfolioError>;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Collection '{0}' not found; run `portfolio-rag ingest` first")]
    CollectionNotFound(String),

    #[error("No documents found in {}", .0.display())]
    DocumentsNotFound(PathBuf),

    #[error("Embedding dimension mismatch: collection uses {expected}, query produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Language model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod query;

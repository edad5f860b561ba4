use anyhow::{Context, Result};
use console::style;
use std::io;
use std::path::Path;
use tracing::{info, warn};

use crate::PortfolioError;
use crate::chat::{run_chat, write_fragments, write_sources};
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::ingest::ingest_from_config;
use crate::prompt::{Persona, grounding};
use crate::query::{DEFAULT_QUESTION, QueryEngine, join_context};

/// Ingest the data directory into the configured collection
#[inline]
pub async fn ingest(config: &Config, data_dir: Option<&Path>, rebuild: bool) -> Result<()> {
    let source = data_dir.unwrap_or_else(|| config.data_dir());
    info!("Ingesting documents from {}", source.display());

    if rebuild {
        println!(
            "Rebuilding collection '{}' from scratch",
            config.ingest.collection
        );
    }

    let report = ingest_from_config(config, data_dir, rebuild).await?;

    println!(
        "{}",
        style(format!(
            "✓ Ingested {} documents into '{}'",
            report.documents, config.ingest.collection
        ))
        .green()
    );
    println!("  Chunks produced: {}", report.chunks);
    println!("  Entries written: {}", report.entries_written);
    if report.documents_removed > 0 {
        println!("  Deleted documents removed: {}", report.documents_removed);
    }
    println!(
        "  Vector database: {}",
        config.vector_database_path().display()
    );

    Ok(())
}

/// Answer one question and list the sources it was grounded on
#[inline]
pub async fn ask(
    config: &Config,
    question: Option<String>,
    persona: Option<Persona>,
    stream: bool,
) -> Result<()> {
    let question = question.unwrap_or_else(|| DEFAULT_QUESTION.to_string());

    let mut engine = QueryEngine::open(config).await?;
    if let Some(persona) = persona {
        engine.set_persona(persona);
    }

    println!("{} {}", style("Question:").bold().cyan(), question);
    println!();

    let mut stdout = io::stdout();
    let (text, sources) = if stream {
        let answer = engine.answer_streaming(&question).await?;
        let text = write_fragments(answer.fragments, &mut stdout).await?;
        (text, answer.sources)
    } else {
        let answer = engine.answer(&question).await?;
        println!("{}", answer.text);
        (answer.text, answer.sources)
    };

    println!();
    println!("{}", style("Sources:").bold().yellow());
    write_sources(&mut stdout, &sources)?;

    let unsupported = grounding::unsupported_metrics(&text, &join_context(&sources));
    if !unsupported.is_empty() {
        warn!("Answer cites metrics missing from context: {:?}", unsupported);
        println!();
        println!(
            "{} the answer mentions figures not found in the retrieved context: {}",
            style("⚠ Warning:").bold().yellow(),
            unsupported.join(", ")
        );
    }

    Ok(())
}

/// Start an interactive chat session
#[inline]
pub async fn chat(config: &Config, persona: Option<Persona>) -> Result<()> {
    let mut engine = QueryEngine::open(config).await?;
    if let Some(persona) = persona {
        engine.set_persona(persona);
    }

    run_chat(&engine).await
}

/// Show the collection's size and vector dimension
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let db_path = config.vector_database_path();
    let collection = &config.ingest.collection;

    println!("{}", style("📊 Portfolio RAG Status").bold().cyan());
    println!("  Collection: {}", collection);
    println!("  Vector database: {}", db_path.display());
    println!("  Data directory: {}", config.data_dir().display());

    let store = match VectorStore::open_existing(&db_path, collection).await {
        Ok(store) => store,
        Err(PortfolioError::CollectionNotFound(_)) => {
            println!(
                "  Entries: {} (run `portfolio-rag ingest` to build it)",
                style("none").yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to open vector database"),
    };

    let count = store
        .count_embeddings()
        .await
        .context("Failed to count entries")?;
    println!("  Entries: {}", style(count).green());
    match store.vector_dimension() {
        Some(dimension) => println!("  Vector dimension: {}", dimension),
        None => println!("  Vector dimension: unknown"),
    }
    println!(
        "  Models: {} (embeddings), {} (answers)",
        config.ollama.embedding_model, config.llm.model
    );

    Ok(())
}

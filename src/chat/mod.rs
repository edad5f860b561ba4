// Terminal chat
// A thin conversation loop over the query engine that prints answers as they stream in


use std::io::{self, Write};

use console::style;
use dialoguer::Input;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::Result;
use crate::database::lancedb::SearchResult;
use crate::llm::TokenStream;
use crate::query::QueryEngine;

pub const GREETING: &str = "Ask me about my projects!";

const EXIT_COMMAND: &str = "/exit";
const SOURCES_COMMAND: &str = "/sources";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// What the user typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    ShowSources,
    Question(String),
}

impl ChatInput {
    /// Empty input ends the session like `/exit`
    #[inline]
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" | EXIT_COMMAND => Self::Exit,
            SOURCES_COMMAND => Self::ShowSources,
            question => Self::Question(question.to_string()),
        }
    }
}

/// Conversation history for one terminal session; never persisted
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: Vec<Turn>,
    last_sources: Vec<SearchResult>,
}

impl Default for ChatSession {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Start with the assistant's greeting
    #[inline]
    pub fn new() -> Self {
        Self {
            turns: vec![Turn {
                role: Role::Assistant,
                text: GREETING.to_string(),
            }],
            last_sources: Vec::new(),
        }
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Sources behind the most recent answer
    #[inline]
    pub fn last_sources(&self) -> &[SearchResult] {
        &self.last_sources
    }

    #[inline]
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            text: text.into(),
        });
    }

    #[inline]
    pub fn push_assistant(&mut self, text: impl Into<String>, sources: Vec<SearchResult>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            text: text.into(),
        });
        self.last_sources = sources;
    }

    /// Ask `question`, writing fragments to `out` as they arrive.
    ///
    /// The full answer is recorded as an assistant turn once the stream ends.
    #[inline]
    pub async fn ask<W: Write + Send>(
        &mut self,
        engine: &QueryEngine,
        question: &str,
        out: &mut W,
    ) -> Result<String> {
        self.push_user(question);

        let answer = engine.answer_streaming(question).await?;
        let text = write_fragments(answer.fragments, out).await?;

        debug!("Answer complete ({} characters)", text.len());
        self.push_assistant(text.clone(), answer.sources);
        Ok(text)
    }
}

/// Write fragments to `out` as they arrive and return the full text
#[inline]
pub async fn write_fragments<W: Write + Send>(
    mut fragments: TokenStream,
    out: &mut W,
) -> Result<String> {
    let mut text = String::new();

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        write!(out, "{}", fragment)?;
        out.flush()?;
        text.push_str(&fragment);
    }
    writeln!(out)?;

    Ok(text)
}

/// Print ranked sources with their similarity scores
#[inline]
pub fn write_sources<W: Write>(out: &mut W, sources: &[SearchResult]) -> io::Result<()> {
    if sources.is_empty() {
        return writeln!(out, "No sources were retrieved.");
    }

    for (rank, source) in sources.iter().enumerate() {
        writeln!(
            out,
            "{}. {} - {} (score {:.3})",
            rank + 1,
            source.chunk_metadata.file_path,
            source.chunk_metadata.heading_path,
            source.similarity_score
        )?;
    }
    Ok(())
}

/// Run the interactive loop until `/exit` or empty input
#[inline]
pub async fn run_chat(engine: &QueryEngine) -> anyhow::Result<()> {
    let mut session = ChatSession::new();
    let mut stdout = io::stdout();

    eprintln!(
        "{} {}",
        style("Assistant:").bold().green(),
        GREETING
    );
    eprintln!(
        "{}",
        style(format!(
            "Type {} to quit or {} to see where the last answer came from.",
            EXIT_COMMAND, SOURCES_COMMAND
        ))
        .dim()
    );

    loop {
        let input: String = Input::new()
            .with_prompt(style("You").bold().cyan().to_string())
            .allow_empty(true)
            .interact_text()?;

        match ChatInput::parse(&input) {
            ChatInput::Exit => break,
            ChatInput::ShowSources => write_sources(&mut stdout, session.last_sources())?,
            ChatInput::Question(question) => {
                eprint!("{} ", style("Assistant:").bold().green());
                if let Err(e) = session.ask(engine, &question, &mut stdout).await {
                    warn!("Chat answer failed: {}", e);
                    eprintln!();
                    eprintln!("{} {}", style("Error:").bold().red(), e);
                }
            }
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}

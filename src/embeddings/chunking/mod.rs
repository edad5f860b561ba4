
use std::ops::Range;

use itertools::Itertools;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A section of a markdown document ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    /// Raw markdown of the section, including its heading line
    pub content: String,
    /// Heading path, e.g. "HoloLens Rendering > Results"
    pub heading_path: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for markdown chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Sections above this many estimated tokens are split further
    pub max_chunk_size: usize,
    /// Break oversized paragraphs at sentence boundaries before falling back to words
    pub sentence_boundary_splitting: bool,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            sentence_boundary_splitting: true,
        }
    }
}

/// Byte range of one heading-delimited section
#[derive(Debug)]
struct Section {
    range: Range<usize>,
    heading_path: String,
}

/// Split a markdown document into one chunk per heading-delimited section.
///
/// Text before the first heading forms its own chunk under `title`. Sections
/// larger than `max_chunk_size` are split at paragraph, then sentence, then
/// word boundaries; the pieces keep the section's heading path. Chunk indices
/// are contiguous from zero.
#[inline]
pub fn chunk_markdown(markdown: &str, title: &str, config: &ChunkingConfig) -> Vec<ContentChunk> {
    let mut chunks = Vec::new();

    for section in split_sections(markdown, title) {
        let Some(text) = markdown.get(section.range.clone()).map(str::trim) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let pieces = if estimate_token_count(text) > config.max_chunk_size {
            split_oversized(text, config)
        } else {
            vec![text.to_string()]
        };

        for piece in pieces {
            let token_count = estimate_token_count(&piece);
            let chunk_index = chunks.len();
            chunks.push(ContentChunk {
                content: piece,
                heading_path: section.heading_path.clone(),
                chunk_index,
                token_count,
            });
        }
    }

    debug!(
        "Chunked '{}' into {} chunks (avg {} tokens)",
        title,
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Walk the markdown events and cut the source at every heading
fn split_sections(markdown: &str, title: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut heading_stack: Vec<(u8, String)> = Vec::new();

    let mut section_start = 0;
    let mut in_heading = false;
    let mut heading_text = String::new();

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                if range.start > section_start {
                    sections.push(Section {
                        range: section_start..range.start,
                        heading_path: build_heading_path(&heading_stack, title),
                    });
                }
                section_start = range.start;
                in_heading = true;
                heading_text.clear();
            }
            Event::End(TagEnd::Heading(level)) => {
                if !heading_text.trim().is_empty() {
                    update_heading_stack(
                        &mut heading_stack,
                        heading_level_to_u8(level),
                        heading_text.trim().to_string(),
                    );
                }
                in_heading = false;
            }
            Event::Text(text) | Event::Code(text) if in_heading => {
                heading_text.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak if in_heading => {
                heading_text.push(' ');
            }
            _ => {}
        }
    }

    if markdown.len() > section_start {
        sections.push(Section {
            range: section_start..markdown.len(),
            heading_path: build_heading_path(&heading_stack, title),
        });
    }

    sections
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn update_heading_stack(stack: &mut Vec<(u8, String)>, level: u8, text: String) {
    stack.retain(|(l, _)| *l < level);
    stack.push((level, text));
}

fn build_heading_path(stack: &[(u8, String)], title: &str) -> String {
    if stack.is_empty() {
        title.to_string()
    } else {
        stack.iter().map(|(_, text)| text.as_str()).join(" > ")
    }
}

/// Group lines into blank-line separated blocks, never breaking inside a code fence
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~") {
            in_code_block = !in_code_block;
        }

        if !in_code_block && line.trim().is_empty() {
            if !current.trim().is_empty() {
                blocks.push(current.trim_end().to_string());
            }
            current.clear();
            continue;
        }

        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        blocks.push(current.trim_end().to_string());
    }

    blocks
}

/// Split an oversized section, packing blocks greedily up to `max_chunk_size`
fn split_oversized(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut units = Vec::new();

    for block in split_blocks(text) {
        if estimate_token_count(&block) <= config.max_chunk_size || contains_code_block(&block) {
            units.push(block);
        } else if config.sentence_boundary_splitting {
            for sentence in split_sentences(&block) {
                if estimate_token_count(&sentence) > config.max_chunk_size {
                    units.extend(split_words(&sentence, config.max_chunk_size));
                } else {
                    units.push(sentence);
                }
            }
        } else {
            units.extend(split_words(&block, config.max_chunk_size));
        }
    }

    pack(units, config.max_chunk_size, "\n\n")
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn split_words(text: &str, max_tokens: usize) -> Vec<String> {
    let words = text.split_whitespace().map(ToString::to_string).collect();
    pack(words, max_tokens, " ")
}

/// Concatenate units with `separator` while staying within `max_tokens`
fn pack(units: Vec<String>, max_tokens: usize, separator: &str) -> Vec<String> {
    let mut packed = Vec::new();
    let mut current = String::new();

    for unit in units {
        if current.is_empty() {
            current = unit;
            continue;
        }

        let candidate = format!("{current}{separator}{unit}");
        if estimate_token_count(&candidate) > max_tokens {
            packed.push(std::mem::replace(&mut current, unit));
        } else {
            current = candidate;
        }
    }

    if !current.trim().is_empty() {
        packed.push(current);
    }

    packed
}

/// Estimate token count using a simple heuristic.
///
/// Roughly 0.75 words per token for English prose, plus a little for punctuation.
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}

fn contains_code_block(text: &str) -> bool {
    text.contains("```") || text.contains("~~~") || text.lines().any(|line| line.starts_with("    "))
}

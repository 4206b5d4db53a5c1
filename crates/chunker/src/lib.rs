//! Structure-preserving document chunking.
//!
//! Splits a document into paragraphs (blank-line delimited, the smallest
//! indivisible unit) and greedily packs consecutive paragraphs into chunks
//! that fit a character budget. Reading order is always preserved: chunks
//! are never reordered or deduplicated, and concatenating them reproduces
//! every paragraph of the source.
//!
//! Sizes are measured in characters on whitespace-trimmed paragraphs.
//! Boundary whitespace between paragraphs is normalized to a single blank
//! line, so reconstruction is not byte-identical to the source — that is
//! the one documented lossy step.

use serde::{Deserialize, Serialize};
use textmill_core::{Chunk, RunMetadata};
use tracing::{debug, warn};

/// Characters inserted between paragraphs in a chunk (and counted toward
/// its size).
const PARAGRAPH_JOINER: &str = "\n\n";

/// Document-level statistics produced by one chunking call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    /// Number of paragraphs found in the document.
    pub paragraph_count: usize,

    /// Number of chunks produced.
    pub chunk_count: usize,

    /// Indices of chunks whose single paragraph exceeds the budget.
    pub oversized_chunks: Vec<usize>,

    /// The budget the chunks were packed against.
    pub budget: usize,
}

impl ChunkStats {
    /// Render the stats as run metadata entries.
    pub fn to_metadata(&self) -> RunMetadata {
        let mut meta = RunMetadata::new();
        meta.insert("Paragraph-Count", self.paragraph_count);
        meta.insert("Chunk-Count", self.chunk_count);
        meta.insert("Chunk-Budget", self.budget);
        if !self.oversized_chunks.is_empty() {
            meta.insert("Oversized-Chunks", self.oversized_chunks.clone());
        }
        meta
    }
}

/// Split text into trimmed, non-empty paragraphs in source order.
///
/// A paragraph boundary is one or more lines that are empty after
/// trimming.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(current.trim().to_string());
            }
            current.clear();
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }

    paragraphs
}

/// Split a document into ordered chunks at or under `max_chunk_size`.
///
/// Paragraphs accumulate greedily into the current chunk until adding the
/// next one would exceed the budget, at which point the chunk closes and a
/// new one starts. A paragraph that alone exceeds the budget is never
/// dropped or truncated: it becomes its own chunk, flagged oversized in
/// both the chunk and the stats.
///
/// Empty input yields no chunks and stats reporting zero paragraphs.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> (Vec<Chunk>, ChunkStats) {
    let paragraphs = split_paragraphs(text);
    let joiner_len = PARAGRAPH_JOINER.chars().count();

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut oversized_chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_size = 0usize;

    let close = |chunks: &mut Vec<Chunk>, units: &mut Vec<String>, size: &mut usize| {
        if units.is_empty() {
            return;
        }
        chunks.push(Chunk {
            index: chunks.len(),
            text: units.join(PARAGRAPH_JOINER),
            size: *size,
            oversized: false,
        });
        units.clear();
        *size = 0;
    };

    for paragraph in paragraphs.iter() {
        let size = paragraph.chars().count();

        if size > max_chunk_size {
            // Close whatever is pending, then emit the oversized paragraph
            // as its own flagged chunk.
            close(&mut chunks, &mut current, &mut current_size);
            let index = chunks.len();
            warn!(
                chunk = index,
                size,
                budget = max_chunk_size,
                "paragraph exceeds chunk budget, emitting oversized chunk"
            );
            chunks.push(Chunk {
                index,
                text: paragraph.clone(),
                size,
                oversized: true,
            });
            oversized_chunks.push(index);
            continue;
        }

        let added = if current.is_empty() {
            size
        } else {
            size + joiner_len
        };
        if current_size + added > max_chunk_size {
            close(&mut chunks, &mut current, &mut current_size);
            current_size = size;
        } else {
            current_size += added;
        }
        current.push(paragraph.clone());
    }
    close(&mut chunks, &mut current, &mut current_size);

    let stats = ChunkStats {
        paragraph_count: paragraphs.len(),
        chunk_count: chunks.len(),
        oversized_chunks,
        budget: max_chunk_size,
    };

    debug!(
        paragraphs = stats.paragraph_count,
        chunks = stats.chunk_count,
        budget = max_chunk_size,
        "chunked document"
    );

    (chunks, stats)
}

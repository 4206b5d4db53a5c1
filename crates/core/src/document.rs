//! Document, Chunk, and RunMetadata domain types.
//!
//! These are the value objects that flow through the pipeline:
//! a Document is read once, split into Chunks, and each chunk's completion
//! is accumulated alongside a growing RunMetadata record.

use serde::{Deserialize, Serialize};

/// A document to be processed: raw text plus its source identity.
///
/// Immutable once constructed; the chunker borrows it for the duration of
/// one chunking call and it is discarded after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The raw text content.
    pub content: String,

    /// Where the text came from (file path or logical name).
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }

    /// Read a document from a file on disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(Self {
            content,
            source: path.display().to_string(),
        })
    }
}

/// An ordered, contiguous slice of document text sized to fit one
/// generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the document sequence.
    pub index: usize,

    /// The chunk text (paragraphs joined by blank lines).
    pub text: String,

    /// Size in characters, measured on whitespace-trimmed paragraphs.
    pub size: usize,

    /// Set when this chunk is a single paragraph that alone exceeds the
    /// budget. Oversized chunks are never truncated.
    pub oversized: bool,
}

/// Append-only key/value record describing one run.
///
/// Grows monotonically while a run is in progress and is handed to the
/// caller as a finished snapshot. Values are arbitrary JSON so chunk stats
/// and run annotations can share one map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(flatten)]
    entries: serde_json::Map<String, serde_json::Value>,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one entry. Later inserts win on key collision.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Absorb all entries from another metadata record.
    pub fn merge(&mut self, other: RunMetadata) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

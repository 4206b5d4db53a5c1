//! Error types for the textmill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all textmill operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Stream / transport errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// A chunk-level failure, annotated with enough context to diagnose
    /// which part of the run went wrong.
    #[error("task '{task}' failed on chunk {chunk_index}: {source}")]
    ChunkFailed {
        task: String,
        chunk_index: usize,
        #[source]
        source: Box<Error>,
    },

    // --- File I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error with the task and chunk it occurred on.
    pub fn for_chunk(self, task: impl Into<String>, chunk_index: usize) -> Self {
        Self::ChunkFailed {
            task: task.into(),
            chunk_index,
            source: Box::new(self),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("invalid max context length: {0} (must be positive)")]
    InvalidContextLength(i64),

    #[error("failed to read config {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("template not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read template {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("template rendered no prompts")]
    EmptyRender,
}

/// Transport-level failures from the generation collaborator.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A degenerate model response — the stream completed cleanly but the
/// accumulated text is unusable. Distinct from [`StreamError`]: the
/// transport worked, the output did not.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("stream completed without generating any text")]
    Empty,
}

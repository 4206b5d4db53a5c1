//! ModelClient trait — the abstraction over the text-generation server.
//!
//! A ModelClient can report its context window and stream a completion for
//! a prompt as incremental text fragments. The pipeline calls it without
//! knowing which backend is behind it.

use crate::error::StreamError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded opaquely to the generation server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default)]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_rep_pen")]
    pub rep_pen: f64,

    #[serde(default = "default_min_p")]
    pub min_p: f64,
}

fn default_temperature() -> f64 {
    0.2
}
fn default_top_p() -> f64 {
    1.0
}
fn default_rep_pen() -> f64 {
    1.1
}
fn default_min_p() -> f64 {
    0.02
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: 0,
            top_p: default_top_p(),
            rep_pen: default_rep_pen(),
            min_p: default_min_p(),
        }
    }
}

/// One streaming generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The fully assembled prompt.
    pub prompt: String,

    /// Maximum number of tokens to generate.
    pub max_length: u32,

    /// Sampling parameters, passed through unchanged.
    #[serde(default)]
    pub params: SamplingParams,

    /// Raw text-completion mode (no chat formatting server-side).
    #[serde(default)]
    pub text_completion: bool,
}

/// A stream of incremental text fragments.
///
/// The channel closing signals normal completion. Dropping the receiver
/// cancels the stream; the sender side must stop producing. A partial
/// accumulation from a cancelled or errored stream is never a result.
pub type FragmentStream = tokio::sync::mpsc::Receiver<Result<String, StreamError>>;

/// The generation server abstraction.
///
/// One `stream_generate` call yields one finite, non-restartable fragment
/// stream; the caller is the sole consumer and must fully drain it (or drop
/// it to cancel) before treating the result as complete.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this backend (e.g., "koboldcpp").
    fn name(&self) -> &str;

    /// The server-reported maximum context length, in tokens.
    async fn max_context_length(&self) -> Result<i64, StreamError>;

    /// Start a streaming generation and return the fragment stream.
    async fn stream_generate(&self, request: GenerateRequest)
        -> Result<FragmentStream, StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults_match_catalog() {
        let params = SamplingParams::default();
        assert!((params.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(params.top_k, 0);
        assert!((params.top_p - 1.0).abs() < f64::EPSILON);
        assert!((params.rep_pen - 1.1).abs() < f64::EPSILON);
        assert!((params.min_p - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let json = r#"{"prompt":"Hello","max_length":512}"#;
        let req: GenerateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.prompt, "Hello");
        assert_eq!(req.max_length, 512);
        assert!(!req.text_completion);
        assert!((req.params.temperature - 0.2).abs() < f64::EPSILON);
    }
}

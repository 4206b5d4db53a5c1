//! PromptTemplate trait — the abstraction over prompt rendering.
//!
//! Wraps an instruction, a chunk of document text, and a system message
//! into one or more renderable prompt strings. The pipeline always sends
//! the first rendered prompt; renderers that produce multi-part prompts
//! return them in order.

use crate::error::TemplateError;

/// The prompt-rendering collaborator.
pub trait PromptTemplate: Send + Sync {
    /// A human-readable name for this template (e.g., "alpaca", file stem).
    fn name(&self) -> &str;

    /// Render the three named fields into at least one prompt string.
    fn wrap(
        &self,
        instruction: &str,
        content: &str,
        system_instruction: &str,
    ) -> Result<Vec<String>, TemplateError>;
}

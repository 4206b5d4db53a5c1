//! The task catalog and budget resolver.
//!
//! Four fixed document tasks, each pairing an instruction with a fraction
//! of the model's context window. Translation may expand the text
//! significantly and corrections are roughly 1:1, so both get the smaller
//! fraction; summary and distill compress, so they can take more input
//! per request.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of supported document tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskId {
    Translate,
    Summary,
    Distill,
    Correct,
}

impl TaskId {
    /// All supported tasks, in a stable order.
    pub const ALL: [TaskId; 4] = [
        TaskId::Translate,
        TaskId::Summary,
        TaskId::Distill,
        TaskId::Correct,
    ];

    /// The fraction of the model context window a chunk of input may occupy.
    pub fn budget_fraction(&self) -> f64 {
        match self {
            TaskId::Translate => 0.4,
            TaskId::Summary => 0.8,
            TaskId::Distill => 0.8,
            TaskId::Correct => 0.4,
        }
    }

    /// The instruction text wrapped around every chunk for this task.
    ///
    /// `language` is only consulted by the translate task.
    pub fn instruction(&self, language: &str) -> String {
        match self {
            TaskId::Translate => format!(
                "Translate the text into {language}. \
                 Maintain linguistic flourish and authorial style as much as possible. \
                 Write the full contents without condensing the writing or modernizing the language."
            ),
            TaskId::Summary => "Extract the key points, themes and actions from the text succinctly \
                 without developing any conclusions or commentary."
                .into(),
            TaskId::Distill => {
                "Rewrite the text to be as concise as possible without losing meaning.".into()
            }
            TaskId::Correct => "Correct any grammar, spelling, style, or format errors in the text. \
                 Do not alter the text or otherwise change the meaning or style."
                .into(),
        }
    }
}

impl FromStr for TaskId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translate" => Ok(TaskId::Translate),
            "summary" => Ok(TaskId::Summary),
            "distill" => Ok(TaskId::Distill),
            "correct" => Ok(TaskId::Correct),
            other => Err(ConfigError::UnknownTask(other.into())),
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskId::Translate => "translate",
            TaskId::Summary => "summary",
            TaskId::Distill => "distill",
            TaskId::Correct => "correct",
        };
        write!(f, "{name}")
    }
}

/// Resolved, immutable parameters for one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: TaskId,

    /// Maximum chunk size in characters for this run.
    pub budget: usize,

    /// The instruction text, with any language parameter already applied.
    pub instruction: String,
}

impl TaskConfig {
    /// Build the config for a task from the server-reported context length.
    pub fn resolve(
        id: TaskId,
        max_context_length: i64,
        language: &str,
    ) -> Result<Self, ConfigError> {
        let budget = resolve_budget(id, max_context_length)?;
        Ok(Self {
            id,
            budget,
            instruction: id.instruction(language),
        })
    }
}

/// Derive the per-chunk size budget for a task.
///
/// `floor(max_context_length * fraction)`. Pure; fails if the reported
/// context length is not positive.
pub fn resolve_budget(id: TaskId, max_context_length: i64) -> Result<usize, ConfigError> {
    if max_context_length <= 0 {
        return Err(ConfigError::InvalidContextLength(max_context_length));
    }
    Ok((max_context_length as f64 * id.budget_fraction()) as usize)
}

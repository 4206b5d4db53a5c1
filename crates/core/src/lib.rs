//! # textmill Core
//!
//! Domain types, traits, and error definitions for the textmill document
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators — the model server and the prompt template
//! renderer — are defined as traits here. Implementations live in their own
//! crates (`textmill-client`, `textmill-template`). This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod client;
pub mod document;
pub mod error;
pub mod task;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use client::{GenerateRequest, ModelClient, SamplingParams};
pub use document::{Chunk, Document, RunMetadata};
pub use error::{ConfigError, Error, GenerationError, Result, StreamError, TemplateError};
pub use task::{resolve_budget, TaskConfig, TaskId};
pub use template::PromptTemplate;

//! Ollama-backed text generation, embeddings, and model host management.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::LlmError;
pub use provider::{GenerationOptions, LlmProvider, LocalModel, ModelHost};

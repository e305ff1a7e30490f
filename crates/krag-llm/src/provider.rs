use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Sampling parameters sent with every generation request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    /// Context window length in tokens.
    pub num_ctx: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 40,
            top_p: 0.9,
            repeat_penalty: 1.1,
            num_ctx: 2048,
        }
    }
}

/// A model present on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalModel {
    pub name: String,
    pub size_bytes: u64,
}

pub trait LlmProvider: Send + Sync {
    /// Complete a single prompt with the active model and its options.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be reached or the response is empty.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a single text with the embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding request fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts in one request, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the host returns a different
    /// number of vectors than inputs.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Build a provider bound to another generation model, sharing the same
    /// host and embedding model.
    #[must_use]
    fn with_model(&self, model: &str, options: GenerationOptions) -> Self
    where
        Self: Sized;

    fn model(&self) -> &str;

    fn embedding_model(&self) -> &str;

    fn options(&self) -> GenerationOptions;

    fn name(&self) -> &str;
}

/// Model lifecycle operations exposed by the host (list, pull, delete).
pub trait ModelHost: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the host cannot be reached.
    fn list_models(&self) -> impl Future<Output = Result<Vec<LocalModel>, LlmError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the download fails.
    fn pull_model(&self, name: &str) -> impl Future<Output = Result<(), LlmError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the host refuses or cannot perform the deletion.
    fn delete_model(&self, name: &str) -> impl Future<Output = Result<(), LlmError>> + Send;
}

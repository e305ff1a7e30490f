use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{GenerationOptions, LlmProvider, LocalModel, ModelHost};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    options: GenerationOptions,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama (is it running?): {e}"))
        })?;
        Ok(())
    }

    fn model_options(&self) -> ModelOptions {
        ModelOptions::default()
            .temperature(self.options.temperature)
            .top_k(self.options.top_k)
            .top_p(self.options.top_p)
            .repeat_penalty(self.options.repeat_penalty)
            .num_ctx(self.options.num_ctx)
    }
}

impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_owned())
            .options(self.model_options());

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama generate request failed: {e}")))?;

        if response.response.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(response.response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "ollama" })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        if response.embeddings.len() != texts.len() {
            return Err(LlmError::EmbeddingMismatch {
                expected: texts.len(),
                actual: response.embeddings.len(),
            });
        }
        Ok(response.embeddings)
    }

    fn with_model(&self, model: &str, options: GenerationOptions) -> Self {
        Self {
            client: self.client.clone(),
            model: model.to_owned(),
            embedding_model: self.embedding_model.clone(),
            options,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn options(&self) -> GenerationOptions {
        self.options
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

impl ModelHost for OllamaProvider {
    async fn list_models(&self) -> Result<Vec<LocalModel>, LlmError> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| LlmError::Other(format!("failed to list Ollama models: {e}")))?;

        Ok(models
            .into_iter()
            .map(|m| LocalModel {
                name: m.name,
                size_bytes: m.size,
            })
            .collect())
    }

    async fn pull_model(&self, name: &str) -> Result<(), LlmError> {
        tracing::info!(model = name, "pulling model");
        self.client
            .pull_model(name.to_owned(), false)
            .await
            .map_err(|e| LlmError::Other(format!("failed to pull {name}: {e}")))?;
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<(), LlmError> {
        self.client
            .delete_model(name.to_owned())
            .await
            .map_err(|e| LlmError::Other(format!("failed to delete {name}: {e}")))?;
        tracing::info!(model = name, "model removed");
        Ok(())
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

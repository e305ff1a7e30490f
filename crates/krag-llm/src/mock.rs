//! Test-only mock provider and model host.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{GenerationOptions, LlmProvider, LocalModel, ModelHost};

/// Shared state survives `with_model`, so a test can hold one handle and
/// observe calls made through a switched provider.
#[derive(Debug, Default)]
struct Shared {
    responses: Mutex<Vec<String>>,
    installed: Mutex<Vec<LocalModel>>,
    prompts: Mutex<Vec<String>>,
    fail_generate: AtomicBool,
    fail_embed: AtomicBool,
    fail_host: AtomicBool,
    generate_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    shared: Arc<Shared>,
    model: String,
    options: GenerationOptions,
    pub default_response: String,
    pub dimensions: usize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("gemma3:1b")
    }
}

impl MockProvider {
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            model: model.to_owned(),
            options: GenerationOptions::default(),
            default_response: "mock response".into(),
            dimensions: 64,
        }
    }

    /// Queue responses returned in order before falling back to `default_response`.
    #[must_use]
    pub fn with_responses(self, responses: Vec<String>) -> Self {
        *lock(&self.shared.responses) = responses;
        self
    }

    /// Mark models as installed on the mock host (size 1 GiB each).
    #[must_use]
    pub fn with_installed(self, models: &[&str]) -> Self {
        *lock(&self.shared.installed) = models
            .iter()
            .map(|name| LocalModel {
                name: (*name).to_owned(),
                size_bytes: 1 << 30,
            })
            .collect();
        self
    }

    pub fn set_fail_generate(&self, fail: bool) {
        self.shared.fail_generate.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_embed(&self, fail: bool) {
        self.shared.fail_embed.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_host(&self, fail: bool) {
        self.shared.fail_host.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn generate_calls(&self) -> usize {
        self.shared.generate_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.shared.embed_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.shared.prompts).last().cloned()
    }

    #[must_use]
    pub fn installed(&self) -> Vec<String> {
        lock(&self.shared.installed)
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    /// Hashed bag-of-words vector: texts sharing words score closer.
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions.max(1)];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            #[allow(clippy::cast_possible_truncation)]
            let slot = (hash % vector.len() as u64) as usize;
            vector[slot] += 1.0;
        }
        vector
    }

    fn check_embed(&self) -> Result<(), LlmError> {
        self.shared.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_embed.load(Ordering::SeqCst) {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(())
    }

    fn check_host(&self) -> Result<(), LlmError> {
        if self.shared.fail_host.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LlmProvider for MockProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.shared.generate_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.prompts).push(prompt.to_owned());
        if self.shared.fail_generate.load(Ordering::SeqCst) {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = lock(&self.shared.responses);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.check_embed()?;
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.check_embed()?;
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn with_model(&self, model: &str, options: GenerationOptions) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            model: model.to_owned(),
            options,
            default_response: self.default_response.clone(),
            dimensions: self.dimensions,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn embedding_model(&self) -> &str {
        "mock-embed"
    }

    fn options(&self) -> GenerationOptions {
        self.options
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

impl ModelHost for MockProvider {
    async fn list_models(&self) -> Result<Vec<LocalModel>, LlmError> {
        self.check_host()?;
        Ok(lock(&self.shared.installed).clone())
    }

    async fn pull_model(&self, name: &str) -> Result<(), LlmError> {
        self.check_host()?;
        let mut installed = lock(&self.shared.installed);
        if !installed.iter().any(|m| m.name == name) {
            installed.push(LocalModel {
                name: name.to_owned(),
                size_bytes: 1 << 30,
            });
        }
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<(), LlmError> {
        self.check_host()?;
        let mut installed = lock(&self.shared.installed);
        let before = installed.len();
        installed.retain(|m| m.name != name);
        if installed.len() == before {
            return Err(LlmError::Other(format!("model {name} not found")));
        }
        Ok(())
    }
}

use serde::Serialize;

use krag_llm::{LlmProvider, LocalModel, ModelHost};

use super::Engine;
use crate::error::{EngineError, Result};
use crate::profile::{ModelInfo, ModelProfile, SUPPORTED_MODELS};

#[allow(clippy::cast_precision_loss)]
const GIB: f64 = (1_u64 << 30) as f64;

/// Supported models split by whether the host has them installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelAvailability {
    pub available: Vec<String>,
    pub not_available: Vec<String>,
    /// Every model installed on the host, supported or not.
    pub total_installed: usize,
    /// Set when the host could not be asked; everything is then unavailable.
    pub error: Option<String>,
}

impl ModelAvailability {
    fn from_installed(installed: &[LocalModel]) -> Self {
        let (available, not_available): (Vec<String>, Vec<String>) = SUPPORTED_MODELS
            .iter()
            .map(|m| (*m).to_owned())
            .partition(|m| installed.iter().any(|i| &i.name == m));
        Self {
            available,
            not_available,
            total_installed: installed.len(),
            error: None,
        }
    }

    fn unreachable(error: String) -> Self {
        Self {
            available: Vec::new(),
            not_available: SUPPORTED_MODELS.iter().map(|m| (*m).to_owned()).collect(),
            total_installed: 0,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_available(&self, model: &str) -> bool {
        self.available.iter().any(|m| m == model)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_gib(bytes: u64) -> String {
    format!("{:.1}GB", bytes as f64 / GIB)
}

impl<P: LlmProvider + ModelHost + Clone + 'static> Engine<P> {
    async fn host(&self) -> P {
        self.shared.state.read().await.provider.clone()
    }

    /// Supported models present on the host. Never fails; a host error is
    /// reported in [`ModelAvailability::error`].
    pub async fn available_models(&self) -> ModelAvailability {
        match self.host().await.list_models().await {
            Ok(installed) => ModelAvailability::from_installed(&installed),
            Err(e) => {
                tracing::warn!("failed to list models: {e}");
                ModelAvailability::unreachable(e.to_string())
            }
        }
    }

    /// Switch generation to `model`.
    ///
    /// When the index holds chunks, a probe search must succeed before the
    /// switch is committed. On any failure the previous model stays active.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelUnavailable`] if the model is not a
    /// supported installed model, or [`EngineError::SelfTestFailed`] if the
    /// index cannot be queried.
    pub async fn change_model(&self, model: &str) -> Result<()> {
        let availability = self.available_models().await;
        if !availability.is_available(model) {
            return Err(EngineError::ModelUnavailable {
                model: model.to_owned(),
            });
        }

        let mut state = self.shared.state.write().await;
        let previous = state.profile.id.clone();
        let profile = ModelProfile::resolve(model, &self.shared.profile_defaults());
        let candidate = state.provider.with_model(model, profile.generation);

        {
            let index = self.shared.index.read().await;
            let chunks = index
                .count()
                .await
                .map_err(|e| EngineError::SelfTestFailed(e.to_string()))?;
            if chunks > 0 {
                let diagnostics = index.diagnostics().await;
                if !diagnostics.probe_ok {
                    let reason = diagnostics
                        .error
                        .unwrap_or_else(|| "probe search failed".to_owned());
                    tracing::warn!(from = %previous, to = model, "model switch rolled back: {reason}");
                    return Err(EngineError::SelfTestFailed(reason));
                }
            }
        }

        state.provider = candidate;
        state.profile = profile;
        tracing::info!(from = %previous, to = model, "model switched");
        Ok(())
    }

    /// Delete an installed model from the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not installed, is the active model,
    /// or the host refuses the deletion.
    pub async fn remove_model(&self, model: &str) -> Result<()> {
        if !self.available_models().await.is_available(model) {
            return Err(EngineError::ModelNotInstalled {
                model: model.to_owned(),
            });
        }
        if self.current_model().await == model {
            return Err(EngineError::ActiveModelRemoval {
                model: model.to_owned(),
            });
        }
        self.host().await.delete_model(model).await?;
        tracing::info!(model, "model removed");
        Ok(())
    }

    /// Download a model onto the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails.
    pub async fn pull_model(&self, model: &str) -> Result<()> {
        tracing::info!(model, "pulling model");
        self.host().await.pull_model(model).await?;
        tracing::info!(model, "model pulled");
        Ok(())
    }

    #[must_use]
    pub fn model_info(&self, model: &str) -> ModelInfo {
        ModelProfile::resolve(model, &self.shared.profile_defaults()).info
    }

    /// Installed size as reported by the host, else the known estimate,
    /// else `"?GB"`.
    pub async fn model_disk_usage(&self, model: &str) -> String {
        match self.host().await.list_models().await {
            Ok(installed) => {
                if let Some(local) = installed.iter().find(|m| m.name == model) {
                    return format_gib(local.size_bytes);
                }
            }
            Err(e) => tracing::debug!("disk usage falls back to estimate: {e}"),
        }
        ModelProfile::resolve(model, &self.shared.profile_defaults())
            .disk_estimate
            .unwrap_or("?GB")
            .to_owned()
    }
}

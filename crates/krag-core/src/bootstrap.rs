//! Application bootstrap: config resolution, provider and vector store construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use krag_index::VectorStore;
use krag_index::in_memory_store::InMemoryVectorStore;
use krag_index::qdrant_store::QdrantVectorStore;
use krag_index::sqlite_store::SqliteVectorStore;
use krag_llm::ollama::OllamaProvider;

use crate::config::{Config, StoreConfig, VectorBackend};
use crate::engine::Engine;

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Resolve the config path, load the file with env overrides, and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be parsed or is invalid.
    pub fn load(cli_config: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(cli_config);
        let config = Config::load(&config_path)?;
        config.validate()?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self {
            config,
            config_path,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn build_provider(&self) -> OllamaProvider {
        OllamaProvider::new(
            &self.config.llm.base_url,
            self.config.llm.model.clone(),
            self.config.llm.embedding_model.clone(),
        )
    }

    /// Open the vector store, check the host, and start the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store cannot be opened.
    pub async fn build_engine(self) -> anyhow::Result<Engine<OllamaProvider>> {
        let provider = self.build_provider();
        health_check(&provider).await;
        let store = open_store(&self.config.store).await?;
        Ok(Engine::new(self.config, &provider, store))
    }
}

/// Priority: `--config` > `KRAG_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli_config: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_config {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("KRAG_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Open the configured vector store backend.
///
/// # Errors
///
/// Returns an error if the `SQLite` file cannot be opened or the Qdrant
/// client cannot be built.
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        VectorBackend::Sqlite => {
            let path = config.path.to_string_lossy();
            let store = SqliteVectorStore::open(&path)
                .await
                .with_context(|| format!("failed to open vector store at {path}"))?;
            Arc::new(store)
        }
        VectorBackend::Qdrant => Arc::new(
            QdrantVectorStore::new(&config.qdrant_url)
                .with_context(|| format!("failed to create Qdrant client for {}", config.qdrant_url))?,
        ),
        VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
    };
    tracing::info!(backend = %config.backend, collection = %config.collection, "vector store ready");
    Ok(store)
}

pub async fn health_check(provider: &OllamaProvider) {
    match provider.health_check().await {
        Ok(()) => tracing::info!("ollama health check passed"),
        Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use krag_llm::LlmProvider;
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn config_path_priority() {
        unsafe { std::env::remove_var("KRAG_CONFIG") };
        assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));

        unsafe { std::env::set_var("KRAG_CONFIG", "/etc/krag.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/krag.toml"));
        assert_eq!(
            resolve_config_path(Some(Path::new("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        unsafe { std::env::remove_var("KRAG_CONFIG") };
    }

    #[test]
    #[serial]
    fn load_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[index]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap();
        assert!(AppBuilder::load(Some(file.path())).is_err());
    }

    #[test]
    #[serial]
    fn load_missing_file_gives_defaults() {
        let builder = AppBuilder::load(Some(Path::new("/nonexistent/krag.toml"))).unwrap();
        assert_eq!(builder.config().llm.model, "gemma3:1b");
        assert_eq!(builder.config_path(), Path::new("/nonexistent/krag.toml"));
        assert_eq!(builder.build_provider().model(), "gemma3:1b");
    }

    #[tokio::test]
    async fn open_memory_store() {
        let config = StoreConfig {
            backend: VectorBackend::Memory,
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.count("legacy_code").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_sqlite_store_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: VectorBackend::Sqlite,
            path: dir.path().join("nested/krag.db"),
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert!(!store.collection_exists("legacy_code").await.unwrap());
        assert!(dir.path().join("nested/krag.db").exists());
    }
}

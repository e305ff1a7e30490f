use std::path::PathBuf;
use std::str::FromStr;

use super::{Config, VectorBackend};

/// Parse `key` if set; an unparseable value is ignored with a warning.
fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KRAG_OLLAMA_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("KRAG_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("KRAG_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("KRAG_VECTOR_BACKEND") {
            if let Ok(backend) =
                serde_json::from_value::<VectorBackend>(serde_json::Value::String(v.to_lowercase()))
            {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid KRAG_VECTOR_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("KRAG_VECTOR_STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KRAG_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("KRAG_COLLECTION") {
            self.store.collection = v;
        }
        if let Some(size) = parse_env("KRAG_CHUNK_SIZE") {
            self.index.chunk_size = size;
        }
        if let Some(overlap) = parse_env("KRAG_CHUNK_OVERLAP") {
            self.index.chunk_overlap = overlap;
        }
        if let Some(k) = parse_env("KRAG_MAX_RESULTS") {
            self.index.max_results = k;
        }
        if let Ok(v) = std::env::var("KRAG_SOURCE_PATH") {
            self.index.source_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KRAG_DOCS_PATH") {
            self.index.docs_path = PathBuf::from(v);
        }
        if let Some(secs) = parse_env("KRAG_REINDEX_DEBOUNCE_SECS") {
            self.index.reindex_debounce_secs = secs;
        }
        if let Ok(v) = std::env::var("KRAG_DEBUG") {
            match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => self.logging.debug = true,
                "false" | "0" | "no" => self.logging.debug = false,
                _ => tracing::warn!("ignoring invalid KRAG_DEBUG value: {v}"),
            }
        }
    }
}

//! Vector index orchestrator: load → chunk → embed → store, plus retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use krag_llm::LlmProvider;

use crate::chunker::{Chunk, ChunkerConfig, process_documents};
use crate::error::{IndexError, Result};
use crate::loader::{LoaderConfig, load_documents};
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore};

/// Everything a rebuild needs from the active model profile and configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub loader: LoaderConfig,
    pub chunker: ChunkerConfig,
    /// Chunks embedded and inserted per request.
    pub batch_size: usize,
}

/// Summary of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub files_loaded: usize,
    pub files_unreadable: usize,
    pub files_oversized: usize,
    pub chunks_created: usize,
    pub chunks_indexed: usize,
    pub batches_total: usize,
    pub batches_failed: usize,
    pub chunks_failed: usize,
    pub flush_failed: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// The collection was already populated and no rebuild was forced.
    AlreadyIndexed { chunks: u64 },
    Rebuilt(IndexReport),
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub source: String,
    pub filename: String,
    pub category: String,
    pub language: String,
    pub chunk_index: u64,
    pub score: f32,
}

/// Health snapshot of the collection. Never fails; problems land in `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub collection: String,
    pub collection_exists: bool,
    pub count: Option<u64>,
    /// Whether a one-result similarity search succeeded.
    pub probe_ok: bool,
    pub error: Option<String>,
}

/// One named collection in a [`VectorStore`], embedded with `P`.
pub struct VectorIndex<P> {
    store: Arc<dyn VectorStore>,
    provider: P,
    collection: String,
    vector_size: OnceCell<u64>,
}

impl<P> std::fmt::Debug for VectorIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("collection", &self.collection)
            .field("vector_size", &self.vector_size.get())
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> VectorIndex<P> {
    /// Bind to a collection. No request is made until first use.
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, provider: P, collection: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
            vector_size: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Embedding dimension, probed once from the embedding model.
    async fn vector_size(&self) -> Result<u64> {
        self.vector_size
            .get_or_try_init(|| async {
                let probe = self.provider.embed("probe").await?;
                Ok::<_, IndexError>(u64::try_from(probe.len())?)
            })
            .await
            .copied()
    }

    /// Number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count(&self.collection).await?)
    }

    /// Populate the collection unless it already holds chunks and `force` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild cannot start (see [`Self::rebuild`]).
    pub async fn index(&self, force: bool, config: &IndexerConfig) -> Result<IndexOutcome> {
        if !force {
            match self.count().await {
                Ok(chunks) if chunks > 0 => {
                    tracing::info!(chunks, "index already populated, skipping");
                    return Ok(IndexOutcome::AlreadyIndexed { chunks });
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("index count failed, rebuilding: {e}"),
            }
        }
        Ok(IndexOutcome::Rebuilt(self.rebuild(config).await?))
    }

    /// Drop and recreate the collection, then insert every chunk in batches.
    ///
    /// A failed batch is logged and skipped. A failed flush is logged and
    /// reported in [`IndexReport::flush_failed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model cannot be probed, the
    /// collection cannot be recreated, or loading fails outright.
    pub async fn rebuild(&self, config: &IndexerConfig) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let vector_size = self.vector_size().await?;

        self.store.delete_collection(&self.collection).await?;
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await?;

        let loader = config.loader.clone();
        let chunker = config.chunker.clone();
        let (chunks, load_report) = tokio::task::spawn_blocking(move || {
            let (documents, report) = load_documents(&loader)?;
            Ok::<_, IndexError>((process_documents(&documents, &chunker), report))
        })
        .await
        .map_err(|e| IndexError::Other(format!("loader task failed: {e}")))??;

        let mut report = IndexReport {
            files_loaded: load_report.files_loaded,
            files_unreadable: load_report.files_unreadable,
            files_oversized: load_report.files_oversized,
            chunks_created: chunks.len(),
            ..IndexReport::default()
        };

        let batch_size = config.batch_size.max(1);
        report.batches_total = chunks.len().div_ceil(batch_size);
        tracing::info!(
            chunks = chunks.len(),
            batches = report.batches_total,
            batch_size,
            "indexing started"
        );

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            match self.insert_batch(batch).await {
                Ok(()) => {
                    report.chunks_indexed += batch.len();
                    tracing::debug!(
                        batch = i + 1,
                        total = report.batches_total,
                        "batch inserted"
                    );
                }
                Err(e) => {
                    report.batches_failed += 1;
                    report.chunks_failed += batch.len();
                    tracing::warn!(batch = i + 1, size = batch.len(), "batch skipped: {e}");
                }
            }
        }

        if let Err(e) = self.store.flush().await {
            report.flush_failed = true;
            tracing::warn!("vector store flush failed: {e}");
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            indexed = report.chunks_indexed,
            failed = report.chunks_failed,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    async fn insert_batch(&self, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;
        let points = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: chunk_payload(chunk),
            })
            .collect();
        self.store.upsert(&self.collection, points).await?;
        Ok(())
    }

    /// Drop every chunk and leave an empty collection behind.
    ///
    /// The vector size is resolved before anything is dropped, so an
    /// unreachable embedder leaves the collection untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector size cannot be probed or the
    /// collection cannot be dropped or recreated.
    pub async fn clear(&self) -> Result<()> {
        let size = self.vector_size().await?;
        self.store.delete_collection(&self.collection).await?;
        self.store.ensure_collection(&self.collection, size).await?;
        tracing::info!(collection = %self.collection, "index cleared");
        Ok(())
    }

    /// Nearest chunks to `text`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or search fails.
    pub async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        let vector = self.provider.embed(text).await?;
        let limit = u64::try_from(k)?;
        let points = self.store.search(&self.collection, vector, limit).await?;
        Ok(points.into_iter().map(SearchHit::from).collect())
    }

    /// Collection existence, count, and whether a probe search works.
    pub async fn diagnostics(&self) -> Diagnostics {
        let mut diag = Diagnostics {
            collection: self.collection.clone(),
            ..Diagnostics::default()
        };

        match self.store.collection_exists(&self.collection).await {
            Ok(exists) => diag.collection_exists = exists,
            Err(e) => {
                diag.error = Some(e.to_string());
                return diag;
            }
        }
        match self.count().await {
            Ok(n) => diag.count = Some(n),
            Err(e) => {
                diag.error = Some(e.to_string());
                return diag;
            }
        }
        if diag.collection_exists {
            match self.similarity_search("test", 1).await {
                Ok(_) => diag.probe_ok = true,
                Err(e) => diag.error = Some(e.to_string()),
            }
        }
        diag
    }
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("content".into(), serde_json::json!(chunk.content)),
        ("source".into(), serde_json::json!(chunk.source)),
        ("filename".into(), serde_json::json!(chunk.filename)),
        ("category".into(), serde_json::json!(chunk.category.as_str())),
        ("language".into(), serde_json::json!(chunk.language)),
        ("chunk_index".into(), serde_json::json!(chunk.chunk_index)),
        ("content_hash".into(), serde_json::json!(chunk.content_hash)),
    ])
}

impl From<ScoredVectorPoint> for SearchHit {
    fn from(point: ScoredVectorPoint) -> Self {
        let text = |key: &str| {
            point
                .payload
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Self {
            content: text("content"),
            source: text("source"),
            filename: text("filename"),
            category: text("category"),
            language: text("language"),
            chunk_index: point
                .payload
                .get("chunk_index")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or_default(),
            score: point.score,
        }
    }
}

//! The engine facade: one instance owns the active model, the vector index,
//! the source path, the optional watcher, and the indexing worker.

mod models;
mod source;
mod stats;
mod worker;

pub use models::ModelAvailability;
pub use stats::{IndexStatus, Stats, WatcherStatus};
pub use worker::BackgroundStats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use krag_index::{IndexOutcome, IndexReport, IndexerConfig, LoaderConfig, VectorIndex, VectorStore};
use krag_llm::{LlmProvider, ModelHost};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::profile::{ModelProfile, ProfileDefaults};
use crate::query::{
    QueryResponse, format_context, render_prompt, rewrite_question, round_secs, strip_thinking,
};

use self::source::WatcherHandle;
use self::worker::{BackgroundCounters, ReindexRequest};

/// Watcher-triggered requests beyond this many pending are dropped.
const REINDEX_QUEUE: usize = 8;

pub(crate) struct EngineState<P> {
    /// Generation client bound to the active model.
    provider: P,
    profile: ModelProfile,
    source_path: PathBuf,
    watcher: Option<WatcherHandle>,
}

pub(crate) struct Shared<P> {
    config: Config,
    state: RwLock<EngineState<P>>,
    index: RwLock<VectorIndex<P>>,
    last_report: RwLock<Option<IndexReport>>,
    background: Arc<BackgroundCounters>,
}

impl<P: LlmProvider + Clone> Shared<P> {
    fn profile_defaults(&self) -> ProfileDefaults {
        ProfileDefaults::from(&self.config)
    }

    /// Index with the profile and source path active right now.
    async fn run_index(&self, force: bool) -> Result<IndexOutcome> {
        let indexer_config = {
            let state = self.state.read().await;
            IndexerConfig {
                loader: LoaderConfig {
                    source_path: state.source_path.clone(),
                    docs_path: self.config.index.docs_path.clone(),
                    max_file_chars: state.profile.max_file_chars,
                },
                chunker: state.profile.chunker_config(),
                batch_size: state.profile.batch_size,
            }
        };

        let index = self.index.write().await;
        let outcome = index.index(force, &indexer_config).await?;
        if let IndexOutcome::Rebuilt(report) = &outcome {
            *self.last_report.write().await = Some(report.clone());
        }
        Ok(outcome)
    }
}

/// Indexing and retrieval engine over a source tree.
///
/// Rebuilds run on a single worker task, so a watcher-triggered re-index and
/// a foreground [`Engine::index_documents`] never overlap. Queries wait for a
/// running rebuild to finish.
///
/// Dropping the engine closes the request queue, so the worker exits after
/// its current rebuild and takes any watcher down with it. Use
/// [`Engine::shutdown`] to wait for that to happen.
pub struct Engine<P: LlmProvider + ModelHost + Clone + 'static> {
    shared: Arc<Shared<P>>,
    reindex_tx: mpsc::Sender<ReindexRequest>,
    worker: JoinHandle<()>,
}

impl<P: LlmProvider + ModelHost + Clone + 'static> std::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("collection", &self.shared.config.store.collection)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider + ModelHost + Clone + 'static> Engine<P> {
    /// Bind `provider` to the configured model and start the indexing worker.
    ///
    /// Must be called within a Tokio runtime. No network request is made.
    #[must_use]
    pub fn new(config: Config, provider: &P, store: Arc<dyn VectorStore>) -> Self {
        let profile = ModelProfile::resolve(&config.llm.model, &ProfileDefaults::from(&config));
        let provider = provider.with_model(&profile.id, profile.generation);
        let index = VectorIndex::new(store, provider.clone(), config.store.collection.clone());

        tracing::info!(
            model = %profile.id,
            tier = ?profile.tier,
            embedding_model = provider.embedding_model(),
            collection = %config.store.collection,
            "engine initialized"
        );

        let shared = Arc::new(Shared {
            state: RwLock::new(EngineState {
                provider,
                profile,
                source_path: config.index.source_path.clone(),
                watcher: None,
            }),
            index: RwLock::new(index),
            last_report: RwLock::new(None),
            background: Arc::default(),
            config,
        });

        let (reindex_tx, reindex_rx) = mpsc::channel(REINDEX_QUEUE);
        let worker = tokio::spawn(worker::run(Arc::clone(&shared), reindex_rx));

        Self {
            shared,
            reindex_tx,
            worker,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Populate the index unless it is already populated and `force` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild cannot start or the worker has stopped.
    /// Failed batches do not fail the call; they are counted in the report.
    pub async fn index_documents(&self, force: bool) -> Result<IndexOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.reindex_tx
            .send(ReindexRequest {
                force,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| EngineError::WorkerStopped)?;
        reply_rx.await.map_err(|_| EngineError::WorkerStopped)?
    }

    /// Drop every indexed chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be dropped or recreated.
    pub async fn clear_index(&self) -> Result<()> {
        self.shared.index.write().await.clear().await?;
        *self.shared.last_report.write().await = None;
        Ok(())
    }

    /// Answer a question from the indexed chunks with the active model.
    ///
    /// Never fails: an empty index, an unreachable store, or a generation
    /// error all come back as the answer text with no sources.
    pub async fn query(&self, question: &str) -> QueryResponse {
        let (provider, profile) = {
            let state = self.shared.state.read().await;
            (state.provider.clone(), state.profile.clone())
        };
        let index = self.shared.index.read().await;

        match index.count().await {
            Ok(0) => return QueryResponse::no_documents(),
            Ok(_) => {}
            Err(e) => {
                let err = EngineError::IndexUnavailable(e.to_string());
                return QueryResponse::message(err.to_string(), Duration::ZERO);
            }
        }

        let question = rewrite_question(question, profile.tier);
        tracing::debug!(model = %profile.id, k = profile.retrieval_k, %question, "answering");

        let start = Instant::now();
        let result = async {
            let hits = index
                .similarity_search(&question, profile.retrieval_k)
                .await?;
            let prompt = render_prompt(
                profile.tier_config().template,
                &format_context(&hits),
                &question,
            );
            let raw = provider.generate(&prompt).await?;
            Ok::<_, EngineError>((raw, hits))
        }
        .await;

        match result {
            Ok((raw, hits)) => {
                let response = QueryResponse {
                    answer: strip_thinking(&raw),
                    sources: hits.into_iter().map(|h| h.source).collect(),
                    response_time: round_secs(start.elapsed()),
                };
                tracing::info!(
                    sources = response.sources.len(),
                    response_time = response.response_time,
                    "question answered"
                );
                response
            }
            Err(e) => {
                tracing::warn!("query failed: {e}");
                QueryResponse::message(format!("Error: {e}"), start.elapsed())
            }
        }
    }

    pub async fn current_model(&self) -> String {
        self.shared.state.read().await.profile.id.clone()
    }

    pub async fn current_profile(&self) -> ModelProfile {
        self.shared.state.read().await.profile.clone()
    }

    /// Stop the watcher, drain the worker, and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop_auto_reindex().await;
        drop(self.reindex_tx);
        if let Err(e) = self.worker.await {
            tracing::warn!("indexing worker ended abnormally: {e}");
        }
        tracing::info!("engine stopped");
    }
}

#[cfg(test)]
pub(crate) mod engine_tests {
    use std::path::Path;

    use krag_index::in_memory_store::InMemoryVectorStore;
    pub(crate) use krag_llm::mock::MockProvider;
    use tempfile::TempDir;

    use super::*;

    pub(crate) fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A small project: two Python modules, a JS file, and a README in docs.
    pub(crate) fn fixture() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let docs = dir.path().join("docs");
        write(
            &src,
            "billing/invoice.py",
            "class Invoice:\n    def total(self):\n        return sum(l.amount for l in self.lines)\n",
        );
        write(
            &src,
            "auth/login.py",
            "def login(user, password):\n    return check_password(user, password)\n",
        );
        write(&src, "web/app.js", "function render() {\n  return '<div/>';\n}\n");
        write(&docs, "README.md", "# Billing\n\nInvoices are totalled nightly.\n");

        let mut config = Config::default();
        config.index.source_path = src;
        config.index.docs_path = docs;
        (dir, config)
    }

    pub(crate) fn engine(config: Config, provider: &MockProvider) -> Engine<MockProvider> {
        Engine::new(config, provider, Arc::new(InMemoryVectorStore::new()))
    }

    pub(crate) fn installed_provider() -> MockProvider {
        MockProvider::default().with_installed(&["gemma3:1b", "qwen3:0.6b", "gemma3:4b"])
    }
}

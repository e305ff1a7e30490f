use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use krag_index::{IndexWatcher, WatchEvent, WatchStats};
use krag_llm::{LlmProvider, ModelHost};

use super::Engine;
use super::worker::{BackgroundCounters, ReindexRequest};
use crate::error::{EngineError, Result};

/// A running watcher plus the task turning its events into re-index requests.
///
/// The forwarder only holds a weak sender, so a watcher left in the engine
/// state never keeps the indexing worker alive on its own.
pub(crate) struct WatcherHandle {
    watcher: IndexWatcher,
    forwarder: JoinHandle<()>,
}

impl WatcherHandle {
    fn start(
        root: &Path,
        window: Duration,
        reindex_tx: mpsc::WeakSender<ReindexRequest>,
        counters: Arc<BackgroundCounters>,
    ) -> Result<Self> {
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let watcher = IndexWatcher::start(root, window, event_tx).map_err(EngineError::Watcher)?;

        let forwarder = tokio::spawn(async move {
            while let Some(WatchEvent::Reindex { trigger }) = event_rx.recv().await {
                if !forward(&reindex_tx, &counters, &trigger) {
                    break;
                }
            }
        });

        Ok(Self { watcher, forwarder })
    }

    pub(crate) fn root(&self) -> &Path {
        self.watcher.root()
    }

    pub(crate) fn stats(&self) -> WatchStats {
        self.watcher.stats()
    }

    pub(crate) async fn stop(self) -> WatchStats {
        let stats = self.watcher.stop().await;
        if let Err(e) = self.forwarder.await {
            tracing::warn!("watch forwarder ended abnormally: {e}");
        }
        stats
    }
}

/// Queue a background re-index. Returns `false` once the worker is gone.
fn forward(
    reindex_tx: &mpsc::WeakSender<ReindexRequest>,
    counters: &BackgroundCounters,
    trigger: &Path,
) -> bool {
    let Some(tx) = reindex_tx.upgrade() else {
        return false;
    };
    let request = ReindexRequest {
        force: true,
        reply: None,
    };
    match tx.try_send(request) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            counters.record_dropped();
            tracing::warn!(
                trigger = %trigger.display(),
                "re-index queue full, trigger dropped"
            );
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

impl<P: LlmProvider + ModelHost + Clone + 'static> Engine<P> {
    pub async fn current_source_path(&self) -> PathBuf {
        self.shared.state.read().await.source_path.clone()
    }

    pub async fn is_watching(&self) -> bool {
        self.shared.state.read().await.watcher.is_some()
    }

    fn start_watcher(&self, root: &Path) -> Result<WatcherHandle> {
        let window = Duration::from_secs(self.shared.config.index.reindex_debounce_secs);
        WatcherHandle::start(
            root,
            window,
            self.reindex_tx.downgrade(),
            Arc::clone(&self.shared.background),
        )
    }

    /// Point indexing at another directory. An active watcher moves with it.
    ///
    /// The index is not rebuilt; call [`Engine::index_documents`] with
    /// `force` to pick up the new tree. On error the previous path and
    /// watcher stay in place.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or is not a directory, or
    /// if the watcher cannot be restarted on it.
    pub async fn set_source_path(&self, path: &Path) -> Result<()> {
        self.replace_source_path(path, |root| self.start_watcher(root))
            .await
    }

    async fn replace_source_path<F>(&self, path: &Path, start: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<WatcherHandle>,
    {
        if !path.exists() {
            return Err(EngineError::PathNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(EngineError::NotADirectory(path.to_path_buf()));
        }

        let old_watcher = {
            let mut state = self.shared.state.write().await;
            let replacement = if state.watcher.is_some() {
                Some(start(path)?)
            } else {
                None
            };
            let old_path = std::mem::replace(&mut state.source_path, path.to_path_buf());
            tracing::info!(from = %old_path.display(), to = %path.display(), "source path changed");
            replacement.and_then(|new| state.watcher.replace(new))
        };

        if let Some(old) = old_watcher {
            old.stop().await;
        }
        Ok(())
    }

    /// Watch `path` (or the current source path) and re-index on changes.
    /// Any running watcher is stopped first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be watched.
    pub async fn start_auto_reindex(&self, path: Option<&Path>) -> Result<()> {
        self.stop_auto_reindex().await;

        let root = match path {
            Some(p) => p.to_path_buf(),
            None => self.current_source_path().await,
        };
        let handle = self.start_watcher(&root)?;

        let previous = self.shared.state.write().await.watcher.replace(handle);
        // Lost a race with a concurrent start; keep the newest.
        if let Some(previous) = previous {
            previous.stop().await;
        }
        Ok(())
    }

    /// Stop the active watcher. Returns `None` when none was running.
    pub async fn stop_auto_reindex(&self) -> Option<WatchStats> {
        let handle = self.shared.state.write().await.watcher.take()?;
        let stats = handle.stop().await;
        tracing::info!(
            events = stats.events,
            triggered = stats.triggered,
            suppressed = stats.suppressed,
            "auto re-index stopped"
        );
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::super::engine_tests::*;
    use super::*;

    #[tokio::test]
    async fn set_source_path_rejects_missing_path() {
        let (_dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        let before = engine.current_source_path().await;

        let err = engine
            .set_source_path(Path::new("/nonexistent/krag/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PathNotFound(_)));
        assert_eq!(engine.current_source_path().await, before);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn set_source_path_rejects_file() {
        let (dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        let file = dir.path().join("src/web/app.js");

        let err = engine.set_source_path(&file).await.unwrap_err();
        assert!(matches!(err, EngineError::NotADirectory(_)));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn set_source_path_changes_indexed_tree() {
        let (dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        let other = dir.path().join("other");
        write(&other, "main.go", "package main\n\nfunc main() {}\n");

        engine.set_source_path(&other).await.unwrap();
        assert_eq!(engine.current_source_path().await, other);

        let outcome = engine.index_documents(true).await.unwrap();
        let krag_index::IndexOutcome::Rebuilt(report) = outcome else {
            panic!("expected rebuild");
        };
        // main.go plus the README from the docs directory.
        assert_eq!(report.files_loaded, 2);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn stop_without_watcher_is_noop() {
        let (_dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        assert!(engine.stop_auto_reindex().await.is_none());
        assert!(!engine.is_watching().await);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn start_replaces_running_watcher() {
        let (dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());

        engine.start_auto_reindex(None).await.unwrap();
        assert!(engine.is_watching().await);

        let docs = dir.path().join("docs");
        engine.start_auto_reindex(Some(&docs)).await.unwrap();
        let stats = engine.stats().await;
        assert_eq!(stats.watcher.unwrap().root, docs);

        assert!(engine.stop_auto_reindex().await.is_some());
        assert!(!engine.is_watching().await);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn watcher_follows_source_path_change() {
        let (dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        engine.start_auto_reindex(None).await.unwrap();

        let other = dir.path().join("other");
        std::fs::create_dir_all(&other).unwrap();
        engine.set_source_path(&other).await.unwrap();

        let stats = engine.stats().await;
        assert_eq!(stats.watcher.unwrap().root, other);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn failed_watcher_restart_keeps_path_and_watcher() {
        let (dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        engine.start_auto_reindex(None).await.unwrap();
        let before = engine.current_source_path().await;

        let other = dir.path().join("other");
        std::fs::create_dir_all(&other).unwrap();
        let err = engine
            .replace_source_path(&other, |_| {
                Err(EngineError::Watcher(krag_index::IndexError::Other(
                    "watch limit reached".into(),
                )))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Watcher(_)));
        assert_eq!(engine.current_source_path().await, before);
        assert!(engine.is_watching().await);
        assert_eq!(engine.stats().await.watcher.unwrap().root, before);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_counts_dropped_trigger() {
        let (tx, _rx) = mpsc::channel(1);
        let counters = BackgroundCounters::default();
        let weak = tx.downgrade();
        let trigger = Path::new("src/auth/login.py");

        assert!(forward(&weak, &counters, trigger));
        assert!(forward(&weak, &counters, trigger));
        assert_eq!(counters.snapshot().await.dropped, 1);

        drop(tx);
        assert!(!forward(&weak, &counters, trigger));
    }

    #[tokio::test]
    async fn dropped_engine_releases_worker() {
        let (_dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        engine.start_auto_reindex(None).await.unwrap();
        let shared = Arc::downgrade(&engine.shared);
        drop(engine);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while shared.upgrade().is_some() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "engine state still referenced after drop"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn start_on_missing_directory_fails() {
        let (_dir, config) = fixture();
        let engine = engine(config, &MockProvider::default());
        let err = engine
            .start_auto_reindex(Some(Path::new("/nonexistent/krag/watch")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Watcher(_)));
        assert!(!engine.is_watching().await);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn file_change_triggers_background_reindex() {
        let (dir, config) = fixture();
        let provider = MockProvider::default();
        let engine = engine(config, &provider);
        engine.start_auto_reindex(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(
            dir.path().join("src/auth/login.py"),
            "def login(user):\n    return True\n",
        )
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while engine.shared.last_report.read().await.is_none() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "no background re-index within timeout"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let stats = engine.stop_auto_reindex().await.unwrap();
        assert!(stats.triggered >= 1);
        engine.shutdown().await;
    }
}

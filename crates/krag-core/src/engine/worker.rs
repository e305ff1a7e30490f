use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot};

use krag_index::IndexOutcome;
use krag_llm::LlmProvider;

use super::Shared;
use crate::error::Result;

pub(crate) struct ReindexRequest {
    pub(crate) force: bool,
    /// `None` for background requests; their results land in [`BackgroundCounters`].
    pub(crate) reply: Option<oneshot::Sender<Result<IndexOutcome>>>,
}

/// Outcomes of watcher-triggered re-indexes, which have no caller to report to.
#[derive(Debug, Default)]
pub(crate) struct BackgroundCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Snapshot of [`BackgroundCounters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackgroundStats {
    pub completed: u64,
    pub failed: u64,
    /// Triggers discarded because the re-index queue was full.
    pub dropped: u64,
    pub last_error: Option<String>,
}

impl BackgroundCounters {
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    async fn record(&self, result: &Result<IndexOutcome>) {
        match result {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock().await = Some(e.to_string());
            }
        }
    }

    pub(crate) async fn snapshot(&self) -> BackgroundStats {
        BackgroundStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            last_error: self.last_error.lock().await.clone(),
        }
    }
}

/// Serve re-index requests one at a time until every sender is dropped.
pub(super) async fn run<P: LlmProvider + Clone>(
    shared: Arc<Shared<P>>,
    mut rx: mpsc::Receiver<ReindexRequest>,
) {
    while let Some(request) = rx.recv().await {
        let result = shared.run_index(request.force).await;
        match request.reply {
            Some(reply) => {
                // The caller may have given up waiting.
                let _ = reply.send(result);
            }
            None => {
                shared.background.record(&result).await;
                match result {
                    Ok(IndexOutcome::Rebuilt(report)) => {
                        tracing::info!(
                            chunks = report.chunks_indexed,
                            failed = report.chunks_failed,
                            "background re-index finished"
                        );
                    }
                    Ok(IndexOutcome::AlreadyIndexed { .. }) => {}
                    Err(e) => tracing::warn!("background re-index failed: {e}"),
                }
            }
        }
    }
    tracing::debug!("indexing worker stopped");
}

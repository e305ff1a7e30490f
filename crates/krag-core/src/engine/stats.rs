use std::path::PathBuf;

use serde::Serialize;

use krag_index::{Diagnostics, IndexReport, WatchStats};
use krag_llm::{LlmProvider, ModelHost};

use super::Engine;
use super::worker::BackgroundStats;
use crate::profile::ModelInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Ready,
    /// Reachable but holding no chunks.
    Empty,
    /// The store could not be asked.
    Unreachable,
}

impl IndexStatus {
    fn from_diagnostics(diagnostics: &Diagnostics) -> Self {
        match diagnostics.count {
            Some(0) => Self::Empty,
            Some(_) => Self::Ready,
            None => Self::Unreachable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherStatus {
    pub root: PathBuf,
    pub stats: WatchStats,
}

/// Snapshot of the engine for display.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_chunks: u64,
    pub status: IndexStatus,
    pub model: String,
    pub embedding_model: String,
    pub model_info: ModelInfo,
    pub diagnostics: Diagnostics,
    pub last_index: Option<IndexReport>,
    pub watcher: Option<WatcherStatus>,
    /// Watcher-triggered re-index outcomes since the engine started.
    pub background: BackgroundStats,
    pub source_path: PathBuf,
}

impl<P: LlmProvider + ModelHost + Clone + 'static> Engine<P> {
    pub async fn stats(&self) -> Stats {
        let (model, embedding_model, model_info, source_path, watcher) = {
            let state = self.shared.state.read().await;
            (
                state.profile.id.clone(),
                state.provider.embedding_model().to_owned(),
                state.profile.info.clone(),
                state.source_path.clone(),
                state.watcher.as_ref().map(|w| WatcherStatus {
                    root: w.root().to_path_buf(),
                    stats: w.stats(),
                }),
            )
        };
        let diagnostics = self.shared.index.read().await.diagnostics().await;
        let last_index = self.shared.last_report.read().await.clone();
        let background = self.shared.background.snapshot().await;

        Stats {
            total_chunks: diagnostics.count.unwrap_or(0),
            status: IndexStatus::from_diagnostics(&diagnostics),
            model,
            embedding_model,
            model_info,
            diagnostics,
            last_index,
            watcher,
            background,
            source_path,
        }
    }
}

use std::path::PathBuf;

use krag_index::IndexError;
use krag_llm::LlmError;

/// Why an engine operation failed. `Display` is the message shown to users.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model {model} is not available on the host; pull it first")]
    ModelUnavailable { model: String },

    #[error("cannot remove the active model ({model}); switch to another model first")]
    ActiveModelRemoval { model: String },

    #[error("model {model} is not installed")]
    ModelNotInstalled { model: String },

    #[error("model switch rolled back, index self-test failed: {0}")]
    SelfTestFailed(String),

    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("indexing worker stopped")]
    WorkerStopped,

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("failed to start watcher: {0}")]
    Watcher(IndexError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for krag-index.

/// Errors that can occur during loading, indexing, and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk or glob construction failed.
    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// Vector store backend error.
    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    /// LLM provider error (embedding).
    #[error("LLM error: {0}")]
    Llm(#[from] krag_llm::LlmError),

    /// File watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

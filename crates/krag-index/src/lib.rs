//! Indexing and retrieval pipeline: document discovery, model-aware chunking,
//! vector index maintenance, and debounced re-indexing on file changes.
//!
//! Documents are walked from a source and a docs directory, split into
//! overlapping chunks, embedded in batches, and stored in a [`VectorStore`]
//! collection that [`VectorIndex`] rebuilds on demand and queries by similarity.

pub mod chunker;
pub mod error;
pub mod in_memory_store;
pub mod indexer;
pub mod languages;
pub mod loader;
pub mod qdrant_store;
pub mod sqlite_store;
pub mod vector_store;
pub mod watcher;

pub use chunker::{Chunk, ChunkerConfig, TextSplitter, process_documents};
pub use error::{IndexError, Result};
pub use indexer::{Diagnostics, IndexOutcome, IndexReport, IndexerConfig, SearchHit, VectorIndex};
pub use loader::{Document, LoadReport, LoaderConfig, load_documents};
pub use vector_store::{VectorStore, VectorStoreError};
pub use watcher::{DebounceGate, IndexWatcher, WatchEvent, WatchStats};

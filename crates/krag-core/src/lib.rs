//! Configuration, model profiles, query composition, and the engine facade.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod profile;
pub mod query;

pub use config::Config;
pub use engine::{
    BackgroundStats, Engine, IndexStatus, ModelAvailability, Stats, WatcherStatus,
};
pub use error::{EngineError, Result};
pub use profile::{ModelInfo, ModelProfile, ModelTier, SUPPORTED_MODELS};
pub use query::QueryResponse;

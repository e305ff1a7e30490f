//! Per-model tuning: generation options, chunking, retrieval depth and
//! prompt tier.

use krag_index::ChunkerConfig;
use krag_llm::GenerationOptions;
use serde::Serialize;

use crate::config::Config;
use crate::query::{LARGE_TEMPLATE, SMALL_REASONING_TEMPLATE, ULTRA_SMALL_TEMPLATE};

/// Models offered for switching, smallest first.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gemma3:270m",
    "qwen3:0.6b",
    "gemma3:1b",
    "deepseek-r1:1.5b",
    "qwen3:1.7b",
    "qwen2.5:3b",
    "gemma3:4b",
];

const FALLBACK_BATCH_SIZE: usize = 50;
const FALLBACK_MAX_FILE_CHARS: usize = 30_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    UltraSmall,
    SmallReasoning,
    #[default]
    Large,
}

#[derive(Debug)]
pub struct TierConfig {
    /// Chunks retrieved per question.
    pub k: usize,
    /// Prompt with `{context}` and `{question}` placeholders.
    pub template: &'static str,
    /// Apply the keyword rewrites for "how does" / "where is" questions.
    pub terse_rewrites: bool,
}

static ULTRA_SMALL: TierConfig = TierConfig {
    k: 3,
    template: ULTRA_SMALL_TEMPLATE,
    terse_rewrites: true,
};

static SMALL_REASONING: TierConfig = TierConfig {
    k: 4,
    template: SMALL_REASONING_TEMPLATE,
    terse_rewrites: false,
};

static LARGE: TierConfig = TierConfig {
    k: 5,
    template: LARGE_TEMPLATE,
    terse_rewrites: false,
};

impl ModelTier {
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        match model {
            "gemma3:270m" | "qwen3:0.6b" => Self::UltraSmall,
            "gemma3:1b" | "deepseek-r1:1.5b" => Self::SmallReasoning,
            _ => Self::Large,
        }
    }

    #[must_use]
    pub fn config(self) -> &'static TierConfig {
        match self {
            Self::UltraSmall => &ULTRA_SMALL,
            Self::SmallReasoning => &SMALL_REASONING,
            Self::Large => &LARGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkingParams {
    pub size: usize,
    pub overlap: usize,
}

/// Display metadata for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub params: &'static str,
    pub ram_usage: &'static str,
    pub speed: &'static str,
    pub best_for: &'static str,
    pub quality: &'static str,
}

const UNKNOWN_INFO: ModelInfo = ModelInfo {
    params: "Unknown",
    ram_usage: "Unknown",
    speed: "Unknown",
    best_for: "General use",
    quality: "Unknown",
};

struct KnownModel {
    id: &'static str,
    options: GenerationOptions,
    chunking: ChunkingParams,
    batch_size: usize,
    max_file_chars: usize,
    info: ModelInfo,
    disk_estimate: &'static str,
}

const fn options(
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    num_ctx: u64,
) -> GenerationOptions {
    GenerationOptions {
        temperature,
        top_k,
        top_p,
        repeat_penalty,
        num_ctx,
    }
}

const fn info(
    params: &'static str,
    ram_usage: &'static str,
    speed: &'static str,
    best_for: &'static str,
    quality: &'static str,
) -> ModelInfo {
    ModelInfo {
        params,
        ram_usage,
        speed,
        best_for,
        quality,
    }
}

static KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        id: "gemma3:270m",
        options: options(0.2, 20, 0.8, 1.2, 1024),
        chunking: ChunkingParams { size: 600, overlap: 100 },
        batch_size: 25,
        max_file_chars: 15_000,
        info: info("270M", "~1.5GB", "Ultra fast", "Quick prototyping", "Basic"),
        disk_estimate: "0.3GB",
    },
    KnownModel {
        id: "qwen3:0.6b",
        options: options(0.15, 25, 0.85, 1.15, 1536),
        chunking: ChunkingParams { size: 700, overlap: 120 },
        batch_size: 30,
        max_file_chars: 20_000,
        info: info("600M", "~2GB", "Very fast", "Basic analysis", "Good"),
        disk_estimate: "0.6GB",
    },
    KnownModel {
        id: "gemma3:1b",
        options: options(0.1, 30, 0.9, 1.1, 2048),
        chunking: ChunkingParams { size: 800, overlap: 150 },
        batch_size: 40,
        max_file_chars: 25_000,
        info: info("1B", "~3GB", "Fast", "General use", "Good"),
        disk_estimate: "1.0GB",
    },
    KnownModel {
        id: "deepseek-r1:1.5b",
        options: options(0.05, 35, 0.9, 1.1, 2048),
        chunking: ChunkingParams { size: 900, overlap: 180 },
        batch_size: 50,
        max_file_chars: 30_000,
        info: info("1.5B", "~4GB", "Fast", "Complex reasoning", "Very good"),
        disk_estimate: "1.5GB",
    },
    KnownModel {
        id: "qwen3:1.7b",
        options: options(0.1, 35, 0.9, 1.1, 2560),
        chunking: ChunkingParams { size: 1000, overlap: 200 },
        batch_size: 75,
        max_file_chars: 40_000,
        info: info("1.7B", "~4.5GB", "Medium", "Quality analysis", "Very good"),
        disk_estimate: "1.7GB",
    },
    KnownModel {
        id: "qwen2.5:3b",
        options: options(0.1, 40, 0.9, 1.05, 3072),
        chunking: ChunkingParams { size: 1200, overlap: 240 },
        batch_size: 100,
        max_file_chars: 50_000,
        info: info("3B", "~6GB", "Medium", "Complex analysis", "Excellent"),
        disk_estimate: "3.0GB",
    },
    KnownModel {
        id: "gemma3:4b",
        options: options(0.1, 40, 0.95, 1.05, 4096),
        chunking: ChunkingParams { size: 1400, overlap: 280 },
        batch_size: 150,
        max_file_chars: 60_000,
        info: info("4B", "~8GB", "Slowest", "In-depth analysis", "Excellent"),
        disk_estimate: "4.0GB",
    },
];

/// Values an unknown model inherits from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_results: usize,
}

impl From<&Config> for ProfileDefaults {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.index.chunk_size,
            chunk_overlap: config.index.chunk_overlap,
            max_results: config.index.max_results,
        }
    }
}

/// Everything tuned for one generation model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProfile {
    pub id: String,
    pub tier: ModelTier,
    pub generation: GenerationOptions,
    pub chunking: ChunkingParams,
    pub retrieval_k: usize,
    pub batch_size: usize,
    pub max_file_chars: usize,
    pub info: ModelInfo,
    pub disk_estimate: Option<&'static str>,
}

impl ModelProfile {
    /// Look up a model's profile, falling back to one built from `defaults`.
    #[must_use]
    pub fn resolve(id: &str, defaults: &ProfileDefaults) -> Self {
        let tier = ModelTier::for_model(id);
        match KNOWN_MODELS.iter().find(|m| m.id == id) {
            Some(known) => Self {
                id: id.to_owned(),
                tier,
                generation: known.options,
                chunking: known.chunking,
                retrieval_k: tier.config().k,
                batch_size: known.batch_size,
                max_file_chars: known.max_file_chars,
                info: known.info.clone(),
                disk_estimate: Some(known.disk_estimate),
            },
            None => {
                tracing::debug!(model = id, "no tuned profile, using defaults");
                Self {
                    id: id.to_owned(),
                    tier,
                    generation: GenerationOptions::default(),
                    chunking: ChunkingParams {
                        size: defaults.chunk_size,
                        overlap: defaults.chunk_overlap,
                    },
                    retrieval_k: defaults.max_results,
                    batch_size: FALLBACK_BATCH_SIZE,
                    max_file_chars: FALLBACK_MAX_FILE_CHARS,
                    info: UNKNOWN_INFO,
                    disk_estimate: None,
                }
            }
        }
    }

    #[must_use]
    pub fn is_known(id: &str) -> bool {
        KNOWN_MODELS.iter().any(|m| m.id == id)
    }

    #[must_use]
    pub fn tier_config(&self) -> &'static TierConfig {
        self.tier.config()
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::new(self.chunking.size, self.chunking.overlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ProfileDefaults {
        ProfileDefaults {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_results: 5,
        }
    }

    #[test]
    fn tiers_by_model() {
        assert_eq!(ModelTier::for_model("gemma3:270m"), ModelTier::UltraSmall);
        assert_eq!(ModelTier::for_model("qwen3:0.6b"), ModelTier::UltraSmall);
        assert_eq!(ModelTier::for_model("gemma3:1b"), ModelTier::SmallReasoning);
        assert_eq!(ModelTier::for_model("deepseek-r1:1.5b"), ModelTier::SmallReasoning);
        assert_eq!(ModelTier::for_model("qwen2.5:3b"), ModelTier::Large);
        assert_eq!(ModelTier::for_model("llama3:70b"), ModelTier::Large);
    }

    #[test]
    fn tier_retrieval_depth() {
        assert_eq!(ModelTier::UltraSmall.config().k, 3);
        assert_eq!(ModelTier::SmallReasoning.config().k, 4);
        assert_eq!(ModelTier::Large.config().k, 5);
        assert!(ModelTier::UltraSmall.config().terse_rewrites);
        assert!(!ModelTier::Large.config().terse_rewrites);
    }

    #[test]
    fn every_supported_model_has_a_profile() {
        for id in SUPPORTED_MODELS {
            assert!(ModelProfile::is_known(id), "{id} has no profile");
        }
    }

    #[test]
    fn known_profile_values() {
        let p = ModelProfile::resolve("gemma3:270m", &defaults());
        assert_eq!(p.chunking, ChunkingParams { size: 600, overlap: 100 });
        assert_eq!(p.batch_size, 25);
        assert_eq!(p.max_file_chars, 15_000);
        assert_eq!(p.generation.num_ctx, 1024);
        assert_eq!(p.retrieval_k, 3);
        assert_eq!(p.disk_estimate, Some("0.3GB"));

        let p = ModelProfile::resolve("gemma3:4b", &defaults());
        assert_eq!(p.chunking, ChunkingParams { size: 1400, overlap: 280 });
        assert_eq!(p.batch_size, 150);
        assert_eq!(p.generation.num_ctx, 4096);
        assert_eq!(p.info.params, "4B");
    }

    #[test]
    fn unknown_model_uses_defaults() {
        let defaults = ProfileDefaults {
            chunk_size: 1100,
            chunk_overlap: 210,
            max_results: 7,
        };
        let p = ModelProfile::resolve("mistral:7b", &defaults);
        assert_eq!(p.tier, ModelTier::Large);
        assert_eq!(p.chunking, ChunkingParams { size: 1100, overlap: 210 });
        assert_eq!(p.retrieval_k, 7);
        assert_eq!(p.batch_size, 50);
        assert_eq!(p.max_file_chars, 30_000);
        assert_eq!(p.generation, GenerationOptions::default());
        assert_eq!(p.info.params, "Unknown");
        assert!(p.disk_estimate.is_none());
    }

    #[test]
    fn overlap_stays_below_size() {
        for known in KNOWN_MODELS {
            assert!(known.chunking.overlap < known.chunking.size, "{}", known.id);
        }
    }

    #[test]
    fn chunker_config_follows_profile() {
        let cfg = ModelProfile::resolve("qwen2.5:3b", &defaults()).chunker_config();
        assert_eq!(cfg.chunk_size, 1200);
        assert_eq!(cfg.chunk_overlap, 240);
    }

    #[test]
    fn profile_defaults_from_config() {
        let config = Config::default();
        let defaults = ProfileDefaults::from(&config);
        assert_eq!(defaults.chunk_size, 1000);
        assert_eq!(defaults.max_results, 5);
    }
}

//! Prompt composition, question rewriting and answer clean-up.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use krag_index::SearchHit;

use crate::profile::ModelTier;

pub const ULTRA_SMALL_TEMPLATE: &str = "You are an assistant specialized in legacy code analysis.

CODE CONTEXT:
{context}

QUESTION: {question}

If the question is about introducing yourself or the general features of the system, describe your capabilities as a code analysis assistant. If it is technical, use the code provided.

ANSWER:";

pub const SMALL_REASONING_TEMPLATE: &str = "You are an assistant specialized in analyzing legacy systems.

CODE/DOCUMENTATION AVAILABLE:
{context}

USER QUESTION: {question}

INSTRUCTIONS:
- If asked about yourself: explain that you are a code analysis assistant with access to the indexed documents
- If it is a technical question: use the code provided as reference
- If it is about features: explain based on the available files
- Be clear and objective

ANSWER:";

pub const LARGE_TEMPLATE: &str = "You are an intelligent assistant specialized in analyzing legacy code and complex systems.

DOCUMENT CONTEXT:
{context}

QUESTION: {question}

INSTRUCTIONS:
- If asked to introduce yourself: explain your capabilities as a code analysis assistant, how many documents you can access, and how you can help
- If it is a technical question about code: analyze the context provided and answer precisely
- If it is about architecture: explain based on the indexed files
- Always be helpful and technical when appropriate
- Cite specific files when relevant

ANSWER:";

/// Answer returned when the index holds no chunks.
pub const NO_DOCUMENTS_ANSWER: &str = "No documents indexed. Run indexing first.";

const PRESENTATION_KEYWORDS: &[&str] = &[
    "introduce yourself",
    "who are you",
    "what are you",
    "your capabilities",
    "what can you do",
];

static THINKING_TAGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>|<thinking>.*?</thinking>|<thought>.*?</thought>").unwrap()
});

static BLANK_RUNS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());

/// Result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Source path of each retrieved chunk, in retrieval order.
    pub sources: Vec<String>,
    /// Seconds, rounded to two decimals.
    pub response_time: f64,
}

impl QueryResponse {
    #[must_use]
    pub fn no_documents() -> Self {
        Self::message(NO_DOCUMENTS_ANSWER.to_owned(), Duration::ZERO)
    }

    #[must_use]
    pub fn message(answer: String, elapsed: Duration) -> Self {
        Self {
            answer,
            sources: Vec::new(),
            response_time: round_secs(elapsed),
        }
    }
}

/// Rephrase questions small models tend to misread.
#[must_use]
pub fn rewrite_question(question: &str, tier: ModelTier) -> String {
    let lower = question.to_lowercase();

    if PRESENTATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return match tier {
            ModelTier::UltraSmall => "Who are you and how can you help?".to_owned(),
            ModelTier::SmallReasoning | ModelTier::Large => {
                "Introduce yourself as a code analysis assistant and describe your capabilities"
                    .to_owned()
            }
        };
    }

    if tier.config().terse_rewrites {
        if lower.contains("how does") {
            return format!("Explain: {question}");
        }
        if lower.contains("where is") {
            return format!("Locate: {question}");
        }
    }

    question.to_owned()
}

/// Retrieved chunk texts separated by blank lines.
#[must_use]
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[must_use]
pub fn render_prompt(template: &str, context: &str, question: &str) -> String {
    template
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Remove reasoning blocks and collapse runs of blank lines.
#[must_use]
pub fn strip_thinking(text: &str) -> String {
    let without_tags = THINKING_TAGS_RE.replace_all(text, "");
    BLANK_RUNS_RE
        .replace_all(&without_tags, "\n\n")
        .trim()
        .to_owned()
}

#[must_use]
pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

//! Recursive separator-based text splitting with overlap.
//!
//! Text is split on the first separator (in priority order) that occurs in it.
//! Pieces shorter than the chunk size are greedily merged back together with
//! trailing overlap; oversized pieces recurse with the remaining separators,
//! ending at single-character cuts. Lengths are counted in characters.

use std::path::Path;

use crate::languages::{ContentCategory, language_tag};
use crate::loader::Document;

/// Break points tried in order: declaration boundaries, blank lines, lines,
/// words, then characters.
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\nclass ",
    "\n\ndef ",
    "\n\nfunction ",
    "\n\npublic ",
    "\n\nimport ",
    "\n\n",
    "\n",
    " ",
    "",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl ChunkerConfig {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

/// One fragment of a document with the metadata stored alongside its embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub filename: String,
    pub category: ContentCategory,
    pub language: &'static str,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkerConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into chunks of at most `chunk_size` characters.
    ///
    /// A chunk only exceeds the bound when `chunk_size` is zero, since every
    /// piece eventually reduces to single characters.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.config.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_owned());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge_splits(&good));
        }
        chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            if total + len > size && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current) {
                    docs.push(doc);
                }
                while total > overlap || (total + len > size && total > 0) {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }
            current.push_back(split);
            total += len;
        }
        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Split so that each separator occurrence starts a new piece. Empty pieces
/// are dropped; an empty separator splits into characters.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(parts: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn blake3_hex(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Split every document and attach source, filename, category and language.
///
/// Whitespace-only fragments are dropped.
#[must_use]
pub fn process_documents(documents: &[Document], config: &ChunkerConfig) -> Vec<Chunk> {
    let splitter = TextSplitter::new(config.clone());
    let mut chunks = Vec::new();

    for doc in documents {
        let path: &Path = &doc.source;
        let source = path.to_string_lossy().into_owned();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let category = ContentCategory::from_path(path);
        let language = language_tag(path);

        let pieces = splitter
            .split_text(&doc.content)
            .into_iter()
            .filter(|p| !p.trim().is_empty());
        for (chunk_index, content) in pieces.enumerate() {
            chunks.push(Chunk {
                content_hash: blake3_hex(&content),
                content,
                source: source.clone(),
                filename: filename.clone(),
                category,
                language,
                chunk_index,
            });
        }
    }

    tracing::debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "documents chunked"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::*;

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(ChunkerConfig::new(size, overlap))
    }

    fn doc(path: &str, content: &str) -> Document {
        Document {
            content: content.to_owned(),
            source: PathBuf::from(path),
        }
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = splitter(100, 10).split_text("  hello world  ");
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(splitter(100, 10).split_text("").is_empty());
        assert!(splitter(100, 10).split_text("   \n\n ").is_empty());
    }

    #[test]
    fn words_merge_with_overlap() {
        let chunks = splitter(10, 4).split_text("aaa bbb ccc ddd");
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn zero_overlap_does_not_repeat() {
        let chunks = splitter(8, 0).split_text("aaa bbb ccc ddd");
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn prefers_declaration_boundaries() {
        let text = "import os\n\ndef first():\n    return 1\n\ndef second():\n    return 2";
        let chunks = splitter(30, 0).split_text(text);
        assert_eq!(
            chunks,
            vec![
                "import os",
                "def first():\n    return 1",
                "def second():\n    return 2"
            ]
        );
    }

    #[test]
    fn separator_stays_with_following_piece() {
        assert_eq!(
            split_keep_separator("a\nb\nc", "\n"),
            vec!["a", "\nb", "\nc"]
        );
        assert_eq!(split_keep_separator("\nx", "\n"), vec!["\nx"]);
    }

    #[test]
    fn long_word_falls_back_to_character_cuts() {
        let word = "x".repeat(25);
        let chunks = splitter(10, 0).split_text(&word);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), word);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        let text = "héllo wörld ünïcode ßtring";
        for chunk in splitter(8, 2).split_text(text) {
            assert!(chunk.chars().count() <= 8, "{chunk:?}");
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "fn a() {}\n\nfn b() {}\n\n".repeat(50);
        let s = splitter(120, 20);
        assert_eq!(s.split_text(&text), s.split_text(&text));
    }

    #[test]
    fn process_documents_tags_metadata() {
        let docs = vec![
            doc("/repo/app/models.py", "class User:\n    pass"),
            doc("/repo/docs/guide.md", "# Guide"),
            doc("/repo/settings.yaml", "key: value"),
        ];
        let chunks = process_documents(&docs, &ChunkerConfig::default());
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].language, "python");
        assert_eq!(chunks[0].category, ContentCategory::SourceCode);
        assert_eq!(chunks[0].filename, "models.py");
        assert_eq!(chunks[0].source, "/repo/app/models.py");

        assert_eq!(chunks[1].category, ContentCategory::Documentation);
        assert_eq!(chunks[1].language, "unknown");
        assert_eq!(chunks[2].category, ContentCategory::Configuration);
    }

    #[test]
    fn chunk_indices_restart_per_document() {
        let docs = vec![
            doc("/a.py", "one two three four five six"),
            doc("/b.py", "seven eight nine ten"),
        ];
        let chunks = process_documents(&docs, &ChunkerConfig::new(10, 0));
        let a: Vec<_> = chunks
            .iter()
            .filter(|c| c.filename == "a.py")
            .map(|c| c.chunk_index)
            .collect();
        let b: Vec<_> = chunks
            .iter()
            .filter(|c| c.filename == "b.py")
            .map(|c| c.chunk_index)
            .collect();
        assert_eq!(a, (0..a.len()).collect::<Vec<_>>());
        assert_eq!(b, (0..b.len()).collect::<Vec<_>>());
    }

    #[test]
    fn content_hash_tracks_content() {
        let docs = vec![doc("/x.rs", "fn main() {}"), doc("/y.rs", "fn main() {}")];
        let chunks = process_documents(&docs, &ChunkerConfig::default());
        assert_eq!(chunks[0].content_hash, chunks[1].content_hash);
        assert_eq!(chunks[0].content_hash.len(), 64);
    }

    #[test]
    fn smaller_profile_produces_more_chunks() {
        let text = "word ".repeat(600);
        let docs = vec![doc("/big.txt", &text)];
        let small = process_documents(&docs, &ChunkerConfig::new(600, 100));
        let large = process_documents(&docs, &ChunkerConfig::new(1400, 280));
        assert!(small.len() > large.len());
    }

    proptest! {
        #[test]
        fn chunks_never_exceed_size(
            text in "[a-z \n]{0,400}",
            size in 1usize..80,
            overlap_pct in 0usize..100,
        ) {
            let overlap = size * overlap_pct / 100;
            for chunk in splitter(size, overlap).split_text(&text) {
                prop_assert!(chunk.chars().count() <= size);
            }
        }

        #[test]
        fn chunks_are_trimmed_and_nonempty(text in "[a-z \n]{0,300}") {
            for chunk in splitter(40, 8).split_text(&text) {
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
            }
        }
    }
}

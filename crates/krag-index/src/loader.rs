//! Walks the source and documentation directories and reads matching text files.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use serde::Serialize;

use crate::error::Result;
use crate::languages::{DOC_EXTENSIONS, EXCLUDE_GLOBS, SOURCE_EXTENSION_GROUPS};

/// A file's full text plus the path it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub source_path: PathBuf,
    pub docs_path: PathBuf,
    /// Source files with this many characters or more are skipped.
    pub max_file_chars: usize,
}

/// Counts of files read and files skipped during one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_unreadable: usize,
    pub files_oversized: usize,
}

/// Read every matching file from the source and docs directories.
///
/// A directory that does not exist contributes zero documents. Files that
/// cannot be read or are not valid UTF-8 are skipped and counted.
///
/// # Errors
///
/// Returns an error only if the built-in glob patterns fail to compile.
pub fn load_documents(config: &LoaderConfig) -> Result<(Vec<Document>, LoadReport)> {
    let mut documents = Vec::new();
    let mut report = LoadReport::default();

    if config.source_path.is_dir() {
        tracing::info!(path = %config.source_path.display(), "loading source files");
        let source_exts: Vec<&str> = SOURCE_EXTENSION_GROUPS
            .iter()
            .flat_map(|(_, exts)| exts.iter().copied())
            .collect();
        let overrides = build_overrides(&config.source_path, &source_exts, EXCLUDE_GLOBS)?;
        walk_into(
            &config.source_path,
            overrides,
            Some(config.max_file_chars),
            &mut documents,
            &mut report,
        );
    } else {
        tracing::debug!(path = %config.source_path.display(), "source directory missing");
    }

    if config.docs_path.is_dir() {
        tracing::info!(path = %config.docs_path.display(), "loading documentation");
        let overrides = build_overrides(&config.docs_path, DOC_EXTENSIONS, &[])?;
        walk_into(&config.docs_path, overrides, None, &mut documents, &mut report);
    } else {
        tracing::debug!(path = %config.docs_path.display(), "docs directory missing");
    }

    report.files_loaded = documents.len();
    tracing::info!(
        loaded = report.files_loaded,
        unreadable = report.files_unreadable,
        oversized = report.files_oversized,
        "documents loaded"
    );
    Ok((documents, report))
}

fn build_overrides(root: &Path, extensions: &[&str], excludes: &[&str]) -> Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    builder.case_insensitive(true)?;
    for ext in extensions {
        builder.add(&format!("*.{ext}"))?;
    }
    for glob in excludes {
        builder.add(&format!("!{glob}"))?;
    }
    Ok(builder.build()?)
}

fn walk_into(
    root: &Path,
    overrides: Override,
    max_chars: Option<usize>,
    documents: &mut Vec<Document>,
    report: &mut LoadReport,
) {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .overrides(overrides)
        .sort_by_file_name(std::cmp::Ord::cmp)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error under {}: {e}", root.display());
                report.files_unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), "skipping unreadable file: {e}");
                report.files_unreadable += 1;
                continue;
            }
        };

        if let Some(max) = max_chars
            && content.chars().count() >= max
        {
            tracing::debug!(path = %path.display(), max, "skipping oversized file");
            report.files_oversized += 1;
            continue;
        }

        documents.push(Document {
            content,
            source: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
        });
    }
}

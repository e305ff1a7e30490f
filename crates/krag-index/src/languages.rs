//! Extension tables: which files are loaded, how chunks are categorized, and
//! which language tag they carry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Extensions scanned in the source directory, grouped the way they are globbed.
pub const SOURCE_EXTENSION_GROUPS: &[(&str, &[&str])] = &[
    (
        "code",
        &[
            "py", "java", "php", "rb", "go", "cpp", "c", "h", "cs", "kt", "swift", "rs",
        ],
    ),
    ("web", &["js", "ts", "jsx", "tsx", "vue", "html", "css", "scss"]),
    ("data", &["json", "xml", "yaml", "yml"]),
    ("sql", &["sql"]),
    ("settings", &["properties", "conf", "env", "ini"]),
    ("docs", &["md", "txt", "rst"]),
];

/// Extensions scanned in the documentation directory.
pub const DOC_EXTENSIONS: &[&str] = &["md", "txt", "rst"];

/// Paths skipped regardless of extension.
pub const EXCLUDE_GLOBS: &[&str] = &[
    "**/node_modules/**",
    "**/venv/**",
    "**/env/**",
    "**/.git/**",
    "**/build/**",
    "**/dist/**",
    "**/target/**",
    "**/.pytest_cache/**",
    "**/__pycache__/**",
    "**/*.log",
    "**/*.tmp",
];

const CODE_EXTENSIONS: &[&str] = &[
    "py", "java", "js", "ts", "jsx", "tsx", "php", "rb", "go", "cpp", "c", "h", "cs", "kt",
    "swift", "rs",
];

const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "xml"];

/// Coarse content category stored with every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    SourceCode,
    Documentation,
    Configuration,
    Other,
}

impl ContentCategory {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = extension(path) else {
            return Self::Other;
        };
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            Self::SourceCode
        } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
            Self::Documentation
        } else if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
            Self::Configuration
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceCode => "source_code",
            Self::Documentation => "documentation",
            Self::Configuration => "configuration",
            Self::Other => "other",
        }
    }
}

/// Language inferred from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Java,
    JavaScript,
    TypeScript,
    Php,
    Ruby,
    Go,
    Cpp,
    C,
    CSharp,
    Kotlin,
    Swift,
    Rust,
    Html,
    Css,
}

impl Lang {
    /// Identifier stored in chunk payloads.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Go => "go",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::CSharp => "csharp",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::Rust => "rust",
            Self::Html => "html",
            Self::Css => "css",
        }
    }

    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "java" => Some(Self::Java),
            "js" => Some(Self::JavaScript),
            "ts" => Some(Self::TypeScript),
            "php" => Some(Self::Php),
            "rb" => Some(Self::Ruby),
            "go" => Some(Self::Go),
            "cpp" => Some(Self::Cpp),
            "c" | "h" => Some(Self::C),
            "cs" => Some(Self::CSharp),
            "kt" => Some(Self::Kotlin),
            "swift" => Some(Self::Swift),
            "rs" => Some(Self::Rust),
            "html" => Some(Self::Html),
            "css" => Some(Self::Css),
            _ => None,
        }
    }
}

/// Language tag for a path; `"unknown"` when the extension is not in the table.
#[must_use]
pub fn language_tag(path: &Path) -> &'static str {
    extension(path)
        .and_then(|ext| Lang::from_extension(&ext))
        .map_or("unknown", Lang::id)
}

/// Whether a path would be picked up by the source directory scan.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    extension(path).is_some_and(|ext| {
        SOURCE_EXTENSION_GROUPS
            .iter()
            .any(|(_, exts)| exts.contains(&ext.as_str()))
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_file_is_source_code() {
        let path = Path::new("app/models/user.py");
        assert_eq!(language_tag(path), "python");
        assert_eq!(ContentCategory::from_path(path), ContentCategory::SourceCode);
        assert_eq!(ContentCategory::from_path(path).as_str(), "source_code");
    }

    #[test]
    fn header_maps_to_c() {
        assert_eq!(language_tag(Path::new("include/util.h")), "c");
    }

    #[test]
    fn docs_and_config_categories() {
        assert_eq!(
            ContentCategory::from_path(Path::new("README.md")),
            ContentCategory::Documentation
        );
        assert_eq!(
            ContentCategory::from_path(Path::new("config/app.yml")),
            ContentCategory::Configuration
        );
        assert_eq!(
            ContentCategory::from_path(Path::new("schema.sql")),
            ContentCategory::Other
        );
    }

    #[test]
    fn unknown_extension_tags_unknown() {
        assert_eq!(language_tag(Path::new("notes.rst")), "unknown");
        assert_eq!(language_tag(Path::new("Makefile")), "unknown");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(language_tag(Path::new("Legacy.JAVA")), "java");
    }

    #[test]
    fn indexable_covers_every_group() {
        for (_, exts) in SOURCE_EXTENSION_GROUPS {
            for ext in *exts {
                assert!(is_indexable(Path::new(&format!("file.{ext}"))), "{ext}");
            }
        }
        assert!(!is_indexable(Path::new("image.png")));
        assert!(!is_indexable(Path::new("no_extension")));
    }

    #[test]
    fn lang_serde_lowercase() {
        let json = serde_json::to_string(&Lang::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
    }
}

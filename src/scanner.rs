//! Discovery of indexable source files in a checked-out tree.
//!
//! Walks the tree using the `ignore` crate (which respects `.gitignore`,
//! `.ignore`, and skips hidden directories such as `.git`), then keeps the
//! files whose extension is configured for indexing and that match none of
//! the configured ignore patterns. The same filter decides which entries of
//! a revision diff the corpus re-indexes.

use std::path::Path;

use crate::config::Config;
use crate::error::{BugLocatorError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scan root, always `/`-separated.
    pub rel_path: String,
}

/// Which files of a tree are indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFilter {
    /// File extensions without the dot (e.g. `java`).
    pub extensions: Vec<String>,
    /// Glob-ish patterns for paths to skip.
    pub ignore_patterns: Vec<String>,
}

impl FileFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extensions: config.index.file_extensions.clone(),
            ignore_patterns: config.index.ignore.clone(),
        }
    }

    /// Whether a repository-relative path should be indexed.
    pub fn accepts(&self, rel_path: &str) -> bool {
        let has_extension = Path::new(rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        has_extension && !matches_any_pattern(rel_path, &self.ignore_patterns)
    }
}

// ---------------------------------------------------------------------------
// Core scanning
// ---------------------------------------------------------------------------

/// Walk `root` and return every file accepted by `filter`, sorted by path.
pub fn scan(root: &Path, filter: &FileFilter) -> Result<Vec<ScannedFile>> {
    let root = root.canonicalize().map_err(|e| {
        BugLocatorError::io(format!("canonicalizing root '{}'", root.display()), e)
    })?;

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(&root).git_global(false).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        if filter.accepts(&rel_path) {
            files.push(ScannedFile { rel_path });
        }
    }

    // Sort by relative path for deterministic output.
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

// ---------------------------------------------------------------------------
// Pattern matching helpers
// ---------------------------------------------------------------------------

fn matches_any_pattern(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| simple_glob_match(p, path))
}

/// Minimal glob matching for ignore patterns.
///
/// `*` patterns are matched against the file name, `dir/` patterns against
/// any directory component, and plain names against whole path components.
fn simple_glob_match(pattern: &str, path: &str) -> bool {
    if pattern.contains('*') {
        let filename = path.rsplit('/').next().unwrap_or(path);
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut remaining = filename;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                match remaining.strip_prefix(part) {
                    Some(rest) => remaining = rest,
                    None => return false,
                }
            } else if i == parts.len() - 1 {
                return remaining.ends_with(part);
            } else if let Some(pos) = remaining.find(part) {
                remaining = &remaining[pos + part.len()..];
            } else {
                return false;
            }
        }
        true
    } else {
        let component = pattern.trim_end_matches('/');
        path == component
            || path.starts_with(&format!("{component}/"))
            || path.contains(&format!("/{component}/"))
            || (!pattern.ends_with('/') && path.ends_with(&format!("/{component}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

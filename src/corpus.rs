//! A term index bound to one revision of a source tree.
//!
//! [`RevisionedCorpus::open`] indexes every accepted file at a revision.
//! [`RevisionedCorpus::advance_to`] asks the VCS which files changed since
//! the current revision and re-tokenizes only those. A file that fails to
//! tokenize is left out of that step with a warning; other files are not
//! affected. After every step the file and method vectors are recomputed,
//! since any change to the vocabulary moves the IDF table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, TokenizeError};
use crate::git::Vcs;
use crate::index::{Document, TermIndex};
use crate::scanner::{self, FileFilter};
use crate::tokenizer::{ParsedSource, SourceTokenizer};
use crate::weighting::{WeightedVector, WeightingScheme};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Weighted vectors of one file and of each of its methods.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileVectors {
    pub file: WeightedVector,
    pub methods: Vec<WeightedVector>,
}

/// Term index over the source files of one revision.
pub struct RevisionedCorpus {
    vcs: Box<dyn Vcs>,
    tokenizer: Box<dyn SourceTokenizer>,
    filter: FileFilter,
    scheme: WeightingScheme,
    index: TermIndex<String>,
    /// File path → token lists of its methods.
    methods: BTreeMap<String, Vec<Vec<String>>>,
    vectors: BTreeMap<String, FileVectors>,
    revision: Option<String>,
    root: PathBuf,
}

/// Outcome of reading and tokenizing the files of one step.
struct Tokenized {
    parsed: Vec<(String, ParsedSource)>,
    failed: Vec<TokenizeError>,
}

impl RevisionedCorpus {
    pub fn new(
        vcs: Box<dyn Vcs>,
        tokenizer: Box<dyn SourceTokenizer>,
        filter: FileFilter,
        scheme: WeightingScheme,
        min_term_frequency: u64,
    ) -> Self {
        Self {
            vcs,
            tokenizer,
            filter,
            scheme,
            index: TermIndex::new(min_term_frequency),
            methods: BTreeMap::new(),
            vectors: BTreeMap::new(),
            revision: None,
            root: PathBuf::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Revision changes
    // -----------------------------------------------------------------------

    /// Check out `revision` and index the whole tree from scratch.
    pub fn open(&mut self, revision: &str) -> Result<()> {
        let root = self.vcs.checkout(revision)?;
        let files = scanner::scan(&root, &self.filter)?;
        let paths: Vec<String> = files.into_iter().map(|f| f.rel_path).collect();
        let tokenized = self.tokenize_files(&root, &paths);
        for err in &tokenized.failed {
            warn!(%err, "skipping document");
        }

        let mut documents = Vec::with_capacity(tokenized.parsed.len());
        self.methods.clear();
        for (path, parsed) in tokenized.parsed {
            self.methods.insert(path.clone(), parsed.methods);
            documents.push(Document::new(path, parsed.tokens));
        }
        self.index.fit(documents);

        self.root = root;
        self.revision = Some(revision.to_string());
        self.rebuild_vectors();
        info!(
            revision,
            files = self.index.document_count(),
            skipped = tokenized.failed.len(),
            terms = self.index.vocabulary_size(),
            "opened corpus"
        );
        Ok(())
    }

    /// Move to `revision`, re-indexing only the files that changed. Opens
    /// the corpus if no revision is loaded yet.
    pub fn advance_to(&mut self, revision: &str) -> Result<()> {
        let Some(current) = self.revision.clone() else {
            return self.open(revision);
        };
        if current == revision {
            return Ok(());
        }

        let changes = self.vcs.diff(&current, revision)?;
        let root = self.vcs.checkout(revision)?;
        let accepted = |paths: Vec<String>| -> Vec<String> {
            paths.into_iter().filter(|p| self.filter.accepts(p)).collect()
        };
        let added = accepted(changes.added);
        let modified = accepted(changes.modified);
        let mut deleted = accepted(changes.deleted);

        let added = self.tokenize_files(&root, &added);
        for err in &added.failed {
            warn!(%err, "skipping added document");
        }
        let modified = self.tokenize_files(&root, &modified);
        for err in &modified.failed {
            warn!(%err, "dropping modified document");
            deleted.push(err.path.clone());
        }
        let skipped = added.failed.len() + modified.failed.len();

        for path in &deleted {
            self.methods.remove(path);
        }
        let added_docs = self.take_documents(added.parsed);
        let modified_docs = self.take_documents(modified.parsed);
        let (n_added, n_modified) = (added_docs.len(), modified_docs.len());
        self.index.update(added_docs, modified_docs, &deleted);

        self.root = root;
        self.revision = Some(revision.to_string());
        self.rebuild_vectors();
        info!(
            from = %current,
            to = revision,
            added = n_added,
            modified = n_modified,
            deleted = deleted.len(),
            skipped,
            files = self.index.document_count(),
            "advanced corpus"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &TermIndex<String> {
        &self.index
    }

    pub fn scheme(&self) -> WeightingScheme {
        self.scheme
    }

    pub fn tokenizer(&self) -> &dyn SourceTokenizer {
        self.tokenizer.as_ref()
    }

    /// Weight free text (a bug report) against the source index.
    pub fn vectorize_text(&self, text: &str) -> WeightedVector {
        self.index.vectorize(&self.tokenizer.tokenize_text(text), self.scheme)
    }

    pub fn vectors(&self, path: &str) -> Option<&FileVectors> {
        self.vectors.get(path)
    }

    /// Every indexed file with its vectors, in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileVectors)> {
        self.vectors.iter().map(|(path, v)| (path.as_str(), v))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.vectors.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.vectors.len()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn tokenize_files(&self, root: &Path, paths: &[String]) -> Tokenized {
        let tokenizer = self.tokenizer.as_ref();
        let results: Vec<std::result::Result<(String, ParsedSource), TokenizeError>> = paths
            .par_iter()
            .map(|path| -> std::result::Result<(String, ParsedSource), TokenizeError> {
                let raw = std::fs::read(root.join(path))
                    .map_err(|e| TokenizeError::new(path.as_str(), e.to_string()))?;
                let parsed = tokenizer.tokenize_source(path, &raw)?;
                Ok((path.clone(), parsed))
            })
            .collect();

        let mut tokenized = Tokenized {
            parsed: Vec::with_capacity(results.len()),
            failed: Vec::new(),
        };
        for result in results {
            match result {
                Ok(entry) => tokenized.parsed.push(entry),
                Err(err) => tokenized.failed.push(err),
            }
        }
        tokenized
    }

    fn take_documents(&mut self, parsed: Vec<(String, ParsedSource)>) -> Vec<Document<String>> {
        parsed
            .into_iter()
            .map(|(path, source)| {
                self.methods.insert(path.clone(), source.methods);
                Document::new(path, source.tokens)
            })
            .collect()
    }

    fn rebuild_vectors(&mut self) {
        let index = &self.index;
        let scheme = self.scheme;
        let methods = &self.methods;
        let ids: Vec<&String> = index.document_ids().collect();
        self.vectors = ids
            .into_par_iter()
            .filter_map(|path| {
                let file = index.vectorize_document(path, scheme)?;
                let methods = methods
                    .get(path)
                    .map(|bodies| bodies.iter().map(|m| index.vectorize(m, scheme)).collect())
                    .unwrap_or_default();
                Some((path.clone(), FileVectors { file, methods }))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        debug!(files = self.vectors.len(), "rebuilt file vectors");
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// In-memory VCS that materializes named snapshots into a directory.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::{BTreeMap, HashMap};
    use std::path::PathBuf;

    use crate::error::{BugLocatorError, Result};
    use crate::git::{ChangeSet, Vcs};

    pub struct MemoryVcs {
        pub root: PathBuf,
        pub revisions: HashMap<String, BTreeMap<String, Vec<u8>>>,
    }

    impl MemoryVcs {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                revisions: HashMap::new(),
            }
        }

        pub fn with_revision(mut self, name: &str, files: &[(&str, &str)]) -> Self {
            let files = files
                .iter()
                .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
                .collect();
            self.revisions.insert(name.to_string(), files);
            self
        }

        pub fn with_raw_file(mut self, revision: &str, path: &str, content: &[u8]) -> Self {
            self.revisions
                .entry(revision.to_string())
                .or_default()
                .insert(path.to_string(), content.to_vec());
            self
        }

        fn snapshot(&self, revision: &str) -> Result<&BTreeMap<String, Vec<u8>>> {
            self.revisions
                .get(revision)
                .ok_or_else(|| BugLocatorError::git(format!("unknown revision {revision}")))
        }
    }

    impl Vcs for MemoryVcs {
        fn checkout(&self, revision: &str) -> Result<PathBuf> {
            let files = self.snapshot(revision)?;
            if self.root.exists() {
                std::fs::remove_dir_all(&self.root).map_err(|e| BugLocatorError::io("reset", e))?;
            }
            for (path, content) in files {
                let full = self.root.join(path);
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| BugLocatorError::io("mkdir", e))?;
                }
                std::fs::write(&full, content).map_err(|e| BugLocatorError::io("write", e))?;
            }
            std::fs::create_dir_all(&self.root).map_err(|e| BugLocatorError::io("mkdir", e))?;
            Ok(self.root.clone())
        }

        fn diff(&self, from: &str, to: &str) -> Result<ChangeSet> {
            let (old, new) = (self.snapshot(from)?, self.snapshot(to)?);
            let mut changes = ChangeSet::default();
            for (path, content) in new {
                match old.get(path) {
                    None => changes.added.push(path.clone()),
                    Some(prev) if prev != content => changes.modified.push(path.clone()),
                    Some(_) => {}
                }
            }
            changes.deleted = old.keys().filter(|p| !new.contains_key(*p)).cloned().collect();
            Ok(changes)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

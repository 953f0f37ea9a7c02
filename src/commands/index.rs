//! Handler for the `buglocator index` command: index the source tree at one
//! revision and report vocabulary statistics.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::git::GitRepository;

use super::{open_corpus, print_json, with_restored_checkout};

#[derive(Debug)]
pub struct IndexCommandOptions {
    pub root: PathBuf,
    pub revision: String,
    pub config: Config,
    pub json: bool,
    pub quiet: bool,
}

/// Vocabulary statistics of an indexed revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub revision: String,
    pub documents: usize,
    pub methods: usize,
    pub terms: usize,
    pub tokens: u64,
    pub average_length: f64,
}

pub fn run(options: IndexCommandOptions) -> Result<()> {
    let summary = summarize(&options)?;
    if options.json {
        return print_json(&summary, "index summary");
    }

    println!("{}", format!("Index at {}", short(&summary.revision)).bold());
    println!("  documents:       {}", summary.documents);
    println!("  methods:         {}", summary.methods);
    println!("  terms:           {}", summary.terms);
    println!("  tokens:          {}", summary.tokens);
    if !options.quiet {
        println!("  avg. length:     {:.1}", summary.average_length);
    }
    Ok(())
}

/// Check out and index `options.revision`, leaving the repository on the
/// ref it started on.
pub fn summarize(options: &IndexCommandOptions) -> Result<IndexSummary> {
    let repo = GitRepository::open(&options.root)?;
    let revision = repo.resolve(&options.revision)?;
    let mut corpus = open_corpus(&repo, &options.config);

    with_restored_checkout(&repo, || {
        corpus.open(&revision)?;
        let index = corpus.index();
        Ok(IndexSummary {
            revision: revision.clone(),
            documents: index.document_count(),
            methods: corpus.files().map(|(_, v)| v.methods.len()).sum(),
            terms: index.vocabulary_size(),
            tokens: index.total_tokens(),
            average_length: index.average_document_length(),
        })
    })
}

fn short(commit: &str) -> &str {
    commit.get(..10).unwrap_or(commit)
}

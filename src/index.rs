//! Incremental term index: vocabulary, postings, and IDF table.
//!
//! [`TermIndex`] keeps, for every indexed document, its raw term counts and,
//! for every term, the documents it occurs in. A full [`TermIndex::fit`]
//! counts documents in parallel and aggregates serially, so the result does
//! not depend on the worker count or on scheduling. [`TermIndex::update`]
//! subtracts the postings of modified and deleted documents, fits the
//! added and modified ones on their own, and merges that partial index into
//! the main one; unchanged documents are never re-counted.
//!
//! Invariants held after every public mutation:
//! - a term has postings iff some indexed document contains it;
//! - `word_count(t)` equals the sum of `t`'s postings;
//! - the IDF table reflects the current vocabulary and document count.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::weighting::{count_terms, DocumentShape, TermCounts, TermWeight, WeightedVector, WeightingScheme};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A tokenized document ready for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<K> {
    /// Opaque identity: a file path, a bug report id, ...
    pub id: K,
    /// Normalized tokens.
    pub tokens: Vec<String>,
}

impl<K> Document<K> {
    pub fn new(id: K, tokens: Vec<String>) -> Self {
        Self { id, tokens }
    }
}

/// Vocabulary, postings, and IDF table over a set of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct TermIndex<K: Ord> {
    /// Terms with a lower total frequency are dropped by [`TermIndex::fit`].
    min_term_frequency: u64,
    /// Document id → its term counts.
    documents: BTreeMap<K, TermCounts>,
    /// Term → (document id → raw count).
    postings: BTreeMap<String, BTreeMap<K, u32>>,
    /// Term → total occurrences across the corpus.
    word_counts: BTreeMap<String, u64>,
    /// Term → log10(N / df).
    idf: BTreeMap<String, f64>,
    /// Sum of all document lengths.
    total_tokens: u64,
}

impl<K: Ord> Default for TermIndex<K> {
    fn default() -> Self {
        Self::new(0)
    }
}

// ---------------------------------------------------------------------------
// Construction and mutation
// ---------------------------------------------------------------------------

impl<K: Ord> TermIndex<K> {
    /// Create an empty index. `min_term_frequency == 0` keeps every term.
    pub fn new(min_term_frequency: u64) -> Self {
        Self {
            min_term_frequency,
            documents: BTreeMap::new(),
            postings: BTreeMap::new(),
            word_counts: BTreeMap::new(),
            idf: BTreeMap::new(),
            total_tokens: 0,
        }
    }
}

impl<K> TermIndex<K>
where
    K: Ord + Clone + Send + Sync,
{
    /// Rebuild the index from scratch over `documents`.
    ///
    /// Documents are counted in parallel, then folded into the vocabulary
    /// on a single thread. Terms below the configured frequency floor are
    /// dropped before the IDF table is rebuilt. A repeated id replaces the
    /// earlier document with the same id.
    pub fn fit(&mut self, documents: Vec<Document<K>>) {
        let floor = self.min_term_frequency;
        *self = Self::count(documents, floor);
        self.apply_frequency_floor();
        self.recalculate_idf();
        debug!(
            documents = self.document_count(),
            terms = self.vocabulary_size(),
            "fitted term index"
        );
    }

    /// Apply a revision delta.
    ///
    /// `modified` documents are removed and re-inserted with their new
    /// content; `deleted` ids are removed; `added` documents are inserted.
    /// An id must appear in at most one of the three sets. The frequency
    /// floor is not applied to deltas.
    pub fn update(&mut self, added: Vec<Document<K>>, modified: Vec<Document<K>>, deleted: &[K]) {
        for doc in &modified {
            self.remove_document(&doc.id);
        }
        for id in deleted {
            self.remove_document(id);
        }

        let mut delta = added;
        delta.extend(modified);
        let inserted = delta.len();
        let partial = Self::count(delta, 0);
        self.merge(partial);
        self.recalculate_idf();
        debug!(
            inserted,
            deleted = deleted.len(),
            documents = self.document_count(),
            terms = self.vocabulary_size(),
            "updated term index"
        );
    }

    /// Recompute `idf(t) = log10(N / df(t))` for every term.
    pub fn recalculate_idf(&mut self) {
        let n = self.documents.len() as f64;
        self.idf = self
            .postings
            .iter()
            .map(|(term, docs)| (term.clone(), (n / docs.len() as f64).log10()))
            .collect();
    }

    /// Count documents in parallel and aggregate into a fresh index.
    fn count(documents: Vec<Document<K>>, min_term_frequency: u64) -> Self {
        let counted: Vec<(K, TermCounts)> = documents
            .into_par_iter()
            .map(|doc| {
                let counts = count_terms(&doc.tokens);
                (doc.id, counts)
            })
            .collect();

        let mut index = Self::new(min_term_frequency);
        for (id, counts) in counted {
            index.remove_document(&id);
            index.insert_counts(id, counts);
        }
        index
    }

    /// Merge a partial index built over documents absent from `self`.
    fn merge(&mut self, other: Self) {
        for (id, counts) in other.documents {
            self.remove_document(&id);
            self.insert_counts(id, counts);
        }
    }

    fn insert_counts(&mut self, id: K, counts: TermCounts) {
        for (term, &count) in &counts {
            *self.word_counts.entry(term.clone()).or_insert(0) += u64::from(count);
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(id.clone(), count);
            self.total_tokens += u64::from(count);
        }
        self.documents.insert(id, counts);
    }

    /// Subtract a document's postings. Returns false if it was not indexed.
    fn remove_document(&mut self, id: &K) -> bool {
        let Some(counts) = self.documents.remove(id) else {
            return false;
        };
        for (term, count) in counts {
            let count = u64::from(count);
            self.total_tokens -= count;
            if let Some(total) = self.word_counts.get_mut(&term) {
                *total -= count;
                if *total == 0 {
                    self.word_counts.remove(&term);
                }
            }
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    fn apply_frequency_floor(&mut self) {
        if self.min_term_frequency == 0 {
            return;
        }
        let floor = self.min_term_frequency;
        let rare: Vec<String> = self
            .word_counts
            .iter()
            .filter(|(_, total)| **total < floor)
            .map(|(term, _)| term.clone())
            .collect();
        for term in &rare {
            self.word_counts.remove(term);
            if let Some(docs) = self.postings.remove(term) {
                for (id, count) in docs {
                    if let Some(counts) = self.documents.get_mut(&id) {
                        counts.remove(term);
                    }
                    self.total_tokens -= u64::from(count);
                }
            }
        }
        debug!(dropped = rare.len(), floor, "dropped rare terms");
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl<K: Ord> TermIndex<K> {
    /// Weight an arbitrary token sequence against this index.
    ///
    /// Terms never seen by the index get an IDF of 0. Empty content yields
    /// an empty vector with norm 0.
    pub fn vectorize<S: AsRef<str>>(&self, tokens: &[S], scheme: WeightingScheme) -> WeightedVector {
        self.vectorize_counts(&count_terms(tokens), scheme)
    }

    /// Weight an indexed document by id.
    pub fn vectorize_document(&self, id: &K, scheme: WeightingScheme) -> Option<WeightedVector> {
        self.documents
            .get(id)
            .map(|counts| self.vectorize_counts(counts, scheme))
    }

    /// Weight pre-counted terms against this index.
    pub fn vectorize_counts(&self, counts: &TermCounts, scheme: WeightingScheme) -> WeightedVector {
        let shape = DocumentShape::of(counts);
        let avg_doc_len = self.average_document_length();
        let terms = counts
            .iter()
            .map(|(term, &count)| {
                let tf = scheme.tf(count, &shape, avg_doc_len);
                let idf = self.idf(term);
                (
                    term.clone(),
                    TermWeight {
                        tf,
                        idf,
                        weight: tf * idf,
                    },
                )
            })
            .collect();
        WeightedVector::new(terms)
    }

    /// Inverse document frequency of a term, 0 if unseen.
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    pub fn idf_table(&self) -> &BTreeMap<String, f64> {
        &self.idf
    }

    /// Total occurrences of a term across the corpus.
    pub fn word_count(&self, term: &str) -> u64 {
        self.word_counts.get(term).copied().unwrap_or(0)
    }

    pub fn word_counts(&self) -> &BTreeMap<String, u64> {
        &self.word_counts
    }

    /// Number of documents containing a term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, BTreeMap::len)
    }

    pub fn postings(&self, term: &str) -> Option<&BTreeMap<K, u32>> {
        self.postings.get(term)
    }

    pub fn all_postings(&self) -> &BTreeMap<String, BTreeMap<K, u32>> {
        &self.postings
    }

    pub fn document_terms(&self, id: &K) -> Option<&TermCounts> {
        self.documents.get(id)
    }

    pub fn contains_document(&self, id: &K) -> bool {
        self.documents.contains_key(id)
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &K> {
        self.documents.keys()
    }

    /// Number of indexed documents (N).
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of distinct terms.
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn average_document_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_tokens as f64 / self.documents.len() as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Term-weighting schemes and weighted term vectors.
//!
//! A [`WeightingScheme`] turns a raw in-document count into a term
//! frequency; the index then multiplies it by the term's inverse document
//! frequency. Schemes are a closed set matched exhaustively, so only the
//! selected formula is ever evaluated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Raw occurrence counts of each term in one document.
pub type TermCounts = BTreeMap<String, u32>;

/// Term-frequency formula used when vectorizing a document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WeightingScheme {
    /// `tf = count / documentLength`.
    #[default]
    Tfidf,
    /// Augmented frequency: `tf = 0.5 + 0.5 * count / maxCountInDoc`.
    Ntfidf,
    /// Log-weighted: `tf = 1 + log10(count)`.
    Wfidf,
    /// `tf = (1 + log10(count)) / (1 + log10(meanCountInDoc))`.
    Logtfidf,
    /// BM25-style damping normalised by document length.
    Okapi { k1: f64, b: f64 },
}

/// Length statistics of a single document, needed by every scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentShape {
    /// Total number of tokens.
    pub length: u64,
    /// Largest count of any single term.
    pub max_count: u32,
    /// Number of distinct terms.
    pub distinct: usize,
}

impl DocumentShape {
    pub fn of(counts: &TermCounts) -> Self {
        Self {
            length: counts.values().map(|&c| u64::from(c)).sum(),
            max_count: counts.values().copied().max().unwrap_or(0),
            distinct: counts.len(),
        }
    }

    /// Mean count per distinct term.
    pub fn mean_count(&self) -> f64 {
        if self.distinct == 0 {
            0.0
        } else {
            self.length as f64 / self.distinct as f64
        }
    }
}

impl WeightingScheme {
    /// Term frequency of a term occurring `count` times in a document of
    /// the given shape. `avg_doc_len` is only consulted by [`Self::Okapi`].
    pub fn tf(&self, count: u32, shape: &DocumentShape, avg_doc_len: f64) -> f64 {
        if count == 0 || shape.length == 0 {
            return 0.0;
        }
        let count = f64::from(count);
        match *self {
            Self::Tfidf => count / shape.length as f64,
            Self::Ntfidf => 0.5 + 0.5 * count / f64::from(shape.max_count),
            Self::Wfidf => 1.0 + count.log10(),
            Self::Logtfidf => (1.0 + count.log10()) / (1.0 + shape.mean_count().log10()),
            Self::Okapi { k1, b } => {
                let ratio = if avg_doc_len > 0.0 {
                    shape.length as f64 / avg_doc_len
                } else {
                    1.0
                };
                k1 * count / (count + k1 * (1.0 - b + b * ratio))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tfidf => "tfidf",
            Self::Ntfidf => "ntfidf",
            Self::Wfidf => "wfidf",
            Self::Logtfidf => "logtfidf",
            Self::Okapi { .. } => "okapi",
        }
    }
}

/// Count term occurrences in a token sequence.
pub fn count_terms<S: AsRef<str>>(tokens: &[S]) -> TermCounts {
    let mut counts = TermCounts::new();
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            continue;
        }
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Weighted vectors
// ---------------------------------------------------------------------------

/// Weight components of one term in a [`WeightedVector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermWeight {
    pub tf: f64,
    pub idf: f64,
    pub weight: f64,
}

/// Sparse term → weight vector for one document under one scheme.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightedVector {
    terms: BTreeMap<String, TermWeight>,
    norm: f64,
}

impl WeightedVector {
    pub fn new(terms: BTreeMap<String, TermWeight>) -> Self {
        let norm = terms.values().map(|w| w.weight * w.weight).sum::<f64>().sqrt();
        Self { terms, norm }
    }

    pub fn get(&self, term: &str) -> Option<&TermWeight> {
        self.terms.get(term)
    }

    pub fn weight(&self, term: &str) -> f64 {
        self.terms.get(term).map_or(0.0, |w| w.weight)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermWeight)> {
        self.terms.iter().map(|(t, w)| (t.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Euclidean norm of the weights.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Sum of all term weights.
    pub fn total_weight(&self) -> f64 {
        self.terms.values().map(|w| w.weight).sum()
    }

    /// Copy of this vector with every weight divided by the norm, for
    /// callers that want cosine behaviour out of a dot product.
    pub fn normalized(&self) -> Self {
        if self.norm == 0.0 {
            return self.clone();
        }
        let terms = self
            .terms
            .iter()
            .map(|(t, w)| {
                (
                    t.clone(),
                    TermWeight {
                        weight: w.weight / self.norm,
                        ..*w
                    },
                )
            })
            .collect();
        Self::new(terms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

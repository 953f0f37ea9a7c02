//! Collaborative-filtering signal from previously fixed bug reports.
//!
//! For a target report, the training reports most similar to it vote for
//! the files they fixed: each similar report spreads its similarity evenly
//! over its own fixed files, and votes accumulate per file.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use rayon::prelude::*;
use tracing::debug;

use crate::bug_report::{BugReport, SimilarReport};
use crate::index::{Document, TermIndex};
use crate::similarity::vsm;
use crate::tokenizer::SourceTokenizer;
use crate::weighting::{WeightedVector, WeightingScheme};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Report-to-report index over one training set.
pub struct CollaborativeFilter {
    index: TermIndex<u64>,
    scheme: WeightingScheme,
    /// Training report id → (vector, fixed files).
    reports: BTreeMap<u64, (WeightedVector, Vec<String>)>,
    limit: Option<usize>,
}

impl CollaborativeFilter {
    /// Index the text of `training` reports. `limit` caps how many similar
    /// reports vote; `None` lets all of them.
    pub fn new(
        training: &[BugReport],
        tokenizer: &dyn SourceTokenizer,
        scheme: WeightingScheme,
        limit: Option<usize>,
    ) -> Self {
        let documents: Vec<Document<u64>> = training
            .par_iter()
            .map(|r| Document::new(r.id, tokenizer.tokenize_text(&r.text())))
            .collect();
        let mut index = TermIndex::default();
        index.fit(documents);

        let reports = training
            .par_iter()
            .filter_map(|r| {
                let vector = index.vectorize_document(&r.id, scheme)?;
                Some((r.id, (vector, r.fixed_files.clone())))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        debug!(reports = training.len(), "built collaborative index");

        Self {
            index,
            scheme,
            reports,
            limit,
        }
    }

    /// Vectorize report tokens against the report index.
    pub fn vectorize(&self, tokens: &[String]) -> WeightedVector {
        self.index.vectorize(tokens, self.scheme)
    }

    /// Training reports most similar to `vector`, best first, skipping
    /// `exclude` (the target itself when it is part of the training set).
    pub fn similar_reports(&self, vector: &WeightedVector, exclude: u64) -> Vec<SimilarReport> {
        let candidates = self
            .reports
            .iter()
            .filter(|(&id, _)| id != exclude)
            .map(|(&id, (other, _))| SimilarReport {
                report: id,
                similarity: vsm(vector, other),
            });
        top_similar(candidates, self.limit)
    }

    /// Per-file collaborative score for one target report.
    pub fn scores(&self, target: u64, tokens: &[String]) -> BTreeMap<String, f64> {
        let vector = self.vectorize(tokens);
        let similar = self.similar_reports(&vector, target);
        distribute(&similar, |id| {
            self.reports.get(&id).map(|(_, files)| files.as_slice())
        })
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Top-K selection
// ---------------------------------------------------------------------------

/// Heap entry ordered so that "greater" means "more similar"; equal
/// similarities prefer the lower id.
#[derive(Debug, Clone, Copy)]
struct Ranked(SimilarReport);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .similarity
            .total_cmp(&other.0.similarity)
            .then_with(|| other.0.report.cmp(&self.0.report))
    }
}

/// Keep the `limit` most similar reports (all if `None`), best first.
pub fn top_similar(
    candidates: impl Iterator<Item = SimilarReport>,
    limit: Option<usize>,
) -> Vec<SimilarReport> {
    let mut ranked: Vec<Ranked> = match limit {
        None => candidates.map(Ranked).collect(),
        Some(k) => {
            let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
            for candidate in candidates.map(Ranked) {
                if heap.len() < k {
                    heap.push(Reverse(candidate));
                } else if heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
            heap.into_iter().map(|Reverse(r)| r).collect()
        }
    };
    ranked.sort_by(|a, b| b.cmp(a));
    ranked.into_iter().map(|r| r.0).collect()
}

/// Spread each similar report's score over its fixed files and sum per file.
pub fn distribute<'a, F>(similar: &[SimilarReport], fixed_files: F) -> BTreeMap<String, f64>
where
    F: Fn(u64) -> Option<&'a [String]>,
{
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for entry in similar {
        let Some(files) = fixed_files(entry.report) else {
            continue;
        };
        if files.is_empty() {
            continue;
        }
        let share = entry.similarity / files.len() as f64;
        for file in files {
            *scores.entry(file.clone()).or_insert(0.0) += share;
        }
    }
    scores
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::RegexTokenizer;

    fn sim(report: u64, similarity: f64) -> SimilarReport {
        SimilarReport { report, similarity }
    }

    fn report(id: u64, summary: &str, fixed: &[&str]) -> BugReport {
        BugReport {
            id,
            summary: summary.to_string(),
            description: String::new(),
            report_time: 0,
            commit_id: format!("c{id}"),
            commit_time: 0,
            fixed_files: fixed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn distributes_documented_example() {
        let fixed: BTreeMap<u64, Vec<String>> = [
            (1, vec!["x.java".to_string()]),
            (2, vec!["x.java".to_string(), "y.java".to_string()]),
        ]
        .into_iter()
        .collect();
        let scores = distribute(&[sim(1, 0.8), sim(2, 0.4)], |id| {
            fixed.get(&id).map(Vec::as_slice)
        });
        assert!((scores["x.java"] - 1.0).abs() < 1e-12);
        assert!((scores["y.java"] - 0.2).abs() < 1e-12);
        assert!(!scores.contains_key("z.java"));
    }

    #[test]
    fn top_similar_bounds_and_orders() {
        let all = vec![sim(1, 0.2), sim(2, 0.9), sim(3, 0.5), sim(4, 0.9), sim(5, 0.1)];
        let top = top_similar(all.clone().into_iter(), Some(3));
        let ids: Vec<u64> = top.iter().map(|s| s.report).collect();
        assert_eq!(ids, vec![2, 4, 3]);

        let every = top_similar(all.into_iter(), None);
        assert_eq!(every.len(), 5);
        assert_eq!(every.last().unwrap().report, 5);
    }

    #[test]
    fn top_similar_with_zero_limit_is_empty() {
        assert!(top_similar(vec![sim(1, 1.0)].into_iter(), Some(0)).is_empty());
    }

    #[test]
    fn filter_excludes_target_and_scores_fixed_files() {
        let training = vec![
            report(1, "reader crashes on empty buffer", &["src/Reader.java"]),
            report(2, "writer flush loses data", &["src/Writer.java"]),
            report(3, "reader buffer overflow", &["src/Reader.java", "src/Buffer.java"]),
        ];
        let filter = CollaborativeFilter::new(&training, &RegexTokenizer, WeightingScheme::Tfidf, None);
        assert_eq!(filter.len(), 3);

        let tokens = RegexTokenizer.tokenize_text("reader buffer overflow");
        let similar = filter.similar_reports(&filter.vectorize(&tokens), 3);
        assert!(similar.iter().all(|s| s.report != 3));

        let scores = filter.scores(3, &tokens);
        assert!(scores["src/Reader.java"] > 0.0);
        assert_eq!(scores.get("src/Writer.java").copied().unwrap_or(0.0), 0.0);
    }
}

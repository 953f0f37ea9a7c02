//! Candidate generation and feature assembly.
//!
//! For every bug report, every indexed file becomes a candidate with six
//! features: lexical similarity (the better of file and method level), a
//! reserved API slot, the collaborative score, the class-name heuristic,
//! and change recency and frequency at the time the bug was reported.
//!
//! Training and testing treat the features differently. Training collects
//! min/max bounds over every candidate of every report, normalizes only
//! once all reports are done, and keeps the fixed files plus the best
//! negatives up to the candidate cap. Testing normalizes with bounds
//! produced by an earlier training run and keeps every candidate.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::bug_report::BugReport;
use crate::collaborative::CollaborativeFilter;
use crate::config::RankingConfig;
use crate::corpus::{FileVectors, RevisionedCorpus};
use crate::features::{FeatureBounds, FeatureVector};
use crate::history::FileHistories;
use crate::similarity::Similarity;
use crate::weighting::WeightedVector;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How candidates are normalized and how many are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankMode {
    /// Learn bounds from the candidates; cap negatives per report.
    Train,
    /// Normalize with bounds from training; keep everything.
    Test(FeatureBounds),
}

/// One (bug report, file) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bug_id: u64,
    pub file: String,
    /// Whether the fix for the bug touched this file.
    pub is_fixed: bool,
    pub features: FeatureVector,
    /// Learner output, filled in once predictions are attached.
    pub score: f64,
}

/// Candidates of one bug report.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedReport {
    pub bug_id: u64,
    pub candidates: Vec<Candidate>,
}

impl RankedReport {
    pub fn positives(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_fixed).count()
    }
}

/// Bug reports left out of a ranking run, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exclusions {
    /// No fixed files recorded.
    pub no_ground_truth: usize,
    /// Fixed files recorded, but none of them is in the indexed tree.
    pub not_in_tree: usize,
}

impl Exclusions {
    pub fn total(&self) -> usize {
        self.no_ground_truth + self.not_in_tree
    }
}

/// Output of [`CandidateRanker::rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub reports: Vec<RankedReport>,
    /// Bounds learned in training mode, or the ones passed in for testing.
    pub bounds: FeatureBounds,
    pub excluded: Exclusions,
}

impl Ranking {
    pub fn candidate_count(&self) -> usize {
        self.reports.iter().map(|r| r.candidates.len()).sum()
    }
}

/// Scores bug reports against a corpus.
pub struct CandidateRanker<'a> {
    corpus: &'a RevisionedCorpus,
    histories: &'a FileHistories,
    collaborative: &'a CollaborativeFilter,
    settings: RankingConfig,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

impl<'a> CandidateRanker<'a> {
    pub fn new(
        corpus: &'a RevisionedCorpus,
        histories: &'a FileHistories,
        collaborative: &'a CollaborativeFilter,
        settings: &RankingConfig,
    ) -> Self {
        Self {
            corpus,
            histories,
            collaborative,
            settings: settings.clone(),
        }
    }

    /// Produce candidates for every usable report, in input order.
    pub fn rank(&self, reports: &[BugReport], mode: RankMode) -> Ranking {
        let mut excluded = Exclusions::default();
        let usable: Vec<&BugReport> = reports
            .iter()
            .filter(|report| {
                if !report.has_ground_truth() {
                    excluded.no_ground_truth += 1;
                    false
                } else if !report.fixed_files.iter().any(|f| self.corpus.contains(f)) {
                    excluded.not_in_tree += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        if excluded.total() > 0 {
            info!(
                no_ground_truth = excluded.no_ground_truth,
                not_in_tree = excluded.not_in_tree,
                "excluded bug reports"
            );
        }

        let scored: Vec<(RankedReport, FeatureBounds)> = usable
            .par_iter()
            .map(|report| {
                let candidates = self.candidates_for(report);
                let mut bounds = FeatureBounds::default();
                candidates.iter().for_each(|c| bounds.observe(&c.features));
                let candidates = match mode {
                    RankMode::Train => {
                        select_training_candidates(candidates, self.settings.candidate_cap)
                    }
                    RankMode::Test(_) => candidates,
                };
                (
                    RankedReport {
                        bug_id: report.id,
                        candidates,
                    },
                    bounds,
                )
            })
            .collect();

        let learned = scored
            .iter()
            .fold(FeatureBounds::default(), |acc, (_, b)| acc.merge(*b));
        let bounds = match mode {
            RankMode::Train => learned,
            RankMode::Test(bounds) => bounds,
        };

        let mut ranked: Vec<RankedReport> = scored.into_iter().map(|(r, _)| r).collect();
        ranked.par_iter_mut().for_each(|report| {
            for candidate in &mut report.candidates {
                candidate.features = bounds.normalize(&candidate.features);
            }
        });

        let ranking = Ranking {
            reports: ranked,
            bounds,
            excluded,
        };
        info!(
            reports = ranking.reports.len(),
            candidates = ranking.candidate_count(),
            train = matches!(mode, RankMode::Train),
            "ranked bug reports"
        );
        ranking
    }

    /// Raw (unnormalized) candidates for one report, in file path order.
    fn candidates_for(&self, report: &BugReport) -> Vec<Candidate> {
        let tokens = self.corpus.tokenizer().tokenize_text(&report.text());
        let query = self.corpus.index().vectorize(&tokens, self.corpus.scheme());
        let collaborative = self.collaborative.scores(report.id, &tokens);

        let candidates: Vec<Candidate> = self
            .corpus
            .files()
            .map(|(path, vectors)| {
                let (recency, frequency) = self.histories.signals(path, report.report_time);
                let features = [
                    content_score(
                        &query,
                        vectors,
                        self.settings.similarity,
                        self.settings.method_similarity,
                    ),
                    0.0,
                    collaborative.get(path).copied().unwrap_or(0.0),
                    class_name_score(&report.summary, path),
                    recency,
                    frequency,
                ];
                Candidate {
                    bug_id: report.id,
                    file: path.to_string(),
                    is_fixed: report.is_fixed_file(path),
                    features,
                    score: 0.0,
                }
            })
            .collect();
        debug!(bug = report.id, candidates = candidates.len(), "generated candidates");
        candidates
    }
}

// ---------------------------------------------------------------------------
// Feature helpers
// ---------------------------------------------------------------------------

/// Best lexical match between the report and the file or any of its
/// methods.
pub fn content_score(
    query: &WeightedVector,
    file: &FileVectors,
    similarity: Similarity,
    use_methods: bool,
) -> f64 {
    let whole = similarity.score(query, &file.file);
    if !use_methods {
        return whole;
    }
    file.methods
        .iter()
        .map(|m| similarity.score(query, m))
        .fold(whole, f64::max)
}

/// Simple class name of a path: the file stem after the last `/` or `.`.
pub fn class_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    stem.rsplit('.').next().unwrap_or(stem)
}

/// Length of the class name if the summary mentions it (ignoring case).
pub fn class_name_score(summary: &str, path: &str) -> f64 {
    let name = class_name(path);
    if name.is_empty() {
        return 0.0;
    }
    if summary.to_lowercase().contains(&name.to_lowercase()) {
        name.chars().count() as f64
    } else {
        0.0
    }
}

/// Keep every fixed file plus the negatives with the highest content
/// score, up to `cap` candidates in total (more if positives alone exceed
/// it). The result is ordered by content score, highest first.
pub fn select_training_candidates(mut candidates: Vec<Candidate>, cap: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.features[0].total_cmp(&a.features[0]));
    let positives = candidates.iter().filter(|c| c.is_fixed).count();
    let mut room = cap.saturating_sub(positives);
    candidates.retain(|c| {
        if c.is_fixed {
            true
        } else if room > 0 {
            room -= 1;
            true
        } else {
            false
        }
    });
    candidates
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

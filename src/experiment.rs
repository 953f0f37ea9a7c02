//! Fold-by-fold train/test evaluation.
//!
//! For every consecutive pair of folds `(i, i + 1)`: the corpus is moved to
//! fold `i`'s checkpoint and fold `i` is ranked in training mode; its
//! bounds are persisted and the external learner is trained. The corpus
//! then advances to fold `i + 1`'s checkpoint, the persisted bounds are
//! read back, fold `i + 1` is ranked in test mode, scored by the learner,
//! and evaluated.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::bug_report::BugReport;
use crate::collaborative::CollaborativeFilter;
use crate::config::Config;
use crate::corpus::RevisionedCorpus;
use crate::dataset;
use crate::error::Result;
use crate::features::FeatureBounds;
use crate::folds::{self, Fold};
use crate::history::FileHistories;
use crate::learner::RankLearner;
use crate::metrics::Metrics;
use crate::ranker::{CandidateRanker, RankMode, Ranking};

/// Outcome of one train/test pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldOutcome {
    /// Index of the tested fold.
    pub fold: usize,
    pub train_reports: usize,
    pub test_reports: usize,
    /// Test reports excluded for missing ground truth.
    pub excluded: usize,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentReport {
    pub folds: Vec<FoldOutcome>,
    pub overall: Metrics,
}

/// Files written for one fold.
struct FoldFiles {
    train: PathBuf,
    bounds: PathBuf,
    model: PathBuf,
    test: PathBuf,
    scores: PathBuf,
}

impl FoldFiles {
    fn new(work_dir: &Path, fold: usize) -> Self {
        let dir = work_dir.join(format!("fold{fold}"));
        Self {
            train: dir.join("train.txt"),
            bounds: dir.join("bounds.txt"),
            model: dir.join("model.txt"),
            test: dir.join("test.txt"),
            scores: dir.join("scores.txt"),
        }
    }
}

pub struct Experiment<'a> {
    config: &'a Config,
    corpus: RevisionedCorpus,
    histories: FileHistories,
    learner: &'a dyn RankLearner,
    work_dir: PathBuf,
}

impl<'a> Experiment<'a> {
    pub fn new(
        config: &'a Config,
        corpus: RevisionedCorpus,
        histories: FileHistories,
        learner: &'a dyn RankLearner,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            corpus,
            histories,
            learner,
            work_dir: work_dir.into(),
        }
    }

    /// Split `reports` into the configured number of folds and evaluate
    /// every consecutive pair.
    pub fn run(&mut self, reports: &[BugReport]) -> Result<ExperimentReport> {
        let folds = folds::split(reports, self.config.experiment.folds)?;
        if folds.len() < 2 {
            warn!("a single fold leaves nothing to test on");
        }

        let mut outcomes = Vec::new();
        for i in 0..folds.len().saturating_sub(1) {
            let (train, test) = (&folds[i], &folds[i + 1]);
            if train.is_empty() || test.is_empty() {
                info!(fold = i, "skipping empty fold pair");
                continue;
            }
            if let Some(outcome) = self.run_pair(i, train, test)? {
                info!(
                    fold = outcome.fold,
                    acc1 = outcome.metrics.accuracy[0],
                    mrr = outcome.metrics.mrr,
                    map = outcome.metrics.map,
                    "evaluated fold"
                );
                outcomes.push(outcome);
            }
        }

        let parts: Vec<Metrics> = outcomes.iter().map(|o| o.metrics).collect();
        Ok(ExperimentReport {
            overall: Metrics::combine(&parts),
            folds: outcomes,
        })
    }

    /// Train on `train`, test on `test`. `None` when training produced no
    /// candidates.
    fn run_pair(&mut self, i: usize, train: &Fold, test: &Fold) -> Result<Option<FoldOutcome>> {
        let files = FoldFiles::new(&self.work_dir, i);
        let ranking_config = &self.config.ranking;

        self.corpus.advance_to(&train.checkpoint)?;
        let collaborative = CollaborativeFilter::new(
            &train.reports,
            self.corpus.tokenizer(),
            self.config.index.report_scheme,
            ranking_config.similar_reports,
        );
        let training =
            CandidateRanker::new(&self.corpus, &self.histories, &collaborative, ranking_config)
                .rank(&train.reports, RankMode::Train);
        if training.candidate_count() == 0 {
            warn!(fold = i, "no training candidates; skipping fold");
            return Ok(None);
        }
        dataset::write_feature_file(&training, ranking_config.positive_label, &files.train)?;
        training.bounds.save(&files.bounds)?;
        self.learner.train(&files.train, &files.model)?;

        self.corpus.advance_to(&test.checkpoint)?;
        let bounds = FeatureBounds::load(&files.bounds)?;
        let mut testing: Ranking =
            CandidateRanker::new(&self.corpus, &self.histories, &collaborative, ranking_config)
                .rank(&test.reports, RankMode::Test(bounds));
        dataset::write_feature_file(&testing, ranking_config.positive_label, &files.test)?;
        self.learner.predict(&files.model, &files.test, &files.scores)?;
        let scores = dataset::read_scores(&files.scores)?;
        dataset::attach_scores(&mut testing, &scores, &format!("fold {} predictions", i + 1))?;

        Ok(Some(FoldOutcome {
            fold: i + 1,
            train_reports: training.reports.len(),
            test_reports: testing.reports.len(),
            excluded: testing.excluded.total(),
            metrics: Metrics::evaluate(&testing),
        }))
    }

    pub fn corpus(&self) -> &RevisionedCorpus {
        &self.corpus
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::corpus::fixtures::MemoryVcs;
    use crate::error::BugLocatorError;
    use crate::scanner::FileFilter;
    use crate::tokenizer::RegexTokenizer;
    use crate::weighting::WeightingScheme;

    /// Scores each test line by its content feature.
    struct ContentLearner;

    impl RankLearner for ContentLearner {
        fn train(&self, features: &Path, model: &Path) -> Result<()> {
            std::fs::copy(features, model).map_err(|e| BugLocatorError::io("copy", e))?;
            Ok(())
        }

        fn predict(&self, _model: &Path, features: &Path, scores: &Path) -> Result<()> {
            let text =
                std::fs::read_to_string(features).map_err(|e| BugLocatorError::io("read", e))?;
            let out: String = text
                .lines()
                .map(|line| {
                    let field = line.split(' ').nth(2).unwrap();
                    let value = field.strip_prefix("1:").unwrap();
                    format!("{value}\n")
                })
                .collect();
            std::fs::write(scores, out).map_err(|e| BugLocatorError::io("write", e))
        }
    }

    /// Drops the last score.
    struct ShortLearner;

    impl RankLearner for ShortLearner {
        fn train(&self, _features: &Path, _model: &Path) -> Result<()> {
            Ok(())
        }

        fn predict(&self, _model: &Path, features: &Path, scores: &Path) -> Result<()> {
            let lines = std::fs::read_to_string(features).unwrap().lines().count();
            std::fs::write(scores, "0\n".repeat(lines - 1)).unwrap();
            Ok(())
        }
    }

    fn source(class: &str, method: &str) -> String {
        format!("class {class} {{\n    void {method}() {{\n        {method}();\n    }}\n}}\n")
    }

    fn report(id: u64, summary: &str, fixed: &str, time: i64) -> BugReport {
        BugReport {
            id,
            summary: summary.to_string(),
            description: String::new(),
            report_time: time - 50,
            commit_id: format!("c{id}"),
            commit_time: time,
            fixed_files: vec![fixed.to_string()],
        }
    }

    fn setup(dir: &Path) -> (Config, RevisionedCorpus, Vec<BugReport>) {
        let reader = source("Reader", "readBuffer");
        let writer = source("Writer", "flushOutput");
        let cache = source("Cache", "evictEntry");
        let files: Vec<(&str, &str)> = vec![
            ("src/Reader.java", reader.as_str()),
            ("src/Writer.java", writer.as_str()),
            ("src/Cache.java", cache.as_str()),
        ];
        let vcs = ["c1", "c2", "c3", "c4"]
            .iter()
            .fold(MemoryVcs::new(dir.join("tree")), |vcs, rev| vcs.with_revision(rev, &files));
        let corpus = RevisionedCorpus::new(
            Box::new(vcs),
            Box::new(RegexTokenizer),
            FileFilter {
                extensions: vec!["java".into()],
                ignore_patterns: Vec::new(),
            },
            WeightingScheme::Tfidf,
            0,
        );
        let reports = vec![
            report(1, "Reader fails to read buffer", "src/Reader.java", 100),
            report(2, "Writer does not flush output", "src/Writer.java", 200),
            report(3, "Cache cannot evict entry", "src/Cache.java", 300),
            report(4, "Reader buffer corrupted", "src/Reader.java", 400),
        ];
        let mut config = Config::default();
        config.experiment.folds = 2;
        (config, corpus, reports)
    }

    #[test]
    fn runs_fold_pairs_and_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (config, corpus, reports) = setup(dir.path());
        let work = dir.path().join("work");
        let mut experiment = Experiment::new(
            &config,
            corpus,
            FileHistories::new(HashMap::new()),
            &ContentLearner,
            &work,
        );

        let outcome = experiment.run(&reports).unwrap();
        assert_eq!(outcome.folds.len(), 1);
        let fold = &outcome.folds[0];
        assert_eq!(fold.fold, 1);
        assert_eq!(fold.train_reports, 2);
        assert_eq!(fold.test_reports, 2);
        assert_eq!(fold.metrics.accuracy[0], 1.0);
        assert_eq!(outcome.overall, fold.metrics);

        assert!(work.join("fold0/train.txt").exists());
        assert!(work.join("fold0/bounds.txt").exists());
        assert_eq!(
            std::fs::read_to_string(work.join("fold0/test.txt")).unwrap().lines().count(),
            6
        );
        assert_eq!(experiment.corpus().revision(), Some("c4"));
    }

    #[test]
    fn score_count_mismatch_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (config, corpus, reports) = setup(dir.path());
        let mut experiment = Experiment::new(
            &config,
            corpus,
            FileHistories::default(),
            &ShortLearner,
            dir.path().join("work"),
        );
        let err = experiment.run(&reports).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("fold 1 predictions"));
    }
}

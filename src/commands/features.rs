//! Handler for the `buglocator features` command: rank one bug-report file
//! against one revision and write the learner's feature file.
//!
//! In train mode the normalization bounds observed here are saved next to
//! the feature file; in test mode previously saved bounds are applied.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::bug_report;
use crate::cli::FeatureMode;
use crate::collaborative::CollaborativeFilter;
use crate::config::Config;
use crate::dataset;
use crate::error::Result;
use crate::features::FeatureBounds;
use crate::git::GitRepository;
use crate::ranker::{CandidateRanker, RankMode};

use super::{load_histories, open_corpus, print_json, with_restored_checkout};

#[derive(Debug)]
pub struct FeaturesCommandOptions {
    pub root: PathBuf,
    pub reports: PathBuf,
    pub revision: String,
    pub mode: FeatureMode,
    pub out: PathBuf,
    pub bounds: PathBuf,
    pub training: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub config: Config,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturesSummary {
    pub revision: String,
    pub reports: usize,
    pub candidates: usize,
    pub excluded_no_ground_truth: usize,
    pub excluded_not_in_tree: usize,
    pub feature_file: PathBuf,
    pub bounds_file: PathBuf,
}

pub fn run(options: FeaturesCommandOptions) -> Result<()> {
    let summary = generate(&options)?;
    if options.json {
        return print_json(&summary, "feature summary");
    }

    println!(
        "{} Wrote {} candidates for {} reports to {}",
        "ok".green().bold(),
        summary.candidates,
        summary.reports,
        summary.feature_file.display()
    );
    if options.mode == FeatureMode::Train {
        println!(
            "{} Saved bounds to {}",
            "ok".green().bold(),
            summary.bounds_file.display()
        );
    }
    let excluded = summary.excluded_no_ground_truth + summary.excluded_not_in_tree;
    if excluded > 0 && !options.quiet {
        println!(
            "  {} reports excluded ({} without fixed files, {} with fixed files missing from the tree)",
            excluded.to_string().yellow(),
            summary.excluded_no_ground_truth,
            summary.excluded_not_in_tree
        );
    }
    Ok(())
}

/// Rank `options.reports` at `options.revision` and write the feature file.
pub fn generate(options: &FeaturesCommandOptions) -> Result<FeaturesSummary> {
    let config = &options.config;
    let repo = GitRepository::open(&options.root)?;
    let revision = repo.resolve(&options.revision)?;
    let reports = bug_report::load_bug_reports(&options.reports)?;
    let training = match &options.training {
        Some(path) => bug_report::load_bug_reports(path)?,
        None => reports.clone(),
    };
    let mode = match options.mode {
        FeatureMode::Train => RankMode::Train,
        FeatureMode::Test => RankMode::Test(FeatureBounds::load(&options.bounds)?),
    };
    let histories = load_histories(&repo, options.history.as_deref())?;
    let mut corpus = open_corpus(&repo, config);

    with_restored_checkout(&repo, || {
        corpus.open(&revision)?;
        let collaborative = CollaborativeFilter::new(
            &training,
            corpus.tokenizer(),
            config.index.report_scheme,
            config.ranking.similar_reports,
        );
        let ranking = CandidateRanker::new(&corpus, &histories, &collaborative, &config.ranking)
            .rank(&reports, mode);

        let candidates =
            dataset::write_feature_file(&ranking, config.ranking.positive_label, &options.out)?;
        if options.mode == FeatureMode::Train {
            ranking.bounds.save(&options.bounds)?;
        }

        Ok(FeaturesSummary {
            revision: revision.clone(),
            reports: ranking.reports.len(),
            candidates,
            excluded_no_ground_truth: ranking.excluded.no_ground_truth,
            excluded_not_in_tree: ranking.excluded.not_in_tree,
            feature_file: options.out.clone(),
            bounds_file: options.bounds.clone(),
        })
    })
}

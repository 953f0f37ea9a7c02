//! Handler for the `buglocator experiment` command.

use std::path::PathBuf;

use colored::Colorize;

use crate::bug_report;
use crate::config::Config;
use crate::error::Result;
use crate::experiment::{Experiment, ExperimentReport};
use crate::git::GitRepository;
use crate::learner::ExternalLearner;
use crate::metrics::{Metrics, ACCURACY_CUTOFFS};

use super::{load_histories, open_corpus, print_json, resolve_work_dir, with_restored_checkout};

#[derive(Debug)]
pub struct ExperimentCommandOptions {
    pub root: PathBuf,
    pub reports: PathBuf,
    pub history: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub config: Config,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: ExperimentCommandOptions) -> Result<()> {
    let config = &options.config;
    let repo = GitRepository::open(&options.root)?;
    let reports = bug_report::load_bug_reports(&options.reports)?;
    let histories = load_histories(&repo, options.history.as_deref())?;
    let work_dir = match &options.work_dir {
        Some(dir) => dir.clone(),
        None => resolve_work_dir(&options.root, &config.experiment.work_dir),
    };
    let learner = ExternalLearner::from_config(&config.learner);
    let corpus = open_corpus(&repo, config);

    let report = with_restored_checkout(&repo, || {
        Experiment::new(config, corpus, histories, &learner, &work_dir).run(&reports)
    })?;

    if options.json {
        return print_json(&report, "experiment report");
    }
    print_report(&report, options.quiet);
    Ok(())
}

fn print_report(report: &ExperimentReport, quiet: bool) {
    if !quiet {
        println!("{}", "Per fold:".bold());
        for fold in &report.folds {
            println!(
                "  fold {:>2}  {:>5} reports  {}",
                fold.fold,
                fold.test_reports,
                format_metrics(&fold.metrics)
            );
            if fold.excluded > 0 {
                println!("           {} excluded", fold.excluded.to_string().yellow());
            }
        }
        println!();
    }
    if report.folds.is_empty() {
        println!("{}", "No fold pair produced results.".dimmed());
        return;
    }
    println!(
        "{}  {:>5} reports  {}",
        "Overall".bold(),
        report.overall.reports,
        format_metrics(&report.overall)
    );
}

fn format_metrics(metrics: &Metrics) -> String {
    let accuracy: Vec<String> = ACCURACY_CUTOFFS
        .iter()
        .zip(metrics.accuracy)
        .map(|(k, a)| format!("acc@{k} {a:.3}"))
        .collect();
    format!(
        "{}  MRR {:.3}  MAP {:.3}",
        accuracy.join("  "),
        metrics.mrr,
        metrics.map
    )
}

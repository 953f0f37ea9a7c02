//! Handler for the `buglocator split` command.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::bug_report;
use crate::error::Result;
use crate::folds::{self, Fold};

use super::print_json;

#[derive(Debug)]
pub struct SplitCommandOptions {
    pub reports: PathBuf,
    pub folds: usize,
    pub json: bool,
    pub quiet: bool,
}

/// One fold as printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldSummary {
    pub fold: usize,
    pub reports: usize,
    pub checkpoint: String,
    pub first_commit_time: Option<i64>,
    pub last_commit_time: Option<i64>,
    pub bug_ids: Vec<u64>,
}

impl FoldSummary {
    fn new(index: usize, fold: &Fold) -> Self {
        Self {
            fold: index,
            reports: fold.len(),
            checkpoint: fold.checkpoint.clone(),
            first_commit_time: fold.reports.first().map(|r| r.commit_time),
            last_commit_time: fold.reports.last().map(|r| r.commit_time),
            bug_ids: fold.reports.iter().map(|r| r.id).collect(),
        }
    }
}

pub fn run(options: SplitCommandOptions) -> Result<()> {
    let reports = bug_report::load_bug_reports(&options.reports)?;
    let folds = folds::split(&reports, options.folds)?;
    let summaries: Vec<FoldSummary> = folds
        .iter()
        .enumerate()
        .map(|(i, fold)| FoldSummary::new(i, fold))
        .collect();

    if options.json {
        return print_json(&summaries, "folds");
    }

    println!(
        "{}",
        format!("{} reports in {} folds", reports.len(), summaries.len()).bold()
    );
    for summary in &summaries {
        let span = match (summary.first_commit_time, summary.last_commit_time) {
            (Some(first), Some(last)) => format!("{}..{}", format_time(first), format_time(last)),
            _ => "empty".dimmed().to_string(),
        };
        println!(
            "  fold {:>2}  {:>5} reports  {}  {}",
            summary.fold,
            summary.reports,
            summary.checkpoint.cyan(),
            span
        );
        if !options.quiet && !summary.bug_ids.is_empty() {
            let ids: Vec<String> = summary.bug_ids.iter().map(u64::to_string).collect();
            println!("           {}", ids.join(" ").dimmed());
        }
    }
    Ok(())
}

/// Render epoch seconds as a UTC date.
fn format_time(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

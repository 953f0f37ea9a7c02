//! Time-ordered partitioning of bug reports into evaluation folds.
//!
//! Reports are sorted by fix commit time (ties keep input order) and dealt
//! into `n` consecutive buckets of `len / n` reports, rounded down. Each fold
//! remembers the fix commit of its newest report as its checkpoint: the
//! tree state in effect at the end of the fold.

use tracing::info;

use crate::bug_report::BugReport;
use crate::error::{BugLocatorError, Result};

/// One contiguous slice of bug reports and its source-tree checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub reports: Vec<BugReport>,
    pub checkpoint: String,
}

impl Fold {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }
}

/// Split `reports` into `n` time-ordered folds.
///
/// The last fold takes whatever remains, so it may be larger than the
/// others by up to `n - 1` reports. No fold is empty when there are at
/// least `n` reports. Folds left empty because there are fewer
/// reports than folds inherit the previous checkpoint.
pub fn split(reports: &[BugReport], n: usize) -> Result<Vec<Fold>> {
    if n == 0 {
        return Err(BugLocatorError::validation("folds", "must be greater than 0"));
    }
    if reports.is_empty() {
        return Err(BugLocatorError::validation("bug reports", "nothing to split"));
    }

    let mut sorted: Vec<&BugReport> = reports.iter().collect();
    sorted.sort_by_key(|r| r.commit_time);

    let target = (sorted.len() / n).max(1);
    let mut folds = Vec::with_capacity(n);
    let mut current: Vec<BugReport> = Vec::with_capacity(target);

    for report in sorted {
        current.push(report.clone());
        if current.len() == target && folds.len() < n - 1 {
            let checkpoint = report.commit_id.clone();
            folds.push(Fold {
                reports: std::mem::take(&mut current),
                checkpoint,
            });
        }
    }

    while folds.len() < n {
        let checkpoint = match current.last() {
            Some(last) => last.commit_id.clone(),
            None => folds
                .last()
                .map(|f: &Fold| f.checkpoint.clone())
                .unwrap_or_default(),
        };
        folds.push(Fold {
            reports: std::mem::take(&mut current),
            checkpoint,
        });
    }

    for (i, fold) in folds.iter().enumerate() {
        info!(fold = i, reports = fold.len(), checkpoint = %fold.checkpoint, "fold boundary");
    }
    Ok(folds)
}

//! Bug reports and their ground truth.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BugLocatorError, Result};

/// One bug report with the files its fix touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugReport {
    pub id: u64,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    /// When the report was filed (epoch seconds).
    pub report_time: i64,
    /// Commit that fixed the bug.
    pub commit_id: String,
    /// When the fix was committed (epoch seconds).
    pub commit_time: i64,
    /// Repository-relative paths changed by the fix.
    #[serde(default)]
    pub fixed_files: Vec<String>,
}

impl BugReport {
    /// Summary and description joined, as fed to the tokenizer.
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.summary.clone()
        } else {
            format!("{}\n{}", self.summary, self.description)
        }
    }

    pub fn has_ground_truth(&self) -> bool {
        !self.fixed_files.is_empty()
    }

    pub fn is_fixed_file(&self, path: &str) -> bool {
        self.fixed_files.iter().any(|f| f == path)
    }
}

/// Another report's similarity to the one being scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarReport {
    /// Id of the similar report.
    pub report: u64,
    pub similarity: f64,
}

/// Load a JSON array of bug reports. Ids must be unique.
pub fn load_bug_reports(path: &Path) -> Result<Vec<BugReport>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BugLocatorError::io(format!("reading bug reports '{}'", path.display()), e)
    })?;
    parse_bug_reports(&content)
}

pub fn parse_bug_reports(content: &str) -> Result<Vec<BugReport>> {
    let reports: Vec<BugReport> = serde_json::from_str(content)
        .map_err(|e| BugLocatorError::malformed("bug reports", e.to_string()))?;
    let mut seen = HashSet::new();
    for report in &reports {
        if !seen.insert(report.id) {
            return Err(BugLocatorError::malformed(
                "bug reports",
                format!("duplicate id {}", report.id),
            ));
        }
    }
    Ok(reports)
}

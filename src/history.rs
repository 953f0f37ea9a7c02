//! Recency and frequency signals from a file's change history.
//!
//! A history is the ascending list of epoch-second timestamps at which a
//! file was modified. Both signals look only at changes strictly before the
//! instant being scored, so a bug report never sees its own fix.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{BugLocatorError, Result};

/// Average Gregorian month, used only for timestamps chrono cannot represent.
const SECONDS_PER_MONTH: f64 = 30.436_875 * 86_400.0;

/// Ascending change timestamps of one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeHistory {
    stamps: Vec<i64>,
}

impl ChangeHistory {
    /// Build a history; input order does not matter.
    pub fn new(mut stamps: Vec<i64>) -> Self {
        stamps.sort_unstable();
        Self { stamps }
    }

    pub fn stamps(&self) -> &[i64] {
        &self.stamps
    }

    /// Index of the last change strictly before `t`, or `None` if `t` does
    /// not follow any recorded change.
    pub fn locate_change_point(&self, t: i64) -> Option<usize> {
        self.stamps.partition_point(|&s| s < t).checked_sub(1)
    }

    /// `1 / (1 + whole months since the last earlier change)`, 0 if none.
    pub fn recency(&self, t: i64) -> f64 {
        match self.locate_change_point(t) {
            Some(i) => 1.0 / (1.0 + months_between(self.stamps[i], t) as f64),
            None => 0.0,
        }
    }

    /// Number of changes strictly before `t`.
    pub fn frequency(&self, t: i64) -> f64 {
        self.locate_change_point(t).map_or(0.0, |i| (i + 1) as f64)
    }
}

/// Whole calendar months elapsed from `earlier` to `later` (UTC), never
/// negative.
pub fn months_between(earlier: i64, later: i64) -> i64 {
    if later <= earlier {
        return 0;
    }
    let (Some(from), Some(to)) = (
        DateTime::<Utc>::from_timestamp(earlier, 0),
        DateTime::<Utc>::from_timestamp(later, 0),
    ) else {
        return (later.saturating_sub(earlier) as f64 / SECONDS_PER_MONTH).floor() as i64;
    };
    let mut months =
        i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month());
    let to_offset = (to.day(), to.num_seconds_from_midnight());
    let from_offset = (from.day(), from.num_seconds_from_midnight());
    if to_offset < from_offset {
        months -= 1;
    }
    months.max(0)
}

/// Change histories of every file in a repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileHistories {
    files: HashMap<String, ChangeHistory>,
}

impl FileHistories {
    pub fn new(files: HashMap<String, Vec<i64>>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, stamps)| (path, ChangeHistory::new(stamps)))
                .collect(),
        }
    }

    /// Load a JSON object mapping file paths to epoch-second timestamps.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BugLocatorError::io(format!("reading change history '{}'", path.display()), e)
        })?;
        let raw: HashMap<String, Vec<i64>> = serde_json::from_str(&content)
            .map_err(|e| BugLocatorError::malformed("change history", e.to_string()))?;
        Ok(Self::new(raw))
    }

    pub fn get(&self, path: &str) -> Option<&ChangeHistory> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// `(recency, frequency)` of `path` at instant `t`; zeros for files
    /// with no recorded history.
    pub fn signals(&self, path: &str, t: i64) -> (f64, f64) {
        self.files
            .get(path)
            .map_or((0.0, 0.0), |h| (h.recency(t), h.frequency(t)))
    }
}

//! Candidate feature vectors and their normalization bounds.
//!
//! Every (bug report, file) candidate carries six features. Training
//! records the per-feature minimum and maximum over all candidates,
//! normalizes with them, and persists them; testing loads the persisted
//! bounds and never recomputes them from test data.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{BugLocatorError, Result};

pub const FEATURE_COUNT: usize = 6;

/// Feature names, in vector order. Also the keys of the bounds file.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "content",
    "api",
    "collaborative",
    "class_name",
    "recency",
    "frequency",
];

/// `[content, api, collaborative, class_name, recency, frequency]`.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Min-max scaling into `[0, 1]`; degenerate ranges map to 0.
pub fn normalize(x: f64, min: f64, max: f64) -> f64 {
    if max == min || x <= min {
        0.0
    } else if x >= max {
        1.0
    } else {
        (x - min) / (max - min)
    }
}

/// Per-feature `(min, max)` seen during training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub min: FeatureVector,
    pub max: FeatureVector,
}

impl Default for FeatureBounds {
    fn default() -> Self {
        Self {
            min: [f64::INFINITY; FEATURE_COUNT],
            max: [f64::NEG_INFINITY; FEATURE_COUNT],
        }
    }
}

impl FeatureBounds {
    /// True until the first observation.
    pub fn is_empty(&self) -> bool {
        self.min.iter().zip(&self.max).all(|(lo, hi)| lo > hi)
    }

    pub fn observe(&mut self, features: &FeatureVector) {
        for (i, &x) in features.iter().enumerate() {
            self.min[i] = self.min[i].min(x);
            self.max[i] = self.max[i].max(x);
        }
    }

    /// Combine bounds gathered by independent workers.
    pub fn merge(mut self, other: Self) -> Self {
        for i in 0..FEATURE_COUNT {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
        self
    }

    pub fn normalize(&self, features: &FeatureVector) -> FeatureVector {
        std::array::from_fn(|i| normalize(features[i], self.min[i], self.max[i]))
    }

    /// Render as `name_min:value` / `name_max:value` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            let _ = writeln!(out, "{name}_min:{}", self.min[i]);
            let _ = writeln!(out, "{name}_max:{}", self.max[i]);
        }
        out
    }

    /// Parse the format written by [`FeatureBounds::to_text`]. Every key
    /// must be present exactly once.
    pub fn parse(text: &str) -> Result<Self> {
        let mut min = [None; FEATURE_COUNT];
        let mut max = [None; FEATURE_COUNT];
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| BugLocatorError::bounds(format!("expected 'key:value', got '{line}'")))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| BugLocatorError::bounds(format!("bad number in '{line}'")))?;
            let key = key.trim();
            let (name, slot) = if let Some(name) = key.strip_suffix("_min") {
                (name, &mut min)
            } else if let Some(name) = key.strip_suffix("_max") {
                (name, &mut max)
            } else {
                return Err(BugLocatorError::bounds(format!("unknown key '{key}'")));
            };
            let i = FEATURE_NAMES
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| BugLocatorError::bounds(format!("unknown feature '{name}'")))?;
            if slot[i].replace(value).is_some() {
                return Err(BugLocatorError::bounds(format!("duplicate key '{key}'")));
            }
        }

        let mut bounds = Self::default();
        for i in 0..FEATURE_COUNT {
            let missing = |suffix: &str| {
                BugLocatorError::bounds(format!("missing key '{}_{suffix}'", FEATURE_NAMES[i]))
            };
            bounds.min[i] = min[i].ok_or_else(|| missing("min"))?;
            bounds.max[i] = max[i].ok_or_else(|| missing("max"))?;
        }
        Ok(bounds)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BugLocatorError::io(format!("creating directory '{}'", parent.display()), e)
            })?;
        }
        std::fs::write(path, self.to_text()).map_err(|e| {
            BugLocatorError::io(format!("writing bounds to '{}'", path.display()), e)
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BugLocatorError::io(format!("reading bounds from '{}'", path.display()), e)
        })?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_edges() {
        assert_eq!(normalize(5.0, 2.0, 2.0), 0.0);
        assert_eq!(normalize(1.0, 2.0, 4.0), 0.0);
        assert_eq!(normalize(2.0, 2.0, 4.0), 0.0);
        assert_eq!(normalize(4.0, 2.0, 4.0), 1.0);
        assert_eq!(normalize(9.0, 2.0, 4.0), 1.0);
        assert_eq!(normalize(3.0, 2.0, 4.0), 0.5);
    }

    #[test]
    fn observe_and_normalize() {
        let mut bounds = FeatureBounds::default();
        assert!(bounds.is_empty());
        bounds.observe(&[1.0, 0.0, 0.0, 3.0, 0.5, 2.0]);
        bounds.observe(&[3.0, 0.0, 2.0, 0.0, 1.0, 4.0]);
        assert!(!bounds.is_empty());
        let n = bounds.normalize(&[2.0, 0.0, 1.0, 3.0, 0.75, 2.0]);
        assert_eq!(n, [0.5, 0.0, 0.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn merge_matches_sequential_observation() {
        let rows = [
            [1.0, 0.0, 0.2, 4.0, 0.1, 1.0],
            [0.5, 0.0, 0.9, 0.0, 0.3, 7.0],
            [2.5, 0.0, 0.0, 6.0, 0.0, 2.0],
        ];
        let mut all = FeatureBounds::default();
        rows.iter().for_each(|r| all.observe(r));

        let mut left = FeatureBounds::default();
        left.observe(&rows[0]);
        let mut right = FeatureBounds::default();
        right.observe(&rows[1]);
        right.observe(&rows[2]);
        assert_eq!(left.merge(right), all);
        assert_eq!(right.merge(left), all);
        assert_eq!(FeatureBounds::default().merge(all), all);
    }

    #[test]
    fn text_roundtrip() {
        let mut bounds = FeatureBounds::default();
        bounds.observe(&[0.125, 0.0, 1.5, 7.0, 0.25, 3.0]);
        bounds.observe(&[0.5, 0.0, 0.0, 0.0, 1.0, 9.0]);
        let text = bounds.to_text();
        assert!(text.starts_with("content_min:0.125\ncontent_max:0.5\n"));
        assert_eq!(FeatureBounds::parse(&text).unwrap(), bounds);
    }

    #[test]
    fn parse_rejects_missing_and_unknown_keys() {
        let err = FeatureBounds::parse("content_min:0\n").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("content_max"));

        let mut bounds = FeatureBounds::default();
        bounds.observe(&[0.0; FEATURE_COUNT]);
        let text = format!("{}bogus_min:1\n", bounds.to_text());
        assert!(FeatureBounds::parse(&text).is_err());
        let text = format!("{}content_min:1\n", bounds.to_text());
        assert!(FeatureBounds::parse(&text).unwrap_err().to_string().contains("duplicate"));
        assert!(FeatureBounds::parse("content_min=1").is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fold0/bounds.txt");
        let mut bounds = FeatureBounds::default();
        bounds.observe(&[1.0, 0.0, 2.0, 3.0, 0.5, 6.0]);
        bounds.save(&path).unwrap();
        assert_eq!(FeatureBounds::load(&path).unwrap(), bounds);
    }
}

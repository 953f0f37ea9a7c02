//! Feature-file exchange with the external rank learner.
//!
//! Each candidate becomes one line,
//! `<label> qid:<n> 1:<f1> 2:<f2> ... 6:<f6>`, where `n` numbers the bug
//! reports from 1 in iteration order. Predictions come back as one score
//! per line in the same order; attaching them is purely positional, so a
//! count mismatch is fatal.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{BugLocatorError, Result};
use crate::features::FeatureVector;
use crate::ranker::Ranking;

/// Label of candidates the fix did not touch.
pub const NEGATIVE_LABEL: u32 = 1;

/// Render one feature-file line.
pub fn format_line(label: u32, qid: usize, features: &FeatureVector) -> String {
    let mut line = format!("{label} qid:{qid}");
    for (i, value) in features.iter().enumerate() {
        let _ = write!(line, " {}:{value}", i + 1);
    }
    line
}

/// Write every candidate of `ranking`, returning the number of lines.
pub fn write_features<W: Write>(
    ranking: &Ranking,
    positive_label: u32,
    out: &mut W,
) -> Result<usize> {
    let mut lines = 0;
    for (i, report) in ranking.reports.iter().enumerate() {
        for candidate in &report.candidates {
            let label = if candidate.is_fixed {
                positive_label
            } else {
                NEGATIVE_LABEL
            };
            writeln!(out, "{}", format_line(label, i + 1, &candidate.features))
                .map_err(|e| BugLocatorError::io("writing feature line", e))?;
            lines += 1;
        }
    }
    Ok(lines)
}

pub fn write_feature_file(ranking: &Ranking, positive_label: u32, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            BugLocatorError::io(format!("creating directory '{}'", parent.display()), e)
        })?;
    }
    let file = File::create(path).map_err(|e| {
        BugLocatorError::io(format!("creating feature file '{}'", path.display()), e)
    })?;
    let mut out = BufWriter::new(file);
    let lines = write_features(ranking, positive_label, &mut out)?;
    out.flush()
        .map_err(|e| BugLocatorError::io(format!("flushing '{}'", path.display()), e))?;
    Ok(lines)
}

/// Parse learner output: one score per non-blank line, taken from the
/// last whitespace-separated field (RankLib writes `qid index score`).
pub fn parse_scores(text: &str) -> Result<Vec<f64>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let field = line.split_whitespace().last().unwrap_or_default();
            field.parse::<f64>().map_err(|_| {
                BugLocatorError::malformed("scores", format!("line {}: '{line}'", n + 1))
            })
        })
        .collect()
}

pub fn read_scores(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BugLocatorError::io(format!("reading scores '{}'", path.display()), e)
    })?;
    parse_scores(&text)
}

/// Attach predictions to candidates in feature-file order.
pub fn attach_scores(ranking: &mut Ranking, scores: &[f64], stage: &str) -> Result<()> {
    let expected = ranking.candidate_count();
    if scores.len() != expected {
        return Err(BugLocatorError::ScoreCountMismatch {
            stage: stage.to_string(),
            expected,
            actual: scores.len(),
        });
    }
    let candidates = ranking.reports.iter_mut().flat_map(|r| r.candidates.iter_mut());
    for (candidate, &score) in candidates.zip(scores) {
        candidate.score = score;
    }
    Ok(())
}

//! Evaluation of scored rankings: accuracy@k, MRR, and MAP.
//!
//! Each bug report's candidates are ordered by learner score (highest
//! first, ties by file path); metrics then look at the ranks of the files
//! the fix actually touched.

use serde::Serialize;

use crate::ranker::{RankedReport, Ranking};

/// Cutoffs reported as accuracy@k.
pub const ACCURACY_CUTOFFS: [usize; 3] = [1, 5, 10];

/// Aggregate metrics over a set of bug reports.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    /// Reports evaluated.
    pub reports: usize,
    /// Share of reports with a fixed file in the top 1, 5, and 10.
    pub accuracy: [f64; 3],
    pub mrr: f64,
    pub map: f64,
}

/// 1-based ranks of the fixed files, ascending.
pub fn positive_ranks(report: &RankedReport) -> Vec<usize> {
    let mut order: Vec<_> = report.candidates.iter().collect();
    order.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.file.cmp(&b.file)));
    order
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_fixed)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Reciprocal rank of the first fixed file, 0 if none.
pub fn reciprocal_rank(ranks: &[usize]) -> f64 {
    ranks.first().map_or(0.0, |&r| 1.0 / r as f64)
}

/// Mean of precision at each fixed file's rank, 0 if none.
pub fn average_precision(ranks: &[usize]) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let sum: f64 = ranks
        .iter()
        .enumerate()
        .map(|(hit, &rank)| (hit + 1) as f64 / rank as f64)
        .sum();
    sum / ranks.len() as f64
}

impl Metrics {
    pub fn evaluate(ranking: &Ranking) -> Self {
        let mut totals = Self::default();
        for report in &ranking.reports {
            let ranks = positive_ranks(report);
            totals.add(&ranks);
        }
        totals.finish()
    }

    fn add(&mut self, ranks: &[usize]) {
        self.reports += 1;
        for (i, &k) in ACCURACY_CUTOFFS.iter().enumerate() {
            if ranks.first().is_some_and(|&r| r <= k) {
                self.accuracy[i] += 1.0;
            }
        }
        self.mrr += reciprocal_rank(ranks);
        self.map += average_precision(ranks);
    }

    fn finish(mut self) -> Self {
        if self.reports > 0 {
            let n = self.reports as f64;
            self.accuracy.iter_mut().for_each(|a| *a /= n);
            self.mrr /= n;
            self.map /= n;
        }
        self
    }

    /// Report-weighted mean of per-fold metrics.
    pub fn combine(parts: &[Metrics]) -> Self {
        let reports: usize = parts.iter().map(|m| m.reports).sum();
        if reports == 0 {
            return Self::default();
        }
        let weighted = |f: &dyn Fn(&Metrics) -> f64| {
            parts.iter().map(|m| f(m) * m.reports as f64).sum::<f64>() / reports as f64
        };
        Self {
            reports,
            accuracy: std::array::from_fn(|i| weighted(&|m| m.accuracy[i])),
            mrr: weighted(&|m| m.mrr),
            map: weighted(&|m| m.map),
        }
    }
}

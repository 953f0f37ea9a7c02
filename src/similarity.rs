//! Vector-space similarity between weighted term vectors.
//!
//! The dot product is not divided by the norms: document length is folded
//! into the term weights. Callers who want cosine behaviour pass
//! [`WeightedVector::normalized`] vectors instead.

use serde::{Deserialize, Serialize};

use crate::weighting::WeightedVector;

/// Similarity measure between two weighted vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    /// Raw weighted dot product over shared terms.
    #[default]
    Vsm,
    /// Share of `a`'s terms present in `b`, relative to `a`'s weight mass.
    Asymmetric,
    /// Mean of both asymmetric directions.
    Symmetric,
}

impl Similarity {
    /// Score `a` against `b`. Either vector empty gives 0.
    pub fn score(self, a: &WeightedVector, b: &WeightedVector) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        match self {
            Self::Vsm => vsm(a, b),
            Self::Asymmetric => asymmetric(a, b),
            Self::Symmetric => symmetric(a, b),
        }
    }
}

/// `Σ_{t ∈ a∩b} weight_a[t] * weight_b[t]`.
pub fn vsm(a: &WeightedVector, b: &WeightedVector) -> f64 {
    // Walk the shorter vector.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|other| w.weight * other.weight))
        .sum()
}

/// `|{t ∈ a : t ∈ b}| / Σ weight_a[t]`, 0 when `a` carries no weight.
pub fn asymmetric(a: &WeightedVector, b: &WeightedVector) -> f64 {
    let mass = a.total_weight();
    if mass == 0.0 {
        return 0.0;
    }
    let shared = a.iter().filter(|(term, _)| b.contains(term)).count();
    shared as f64 / mass
}

pub fn symmetric(a: &WeightedVector, b: &WeightedVector) -> f64 {
    (asymmetric(a, b) + asymmetric(b, a)) / 2.0
}

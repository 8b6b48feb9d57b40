//! Fidelity measures between a surrogate prediction and its target.
//!
//! All measures follow "higher is better": distances are negated so that a
//! perfect surrogate scores `0.0` under `L2` and `L1`, and `1.0` under
//! `cosine`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionError;

/// How closely two prediction vectors agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FidelityMeasure {
    /// Negated Euclidean distance.
    L2,
    /// Negated Manhattan distance.
    L1,
    /// Cosine similarity.
    #[serde(rename = "cosine")]
    Cosine,
}

impl FidelityMeasure {
    pub fn name(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::L1 => "L1",
            Self::Cosine => "cosine",
        }
    }

    /// Score `prediction` against `target`.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::ShapeMismatch`] if the lengths differ
    /// - [`ExtractionError::NonFiniteScore`] if the score is NaN
    pub fn score(self, prediction: &[f64], target: &[f64]) -> Result<f64, ExtractionError> {
        if prediction.len() != target.len() {
            return Err(ExtractionError::ShapeMismatch {
                got: prediction.len(),
                expected: target.len(),
            });
        }
        let pairs = prediction.iter().zip(target);
        let score = match self {
            Self::L2 => -pairs.map(|(p, t)| (p - t) * (p - t)).sum::<f64>().sqrt(),
            Self::L1 => -pairs.map(|(p, t)| (p - t).abs()).sum::<f64>(),
            Self::Cosine => cosine_similarity(prediction, target),
        };
        if score.is_nan() {
            return Err(ExtractionError::NonFiniteScore(score));
        }
        Ok(score)
    }
}

/// Cosine similarity; two zero vectors are identical, one zero vector is orthogonal.
fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => dot / (norm_a * norm_b),
    }
}

impl FromStr for FidelityMeasure {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L2" => Ok(Self::L2),
            "L1" => Ok(Self::L1),
            "cosine" => Ok(Self::Cosine),
            other => Err(ExtractionError::UnknownMethod { kind: "fidelity measure", name: other.into() }),
        }
    }
}

impl fmt::Display for FidelityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! The explanation returned for one sample.

use serde::{Deserialize, Serialize};

use super::report::format_prediction;
use crate::ensemble::EnsembleProfile;
use crate::extraction::ExtractionError;
use crate::fidelity::FidelityMeasure;
use crate::grid::CandidateConfig;
use crate::search::{ScoredExtraction, SearchOutcome};

/// Selected trees, their weights, and the surrogate prediction for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResult {
    /// Representative tree indices into the ensemble.
    pub final_trees_idx: Vec<usize>,
    /// Cluster size of each representative, parallel to `final_trees_idx`.
    pub cluster_sizes: Vec<usize>,
    /// Trees that entered clustering.
    pub preselected: Vec<usize>,
    /// Configuration the explanation was built with.
    pub best_params: CandidateConfig,
    /// Score of `best_params` during the search; `-inf` if the search fell back.
    pub search_score: f64,
    /// Every grid point failed and `best_params` is the fallback.
    pub exhausted: bool,
    /// Fidelity of the returned explanation under the configured measure.
    pub sample_score: f64,
    pub fidelity_measure: FidelityMeasure,
    pub profile: EnsembleProfile,
    prediction: Vec<f64>,
    ensemble_prediction: Vec<f64>,
}

impl ExplanationResult {
    /// Package a materialized winner.
    pub(crate) fn assemble(
        scored: ScoredExtraction,
        outcome: &SearchOutcome,
        fidelity_measure: FidelityMeasure,
        profile: EnsembleProfile,
        ensemble_prediction: Vec<f64>,
    ) -> Self {
        let ScoredExtraction { extraction, prediction, score } = scored;
        Self {
            final_trees_idx: extraction.final_trees_idx,
            cluster_sizes: extraction.cluster_sizes,
            preselected: extraction.preselected,
            best_params: outcome.best,
            search_score: outcome.best_score,
            exhausted: outcome.exhausted,
            sample_score: score,
            fidelity_measure,
            profile,
            prediction,
            ensemble_prediction,
        }
    }

    /// Surrogate prediction, one value per output.
    pub fn local_prediction(&self) -> &[f64] {
        &self.prediction
    }

    /// The full ensemble's prediction for the same sample.
    pub fn ensemble_prediction(&self) -> &[f64] {
        &self.ensemble_prediction
    }

    /// Re-score the surrogate under `measure`, against `oracle` if given and
    /// the ensemble prediction otherwise.
    pub fn score(&self, measure: FidelityMeasure, oracle: Option<&[f64]>) -> Result<f64, ExtractionError> {
        measure.score(&self.prediction, oracle.unwrap_or(&self.ensemble_prediction))
    }

    /// Normalized representative weights.
    pub fn weights(&self) -> Vec<f64> {
        let total: usize = self.cluster_sizes.iter().sum();
        self.cluster_sizes.iter().map(|&s| s as f64 / total as f64).collect()
    }

    /// Number of trees that were clustered (the sum of cluster sizes).
    pub fn n_trees_selected(&self) -> usize {
        self.cluster_sizes.iter().sum()
    }

    pub fn prediction_string(&self) -> String {
        format_prediction(&self.prediction)
    }
}

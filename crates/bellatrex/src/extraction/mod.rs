//! Tree extraction: reduce an ensemble to a few weighted representative trees.
//!
//! The search treats extraction as a black box behind [`TreeExtractor`]. One
//! call takes a fixed sample and one grid point `(n_trees, n_dims,
//! n_clusters)` and returns the representative tree indices with their
//! cluster sizes. Any error it returns is a candidate failure and is contained
//! by the search.
//!
//! [`ClusterExtractor`] is the built-in implementation:
//!
//! 1. pre-select the `n_trees` trees whose prediction is closest to the
//!    ensemble's ([`preselect`])
//! 2. represent each selected tree as a vector ([`represent`])
//! 3. project the vectors to `n_dims` principal components ([`pca`])
//! 4. cluster them into `n_clusters` groups ([`kmeans`])
//! 5. keep the member nearest each centroid, weighted by cluster size

mod cluster;
pub mod kmeans;
pub mod pca;
pub mod preselect;
pub mod represent;

use serde::{Deserialize, Serialize};

use crate::data::Sample;
use crate::ensemble::{Ensemble, EnsembleError};
use crate::grid::CandidateConfig;

pub use cluster::ClusterExtractor;

/// Errors raised by a tree extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unknown {kind} '{name}'")]
    UnknownMethod { kind: &'static str, name: String },
    #[error("cannot pre-select {requested} trees from an ensemble of {n_estimators}")]
    TooManyTrees { requested: usize, n_estimators: usize },
    #[error("cannot project to {n_dims} dimensions, at most {max} available")]
    InvalidDimensions { n_dims: usize, max: usize },
    #[error("{n_points} distinct points cannot form {n_clusters} clusters")]
    TooFewPoints { n_points: usize, n_clusters: usize },
    #[error("clustering did not converge: {0}")]
    Convergence(String),
    #[error("extraction selected no trees")]
    EmptySelection,
    #[error("fidelity score is not finite: {0}")]
    NonFiniteScore(f64),
    #[error("prediction has {got} values, target has {expected}")]
    ShapeMismatch { got: usize, expected: usize },
    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}

/// Method names forwarded to the extractor, unchanged from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMethods {
    pub proj_method: String,
    pub dissim_method: String,
    pub feature_represent: String,
    pub pre_select_trees: String,
    pub fidelity_measure: String,
    /// Seed for stochastic sub-steps (clustering initialization).
    pub seed: u64,
}

/// Everything one extraction call reads. Shared read-only across workers.
#[derive(Clone, Copy)]
pub struct ExtractionTask<'a> {
    pub ensemble: &'a dyn Ensemble,
    pub sample: &'a Sample,
    pub methods: &'a ExtractionMethods,
    pub config: CandidateConfig,
}

/// The outcome of one successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Representative tree indices, one per non-empty cluster.
    pub final_trees_idx: Vec<usize>,
    /// Cluster size for each representative, parallel to `final_trees_idx`.
    pub cluster_sizes: Vec<usize>,
    /// Trees that entered clustering, in pre-selection order.
    pub preselected: Vec<usize>,
}

impl Extraction {
    /// Check the shape invariants every extractor must uphold.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::EmptySelection`] when no tree was selected, the
    /// lengths differ, or a cluster is empty.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.final_trees_idx.is_empty()
            || self.final_trees_idx.len() != self.cluster_sizes.len()
            || self.cluster_sizes.contains(&0)
        {
            return Err(ExtractionError::EmptySelection);
        }
        Ok(())
    }

    /// Total weight, i.e. the number of trees that were clustered.
    pub fn total_size(&self) -> usize {
        self.cluster_sizes.iter().sum()
    }

    /// Normalized weight of each representative.
    pub fn weights(&self) -> Vec<f64> {
        let total = self.total_size() as f64;
        self.cluster_sizes.iter().map(|&s| s as f64 / total).collect()
    }

    /// Surrogate prediction: the cluster-size-weighted mean of the
    /// representatives' predictions.
    ///
    /// `Σ_i (size_i / Σ size) * tree_i(sample)`
    pub fn local_prediction(
        &self,
        ensemble: &dyn Ensemble,
        sample: &Sample,
    ) -> Result<Vec<f64>, ExtractionError> {
        self.validate()?;
        let mut output = vec![0.0; ensemble.output_arity()];
        for (&idx, weight) in self.final_trees_idx.iter().zip(self.weights()) {
            let prediction = ensemble.predict_tree(idx, sample)?;
            if prediction.len() != output.len() {
                return Err(ExtractionError::ShapeMismatch {
                    got: prediction.len(),
                    expected: output.len(),
                });
            }
            for (out, v) in output.iter_mut().zip(prediction) {
                *out += weight * v;
            }
        }
        Ok(output)
    }
}

/// Reduces an ensemble to weighted representatives for one sample and one
/// grid point.
///
/// Implementations must be deterministic for a fixed task (including
/// `methods.seed`) and safe to call from several threads at once.
pub trait TreeExtractor: Send + Sync {
    fn extract(&self, task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError>;
}

impl<T: TreeExtractor + ?Sized> TreeExtractor for Box<T> {
    fn extract(&self, task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError> {
        (**self).extract(task)
    }
}

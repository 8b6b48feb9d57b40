//! Test fixtures: toy ensembles, extractor stubs, and random data.
//!
//! Shared by unit tests, integration tests, and benchmarks.

use ndarray::Array2;
use rand::prelude::*;

use crate::config::ExplainerConfig;
use crate::data::Table;
use crate::ensemble::{ForestModel, OutputSemantics};
use crate::extraction::{Extraction, ExtractionError, ExtractionMethods, ExtractionTask, TreeExtractor};
use crate::repr::{Forest, NodeId, Tree};

// =============================================================================
// Ensembles
// =============================================================================

/// A regression forest whose tree `i` always predicts `values[i]`.
pub fn constant_ensemble(values: &[f64]) -> ForestModel {
    let mut forest = Forest::new(1);
    for &v in values {
        forest.push_tree(Tree::constant(vec![v]));
    }
    ForestModel::fitted(forest, OutputSemantics::Regression).expect("constant trees form a valid forest")
}

/// A random full binary tree of `depth` over `n_features` features in `[0, 1)`.
pub fn random_tree(rng: &mut StdRng, n_features: usize, depth: usize, leaf_arity: usize) -> Tree {
    let n_nodes = (1usize << (depth + 1)) - 1;
    let n_internal = (1usize << depth) - 1;

    let mut split_indices = vec![0u32; n_nodes];
    let mut thresholds = vec![0.0; n_nodes];
    let mut left = vec![0 as NodeId; n_nodes];
    let mut right = vec![0 as NodeId; n_nodes];
    let mut is_leaf = vec![true; n_nodes];
    let mut leaf_values = vec![0.0; n_nodes * leaf_arity];

    for node in 0..n_nodes {
        if node < n_internal {
            split_indices[node] = rng.gen_range(0..n_features) as u32;
            thresholds[node] = rng.r#gen::<f64>();
            left[node] = (2 * node + 1) as NodeId;
            right[node] = (2 * node + 2) as NodeId;
            is_leaf[node] = false;
        } else {
            for k in 0..leaf_arity {
                leaf_values[node * leaf_arity + k] = rng.r#gen::<f64>();
            }
        }
    }
    Tree::new(split_indices, thresholds, left, right, vec![true; n_nodes], is_leaf, leaf_values, leaf_arity)
}

/// A fitted forest of random trees with the given output semantics.
pub fn random_forest(
    n_trees: usize,
    n_features: usize,
    depth: usize,
    semantics: OutputSemantics,
    leaf_arity: usize,
    seed: u64,
) -> ForestModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut forest = Forest::new(leaf_arity);
    for _ in 0..n_trees {
        forest.push_tree(random_tree(&mut rng, n_features, depth, leaf_arity));
    }
    ForestModel::fitted(forest, semantics).expect("full binary trees form a valid forest")
}

/// Uniform `[0, 1)` features with default column names.
pub fn random_table(rows: usize, cols: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let features = Array2::from_shape_simple_fn((rows, cols), || rng.r#gen::<f64>());
    Table::from_array(features)
}

// =============================================================================
// Extractors
// =============================================================================

/// Default method names and seed.
pub fn default_methods() -> ExtractionMethods {
    ExplainerConfig::default().extraction_methods()
}

/// Always fails, as if clustering never converged.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingExtractor;

impl TreeExtractor for FailingExtractor {
    fn extract(&self, task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError> {
        Err(ExtractionError::Convergence(format!("forced failure for {}", task.config)))
    }
}

/// Returns the same selection for every grid point.
#[derive(Debug, Clone)]
pub struct FixedExtractor {
    extraction: Extraction,
}

impl FixedExtractor {
    pub fn new(final_trees_idx: Vec<usize>, cluster_sizes: Vec<usize>) -> Self {
        let preselected = final_trees_idx.clone();
        Self { extraction: Extraction { final_trees_idx, cluster_sizes, preselected } }
    }
}

impl TreeExtractor for FixedExtractor {
    fn extract(&self, _task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError> {
        Ok(self.extraction.clone())
    }
}

/// Succeeds only for grid points with `n_clusters` clusters, selecting the
/// first `n_trees` trees.
#[derive(Debug, Clone, Copy)]
pub struct OnlyExtractor {
    pub n_clusters: usize,
}

impl TreeExtractor for OnlyExtractor {
    fn extract(&self, task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError> {
        if task.config.n_clusters != self.n_clusters {
            return Err(ExtractionError::TooFewPoints {
                n_points: self.n_clusters,
                n_clusters: task.config.n_clusters,
            });
        }
        let n = task.config.n_trees.min(task.ensemble.n_estimators()).max(1);
        Ok(Extraction {
            final_trees_idx: (0..n).collect(),
            cluster_sizes: vec![1; n],
            preselected: (0..n).collect(),
        })
    }
}

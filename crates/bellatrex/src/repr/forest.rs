//! Canonical forest representation (collection of trees).

use super::{tree::TreeValidationError, Tree};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    Empty,
    #[error("tree {tree_idx} has leaf arity {arity}, forest expects {expected}")]
    LeafArityMismatch {
        tree_idx: usize,
        arity: usize,
        expected: usize,
    },
    #[error("tree {tree_idx} is invalid: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Forest of decision trees sharing a leaf arity.
///
/// Trees are averaged: there are no per-tree output groups and no base score.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    leaf_arity: usize,
}

impl Forest {
    /// Create an empty forest whose trees carry `leaf_arity` values per leaf.
    pub fn new(leaf_arity: usize) -> Self {
        Self { trees: Vec::new(), leaf_arity }
    }

    /// Create a forest from trees; the arity is taken from the first tree.
    pub fn from_trees(trees: Vec<Tree>) -> Result<Self, ForestValidationError> {
        let leaf_arity = trees.first().map(Tree::leaf_arity).ok_or(ForestValidationError::Empty)?;
        let forest = Self { trees, leaf_arity };
        forest.validate()?;
        Ok(forest)
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree) {
        debug_assert_eq!(tree.leaf_arity(), self.leaf_arity, "leaf arity mismatch");
        self.trees.push(tree);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Values stored per leaf (shared by every tree).
    #[inline]
    pub fn leaf_arity(&self) -> usize {
        self.leaf_arity
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> Option<&Tree> {
        self.trees.get(idx)
    }

    /// Number of features the forest reads (largest split index + 1).
    pub fn n_features(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature_index)
            .max()
            .map_or(0, |m| m + 1)
    }

    /// Average leaf values of all trees for a single row.
    pub fn predict_row(&self, features: &[f64]) -> Vec<f64> {
        let mut output = vec![0.0; self.leaf_arity];
        if self.trees.is_empty() {
            return output;
        }
        for tree in &self.trees {
            for (out, &v) in output.iter_mut().zip(tree.predict_row(features)) {
                *out += v;
            }
        }
        let n = self.trees.len() as f64;
        output.iter_mut().for_each(|v| *v /= n);
        output
    }

    /// Validate structural invariants for every tree.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.trees.is_empty() {
            return Err(ForestValidationError::Empty);
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.leaf_arity() != self.leaf_arity {
                return Err(ForestValidationError::LeafArityMismatch {
                    tree_idx: i,
                    arity: tree.leaf_arity(),
                    expected: self.leaf_arity,
                });
            }
            tree.validate()
                .map_err(|e| ForestValidationError::InvalidTree { tree_idx: i, error: e })?;
        }
        Ok(())
    }
}

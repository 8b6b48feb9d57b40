//! Canonical tree representation (SoA) used by the ensemble adapters.
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage with vector-valued leaves
//! - [`PathStep`]: One split visited on the way from the root to a leaf
//! - [`TreeValidationError`]: Structural validation errors

// Allow many constructor arguments for creating trees with all their fields.
#![allow(clippy::too_many_arguments)]

use super::NodeId;

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    #[error("tree has no nodes")]
    EmptyTree,
    /// Parallel arrays disagree on the number of nodes.
    #[error("field {field} has length {len}, expected {n_nodes}")]
    LengthMismatch {
        field: &'static str,
        len: usize,
        n_nodes: usize,
    },
    /// A child pointer references an out-of-bounds node.
    #[error("node {node} has {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    /// A node references itself as a child.
    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },
    /// A node was reached more than once during traversal.
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    /// A node exists in storage but is unreachable from the root.
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
}

// ============================================================================
// PathStep
// ============================================================================

/// A split node visited while routing a sample to its leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    /// Node identifier of the split.
    pub node: NodeId,
    /// Depth of the split (root = 0).
    pub depth: usize,
    /// Feature tested at this split.
    pub feature: usize,
    /// Split threshold (`value <= threshold` goes left).
    pub threshold: f64,
    /// Whether the sample went to the left child.
    pub went_left: bool,
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays decision tree with vector-valued leaves.
///
/// Child indices are local to this tree (0 = root). Each node stores
/// `leaf_arity` values; only leaf nodes are read during prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f64]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f64]>,
    leaf_arity: usize,
}

impl Tree {
    /// Create a new tree from parallel arrays.
    ///
    /// `leaf_values` is row-major `[node][output]` with `leaf_arity` values per
    /// node. Use [`Tree::validate`] to check the structure.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f64>,
        left_children: Vec<NodeId>,
        right_children: Vec<NodeId>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f64>,
        leaf_arity: usize,
    ) -> Self {
        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            leaf_arity,
        }
    }

    /// A single-leaf tree that always predicts `values`.
    pub fn constant(values: Vec<f64>) -> Self {
        let arity = values.len();
        Self::new(vec![0], vec![0.0], vec![0], vec![0], vec![true], vec![true], values, arity)
    }

    /// A depth-one tree: `x[feature] <= threshold` predicts `left`, otherwise `right`.
    pub fn stump(feature: u32, threshold: f64, left: Vec<f64>, right: Vec<f64>) -> Self {
        debug_assert_eq!(left.len(), right.len());
        let arity = left.len();
        let mut values = vec![0.0; arity];
        values.extend(left);
        values.extend(right);
        Self::new(
            vec![feature, 0, 0],
            vec![threshold, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, true, true],
            vec![false, true, true],
            values,
            arity,
        )
    }

    /// Number of nodes in the tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Number of values stored per leaf.
    #[inline]
    pub fn leaf_arity(&self) -> usize {
        self.leaf_arity
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f64 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    /// Values stored at `node`.
    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> &[f64] {
        let start = node as usize * self.leaf_arity;
        &self.leaf_values[start..start + self.leaf_arity]
    }

    /// Largest feature index used by any split, if the tree has splits.
    pub fn max_feature_index(&self) -> Option<usize> {
        (0..self.n_nodes() as NodeId)
            .filter(|&n| !self.is_leaf(n))
            .map(|n| self.split_index(n) as usize)
            .max()
    }

    /// Route a sample to the child chosen at split `node`.
    #[inline]
    fn next_node(&self, node: NodeId, features: &[f64]) -> (NodeId, bool) {
        let fvalue = features[self.split_index(node) as usize];
        let go_left = if fvalue.is_nan() {
            self.default_left(node)
        } else {
            fvalue <= self.split_threshold(node)
        };
        if go_left {
            (self.left_child(node), true)
        } else {
            (self.right_child(node), false)
        }
    }

    /// Traverse the tree to find the leaf node for a sample.
    ///
    /// Missing values (NaN) follow the node's default direction.
    pub fn traverse_to_leaf(&self, features: &[f64]) -> NodeId {
        let mut node = 0;
        while !self.is_leaf(node) {
            node = self.next_node(node, features).0;
        }
        node
    }

    /// Splits visited from the root to the sample's leaf, plus the leaf itself.
    pub fn decision_path(&self, features: &[f64]) -> (Vec<PathStep>, NodeId) {
        let mut steps = Vec::new();
        let mut node = 0;
        while !self.is_leaf(node) {
            let (next, went_left) = self.next_node(node, features);
            steps.push(PathStep {
                node,
                depth: steps.len(),
                feature: self.split_index(node) as usize,
                threshold: self.split_threshold(node),
                went_left,
            });
            node = next;
        }
        (steps, node)
    }

    /// Predict the leaf values for a single row of features.
    pub fn predict_row(&self, features: &[f64]) -> &[f64] {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Validate structural invariants: array lengths, child bounds, and that
    /// every node is reached exactly once from the root.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let lengths = [
            ("split_indices", self.split_indices.len()),
            ("split_thresholds", self.split_thresholds.len()),
            ("left_children", self.left_children.len()),
            ("right_children", self.right_children.len()),
            ("default_left", self.default_left.len()),
            ("leaf_values", self.leaf_values.len() / self.leaf_arity.max(1)),
        ];
        for (field, len) in lengths {
            if len != n_nodes {
                return Err(TreeValidationError::LengthMismatch { field, len, n_nodes });
            }
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(node) = stack.pop() {
            if visited[node as usize] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[node as usize] = true;
            if self.is_leaf(node) {
                continue;
            }
            for (side, child) in [("left", self.left_child(node)), ("right", self.right_child(node))] {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds { node, side, child, n_nodes });
                }
                stack.push(child);
            }
        }

        match visited.iter().position(|&v| !v) {
            Some(i) => Err(TreeValidationError::UnreachableNode { node: i as NodeId }),
            None => Ok(()),
        }
    }
}

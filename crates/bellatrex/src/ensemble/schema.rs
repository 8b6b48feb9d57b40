//! Schema types for pre-serialized tree collections.
//!
//! The layout follows the flat per-node arrays that scikit-learn style
//! exporters emit: a child index of `-1` marks a leaf, and every node carries
//! its value vector. Schema types are kept separate from runtime types so the
//! format can be validated before any tree is built.

use serde::{Deserialize, Serialize};

use super::Capabilities;
use crate::repr::{Forest, ForestValidationError, NodeId, Tree};

/// Marker for "no child" in `children_left` / `children_right`.
pub const LEAF_MARKER: i64 = -1;

/// One serialized tree (flat node arrays).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSchema {
    /// Left child per node, `-1` for leaves.
    pub children_left: Vec<i64>,
    /// Right child per node, `-1` for leaves.
    pub children_right: Vec<i64>,
    /// Split feature per node (ignored for leaves).
    pub feature: Vec<i64>,
    /// Split threshold per node (ignored for leaves).
    pub threshold: Vec<f64>,
    /// Direction for missing values; defaults to left everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_left: Option<Vec<bool>>,
    /// Value vector per node.
    pub value: Vec<Vec<f64>>,
}

/// A serialized ensemble: trees plus optional declared capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSchema {
    /// Declared tree count; checked against `trees` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_estimators: Option<usize>,
    /// Declared output semantics; required for automatic scenario detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    pub trees: Vec<TreeSchema>,
}

/// Errors converting schema types into runtime trees.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("tree {tree}: field {field} has length {len}, expected {n_nodes}")]
    LengthMismatch {
        tree: usize,
        field: &'static str,
        len: usize,
        n_nodes: usize,
    },
    #[error("tree {tree}: node {node} has only one child")]
    HalfLeaf { tree: usize, node: usize },
    #[error("tree {tree}: node {node} has invalid {field} {value}")]
    NegativeIndex {
        tree: usize,
        node: usize,
        field: &'static str,
        value: i64,
    },
    #[error("tree {tree}: node values have inconsistent lengths")]
    RaggedValues { tree: usize },
    #[error("declared n_estimators {declared} but {actual} trees present")]
    CountMismatch { declared: usize, actual: usize },
    #[error(transparent)]
    Forest(#[from] ForestValidationError),
}

impl TreeSchema {
    /// Convert to the SoA runtime tree.
    pub fn to_tree(&self, tree: usize) -> Result<Tree, SchemaError> {
        let n_nodes = self.children_left.len();
        let lengths = [
            ("children_right", self.children_right.len()),
            ("feature", self.feature.len()),
            ("threshold", self.threshold.len()),
            ("value", self.value.len()),
            ("default_left", self.default_left.as_ref().map_or(n_nodes, Vec::len)),
        ];
        for (field, len) in lengths {
            if len != n_nodes {
                return Err(SchemaError::LengthMismatch { tree, field, len, n_nodes });
            }
        }

        let arity = self.value.first().map_or(0, Vec::len);
        if self.value.iter().any(|v| v.len() != arity) {
            return Err(SchemaError::RaggedValues { tree });
        }

        let mut split_indices = Vec::with_capacity(n_nodes);
        let mut left_children = Vec::with_capacity(n_nodes);
        let mut right_children = Vec::with_capacity(n_nodes);
        let mut is_leaf = Vec::with_capacity(n_nodes);

        for node in 0..n_nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            match (left == LEAF_MARKER, right == LEAF_MARKER) {
                (true, true) => {
                    is_leaf.push(true);
                    split_indices.push(0);
                    left_children.push(0);
                    right_children.push(0);
                }
                (false, false) => {
                    let as_index = |field: &'static str, value: i64| {
                        u32::try_from(value)
                            .map_err(|_| SchemaError::NegativeIndex { tree, node, field, value })
                    };
                    is_leaf.push(false);
                    split_indices.push(as_index("feature", self.feature[node])?);
                    left_children.push(as_index("children_left", left)? as NodeId);
                    right_children.push(as_index("children_right", right)? as NodeId);
                }
                _ => return Err(SchemaError::HalfLeaf { tree, node }),
            }
        }

        Ok(Tree::new(
            split_indices,
            self.threshold.clone(),
            left_children,
            right_children,
            self.default_left.clone().unwrap_or_else(|| vec![true; n_nodes]),
            is_leaf,
            self.value.iter().flatten().copied().collect(),
            arity,
        ))
    }
}

impl EnsembleSchema {
    /// Convert every tree and validate the resulting forest.
    pub fn to_forest(&self) -> Result<Forest, SchemaError> {
        if let Some(declared) = self.n_estimators {
            if declared != self.trees.len() {
                return Err(SchemaError::CountMismatch { declared, actual: self.trees.len() });
            }
        }
        let trees = self
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| t.to_tree(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Forest::from_trees(trees)?)
    }
}

//! Vector representations of trees for one sample.

use ndarray::Array2;

use super::ExtractionError;
use crate::data::Sample;
use crate::ensemble::{Ensemble, EnsembleError};

/// How split usage along a decision path is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureWeighting {
    /// One per split on the feature.
    Simple,
    /// `1 / (depth + 1)` per split, so splits near the root dominate.
    Weighted,
}

/// How a tree is turned into a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Per-feature split usage along the sample's decision path.
    Rules(FeatureWeighting),
    /// The tree's output vector for the sample.
    Predictions,
}

impl Representation {
    /// Resolve from the `dissim_method` and `feature_represent` names.
    ///
    /// `feature_represent` is only read for `"rules"`.
    pub fn parse(dissim_method: &str, feature_represent: &str) -> Result<Self, ExtractionError> {
        match dissim_method {
            "rules" => {
                let weighting = match feature_represent {
                    "simple" => FeatureWeighting::Simple,
                    "weighted" => FeatureWeighting::Weighted,
                    other => {
                        return Err(ExtractionError::UnknownMethod {
                            kind: "feature representation",
                            name: other.into(),
                        })
                    }
                };
                Ok(Self::Rules(weighting))
            }
            "predictions" => Ok(Self::Predictions),
            other => Err(ExtractionError::UnknownMethod {
                kind: "dissimilarity method",
                name: other.into(),
            }),
        }
    }
}

/// Represent `trees` as the rows of a matrix.
///
/// Rule rows have `ensemble.n_features()` columns; prediction rows have
/// `ensemble.output_arity()` columns.
pub fn represent_trees(
    ensemble: &dyn Ensemble,
    sample: &Sample,
    trees: &[usize],
    representation: Representation,
) -> Result<Array2<f64>, ExtractionError> {
    let expected = ensemble.n_features();
    if sample.n_features() < expected {
        return Err(EnsembleError::FeatureMismatch { got: sample.n_features(), expected }.into());
    }
    let n_cols = match representation {
        Representation::Rules(_) => ensemble.n_features(),
        Representation::Predictions => ensemble.output_arity(),
    };
    let mut points = Array2::zeros((trees.len(), n_cols));

    for (mut row, &idx) in points.rows_mut().into_iter().zip(trees) {
        match representation {
            Representation::Rules(weighting) => {
                let (path, _) = ensemble.tree(idx)?.decision_path(sample.values());
                for step in path {
                    let contribution = match weighting {
                        FeatureWeighting::Simple => 1.0,
                        FeatureWeighting::Weighted => 1.0 / (step.depth as f64 + 1.0),
                    };
                    if let Some(cell) = row.get_mut(step.feature) {
                        *cell += contribution;
                    }
                }
            }
            Representation::Predictions => {
                let prediction = ensemble.predict_tree(idx, sample)?;
                for (cell, v) in row.iter_mut().zip(prediction) {
                    *cell = v;
                }
            }
        }
    }
    Ok(points)
}

//! Ensemble adapters.
//!
//! The explainer reads trees through the [`Ensemble`] trait and never inspects
//! concrete model types. Two adapters are provided:
//!
//! - [`ForestModel`]: a native forest, fitted up front or through a
//!   [`ForestTrainer`]
//! - [`SerializedEnsemble`]: a pre-serialized tree collection loaded from JSON
//!
//! Scenario detection uses the capability query ([`Ensemble::capabilities`])
//! and resolves to one of the closed [`EnsembleProfile`] variants.

mod native;
mod profile;
pub mod schema;
mod serialized;

use ndarray::ArrayView2;

use crate::data::Sample;
use crate::repr::{ForestValidationError, Tree};

pub use native::{ForestModel, ForestTrainer};
pub use profile::{Capabilities, EnsembleProfile, OutputSemantics};
pub use serialized::SerializedEnsemble;

/// Errors raised by ensemble adapters.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    #[error("ensemble is not fitted")]
    NotFitted,
    #[error("ensemble cannot be trained: {0}")]
    NotTrainable(&'static str),
    #[error("tree index {idx} out of range for ensemble of {n_estimators} trees")]
    TreeOutOfRange { idx: usize, n_estimators: usize },
    #[error("sample has {got} features, ensemble reads {expected}")]
    FeatureMismatch { got: usize, expected: usize },
    #[error(transparent)]
    InvalidForest(#[from] ForestValidationError),
    #[error(transparent)]
    InvalidSchema(#[from] schema::SchemaError),
    #[error("failed to parse ensemble JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read ensemble file: {0}")]
    Io(#[from] std::io::Error),
    #[error("training failed: {0}")]
    Training(String),
}

/// Read access to a fitted tree ensemble, plus the fit hook.
///
/// Trees are addressed by a stable index `0..n_estimators()`. Implementations
/// are shared read-only across search workers and must be `Sync`.
pub trait Ensemble: Send + Sync {
    /// Number of trees.
    fn n_estimators(&self) -> usize;

    /// Number of features a sample must provide.
    fn n_features(&self) -> usize;

    /// Leaf arity and output semantics, `None` if undeclared.
    fn capabilities(&self) -> Option<Capabilities>;

    /// Whether the ensemble holds trees.
    fn is_fitted(&self) -> bool;

    /// Fit the ensemble on `features` (`[n_samples, n_features]`) and
    /// `targets` (`[n_samples, n_outputs]`).
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
        n_jobs: usize,
    ) -> Result<(), EnsembleError>;

    /// Tree at `idx`.
    fn tree(&self, idx: usize) -> Result<&Tree, EnsembleError>;

    /// Number of values in one prediction.
    ///
    /// Survival ensembles reduce their hazard curve to a single risk score.
    fn output_arity(&self) -> usize {
        match self.capabilities() {
            Some(Capabilities { semantics: OutputSemantics::CumulativeHazard { .. }, .. }) => 1,
            Some(caps) => caps.leaf_arity,
            None => self.tree(0).map_or(0, Tree::leaf_arity),
        }
    }

    /// Prediction of tree `idx` on `sample`, with [`Self::output_arity`] values.
    fn predict_tree(&self, idx: usize, sample: &Sample) -> Result<Vec<f64>, EnsembleError> {
        let expected = self.n_features();
        if sample.n_features() < expected {
            return Err(EnsembleError::FeatureMismatch { got: sample.n_features(), expected });
        }
        let leaf = self.tree(idx)?.predict_row(sample.values());
        let reduced = match self.capabilities() {
            Some(Capabilities { semantics: OutputSemantics::CumulativeHazard { .. }, .. }) => {
                vec![leaf.iter().sum()]
            }
            _ => leaf.to_vec(),
        };
        Ok(reduced)
    }

    /// Ensemble prediction: the mean of all tree predictions.
    fn predict(&self, sample: &Sample) -> Result<Vec<f64>, EnsembleError> {
        let n = self.n_estimators();
        if n == 0 {
            return Err(EnsembleError::NotFitted);
        }
        let mut output = vec![0.0; self.output_arity()];
        for idx in 0..n {
            for (out, v) in output.iter_mut().zip(self.predict_tree(idx, sample)?) {
                *out += v;
            }
        }
        output.iter_mut().for_each(|v| *v /= n as f64);
        Ok(output)
    }
}

/// Read-only view of an ensemble with its capabilities fixed to the
/// scenario resolved at fit time.
///
/// Arity and survival reduction follow the resolved capabilities even when
/// the wrapped ensemble declares none.
#[derive(Clone, Copy)]
pub struct ResolvedEnsemble<'a> {
    inner: &'a dyn Ensemble,
    capabilities: Capabilities,
}

impl<'a> ResolvedEnsemble<'a> {
    pub fn new(inner: &'a dyn Ensemble, capabilities: Capabilities) -> Self {
        Self { inner, capabilities }
    }
}

impl Ensemble for ResolvedEnsemble<'_> {
    fn n_estimators(&self) -> usize {
        self.inner.n_estimators()
    }

    fn n_features(&self) -> usize {
        self.inner.n_features()
    }

    fn capabilities(&self) -> Option<Capabilities> {
        Some(self.capabilities)
    }

    fn is_fitted(&self) -> bool {
        self.inner.is_fitted()
    }

    fn fit(
        &mut self,
        _features: ArrayView2<'_, f64>,
        _targets: ArrayView2<'_, f64>,
        _n_jobs: usize,
    ) -> Result<(), EnsembleError> {
        Err(EnsembleError::NotTrainable("resolved ensemble views are read-only"))
    }

    fn tree(&self, idx: usize) -> Result<&Tree, EnsembleError> {
        self.inner.tree(idx)
    }
}

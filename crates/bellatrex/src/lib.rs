//! bellatrex: local explanations for tree-ensemble predictions.
//!
//! Instead of surfacing every tree of a random forest, an [`Explainer`]
//! picks a handful of representative trees whose weighted prediction
//! closely matches the ensemble for one specific sample, and reports them
//! together with a fidelity score.
//!
//! # Key Types
//!
//! - [`Explainer`] / [`ExplainerConfig`] - Fit once, explain single rows
//! - [`GridSpec`] / [`ParamGrid`] - The `(n_trees, n_dims, n_clusters)` search space
//! - [`Ensemble`] - Read access to a tree ensemble ([`ForestModel`],
//!   [`SerializedEnsemble`])
//! - [`TreeExtractor`] - Pluggable tree selection, [`ClusterExtractor`] by default
//! - [`ExplanationResult`] - Selected trees, weights, surrogate prediction
//!
//! # Search
//!
//! For each sample the explainer scores every grid point and keeps the
//! best. Grid points whose extraction fails are skipped with a warning; if
//! all fail, a fixed fallback configuration is used. See [`search`].
//!
//! [`Ensemble`]: ensemble::Ensemble
//! [`ForestModel`]: ensemble::ForestModel
//! [`SerializedEnsemble`]: ensemble::SerializedEnsemble
//! [`TreeExtractor`]: extraction::TreeExtractor
//! [`ClusterExtractor`]: extraction::ClusterExtractor
//! [`GridSpec`]: grid::GridSpec
//! [`ParamGrid`]: grid::ParamGrid

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod config;
pub mod data;
pub mod ensemble;
pub mod explain;
pub mod extraction;
pub mod fidelity;
pub mod grid;
pub mod logger;
pub mod repr;
pub mod search;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{ConfigError, ExplainerConfig, Setup};
pub use data::{DataError, Sample, Table};
pub use explain::{ExplainError, ExplanationResult, Explainer};
pub use fidelity::FidelityMeasure;
pub use logger::Verbosity;

// Shared utilities
pub use utils::{run_with_threads, Parallelism};

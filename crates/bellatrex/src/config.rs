//! Explainer configuration with builder pattern.
//!
//! [`ExplainerConfig`] collects everything that stays fixed across explain
//! calls: the hyperparameter grid, the method names handed to the tree
//! extractor, threading, and verbosity. It uses the `bon` crate for builder
//! generation with validation at build time.
//!
//! # Example
//!
//! ```
//! use bellatrex::config::{ExplainerConfig, Setup};
//! use bellatrex::ensemble::EnsembleProfile;
//! use bellatrex::Verbosity;
//!
//! // All defaults
//! let config = ExplainerConfig::builder().build().unwrap();
//! assert_eq!(config.n_jobs, 1);
//!
//! // Explicit scenario, parallel search
//! let config = ExplainerConfig::builder()
//!     .setup(Setup::Profile(EnsembleProfile::Regression))
//!     .fidelity_measure("L1")
//!     .n_jobs(4)
//!     .verbosity(Verbosity::Info)
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::ensemble::EnsembleProfile;
use crate::extraction::ExtractionMethods;
use crate::grid::GridSpec;
use crate::logger::Verbosity;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised while validating configuration.
///
/// These abort the call immediately and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Some `n_trees` value is zero or negative.
    #[error("n_trees must be all > 0, got {0}")]
    NonPositiveTrees(f64),
    /// `n_trees` mixes proportions (< 1) and counts (> 1).
    #[error(
        "n_trees must either list proportions in (0, 1] or tree counts, got values from {min} to {max}"
    )]
    MixedTreeUnits { min: f64, max: f64 },
    /// The largest `n_trees` exceeds the ensemble size.
    #[error("n_trees cannot be greater than n_estimators: {requested} > {n_estimators}")]
    TooManyTrees { requested: f64, n_estimators: usize },
    /// A proportion maps to zero trees.
    #[error("n_trees proportion {proportion} selects no trees out of {n_estimators}")]
    ProportionRoundsToZero { proportion: f64, n_estimators: usize },
    /// An axis was given an empty list.
    #[error("hyperparameter axis {0} has no values")]
    EmptyAxis(&'static str),
    /// An axis value has the wrong type or range.
    #[error("invalid value {value} for hyperparameter {axis}")]
    InvalidAxisValue { axis: &'static str, value: String },
    /// Automatic scenario detection found no declared output semantics.
    #[error("ensemble does not declare its output semantics; select the scenario manually")]
    UnrecognizedEnsemble,
    /// Survival output arity does not match the unique event times.
    #[error(
        "survival ensemble has {n_outputs} outputs but {n_unique_times} unique times; multi-event survival analysis is not supported"
    )]
    MultiEventSurvival { n_outputs: usize, n_unique_times: usize },
    /// A method name is empty.
    #[error("{field} must not be empty")]
    EmptyMethod { field: &'static str },
    /// An explicit scenario contradicts what the ensemble declares.
    #[error("scenario {requested} was requested but the ensemble produces {detected} outputs")]
    ProfileMismatch { requested: EnsembleProfile, detected: EnsembleProfile },
}

// =============================================================================
// Setup
// =============================================================================

/// How the explanation scenario is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setup {
    /// Detect from the ensemble's capability query at fit time.
    #[default]
    Auto,
    /// Use the given scenario.
    Profile(EnsembleProfile),
}

// =============================================================================
// ExplainerConfig
// =============================================================================

/// Configuration for an [`Explainer`](crate::Explainer).
///
/// Method names (`proj_method`, `dissim_method`, `feature_represent`,
/// `pre_select_trees`, `fidelity_measure`) are passed through to the tree
/// extractor unchecked; unknown names surface as candidate failures.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ExplainerConfig {
    /// Scenario selection. Default: `Auto`.
    #[builder(default)]
    pub setup: Setup,

    /// Refit the ensemble even if it is already fitted. Default: `false`.
    #[builder(default)]
    pub force_refit: bool,

    /// Verbosity level. Default: `Warning`.
    #[builder(default)]
    pub verbosity: Verbosity,

    /// Projection method. Default: `"PCA"`.
    #[builder(into, default = String::from("PCA"))]
    pub proj_method: String,

    /// Dissimilarity (tree representation) method. Default: `"rules"`.
    #[builder(into, default = String::from("rules"))]
    pub dissim_method: String,

    /// Feature representation mode. Default: `"weighted"`.
    #[builder(into, default = String::from("weighted"))]
    pub feature_represent: String,

    /// Hyperparameter grid. Default: [`GridSpec::default`].
    #[builder(default)]
    pub param_grid: GridSpec,

    /// Tree pre-selection criterion. Default: `"L2"`.
    #[builder(into, default = String::from("L2"))]
    pub pre_select_trees: String,

    /// Fidelity measure used to score candidates. Default: `"L2"`.
    #[builder(into, default = String::from("L2"))]
    pub fidelity_measure: String,

    /// Worker threads for the search: `0` = auto, `1` = sequential. Default: 1.
    #[builder(default = 1)]
    pub n_jobs: usize,

    /// Seed for stochastic extraction steps. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,
}

impl<S: explainer_config_builder::IsComplete> ExplainerConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyMethod`] if a method name is empty.
    pub fn build(self) -> Result<ExplainerConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ExplainerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let methods = [
            ("proj_method", &self.proj_method),
            ("dissim_method", &self.dissim_method),
            ("feature_represent", &self.feature_represent),
            ("pre_select_trees", &self.pre_select_trees),
            ("fidelity_measure", &self.fidelity_measure),
        ];
        for (field, value) in methods {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyMethod { field });
            }
        }
        Ok(())
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Method names forwarded to the tree extractor.
    pub fn extraction_methods(&self) -> ExtractionMethods {
        ExtractionMethods {
            proj_method: self.proj_method.clone(),
            dissim_method: self.dissim_method.clone(),
            feature_represent: self.feature_represent.clone(),
            pre_select_trees: self.pre_select_trees.clone(),
            fidelity_measure: self.fidelity_measure.clone(),
            seed: self.seed,
        }
    }
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            setup: Setup::Auto,
            force_refit: false,
            verbosity: Verbosity::default(),
            proj_method: "PCA".into(),
            dissim_method: "rules".into(),
            feature_represent: "weighted".into(),
            param_grid: GridSpec::default(),
            pre_select_trees: "L2".into(),
            fidelity_measure: "L2".into(),
            n_jobs: 1,
            seed: 42,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

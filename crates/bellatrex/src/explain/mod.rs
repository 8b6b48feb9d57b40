//! Local explanations: the [`Explainer`] façade, its result, and reports.

mod explainer;
pub mod report;
mod result;

pub use explainer::Explainer;
pub use result::ExplanationResult;

use crate::config::ConfigError;
use crate::ensemble::{EnsembleError, EnsembleProfile};
use crate::extraction::ExtractionError;
use crate::grid::CandidateConfig;

/// Errors surfaced by [`Explainer`].
#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
    #[error("explainer is not fitted; call fit first")]
    NotFitted,
    #[error("sample {idx} out of range for table with {n_samples} rows")]
    SampleOutOfRange { idx: usize, n_samples: usize },
    #[error("table has {got} features, ensemble reads {expected}")]
    FeatureMismatch { got: usize, expected: usize },
    #[error("oracle has {got} outputs per sample, ensemble predicts {expected}")]
    OracleMismatch { got: usize, expected: usize },
    #[error("failed to build search thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("could not materialize configuration {config}: {source}")]
    Materialization {
        config: CandidateConfig,
        #[source]
        source: ExtractionError,
    },
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("operation requires a survival set-up, explainer is set up for {0}")]
    WrongSetup(EnsembleProfile),
}

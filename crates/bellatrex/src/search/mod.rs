//! Hyperparameter search for one sample.
//!
//! [`run_search`] scores every point of a validated [`ParamGrid`] through
//! [`evaluate_candidate`] and picks the highest fidelity. Candidate errors
//! never abort the search; they rank below every success, and if nothing
//! succeeds the search falls back to [`CandidateConfig::FALLBACK`].
//!
//! [`ParamGrid`]: crate::grid::ParamGrid
//! [`CandidateConfig::FALLBACK`]: crate::grid::CandidateConfig::FALLBACK

mod driver;
mod evaluator;

pub use driver::{run_search, SearchOutcome};
pub use evaluator::{
    evaluate_candidate, extract_and_score, CandidateResult, CandidateTask, ScoredExtraction,
    SearchContext,
};

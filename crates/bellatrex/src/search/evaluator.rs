//! Candidate evaluation: extract, predict, score.

use crate::data::Sample;
use crate::ensemble::Ensemble;
use crate::extraction::{Extraction, ExtractionError, ExtractionMethods, ExtractionTask, TreeExtractor};
use crate::fidelity::FidelityMeasure;
use crate::grid::CandidateConfig;

/// Inputs shared by every candidate of one search.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub ensemble: &'a dyn Ensemble,
    pub sample: &'a Sample,
    pub methods: &'a ExtractionMethods,
    /// What the surrogate is scored against: the oracle label if given,
    /// otherwise the ensemble's own prediction.
    pub target: &'a [f64],
}

impl<'a> SearchContext<'a> {
    /// The fully specified task for one grid point.
    pub fn task(&self, config: CandidateConfig) -> CandidateTask<'a> {
        CandidateTask { context: *self, config }
    }
}

/// One grid point together with everything needed to evaluate it.
#[derive(Clone, Copy)]
pub struct CandidateTask<'a> {
    pub context: SearchContext<'a>,
    pub config: CandidateConfig,
}

impl<'a> CandidateTask<'a> {
    fn extraction_task(&self) -> ExtractionTask<'a> {
        ExtractionTask {
            ensemble: self.context.ensemble,
            sample: self.context.sample,
            methods: self.context.methods,
            config: self.config,
        }
    }
}

/// A successful extraction with its surrogate prediction and fidelity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredExtraction {
    pub extraction: Extraction,
    pub prediction: Vec<f64>,
    pub score: f64,
}

/// The outcome of evaluating one grid point.
#[derive(Debug)]
pub struct CandidateResult {
    pub config: CandidateConfig,
    pub outcome: Result<f64, ExtractionError>,
}

impl CandidateResult {
    /// Score for ranking; failures rank below everything.
    pub fn score(&self) -> f64 {
        self.outcome.as_ref().map_or(f64::NEG_INFINITY, |&s| s)
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Run extraction for `task` and score the resulting surrogate.
///
/// # Errors
///
/// Any extractor error, an unknown fidelity measure, or a NaN score.
pub fn extract_and_score(
    extractor: &dyn TreeExtractor,
    task: &CandidateTask<'_>,
) -> Result<ScoredExtraction, ExtractionError> {
    let context = &task.context;
    let measure: FidelityMeasure = context.methods.fidelity_measure.parse()?;
    let extraction = extractor.extract(&task.extraction_task())?;
    let prediction = extraction.local_prediction(context.ensemble, context.sample)?;
    let score = measure.score(&prediction, context.target)?;
    Ok(ScoredExtraction { extraction, prediction, score })
}

/// Evaluate one grid point, keeping only its score.
///
/// Never fails: errors are returned inside [`CandidateResult::outcome`].
pub fn evaluate_candidate(extractor: &dyn TreeExtractor, task: &CandidateTask<'_>) -> CandidateResult {
    CandidateResult {
        config: task.config,
        outcome: extract_and_score(extractor, task).map(|scored| scored.score),
    }
}

//! Grid search over candidate configurations.

use super::evaluator::{evaluate_candidate, CandidateResult, SearchContext};
use crate::extraction::TreeExtractor;
use crate::grid::{CandidateConfig, ParamGrid};
use crate::logger::SearchLogger;
use crate::utils::{run_with_threads, Parallelism};

/// Result of one grid search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Winning configuration, or [`CandidateConfig::FALLBACK`] if exhausted.
    pub best: CandidateConfig,
    /// Winning score; `-inf` if exhausted.
    pub best_score: f64,
    /// Every candidate failed.
    pub exhausted: bool,
    /// All evaluations, in grid order.
    pub results: Vec<CandidateResult>,
}

impl SearchOutcome {
    pub fn n_failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }
}

/// Evaluate every grid point and pick the best.
///
/// With `n_jobs == 1` candidates are evaluated in grid order and the first
/// maximal score wins. Otherwise they run on a rayon pool and the winner is
/// the first element of a stable descending sort by score. Both pick a
/// globally maximal score.
///
/// # Errors
///
/// Only if a dedicated thread pool cannot be built.
pub fn run_search(
    extractor: &dyn TreeExtractor,
    context: &SearchContext<'_>,
    grid: &ParamGrid,
    n_jobs: usize,
    logger: &mut SearchLogger,
) -> Result<SearchOutcome, rayon::ThreadPoolBuildError> {
    let candidates = grid.candidates();
    logger.start_search(candidates.len(), Parallelism::from_threads(n_jobs).is_parallel());

    let (parallelism, results) = run_with_threads(n_jobs, |parallelism| {
        let results = parallelism.maybe_par_map(candidates, |config| {
            evaluate_candidate(extractor, &context.task(config))
        });
        (parallelism, results)
    })?;

    for result in &results {
        match &result.outcome {
            Ok(score) => logger.log_candidate(&result.config, *score),
            Err(err) => logger.log_failure(&result.config, &err.to_string()),
        }
    }

    let selected = match parallelism {
        Parallelism::Sequential => select_first_seen(&results),
        Parallelism::Parallel => select_sorted(&results),
    };

    let exhausted = selected.is_none();
    if exhausted {
        logger.log_exhausted(results.len());
    }
    let (best, best_score) = selected.unwrap_or((CandidateConfig::FALLBACK, f64::NEG_INFINITY));
    Ok(SearchOutcome { best, best_score, exhausted, results })
}

fn successes(results: &[CandidateResult]) -> impl Iterator<Item = (CandidateConfig, f64)> + '_ {
    results.iter().filter_map(|r| r.outcome.as_ref().ok().map(|&score| (r.config, score)))
}

/// Running-best fold over successful candidates; a later candidate replaces
/// the best only when strictly better. `None` if every candidate failed.
fn select_first_seen(results: &[CandidateResult]) -> Option<(CandidateConfig, f64)> {
    successes(results).fold(None, |best, (config, score)| match best {
        Some((_, best_score)) if score <= best_score => best,
        _ => Some((config, score)),
    })
}

/// Stable sort of successful candidates by descending score, then take the head.
fn select_sorted(results: &[CandidateResult]) -> Option<(CandidateConfig, f64)> {
    let mut ranked: Vec<(CandidateConfig, f64)> = successes(results).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.first().copied()
}

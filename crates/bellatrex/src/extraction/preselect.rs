//! Pre-selection: keep the trees whose prediction best matches the ensemble.

use super::ExtractionError;
use crate::data::Sample;
use crate::ensemble::Ensemble;
use crate::fidelity::FidelityMeasure;

/// Rank all trees by `criterion` against the ensemble prediction and keep the
/// best `n_trees`.
///
/// Ties keep ascending index order.
///
/// # Errors
///
/// [`ExtractionError::TooManyTrees`] if `n_trees` is zero or exceeds the
/// ensemble size; ensemble errors from prediction.
pub fn preselect_trees(
    ensemble: &dyn Ensemble,
    sample: &Sample,
    criterion: FidelityMeasure,
    n_trees: usize,
) -> Result<Vec<usize>, ExtractionError> {
    let n_estimators = ensemble.n_estimators();
    if n_trees == 0 || n_trees > n_estimators {
        return Err(ExtractionError::TooManyTrees { requested: n_trees, n_estimators });
    }

    let reference = ensemble.predict(sample)?;
    let mut ranked = (0..n_estimators)
        .map(|idx| {
            let prediction = ensemble.predict_tree(idx, sample)?;
            Ok((idx, criterion.score(&prediction, &reference)?))
        })
        .collect::<Result<Vec<(usize, f64)>, ExtractionError>>()?;

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranked.into_iter().take(n_trees).map(|(idx, _)| idx).collect())
}

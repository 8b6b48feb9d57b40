//! Principal component projection.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2, Axis};

use super::ExtractionError;

/// Project `points` (`[n_points, n_features]`) onto their top `n_dims`
/// principal components.
///
/// Components are ordered by decreasing explained variance.
///
/// # Errors
///
/// [`ExtractionError::InvalidDimensions`] if `n_dims` is zero or exceeds
/// `min(n_points, n_features)`.
pub fn project(points: ArrayView2<'_, f64>, n_dims: usize) -> Result<Array2<f64>, ExtractionError> {
    let (n_points, n_features) = points.dim();
    let max = n_points.min(n_features);
    if n_dims == 0 || n_dims > max {
        return Err(ExtractionError::InvalidDimensions { n_dims, max });
    }

    let Some(mean) = points.mean_axis(Axis(0)) else {
        return Err(ExtractionError::InvalidDimensions { n_dims, max });
    };
    let centered = &points - &mean;

    // Covariance: Σ = Xᵀ X / (n - 1)
    let denom = (n_points.saturating_sub(1)).max(1) as f64;
    let cov = centered.t().dot(&centered) / denom;
    let cov = DMatrix::from_fn(n_features, n_features, |i, j| cov[[i, j]]);
    let eigen = SymmetricEigen::new(cov);

    let mut order: Vec<usize> = (0..n_features).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let components = Array2::from_shape_fn((n_features, n_dims), |(j, k)| {
        eigen.eigenvectors[(j, order[k])]
    });
    Ok(centered.dot(&components))
}

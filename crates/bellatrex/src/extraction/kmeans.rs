//! K-means clustering.
//!
//! Lloyd's algorithm with k-means++ initialization from a seeded [`StdRng`],
//! so a fixed seed always yields the same clustering.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ExtractionError;

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster label of each point.
    pub labels: Vec<usize>,
    /// `[n_clusters, n_features]`.
    pub centroids: Array2<f64>,
    pub n_iter: usize,
}

impl Clustering {
    /// Number of points in each cluster.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Lloyd iterations before giving up.
const MAX_ITER: usize = 300;

/// K-means configuration.
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    n_clusters: usize,
    seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self { n_clusters, seed: 0 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cluster the rows of `points`.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::TooFewPoints`] if there are fewer distinct points
    ///   than clusters (or zero clusters requested)
    /// - [`ExtractionError::Convergence`] on non-finite input or when the
    ///   assignment is still changing after 300 iterations
    pub fn fit(&self, points: ArrayView2<'_, f64>) -> Result<Clustering, ExtractionError> {
        if points.iter().any(|v| !v.is_finite()) {
            return Err(ExtractionError::Convergence("non-finite coordinates".into()));
        }
        let n_distinct = count_distinct(points);
        if self.n_clusters == 0 || n_distinct < self.n_clusters {
            return Err(ExtractionError::TooFewPoints {
                n_points: n_distinct,
                n_clusters: self.n_clusters,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_plus_plus(points, &mut rng);
        let mut labels = assign(points, &centroids);

        for iter in 1..=MAX_ITER {
            centroids = update(points, &labels, &centroids);
            let next = assign(points, &centroids);
            if next == labels {
                return Ok(Clustering { labels, centroids, n_iter: iter });
            }
            labels = next;
        }
        Err(ExtractionError::Convergence(format!(
            "assignment still changing after {MAX_ITER} iterations"
        )))
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the nearest chosen one.
    fn init_plus_plus(&self, points: ArrayView2<'_, f64>, rng: &mut StdRng) -> Array2<f64> {
        let n_points = points.nrows();
        let mut centroids = Array2::zeros((self.n_clusters, points.ncols()));
        centroids.row_mut(0).assign(&points.row(rng.gen_range(0..n_points)));

        let mut nearest: Vec<f64> =
            points.rows().into_iter().map(|p| squared_distance(p, centroids.row(0))).collect();

        for k in 1..self.n_clusters {
            let total: f64 = nearest.iter().sum();
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = n_points - 1;
            for (i, &d) in nearest.iter().enumerate() {
                if d > 0.0 && target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            // Float drift can land past the end; fall back to the farthest point.
            if nearest[chosen] == 0.0 {
                chosen = argmax(&nearest);
            }
            centroids.row_mut(k).assign(&points.row(chosen));
            for (i, p) in points.rows().into_iter().enumerate() {
                nearest[i] = nearest[i].min(squared_distance(p, centroids.row(k)));
            }
        }
        centroids
    }
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Nearest centroid for each point; ties go to the lower cluster index.
fn assign(points: ArrayView2<'_, f64>, centroids: &Array2<f64>) -> Vec<usize> {
    points
        .rows()
        .into_iter()
        .map(|p| {
            centroids
                .rows()
                .into_iter()
                .enumerate()
                .fold((0, f64::INFINITY), |best, (k, c)| {
                    let d = squared_distance(p, c);
                    if d < best.1 {
                        (k, d)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Mean of each cluster's members; empty clusters keep their centroid.
fn update(points: ArrayView2<'_, f64>, labels: &[usize], centroids: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];
    for (p, &label) in points.rows().into_iter().zip(labels) {
        let mut row = sums.row_mut(label);
        row += &p;
        counts[label] += 1;
    }
    for (k, &count) in counts.iter().enumerate() {
        if count == 0 {
            sums.row_mut(k).assign(&centroids.row(k));
        } else {
            sums.row_mut(k).mapv_inplace(|v| v / count as f64);
        }
    }
    sums
}

fn count_distinct(points: ArrayView2<'_, f64>) -> usize {
    let mut distinct: Vec<ArrayView1<'_, f64>> = Vec::new();
    for p in points.rows() {
        if !distinct.iter().any(|q| *q == p) {
            distinct.push(p);
        }
    }
    distinct.len()
}

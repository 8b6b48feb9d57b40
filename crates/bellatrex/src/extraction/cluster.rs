//! The built-in pre-select, project, cluster extractor.

use ndarray::Array2;

use super::kmeans::{squared_distance, KMeans};
use super::pca;
use super::preselect::preselect_trees;
use super::represent::{represent_trees, Representation};
use super::{Extraction, ExtractionError, ExtractionTask, TreeExtractor};
use crate::fidelity::FidelityMeasure;

/// Projection applied before clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Pca,
}

impl Projection {
    fn parse(name: &str) -> Result<Self, ExtractionError> {
        match name {
            "PCA" => Ok(Self::Pca),
            other => Err(ExtractionError::UnknownMethod { kind: "projection method", name: other.into() }),
        }
    }
}

/// Pre-selects trees close to the ensemble prediction, clusters their
/// representations, and keeps the member nearest each centroid.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterExtractor;

impl ClusterExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TreeExtractor for ClusterExtractor {
    fn extract(&self, task: &ExtractionTask<'_>) -> Result<Extraction, ExtractionError> {
        let methods = task.methods;
        let criterion: FidelityMeasure = methods.pre_select_trees.parse()?;
        let representation = Representation::parse(&methods.dissim_method, &methods.feature_represent)?;
        let projection = Projection::parse(&methods.proj_method)?;

        let preselected =
            preselect_trees(task.ensemble, task.sample, criterion, task.config.n_trees)?;
        let points = represent_trees(task.ensemble, task.sample, &preselected, representation)?;
        let points = match (projection, task.config.n_dims) {
            (_, None) => points,
            (Projection::Pca, Some(n_dims)) => pca::project(points.view(), n_dims)?,
        };

        let clustering = KMeans::new(task.config.n_clusters)
            .with_seed(methods.seed)
            .fit(points.view())?;

        let (final_trees_idx, cluster_sizes) =
            representatives(&points, &clustering.labels, &clustering.centroids, &preselected);
        let extraction = Extraction { final_trees_idx, cluster_sizes, preselected };
        extraction.validate()?;
        Ok(extraction)
    }
}

/// For each non-empty cluster, the member nearest its centroid (lowest
/// pre-selection rank on ties) and the cluster size.
fn representatives(
    points: &Array2<f64>,
    labels: &[usize],
    centroids: &Array2<f64>,
    tree_ids: &[usize],
) -> (Vec<usize>, Vec<usize>) {
    let mut trees = Vec::with_capacity(centroids.nrows());
    let mut sizes = Vec::with_capacity(centroids.nrows());

    for (k, centroid) in centroids.rows().into_iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        let mut size = 0;
        for (i, &label) in labels.iter().enumerate() {
            if label != k {
                continue;
            }
            size += 1;
            let d = squared_distance(points.row(i), centroid);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        if let Some((i, _)) = best {
            trees.push(tree_ids[i]);
            sizes.push(size);
        }
    }
    (trees, sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::extraction::ExtractionMethods;
    use crate::grid::CandidateConfig;
    use crate::testing::{constant_ensemble, default_methods};

    fn task<'a>(
        ensemble: &'a dyn crate::ensemble::Ensemble,
        sample: &'a Sample,
        methods: &'a ExtractionMethods,
        config: CandidateConfig,
    ) -> ExtractionTask<'a> {
        ExtractionTask { ensemble, sample, methods, config }
    }

    #[test]
    fn prediction_clusters_pick_one_tree_per_level() {
        let ensemble = constant_ensemble(&[1.0, 1.1, 3.0, 3.1, 0.9, 2.9]);
        let sample = Sample::from_values(vec![0.0]);
        let methods = ExtractionMethods { dissim_method: "predictions".into(), ..default_methods() };
        let config = CandidateConfig { n_trees: 6, n_dims: None, n_clusters: 2 };

        let extraction = ClusterExtractor.extract(&task(&ensemble, &sample, &methods, config)).unwrap();
        assert_eq!(extraction.total_size(), 6);
        assert_eq!(extraction.final_trees_idx.len(), 2);
        assert_eq!(extraction.preselected.len(), 6);

        let mut sizes = extraction.cluster_sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3]);
    }

    #[test]
    fn representative_is_nearest_member() {
        let points = ndarray::array![[0.0], [1.0], [2.5], [10.0]];
        let centroids = ndarray::array![[1.0], [10.0]];
        let (trees, sizes) = representatives(&points, &[0, 0, 0, 1], &centroids, &[7, 5, 3, 9]);
        assert_eq!(trees, vec![5, 9]);
        assert_eq!(sizes, vec![3, 1]);
    }

    #[test]
    fn unknown_methods_fail() {
        let ensemble = constant_ensemble(&[1.0, 2.0]);
        let sample = Sample::from_values(vec![0.0]);
        let config = CandidateConfig { n_trees: 2, n_dims: None, n_clusters: 1 };

        for methods in [
            ExtractionMethods { proj_method: "TSNE".into(), ..default_methods() },
            ExtractionMethods { pre_select_trees: "L7".into(), ..default_methods() },
            ExtractionMethods { dissim_method: "paths".into(), ..default_methods() },
        ] {
            let err = ClusterExtractor.extract(&task(&ensemble, &sample, &methods, config)).unwrap_err();
            assert!(matches!(err, ExtractionError::UnknownMethod { .. }), "{err}");
        }
    }

    #[test]
    fn too_many_clusters_fail() {
        // Constant trees share one rule representation.
        let ensemble = constant_ensemble(&[1.0, 2.0, 3.0]);
        let sample = Sample::from_values(vec![0.0]);
        let methods = default_methods();
        let config = CandidateConfig { n_trees: 3, n_dims: None, n_clusters: 2 };
        assert!(matches!(
            ClusterExtractor.extract(&task(&ensemble, &sample, &methods, config)),
            Err(ExtractionError::TooFewPoints { .. })
        ));
    }

    #[test]
    fn projection_dimension_is_checked() {
        let ensemble = constant_ensemble(&[1.0, 2.0, 3.0]);
        let sample = Sample::from_values(vec![0.0]);
        let methods = ExtractionMethods { dissim_method: "predictions".into(), ..default_methods() };
        let config = CandidateConfig { n_trees: 3, n_dims: Some(2), n_clusters: 1 };
        assert!(matches!(
            ClusterExtractor.extract(&task(&ensemble, &sample, &methods, config)),
            Err(ExtractionError::InvalidDimensions { n_dims: 2, max: 1 })
        ));
    }
}

//! Explainer behaviour from configuration to result and rule files.

use approx::assert_abs_diff_eq;
use ndarray::array;

use bellatrex::config::{ConfigError, Setup};
use bellatrex::ensemble::schema::{EnsembleSchema, TreeSchema};
use bellatrex::ensemble::{Ensemble, EnsembleError, EnsembleProfile, OutputSemantics, SerializedEnsemble};
use bellatrex::grid::{AxisValue, CandidateConfig, GridSpec, N_CLUSTERS, N_DIMS, N_TREES};
use bellatrex::testing::{constant_ensemble, random_forest, random_table, FailingExtractor, FixedExtractor, OnlyExtractor};
use bellatrex::{ExplainError, Explainer, ExplainerConfig, FidelityMeasure, Table, Verbosity};

fn config(grid: GridSpec, verbosity: Verbosity) -> ExplainerConfig {
    ExplainerConfig::builder().param_grid(grid).verbosity(verbosity).build().unwrap()
}

fn default_grid() -> GridSpec {
    GridSpec::new()
        .with_axis(N_TREES, vec![AxisValue::Float(0.2), AxisValue::Float(0.5), AxisValue::Float(0.8)])
        .with_axis(N_DIMS, vec![AxisValue::Int(2), AxisValue::Null])
        .with_axis(N_CLUSTERS, vec![AxisValue::Int(1), AxisValue::Int(2), AxisValue::Int(3)])
}

#[test]
fn two_constant_trees_average_to_their_mean() {
    let grid = GridSpec::new().with_axis(N_TREES, AxisValue::Int(2)).with_axis(N_CLUSTERS, AxisValue::Int(2));
    let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(grid, Verbosity::Silent))
        .with_extractor(FixedExtractor::new(vec![0, 1], vec![1, 1]));
    explainer.prepare().unwrap();

    let table = Table::from_array(array![[0.5]]);
    let result = explainer.explain(&table, 0, None).unwrap();

    assert_eq!(result.local_prediction(), &[2.0]);
    assert_eq!(result.cluster_sizes.iter().sum::<usize>(), result.final_trees_idx.len());
    assert_abs_diff_eq!(result.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

#[test]
fn surrogate_is_a_convex_combination_of_selected_trees() {
    let ensemble = random_forest(25, 4, 3, OutputSemantics::ClassProbability, 2, 11);
    let mut explainer = Explainer::new(ensemble, config(default_grid(), Verbosity::Silent));
    explainer.prepare().unwrap();
    let table = random_table(4, 4, 2);

    for idx in 0..table.n_samples() {
        let result = explainer.explain(&table, idx, None).unwrap();
        assert!(!result.exhausted);
        assert_eq!(result.n_trees_selected(), result.best_params.n_trees);
        assert_eq!(result.final_trees_idx.len(), result.cluster_sizes.len());
        assert!(result.final_trees_idx.len() <= result.best_params.n_clusters);

        let sample = table.sample(idx).unwrap();
        let ensemble = explainer.ensemble();
        let mut expected = vec![0.0; 2];
        for (&tree, weight) in result.final_trees_idx.iter().zip(result.weights()) {
            for (e, v) in expected.iter_mut().zip(ensemble.predict_tree(tree, &sample).unwrap()) {
                *e += weight * v;
            }
        }
        for (got, want) in result.local_prediction().iter().zip(&expected) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(
            result.score(FidelityMeasure::L2, None).unwrap(),
            result.sample_score,
            epsilon = 1e-12
        );
        assert_eq!(result.search_score, result.sample_score);
    }
}

#[test]
fn explain_is_idempotent() {
    let ensemble = random_forest(30, 3, 3, OutputSemantics::Regression, 1, 4);
    let mut explainer = Explainer::new(ensemble, config(default_grid(), Verbosity::Silent));
    explainer.prepare().unwrap();
    let table = random_table(3, 3, 9);

    let first = explainer.explain(&table, 1, None).unwrap();
    let second = explainer.explain(&table, 1, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn exhausted_search_materializes_the_fallback() {
    let grid = GridSpec::new().with_axis(N_CLUSTERS, vec![AxisValue::Int(1), AxisValue::Int(3)]);
    let ensemble = random_forest(25, 3, 2, OutputSemantics::Regression, 1, 8);
    let mut explainer = Explainer::new(ensemble, config(grid, Verbosity::Silent))
        .with_extractor(OnlyExtractor { n_clusters: 2 });
    explainer.prepare().unwrap();
    let table = random_table(1, 3, 0);

    let result = explainer.explain(&table, 0, None).unwrap();
    assert!(result.exhausted);
    assert_eq!(result.best_params, CandidateConfig::FALLBACK);
    assert_eq!(result.final_trees_idx, (0..20).collect::<Vec<_>>());
    assert!(result.sample_score.is_finite());
}

#[test]
fn unmaterializable_fallback_is_an_error() {
    let ensemble = random_forest(25, 3, 2, OutputSemantics::Regression, 1, 8);
    let mut explainer = Explainer::new(ensemble, config(default_grid(), Verbosity::Silent))
        .with_extractor(FailingExtractor);
    explainer.prepare().unwrap();
    let table = random_table(1, 3, 0);

    match explainer.explain(&table, 0, None) {
        Err(ExplainError::Materialization { config, .. }) => assert_eq!(config, CandidateConfig::FALLBACK),
        other => panic!("expected materialization failure, got {other:?}"),
    }
}

#[test]
fn rule_files_are_written_at_info() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("explanation.txt");

    let ensemble = random_forest(12, 3, 2, OutputSemantics::Regression, 1, 6);
    let n_estimators = ensemble.n_estimators();
    let mut explainer = Explainer::new(ensemble, config(default_grid(), Verbosity::Info));
    explainer.prepare().unwrap();
    let table = random_table(2, 3, 1);

    let result = explainer.explain(&table, 0, Some(&out)).unwrap();

    let main = std::fs::read_to_string(&out).unwrap();
    assert_eq!(main.matches("weight").count(), result.final_trees_idx.len());
    assert!(main.ends_with(&format!("Bellatrex prediction: {}", result.prediction_string())));

    let extra = std::fs::read_to_string(dir.path().join("explanation-extra.txt")).unwrap();
    assert_eq!(
        extra.matches("weight -1.0000").count(),
        n_estimators - result.final_trees_idx.len()
    );
}

#[test]
fn no_rule_files_below_info() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("explanation.txt");

    let ensemble = random_forest(12, 3, 2, OutputSemantics::Regression, 1, 6);
    let mut explainer = Explainer::new(ensemble, config(default_grid(), Verbosity::Warning));
    explainer.prepare().unwrap();
    let table = random_table(2, 3, 1);

    explainer.explain(&table, 0, Some(&out)).unwrap();
    assert!(!out.exists());
}

#[test]
fn force_refit_without_trainer_fails() {
    let mut explainer = Explainer::new(constant_ensemble(&[1.0, 2.0]), ExplainerConfig::builder().force_refit(true).build().unwrap());
    let x = array![[0.0], [1.0]];
    let err = explainer.fit(x.view(), x.view()).unwrap_err();
    assert!(matches!(err, ExplainError::Ensemble(EnsembleError::NotTrainable(_))));
}

/// Stumps with `n_times` cumulative hazards per leaf and no declared capabilities.
fn undeclared_hazard_stumps(n_trees: usize, n_times: usize) -> SerializedEnsemble {
    let trees = (0..n_trees)
        .map(|i| {
            let low: Vec<f64> = (0..n_times).map(|t| 0.01 * (t + 1) as f64).collect();
            let high: Vec<f64> = (0..n_times).map(|t| 0.05 * (t + i + 1) as f64).collect();
            TreeSchema {
                children_left: vec![1, -1, -1],
                children_right: vec![2, -1, -1],
                feature: vec![(i % 2) as i64, -2, -2],
                threshold: vec![(i as f64 + 0.5) / n_trees as f64, -2.0, -2.0],
                default_left: None,
                value: vec![vec![0.0; n_times], low, high],
            }
        })
        .collect();
    let schema = EnsembleSchema { n_estimators: None, capabilities: None, trees };
    SerializedEnsemble::from_schema(&schema).unwrap()
}

fn survival_config() -> ExplainerConfig {
    ExplainerConfig::builder()
        .setup(Setup::Profile(EnsembleProfile::Survival))
        .verbosity(Verbosity::Silent)
        .build()
        .unwrap()
}

#[test]
fn explicit_survival_setup_explains_one_risk_score() {
    let mut explainer = Explainer::new(undeclared_hazard_stumps(10, 4), survival_config());
    explainer.prepare().unwrap();
    assert_eq!(explainer.profile(), Some(EnsembleProfile::Survival));

    let table = random_table(2, 2, 3);
    let result = explainer.explain(&table, 0, None).unwrap();
    assert_eq!(result.profile, EnsembleProfile::Survival);
    assert_eq!(result.local_prediction().len(), 1);
    assert_eq!(result.ensemble_prediction().len(), 1);
    assert!(matches!(explainer.predict_survival_curve(&table, 0), Err(ExplainError::NotImplemented(_))));
}

#[test]
fn explicit_survival_setup_rejects_a_classifier() {
    let ensemble = random_forest(10, 3, 2, OutputSemantics::ClassProbability, 3, 2);
    let mut explainer = Explainer::new(ensemble, survival_config());
    assert!(matches!(
        explainer.prepare().map(|_| ()),
        Err(ExplainError::Config(ConfigError::ProfileMismatch {
            requested: EnsembleProfile::Survival,
            detected: EnsembleProfile::MultiLabel,
        }))
    ));
    assert!(explainer.profile().is_none());
}

//! The explainer façade: fit once, explain many samples.

use std::fmt;
use std::path::Path;

use ndarray::{Array2, ArrayView2};

use super::report::{format_prediction, render_rules_inline, write_rule_files};
use super::{ExplainError, ExplanationResult};
use crate::config::{ExplainerConfig, Setup};
use crate::data::{DataError, Sample, Table};
use crate::ensemble::{Capabilities, Ensemble, EnsembleProfile, ResolvedEnsemble};
use crate::extraction::{ClusterExtractor, TreeExtractor};
use crate::fidelity::FidelityMeasure;
use crate::grid::ParamGrid;
use crate::logger::{SearchLogger, Verbosity};
use crate::search::{extract_and_score, run_search, SearchContext};

/// State derived by [`Explainer::fit`].
#[derive(Debug, Clone)]
struct Fitted {
    profile: EnsembleProfile,
    capabilities: Capabilities,
    grid: ParamGrid,
}

/// Explains single predictions of a tree ensemble.
///
/// # Example
///
/// ```
/// use bellatrex::{Explainer, ExplainerConfig, Table};
/// use bellatrex::ensemble::OutputSemantics;
/// use bellatrex::grid::{AxisValue, GridSpec};
/// use bellatrex::testing::{random_forest, random_table};
///
/// let ensemble = random_forest(30, 4, 3, OutputSemantics::Regression, 1, 0);
/// let grid = GridSpec::new()
///     .with_axis("n_trees", vec![AxisValue::Float(0.5), AxisValue::Float(1.0)])
///     .with_axis("n_clusters", vec![AxisValue::Int(1), AxisValue::Int(2)]);
/// let config = ExplainerConfig::builder().param_grid(grid).build().unwrap();
///
/// let mut explainer = Explainer::new(ensemble, config);
/// explainer.prepare().unwrap();
///
/// let table = random_table(5, 4, 1);
/// let result = explainer.explain(&table, 0, None).unwrap();
/// assert_eq!(result.n_trees_selected(), result.best_params.n_trees);
/// ```
pub struct Explainer<E: Ensemble> {
    ensemble: E,
    config: ExplainerConfig,
    extractor: Box<dyn TreeExtractor>,
    oracle: Option<Array2<f64>>,
    fitted: Option<Fitted>,
}

impl<E: Ensemble + fmt::Debug> fmt::Debug for Explainer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explainer")
            .field("ensemble", &self.ensemble)
            .field("config", &self.config)
            .field("has_oracle", &self.oracle.is_some())
            .field("profile", &self.fitted.as_ref().map(|s| s.profile))
            .finish()
    }
}

impl<E: Ensemble> Explainer<E> {
    /// Explainer using the built-in [`ClusterExtractor`].
    pub fn new(ensemble: E, config: ExplainerConfig) -> Self {
        Self { ensemble, config, extractor: Box::new(ClusterExtractor), oracle: None, fitted: None }
    }

    /// Replace the tree extractor.
    pub fn with_extractor(mut self, extractor: impl TreeExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Score candidates against oracle labels (`[n_samples, n_outputs]`, row
    /// `i` belonging to sample `i`) instead of the ensemble's own prediction.
    pub fn with_oracle(mut self, oracle: Array2<f64>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn ensemble(&self) -> &E {
        &self.ensemble
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Scenario resolved by the last fit.
    pub fn profile(&self) -> Option<EnsembleProfile> {
        self.fitted.as_ref().map(|s| s.profile)
    }

    /// Validated grid from the last fit.
    pub fn param_grid(&self) -> Option<&ParamGrid> {
        self.fitted.as_ref().map(|s| &s.grid)
    }

    /// Fit the ensemble if it is unfitted (or `force_refit` is set), then
    /// validate the grid and resolve the scenario.
    ///
    /// # Errors
    ///
    /// Ensemble fitting errors and [`ConfigError`](crate::ConfigError)s.
    pub fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> Result<&mut Self, ExplainError> {
        let logger = SearchLogger::new(self.config.verbosity);
        if self.config.force_refit || !self.ensemble.is_fitted() {
            logger.info(format!("fitting ensemble on {} samples", features.nrows()));
            self.ensemble.fit(features, targets, self.config.n_jobs)?;
            logger.info("fitting complete");
        }
        self.prepare_with(&logger)
    }

    /// Validate the grid and resolve the scenario for an already fitted
    /// ensemble.
    ///
    /// # Errors
    ///
    /// [`EnsembleError::NotFitted`](crate::ensemble::EnsembleError::NotFitted)
    /// if the ensemble holds no trees, otherwise as [`Explainer::fit`].
    pub fn prepare(&mut self) -> Result<&mut Self, ExplainError> {
        if !self.ensemble.is_fitted() {
            return Err(crate::ensemble::EnsembleError::NotFitted.into());
        }
        let logger = SearchLogger::new(self.config.verbosity);
        self.prepare_with(&logger)
    }

    fn prepare_with(&mut self, logger: &SearchLogger) -> Result<&mut Self, ExplainError> {
        let grid = self.config.param_grid.validate(self.ensemble.n_estimators())?;
        if !grid.ignored_keys.is_empty() {
            logger.warn(format!(
                "ignoring unrecognized hyperparameters {:?}; expected n_trees, n_dims, n_clusters",
                grid.ignored_keys
            ));
        }

        let declared = self.ensemble.capabilities();
        let (profile, capabilities) = match (self.config.setup, declared) {
            (Setup::Profile(profile), _) => {
                let leaf_arity = self.ensemble.tree(0)?.leaf_arity();
                (profile, profile.resolve(declared, leaf_arity)?)
            }
            (Setup::Auto, Some(caps)) => {
                let profile = EnsembleProfile::detect(Some(caps))?;
                logger.info(format!("automatically set scenario to {profile}"));
                (profile, caps)
            }
            (Setup::Auto, None) => return Err(crate::config::ConfigError::UnrecognizedEnsemble.into()),
        };
        self.fitted = Some(Fitted { profile, capabilities, grid });
        Ok(self)
    }

    fn fitted(&self) -> Result<&Fitted, ExplainError> {
        self.fitted.as_ref().ok_or(ExplainError::NotFitted)
    }

    /// The ensemble as seen under the resolved scenario.
    fn resolved(&self, fitted: &Fitted) -> ResolvedEnsemble<'_> {
        ResolvedEnsemble::new(&self.ensemble, fitted.capabilities)
    }

    fn sample(&self, table: &Table, idx: usize) -> Result<Sample, ExplainError> {
        let expected = self.ensemble.n_features();
        if table.n_features() < expected {
            return Err(ExplainError::FeatureMismatch { got: table.n_features(), expected });
        }
        table.sample(idx).map_err(|err| match err {
            DataError::RowOutOfRange { idx, n_rows } => {
                ExplainError::SampleOutOfRange { idx, n_samples: n_rows }
            }
            DataError::ColumnCountMismatch { n_features, .. } => {
                ExplainError::FeatureMismatch { got: n_features, expected }
            }
        })
    }

    fn oracle_row(&self, ensemble: &dyn Ensemble, idx: usize) -> Result<Option<Vec<f64>>, ExplainError> {
        let Some(oracle) = &self.oracle else {
            return Ok(None);
        };
        if idx >= oracle.nrows() {
            return Err(ExplainError::SampleOutOfRange { idx, n_samples: oracle.nrows() });
        }
        let expected = ensemble.output_arity();
        if oracle.ncols() != expected {
            return Err(ExplainError::OracleMismatch { got: oracle.ncols(), expected });
        }
        Ok(Some(oracle.row(idx).to_vec()))
    }

    /// Explain the prediction for row `idx` of `table`.
    ///
    /// Searches the grid for the configuration whose surrogate best matches
    /// the target, re-extracts the winner, and returns its selected trees,
    /// weights, and prediction. With verbosity at least `Info` and an
    /// `out_file`, the selected rules are written there and all other trees
    /// to a `-extra.txt` companion.
    ///
    /// # Errors
    ///
    /// - [`ExplainError::NotFitted`] before [`fit`](Self::fit) or [`prepare`](Self::prepare)
    /// - [`ExplainError::SampleOutOfRange`] for a bad `idx`
    /// - [`ExplainError::Materialization`] if the winning (or fallback)
    ///   configuration cannot be extracted again
    ///
    /// Candidate failures and report I/O errors are only logged.
    pub fn explain(
        &self,
        table: &Table,
        idx: usize,
        out_file: Option<&Path>,
    ) -> Result<ExplanationResult, ExplainError> {
        let fitted = self.fitted()?;
        let ensemble = self.resolved(fitted);
        let sample = self.sample(table, idx)?;
        let oracle = self.oracle_row(&ensemble, idx)?;
        let mut logger = SearchLogger::new(self.config.verbosity);
        if let Some(oracle) = &oracle {
            logger.debug(format!("oracle for sample {idx}: {}", format_prediction(oracle)));
        }

        let ensemble_prediction = ensemble.predict(&sample)?;
        let target = oracle.as_deref().unwrap_or(&ensemble_prediction);
        let methods = self.config.extraction_methods();
        let context = SearchContext { ensemble: &ensemble, sample: &sample, methods: &methods, target };

        let outcome =
            run_search(self.extractor.as_ref(), &context, &fitted.grid, self.config.n_jobs, &mut logger)?;

        let materialize = || -> Result<_, crate::extraction::ExtractionError> {
            let measure: FidelityMeasure = methods.fidelity_measure.parse()?;
            let scored = extract_and_score(self.extractor.as_ref(), &context.task(outcome.best))?;
            Ok((measure, scored))
        };
        let (measure, scored) = materialize()
            .map_err(|source| ExplainError::Materialization { config: outcome.best, source })?;

        logger.finish_search(&outcome.best, outcome.best_score);
        logger.info(format!("(tuned according to {measure})"));

        let result = ExplanationResult::assemble(
            scored,
            &outcome,
            measure,
            fitted.profile,
            ensemble_prediction,
        );
        self.report(&ensemble, &result, &sample, out_file, &logger);
        Ok(result)
    }

    /// Logging and rule files. Never fails.
    fn report(
        &self,
        ensemble: &dyn Ensemble,
        result: &ExplanationResult,
        sample: &Sample,
        out_file: Option<&Path>,
        logger: &SearchLogger,
    ) {
        logger.debug(format!("final trees indices: {:?}", result.final_trees_idx));
        logger.debug(format!("final cluster sizes: {:?}", result.cluster_sizes));

        let weights = result.weights();
        if let (Some(path), true) = (out_file, logger.enabled(Verbosity::Info)) {
            write_rule_files(
                path,
                ensemble,
                sample,
                &result.final_trees_idx,
                &weights,
                result.local_prediction(),
                logger,
            );
        }

        if logger.enabled(Verbosity::Debug) {
            for (&idx, &weight) in result.final_trees_idx.iter().zip(&weights) {
                match render_rules_inline(ensemble, sample, idx, weight) {
                    Ok(line) => logger.debug(line),
                    Err(err) => logger.warn(format!("could not render rules of tree {idx}: {err}")),
                }
            }
        }

        logger.info(format!("Bellatrex prediction: {}", result.prediction_string()));
        logger.info(format!("Black box prediction: {}", format_prediction(result.ensemble_prediction())));
    }

    /// Survival curve for row `idx`.
    ///
    /// # Errors
    ///
    /// [`ExplainError::WrongSetup`] outside the survival scenario, otherwise
    /// [`ExplainError::NotImplemented`].
    pub fn predict_survival_curve(&self, table: &Table, idx: usize) -> Result<Vec<f64>, ExplainError> {
        self.survival_placeholder(table, idx, "survival curve prediction")
    }

    /// Median survival time for row `idx`.
    ///
    /// # Errors
    ///
    /// As [`Explainer::predict_survival_curve`].
    pub fn predict_median_surv_time(&self, table: &Table, idx: usize) -> Result<f64, ExplainError> {
        self.survival_placeholder(table, idx, "median survival time prediction")
    }

    fn survival_placeholder<T>(&self, table: &Table, idx: usize, what: &'static str) -> Result<T, ExplainError> {
        let profile = self.fitted()?.profile;
        if !profile.is_survival() {
            return Err(ExplainError::WrongSetup(profile));
        }
        self.sample(table, idx)?;
        Err(ExplainError::NotImplemented(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::ensemble::{ForestModel, OutputSemantics};
    use crate::grid::{AxisValue, GridSpec, N_CLUSTERS, N_TREES};
    use crate::repr::{Forest, Tree};
    use crate::testing::{constant_ensemble, FixedExtractor};
    use ndarray::array;

    fn config(grid: GridSpec) -> ExplainerConfig {
        ExplainerConfig::builder().param_grid(grid).verbosity(Verbosity::Silent).build().unwrap()
    }

    fn small_grid() -> GridSpec {
        GridSpec::new()
            .with_axis(N_TREES, AxisValue::Int(2))
            .with_axis(N_CLUSTERS, AxisValue::Int(2))
    }

    #[test]
    fn explain_requires_fit() {
        let explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()));
        let table = Table::from_array(array![[0.0]]);
        assert!(matches!(explainer.explain(&table, 0, None), Err(ExplainError::NotFitted)));
    }

    #[test]
    fn prepare_resolves_scenario_and_grid() {
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()));
        explainer.prepare().unwrap();
        assert_eq!(explainer.profile(), Some(EnsembleProfile::Regression));
        assert_eq!(explainer.param_grid().unwrap().n_trees, vec![2]);
    }

    #[test]
    fn invalid_grid_is_a_config_error() {
        let grid = GridSpec::new().with_axis(N_TREES, AxisValue::Int(5));
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(grid));
        assert!(matches!(
            explainer.prepare(),
            Err(ExplainError::Config(ConfigError::TooManyTrees { .. }))
        ));
    }

    #[test]
    fn explicit_setup_must_agree_with_declared_outputs() {
        let cfg = |profile| {
            ExplainerConfig::builder()
                .param_grid(small_grid())
                .setup(Setup::Profile(profile))
                .verbosity(Verbosity::Silent)
                .build()
                .unwrap()
        };
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), cfg(EnsembleProfile::Regression));
        explainer.prepare().unwrap();
        assert_eq!(explainer.profile(), Some(EnsembleProfile::Regression));

        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), cfg(EnsembleProfile::MultiTarget));
        assert!(matches!(
            explainer.prepare().map(|_| ()),
            Err(ExplainError::Config(ConfigError::ProfileMismatch {
                requested: EnsembleProfile::MultiTarget,
                detected: EnsembleProfile::Regression,
            }))
        ));
    }

    #[test]
    fn fixed_selection_averages_constant_trees() {
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()))
            .with_extractor(FixedExtractor::new(vec![0, 1], vec![1, 1]));
        explainer.prepare().unwrap();
        let table = Table::from_array(array![[0.0], [1.0]]);

        let result = explainer.explain(&table, 1, None).unwrap();
        assert_eq!(result.local_prediction(), &[2.0]);
        assert_eq!(result.sample_score, 0.0);
        assert!(!result.exhausted);
    }

    #[test]
    fn oracle_changes_the_target() {
        let oracle = array![[2.5], [0.0]];
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()))
            .with_extractor(FixedExtractor::new(vec![0, 1], vec![1, 1]))
            .with_oracle(oracle);
        explainer.prepare().unwrap();
        let table = Table::from_array(array![[0.0], [1.0]]);

        let result = explainer.explain(&table, 0, None).unwrap();
        approx::assert_abs_diff_eq!(result.sample_score, -0.5, epsilon = 1e-12);

        assert!(matches!(
            explainer.explain(&Table::from_array(array![[0.0], [1.0], [2.0]]), 2, None),
            Err(ExplainError::SampleOutOfRange { idx: 2, n_samples: 2 })
        ));
    }

    #[test]
    fn sample_out_of_range() {
        let mut explainer = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()));
        explainer.prepare().unwrap();
        let table = Table::from_array(array![[0.0]]);
        assert!(matches!(
            explainer.explain(&table, 4, None),
            Err(ExplainError::SampleOutOfRange { idx: 4, n_samples: 1 })
        ));
    }

    #[test]
    fn survival_placeholders() {
        let mut regression = Explainer::new(constant_ensemble(&[1.0, 3.0]), config(small_grid()));
        regression.prepare().unwrap();
        let table = Table::from_array(array![[0.0]]);
        assert!(matches!(
            regression.predict_survival_curve(&table, 0),
            Err(ExplainError::WrongSetup(EnsembleProfile::Regression))
        ));

        let forest = Forest::from_trees(vec![Tree::constant(vec![0.1, 0.2]), Tree::constant(vec![0.3, 0.4])])
            .unwrap();
        let model = ForestModel::fitted(forest, OutputSemantics::CumulativeHazard { n_unique_times: 2 }).unwrap();
        let mut survival = Explainer::new(model, config(small_grid()));
        survival.prepare().unwrap();
        assert_eq!(survival.profile(), Some(EnsembleProfile::Survival));
        assert!(matches!(
            survival.predict_median_surv_time(&table, 0),
            Err(ExplainError::NotImplemented(_))
        ));
    }
}

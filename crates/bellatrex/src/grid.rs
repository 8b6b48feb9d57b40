//! Hyperparameter grid: parsing, validation, and enumeration.
//!
//! A [`GridSpec`] maps the three recognized axis names to one value or a list
//! of values, exactly as a user (or a JSON file) supplies them. Validating it
//! against the ensemble size yields a [`ParamGrid`] whose `n_trees` axis holds
//! absolute tree counts, and whose Cartesian product is the list of
//! [`CandidateConfig`]s the search evaluates.
//!
//! # Example
//!
//! ```
//! use bellatrex::grid::GridSpec;
//!
//! let spec = GridSpec::from_json(r#"{"n_trees": [0.2, 0.5], "n_clusters": 2}"#).unwrap();
//! let grid = spec.validate(100).unwrap();
//! assert_eq!(grid.n_trees, vec![20, 50]);
//! assert_eq!(grid.n_dims, vec![None]);
//! assert_eq!(grid.candidates().len(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Recognized axis names.
pub const N_TREES: &str = "n_trees";
pub const N_DIMS: &str = "n_dims";
pub const N_CLUSTERS: &str = "n_clusters";

const RECOGNIZED_AXES: [&str; 3] = [N_TREES, N_DIMS, N_CLUSTERS];

// =============================================================================
// Raw grid values
// =============================================================================

/// One raw axis value as supplied by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Int(i64),
    Float(f64),
    /// "No value", e.g. `n_dims = null` meaning no projection.
    Null,
}

impl AxisValue {
    fn as_f64(self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(i as f64),
            Self::Float(f) => Some(f),
            Self::Null => None,
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A single value or a list of values for one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisSpec {
    List(Vec<AxisValue>),
    Single(AxisValue),
}

impl AxisSpec {
    /// Normalize to a list.
    pub fn values(&self) -> Vec<AxisValue> {
        match self {
            Self::List(v) => v.clone(),
            Self::Single(v) => vec![*v],
        }
    }
}

impl From<Vec<AxisValue>> for AxisSpec {
    fn from(values: Vec<AxisValue>) -> Self {
        Self::List(values)
    }
}

impl From<AxisValue> for AxisSpec {
    fn from(value: AxisValue) -> Self {
        Self::Single(value)
    }
}

/// User-facing hyperparameter grid, keyed by axis name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridSpec {
    axes: BTreeMap<String, AxisSpec>,
}

impl Default for GridSpec {
    /// `n_trees = [0.2, 0.5, 0.8]`, `n_dims = [2, 5, null]`, `n_clusters = [1, 2, 3]`.
    fn default() -> Self {
        Self::new()
            .with_axis(N_TREES, floats(&[0.2, 0.5, 0.8]))
            .with_axis(N_DIMS, vec![AxisValue::Int(2), AxisValue::Int(5), AxisValue::Null])
            .with_axis(N_CLUSTERS, ints(&[1, 2, 3]))
    }
}

impl GridSpec {
    /// An empty spec; every recognized axis falls back to its default.
    pub fn new() -> Self {
        Self { axes: BTreeMap::new() }
    }

    /// Parse from JSON, e.g. `{"n_trees": [0.2, 0.5], "n_dims": null}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set (or replace) one axis.
    pub fn with_axis(mut self, name: impl Into<String>, spec: impl Into<AxisSpec>) -> Self {
        self.axes.insert(name.into(), spec.into());
        self
    }

    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.get(name)
    }

    /// Keys that are not one of the recognized axes.
    pub fn unknown_keys(&self) -> Vec<String> {
        self.axes
            .keys()
            .filter(|k| !RECOGNIZED_AXES.contains(&k.as_str()))
            .cloned()
            .collect()
    }

    /// Validate against an ensemble of `n_estimators` trees.
    ///
    /// Unknown keys are dropped (and reported in [`ParamGrid::ignored_keys`]);
    /// missing axes take their defaults: `n_trees = [0.2, 0.5, 0.8]`,
    /// `n_dims = [null]`, `n_clusters = [1, 2, 3]`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NonPositiveTrees`] if any `n_trees` value is `<= 0`
    /// - [`ConfigError::MixedTreeUnits`] if proportions and counts are mixed
    /// - [`ConfigError::TooManyTrees`] if the largest `n_trees` exceeds `n_estimators`
    /// - [`ConfigError::EmptyAxis`] / [`ConfigError::InvalidAxisValue`] for malformed axes
    pub fn validate(&self, n_estimators: usize) -> Result<ParamGrid, ConfigError> {
        let n_trees = match self.axes.get(N_TREES) {
            Some(spec) => spec.values(),
            None => floats(&[0.2, 0.5, 0.8]),
        };
        let n_dims = match self.axes.get(N_DIMS) {
            Some(spec) => spec.values(),
            None => vec![AxisValue::Null],
        };
        let n_clusters = match self.axes.get(N_CLUSTERS) {
            Some(spec) => spec.values(),
            None => ints(&[1, 2, 3]),
        };

        Ok(ParamGrid {
            n_trees: normalize_n_trees(&n_trees, n_estimators)?,
            n_dims: normalize_n_dims(&n_dims)?,
            n_clusters: normalize_n_clusters(&n_clusters)?,
            ignored_keys: self.unknown_keys(),
        })
    }
}

fn floats(values: &[f64]) -> Vec<AxisValue> {
    values.iter().copied().map(AxisValue::Float).collect()
}

fn ints(values: &[i64]) -> Vec<AxisValue> {
    values.iter().copied().map(AxisValue::Int).collect()
}

fn invalid(axis: &'static str, value: AxisValue) -> ConfigError {
    ConfigError::InvalidAxisValue { axis, value: value.to_string() }
}

/// Convert `n_trees` entries to absolute counts.
///
/// All-float lists within `(0, 1]` are proportions of `n_estimators`, rounded
/// half away from zero. Anything else must be an integral count.
fn normalize_n_trees(values: &[AxisValue], n_estimators: usize) -> Result<Vec<usize>, ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::EmptyAxis(N_TREES));
    }
    let numbers = values
        .iter()
        .map(|&v| v.as_f64().filter(|x| !x.is_nan()).ok_or_else(|| invalid(N_TREES, v)))
        .collect::<Result<Vec<f64>, _>>()?;

    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min <= 0.0 {
        return Err(ConfigError::NonPositiveTrees(min));
    }
    if min < 1.0 && max > 1.0 {
        return Err(ConfigError::MixedTreeUnits { min, max });
    }
    if max > n_estimators as f64 {
        return Err(ConfigError::TooManyTrees { requested: max, n_estimators });
    }

    let all_proportions = values.iter().all(|v| matches!(v, AxisValue::Float(_))) && max <= 1.0;
    if all_proportions {
        return numbers
            .iter()
            .map(|&p| {
                let count = (p * n_estimators as f64).round() as usize;
                if count == 0 {
                    Err(ConfigError::ProportionRoundsToZero { proportion: p, n_estimators })
                } else {
                    Ok(count)
                }
            })
            .collect();
    }

    values
        .iter()
        .zip(&numbers)
        .map(|(&v, &x)| if x.fract() == 0.0 { Ok(x as usize) } else { Err(invalid(N_TREES, v)) })
        .collect()
}

fn positive_int(axis: &'static str, value: AxisValue) -> Result<usize, ConfigError> {
    match value {
        AxisValue::Int(i) if i > 0 => Ok(i as usize),
        _ => Err(invalid(axis, value)),
    }
}

fn normalize_n_dims(values: &[AxisValue]) -> Result<Vec<Option<usize>>, ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::EmptyAxis(N_DIMS));
    }
    values
        .iter()
        .map(|&v| match v {
            AxisValue::Null => Ok(None),
            _ => positive_int(N_DIMS, v).map(Some),
        })
        .collect()
}

fn normalize_n_clusters(values: &[AxisValue]) -> Result<Vec<usize>, ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::EmptyAxis(N_CLUSTERS));
    }
    values.iter().map(|&v| positive_int(N_CLUSTERS, v)).collect()
}

// =============================================================================
// Validated grid
// =============================================================================

/// Validated grid: `n_trees` holds absolute counts `1..=n_estimators`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGrid {
    pub n_trees: Vec<usize>,
    pub n_dims: Vec<Option<usize>>,
    pub n_clusters: Vec<usize>,
    /// Unrecognized keys dropped during validation.
    pub ignored_keys: Vec<String>,
}

impl ParamGrid {
    /// Cartesian product of the three axes.
    ///
    /// Axes are iterated in name order (`n_clusters`, `n_dims`, `n_trees`)
    /// with the last one varying fastest, so the enumeration order is stable.
    pub fn candidates(&self) -> Vec<CandidateConfig> {
        self.n_clusters
            .iter()
            .flat_map(|&n_clusters| {
                self.n_dims.iter().flat_map(move |&n_dims| {
                    self.n_trees.iter().map(move |&n_trees| CandidateConfig {
                        n_trees,
                        n_dims,
                        n_clusters,
                    })
                })
            })
            .collect()
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.n_trees.len() * self.n_dims.len() * self.n_clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One concrete point in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub n_trees: usize,
    /// Projection dimensionality; `None` means no reduction.
    pub n_dims: Option<usize>,
    pub n_clusters: usize,
}

impl CandidateConfig {
    /// Configuration used when every candidate in the grid failed.
    pub const FALLBACK: Self = Self { n_trees: 20, n_dims: Some(2), n_clusters: 2 };
}

impl fmt::Display for CandidateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.n_dims {
            Some(d) => write!(
                f,
                "{{n_clusters: {}, n_dims: {}, n_trees: {}}}",
                self.n_clusters, d, self.n_trees
            ),
            None => write!(
                f,
                "{{n_clusters: {}, n_dims: None, n_trees: {}}}",
                self.n_clusters, self.n_trees
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn spec_with_trees(values: Vec<AxisValue>) -> GridSpec {
        GridSpec::new().with_axis(N_TREES, values)
    }

    #[test]
    fn proportions_convert_to_counts() {
        let grid = spec_with_trees(floats(&[0.2, 0.5, 0.8])).validate(100).unwrap();
        assert_eq!(grid.n_trees, vec![20, 50, 80]);
    }

    #[test]
    fn proportions_round_half_away_from_zero() {
        let grid = spec_with_trees(floats(&[0.25, 0.35])).validate(10).unwrap();
        assert_eq!(grid.n_trees, vec![3, 4]);
    }

    #[test]
    fn float_one_is_the_whole_ensemble() {
        let grid = spec_with_trees(floats(&[1.0])).validate(40).unwrap();
        assert_eq!(grid.n_trees, vec![40]);

        let grid = spec_with_trees(ints(&[1])).validate(40).unwrap();
        assert_eq!(grid.n_trees, vec![1]);
    }

    #[test]
    fn counts_are_kept() {
        let grid = spec_with_trees(ints(&[5, 10])).validate(10).unwrap();
        assert_eq!(grid.n_trees, vec![5, 10]);

        let grid = spec_with_trees(floats(&[20.0, 30.0])).validate(100).unwrap();
        assert_eq!(grid.n_trees, vec![20, 30]);
    }

    #[rstest]
    #[case(vec![AxisValue::Float(0.5), AxisValue::Int(2)])]
    #[case(vec![AxisValue::Float(0.1), AxisValue::Float(3.0)])]
    fn mixed_units_are_rejected(#[case] values: Vec<AxisValue>) {
        let err = spec_with_trees(values).validate(100).unwrap_err();
        assert!(matches!(err, ConfigError::MixedTreeUnits { .. }));
    }

    #[rstest]
    #[case(ints(&[-1]))]
    #[case(ints(&[0, 5]))]
    #[case(floats(&[0.0, 0.5]))]
    fn non_positive_is_rejected(#[case] values: Vec<AxisValue>) {
        let err = spec_with_trees(values).validate(100).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveTrees(_)));
    }

    #[test]
    fn too_many_trees_is_rejected() {
        let err = spec_with_trees(ints(&[150])).validate(100).unwrap_err();
        assert_eq!(err, ConfigError::TooManyTrees { requested: 150.0, n_estimators: 100 });
    }

    #[test]
    fn tiny_proportion_is_rejected() {
        let err = spec_with_trees(floats(&[0.01])).validate(10).unwrap_err();
        assert!(matches!(err, ConfigError::ProportionRoundsToZero { .. }));
    }

    #[test]
    fn fractional_count_is_rejected() {
        let err = spec_with_trees(floats(&[2.5])).validate(10).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAxisValue { axis: N_TREES, .. }));
    }

    #[test]
    fn missing_axes_take_defaults_and_unknown_keys_are_dropped() {
        let spec = GridSpec::new().with_axis("depth", AxisValue::Int(3));
        let grid = spec.validate(10).unwrap();
        assert_eq!(grid.n_trees, vec![2, 5, 8]);
        assert_eq!(grid.n_dims, vec![None]);
        assert_eq!(grid.n_clusters, vec![1, 2, 3]);
        assert_eq!(grid.ignored_keys, vec!["depth".to_string()]);
    }

    #[test]
    fn single_values_become_lists() {
        let spec = GridSpec::new()
            .with_axis(N_TREES, AxisValue::Int(4))
            .with_axis(N_DIMS, AxisValue::Null)
            .with_axis(N_CLUSTERS, AxisValue::Int(2));
        let grid = spec.validate(10).unwrap();
        assert_eq!(grid.candidates(), vec![CandidateConfig { n_trees: 4, n_dims: None, n_clusters: 2 }]);
    }

    #[test]
    fn invalid_dims_and_clusters_are_rejected() {
        let err = GridSpec::new().with_axis(N_DIMS, AxisValue::Float(1.5)).validate(10).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAxisValue { axis: N_DIMS, .. }));

        let err = GridSpec::new().with_axis(N_CLUSTERS, ints(&[0])).validate(10).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAxisValue { axis: N_CLUSTERS, .. }));

        let err = GridSpec::new().with_axis(N_CLUSTERS, Vec::<AxisValue>::new()).validate(10).unwrap_err();
        assert_eq!(err, ConfigError::EmptyAxis(N_CLUSTERS));
    }

    #[test]
    fn candidates_vary_n_trees_fastest() {
        let grid = ParamGrid {
            n_trees: vec![2, 4],
            n_dims: vec![None, Some(2)],
            n_clusters: vec![1, 3],
            ignored_keys: Vec::new(),
        };
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), grid.len());
        assert_eq!(candidates[0], CandidateConfig { n_trees: 2, n_dims: None, n_clusters: 1 });
        assert_eq!(candidates[1], CandidateConfig { n_trees: 4, n_dims: None, n_clusters: 1 });
        assert_eq!(candidates[2], CandidateConfig { n_trees: 2, n_dims: Some(2), n_clusters: 1 });
        assert_eq!(candidates[7], CandidateConfig { n_trees: 4, n_dims: Some(2), n_clusters: 3 });
    }

    #[test]
    fn parses_json_grid() {
        let spec = GridSpec::from_json(r#"{"n_trees": [0.5, 1.0], "n_dims": [2, null], "n_clusters": 2}"#)
            .unwrap();
        assert_eq!(spec.axis(N_CLUSTERS), Some(&AxisSpec::Single(AxisValue::Int(2))));
        let grid = spec.validate(8).unwrap();
        assert_eq!(grid.n_trees, vec![4, 8]);
        assert_eq!(grid.n_dims, vec![Some(2), None]);
    }

    #[test]
    fn fallback_display() {
        assert_eq!(CandidateConfig::FALLBACK.to_string(), "{n_clusters: 2, n_dims: 2, n_trees: 20}");
    }
}

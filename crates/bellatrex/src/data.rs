//! Tabular input: a feature matrix with named columns, and single-row samples.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2};

/// Error raised when a table cannot be built or a row does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("{n_columns} column names given for {n_features} features")]
    ColumnCountMismatch { n_columns: usize, n_features: usize },
    #[error("row {idx} out of range for table with {n_rows} rows")]
    RowOutOfRange { idx: usize, n_rows: usize },
}

/// Sample-major feature matrix (`[n_samples, n_features]`) with column names.
#[derive(Debug, Clone)]
pub struct Table {
    features: Array2<f64>,
    columns: Arc<[String]>,
}

impl Table {
    /// Create a table from a feature matrix and matching column names.
    pub fn new(features: Array2<f64>, columns: Vec<String>) -> Result<Self, DataError> {
        if columns.len() != features.ncols() {
            return Err(DataError::ColumnCountMismatch {
                n_columns: columns.len(),
                n_features: features.ncols(),
            });
        }
        Ok(Self { features, columns: columns.into() })
    }

    /// Create a table with generated column names `x0, x1, ...`.
    pub fn from_array(features: Array2<f64>) -> Self {
        let columns: Vec<String> = (0..features.ncols()).map(|i| format!("x{i}")).collect();
        Self { features, columns: columns.into() }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Extract row `idx` as an owned [`Sample`].
    pub fn sample(&self, idx: usize) -> Result<Sample, DataError> {
        if idx >= self.n_samples() {
            return Err(DataError::RowOutOfRange { idx, n_rows: self.n_samples() });
        }
        Ok(Sample {
            values: self.features.row(idx).to_vec(),
            columns: Arc::clone(&self.columns),
        })
    }
}

/// Exactly one feature row under explanation.
///
/// Immutable once built; column names are shared with the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    values: Vec<f64>,
    columns: Arc<[String]>,
}

impl Sample {
    /// Build a sample with generated column names.
    pub fn from_values(values: Vec<f64>) -> Self {
        let columns: Vec<String> = (0..values.len()).map(|i| format!("x{i}")).collect();
        Self { values, columns: columns.into() }
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(self.values.as_slice())
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.values.len()
    }

    /// Name of column `feature`, falling back to `x{feature}`.
    pub fn column_name(&self, feature: usize) -> String {
        self.columns
            .get(feature)
            .cloned()
            .unwrap_or_else(|| format!("x{feature}"))
    }
}

//! Pre-serialized tree collection adapter.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::ArrayView2;

use super::schema::EnsembleSchema;
use super::{Capabilities, Ensemble, EnsembleError};
use crate::repr::{Forest, Tree};

/// An ensemble restored from a serialized tree collection.
///
/// Always considered fitted. Scenario detection works only when the
/// serialized form declares its capabilities.
#[derive(Debug, Clone)]
pub struct SerializedEnsemble {
    forest: Forest,
    n_features: usize,
    capabilities: Option<Capabilities>,
}

impl SerializedEnsemble {
    /// Build from a parsed schema.
    pub fn from_schema(schema: &EnsembleSchema) -> Result<Self, EnsembleError> {
        let forest = schema.to_forest()?;
        let n_features = forest.n_features();
        Ok(Self { forest, n_features, capabilities: schema.capabilities })
    }

    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, EnsembleError> {
        let schema: EnsembleSchema = serde_json::from_str(json)?;
        Self::from_schema(&schema)
    }

    /// Load from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, EnsembleError> {
        let reader = BufReader::new(File::open(path)?);
        let schema: EnsembleSchema = serde_json::from_reader(reader)?;
        Self::from_schema(&schema)
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}

impl Ensemble for SerializedEnsemble {
    fn n_estimators(&self) -> usize {
        self.forest.n_trees()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn fit(
        &mut self,
        _features: ArrayView2<'_, f64>,
        _targets: ArrayView2<'_, f64>,
        _n_jobs: usize,
    ) -> Result<(), EnsembleError> {
        Err(EnsembleError::NotTrainable("serialized ensembles are already fitted"))
    }

    fn tree(&self, idx: usize) -> Result<&Tree, EnsembleError> {
        self.forest
            .tree(idx)
            .ok_or(EnsembleError::TreeOutOfRange { idx, n_estimators: self.forest.n_trees() })
    }
}

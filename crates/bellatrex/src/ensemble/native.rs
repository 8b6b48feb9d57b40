//! Native forest adapter.

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView2;

use super::{Capabilities, Ensemble, EnsembleError, OutputSemantics};
use crate::repr::{Forest, Tree};

/// Produces a fitted forest from training data.
///
/// Forest training lives outside this crate; implement this trait to let
/// [`ForestModel::fit`](Ensemble::fit) delegate to your trainer.
pub trait ForestTrainer: Send + Sync {
    fn train(
        &self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
        n_jobs: usize,
    ) -> Result<Forest, EnsembleError>;
}

/// A native tree forest with declared output semantics.
#[derive(Clone)]
pub struct ForestModel {
    forest: Option<Forest>,
    n_features: usize,
    semantics: OutputSemantics,
    trainer: Option<Arc<dyn ForestTrainer>>,
}

impl fmt::Debug for ForestModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestModel")
            .field("n_trees", &self.forest.as_ref().map(Forest::n_trees))
            .field("semantics", &self.semantics)
            .field("trainable", &self.trainer.is_some())
            .finish()
    }
}

impl ForestModel {
    /// Wrap an already-fitted forest after validating its structure.
    ///
    /// # Errors
    ///
    /// [`EnsembleError::InvalidForest`] for an empty forest, mixed leaf
    /// arities, or a tree with out-of-bounds or unreachable nodes.
    pub fn fitted(forest: Forest, semantics: OutputSemantics) -> Result<Self, EnsembleError> {
        forest.validate()?;
        let n_features = forest.n_features();
        Ok(Self { forest: Some(forest), n_features, semantics, trainer: None })
    }

    /// An unfitted model that fits through `trainer`.
    pub fn unfitted(trainer: Arc<dyn ForestTrainer>, semantics: OutputSemantics) -> Self {
        Self { forest: None, n_features: 0, semantics, trainer: Some(trainer) }
    }

    /// Attach a trainer so the model can be refitted.
    pub fn with_trainer(mut self, trainer: Arc<dyn ForestTrainer>) -> Self {
        self.trainer = Some(trainer);
        self
    }

    pub fn forest(&self) -> Option<&Forest> {
        self.forest.as_ref()
    }
}

impl Ensemble for ForestModel {
    fn n_estimators(&self) -> usize {
        self.forest.as_ref().map_or(0, Forest::n_trees)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn capabilities(&self) -> Option<Capabilities> {
        let forest = self.forest.as_ref()?;
        Some(Capabilities { leaf_arity: forest.leaf_arity(), semantics: self.semantics })
    }

    fn is_fitted(&self) -> bool {
        self.forest.as_ref().is_some_and(|f| f.n_trees() > 0)
    }

    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
        n_jobs: usize,
    ) -> Result<(), EnsembleError> {
        let trainer = self
            .trainer
            .as_ref()
            .ok_or(EnsembleError::NotTrainable("no trainer attached to forest model"))?;
        let forest = trainer.train(features, targets, n_jobs)?;
        forest.validate()?;
        self.n_features = forest.n_features();
        self.forest = Some(forest);
        Ok(())
    }

    fn tree(&self, idx: usize) -> Result<&Tree, EnsembleError> {
        let forest = self.forest.as_ref().ok_or(EnsembleError::NotFitted)?;
        forest
            .tree(idx)
            .ok_or(EnsembleError::TreeOutOfRange { idx, n_estimators: forest.n_trees() })
    }
}

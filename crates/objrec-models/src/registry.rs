//! [`ModelRegistry`] – object models and their pose estimators, keyed by
//! [`ModelId`].
//!
//! The registry is built once at startup and is read-only afterwards; wrap
//! it in an `Arc` to share it between recognizers.  Iteration is always in
//! ascending [`ModelId`] order, which is what makes cross-model tie-breaking
//! deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use objrec_types::ModelId;

use crate::estimator::PoseEstimator;
use crate::library::ObjectModel;

/// One registry slot: the model and the estimator that searches for it.
pub struct RegisteredModel {
    pub model: Arc<ObjectModel>,
    estimator: Box<dyn PoseEstimator>,
}

impl RegisteredModel {
    pub fn estimator(&self) -> &dyn PoseEstimator {
        self.estimator.as_ref()
    }
}

/// Object models and their estimators, keyed by stable [`ModelId`].
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, RegisteredModel>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an ordered library, numbering models from 1.
    ///
    /// `make_estimator` is called once per model, in library order.
    pub fn from_library<F>(models: Vec<ObjectModel>, mut make_estimator: F) -> Self
    where
        F: FnMut(&Arc<ObjectModel>) -> Box<dyn PoseEstimator>,
    {
        let mut registry = Self::new();
        for (index, model) in models.into_iter().enumerate() {
            let model = Arc::new(model);
            let estimator = make_estimator(&model);
            registry.register(ModelId::from_index(index), model, estimator);
        }
        registry
    }

    /// Register a model under `id`.  Any model previously registered with
    /// the same id is replaced.
    pub fn register(
        &mut self,
        id: ModelId,
        model: Arc<ObjectModel>,
        estimator: Box<dyn PoseEstimator>,
    ) {
        self.models.insert(id, RegisteredModel { model, estimator });
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All slots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &RegisteredModel)> {
        self.models.iter().map(|(id, slot)| (*id, slot))
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.models.iter().map(|(id, slot)| (id, &slot.model.name)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objrec_types::{ModelHypothesisSet, PoseHypothesis, Transform3D, Vec3};

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    struct FixedEstimator {
        votes: Vec<f32>,
    }

    impl PoseEstimator for FixedEstimator {
        fn estimate(&self, _scene: &[Vec3]) -> ModelHypothesisSet {
            self.votes
                .iter()
                .map(|v| PoseHypothesis::new(Transform3D::identity(), *v))
                .collect()
        }
    }

    fn model(name: &str) -> ObjectModel {
        ObjectModel::new(name, vec![Vec3::zero()])
    }

    fn fixed(votes: &[f32]) -> Box<dyn PoseEstimator> {
        Box::new(FixedEstimator {
            votes: votes.to_vec(),
        })
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    fn names(registry: &ModelRegistry) -> Vec<(ModelId, String)> {
        registry
            .iter()
            .map(|(id, slot)| (id, slot.model.name.clone()))
            .collect()
    }

    #[test]
    fn from_library_numbers_models_from_one() {
        let registry = ModelRegistry::from_library(
            vec![model("mug"), model("can"), model("box")],
            |_| fixed(&[]),
        );
        assert_eq!(
            names(&registry),
            vec![
                (ModelId(1), "mug".to_string()),
                (ModelId(2), "can".to_string()),
                (ModelId(3), "box".to_string()),
            ]
        );
    }

    #[test]
    fn each_slot_runs_its_own_estimator() {
        let mut votes = vec![vec![0.3], vec![0.9, 0.1]].into_iter();
        let registry = ModelRegistry::from_library(vec![model("a"), model("b")], |_| {
            fixed(&votes.next().unwrap())
        });

        let counts: Vec<usize> = registry
            .iter()
            .map(|(_, slot)| slot.estimator().estimate(&[]).len())
            .collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn iteration_is_in_id_order_regardless_of_insertion() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelId(3), Arc::new(model("c")), fixed(&[]));
        registry.register(ModelId(1), Arc::new(model("a")), fixed(&[]));
        registry.register(ModelId(2), Arc::new(model("b")), fixed(&[]));
        let names: Vec<&str> = registry.iter().map(|(_, s)| s.model.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn re_registering_replaces_previous_model() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelId(1), Arc::new(model("old")), fixed(&[]));
        registry.register(ModelId(1), Arc::new(model("new")), fixed(&[0.5]));
        assert_eq!(registry.len(), 1);
        assert_eq!(names(&registry), vec![(ModelId(1), "new".to_string())]);
    }

    #[test]
    fn empty_registry_reports_empty() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }

    #[test]
    fn debug_lists_model_names() {
        let registry = ModelRegistry::from_library(vec![model("mug")], |_| fixed(&[]));
        assert!(format!("{registry:?}").contains("mug"));
    }
}

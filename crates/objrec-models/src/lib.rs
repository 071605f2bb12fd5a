//! `objrec-models` – the object model library and its pose estimators.
//!
//! # Modules
//!
//! - [`library`] – [`ObjectModel`][library::ObjectModel] and the
//!   [`ModelSource`][library::ModelSource] trait, with a JSON file source.
//! - [`estimator`] – the [`PoseEstimator`][estimator::PoseEstimator]
//!   capability and [`EstimatorParams`][estimator::EstimatorParams].
//! - [`registry`] – [`ModelRegistry`][registry::ModelRegistry]: one estimator
//!   per model, keyed by stable [`ModelId`][objrec_types::ModelId].
//! - [`centroid`] – [`CentroidEstimator`][centroid::CentroidEstimator]: a
//!   deterministic baseline estimator.

pub mod centroid;
pub mod estimator;
pub mod library;
pub mod registry;

pub use centroid::CentroidEstimator;
pub use estimator::{EstimatorParams, PoseEstimator};
pub use library::{JsonModelFile, ModelError, ModelSource, ObjectModel};
pub use registry::{ModelRegistry, RegisteredModel};

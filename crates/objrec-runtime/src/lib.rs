//! `objrec-runtime` – batch recognition engine.
//!
//! Turns a [`RecognitionRequest`][objrec_types::RecognitionRequest] of
//! segmented clusters into a [`BatchResult`][objrec_types::BatchResult]: the
//! best-matching known model per cluster, every pose candidate, and a
//! per-cluster outcome report.
//!
//! # Modules
//!
//! - [`processor`] – [`ClusterProcessor`][processor::ClusterProcessor]:
//!   transform, bound, estimate and select for one cluster.
//!   [`select_best`][processor::select_best] implements the winner rule.
//! - [`recognizer`] – [`BatchRecognizer`][recognizer::BatchRecognizer]:
//!   ordered batch processing, failure policy, result assembly and the
//!   post-batch visualization and diagnostics hand-off.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use objrec_models::{CentroidEstimator, EstimatorParams, JsonModelFile, ModelRegistry, ModelSource};
//! use objrec_perception::TfBuffer;
//! use objrec_runtime::{BatchRecognizer, RecognizerConfig};
//! use objrec_types::RecognitionRequest;
//!
//! let models = JsonModelFile::new("models.json").load().unwrap();
//! let params = EstimatorParams::default();
//! let registry = ModelRegistry::from_library(models, |m| {
//!     Box::new(CentroidEstimator::new(m.clone(), params.clone()))
//! });
//! let recognizer = BatchRecognizer::new(
//!     RecognizerConfig::default(),
//!     Arc::new(registry),
//!     Arc::new(TfBuffer::new()),
//! );
//! let result = recognizer.recognize(&RecognitionRequest::default());
//! ```

pub mod processor;
pub mod recognizer;
pub mod telemetry;

pub use processor::{ClusterProcessor, ClusterReport, Selection, SelectionPolicy, select_best};
pub use recognizer::{BatchRecognizer, FailurePolicy, RecognizerConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};

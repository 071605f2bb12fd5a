//! [`BatchRecognizer`] – the request/response entry point.
//!
//! A batch is processed strictly in request order, one cluster at a time,
//! by a [`ClusterProcessor`].  The result lists recognized objects, the
//! candidate view of every processed cluster, and a per-cluster outcome
//! report.
//!
//! # Failure handling
//!
//! - An empty request fails with [`RecognitionError::EmptyRequest`] before
//!   any work or side effect.
//! - A transform failure either aborts the whole batch
//!   ([`FailurePolicy::AbortBatch`], the default; later clusters are never
//!   touched) or is recorded as [`ClusterOutcome::Failed`] while the rest of
//!   the batch proceeds ([`FailurePolicy::IsolateCluster`]).
//! - A cluster without a positive vote is dropped.  With
//!   [`RecognizerConfig::report_unmatched`] it is listed as
//!   [`ClusterOutcome::Skipped`]; otherwise it is silently omitted from the
//!   outcome report.
//!
//! # Side effects
//!
//! Only after the result is complete: markers are handed to the optional
//! [`VisualizationSink`] (when at least one object was recognized) and a
//! summary is published on the optional diagnostics bus.  Neither can alter
//! or fail the result.

use std::sync::Arc;
use std::time::Duration;

use objrec_middleware::{EventBus, Topic, VisualizationSink};
use objrec_models::ModelRegistry;
use objrec_perception::{FrameTransformer, TransformError};
use objrec_types::{
    BatchResult, ClusterOutcome, Event, EventPayload, MarkerBatch, MarkerStyle, RecognitionError,
    RecognitionRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::processor::{ClusterProcessor, SelectionPolicy};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How a cluster-level transform failure affects its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole request; clusters after the failing one are skipped.
    #[default]
    AbortBatch,
    /// Record the failure for that cluster and continue.
    IsolateCluster,
}

/// Configuration bundle for [`BatchRecognizer`].
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Frame every cluster is re-expressed in before estimation.
    pub processing_frame: String,
    /// Upper bound on the wait for a cluster's frame transform.
    pub transform_timeout: Duration,
    pub selection: SelectionPolicy,
    pub failure_policy: FailurePolicy,
    /// List dropped clusters as [`ClusterOutcome::Skipped`].
    pub report_unmatched: bool,
    pub marker_style: MarkerStyle,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            processing_frame: "/base_link".to_string(),
            transform_timeout: Duration::from_secs(1),
            selection: SelectionPolicy::default(),
            failure_policy: FailurePolicy::default(),
            report_unmatched: false,
            marker_style: MarkerStyle::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BatchRecognizer
// ─────────────────────────────────────────────────────────────────────────────

/// Recognizes every cluster of a [`RecognitionRequest`].
///
/// The registry and transformer are shared read-only; one recognizer may
/// serve any number of sequential requests.
pub struct BatchRecognizer {
    config: RecognizerConfig,
    registry: Arc<ModelRegistry>,
    transformer: Arc<dyn FrameTransformer>,
    visualizer: Option<Arc<dyn VisualizationSink>>,
    diagnostics: Option<EventBus>,
}

impl BatchRecognizer {
    pub fn new(
        config: RecognizerConfig,
        registry: Arc<ModelRegistry>,
        transformer: Arc<dyn FrameTransformer>,
    ) -> Self {
        Self {
            config,
            registry,
            transformer,
            visualizer: None,
            diagnostics: None,
        }
    }

    /// Send detection markers to `sink` after each successful batch.
    pub fn with_visualizer(mut self, sink: Arc<dyn VisualizationSink>) -> Self {
        self.visualizer = Some(sink);
        self
    }

    /// Publish a summary on [`Topic::Diagnostics`] after each batch.
    pub fn with_diagnostics(mut self, bus: EventBus) -> Self {
        self.diagnostics = Some(bus);
        self
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Recognize every cluster of `request`.
    ///
    /// # Errors
    ///
    /// - [`RecognitionError::EmptyRequest`] when the request has no clusters.
    /// - [`RecognitionError::Transform`] when a cluster's frame cannot be
    ///   resolved and the failure policy is [`FailurePolicy::AbortBatch`].
    #[instrument(skip_all, fields(clusters = request.clusters.len()))]
    pub fn recognize(&self, request: &RecognitionRequest) -> Result<BatchResult, RecognitionError> {
        if request.clusters.is_empty() {
            info!("no detections in request");
            return Err(RecognitionError::EmptyRequest);
        }
        if let Some(table) = &request.table {
            debug!(frame = %table.header.frame_id, position = ?table.pose.translation, "table");
        }

        let processor = ClusterProcessor::new(
            &self.registry,
            self.transformer.as_ref(),
            &self.config.processing_frame,
            self.config.transform_timeout,
            self.config.selection,
        );

        let mut result = BatchResult {
            table: request.table.clone(),
            ..BatchResult::default()
        };

        for (index, cluster) in request.clusters.iter().enumerate() {
            let report = match processor.process(index, cluster) {
                Ok(report) => report,
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::AbortBatch => {
                        return Err(transform_failure(index, &self.config.processing_frame, e));
                    }
                    FailurePolicy::IsolateCluster => {
                        warn!(cluster = index, error = %e, "cluster skipped after transform failure");
                        result.outcomes.push(ClusterOutcome::Failed {
                            cluster_index: index,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                },
            };

            result.graspable.push(report.graspable);
            match report.object {
                Some(object) => {
                    result.outcomes.push(ClusterOutcome::Recognized {
                        cluster_index: index,
                        model_id: object.model_id,
                        votes: object.hypothesis.votes,
                    });
                    result.objects.push(object);
                }
                None if self.config.report_unmatched => {
                    result
                        .outcomes
                        .push(ClusterOutcome::Skipped { cluster_index: index });
                }
                None => {}
            }
        }

        let failed = result.failed_count();
        let skipped = result.graspable.len() - result.objects.len();
        info!(
            recognized = result.objects.len(),
            skipped,
            failed,
            "batch complete"
        );

        self.notify(request.clusters.len(), skipped, failed, &result);
        Ok(result)
    }

    fn notify(&self, clusters: usize, skipped: usize, failed: usize, result: &BatchResult) {
        if let Some(sink) = &self.visualizer
            && !result.objects.is_empty()
        {
            sink.show(MarkerBatch {
                frame_id: self.config.processing_frame.clone(),
                style: self.config.marker_style.clone(),
                clouds: result
                    .objects
                    .iter()
                    .map(|o| o.aligned_model.clone())
                    .collect(),
            });
        }

        if let Some(bus) = &self.diagnostics {
            let event = Event::new(
                "objrec-runtime::recognizer",
                EventPayload::BatchSummary {
                    clusters,
                    recognized: result.objects.len(),
                    skipped,
                    failed,
                },
            );
            if let Err(e) = bus.publish_to(Topic::Diagnostics, event) {
                debug!(error = %e, "batch summary dropped");
            }
        }
    }
}

fn transform_failure(index: usize, target: &str, error: TransformError) -> RecognitionError {
    let TransformError::Unavailable {
        source_frame,
        waited,
        ..
    } = error;
    RecognitionError::Transform {
        cluster_index: index,
        source_frame,
        target_frame: target.to_string(),
        reason: format!("timed out after {waited:?}"),
    }
}

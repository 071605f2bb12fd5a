//! `objrec-types` – shared data model for the ObjRec recognition pipeline.
//!
//! Everything that crosses a crate or wire boundary lives here: point
//! clouds, pose hypotheses, recognized objects, batch reports, bus events
//! and the top-level [`RecognitionError`].

pub mod geometry;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use geometry::{Quaternion, Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

/// Stable, 1-based identifier of an object model in the loaded library.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ModelId(pub u32);

impl ModelId {
    /// Identifier of the model stored at zero-based library position `index`.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clouds and poses
// ────────────────────────────────────────────────────────────────────────────

/// Frame id plus sequence number attached to clouds and poses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    #[serde(default)]
    pub seq: u32,
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: impl Into<String>, seq: u32) -> Self {
        Self {
            seq,
            frame_id: frame_id.into(),
        }
    }
}

/// A set of 3-D points expressed in `header.frame_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PointCloud {
    pub header: Header,
    pub points: Vec<Vec3>,
}

impl PointCloud {
    pub fn new(header: Header, points: Vec<Vec3>) -> Self {
        Self { header, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A segmented scene cluster as delivered by upstream segmentation.
pub type Cluster = PointCloud;

/// A pose tagged with the frame it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StampedPose {
    pub header: Header,
    pub pose: Transform3D,
}

/// One candidate alignment of a model against a cluster.
///
/// `votes` is never negative; exactly zero means "no valid hypothesis".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoseHypothesis {
    pub pose: Transform3D,
    pub votes: f32,
}

impl PoseHypothesis {
    pub fn new(pose: Transform3D, votes: f32) -> Self {
        Self { pose, votes }
    }
}

/// Estimator output for one (model, cluster) pair, best-first.
pub type ModelHypothesisSet = Vec<PoseHypothesis>;

/// A (model, pose, confidence) tuple published for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    pub model_id: ModelId,
    pub pose: StampedPose,
    pub confidence: f32,
}

/// Axis-aligned region occupied by a cluster in the processing frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Extent along x, y and z.
    pub dims: Vec3,
    /// Box centre with identity orientation.
    pub pose: StampedPose,
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

/// A batch of clusters to recognize.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RecognitionRequest {
    pub clusters: Vec<Cluster>,
    /// Supporting surface pose; passed through to the result untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<StampedPose>,
}

/// The recognition result for a single cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecognizedObject {
    /// Zero-based position of the cluster in the request.
    pub cluster_index: usize,
    pub collision_name: String,
    pub reference_frame_id: String,
    pub model_id: ModelId,
    pub hypothesis: PoseHypothesis,
    /// Every hypothesis of every model for this cluster, model-major.
    pub candidates: Vec<Candidate>,
    pub bounding_box: BoundingBox,
    /// The cluster re-expressed in the processing frame.
    pub cluster: PointCloud,
    /// The winning model's reference cloud moved to the winning pose.
    pub aligned_model: PointCloud,
}

/// All candidates produced for one cluster, winner or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraspableCandidates {
    pub cluster_index: usize,
    pub collision_name: String,
    pub reference_frame_id: String,
    pub candidates: Vec<Candidate>,
}

/// Per-cluster verdict recorded in the batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusterOutcome {
    Recognized {
        cluster_index: usize,
        model_id: ModelId,
        votes: f32,
    },
    /// No model produced a hypothesis with positive votes.
    Skipped { cluster_index: usize },
    /// The cluster could not be processed at all.
    Failed { cluster_index: usize, reason: String },
}

impl ClusterOutcome {
    pub fn cluster_index(&self) -> usize {
        match self {
            ClusterOutcome::Recognized { cluster_index, .. }
            | ClusterOutcome::Skipped { cluster_index }
            | ClusterOutcome::Failed { cluster_index, .. } => *cluster_index,
        }
    }
}

/// Response to a [`RecognitionRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BatchResult {
    /// One entry per recognized cluster, in request order.
    pub objects: Vec<RecognizedObject>,
    /// Candidate lists of every processed cluster, in request order.
    pub graspable: Vec<GraspableCandidates>,
    pub outcomes: Vec<ClusterOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<StampedPose>,
}

impl BatchResult {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ClusterOutcome::Failed { .. }))
            .count()
    }
}

/// JSON schema of [`RecognitionRequest`].
pub fn request_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(RecognitionRequest)).unwrap_or_default()
}

/// JSON schema of [`BatchResult`].
pub fn response_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(BatchResult)).unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────────────
// Visualization and bus events
// ────────────────────────────────────────────────────────────────────────────

/// Styling applied to a batch of detection markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub namespace: String,
    pub point_scale: f32,
    pub alpha: f32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            namespace: "detection".to_string(),
            point_scale: 0.01,
            alpha: 1.0,
        }
    }
}

/// Aligned model clouds to render, all in `frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerBatch {
    pub frame_id: String,
    pub style: MarkerStyle,
    pub clouds: Vec<PointCloud>,
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "objrec-middleware::visualizer"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Markers(MarkerBatch),
    BatchSummary {
        clusters: usize,
        recognized: usize,
        skipped: usize,
        failed: usize,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failures that terminate a recognition batch.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecognitionError {
    #[error("No clusters in recognition request")]
    EmptyRequest,

    #[error(
        "Cluster {cluster_index}: transform from '{source_frame}' to '{target_frame}' unavailable: {reason}"
    )]
    Transform {
        cluster_index: usize,
        source_frame: String,
        target_frame: String,
        reason: String,
    },
}

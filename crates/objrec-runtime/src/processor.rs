//! [`ClusterProcessor`] – recognition of a single cluster.
//!
//! Each call to [`ClusterProcessor::process`]:
//!
//! 1. re-expresses the cluster in the processing frame (bounded wait),
//! 2. computes its axis-aligned bounding box,
//! 3. runs every registered estimator, in ascending model id order,
//! 4. flattens all hypotheses into the candidate list,
//! 5. picks the winner with [`select_best`], and
//! 6. aligns the winning model's reference cloud to the winning pose.
//!
//! A cluster whose winning vote is zero yields no object but still reports
//! its (possibly empty) candidate list.  Clusters share no state.

use std::time::Duration;

use objrec_models::{ModelRegistry, RegisteredModel};
use objrec_perception::{FrameTransformer, TransformError, bounding_box, transform_cloud};
use objrec_types::{
    Candidate, Cluster, GraspableCandidates, Header, ModelHypothesisSet, ModelId, PoseHypothesis,
    RecognizedObject, StampedPose,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// Which hypotheses compete when choosing a cluster's winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Only each model's first (best-ranked) hypothesis competes.
    #[default]
    TopRanked,
    /// Every hypothesis of every model competes.
    BestOverall,
}

/// The winning (model, hypothesis) pair of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub model_id: ModelId,
    /// Position of the winning model's set in the slice passed to
    /// [`select_best`].
    pub set: usize,
    /// Position of the winning hypothesis in its model's set.
    pub rank: usize,
    pub hypothesis: PoseHypothesis,
}

/// Pick the hypothesis with the strictly greatest vote.
///
/// `sets` must be in ascending model id order.  On equal votes the earlier
/// model (and, under [`SelectionPolicy::BestOverall`], the earlier rank)
/// wins.  Returns `None` when no competing hypothesis has a positive vote.
pub fn select_best(
    sets: &[(ModelId, ModelHypothesisSet)],
    policy: SelectionPolicy,
) -> Option<Selection> {
    let ranks_per_model = match policy {
        SelectionPolicy::TopRanked => 1,
        SelectionPolicy::BestOverall => usize::MAX,
    };

    let mut best_votes = 0.0_f32;
    let mut best = None;
    for (index, (model_id, set)) in sets.iter().enumerate() {
        for (rank, hypothesis) in set.iter().enumerate().take(ranks_per_model) {
            if hypothesis.votes > best_votes {
                best_votes = hypothesis.votes;
                best = Some(Selection {
                    model_id: *model_id,
                    set: index,
                    rank,
                    hypothesis: *hypothesis,
                });
            }
        }
    }
    best
}

// ─────────────────────────────────────────────────────────────────────────────
// ClusterProcessor
// ─────────────────────────────────────────────────────────────────────────────

/// What one cluster contributed to the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    /// Every hypothesis of every model, winner or not.
    pub graspable: GraspableCandidates,
    /// `None` when no model produced a positive vote.
    pub object: Option<RecognizedObject>,
}

/// Runs the recognition pipeline on one cluster at a time.
pub struct ClusterProcessor<'a> {
    registry: &'a ModelRegistry,
    transformer: &'a dyn FrameTransformer,
    processing_frame: &'a str,
    transform_timeout: Duration,
    selection: SelectionPolicy,
}

impl<'a> ClusterProcessor<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        transformer: &'a dyn FrameTransformer,
        processing_frame: &'a str,
        transform_timeout: Duration,
        selection: SelectionPolicy,
    ) -> Self {
        Self {
            registry,
            transformer,
            processing_frame,
            transform_timeout,
            selection,
        }
    }

    /// Recognize `cluster`, the `cluster_index`-th cluster of its request.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] when the cluster cannot be brought into
    /// the processing frame within the timeout.
    #[instrument(skip_all, fields(cluster = cluster_index, frame = %cluster.header.frame_id))]
    pub fn process(
        &self,
        cluster_index: usize,
        cluster: &Cluster,
    ) -> Result<ClusterReport, TransformError> {
        let canonical = self
            .transformer
            .transform_cloud(cluster, self.processing_frame, self.transform_timeout)
            .inspect_err(|e| {
                error!(
                    source = %cluster.header.frame_id,
                    target = %self.processing_frame,
                    error = %e,
                    "failed to transform cluster"
                );
            })?;
        let bounding_box = bounding_box(&canonical);

        let mut slots: Vec<&RegisteredModel> = Vec::with_capacity(self.registry.len());
        let mut sets: Vec<(ModelId, ModelHypothesisSet)> = Vec::with_capacity(self.registry.len());
        for (id, slot) in self.registry.iter() {
            let hypotheses = slot.estimator().estimate(&canonical.points);
            debug!(
                model_id = %id,
                model = %slot.model.name,
                hypotheses = hypotheses.len(),
                "model estimated"
            );
            slots.push(slot);
            sets.push((id, hypotheses));
        }

        let candidates = flatten_candidates(&sets, &canonical.header);
        let graspable = GraspableCandidates {
            cluster_index,
            collision_name: cluster_index.to_string(),
            reference_frame_id: self.processing_frame.to_string(),
            candidates,
        };

        let Some(selection) = select_best(&sets, self.selection) else {
            info!(candidates = graspable.candidates.len(), "no hypotheses");
            return Ok(ClusterReport {
                graspable,
                object: None,
            });
        };
        let model = &slots[selection.set].model;

        info!(
            model_id = %selection.model_id,
            model = %model.name,
            rank = selection.rank,
            votes = selection.hypothesis.votes,
            "best hypothesis"
        );

        let aligned_model = transform_cloud(
            &selection.hypothesis.pose,
            &model.reference_cloud,
            Header::new(self.processing_frame, canonical.header.seq),
        );
        debug!(points = aligned_model.len(), "model cloud aligned");

        let object = RecognizedObject {
            cluster_index,
            collision_name: graspable.collision_name.clone(),
            reference_frame_id: graspable.reference_frame_id.clone(),
            model_id: selection.model_id,
            hypothesis: selection.hypothesis,
            candidates: graspable.candidates.clone(),
            bounding_box,
            cluster: canonical,
            aligned_model,
        };
        Ok(ClusterReport {
            graspable,
            object: Some(object),
        })
    }
}

/// All hypotheses, model-major then rank order, stamped with `header`.
fn flatten_candidates(sets: &[(ModelId, ModelHypothesisSet)], header: &Header) -> Vec<Candidate> {
    sets.iter()
        .flat_map(|(model_id, set)| {
            set.iter().map(move |h| Candidate {
                model_id: *model_id,
                pose: StampedPose {
                    header: header.clone(),
                    pose: h.pose,
                },
                confidence: h.votes,
            })
        })
        .collect()
}

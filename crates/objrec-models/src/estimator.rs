//! The [`PoseEstimator`] capability and its tuning parameters.

use objrec_types::{ModelHypothesisSet, Vec3};

/// Tuning knobs shared by every estimator built from a model library.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorParams {
    /// Number of rotation bins of the voting space.
    pub angle_bins: u32,
    /// Number of distance bins of the voting space.  Carried so that
    /// parameter sets for voting-based estimators load unchanged;
    /// [`CentroidEstimator`](crate::CentroidEstimator) does not read it.
    pub distance_bins: u32,
    /// Fraction (0–1] of scene points used as reference points.
    pub reference_points_percentage: f32,
    /// Voxel size applied to scene clouds before voting; 0 disables it.
    pub pre_downsampling_step: f32,
    /// Peaks below `threshold × best` are discarded.
    pub accumulator_peak_threshold: f32,
    /// Neighbourhood radius (metres).
    pub radius: f32,
    /// Neighbour count used when `radius_search` is false.
    pub neighbours: u32,
    /// Radius search (true) or fixed-count neighbour search (false).
    pub radius_search: bool,
    /// Discard hypotheses whose origin falls outside the scene bounds.
    pub filter_on: bool,
    /// Cap on hypotheses returned per model.
    pub hypotheses_per_model: usize,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            angle_bins: 15,
            distance_bins: 20,
            reference_points_percentage: 0.5,
            pre_downsampling_step: 0.0,
            accumulator_peak_threshold: 0.65,
            radius: 0.04,
            neighbours: 50,
            radius_search: true,
            filter_on: false,
            hypotheses_per_model: 200,
        }
    }
}

/// Scores candidate alignments of one object model against a scene cloud.
///
/// Implementations hold their model and any precomputed descriptors.  They
/// must not mutate shared state from [`PoseEstimator::estimate`]: the same
/// estimator is invoked for every cluster of a batch, in any order, possibly
/// from several threads.
pub trait PoseEstimator: Send + Sync {
    /// Hypotheses for `scene`, best-first.  An empty set means the model was
    /// not found.
    fn estimate(&self, scene: &[Vec3]) -> ModelHypothesisSet;
}

impl<F> PoseEstimator for F
where
    F: Fn(&[Vec3]) -> ModelHypothesisSet + Send + Sync,
{
    fn estimate(&self, scene: &[Vec3]) -> ModelHypothesisSet {
        self(scene)
    }
}

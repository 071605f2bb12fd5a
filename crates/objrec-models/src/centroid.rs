//! [`CentroidEstimator`] – a baseline, fully deterministic pose estimator.
//!
//! For each of `angle_bins` yaw angles around +Z the model is rotated and
//! translated so that its centroid coincides with the scene centroid.  A
//! hypothesis' vote is the fraction of (sub-sampled) scene points that have a
//! model point within the inlier radius.
//!
//! The inlier radius is `radius` in radius-search mode.  Otherwise it is the
//! mean distance from each model point to its `neighbours`-th nearest model
//! neighbour, computed once at construction.
//!
//! Hypotheses below `accumulator_peak_threshold × best` are dropped, the rest
//! are returned best-first and capped at `hypotheses_per_model`.

use std::collections::HashSet;
use std::f32::consts::TAU;
use std::sync::Arc;

use kiddo::{KdTree, SquaredEuclidean};
use objrec_perception::Aabb;
use objrec_types::{ModelHypothesisSet, PoseHypothesis, Quaternion, Transform3D, Vec3};

use crate::estimator::{EstimatorParams, PoseEstimator};
use crate::library::ObjectModel;

/// Centroid-alignment estimator with yaw sampling.
pub struct CentroidEstimator {
    model: Arc<ObjectModel>,
    params: EstimatorParams,
    model_centroid: Vec3,
    model_index: ModelIndex,
    inlier_radius: f32,
}

impl CentroidEstimator {
    pub fn new(model: Arc<ObjectModel>, params: EstimatorParams) -> Self {
        let model_centroid = Vec3::centroid(&model.reference_cloud).unwrap_or_else(Vec3::zero);
        let model_index = ModelIndex::build(&model.reference_cloud);
        let inlier_radius = if params.radius_search {
            params.radius
        } else {
            model_index
                .knn_radius(params.neighbours as usize)
                .unwrap_or(params.radius)
        };
        Self {
            model,
            params,
            model_centroid,
            model_index,
            inlier_radius,
        }
    }

    /// Distance under which a scene point counts as explained by the model.
    pub fn inlier_radius(&self) -> f32 {
        self.inlier_radius
    }

    /// Fraction of `scene` within the inlier radius of the model placed at
    /// `pose`.  Scene points are mapped into the model frame instead of
    /// moving the model, so the index is built once.
    fn score(&self, pose: &Transform3D, scene: &[Vec3]) -> f32 {
        let r2 = self.inlier_radius * self.inlier_radius;
        let to_model = pose.inverse();
        let inliers = scene
            .iter()
            .filter(|s| self.model_index.nearest_distance_squared(to_model.apply(**s)) <= r2)
            .count();
        inliers as f32 / scene.len() as f32
    }
}

impl std::fmt::Debug for CentroidEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentroidEstimator")
            .field("model", &self.model.name)
            .field("points", &self.model.reference_cloud.len())
            .field("inlier_radius", &self.inlier_radius)
            .finish()
    }
}

impl PoseEstimator for CentroidEstimator {
    fn estimate(&self, scene: &[Vec3]) -> ModelHypothesisSet {
        if self.model.reference_cloud.is_empty() {
            return Vec::new();
        }
        let scene = reference_points(
            &voxel_downsample(scene, self.params.pre_downsampling_step),
            self.params.reference_points_percentage,
        );
        let Some(scene_centroid) = Vec3::centroid(&scene) else {
            return Vec::new();
        };
        let scene_bounds = Aabb::from_points(&scene).map(|b| b.expanded(self.params.radius));

        let bins = self.params.angle_bins.max(1);
        let mut hypotheses: Vec<PoseHypothesis> = (0..bins)
            .map(|k| {
                let rotation = Quaternion::from_yaw(TAU * k as f32 / bins as f32);
                let translation = scene_centroid.sub(rotation.rotate(self.model_centroid));
                Transform3D::new(translation, rotation)
            })
            .filter(|pose| {
                !self.params.filter_on
                    || scene_bounds.is_some_and(|b| b.contains_point(pose.translation))
            })
            .map(|pose| PoseHypothesis::new(pose, self.score(&pose, &scene)))
            .collect();

        let best = hypotheses.iter().map(|h| h.votes).fold(0.0_f32, f32::max);
        if best <= 0.0 {
            return Vec::new();
        }
        let floor = self.params.accumulator_peak_threshold * best;
        hypotheses.retain(|h| h.votes >= floor);
        // Stable: equal votes keep the lower yaw bin first.
        hypotheses.sort_by(|a, b| b.votes.total_cmp(&a.votes));
        hypotheses.truncate(self.params.hypotheses_per_model);
        hypotheses
    }
}

/// Keep every n-th point so that roughly `fraction` of the cloud remains.
fn reference_points(points: &[Vec3], fraction: f32) -> Vec<Vec3> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return points.to_vec();
    }
    let step = (1.0 / fraction).round().max(1.0) as usize;
    points.iter().step_by(step).copied().collect()
}

/// Keep the first point falling into each cube of edge `step`.
fn voxel_downsample(points: &[Vec3], step: f32) -> Vec<Vec3> {
    if step <= 0.0 {
        return points.to_vec();
    }
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| {
            let key = (
                (p.x / step).floor() as i64,
                (p.y / step).floor() as i64,
                (p.z / step).floor() as i64,
            );
            seen.insert(key)
        })
        .copied()
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Model index
// ─────────────────────────────────────────────────────────────────────────────

/// Nearest-neighbour index over a model's reference cloud.
///
/// Points are stored in a skewed frame: a `KdTree` bucket cannot hold more
/// than 32 points sharing one coordinate, which an axis-aligned planar model
/// would otherwise exceed.  Distances are unaffected by the rotation.
struct ModelIndex {
    tree: KdTree<f32, 3>,
    skew: Quaternion,
    keys: Vec<[f32; 3]>,
}

impl ModelIndex {
    fn build(points: &[Vec3]) -> Self {
        let skew = Quaternion::new(0.9, 0.21, 0.33, 0.17).normalized();
        let keys: Vec<[f32; 3]> = points.iter().map(|p| key(skew, *p)).collect();
        let mut tree: KdTree<f32, 3> = KdTree::new();
        for (i, k) in keys.iter().enumerate() {
            tree.add(k, i as u64);
        }
        Self { tree, skew, keys }
    }

    /// Squared distance from `p` to the closest model point; infinite for an
    /// empty model.
    fn nearest_distance_squared(&self, p: Vec3) -> f32 {
        if self.keys.is_empty() {
            return f32::INFINITY;
        }
        self.tree
            .nearest_one::<SquaredEuclidean>(&key(self.skew, p))
            .distance
    }

    /// Mean distance from each model point to its `k`-th nearest neighbour.
    fn knn_radius(&self, k: usize) -> Option<f32> {
        let n = self.keys.len();
        if n < 2 || k == 0 {
            return None;
        }
        let k = k.min(n - 1);
        let total: f32 = self
            .keys
            .iter()
            .map(|query| {
                // The first neighbour is the query point itself.
                let neighbours = self.tree.nearest_n::<SquaredEuclidean>(query, k + 1);
                neighbours.last().map_or(0.0, |nn| nn.distance.sqrt())
            })
            .sum();
        Some(total / n as f32)
    }
}

fn key(skew: Quaternion, p: Vec3) -> [f32; 3] {
    let q = skew.rotate(p);
    [q.x, q.y, q.z]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An L-shaped model: no rotational symmetry about Z.
    fn l_shape() -> Arc<ObjectModel> {
        let mut pts = Vec::new();
        for i in 0..6 {
            pts.push(Vec3::new(i as f32 * 0.02, 0.0, 0.0));
        }
        for i in 1..4 {
            pts.push(Vec3::new(0.0, i as f32 * 0.02, 0.0));
        }
        Arc::new(ObjectModel::new("l_bracket", pts))
    }

    fn params() -> EstimatorParams {
        EstimatorParams {
            angle_bins: 4,
            reference_points_percentage: 1.0,
            radius: 0.005,
            accumulator_peak_threshold: 0.0,
            ..EstimatorParams::default()
        }
    }

    fn shifted_scene(model: &ObjectModel, offset: Vec3) -> Vec<Vec3> {
        model.reference_cloud.iter().map(|p| p.add(offset)).collect()
    }

    #[test]
    fn recovers_translation_of_shifted_model() {
        let model = l_shape();
        let scene = shifted_scene(&model, Vec3::new(1.0, 2.0, 0.5));
        let est = CentroidEstimator::new(model, params());

        let hyps = est.estimate(&scene);
        assert!(!hyps.is_empty());
        let best = hyps[0];
        assert!((best.votes - 1.0).abs() < 1e-6, "votes={}", best.votes);
        assert!(best.pose.translation.distance(Vec3::new(1.0, 2.0, 0.5)) < 1e-4);
        assert_eq!(best.pose.rotation, Quaternion::identity());
    }

    #[test]
    fn hypotheses_are_best_first_and_capped() {
        let model = l_shape();
        let scene = shifted_scene(&model, Vec3::zero());
        let est = CentroidEstimator::new(
            model,
            EstimatorParams {
                hypotheses_per_model: 2,
                ..params()
            },
        );
        let hyps = est.estimate(&scene);
        assert_eq!(hyps.len(), 2);
        assert!(hyps[0].votes >= hyps[1].votes);
    }

    #[test]
    fn peak_threshold_discards_weak_hypotheses() {
        let model = l_shape();
        let scene = shifted_scene(&model, Vec3::zero());
        let est = CentroidEstimator::new(
            model,
            EstimatorParams {
                accumulator_peak_threshold: 1.0,
                ..params()
            },
        );
        let hyps = est.estimate(&scene);
        assert!(hyps.iter().all(|h| (h.votes - 1.0).abs() < 1e-6));
    }

    #[test]
    fn distant_scene_yields_no_hypotheses() {
        let est = CentroidEstimator::new(l_shape(), params());
        // Two points 1 m apart; the 10 cm model cannot reach either.
        let scene = vec![Vec3::new(10.0, 10.0, 10.0), Vec3::new(11.0, 10.0, 10.0)];
        assert!(est.estimate(&scene).is_empty());
    }

    #[test]
    fn empty_scene_yields_no_hypotheses() {
        let est = CentroidEstimator::new(l_shape(), params());
        assert!(est.estimate(&[]).is_empty());
    }

    #[test]
    fn knn_mode_derives_radius_from_model_density() {
        let est = CentroidEstimator::new(
            l_shape(),
            EstimatorParams {
                radius_search: false,
                neighbours: 1,
                ..params()
            },
        );
        // Nearest neighbour spacing along both arms is 0.02.
        assert!((est.inlier_radius() - 0.02).abs() < 1e-5);
    }

    /// A flat 40×40 plate at z = 0 with 1 cm spacing.
    fn plate() -> Arc<ObjectModel> {
        let mut pts = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                pts.push(Vec3::new(i as f32 * 0.01, j as f32 * 0.01, 0.0));
            }
        }
        Arc::new(ObjectModel::new("plate", pts))
    }

    #[test]
    fn large_planar_model_is_indexed_and_matched() {
        let model = plate();
        let scene = shifted_scene(&model, Vec3::new(0.3, -0.2, 0.75));
        let est = CentroidEstimator::new(model, params());

        let hyps = est.estimate(&scene);
        assert!(!hyps.is_empty());
        assert!((hyps[0].votes - 1.0).abs() < 1e-6, "votes={}", hyps[0].votes);
    }

    #[test]
    fn knn_radius_on_planar_grid_matches_spacing() {
        let est = CentroidEstimator::new(
            plate(),
            EstimatorParams {
                radius_search: false,
                neighbours: 1,
                ..params()
            },
        );
        assert!((est.inlier_radius() - 0.01).abs() < 1e-5, "r={}", est.inlier_radius());
    }

    #[test]
    fn knn_radius_caps_neighbour_count_at_model_size() {
        let pts = vec![Vec3::zero(), Vec3::new(0.1, 0.0, 0.0), Vec3::new(0.3, 0.0, 0.0)];
        let est = CentroidEstimator::new(
            Arc::new(ObjectModel::new("sparse", pts)),
            EstimatorParams {
                radius_search: false,
                neighbours: 50,
                ..params()
            },
        );
        // Farthest neighbours: 0.3, 0.2, 0.3.
        assert!((est.inlier_radius() - 0.8 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn rotated_scene_scores_best_at_matching_yaw() {
        let model = l_shape();
        let yaw = Quaternion::from_yaw(TAU / 4.0);
        let scene: Vec<Vec3> = model.reference_cloud.iter().map(|p| yaw.rotate(*p)).collect();
        let est = CentroidEstimator::new(model, params());

        let best = est.estimate(&scene)[0];
        assert!((best.votes - 1.0).abs() < 1e-6);
        let axis = Vec3::new(1.0, 0.0, 0.0);
        assert!(best.pose.rotation.rotate(axis).distance(yaw.rotate(axis)) < 1e-4);
    }

    #[test]
    fn reference_points_subsample_by_fraction() {
        let pts: Vec<Vec3> = (0..10).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        assert_eq!(reference_points(&pts, 0.5).len(), 5);
        assert_eq!(reference_points(&pts, 1.0).len(), 10);
    }

    #[test]
    fn voxel_downsample_merges_close_points() {
        let pts = vec![
            Vec3::new(0.01, 0.01, 0.01),
            Vec3::new(0.02, 0.02, 0.02),
            Vec3::new(0.5, 0.5, 0.5),
        ];
        assert_eq!(voxel_downsample(&pts, 0.1).len(), 2);
        assert_eq!(voxel_downsample(&pts, 0.0).len(), 3);
    }
}

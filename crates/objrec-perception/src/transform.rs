//! Transform Frame (TF) Engine and bounded-wait cloud transformer.
//!
//! [`TfEngine`] maintains a graph of named reference frames and the rigid
//! transforms relating them.  Every edge can be walked in both directions
//! (the reverse direction uses the inverse transform), so any two connected
//! frames can be related via BFS.
//!
//! [`TfBuffer`] wraps an engine in a `Mutex` + `Condvar` so that one thread
//! can publish transforms while another blocks in
//! [`FrameTransformer::transform_cloud`] until the transform it needs shows up
//! or its wait bound elapses.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use objrec_perception::transform::{FrameTransformer, TfBuffer};
//! use objrec_types::{Header, PointCloud, Quaternion, Transform3D, Vec3};
//!
//! let tf = TfBuffer::new();
//! // camera sits 1 m above base_link.
//! tf.set_transform("base_link", "camera",
//!     Transform3D::new(Vec3::new(0.0, 0.0, 1.0), Quaternion::identity()));
//!
//! let cloud = PointCloud::new(Header::new("camera", 0), vec![Vec3::zero()]);
//! let out = tf.transform_cloud(&cloud, "base_link", Duration::from_millis(10)).unwrap();
//! assert!((out.points[0].z - 1.0).abs() < 1e-5);
//! assert_eq!(out.header.frame_id, "base_link");
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use objrec_types::{PointCloud, Transform3D};
use thiserror::Error;
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure to re-express a cloud in the requested frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("no transform from '{source_frame}' to '{target_frame}' after {waited:?}")]
    Unavailable {
        source_frame: String,
        target_frame: String,
        waited: Duration,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A graph of named reference frames and the [`Transform3D`]s that relate
/// them.
///
/// [`TfEngine::set_transform`] records T_parent_child; [`TfEngine::lookup`]
/// walks forward edges as given and backward edges inverted.
#[derive(Debug, Default)]
pub struct TfEngine {
    /// `edges[from][to] = T_from_to`
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    /// Create an empty TF engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` in `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
        self.edges
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string(), transform.inverse());
    }

    /// Compute T_target_source: the transform that maps points expressed in
    /// `source_frame` into `target_frame`.
    ///
    /// Returns `None` if the two frames are not connected.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        // BFS from the target; each item carries T_target_current.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((target_frame.to_string(), Transform3D::identity()));
        visited.insert(target_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(neighbours) = self.edges.get(&current) else {
                continue;
            };
            for (next, edge_tf) in neighbours {
                if visited.contains(next) {
                    continue;
                }
                let composed = accumulated.compose(*edge_tf);
                if next == source_frame {
                    return Some(composed);
                }
                visited.insert(next.clone());
                queue.push_back((next.clone(), composed));
            }
        }

        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameTransformer
// ────────────────────────────────────────────────────────────────────────────

/// Capability to re-express a point cloud in another frame.
pub trait FrameTransformer: Send + Sync {
    /// Return `cloud` expressed in `target_frame`, blocking for at most
    /// `max_wait` for the transform to become available.
    ///
    /// The returned cloud keeps the input sequence number and carries
    /// `target_frame` as its frame id.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Unavailable`] on timeout.
    fn transform_cloud(
        &self,
        cloud: &PointCloud,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<PointCloud, TransformError>;
}

// ────────────────────────────────────────────────────────────────────────────
// TfBuffer
// ────────────────────────────────────────────────────────────────────────────

/// Thread-safe transform cache with blocking lookups.
#[derive(Debug, Default)]
pub struct TfBuffer {
    engine: Mutex<TfEngine>,
    updated: Condvar,
}

impl TfBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish T_parent_child and wake every waiting lookup.
    pub fn set_transform(&self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        let mut engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        engine.set_transform(parent_frame, child_frame, transform);
        drop(engine);
        self.updated.notify_all();
    }

    /// Block until T_target_source can be resolved or `max_wait` elapses.
    ///
    /// A `max_wait` too large to express as an [`Instant`] (e.g.
    /// [`Duration::MAX`]) waits without a deadline.
    pub fn wait_for_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        max_wait: Duration,
    ) -> Result<Transform3D, TransformError> {
        let start = Instant::now();
        let deadline = start.checked_add(max_wait);
        let mut engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(t) = engine.lookup(target_frame, source_frame) {
                return Ok(t);
            }
            engine = match deadline {
                None => self
                    .updated
                    .wait(engine)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransformError::Unavailable {
                            source_frame: source_frame.to_string(),
                            target_frame: target_frame.to_string(),
                            waited: now - start,
                        });
                    }
                    self.updated
                        .wait_timeout(engine, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }
}

impl FrameTransformer for TfBuffer {
    fn transform_cloud(
        &self,
        cloud: &PointCloud,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<PointCloud, TransformError> {
        let t = self.wait_for_transform(target_frame, &cloud.header.frame_id, max_wait)?;
        debug!(
            source = %cloud.header.frame_id,
            target = %target_frame,
            points = cloud.len(),
            "cloud transformed"
        );
        let mut header = cloud.header.clone();
        header.frame_id = target_frame.to_string();
        Ok(PointCloud::new(header, crate::bounds::transform_points(&t, &cloud.points)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use objrec_types::{Header, Quaternion, Vec3};
    use std::f32::consts::FRAC_PI_2;
    use std::sync::Arc;
    use std::thread;

    fn shift(x: f32, y: f32, z: f32) -> Transform3D {
        Transform3D::from_translation(Vec3::new(x, y, z))
    }

    // ── TfEngine ────────────────────────────────────────────────────────────

    #[test]
    fn lookup_same_frame_returns_identity() {
        let tf = TfEngine::new();
        assert_eq!(tf.lookup("world", "world"), Some(Transform3D::identity()));
    }

    #[test]
    fn lookup_composed_chain() {
        let mut tf = TfEngine::new();
        tf.set_transform("world", "robot_base", shift(1.0, 0.0, 0.0));
        tf.set_transform("robot_base", "camera", shift(0.5, 0.0, 0.0));

        let t = tf.lookup("world", "camera").unwrap();
        assert!((t.translation.x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn lookup_reverse_direction_uses_inverse() {
        let mut tf = TfEngine::new();
        tf.set_transform("world", "robot_base", shift(1.0, 0.0, 0.0));

        let t = tf.lookup("robot_base", "world").unwrap();
        assert!((t.translation.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn lookup_unconnected_returns_none() {
        let mut tf = TfEngine::new();
        tf.set_transform("world", "robot_base", shift(1.0, 0.0, 0.0));
        assert!(tf.lookup("world", "ghost_frame").is_none());
    }

    #[test]
    fn set_transform_overrides_previous() {
        let mut tf = TfEngine::new();
        tf.set_transform("world", "sensor", shift(1.0, 0.0, 0.0));
        tf.set_transform("world", "sensor", shift(5.0, 0.0, 0.0));

        let t = tf.lookup("world", "sensor").unwrap();
        assert!((t.translation.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn lookup_respects_rotation_in_chain() {
        // base rotated 90° about Z at world origin; camera 1 m along base +X.
        let mut tf = TfEngine::new();
        tf.set_transform(
            "world",
            "robot_base",
            Transform3D::new(Vec3::zero(), Quaternion::from_yaw(FRAC_PI_2)),
        );
        tf.set_transform("robot_base", "camera", shift(1.0, 0.0, 0.0));

        let t = tf.lookup("world", "camera").unwrap();
        assert!(t.translation.x.abs() < 1e-5, "x={}", t.translation.x);
        assert!((t.translation.y - 1.0).abs() < 1e-5, "y={}", t.translation.y);
    }

    // ── TfBuffer ────────────────────────────────────────────────────────────

    #[test]
    fn transform_cloud_rewrites_frame_and_points() {
        let tf = TfBuffer::new();
        tf.set_transform("base_link", "camera", shift(0.0, 0.0, 1.0));

        let cloud = PointCloud::new(
            Header::new("camera", 7),
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        );
        let out = tf
            .transform_cloud(&cloud, "base_link", Duration::from_millis(10))
            .unwrap();
        assert_eq!(out.header.frame_id, "base_link");
        assert_eq!(out.header.seq, 7);
        assert!((out.points[0].z - 1.0).abs() < 1e-5);
        assert!((out.points[1].y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn missing_transform_times_out() {
        let tf = TfBuffer::new();
        let cloud = PointCloud::new(Header::new("camera", 0), vec![Vec3::zero()]);
        let start = Instant::now();
        let err = tf
            .transform_cloud(&cloud, "base_link", Duration::from_millis(30))
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(30));
        let TransformError::Unavailable {
            source_frame,
            target_frame,
            ..
        } = err;
        assert_eq!(source_frame, "camera");
        assert_eq!(target_frame, "base_link");
    }

    #[test]
    fn wait_wakes_when_transform_published() {
        let tf = Arc::new(TfBuffer::new());
        let publisher = tf.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.set_transform("base_link", "camera", shift(2.0, 0.0, 0.0));
        });

        let t = tf
            .wait_for_transform("base_link", "camera", Duration::from_secs(2))
            .unwrap();
        assert!((t.translation.x - 2.0).abs() < 1e-5);
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_wait_returns_cached_transform() {
        let tf = TfBuffer::new();
        tf.set_transform("base_link", "camera", Transform3D::identity());
        let cloud = PointCloud::new(Header::new("camera", 3), vec![Vec3::new(0.5, 0.0, 0.0)]);

        let out = tf.transform_cloud(&cloud, "base_link", Duration::MAX).unwrap();
        assert_eq!(out.header.frame_id, "base_link");
        assert!((out.points[0].x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unbounded_wait_wakes_when_transform_published() {
        let tf = Arc::new(TfBuffer::new());
        let publisher = tf.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.set_transform("base_link", "camera", shift(0.0, 3.0, 0.0));
        });

        let t = tf
            .wait_for_transform("base_link", "camera", Duration::MAX)
            .unwrap();
        assert!((t.translation.y - 3.0).abs() < 1e-5);
        handle.join().unwrap();
    }
}

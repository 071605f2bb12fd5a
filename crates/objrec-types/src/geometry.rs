//! Rigid-body geometry primitives shared by every ObjRec crate.
//!
//! Points and translations are [`Vec3`]; rotations are unit [`Quaternion`]s
//! in (w, x, y, z) order; a [`Transform3D`] is a rotation followed by a
//! translation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector, also used as a point in a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(self, other: Self) -> f32 {
        let d = self.sub(other);
        d.x * d.x + d.y * d.y + d.z * d.z
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Arithmetic mean of `points`, or `None` for an empty slice.
    pub fn centroid(points: &[Vec3]) -> Option<Vec3> {
        if points.is_empty() {
            return None;
        }
        let sum = points.iter().fold(Vec3::zero(), |acc, p| acc.add(*p));
        Some(sum.scale(1.0 / points.len() as f32))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1); see [`Quaternion::normalized`].
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the +Z axis.
    pub fn from_yaw(angle_rad: f32) -> Self {
        let half = angle_rad * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Scale to unit length.  A degenerate (zero) quaternion becomes the
    /// identity.
    pub fn normalized(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n <= f32::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.  The same type doubles as an object pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// Compose two transforms.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// Inverse transform: T_A_B becomes T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let inv_trans = inv_rot.rotate(self.translation).scale(-1.0);
        Self::new(inv_trans, inv_rot)
    }

    /// Map a point from the child frame into the parent frame.
    pub fn apply(self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-5
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(close(r, Vec3::new(0.0, 1.0, 0.0)), "got {r:?}");
    }

    #[test]
    fn from_yaw_matches_explicit_quaternion() {
        let q = Quaternion::from_yaw(FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn normalized_zero_quaternion_is_identity() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized();
        assert_eq!(q, Quaternion::identity());
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized();
        assert!((q.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn inverse_composes_to_identity() {
        let t = Transform3D::new(Vec3::new(1.0, -2.0, 0.5), Quaternion::from_yaw(0.7));
        let round = t.compose(t.inverse());
        assert!(close(round.translation, Vec3::zero()));
        assert!((round.rotation.w.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn apply_rotates_then_translates() {
        let t = Transform3D::new(Vec3::new(0.0, 0.0, 1.0), Quaternion::from_yaw(FRAC_PI_2));
        let p = t.apply(Vec3::new(1.0, 0.0, 0.0));
        assert!(close(p, Vec3::new(0.0, 1.0, 1.0)), "got {p:?}");
    }

    #[test]
    fn centroid_of_empty_is_none() {
        assert!(Vec3::centroid(&[]).is_none());
        let c = Vec3::centroid(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 6.0)]).unwrap();
        assert!(close(c, Vec3::new(1.0, 2.0, 3.0)));
    }
}

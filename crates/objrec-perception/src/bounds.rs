//! Axis-aligned bounds and rigid cloud transforms.
//!
//! | Item | Role |
//! |------|------|
//! | [`Aabb`]              | Min/max corners of a point set.                  |
//! | [`bounding_box`]      | Box dims + centred pose of a cloud.              |
//! | [`transform_points`]  | Apply a [`Transform3D`] to every point.          |
//! | [`transform_cloud`]   | Same, producing a new stamped [`PointCloud`].    |

use objrec_types::{BoundingBox, Header, PointCloud, StampedPose, Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The constructor normalises the corners so that `min ≤ max` per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Tightest box around `points`, or `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some(Self { min, max })
    }

    /// Extent along each axis.
    pub fn dims(&self) -> Vec3 {
        self.max.sub(self.min)
    }

    /// Return the centre point of the box.
    pub fn centre(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Grow the box by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self::new(self.min.sub(m), self.max.add(m))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cloud helpers
// ────────────────────────────────────────────────────────────────────────────

/// Region box of `cloud`: per-axis extent plus a pose at the box centre with
/// identity rotation, stamped with the cloud's header.
///
/// An empty cloud yields a zero-size box at the origin.
pub fn bounding_box(cloud: &PointCloud) -> BoundingBox {
    let (dims, centre) = match Aabb::from_points(&cloud.points) {
        Some(aabb) => (aabb.dims(), aabb.centre()),
        None => (Vec3::zero(), Vec3::zero()),
    };
    BoundingBox {
        dims,
        pose: StampedPose {
            header: cloud.header.clone(),
            pose: Transform3D::from_translation(centre),
        },
    }
}

/// Apply `transform` to every point.
pub fn transform_points(transform: &Transform3D, points: &[Vec3]) -> Vec<Vec3> {
    points.iter().map(|p| transform.apply(*p)).collect()
}

/// Move `points` by `transform` and stamp the result with `header`.
pub fn transform_cloud(transform: &Transform3D, points: &[Vec3], header: Header) -> PointCloud {
    PointCloud::new(header, transform_points(transform, points))
}

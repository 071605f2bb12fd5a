//! `objrec-perception` – frames and geometry.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine]: graph of named
//!   reference frames; [`TfBuffer`][transform::TfBuffer]: the shared,
//!   blocking transform cache behind the
//!   [`FrameTransformer`][transform::FrameTransformer] capability.
//! - [`bounds`] – [`Aabb`][bounds::Aabb], cluster bounding boxes and rigid
//!   cloud transforms.

pub mod bounds;
pub mod transform;

pub use bounds::{Aabb, bounding_box, transform_cloud, transform_points};
pub use transform::{FrameTransformer, TfBuffer, TfEngine, TransformError};

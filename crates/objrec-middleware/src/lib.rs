//! `objrec-middleware` – message plumbing around the recognizer.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`visualizer`] – the fire-and-forget
//!   [`VisualizationSink`][visualizer::VisualizationSink] and its bus-backed
//!   implementation.

pub mod bus;
pub mod visualizer;

pub use bus::{BusError, EventBus, Topic, TopicReceiver};
pub use visualizer::{BusVisualizer, VisualizationSink};

//! One-way visualization sink.
//!
//! Recognition hands a finished [`MarkerBatch`] to a [`VisualizationSink`]
//! and moves on; sinks report nothing back and must not block.

use objrec_types::{Event, EventPayload, MarkerBatch};
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Receiver of detection markers.
pub trait VisualizationSink: Send + Sync {
    /// Deliver `markers`.  Failures are the sink's own business.
    fn show(&self, markers: MarkerBatch);
}

/// Publishes marker batches on [`Topic::Markers`].
#[derive(Debug, Clone)]
pub struct BusVisualizer {
    bus: EventBus,
}

impl BusVisualizer {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl VisualizationSink for BusVisualizer {
    fn show(&self, markers: MarkerBatch) {
        let clouds = markers.clouds.len();
        let event = Event::new("objrec-middleware::visualizer", EventPayload::Markers(markers));
        match self.bus.publish_to(Topic::Markers, event) {
            Ok(receivers) => debug!(clouds, receivers, "markers published"),
            Err(e) => debug!(clouds, error = %e, "markers dropped"),
        }
    }
}

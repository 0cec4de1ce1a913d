//! Display sinks and the coalescing hand-off from the render worker.

/// Single-slot mailbox carrying composited frames to the host.
pub mod link;
/// Sink contract and bundled sinks.
pub mod sink;

pub use link::DisplayLink;
pub use sink::{DisplaySink, InMemoryDisplay, PngDisplay, update_rect};

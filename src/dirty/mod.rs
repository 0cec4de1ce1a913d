//! Per-node dirty tracking.
//!
//! The registry is kind-agnostic: it stores an opaque [`NodeId`](crate::NodeId), the last
//! committed [`ContentHash`](crate::ContentHash) and an edge-triggered dirty flag per node. Slots
//! are addressed by generation-checked [`DirtyHandle`]s so a handle outliving its node is inert.

/// Shared host-side notifier and the worker-visible change signal.
pub mod notifier;
/// Arena-backed dirty registry.
pub mod registry;

pub use notifier::{DirtyNotifier, DirtySignal};
pub use registry::{ChangeKind, DirtyEntry, DirtyHandle, DirtyRegistry, RegistrationState};

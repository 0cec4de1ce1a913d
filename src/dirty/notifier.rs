use crate::dirty::registry::{ChangeKind, DirtyHandle, DirtyRegistry};
use crate::foundation::core::NodeId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic change counter bumped by every registry mutation.
///
/// The render worker compares epochs to decide whether a resync rendezvous is worth scheduling;
/// the registry itself is only read and cleared on the host lane.
#[derive(Clone, Debug, Default)]
pub struct DirtySignal {
    epoch: Arc<AtomicU64>,
}

impl DirtySignal {
    /// New signal at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cloneable host-side front of a [`DirtyRegistry`].
///
/// Change callbacks hold one of these. The lock is uncontended: notifications and resync passes
/// both run on the host lane.
#[derive(Clone)]
pub struct DirtyNotifier {
    registry: Arc<Mutex<DirtyRegistry>>,
}

impl DirtyNotifier {
    /// Wrap a shared registry.
    pub fn new(registry: Arc<Mutex<DirtyRegistry>>) -> Self {
        Self { registry }
    }

    /// See [`DirtyRegistry::register`].
    pub fn register(&self, node: NodeId) -> DirtyHandle {
        self.registry.lock().register(node)
    }

    /// See [`DirtyRegistry::mark_dirty`].
    pub fn mark_dirty(&self, node: NodeId, kind: ChangeKind) -> bool {
        self.registry.lock().mark_dirty(node, kind)
    }

    /// See [`DirtyRegistry::unregister`].
    pub fn unregister(&self, node: NodeId) -> bool {
        self.registry.lock().unregister(node)
    }

    /// Run `f` with the registry locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut DirtyRegistry) -> R) -> R {
        f(&mut self.registry.lock())
    }
}

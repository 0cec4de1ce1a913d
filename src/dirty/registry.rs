use crate::dirty::notifier::DirtySignal;
use crate::foundation::core::NodeId;
use crate::hash::ContentHash;
use std::collections::HashMap;

bitflags::bitflags! {
    /// Kinds of change reported by host notifications, accumulated per entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeKind: u8 {
        /// A node attribute value changed.
        const ATTRIBUTE = 1 << 0;
        /// Node structure changed (parenting, instancing, connections).
        const TOPOLOGY = 1 << 1;
        /// Node visibility toggled.
        const VISIBILITY = 1 << 2;
    }
}

/// Generation-checked slot reference into a [`DirtyRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirtyHandle {
    index: u32,
    generation: u32,
}

impl DirtyHandle {
    /// Slot index (diagnostics only).
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Sync state of a registered node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationState {
    /// Registered but never pushed to the engine.
    Pending,
    /// Pushed to the engine at least once.
    Synced,
}

/// Tracking record for one node.
#[derive(Clone, Debug)]
pub struct DirtyEntry {
    /// Node identity.
    pub node: NodeId,
    /// Hash committed by the last resync, `None` before the first one.
    pub last_hash: Option<ContentHash>,
    /// Pending-change flag.
    pub dirty: bool,
    /// Changes accumulated since the last [`DirtyRegistry::take_dirty_set`].
    pub pending: ChangeKind,
    /// Changes handed out by the last [`DirtyRegistry::take_dirty_set`].
    pub taken: ChangeKind,
    /// Sync state.
    pub state: RegistrationState,
}

struct Slot {
    generation: u32,
    entry: Option<DirtyEntry>,
}

/// Arena of [`DirtyEntry`] keyed by [`NodeId`].
///
/// Unknown nodes and stale handles are no-ops on every operation. Dirty handles are returned in
/// the order their nodes were first marked since the previous take.
pub struct DirtyRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_node: HashMap<NodeId, DirtyHandle>,
    dirty_order: Vec<DirtyHandle>,
    removed: Vec<NodeId>,
    signal: DirtySignal,
}

impl DirtyRegistry {
    /// Empty registry with its own change signal.
    pub fn new() -> Self {
        Self::with_signal(DirtySignal::new())
    }

    /// Empty registry bumping `signal` on every observable change.
    pub fn with_signal(signal: DirtySignal) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_node: HashMap::new(),
            dirty_order: Vec::new(),
            removed: Vec::new(),
            signal,
        }
    }

    /// Signal shared with readers that only need "something changed".
    pub fn signal(&self) -> &DirtySignal {
        &self.signal
    }

    /// Register `node`, returning its handle. Idempotent: a registered node keeps its handle and
    /// state. New entries start dirty.
    pub fn register(&mut self, node: NodeId) -> DirtyHandle {
        if let Some(&h) = self.by_node.get(&node) {
            return h;
        }

        let entry = DirtyEntry {
            node,
            last_hash: None,
            dirty: true,
            pending: ChangeKind::empty(),
            taken: ChangeKind::empty(),
            state: RegistrationState::Pending,
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                DirtyHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                DirtyHandle {
                    index,
                    generation: 0,
                }
            }
        };

        // A node re-registered before the removal was drained must not be forgotten.
        self.removed.retain(|n| *n != node);
        self.by_node.insert(node, handle);
        self.dirty_order.push(handle);
        self.signal.bump();
        handle
    }

    /// Mark `node` dirty. Returns `false` for unknown nodes.
    pub fn mark_dirty(&mut self, node: NodeId, kind: ChangeKind) -> bool {
        match self.by_node.get(&node).copied() {
            Some(h) => self.mark_handle_dirty(h, kind),
            None => false,
        }
    }

    /// Mark a slot dirty. Returns `false` for stale handles.
    pub fn mark_handle_dirty(&mut self, handle: DirtyHandle, kind: ChangeKind) -> bool {
        let Some(entry) = self.entry_mut(handle) else {
            return false;
        };
        entry.pending |= kind;
        if !entry.dirty {
            entry.dirty = true;
            self.dirty_order.push(handle);
        }
        self.signal.bump();
        true
    }

    /// Return and clear every dirty entry.
    ///
    /// Edge-triggered: a handle is returned once per marking. The change mask handed out is
    /// available through [`Self::changes`] until the next take.
    pub fn take_dirty_set(&mut self) -> Vec<DirtyHandle> {
        let order = std::mem::take(&mut self.dirty_order);
        let mut out = Vec::with_capacity(order.len());
        for h in order {
            if let Some(entry) = self.entry_mut(h)
                && entry.dirty
            {
                entry.dirty = false;
                entry.taken = std::mem::take(&mut entry.pending);
                out.push(h);
            }
        }
        out
    }

    /// Remove `node`. Its slot generation advances so outstanding handles become inert, and the
    /// node is queued for [`Self::take_removed`] if it was ever synced.
    pub fn unregister(&mut self, node: NodeId) -> bool {
        let Some(h) = self.by_node.remove(&node) else {
            return false;
        };
        let slot = &mut self.slots[h.index as usize];
        let was_synced = slot
            .entry
            .take()
            .is_some_and(|e| e.state == RegistrationState::Synced);
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(h.index);
        if was_synced {
            self.removed.push(node);
        }
        self.signal.bump();
        true
    }

    /// Forget every committed hash and mark all entries dirty, as for a fresh engine context.
    ///
    /// Pending removals are dropped: a fresh context holds no counterpart to release.
    pub fn reset_sync_state(&mut self) {
        self.removed.clear();
        self.dirty_order.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(e) = slot.entry.as_mut() {
                e.last_hash = None;
                e.state = RegistrationState::Pending;
                e.dirty = true;
                e.pending = ChangeKind::empty();
                e.taken = ChangeKind::empty();
                self.dirty_order.push(DirtyHandle {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }
        self.signal.bump();
    }

    /// Drain nodes unregistered after they had been pushed to the engine.
    pub fn take_removed(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.removed)
    }

    /// Record the hash pushed by a resync and mark the entry synced.
    pub fn commit_hash(&mut self, handle: DirtyHandle, hash: ContentHash) -> bool {
        let Some(entry) = self.entry_mut(handle) else {
            return false;
        };
        entry.last_hash = Some(hash);
        entry.state = RegistrationState::Synced;
        true
    }

    /// Last committed hash.
    pub fn last_hash(&self, handle: DirtyHandle) -> Option<ContentHash> {
        self.entry(handle).and_then(|e| e.last_hash)
    }

    /// Node behind a handle; `None` once unregistered.
    pub fn node(&self, handle: DirtyHandle) -> Option<NodeId> {
        self.entry(handle).map(|e| e.node)
    }

    /// Handle currently assigned to `node`.
    pub fn handle_of(&self, node: NodeId) -> Option<DirtyHandle> {
        self.by_node.get(&node).copied()
    }

    /// Change mask handed out by the last take.
    pub fn changes(&self, handle: DirtyHandle) -> ChangeKind {
        self.entry(handle).map(|e| e.taken).unwrap_or_default()
    }

    /// `true` when the entry is currently dirty.
    pub fn is_dirty(&self, handle: DirtyHandle) -> bool {
        self.entry(handle).is_some_and(|e| e.dirty)
    }

    /// Borrow an entry.
    pub fn entry(&self, handle: DirtyHandle) -> Option<&DirtyEntry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: DirtyHandle) -> Option<&mut DirtyEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// `true` when `node` is registered.
    pub fn contains(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    /// Registered node count.
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// `true` when no node is registered.
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Currently dirty entry count.
    pub fn dirty_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.entry.as_ref().is_some_and(|e| e.dirty))
            .count()
    }

    /// `true` when a resync pass has work (dirty entries or pending removals).
    pub fn has_work(&self) -> bool {
        !self.removed.is_empty() || self.dirty_len() > 0
    }
}

impl Default for DirtyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dirty/registry.rs"]
mod tests;

use super::*;
use crate::dirty::DirtyNotifier;
use crate::engine::EngineError;
use crate::foundation::core::NodeId;
use crate::hash::ContentHash;
use std::cell::Cell;
use std::collections::BTreeMap;

#[derive(Default)]
struct MapTranslator {
    values: BTreeMap<NodeId, u64>,
    resynced: Vec<(NodeId, ChangeKind)>,
    forgotten: Vec<NodeId>,
    fail_on: Option<NodeId>,
}

impl SceneTranslator for MapTranslator {
    fn content_hash(&self, node: NodeId) -> Option<ContentHash> {
        self.values
            .get(&node)
            .map(|v| ContentHash::SEED.combine(v))
    }

    fn resync(
        &mut self,
        node: NodeId,
        changes: ChangeKind,
        _engine: EngineHandle,
    ) -> EngineResult<()> {
        if self.fail_on == Some(node) {
            return Err(EngineError::Resync {
                node,
                reason: "rejected".to_owned(),
            });
        }
        self.resynced.push((node, changes));
        Ok(())
    }

    fn forget(&mut self, node: NodeId, _engine: EngineHandle) -> EngineResult<()> {
        self.forgotten.push(node);
        Ok(())
    }

    fn attach(&mut self, _notifier: DirtyNotifier) {}
}

const E: EngineHandle = EngineHandle(1);

fn never() -> bool {
    false
}

fn synced(count: u64) -> (DirtyRegistry, MapTranslator) {
    let mut r = DirtyRegistry::new();
    let mut t = MapTranslator::default();
    for i in 0..count {
        r.register(NodeId(i));
        t.values.insert(NodeId(i), i);
    }
    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.resynced, count as usize);
    t.resynced.clear();
    (r, t)
}

#[test]
fn only_semantically_changed_nodes_are_resynced() {
    let (mut r, mut t) = synced(10);
    for i in [2, 5, 7] {
        *t.values.get_mut(&NodeId(i)).unwrap() += 100;
        r.mark_dirty(NodeId(i), ChangeKind::ATTRIBUTE);
    }

    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.resynced, 3);
    assert_eq!(stats.examined, 3);
    let nodes: Vec<_> = t.resynced.iter().map(|(n, _)| n.0).collect();
    assert_eq!(nodes, vec![2, 5, 7]);
}

#[test]
fn notification_without_change_is_skipped() {
    let (mut r, mut t) = synced(4);
    r.mark_dirty(NodeId(1), ChangeKind::ATTRIBUTE);
    r.mark_dirty(NodeId(3), ChangeKind::VISIBILITY);

    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.unchanged, 2);
    assert!(!stats.touched_engine());
    assert!(t.resynced.is_empty());
}

#[test]
fn topology_change_bypasses_the_hash() {
    let (mut r, mut t) = synced(2);
    r.mark_dirty(NodeId(0), ChangeKind::TOPOLOGY);

    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.resynced, 1);
    assert_eq!(t.resynced, vec![(NodeId(0), ChangeKind::TOPOLOGY)]);
}

#[test]
fn removed_synced_nodes_are_forgotten_once() {
    let (mut r, mut t) = synced(3);
    r.unregister(NodeId(1));
    t.values.remove(&NodeId(1));

    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.forgotten, 1);
    assert_eq!(t.forgotten, vec![NodeId(1)]);

    let again = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(again.forgotten, 0);
}

#[test]
fn node_missing_from_host_counts_as_vanished() {
    let mut r = DirtyRegistry::new();
    let mut t = MapTranslator::default();
    r.register(NodeId(9));

    let stats = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(stats.vanished, 1);
    assert_eq!(stats.resynced, 0);
}

#[test]
fn cancellation_defers_the_rest() {
    let (mut r, mut t) = synced(5);
    for i in 0..5 {
        *t.values.get_mut(&NodeId(i)).unwrap() += 1;
        r.mark_dirty(NodeId(i), ChangeKind::ATTRIBUTE);
    }

    let polls = Cell::new(0);
    let cancel_after_two = || {
        polls.set(polls.get() + 1);
        polls.get() > 2
    };
    let stats = resync_pass(&mut r, &mut t, E, &cancel_after_two).unwrap();
    assert_eq!(stats.resynced, 2);
    assert_eq!(stats.deferred, 3);
    assert_eq!(r.dirty_len(), 3);

    let rest = resync_pass(&mut r, &mut t, E, &never).unwrap();
    assert_eq!(rest.resynced, 3);
    let changes: Vec<_> = t.resynced[2..].iter().map(|(_, c)| *c).collect();
    assert!(changes.iter().all(|c| *c == ChangeKind::ATTRIBUTE));
}

#[test]
fn failed_resync_leaves_hash_uncommitted() {
    let (mut r, mut t) = synced(2);
    *t.values.get_mut(&NodeId(0)).unwrap() += 1;
    r.mark_dirty(NodeId(0), ChangeKind::ATTRIBUTE);
    t.fail_on = Some(NodeId(0));

    let err = resync_pass(&mut r, &mut t, E, &never).unwrap_err();
    assert!(matches!(err, EngineError::Resync { .. }));
    let h = r.handle_of(NodeId(0)).unwrap();
    assert_ne!(r.last_hash(h), t.content_hash(NodeId(0)));
}

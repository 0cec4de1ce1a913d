use super::*;

fn n(v: u64) -> NodeId {
    NodeId(v)
}

#[test]
fn register_is_idempotent_and_starts_dirty() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    let b = r.register(n(1));
    assert_eq!(a, b);
    assert_eq!(r.len(), 1);
    assert!(r.is_dirty(a));
    assert_eq!(r.entry(a).unwrap().state, RegistrationState::Pending);
    assert_eq!(r.take_dirty_set(), vec![a]);
}

#[test]
fn take_is_edge_triggered() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    let _ = r.take_dirty_set();

    assert!(r.mark_dirty(n(1), ChangeKind::ATTRIBUTE));
    assert!(r.mark_dirty(n(1), ChangeKind::VISIBILITY));
    assert_eq!(r.take_dirty_set(), vec![a]);
    assert!(r.take_dirty_set().is_empty());
    assert_eq!(r.changes(a), ChangeKind::ATTRIBUTE | ChangeKind::VISIBILITY);
}

#[test]
fn dirty_set_preserves_mark_order() {
    let mut r = DirtyRegistry::new();
    let hs: Vec<_> = (0..5).map(|i| r.register(n(i))).collect();
    let _ = r.take_dirty_set();

    r.mark_dirty(n(3), ChangeKind::ATTRIBUTE);
    r.mark_dirty(n(0), ChangeKind::ATTRIBUTE);
    r.mark_dirty(n(3), ChangeKind::TOPOLOGY);
    assert_eq!(r.take_dirty_set(), vec![hs[3], hs[0]]);
}

#[test]
fn unknown_nodes_and_stale_handles_are_noops() {
    let mut r = DirtyRegistry::new();
    assert!(!r.mark_dirty(n(42), ChangeKind::ATTRIBUTE));
    assert!(!r.unregister(n(42)));

    let a = r.register(n(1));
    assert!(r.unregister(n(1)));
    assert!(!r.mark_handle_dirty(a, ChangeKind::ATTRIBUTE));
    assert!(!r.commit_hash(a, ContentHash(1)));
    assert!(r.node(a).is_none());
    assert!(r.last_hash(a).is_none());
}

#[test]
fn unregister_mid_pass_drops_taken_handle() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    let b = r.register(n(2));
    let taken = r.take_dirty_set();
    assert_eq!(taken, vec![a, b]);

    r.unregister(n(1));
    let live: Vec<_> = taken.iter().filter_map(|h| r.node(*h)).collect();
    assert_eq!(live, vec![n(2)]);
}

#[test]
fn reused_slot_does_not_resurrect_old_handle() {
    let mut r = DirtyRegistry::new();
    let old = r.register(n(1));
    r.unregister(n(1));
    let new = r.register(n(2));
    assert_eq!(old.index(), new.index());
    assert_ne!(old, new);
    assert!(r.node(old).is_none());
    assert_eq!(r.node(new), Some(n(2)));
}

#[test]
fn removal_is_reported_only_for_synced_nodes() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    r.register(n(2));
    let _ = r.take_dirty_set();
    r.commit_hash(a, ContentHash(9));

    r.unregister(n(1));
    r.unregister(n(2));
    assert_eq!(r.take_removed(), vec![n(1)]);
    assert!(r.take_removed().is_empty());
}

#[test]
fn commit_hash_marks_synced() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    let _ = r.take_dirty_set();
    assert!(r.commit_hash(a, ContentHash(77)));
    assert_eq!(r.last_hash(a), Some(ContentHash(77)));
    assert_eq!(r.entry(a).unwrap().state, RegistrationState::Synced);
    assert!(!r.has_work());
}

#[test]
fn signal_advances_on_every_mutation() {
    let mut r = DirtyRegistry::new();
    let sig = r.signal().clone();
    let e0 = sig.epoch();
    r.register(n(1));
    let e1 = sig.epoch();
    assert!(e1 > e0);
    r.mark_dirty(n(1), ChangeKind::ATTRIBUTE);
    assert!(sig.epoch() > e1);
    let e2 = sig.epoch();
    r.mark_dirty(n(99), ChangeKind::ATTRIBUTE);
    assert_eq!(sig.epoch(), e2);
}

#[test]
fn reset_sync_state_makes_everything_dirty_again() {
    let mut r = DirtyRegistry::new();
    let a = r.register(n(1));
    let b = r.register(n(2));
    r.register(n(3));
    let _ = r.take_dirty_set();
    r.commit_hash(a, ContentHash(1));
    r.commit_hash(b, ContentHash(2));
    r.unregister(n(3));

    r.reset_sync_state();
    assert!(r.take_removed().is_empty());
    assert_eq!(r.take_dirty_set(), vec![a, b]);
    assert_eq!(r.last_hash(a), None);
    assert_eq!(r.entry(b).unwrap().state, RegistrationState::Pending);
}

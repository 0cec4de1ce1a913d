use crate::dirty::{ChangeKind, DirtyRegistry};
use crate::engine::EngineResult;
use crate::foundation::core::EngineHandle;
use crate::scene::translator::SceneTranslator;

/// Counters of one resync pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResyncStats {
    /// Unregistered nodes whose engine counterpart was released.
    pub forgotten: usize,
    /// Dirty entries examined.
    pub examined: usize,
    /// Entries pushed to the engine.
    pub resynced: usize,
    /// Entries whose hash matched the committed one.
    pub unchanged: usize,
    /// Entries that disappeared before they could be hashed.
    pub vanished: usize,
    /// Entries put back because the pass was cancelled.
    pub deferred: usize,
}

impl ResyncStats {
    /// `true` when the engine scene was modified.
    pub fn touched_engine(&self) -> bool {
        self.resynced > 0 || self.forgotten > 0
    }

    /// Fold another pass into this one.
    pub fn absorb(&mut self, o: ResyncStats) {
        self.forgotten += o.forgotten;
        self.examined += o.examined;
        self.resynced += o.resynced;
        self.unchanged += o.unchanged;
        self.vanished += o.vanished;
        self.deferred += o.deferred;
    }
}

/// Push every semantically changed node into the engine.
///
/// Removed nodes are forgotten first. Each dirty entry is re-hashed and resynced only when the
/// hash differs from the committed one, or when a topology change was reported. `cancelled` is
/// polled between nodes; entries not reached are marked dirty again.
#[tracing::instrument(level = "debug", skip_all, fields(engine = ?engine))]
pub fn resync_pass(
    registry: &mut DirtyRegistry,
    translator: &mut dyn SceneTranslator,
    engine: EngineHandle,
    cancelled: &dyn Fn() -> bool,
) -> EngineResult<ResyncStats> {
    let mut stats = ResyncStats::default();

    for node in registry.take_removed() {
        translator.forget(node, engine)?;
        stats.forgotten += 1;
    }

    let dirty = registry.take_dirty_set();
    for (i, &h) in dirty.iter().enumerate() {
        if cancelled() {
            for &rest in &dirty[i..] {
                let changes = registry.changes(rest);
                if registry.mark_handle_dirty(rest, changes) {
                    stats.deferred += 1;
                }
            }
            break;
        }

        stats.examined += 1;
        let Some(node) = registry.node(h) else {
            stats.vanished += 1;
            continue;
        };
        let Some(hash) = translator.content_hash(node) else {
            stats.vanished += 1;
            continue;
        };

        let changes = registry.changes(h);
        if registry.last_hash(h) == Some(hash) && !changes.contains(ChangeKind::TOPOLOGY) {
            stats.unchanged += 1;
            continue;
        }

        translator.resync(node, changes, engine)?;
        registry.commit_hash(h, hash);
        stats.resynced += 1;
    }

    tracing::debug!(?stats, "resync pass done");
    Ok(stats)
}

#[cfg(test)]
#[path = "../../tests/unit/scene/resync.rs"]
mod tests;

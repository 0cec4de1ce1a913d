use crate::dirty::{ChangeKind, DirtyNotifier};
use crate::engine::procedural::{Disc, Light, SharedEngineScene};
use crate::engine::{EngineError, EngineResult};
use crate::foundation::core::{EngineHandle, NodeId};
use crate::hash::{ContentHash, ContentHasher, HashField};
use crate::scene::translator::{NodeKind, SceneTranslator};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Authoritative host-side node.
#[derive(Clone, Debug, PartialEq)]
pub struct HostNode {
    /// Display name.
    pub name: String,
    /// Typed payload.
    pub kind: NodeKind,
    /// Visibility flag.
    pub visible: bool,
}

impl HostNode {
    /// Visible node.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visible: true,
        }
    }
}

impl HashField for HostNode {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_str(&self.name).write(&self.kind).write_bool(self.visible);
    }
}

/// Host scene graph, reduced to the nodes the translator needs.
#[derive(Clone, Debug, Default)]
pub struct HostScene {
    nodes: BTreeMap<NodeId, HostNode>,
    next_id: u64,
}

/// Host scene shared between the host application and the translator.
pub type SharedHostScene = Arc<Mutex<HostScene>>;

impl HostScene {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a [`SharedHostScene`].
    pub fn shared(self) -> SharedHostScene {
        Arc::new(Mutex::new(self))
    }

    /// Insert a node under a fresh id.
    pub fn insert(&mut self, node: HostNode) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, node);
        id
    }

    /// Borrow a node.
    pub fn get(&self, id: NodeId) -> Option<&HostNode> {
        self.nodes.get(&id)
    }

    /// Mutably borrow a node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut HostNode> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node.
    pub fn remove(&mut self, id: NodeId) -> Option<HostNode> {
        self.nodes.remove(&id)
    }

    /// Node ids in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Translator from [`HostScene`] nodes to procedural engine primitives.
pub struct ProceduralTranslator {
    host: SharedHostScene,
    engine: SharedEngineScene,
    notifier: Option<DirtyNotifier>,
    resyncs: u64,
}

impl ProceduralTranslator {
    /// Translator reading `host` and writing `engine`.
    pub fn new(host: SharedHostScene, engine: SharedEngineScene) -> Self {
        Self {
            host,
            engine,
            notifier: None,
            resyncs: 0,
        }
    }

    /// Nodes pushed so far.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Notifier received through [`SceneTranslator::attach`].
    pub fn notifier(&self) -> Option<&DirtyNotifier> {
        self.notifier.as_ref()
    }
}

impl SceneTranslator for ProceduralTranslator {
    fn content_hash(&self, node: NodeId) -> Option<ContentHash> {
        self.host
            .lock()
            .get(node)
            .map(|n| ContentHash::SEED.combine(n))
    }

    fn resync(
        &mut self,
        node: NodeId,
        changes: ChangeKind,
        _engine: EngineHandle,
    ) -> EngineResult<()> {
        let Some(n) = self.host.lock().get(node).cloned() else {
            return Err(EngineError::Resync {
                node,
                reason: "node vanished from the host scene".to_owned(),
            });
        };
        tracing::trace!(%node, name = %n.name, ?changes, "resync");

        let mut scene = self.engine.lock();
        match n.kind {
            NodeKind::Mesh {
                center,
                radius,
                albedo,
            } => scene.set_disc(
                node,
                Disc {
                    center,
                    radius,
                    albedo,
                    visible: n.visible,
                },
            ),
            NodeKind::Light {
                direction,
                color,
                intensity,
            } => scene.set_light(
                node,
                Light {
                    direction,
                    color,
                    intensity,
                    visible: n.visible,
                },
            ),
            NodeKind::Camera { exposure } => {
                scene.set_exposure(if n.visible { exposure } else { 1.0 });
            }
            NodeKind::Volume { .. } => {
                tracing::debug!(%node, "volumes are not rendered by the procedural engine");
            }
        }
        self.resyncs += 1;
        Ok(())
    }

    fn forget(&mut self, node: NodeId, _engine: EngineHandle) -> EngineResult<()> {
        self.engine.lock().remove(node);
        Ok(())
    }

    fn attach(&mut self, notifier: DirtyNotifier) {
        self.notifier = Some(notifier);
    }
}

/// Host-side editing front: mutates [`HostScene`] and fires the matching change notification.
#[derive(Clone)]
pub struct SceneEditor {
    host: SharedHostScene,
    notifier: DirtyNotifier,
}

impl SceneEditor {
    /// Editor over `host` reporting to `notifier`.
    pub fn new(host: SharedHostScene, notifier: DirtyNotifier) -> Self {
        Self { host, notifier }
    }

    /// Add and register a node.
    pub fn add(&self, node: HostNode) -> NodeId {
        let id = self.host.lock().insert(node);
        self.notifier.register(id);
        id
    }

    /// Mutate a node and notify. Visibility flips report [`ChangeKind::VISIBILITY`], anything else
    /// [`ChangeKind::ATTRIBUTE`].
    pub fn update(&self, id: NodeId, f: impl FnOnce(&mut HostNode)) -> bool {
        let kind = {
            let mut host = self.host.lock();
            let Some(n) = host.get_mut(id) else {
                return false;
            };
            let was_visible = n.visible;
            f(n);
            if n.visible != was_visible {
                ChangeKind::VISIBILITY
            } else {
                ChangeKind::ATTRIBUTE
            }
        };
        self.notifier.mark_dirty(id, kind)
    }

    /// Fire a change notification without changing anything.
    pub fn touch(&self, id: NodeId) -> bool {
        self.notifier.mark_dirty(id, ChangeKind::ATTRIBUTE)
    }

    /// Remove and unregister a node.
    pub fn remove(&self, id: NodeId) -> bool {
        self.host.lock().remove(id);
        self.notifier.unregister(id)
    }

    /// Add a camera, a key light and `discs` pseudo-random discs derived from `seed`.
    pub fn populate_demo(&self, discs: usize, seed: u64) -> Vec<NodeId> {
        let mut ids = vec![
            self.add(HostNode::new("camera", NodeKind::Camera { exposure: 1.0 })),
            self.add(HostNode::new(
                "key_light",
                NodeKind::Light {
                    direction: [0.4, 0.6, 1.0],
                    color: [1.0, 0.95, 0.9],
                    intensity: 1.2,
                },
            )),
        ];
        for i in 0..discs {
            let h = ContentHash(seed).combine(&(i as u64)).get();
            let unit = |shift: u32| ((h >> shift) & 0xff) as f32 / 255.0;
            ids.push(self.add(HostNode::new(
                format!("disc_{i}"),
                NodeKind::Mesh {
                    center: [0.1 + 0.8 * unit(0), 0.1 + 0.8 * unit(8)],
                    radius: 0.05 + 0.15 * unit(16),
                    albedo: [unit(24), unit(32), unit(40)],
                },
            )));
        }
        ids
    }
}

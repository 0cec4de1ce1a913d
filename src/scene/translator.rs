use crate::dirty::{ChangeKind, DirtyNotifier};
use crate::engine::EngineResult;
use crate::foundation::core::{EngineHandle, NodeId};
use crate::hash::{ContentHash, ContentHasher, HashField};

/// Capability-tagged node payload consumed by translators.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Renderable surface.
    Mesh {
        /// Center in normalized frame coordinates.
        center: [f32; 2],
        /// Radius relative to the frame's shorter side.
        radius: f32,
        /// Linear RGB albedo.
        albedo: [f32; 3],
    },
    /// Light emitter.
    Light {
        /// Direction towards the light.
        direction: [f32; 3],
        /// Linear RGB color.
        color: [f32; 3],
        /// Scalar intensity.
        intensity: f32,
    },
    /// Viewing camera.
    Camera {
        /// Exposure multiplier.
        exposure: f32,
    },
    /// Participating medium.
    Volume {
        /// Extinction density.
        density: f32,
        /// Single-scattering albedo.
        albedo: [f32; 3],
    },
}

impl NodeKind {
    /// Stable tag written ahead of the payload when hashing.
    pub fn tag(&self) -> u8 {
        match self {
            NodeKind::Mesh { .. } => 0,
            NodeKind::Light { .. } => 1,
            NodeKind::Camera { .. } => 2,
            NodeKind::Volume { .. } => 3,
        }
    }
}

impl HashField for NodeKind {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u8(self.tag());
        match self {
            NodeKind::Mesh {
                center,
                radius,
                albedo,
            } => {
                h.write(center).write(radius).write(albedo);
            }
            NodeKind::Light {
                direction,
                color,
                intensity,
            } => {
                h.write(direction).write(color).write(intensity);
            }
            NodeKind::Camera { exposure } => {
                h.write(exposure);
            }
            NodeKind::Volume { density, albedo } => {
                h.write(density).write(albedo);
            }
        }
    }
}

/// Scene translator contract.
///
/// Called on the host lane only. Translators keep their own link to the engine-side scene;
/// the [`EngineHandle`] names the context being fed.
pub trait SceneTranslator: Send {
    /// Hash of the node's current observable state; `None` once the host no longer has it.
    fn content_hash(&self, node: NodeId) -> Option<ContentHash>;

    /// Push the node's current state into the engine.
    fn resync(&mut self, node: NodeId, changes: ChangeKind, engine: EngineHandle)
    -> EngineResult<()>;

    /// Release the engine counterpart of a node that was unregistered.
    fn forget(&mut self, node: NodeId, engine: EngineHandle) -> EngineResult<()> {
        let _ = (node, engine);
        Ok(())
    }

    /// Receive the notifier that change callbacks should call.
    fn attach(&mut self, notifier: DirtyNotifier) {
        let _ = notifier;
    }
}

//! Scene translation boundary and the resync pass.

/// Reference host scene and translator over the procedural engine.
pub mod procedural;
/// Resync pass driven from the dirty registry.
pub mod resync;
/// Scene translator contract and node kinds.
pub mod translator;

pub use procedural::{HostNode, HostScene, ProceduralTranslator, SceneEditor, SharedHostScene};
pub use resync::{ResyncStats, resync_pass};
pub use translator::{NodeKind, SceneTranslator};

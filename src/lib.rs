//! `ipr` drives a long-running render engine from a single-threaded host while keeping the
//! displayed image consistent with a mutating scene.
//!
//! - Track node changes in a [`DirtyRegistry`] keyed by [`ContentHash`]
//! - Coordinate the host and one render worker through a [`Coordinator`]
//! - Run a [`RenderSession`] (start, pause, resize, stop) over a [`RenderEngine`]
//! - Accumulate tiles and composite AOVs with a [`TileCompositor`] into a [`DisplaySink`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Tile decomposition, AOV accumulation and compositing.
pub mod compositor;
/// Per-node dirty tracking.
pub mod dirty;
/// Display sinks and the frame mailbox.
pub mod display;
/// Render engine client contract and reference engine.
pub mod engine;
/// Content hashing.
pub mod hash;
/// Scene translation and resync.
pub mod scene;
/// Render session state machine.
pub mod session;
/// Host/worker coordination.
pub mod threading;

pub use crate::foundation::core::{EngineHandle, NodeId, RenderRegion, RgbaF32, TileSize};
pub use crate::foundation::error::{IprError, IprResult};

pub use crate::compositor::{
    AovBuffer, AovId, AovTile, CompositeSettings, FrameBuffer, ShadowCatcherParams,
    TileCompositor, decompose,
};
pub use crate::dirty::{ChangeKind, DirtyHandle, DirtyNotifier, DirtyRegistry};
pub use crate::display::{DisplaySink, InMemoryDisplay, PngDisplay};
pub use crate::engine::{
    EngineError, EngineResult, ImageFilters, IterationReport, ProceduralEngine, RenderEngine,
};
pub use crate::hash::{ContentHash, ContentHasher, HashField};
pub use crate::scene::{ResyncStats, SceneTranslator, resync_pass};
pub use crate::session::{
    CompletionCriteria, PumpReport, RenderMode, RenderSession, RenderSessionOpts, SessionState,
    SessionStats,
};
pub use crate::threading::{Coordinator, Lane, ThreadingMode};

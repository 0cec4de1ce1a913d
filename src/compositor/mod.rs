//! Tile decomposition, AOV accumulation and display compositing.
//!
//! Linear passes (background lerp, shadow-catcher blend, opacity merge) are per-pixel and order
//! independent. Tonemap and denoise are non-linear and always run on the FULL accumulated color
//! buffer, never on a partial tile.

/// Named per-pass pixel buffers.
pub mod aov;
/// Fixed blend formulas for special passes.
pub mod blend;
/// Display-ready frame buffer.
pub mod frame;
/// Size-bucketed buffer reuse.
pub mod pool;
/// Frame-level accumulation and compositing.
pub mod tile_compositor;
/// Deterministic tile decomposition.
pub mod tiling;

pub use aov::{AovBuffer, AovId, AovTile};
pub use blend::ShadowCatcherParams;
pub use frame::FrameBuffer;
pub use pool::{AovPool, AovPoolOpts, AovPoolStats};
pub use tile_compositor::{CompositeSettings, TileCompositor};
pub use tiling::{Tiles, decompose, decompose_by};

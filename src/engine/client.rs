use crate::compositor::{AovBuffer, AovId, ShadowCatcherParams};
use crate::foundation::core::{EngineHandle, NodeId, RenderRegion, RgbaF32};

/// Result of an engine client or scene translator call.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure raised by the render engine client or the scene translator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Context creation failed.
    #[error("context creation failed: {0}")]
    ContextCreation(String),

    /// Handle does not name a live context.
    #[error("unknown engine handle {0:?}")]
    UnknownHandle(EngineHandle),

    /// A render iteration failed.
    #[error("render iteration failed: {0}")]
    Iteration(String),

    /// Reading back a pass failed.
    #[error("reading {} failed: {reason}", .aov.name())]
    AovRead {
        /// Pass being read.
        aov: AovId,
        /// Engine-provided reason.
        reason: String,
    },

    /// Tonemapper or denoiser failed.
    #[error("post-process failed: {0}")]
    PostProcess(String),

    /// Pushing a node into the engine failed.
    #[error("resync of node {node} failed: {reason}")]
    Resync {
        /// Node being pushed.
        node: NodeId,
        /// Translator-provided reason.
        reason: String,
    },
}

/// What one render iteration reported.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IterationReport {
    /// Samples accumulated per pixel so far, as counted by the engine.
    pub samples: u32,
    /// Mean per-pixel variance of the accumulated estimate, if the engine tracks it.
    pub variance: Option<f32>,
}

/// Full-buffer image filters. Both operate on the COMPLETE color buffer.
pub trait ImageFilters {
    /// Map HDR color into display range.
    fn tonemap(&mut self, color: AovBuffer) -> EngineResult<AovBuffer>;
    /// Denoise the accumulated color buffer.
    fn denoise(&mut self, color: AovBuffer) -> EngineResult<AovBuffer>;
}

/// Render engine client.
///
/// Every method is called from the render worker lane only. One session holds a context handle at
/// a time.
pub trait RenderEngine: ImageFilters + Send {
    /// Create a device context for `region`.
    fn create_context(&mut self, region: RenderRegion) -> EngineResult<EngineHandle>;

    /// Replace the frame of an existing context, as after a viewport resize.
    ///
    /// Accumulated samples are discarded and subsequent iterations cover the whole new frame.
    fn resize_context(&mut self, handle: EngineHandle, frame: RenderRegion) -> EngineResult<()>;

    /// Restrict subsequent iterations to `region`, a tile of the context frame or the frame itself.
    ///
    /// Never changes the frame; a region outside it is an error.
    fn set_region(&mut self, handle: EngineHandle, region: RenderRegion) -> EngineResult<()>;

    /// Restart accumulation after scene or region changes.
    fn invalidate(&mut self, handle: EngineHandle) -> EngineResult<()> {
        let _ = handle;
        Ok(())
    }

    /// Render one iteration over the current region.
    fn render_iteration(&mut self, handle: EngineHandle) -> EngineResult<IterationReport>;

    /// Read the resolved pixels of `aov` inside `tile`, bottom row first.
    fn read_aov(
        &mut self,
        handle: EngineHandle,
        aov: AovId,
        tile: RenderRegion,
    ) -> EngineResult<Vec<RgbaF32>>;

    /// Shadow-catcher blend scalars, when the scene has a shadow catcher.
    fn shadow_catcher(&self, handle: EngineHandle) -> Option<ShadowCatcherParams> {
        let _ = handle;
        None
    }

    /// Release the context.
    fn destroy_context(&mut self, handle: EngineHandle) -> EngineResult<()>;
}

//! Render engine client contract and the built-in procedural CPU engine.

/// Engine client traits, reports and errors.
pub mod client;
/// Deterministic CPU reference engine.
pub mod procedural;

pub use client::{EngineError, EngineResult, ImageFilters, IterationReport, RenderEngine};
pub use procedural::{EngineScene, ProceduralEngine, ProceduralEngineOpts, SharedEngineScene};

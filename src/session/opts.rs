use crate::compositor::{AovId, CompositeSettings};
use crate::foundation::core::TileSize;
use crate::foundation::error::{IprError, IprResult};
use crate::threading::ThreadingMode;
use std::path::Path;

/// What the session does once its completion criteria are met.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Keep the context alive, idle until the scene changes and re-render.
    #[default]
    Interactive,
    /// Publish a final frame and return to idle. The scene is synced once at start.
    Batch,
}

/// Options controlling a [`crate::session::RenderSession`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderSessionOpts {
    /// Interactive (IPR) or batch render.
    pub mode: RenderMode,
    /// Dedicated worker thread or host-driven inline worker.
    pub threading: ThreadingMode,
    /// Split every iteration into tiles of at most this size. `None` renders the full region.
    pub tile_size: Option<TileSize>,
    /// Passes to accumulate in addition to color.
    pub aovs: Vec<AovId>,
    /// Compositing stages.
    pub composite: CompositeSettings,
    /// How long an idle or paused worker sleeps between checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Minimum time between two published frames, in milliseconds. The final frame of a batch
    /// render is always published.
    pub display_interval_ms: u64,
    /// Byte budget of the AOV buffer pool.
    pub aov_pool_budget_bytes: usize,
}

impl Default for RenderSessionOpts {
    fn default() -> Self {
        Self {
            mode: RenderMode::Interactive,
            threading: ThreadingMode::Dedicated,
            tile_size: None,
            aovs: vec![AovId::Opacity, AovId::Background, AovId::ShadowCatcher],
            composite: CompositeSettings::default(),
            poll_interval_ms: 5,
            display_interval_ms: 0,
            aov_pool_budget_bytes: 256 * 1024 * 1024,
        }
    }
}

impl RenderSessionOpts {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> IprResult<Self> {
        let opts: Self = serde_json::from_str(s).map_err(|e| IprError::serde(e.to_string()))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> IprResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| IprError::configuration(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Reject zero tile sizes.
    pub fn validate(&self) -> IprResult<()> {
        if let Some(t) = self.tile_size {
            TileSize::new(t.width, t.height)?;
        }
        Ok(())
    }
}

use crate::compositor::FrameBuffer;
use crate::foundation::core::RenderRegion;
use crate::foundation::error::{IprError, IprResult};
use std::path::{Path, PathBuf};

/// Host viewport or output file consuming composited pixels.
///
/// Called from the host lane only, in publish order: `update_region` followed by `refresh` for the
/// same rectangle.
pub trait DisplaySink {
    /// Take ownership of a composited frame; `rect` is the part that changed.
    fn update_region(&mut self, frame: FrameBuffer, rect: RenderRegion) -> IprResult<()>;
    /// Present `rect`.
    fn refresh(&mut self, rect: RenderRegion) -> IprResult<()>;
}

/// Rectangle to report for `frame`: `rect` when it is a valid sub-rectangle, the full frame
/// otherwise.
pub fn update_rect(frame: &FrameBuffer, rect: RenderRegion) -> RenderRegion {
    match rect.validate() {
        Ok(r) if frame.rect.contains(r) => r,
        _ => frame.rect,
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryDisplay {
    /// Frames in delivery order, with their update rectangle.
    pub frames: Vec<(RenderRegion, FrameBuffer)>,
    /// Rectangles passed to `refresh`.
    pub refreshes: Vec<RenderRegion>,
}

impl InMemoryDisplay {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent frame.
    pub fn latest(&self) -> Option<&FrameBuffer> {
        self.frames.last().map(|(_, f)| f)
    }
}

impl DisplaySink for InMemoryDisplay {
    fn update_region(&mut self, frame: FrameBuffer, rect: RenderRegion) -> IprResult<()> {
        self.frames.push((rect, frame));
        Ok(())
    }

    fn refresh(&mut self, rect: RenderRegion) -> IprResult<()> {
        self.refreshes.push(rect);
        Ok(())
    }
}

/// Keeps the latest frame and writes it as an 8-bit RGBA PNG on [`PngDisplay::finish`].
#[derive(Debug)]
pub struct PngDisplay {
    path: PathBuf,
    latest: Option<FrameBuffer>,
    updates: u64,
}

impl PngDisplay {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latest: None,
            updates: 0,
        }
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames received so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Latest frame received.
    pub fn latest(&self) -> Option<&FrameBuffer> {
        self.latest.as_ref()
    }

    /// Write the latest frame.
    pub fn finish(&self) -> IprResult<()> {
        let frame = self
            .latest
            .as_ref()
            .ok_or_else(|| IprError::display("no frame was delivered"))?;
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .map_err(|e| IprError::display(format!("create {}: {e}", dir.display())))?;
        }
        image::save_buffer_with_format(
            &self.path,
            &frame.to_rgba8(),
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| IprError::display(format!("write {}: {e}", self.path.display())))?;
        tracing::info!(path = %self.path.display(), width = frame.width, height = frame.height, "frame written");
        Ok(())
    }
}

impl DisplaySink for PngDisplay {
    fn update_region(&mut self, frame: FrameBuffer, _rect: RenderRegion) -> IprResult<()> {
        self.latest = Some(frame);
        self.updates += 1;
        Ok(())
    }

    fn refresh(&mut self, _rect: RenderRegion) -> IprResult<()> {
        Ok(())
    }
}

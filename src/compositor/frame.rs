use crate::foundation::core::{RenderRegion, RgbaF32};
use crate::foundation::math::{quantize_unorm8, quantize_unorm16};

/// Display-ready composited pixels.
///
/// Rows are stored TOP row first (display order). Every channel is finite and non-negative.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    /// Frame rectangle in engine space.
    pub rect: RenderRegion,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height` pixels, top row first.
    pub pixels: Vec<RgbaF32>,
}

impl FrameBuffer {
    /// Pixel at column `x`, row `y` counted from the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<RgbaF32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// 8-bit RGBA, clamped to `[0, 1]` and rounded.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(quantize_unorm8))
            .collect()
    }

    /// 16-bit RGBA, clamped to `[0, 1]` and rounded.
    pub fn to_rgba16(&self) -> Vec<u16> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(quantize_unorm16))
            .collect()
    }

    /// `true` when no channel is NaN, infinite or negative.
    pub fn is_display_safe(&self) -> bool {
        self.pixels
            .iter()
            .flatten()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

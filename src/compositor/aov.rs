use crate::foundation::core::{RenderRegion, RgbaF32};
use crate::foundation::error::{IprError, IprResult};

/// Render output pass identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AovId {
    /// Beauty pass.
    Color,
    /// Per-pixel coverage in `r`.
    Opacity,
    /// Environment/background contribution.
    Background,
    /// Shadow-catcher shadow amount in `r`, normalized to `[0, 1]`.
    ShadowCatcher,
    /// Per-pixel sample variance in `r`.
    Variance,
}

impl AovId {
    /// Every pass, in canonical order.
    pub const ALL: [AovId; 5] = [
        AovId::Color,
        AovId::Opacity,
        AovId::Background,
        AovId::ShadowCatcher,
        AovId::Variance,
    ];

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            AovId::Color => "color",
            AovId::Opacity => "opacity",
            AovId::Background => "background",
            AovId::ShadowCatcher => "shadow_catcher",
            AovId::Variance => "variance",
        }
    }
}

/// Pixels of one pass for one tile, bottom row first.
#[derive(Clone, Debug, PartialEq)]
pub struct AovTile {
    /// Pass the pixels belong to.
    pub aov: AovId,
    /// `tile.width() * tile.height()` pixels.
    pub pixels: Vec<RgbaF32>,
}

/// Frame-sized buffer for one pass. Rows are stored bottom row first (engine order).
#[derive(Clone, Debug, PartialEq)]
pub struct AovBuffer {
    aov: AovId,
    region: RenderRegion,
    pixels: Vec<RgbaF32>,
}

impl AovBuffer {
    /// Zeroed buffer covering `region`.
    pub fn new(aov: AovId, region: RenderRegion) -> Self {
        Self {
            aov,
            region,
            pixels: vec![[0.0; 4]; region.area() as usize],
        }
    }

    /// Wrap existing pixels; `pixels.len()` must equal `region.area()`.
    pub fn from_pixels(aov: AovId, region: RenderRegion, pixels: Vec<RgbaF32>) -> IprResult<Self> {
        if pixels.len() as u64 != region.area() {
            return Err(IprError::configuration(format!(
                "{} buffer for {region} needs {} pixels, got {}",
                aov.name(),
                region.area(),
                pixels.len()
            )));
        }
        Ok(Self {
            aov,
            region,
            pixels,
        })
    }

    /// Pass id.
    pub fn aov(&self) -> AovId {
        self.aov
    }

    /// Covered region.
    pub fn region(&self) -> RenderRegion {
        self.region
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.region.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.region.height()
    }

    /// All pixels, bottom row first.
    pub fn pixels(&self) -> &[RgbaF32] {
        &self.pixels
    }

    /// Mutable pixels, bottom row first.
    pub fn pixels_mut(&mut self) -> &mut [RgbaF32] {
        &mut self.pixels
    }

    /// Take the pixel storage.
    pub fn into_pixels(self) -> Vec<RgbaF32> {
        self.pixels
    }

    /// Pixel at absolute frame coordinates.
    pub fn get(&self, x: u32, y: u32) -> Option<RgbaF32> {
        self.region
            .contains_point(x, y)
            .then(|| self.pixels[self.region.local_index(x, y)])
    }

    /// Zero every pixel.
    pub fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    /// Overwrite the sub-rectangle `tile` with `src` (bottom row first).
    pub fn write_tile(&mut self, tile: RenderRegion, src: &[RgbaF32]) -> IprResult<()> {
        if !self.region.contains(tile) {
            return Err(IprError::configuration(format!(
                "tile {tile} lies outside frame {}",
                self.region
            )));
        }
        if src.len() as u64 != tile.area() {
            return Err(IprError::configuration(format!(
                "{} tile {tile} needs {} pixels, got {}",
                self.aov.name(),
                tile.area(),
                src.len()
            )));
        }
        let tw = tile.width() as usize;
        for (row, y) in (tile.bottom..=tile.top).enumerate() {
            let dst = self.region.local_index(tile.left, y);
            self.pixels[dst..dst + tw].copy_from_slice(&src[row * tw..(row + 1) * tw]);
        }
        Ok(())
    }

    /// Copy out the sub-rectangle `tile` (bottom row first).
    pub fn read_tile(&self, tile: RenderRegion) -> IprResult<Vec<RgbaF32>> {
        if !self.region.contains(tile) {
            return Err(IprError::configuration(format!(
                "tile {tile} lies outside frame {}",
                self.region
            )));
        }
        let tw = tile.width() as usize;
        let mut out = Vec::with_capacity(tile.area() as usize);
        for y in tile.bottom..=tile.top {
            let src = self.region.local_index(tile.left, y);
            out.extend_from_slice(&self.pixels[src..src + tw]);
        }
        Ok(out)
    }
}

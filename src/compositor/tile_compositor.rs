use crate::compositor::aov::{AovBuffer, AovId, AovTile};
use crate::compositor::blend::{PassSamples, ShadowCatcherParams, merge_pixel};
use crate::compositor::frame::FrameBuffer;
use crate::compositor::pool::{AovPool, AovPoolOpts, AovPoolStats};
use crate::engine::{EngineError, ImageFilters};
use crate::foundation::core::{RenderRegion, RgbaF32};
use crate::foundation::error::{IprError, IprResult};
use crate::foundation::math::sanitize;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Which compositing stages run in [`TileCompositor::composite`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeSettings {
    /// Blend the shadow-catcher (and env background) passes into color.
    pub merge_shadow_catcher: bool,
    /// Replace color alpha with the opacity pass.
    pub merge_opacity: bool,
    /// Run the engine tonemapper on the merged color buffer.
    pub tonemap: bool,
    /// Run the engine denoiser on the full color buffer.
    pub denoise: bool,
    /// Flip rows so the top row comes first.
    pub flip_vertical: bool,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            merge_shadow_catcher: true,
            merge_opacity: false,
            tonemap: false,
            denoise: false,
            flip_vertical: true,
        }
    }
}

/// Owns the per-pass accumulation buffers of the current frame.
pub struct TileCompositor {
    region: Option<RenderRegion>,
    buffers: SmallVec<[AovBuffer; 5]>,
    pool: AovPool,
    denoise_disabled: bool,
}

impl TileCompositor {
    /// Compositor with no frame begun.
    pub fn new(pool_opts: AovPoolOpts) -> Self {
        Self {
            region: None,
            buffers: SmallVec::new(),
            pool: AovPool::new(pool_opts),
            denoise_disabled: false,
        }
    }

    /// Allocate (or reuse) zeroed buffers for `active` passes sized to `region`.
    ///
    /// [`AovId::Color`] is always active. Previous buffers go back to the pool.
    pub fn begin_frame(&mut self, region: RenderRegion, active: &[AovId]) -> IprResult<()> {
        let region = region.validate()?;

        for b in self.buffers.drain(..) {
            let (w, h) = (b.width(), b.height());
            self.pool.release(w, h, b.into_pixels());
        }

        let mut ids: SmallVec<[AovId; 5]> = SmallVec::new();
        ids.push(AovId::Color);
        ids.extend(active.iter().copied());
        ids.sort();
        ids.dedup();

        for aov in ids {
            let pixels = self.pool.borrow(region.width(), region.height());
            self.buffers
                .push(AovBuffer::from_pixels(aov, region, pixels)?);
        }
        self.region = Some(region);
        tracing::debug!(%region, passes = self.buffers.len(), "frame begun");
        Ok(())
    }

    /// Current frame region.
    pub fn region(&self) -> Option<RenderRegion> {
        self.region
    }

    /// Active passes in canonical order.
    pub fn active_aovs(&self) -> Vec<AovId> {
        self.buffers.iter().map(AovBuffer::aov).collect()
    }

    /// Borrow the accumulation buffer of `aov`.
    pub fn buffer(&self, aov: AovId) -> Option<&AovBuffer> {
        self.buffers.iter().find(|b| b.aov() == aov)
    }

    /// Pool counters.
    pub fn pool_stats(&self) -> AovPoolStats {
        self.pool.stats()
    }

    /// `true` once a denoiser failure switched denoising off.
    pub fn denoise_disabled(&self) -> bool {
        self.denoise_disabled
    }

    /// Overwrite `tile` of each active pass with the matching entry of `passes`.
    ///
    /// Tiles may arrive in any order and may be repeated; writing identical data twice leaves the
    /// buffers bit-identical. Passes that are not active are ignored. Every pass is validated
    /// before any buffer is written.
    pub fn accumulate_tile(&mut self, tile: RenderRegion, passes: &[AovTile]) -> IprResult<()> {
        let region = self
            .region
            .ok_or_else(|| IprError::invalid_state("accumulate_tile before begin_frame"))?;
        let tile = tile.validate()?;
        if !region.contains(tile) {
            return Err(IprError::configuration(format!(
                "tile {tile} lies outside frame {region}"
            )));
        }
        if let Some(bad) = passes.iter().find(|p| p.pixels.len() as u64 != tile.area()) {
            return Err(IprError::configuration(format!(
                "{} tile {tile} needs {} pixels, got {}",
                bad.aov.name(),
                tile.area(),
                bad.pixels.len()
            )));
        }

        for pass in passes {
            match self.buffers.iter_mut().find(|b| b.aov() == pass.aov) {
                Some(buf) => buf.write_tile(tile, &pass.pixels)?,
                None => tracing::trace!(aov = pass.aov.name(), "ignoring inactive pass"),
            }
        }
        Ok(())
    }

    /// Produce the display-ready frame.
    ///
    /// Order: special-pass merge, tonemap, denoise (full buffer), sanitize, vertical flip. A
    /// failing denoiser is switched off for the rest of the compositor's life and the un-denoised
    /// buffer is used; a failing tonemapper is an engine fault.
    pub fn composite<F: ImageFilters + ?Sized>(
        &mut self,
        settings: &CompositeSettings,
        shadow: Option<&ShadowCatcherParams>,
        filters: &mut F,
    ) -> IprResult<FrameBuffer> {
        let region = self
            .region
            .ok_or_else(|| IprError::invalid_state("composite before begin_frame"))?;
        let color = self
            .buffer(AovId::Color)
            .ok_or_else(|| IprError::invalid_state("color pass is not allocated"))?;

        let mut merged = color.clone();
        self.merge_special_passes(&mut merged, settings, shadow);

        if settings.tonemap {
            merged = filters.tonemap(merged)?;
            check_same_shape(&merged, region, "tonemap")?;
        }

        if settings.denoise && !self.denoise_disabled {
            let fallback = merged.clone();
            merged = match filters
                .denoise(merged)
                .and_then(|b| check_same_shape(&b, region, "denoise").map(|()| b))
            {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "denoiser failed; disabling denoise for this session");
                    self.denoise_disabled = true;
                    fallback
                }
            };
        }

        let width = region.width();
        let height = region.height();
        let mut pixels = merged.into_pixels();
        pixels
            .par_iter_mut()
            .for_each(|px| *px = px.map(sanitize));
        if settings.flip_vertical {
            pixels = flip_rows(&pixels, width as usize);
        }

        Ok(FrameBuffer {
            rect: region,
            width,
            height,
            pixels,
        })
    }

    fn merge_special_passes(
        &self,
        target: &mut AovBuffer,
        settings: &CompositeSettings,
        shadow: Option<&ShadowCatcherParams>,
    ) {
        let shadow = shadow.filter(|_| settings.merge_shadow_catcher);
        let opacity = self.buffer(AovId::Opacity).map(AovBuffer::pixels);
        let background = self.buffer(AovId::Background).map(AovBuffer::pixels);
        let catcher = self.buffer(AovId::ShadowCatcher).map(AovBuffer::pixels);
        if (shadow.is_none() || catcher.is_none()) && !(settings.merge_opacity && opacity.is_some())
        {
            return;
        }

        let at = |src: Option<&[RgbaF32]>, i: usize| src.map(|p| p[i]);
        target
            .pixels_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, px)| {
                let samples = PassSamples {
                    opacity: at(opacity, i),
                    background: at(background, i),
                    shadow_catcher: at(catcher, i),
                };
                *px = merge_pixel(*px, samples, shadow, settings.merge_opacity);
            });
    }
}

impl Default for TileCompositor {
    fn default() -> Self {
        Self::new(AovPoolOpts::default())
    }
}

fn check_same_shape(
    b: &AovBuffer,
    region: RenderRegion,
    stage: &str,
) -> Result<(), EngineError> {
    if b.region() != region || b.pixels().len() as u64 != region.area() {
        return Err(EngineError::PostProcess(format!(
            "{stage} returned a buffer for {} instead of {region}",
            b.region()
        )));
    }
    Ok(())
}

fn flip_rows(pixels: &[RgbaF32], width: usize) -> Vec<RgbaF32> {
    pixels.chunks(width).rev().flatten().copied().collect()
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/tile_compositor.rs"]
mod tests;

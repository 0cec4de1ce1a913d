use crate::compositor::{AovBuffer, AovId, ShadowCatcherParams};
use crate::engine::client::{
    EngineError, EngineResult, ImageFilters, IterationReport, RenderEngine,
};
use crate::foundation::core::{EngineHandle, NodeId, RenderRegion, RgbaF32};
use crate::foundation::math::luminance;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Shaded disc in normalized frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Disc {
    /// Center, `[0,1]` across the frame width and height.
    pub center: [f32; 2],
    /// Radius as a fraction of the frame's shorter side.
    pub radius: f32,
    /// Linear RGB albedo.
    pub albedo: [f32; 3],
    /// Hidden discs neither render nor cast shadows.
    pub visible: bool,
}

/// Directional light.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    /// Direction towards the light (need not be normalized).
    pub direction: [f32; 3],
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Scalar intensity.
    pub intensity: f32,
    /// Hidden lights contribute nothing.
    pub visible: bool,
}

/// Engine-side scene, written by the scene translator and read by render iterations.
#[derive(Clone, Debug)]
pub struct EngineScene {
    discs: BTreeMap<NodeId, Disc>,
    lights: BTreeMap<NodeId, Light>,
    background: [f32; 3],
    exposure: f32,
    version: u64,
}

/// Scene shared between a translator (host lane) and the engine (worker lane).
pub type SharedEngineScene = Arc<Mutex<EngineScene>>;

impl EngineScene {
    /// Empty scene over a constant background.
    pub fn new(background: [f32; 3]) -> Self {
        Self {
            discs: BTreeMap::new(),
            lights: BTreeMap::new(),
            background,
            exposure: 1.0,
            version: 0,
        }
    }

    /// Wrap into a [`SharedEngineScene`].
    pub fn shared(self) -> SharedEngineScene {
        Arc::new(Mutex::new(self))
    }

    /// Insert or replace a disc.
    pub fn set_disc(&mut self, id: NodeId, disc: Disc) {
        self.discs.insert(id, disc);
        self.version += 1;
    }

    /// Insert or replace a light.
    pub fn set_light(&mut self, id: NodeId, light: Light) {
        self.lights.insert(id, light);
        self.version += 1;
    }

    /// Set camera exposure multiplier.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
        self.version += 1;
    }

    /// Remove whatever primitive `id` maps to.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let removed = self.discs.remove(&id).is_some() | self.lights.remove(&id).is_some();
        if removed {
            self.version += 1;
        }
        removed
    }

    /// Disc for `id`.
    pub fn disc(&self, id: NodeId) -> Option<&Disc> {
        self.discs.get(&id)
    }

    /// Light for `id`.
    pub fn light(&self, id: NodeId) -> Option<&Light> {
        self.lights.get(&id)
    }

    /// Primitive count.
    pub fn len(&self) -> usize {
        self.discs.len() + self.lights.len()
    }

    /// `true` when the scene holds no primitive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Options for [`ProceduralEngine`].
#[derive(Clone, Debug)]
pub struct ProceduralEngineOpts {
    /// Jitter seed.
    pub seed: u64,
    /// Ambient term added to every lit surface.
    pub ambient: f32,
    /// Shadow-catcher scalars reported to the compositor. `None` disables the pass merge.
    pub shadow_catcher: Option<ShadowCatcherParams>,
    /// Box-filter radius used by `denoise`.
    pub denoise_radius: u32,
}

impl Default for ProceduralEngineOpts {
    fn default() -> Self {
        Self {
            seed: 0x9e37_79b9_7f4a_7c15,
            ambient: 0.15,
            shadow_catcher: Some(ShadowCatcherParams {
                shadow_color: [0.02, 0.02, 0.03],
                shadow_transparency: 0.35,
                shadow_weight: 1.0,
                background_is_env: true,
            }),
            denoise_radius: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct PixelAccum {
    samples: u32,
    color: [f32; 3],
    coverage: f32,
    shadow: f32,
    mean_l: f32,
    m2_l: f32,
}

impl PixelAccum {
    fn add(&mut self, s: Sample) {
        self.samples += 1;
        for (acc, v) in self.color.iter_mut().zip(s.color) {
            *acc += v;
        }
        self.coverage += s.coverage;
        self.shadow += s.shadow;

        // Welford over luminance.
        let l = luminance(s.color);
        let delta = l - self.mean_l;
        self.mean_l += delta / self.samples as f32;
        self.m2_l += delta * (l - self.mean_l);
    }

    fn variance(&self) -> f32 {
        if self.samples < 2 {
            0.0
        } else {
            self.m2_l / (self.samples - 1) as f32
        }
    }

    fn mean(&self, v: f32) -> f32 {
        if self.samples == 0 {
            0.0
        } else {
            v / self.samples as f32
        }
    }
}

struct Context {
    frame: RenderRegion,
    active: RenderRegion,
    pixels: Vec<PixelAccum>,
    scene_version: Option<u64>,
    passes: u32,
}

impl Context {
    fn new(frame: RenderRegion) -> Self {
        Self {
            frame,
            active: frame,
            pixels: vec![PixelAccum::default(); frame.area() as usize],
            scene_version: None,
            passes: 0,
        }
    }

    fn reset(&mut self) {
        self.pixels.fill(PixelAccum::default());
        self.passes = 0;
    }
}

#[derive(Clone, Copy, Debug)]
struct Sample {
    color: [f32; 3],
    coverage: f32,
    shadow: f32,
}

struct Sampler<'a> {
    discs: Vec<&'a Disc>,
    lights: Vec<&'a Light>,
    background: [f32; 3],
    exposure: f32,
    frame: RenderRegion,
    seed: u64,
    ambient: f32,
}

impl<'a> Sampler<'a> {
    fn new(scene: &'a EngineScene, frame: RenderRegion, seed: u64, ambient: f32) -> Self {
        Self {
            discs: scene
                .discs
                .values()
                .filter(|d| d.visible && d.radius > 0.0)
                .collect(),
            lights: scene.lights.values().filter(|l| l.visible).collect(),
            background: scene.background,
            exposure: scene.exposure,
            frame,
            seed,
            ambient,
        }
    }

    fn jitter(&self, x: u32, y: u32, pass: u32) -> (f32, f32) {
        let mut key = [0u8; 12];
        key[..4].copy_from_slice(&x.to_le_bytes());
        key[4..8].copy_from_slice(&y.to_le_bytes());
        key[8..].copy_from_slice(&pass.to_le_bytes());
        let h = xxh3_64_with_seed(&key, self.seed);
        let unit = |bits: u64| (bits as u32) as f32 / u32::MAX as f32;
        (unit(h), unit(h >> 32))
    }

    fn sample(&self, x: u32, y: u32, pass: u32) -> Sample {
        let (jx, jy) = self.jitter(x, y, pass);
        let w = self.frame.width() as f32;
        let h = self.frame.height() as f32;
        let s = w.min(h);
        let px = (x - self.frame.left) as f32 + jx;
        let py = (y - self.frame.bottom) as f32 + jy;
        let exposure = self.exposure;

        let mut hit = None;
        for d in &self.discs {
            let r = d.radius * s;
            let dx = (px - d.center[0] * w) / r;
            let dy = (py - d.center[1] * h) / r;
            let r2 = dx * dx + dy * dy;
            if r2 <= 1.0 {
                hit = Some((d, dx, dy, r2));
            }
        }

        if let Some((d, dx, dy, r2)) = hit {
            let n = [dx, dy, (1.0 - r2).max(0.0).sqrt()];
            let mut rad = d.albedo.map(|a| a * self.ambient);
            for l in &self.lights {
                let len = l.direction.iter().map(|c| c * c).sum::<f32>().sqrt();
                if len <= 0.0 {
                    continue;
                }
                let ndotl =
                    (n[0] * l.direction[0] + n[1] * l.direction[1] + n[2] * l.direction[2]) / len;
                let k = ndotl.max(0.0) * l.intensity;
                for c in 0..3 {
                    rad[c] += d.albedo[c] * l.color[c] * k;
                }
            }
            return Sample {
                color: rad.map(|c| c * exposure),
                coverage: 1.0,
                shadow: 0.0,
            };
        }

        let mut shadow: f32 = 0.0;
        for d in &self.discs {
            let r = d.radius * s;
            for l in &self.lights {
                let len = (l.direction[0].powi(2) + l.direction[1].powi(2)).sqrt();
                let (ox, oy) = if len > 0.0 {
                    (-l.direction[0] / len, -l.direction[1] / len)
                } else {
                    (0.0, 0.0)
                };
                let sx = d.center[0] * w + ox * r * 0.6;
                let sy = d.center[1] * h + oy * r * 0.6;
                let dist2 = (px - sx).powi(2) + (py - sy).powi(2);
                if dist2 <= r * r {
                    shadow = shadow.max(l.intensity.clamp(0.0, 1.0));
                }
            }
        }

        Sample {
            color: self.background.map(|c| c * exposure),
            coverage: 0.0,
            shadow,
        }
    }
}

/// Deterministic CPU engine rendering [`EngineScene`] discs with jittered supersampling.
///
/// Rows are rendered in parallel with rayon. Accumulation restarts whenever the shared scene's
/// version changes or [`RenderEngine::invalidate`] is called.
pub struct ProceduralEngine {
    scene: SharedEngineScene,
    opts: ProceduralEngineOpts,
    contexts: HashMap<EngineHandle, Context>,
    next_handle: u64,
    iterations_rendered: u64,
}

impl ProceduralEngine {
    /// Engine reading `scene`.
    pub fn new(scene: SharedEngineScene, opts: ProceduralEngineOpts) -> Self {
        Self {
            scene,
            opts,
            contexts: HashMap::new(),
            next_handle: 1,
            iterations_rendered: 0,
        }
    }

    /// Contexts created and not yet destroyed.
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Iterations rendered across all contexts.
    pub fn iterations_rendered(&self) -> u64 {
        self.iterations_rendered
    }

    fn ctx(&mut self, handle: EngineHandle) -> EngineResult<&mut Context> {
        self.contexts
            .get_mut(&handle)
            .ok_or(EngineError::UnknownHandle(handle))
    }
}

impl ImageFilters for ProceduralEngine {
    fn tonemap(&mut self, mut color: AovBuffer) -> EngineResult<AovBuffer> {
        color.pixels_mut().par_iter_mut().for_each(|px| {
            for c in &mut px[..3] {
                *c = c.max(0.0) / (1.0 + c.max(0.0));
            }
        });
        Ok(color)
    }

    fn denoise(&mut self, color: AovBuffer) -> EngineResult<AovBuffer> {
        let r = self.opts.denoise_radius as i64;
        if r == 0 {
            return Ok(color);
        }
        let w = color.width() as i64;
        let h = color.height() as i64;
        let src = color.pixels();
        let mut out = vec![[0.0f32; 4]; src.len()];
        out.par_chunks_mut(w as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as i64;
                for (x, dst) in row.iter_mut().enumerate() {
                    let x = x as i64;
                    let mut acc = [0.0f32; 3];
                    let mut n = 0.0f32;
                    for ny in (y - r).max(0)..=(y + r).min(h - 1) {
                        for nx in (x - r).max(0)..=(x + r).min(w - 1) {
                            let p = src[(ny * w + nx) as usize];
                            acc[0] += p[0];
                            acc[1] += p[1];
                            acc[2] += p[2];
                            n += 1.0;
                        }
                    }
                    let a = src[(y * w + x) as usize][3];
                    *dst = [acc[0] / n, acc[1] / n, acc[2] / n, a];
                }
            });
        AovBuffer::from_pixels(color.aov(), color.region(), out)
            .map_err(|e| EngineError::PostProcess(e.to_string()))
    }
}

impl RenderEngine for ProceduralEngine {
    fn create_context(&mut self, region: RenderRegion) -> EngineResult<EngineHandle> {
        let region = region
            .validate()
            .map_err(|e| EngineError::ContextCreation(e.to_string()))?;
        let handle = EngineHandle(self.next_handle);
        self.next_handle += 1;
        self.contexts.insert(handle, Context::new(region));
        tracing::debug!(?handle, %region, "procedural context created");
        Ok(handle)
    }

    fn resize_context(&mut self, handle: EngineHandle, frame: RenderRegion) -> EngineResult<()> {
        let frame = frame
            .validate()
            .map_err(|e| EngineError::ContextCreation(e.to_string()))?;
        *self.ctx(handle)? = Context::new(frame);
        tracing::debug!(?handle, %frame, "procedural context resized");
        Ok(())
    }

    fn set_region(&mut self, handle: EngineHandle, region: RenderRegion) -> EngineResult<()> {
        let ctx = self.ctx(handle)?;
        if !ctx.frame.contains(region) {
            return Err(EngineError::Iteration(format!(
                "region {region} outside context frame {}",
                ctx.frame
            )));
        }
        ctx.active = region;
        Ok(())
    }

    fn invalidate(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.ctx(handle)?.reset();
        Ok(())
    }

    fn render_iteration(&mut self, handle: EngineHandle) -> EngineResult<IterationReport> {
        let scene = self.scene.lock().clone();
        let seed = self.opts.seed;
        let ambient = self.opts.ambient;
        let ctx = self.ctx(handle)?;
        if ctx.scene_version != Some(scene.version) {
            ctx.reset();
            ctx.scene_version = Some(scene.version);
        }
        ctx.passes += 1;

        let frame = ctx.frame;
        let active = ctx.active;
        let pass = ctx.passes;
        let fw = frame.width() as usize;
        let sampler = Sampler::new(&scene, frame, seed, ambient);

        ctx.pixels
            .par_chunks_mut(fw)
            .enumerate()
            .for_each(|(row, px_row)| {
                let y = frame.bottom + row as u32;
                if y < active.bottom || y > active.top {
                    return;
                }
                for x in active.left..=active.right {
                    let s = sampler.sample(x, y, pass);
                    px_row[(x - frame.left) as usize].add(s);
                }
            });

        let mut var_sum = 0.0f64;
        let mut samples = 0;
        for y in active.bottom..=active.top {
            for x in active.left..=active.right {
                let acc = &ctx.pixels[frame.local_index(x, y)];
                samples = acc.samples;
                var_sum += f64::from(acc.variance() / acc.samples.max(1) as f32);
            }
        }
        self.iterations_rendered += 1;

        Ok(IterationReport {
            samples,
            variance: Some((var_sum / active.area() as f64) as f32),
        })
    }

    fn read_aov(
        &mut self,
        handle: EngineHandle,
        aov: AovId,
        tile: RenderRegion,
    ) -> EngineResult<Vec<RgbaF32>> {
        let background = self.scene.lock().background;
        let exposure = self.scene.lock().exposure;
        let ctx = self.ctx(handle)?;
        if !ctx.frame.contains(tile) {
            return Err(EngineError::AovRead {
                aov,
                reason: format!("tile {tile} outside context frame {}", ctx.frame),
            });
        }

        let mut out = Vec::with_capacity(tile.area() as usize);
        for y in tile.bottom..=tile.top {
            for x in tile.left..=tile.right {
                let a = &ctx.pixels[ctx.frame.local_index(x, y)];
                let px = match aov {
                    AovId::Color => {
                        let c = a.color.map(|v| a.mean(v));
                        [c[0], c[1], c[2], 1.0]
                    }
                    AovId::Opacity => {
                        let o = a.mean(a.coverage);
                        [o, o, o, 1.0]
                    }
                    AovId::Background => {
                        let b = background.map(|c| c * exposure);
                        [b[0], b[1], b[2], 1.0]
                    }
                    AovId::ShadowCatcher => {
                        let s = a.mean(a.shadow);
                        [s, s, s, 1.0]
                    }
                    AovId::Variance => {
                        let v = a.variance();
                        [v, v, v, 1.0]
                    }
                };
                out.push(px);
            }
        }
        Ok(out)
    }

    fn shadow_catcher(&self, _handle: EngineHandle) -> Option<ShadowCatcherParams> {
        self.opts.shadow_catcher
    }

    fn destroy_context(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.contexts
            .remove(&handle)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle(handle))
    }
}

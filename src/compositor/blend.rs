use crate::foundation::core::RgbaF32;
use crate::foundation::math::lerp;

/// Shadow-catcher blend scalars supplied by the engine client.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShadowCatcherParams {
    /// Linear RGB shadow tint.
    pub shadow_color: [f32; 3],
    /// Shadow transparency; the shadow's alpha is `1 - transparency`.
    pub shadow_transparency: f32,
    /// Global multiplier applied to the normalized shadow-catcher pass.
    pub shadow_weight: f32,
    /// When set, the background pass is blended in behind the color pass by opacity.
    pub background_is_env: bool,
}

impl Default for ShadowCatcherParams {
    fn default() -> Self {
        Self {
            shadow_color: [0.0, 0.0, 0.0],
            shadow_transparency: 0.0,
            shadow_weight: 1.0,
            background_is_env: false,
        }
    }
}

fn lerp4(a: RgbaF32, b: RgbaF32, t: f32) -> RgbaF32 {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        lerp(a[3], b[3], t),
    ]
}

/// `background*(1-opacity) + color*opacity`, opacity taken from the opacity pass `r`.
pub(crate) fn over_background(color: RgbaF32, background: RgbaF32, opacity: RgbaF32) -> RgbaF32 {
    lerp4(background, color, opacity[0].clamp(0.0, 1.0))
}

/// `base*(1-w) + shadow*w` with `w = clamp(catcher.r * weight)` and
/// `shadow = (color, 1 - transparency)`.
pub(crate) fn shadow_catch(base: RgbaF32, catcher: RgbaF32, p: &ShadowCatcherParams) -> RgbaF32 {
    let w = (catcher[0] * p.shadow_weight).clamp(0.0, 1.0);
    let shadow = [
        p.shadow_color[0],
        p.shadow_color[1],
        p.shadow_color[2],
        1.0 - p.shadow_transparency.clamp(0.0, 1.0),
    ];
    lerp4(base, shadow, w)
}

/// Special-pass samples for one pixel; absent passes are `None`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PassSamples {
    pub(crate) opacity: Option<RgbaF32>,
    pub(crate) background: Option<RgbaF32>,
    pub(crate) shadow_catcher: Option<RgbaF32>,
}

/// Merge special passes into one color pixel.
///
/// Shadow-catcher compositing (with the optional environment background lerp) applies only when
/// `shadow` is provided and the catcher pass is present. Opacity merge overwrites alpha last.
pub(crate) fn merge_pixel(
    color: RgbaF32,
    s: PassSamples,
    shadow: Option<&ShadowCatcherParams>,
    merge_opacity: bool,
) -> RgbaF32 {
    let mut out = color;
    if let (Some(p), Some(sc)) = (shadow, s.shadow_catcher) {
        let base = match (p.background_is_env, s.background, s.opacity) {
            (true, Some(bg), Some(op)) => over_background(color, bg, op),
            _ => color,
        };
        out = shadow_catch(base, sc, p);
    }
    if merge_opacity && let Some(op) = s.opacity {
        out[3] = op[0];
    }
    out
}

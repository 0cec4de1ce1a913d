use super::*;
use crate::engine::EngineResult;

#[derive(Default)]
struct Filters {
    tonemap_calls: usize,
    denoise_calls: usize,
    denoise_fails: bool,
    seen_len: Option<usize>,
}

impl ImageFilters for Filters {
    fn tonemap(&mut self, mut color: AovBuffer) -> EngineResult<AovBuffer> {
        self.tonemap_calls += 1;
        for px in color.pixels_mut() {
            for c in &mut px[..3] {
                *c /= 1.0 + *c;
            }
        }
        Ok(color)
    }

    fn denoise(&mut self, color: AovBuffer) -> EngineResult<AovBuffer> {
        self.denoise_calls += 1;
        self.seen_len = Some(color.pixels().len());
        if self.denoise_fails {
            return Err(EngineError::PostProcess("no denoiser".to_owned()));
        }
        Ok(color)
    }
}

fn region(w: u32, h: u32) -> RenderRegion {
    RenderRegion::full(w, h).unwrap()
}

fn solid(tile: RenderRegion, px: RgbaF32) -> Vec<RgbaF32> {
    vec![px; tile.area() as usize]
}

#[test]
fn begin_frame_rejects_bad_region_and_forces_color() {
    let mut c = TileCompositor::default();
    let bad = RenderRegion {
        left: 5,
        right: 1,
        top: 0,
        bottom: 0,
    };
    assert!(c.begin_frame(bad, &[]).is_err());

    c.begin_frame(region(4, 4), &[AovId::Opacity, AovId::Opacity])
        .unwrap();
    assert_eq!(c.active_aovs(), vec![AovId::Color, AovId::Opacity]);
    assert_eq!(c.buffer(AovId::Color).unwrap().pixels().len(), 16);
}

#[test]
fn accumulate_before_begin_is_invalid_state() {
    let mut c = TileCompositor::default();
    let err = c.accumulate_tile(region(1, 1), &[]).unwrap_err();
    assert!(err.to_string().contains("invalid session state"));
}

#[test]
fn accumulate_is_idempotent_per_tile() {
    let mut c = TileCompositor::default();
    c.begin_frame(region(8, 8), &[AovId::Opacity]).unwrap();
    let tile = RenderRegion::new(4, 7, 7, 4).unwrap();
    let passes = vec![
        AovTile {
            aov: AovId::Color,
            pixels: (0..16).map(|i| [i as f32, 0.5, 0.25, 1.0]).collect(),
        },
        AovTile {
            aov: AovId::Opacity,
            pixels: solid(tile, [0.75, 0.0, 0.0, 1.0]),
        },
    ];

    c.accumulate_tile(tile, &passes).unwrap();
    let once_color = c.buffer(AovId::Color).unwrap().clone();
    let once_opacity = c.buffer(AovId::Opacity).unwrap().clone();
    c.accumulate_tile(tile, &passes).unwrap();
    assert_eq!(c.buffer(AovId::Color).unwrap(), &once_color);
    assert_eq!(c.buffer(AovId::Opacity).unwrap(), &once_opacity);
    assert_eq!(once_color.get(4, 4), Some([0.0, 0.5, 0.25, 1.0]));
    assert_eq!(once_color.get(5, 4), Some([1.0, 0.5, 0.25, 1.0]));
    assert_eq!(once_color.get(4, 5), Some([4.0, 0.5, 0.25, 1.0]));
    assert_eq!(once_color.get(0, 0), Some([0.0; 4]));
}

#[test]
fn tiles_may_arrive_out_of_order() {
    let reg = region(6, 6);
    let tiles: Vec<_> = crate::compositor::decompose(reg, 4, 4).collect();

    let mut forward = TileCompositor::default();
    let mut backward = TileCompositor::default();
    forward.begin_frame(reg, &[]).unwrap();
    backward.begin_frame(reg, &[]).unwrap();
    for (i, t) in tiles.iter().enumerate() {
        let px = [i as f32, 0.0, 0.0, 1.0];
        forward
            .accumulate_tile(*t, &[AovTile { aov: AovId::Color, pixels: solid(*t, px) }])
            .unwrap();
    }
    for (i, t) in tiles.iter().enumerate().rev() {
        let px = [i as f32, 0.0, 0.0, 1.0];
        backward
            .accumulate_tile(*t, &[AovTile { aov: AovId::Color, pixels: solid(*t, px) }])
            .unwrap();
    }
    assert_eq!(forward.buffer(AovId::Color), backward.buffer(AovId::Color));
}

#[test]
fn bad_tile_is_rejected_without_partial_writes() {
    let mut c = TileCompositor::default();
    c.begin_frame(region(4, 4), &[AovId::Opacity]).unwrap();
    let tile = RenderRegion::new(0, 1, 1, 0).unwrap();
    let passes = vec![
        AovTile {
            aov: AovId::Color,
            pixels: solid(tile, [1.0; 4]),
        },
        AovTile {
            aov: AovId::Opacity,
            pixels: vec![[1.0; 4]; 3],
        },
    ];
    assert!(c.accumulate_tile(tile, &passes).is_err());
    assert_eq!(c.buffer(AovId::Color).unwrap().get(0, 0), Some([0.0; 4]));

    let outside = RenderRegion::new(3, 4, 1, 0).unwrap();
    assert!(c.accumulate_tile(outside, &[]).is_err());
}

#[test]
fn inactive_passes_are_ignored() {
    let mut c = TileCompositor::default();
    c.begin_frame(region(2, 2), &[]).unwrap();
    let t = region(2, 2);
    c.accumulate_tile(
        t,
        &[AovTile {
            aov: AovId::Variance,
            pixels: solid(t, [1.0; 4]),
        }],
    )
    .unwrap();
    assert!(c.buffer(AovId::Variance).is_none());
}

#[test]
fn composite_flips_rows_to_top_first() {
    let mut c = TileCompositor::default();
    let reg = region(1, 2);
    c.begin_frame(reg, &[]).unwrap();
    c.accumulate_tile(
        reg,
        &[AovTile {
            aov: AovId::Color,
            pixels: vec![[0.1, 0.0, 0.0, 1.0], [0.9, 0.0, 0.0, 1.0]],
        }],
    )
    .unwrap();

    let mut f = Filters::default();
    let frame = c
        .composite(&CompositeSettings::default(), None, &mut f)
        .unwrap();
    assert_eq!(frame.pixel(0, 0), Some([0.9, 0.0, 0.0, 1.0]));
    assert_eq!(frame.pixel(0, 1), Some([0.1, 0.0, 0.0, 1.0]));

    let unflipped = c
        .composite(
            &CompositeSettings {
                flip_vertical: false,
                ..Default::default()
            },
            None,
            &mut f,
        )
        .unwrap();
    assert_eq!(unflipped.pixel(0, 0), Some([0.1, 0.0, 0.0, 1.0]));
}

#[test]
fn composite_sanitizes_nan_and_negative() {
    let mut c = TileCompositor::default();
    let reg = region(2, 1);
    c.begin_frame(reg, &[]).unwrap();
    c.accumulate_tile(
        reg,
        &[AovTile {
            aov: AovId::Color,
            pixels: vec![[f32::NAN, -1.0, 0.5, 1.0], [0.2, 0.2, 0.2, 1.0]],
        }],
    )
    .unwrap();
    let frame = c
        .composite(&CompositeSettings::default(), None, &mut Filters::default())
        .unwrap();
    assert!(frame.is_display_safe());
    assert_eq!(frame.pixel(0, 0), Some([0.0, 0.0, 0.5, 1.0]));
}

#[test]
fn denoise_sees_full_buffer_and_runs_after_tonemap() {
    let mut c = TileCompositor::default();
    let reg = region(5, 3);
    c.begin_frame(reg, &[]).unwrap();
    c.accumulate_tile(
        reg,
        &[AovTile {
            aov: AovId::Color,
            pixels: solid(reg, [1.0, 1.0, 1.0, 1.0]),
        }],
    )
    .unwrap();
    let mut f = Filters::default();
    let settings = CompositeSettings {
        tonemap: true,
        denoise: true,
        ..Default::default()
    };
    let frame = c.composite(&settings, None, &mut f).unwrap();
    assert_eq!(f.tonemap_calls, 1);
    assert_eq!(f.denoise_calls, 1);
    assert_eq!(f.seen_len, Some(15));
    assert_eq!(frame.pixel(0, 0), Some([0.5, 0.5, 0.5, 1.0]));
}

#[test]
fn failing_denoiser_is_disabled_and_frame_still_produced() {
    let mut c = TileCompositor::default();
    let reg = region(2, 2);
    c.begin_frame(reg, &[]).unwrap();
    let mut f = Filters {
        denoise_fails: true,
        ..Default::default()
    };
    let settings = CompositeSettings {
        denoise: true,
        ..Default::default()
    };
    let frame = c.composite(&settings, None, &mut f).unwrap();
    assert_eq!(frame.pixels.len(), 4);
    assert!(c.denoise_disabled());

    c.composite(&settings, None, &mut f).unwrap();
    assert_eq!(f.denoise_calls, 1);
}

#[test]
fn shadow_catcher_merge_uses_engine_scalars() {
    let mut c = TileCompositor::default();
    let reg = region(1, 1);
    c.begin_frame(reg, &[AovId::ShadowCatcher, AovId::Opacity]).unwrap();
    c.accumulate_tile(
        reg,
        &[
            AovTile {
                aov: AovId::Color,
                pixels: vec![[1.0, 1.0, 1.0, 1.0]],
            },
            AovTile {
                aov: AovId::ShadowCatcher,
                pixels: vec![[0.5, 0.0, 0.0, 0.0]],
            },
            AovTile {
                aov: AovId::Opacity,
                pixels: vec![[0.8, 0.0, 0.0, 0.0]],
            },
        ],
    )
    .unwrap();
    let params = ShadowCatcherParams {
        shadow_color: [0.0, 0.0, 0.0],
        shadow_transparency: 0.0,
        shadow_weight: 1.0,
        background_is_env: false,
    };
    let settings = CompositeSettings {
        merge_opacity: true,
        ..Default::default()
    };
    let frame = c
        .composite(&settings, Some(&params), &mut Filters::default())
        .unwrap();
    let px = frame.pixel(0, 0).unwrap();
    assert!((px[0] - 0.5).abs() < 1e-6);
    assert!((px[3] - 0.8).abs() < 1e-6);
}

#[test]
fn begin_frame_recycles_buffers_through_pool() {
    let mut c = TileCompositor::default();
    c.begin_frame(region(16, 16), &[AovId::Opacity]).unwrap();
    c.begin_frame(region(16, 16), &[AovId::Opacity]).unwrap();
    let st = c.pool_stats();
    assert_eq!(st.alloc_buffers, 2);
    assert_eq!(st.reused_buffers, 2);
}

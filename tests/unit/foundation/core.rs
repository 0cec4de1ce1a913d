use super::*;

#[test]
fn full_region_matches_dimensions() {
    let r = RenderRegion::full(100, 50).unwrap();
    assert_eq!(
        r,
        RenderRegion {
            left: 0,
            right: 99,
            top: 49,
            bottom: 0
        }
    );
    assert_eq!(r.width(), 100);
    assert_eq!(r.height(), 50);
    assert_eq!(r.area(), 5000);
}

#[test]
fn zero_area_is_rejected() {
    assert!(RenderRegion::full(0, 10).is_err());
    assert!(RenderRegion::full(10, 0).is_err());
    assert!(RenderRegion::new(5, 4, 0, 0).is_err());
    assert!(RenderRegion::new(0, 0, 3, 4).is_err());
}

#[test]
fn single_pixel_region_has_unit_area() {
    let r = RenderRegion::new(7, 7, 3, 3).unwrap();
    assert_eq!(r.area(), 1);
    assert!(r.contains_point(7, 3));
    assert!(!r.contains_point(8, 3));
}

#[test]
fn intersect_and_contains() {
    let a = RenderRegion::new(0, 9, 9, 0).unwrap();
    let b = RenderRegion::new(5, 14, 14, 5).unwrap();
    let i = a.intersect(b).unwrap();
    assert_eq!(i, RenderRegion::new(5, 9, 9, 5).unwrap());
    assert!(a.contains(i));
    assert!(!a.contains(b));

    let far = RenderRegion::new(20, 30, 30, 20).unwrap();
    assert!(a.intersect(far).is_none());
}

#[test]
fn local_index_is_bottom_row_first() {
    let r = RenderRegion::new(10, 13, 21, 20).unwrap();
    assert_eq!(r.local_index(10, 20), 0);
    assert_eq!(r.local_index(13, 20), 3);
    assert_eq!(r.local_index(10, 21), 4);
}

#[test]
fn tile_size_rejects_zero() {
    assert!(TileSize::new(0, 8).is_err());
    assert!(TileSize::square(16).is_ok());
}

#[test]
fn region_serde_roundtrip_uses_field_names() {
    let r = RenderRegion::full(4, 2).unwrap();
    let s = serde_json::to_string(&r).unwrap();
    assert!(s.contains("\"left\":0"));
    let back: RenderRegion = serde_json::from_str(&s).unwrap();
    assert_eq!(back, r);
}

#[test]
fn oversized_regions_are_configuration_errors() {
    let huge = RenderRegion {
        left: 0,
        right: u32::MAX - 1,
        top: u32::MAX - 1,
        bottom: 0,
    };
    assert!(matches!(huge.validate(), Err(IprError::Configuration(_))));

    // The span of a full-width row does not fit in u32.
    assert!(matches!(
        RenderRegion::new(0, u32::MAX, 0, 0),
        Err(IprError::Configuration(_))
    ));

    let side = RenderRegion::MAX_EXTENT;
    assert!(RenderRegion::full(side, 1).is_ok());
    assert!(RenderRegion::full(side + 1, 1).is_err());
    assert!(RenderRegion::full(1, side + 1).is_err());
    assert!(RenderRegion::full(8192, 8192).is_ok());
    assert!(RenderRegion::full(8192, 8193).is_err());

    // Offset regions are bounded by their size, not their position.
    assert!(RenderRegion::new(u32::MAX - 9, u32::MAX, u32::MAX, u32::MAX - 9).is_ok());
}

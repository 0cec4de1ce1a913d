use super::*;
use std::collections::HashSet;

fn region(l: u32, r: u32, t: u32, b: u32) -> RenderRegion {
    RenderRegion::new(l, r, t, b).unwrap()
}

fn assert_exact_cover(reg: RenderRegion, tiles: &[RenderRegion]) {
    let mut seen = HashSet::new();
    for t in tiles {
        assert!(reg.contains(*t), "tile {t} escapes {reg}");
        for y in t.bottom..=t.top {
            for x in t.left..=t.right {
                assert!(seen.insert((x, y)), "pixel ({x},{y}) covered twice");
            }
        }
    }
    assert_eq!(seen.len() as u64, reg.area());
}

#[test]
fn tiles_cover_region_exactly_once() {
    let cases = [
        (region(0, 99, 99, 0), 32, 32),
        (region(0, 99, 99, 0), 100, 100),
        (region(0, 99, 99, 0), 1, 7),
        (region(13, 40, 22, 5), 8, 5),
        (region(3, 3, 9, 9), 4, 4),
        (region(0, 63, 31, 0), 64, 1),
    ];
    for (reg, w, h) in cases {
        let tiles: Vec<_> = decompose(reg, w, h).collect();
        assert_exact_cover(reg, &tiles);
        assert!(tiles.iter().all(|t| t.width() <= w && t.height() <= h));
    }
}

#[test]
fn decomposition_is_deterministic() {
    let reg = region(5, 204, 150, 7);
    let a: Vec<_> = decompose(reg, 17, 23).collect();
    let b: Vec<_> = decompose(reg, 17, 23).collect();
    assert_eq!(a, b);
}

#[test]
fn order_is_top_row_first_left_to_right() {
    let tiles: Vec<_> = decompose(region(0, 9, 9, 0), 5, 5).collect();
    assert_eq!(
        tiles,
        vec![
            region(0, 4, 9, 5),
            region(5, 9, 9, 5),
            region(0, 4, 4, 0),
            region(5, 9, 4, 0),
        ]
    );
}

#[test]
fn partial_tiles_land_on_right_and_top() {
    let tiles: Vec<_> = decompose(region(0, 9, 6, 0), 4, 4).collect();
    assert_eq!(tiles.len(), 6);
    assert_eq!(tiles[0], region(0, 3, 6, 4));
    assert_eq!(tiles[2], region(8, 9, 6, 4));
    assert_eq!(tiles[5], region(8, 9, 3, 0));
}

#[test]
fn exact_size_and_lazy() {
    let mut it = decompose(region(0, 99, 99, 0), 10, 10);
    assert_eq!(it.len(), 100);
    assert_eq!(it.grid(), (10, 10));
    it.next();
    assert_eq!(it.len(), 99);
    assert_eq!(it.total(), 100);
    let rest = it.by_ref().count();
    assert_eq!(rest, 99);
    assert!(it.next().is_none());
}

#[test]
fn zero_tile_size_degrades_to_single_pixels() {
    let n = decompose(region(0, 2, 1, 0), 0, 0).count();
    assert_eq!(n, 6);
}

#[test]
fn decompose_by_matches_decompose() {
    let reg = region(0, 30, 30, 0);
    let a: Vec<_> = decompose_by(reg, TileSize::new(8, 6).unwrap()).collect();
    let b: Vec<_> = decompose(reg, 8, 6).collect();
    assert_eq!(a, b);
}

#[test]
fn tiles_reach_the_last_addressable_column() {
    let edge = region(u32::MAX - 9, u32::MAX, u32::MAX, u32::MAX - 9);
    let tiles: Vec<_> = decompose(edge, 4, 4).collect();
    assert_eq!(tiles.len(), 9);
    assert!(tiles.iter().any(|t| t.right == u32::MAX && t.top == u32::MAX));
    assert_exact_cover(edge, &tiles);
}

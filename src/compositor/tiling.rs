use crate::foundation::core::{RenderRegion, TileSize};
use std::iter::FusedIterator;

/// Split `region` into tiles of at most `max_tile_width` x `max_tile_height`.
///
/// Tiles are anchored at the region's bottom-left corner, so partial tiles sit on the right column
/// and the top row. Order is row-major starting from the TOP row, left to right within a row. The
/// sequence is lazy, finite, and identical for identical arguments. Zero maxima are treated as 1.
pub fn decompose(region: RenderRegion, max_tile_width: u32, max_tile_height: u32) -> Tiles {
    let tw = max_tile_width.max(1);
    let th = max_tile_height.max(1);
    let cols = region.width().div_ceil(tw);
    let rows = region.height().div_ceil(th);
    Tiles {
        region,
        tw,
        th,
        cols,
        total: u64::from(cols) * u64::from(rows),
        rows,
        next: 0,
    }
}

/// [`decompose`] with a [`TileSize`].
pub fn decompose_by(region: RenderRegion, size: TileSize) -> Tiles {
    decompose(region, size.width, size.height)
}

/// Lazy tile sequence produced by [`decompose`].
#[derive(Clone, Debug)]
pub struct Tiles {
    region: RenderRegion,
    tw: u32,
    th: u32,
    cols: u32,
    rows: u32,
    total: u64,
    next: u64,
}

impl Tiles {
    /// Column and row count of the grid.
    pub fn grid(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    /// Total tile count, including ones already yielded.
    pub fn total(&self) -> u64 {
        self.total
    }

    fn tile_at(&self, k: u64) -> RenderRegion {
        let col = (k % u64::from(self.cols)) as u32;
        let row = self.rows - 1 - (k / u64::from(self.cols)) as u32;
        let left = self.region.left + col * self.tw;
        let bottom = self.region.bottom + row * self.th;
        RenderRegion {
            left,
            right: left.saturating_add(self.tw - 1).min(self.region.right),
            bottom,
            top: bottom.saturating_add(self.th - 1).min(self.region.top),
        }
    }
}

impl Iterator for Tiles {
    type Item = RenderRegion;

    fn next(&mut self) -> Option<RenderRegion> {
        if self.next >= self.total {
            return None;
        }
        let t = self.tile_at(self.next);
        self.next += 1;
        Some(t)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Tiles {}

impl FusedIterator for Tiles {}

#[cfg(test)]
#[path = "../../tests/unit/compositor/tiling.rs"]
mod tests;

use crate::foundation::error::{IprError, IprResult};

/// Linear RGBA pixel, straight (not premultiplied) alpha.
pub type RgbaF32 = [f32; 4];

/// Opaque scene node identity assigned by the host/translator.
///
/// Stable for the node's lifetime; the core never interprets the value.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque render-engine context handle returned by `RenderEngine::create_context`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineHandle(pub u64);

/// Axis-aligned inclusive pixel rectangle in engine space (y grows upward).
///
/// Invariants: `right >= left`, `top >= bottom`. A region is never empty; use
/// [`RenderRegion::new`] to validate untrusted bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RenderRegion {
    /// Leftmost column (inclusive).
    pub left: u32,
    /// Rightmost column (inclusive).
    pub right: u32,
    /// Topmost row (inclusive).
    pub top: u32,
    /// Bottom row (inclusive).
    pub bottom: u32,
}

impl RenderRegion {
    /// Largest accepted width or height, in pixels.
    pub const MAX_EXTENT: u32 = 1 << 15;

    /// Largest accepted pixel count (8192 x 8192).
    pub const MAX_AREA: u64 = 1 << 26;

    /// Create a validated region.
    ///
    /// Regions wider or taller than [`Self::MAX_EXTENT`], or larger than [`Self::MAX_AREA`], are
    /// configuration errors.
    pub fn new(left: u32, right: u32, top: u32, bottom: u32) -> IprResult<Self> {
        if right < left {
            return Err(IprError::configuration(format!(
                "region right ({right}) must be >= left ({left})"
            )));
        }
        if top < bottom {
            return Err(IprError::configuration(format!(
                "region top ({top}) must be >= bottom ({bottom})"
            )));
        }
        let width = u64::from(right - left) + 1;
        let height = u64::from(top - bottom) + 1;
        let max = u64::from(Self::MAX_EXTENT);
        if width > max || height > max {
            return Err(IprError::configuration(format!(
                "region {width}x{height} exceeds the {max} pixel extent limit"
            )));
        }
        if width * height > Self::MAX_AREA {
            return Err(IprError::configuration(format!(
                "region {width}x{height} exceeds the {} pixel area limit",
                Self::MAX_AREA
            )));
        }
        Ok(Self {
            left,
            right,
            top,
            bottom,
        })
    }

    /// Full-frame region `{0, w-1, h-1, 0}`.
    pub fn full(width: u32, height: u32) -> IprResult<Self> {
        if width == 0 || height == 0 {
            return Err(IprError::configuration(format!(
                "region must have positive area, got {width}x{height}"
            )));
        }
        Self::new(0, width - 1, height - 1, 0)
    }

    /// Re-check the ordering and size invariants (fields are public).
    pub fn validate(self) -> IprResult<Self> {
        Self::new(self.left, self.right, self.top, self.bottom)
    }

    /// Width in pixels.
    pub fn width(self) -> u32 {
        self.right.saturating_sub(self.left).saturating_add(1)
    }

    /// Height in pixels.
    pub fn height(self) -> u32 {
        self.top.saturating_sub(self.bottom).saturating_add(1)
    }

    /// Pixel count.
    pub fn area(self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// `true` when `(x, y)` lies inside the region.
    pub fn contains_point(self, x: u32, y: u32) -> bool {
        self.left <= x && x <= self.right && self.bottom <= y && y <= self.top
    }

    /// `true` when `other` lies entirely inside `self`.
    pub fn contains(self, other: RenderRegion) -> bool {
        self.left <= other.left
            && other.right <= self.right
            && self.bottom <= other.bottom
            && other.top <= self.top
    }

    /// Intersection of two regions, if any.
    pub fn intersect(self, other: RenderRegion) -> Option<RenderRegion> {
        let left = self.left.max(other.left);
        let right = self.right.min(other.right);
        let bottom = self.bottom.max(other.bottom);
        let top = self.top.min(other.top);
        (left <= right && bottom <= top).then_some(RenderRegion {
            left,
            right,
            top,
            bottom,
        })
    }

    /// Offset of `(x, y)` from the region's bottom-left corner, as a row-major index.
    ///
    /// Rows are stored bottom row first.
    pub(crate) fn local_index(self, x: u32, y: u32) -> usize {
        let lx = (x - self.left) as usize;
        let ly = (y - self.bottom) as usize;
        ly * self.width() as usize + lx
    }
}

impl std::fmt::Display for RenderRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[l={} r={} t={} b={}]",
            self.left, self.right, self.top, self.bottom
        )
    }
}

/// Maximum tile dimensions used to split a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileSize {
    /// Maximum tile width in pixels, must be > 0.
    pub width: u32,
    /// Maximum tile height in pixels, must be > 0.
    pub height: u32,
}

impl TileSize {
    /// Create a validated tile size.
    pub fn new(width: u32, height: u32) -> IprResult<Self> {
        if width == 0 || height == 0 {
            return Err(IprError::configuration("tile size must be > 0 in both axes"));
        }
        Ok(Self { width, height })
    }

    /// Square tiles.
    pub fn square(edge: u32) -> IprResult<Self> {
        Self::new(edge, edge)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

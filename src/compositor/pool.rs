use crate::foundation::core::RgbaF32;
use std::collections::HashMap;

const BYTES_PER_PIXEL: usize = std::mem::size_of::<RgbaF32>();

/// Pool configuration for cached AOV storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AovPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained buffers per `(w, h)` bucket.
    pub max_buffers_per_bucket: usize,
}

impl Default for AovPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_buffers_per_bucket: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    w: u32,
    h: u32,
}

impl BufferKey {
    fn pixel_len(self) -> usize {
        (self.w as usize).saturating_mul(self.h as usize)
    }

    fn byte_len(self) -> usize {
        self.pixel_len().saturating_mul(BYTES_PER_PIXEL)
    }
}

/// Pool counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AovPoolStats {
    /// Buffers currently retained.
    pub retained_buffers: usize,
    /// Bytes currently retained.
    pub retained_bytes: usize,
    /// Fresh allocations.
    pub alloc_buffers: u64,
    /// Bytes freshly allocated.
    pub alloc_bytes: u64,
    /// Borrows served from the pool.
    pub reused_buffers: u64,
    /// Releases dropped because a cap was hit.
    pub dropped_on_release: u64,
}

/// Bounded pool of pixel storage keyed by `(width, height)`.
///
/// Borrowed storage is always zeroed. Borrow/release happen per frame, never per tile.
pub struct AovPool {
    opts: AovPoolOpts,
    stats: AovPoolStats,
    buckets: HashMap<BufferKey, Vec<Vec<RgbaF32>>>,
}

impl AovPool {
    /// Empty pool.
    pub fn new(opts: AovPoolOpts) -> Self {
        Self {
            opts,
            stats: AovPoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> AovPoolStats {
        self.stats.clone()
    }

    /// Zeroed storage for a `w` x `h` buffer.
    pub fn borrow(&mut self, w: u32, h: u32) -> Vec<RgbaF32> {
        let key = BufferKey { w, h };
        if let Some(mut px) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            self.stats.reused_buffers = self.stats.reused_buffers.saturating_add(1);
            px.fill([0.0; 4]);
            return px;
        }

        self.stats.alloc_buffers = self.stats.alloc_buffers.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(key.byte_len() as u64);
        vec![[0.0; 4]; key.pixel_len()]
    }

    /// Return storage previously borrowed for a `w` x `h` buffer.
    pub fn release(&mut self, w: u32, h: u32, pixels: Vec<RgbaF32>) {
        let key = BufferKey { w, h };
        if pixels.len() != key.pixel_len()
            || self.opts.max_pool_bytes == 0
            || self.opts.max_buffers_per_bucket == 0
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bytes = key.byte_len();
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(key).or_default();
        if bucket.len() >= self.opts.max_buffers_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(pixels);
        self.stats.retained_buffers = self.stats.retained_buffers.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

impl Default for AovPool {
    fn default() -> Self {
        Self::new(AovPoolOpts::default())
    }
}

use crate::foundation::core::NodeId;
use xxhash_rust::xxh3::{Xxh3, xxh3_64_with_seed};

const XXH3_SEED: u64 = 0x6a09_e667_f3bc_c908;

/// 64-bit content hash folded from typed field values.
///
/// The combinator is order-sensitive: callers must visit fields in a fixed canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentHash(pub u64);

impl ContentHash {
    /// Starting value for an incremental fold.
    pub const SEED: ContentHash = ContentHash(XXH3_SEED);

    /// Fold one value into the hash.
    #[must_use]
    pub fn combine<T: HashField + ?Sized>(self, value: &T) -> ContentHash {
        let mut h = ContentHasher::resume(self);
        value.hash_into(&mut h);
        h.finish()
    }

    /// Hash a sequence of values in order, starting from [`ContentHash::SEED`].
    pub fn of_fields<'a, T: HashField + 'a>(values: impl IntoIterator<Item = &'a T>) -> Self {
        let mut h = ContentHasher::new();
        for v in values {
            v.hash_into(&mut h);
        }
        h.finish()
    }

    /// Raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::SEED
    }
}

/// Streaming hasher producing a [`ContentHash`].
///
/// Multi-byte values are written little-endian. Sequences are length-prefixed and enum-like tags
/// are written as one byte, so adjacent fields cannot alias each other.
pub struct ContentHasher {
    inner: Xxh3,
}

impl ContentHasher {
    /// Fresh hasher seeded with [`ContentHash::SEED`].
    pub fn new() -> Self {
        Self::resume(ContentHash::SEED)
    }

    /// Continue folding from a previous hash value.
    pub fn resume(from: ContentHash) -> Self {
        Self {
            inner: Xxh3::with_seed(from.0),
        }
    }

    /// Write raw bytes (no length prefix).
    pub fn write_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.inner.update(b);
        self
    }

    /// Write one byte.
    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.write_bytes(&[v])
    }

    /// Write a bool as one byte.
    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_u8(u8::from(v))
    }

    /// Write a `u32`.
    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a `u64`.
    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write an `i64`.
    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write an `f32` by bit pattern. `-0.0` hashes like `0.0` and every NaN hashes alike.
    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        let v = if v == 0.0 {
            0.0
        } else if v.is_nan() {
            f32::NAN
        } else {
            v
        };
        self.write_u32(v.to_bits())
    }

    /// Write an `f64` by bit pattern, with the same canonicalization as [`Self::write_f32`].
    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        let v = if v == 0.0 {
            0.0
        } else if v.is_nan() {
            f64::NAN
        } else {
            v
        };
        self.write_u64(v.to_bits())
    }

    /// Write a length-prefixed string.
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes())
    }

    /// Write any [`HashField`].
    pub fn write<T: HashField + ?Sized>(&mut self, v: &T) -> &mut Self {
        v.hash_into(self);
        self
    }

    /// Finish into a 64-bit hash.
    pub fn finish(&self) -> ContentHash {
        ContentHash(self.inner.digest())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that can be folded into a [`ContentHash`].
pub trait HashField {
    /// Write this value's observable state.
    fn hash_into(&self, h: &mut ContentHasher);
}

macro_rules! int_field {
    ($($t:ty => $w:ident as $as:ty),* $(,)?) => {
        $(
            impl HashField for $t {
                fn hash_into(&self, h: &mut ContentHasher) {
                    h.$w(*self as $as);
                }
            }
        )*
    };
}

int_field!(
    u8 => write_u8 as u8,
    u16 => write_u32 as u32,
    u32 => write_u32 as u32,
    u64 => write_u64 as u64,
    usize => write_u64 as u64,
    i32 => write_i64 as i64,
    i64 => write_i64 as i64,
);

impl HashField for bool {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_bool(*self);
    }
}

impl HashField for f32 {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_f32(*self);
    }
}

impl HashField for f64 {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_f64(*self);
    }
}

impl HashField for str {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_str(self);
    }
}

impl HashField for String {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_str(self);
    }
}

impl HashField for NodeId {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.0);
    }
}

impl HashField for ContentHash {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.0);
    }
}

impl<T: HashField, const N: usize> HashField for [T; N] {
    fn hash_into(&self, h: &mut ContentHasher) {
        for v in self {
            v.hash_into(h);
        }
    }
}

impl<T: HashField> HashField for [T] {
    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.len() as u64);
        for v in self {
            v.hash_into(h);
        }
    }
}

impl<T: HashField> HashField for Vec<T> {
    fn hash_into(&self, h: &mut ContentHasher) {
        self.as_slice().hash_into(h);
    }
}

impl<T: HashField> HashField for Option<T> {
    fn hash_into(&self, h: &mut ContentHasher) {
        match self {
            None => {
                h.write_u8(0);
            }
            Some(v) => {
                h.write_u8(1);
                v.hash_into(h);
            }
        }
    }
}

impl<T: HashField + ?Sized> HashField for &T {
    fn hash_into(&self, h: &mut ContentHasher) {
        (**self).hash_into(h);
    }
}

/// One-shot hash of raw bytes with the crate seed.
pub fn hash_bytes(b: &[u8]) -> ContentHash {
    ContentHash(xxh3_64_with_seed(b, XXH3_SEED))
}

#[cfg(test)]
#[path = "../../tests/unit/hash/content.rs"]
mod tests;

//! Content hashing for change detection.
//!
//! A [`ContentHash`] answers "did anything observable change since the last sync?" for one scene
//! node. Equality means "no observable change"; it never implies uniqueness. A collision costs at
//! most one missed resync, corrected by the next change notification.

/// Hash value, hasher and the typed field trait.
pub mod content;

pub use content::{ContentHash, ContentHasher, HashField};

//! Bounded collections used by the geometry and texture caches.

pub mod lru;

pub use self::lru::{LruMap, LruSet};

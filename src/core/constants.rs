//! Core constants shared by the geometry, view and texture pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Capacity of the previously-visible LRU kept by each texture store.
pub const PREVIOUSLY_VISIBLE_CACHE_SIZE: usize = 512;

/// Number of concurrent in-flight image loads per URL source.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 4;

/// Delay before re-requesting a URL that failed with a network error.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 10_000;

/// Capacity of the per-geometry neighbour cache.
pub const NEIGHBORS_CACHE_SIZE: usize = 64;

/// Cube faces in their canonical order, also the default preview image order.
pub const CUBE_FACE_ORDER: &str = "bdflru";

/// Default vertical field of view for rectilinear views.
pub const DEFAULT_FOV: f64 = std::f64::consts::FRAC_PI_4;

/// Field-of-view values must stay this far away from 0 and π.
pub const FOV_LIMIT_EPSILON: f64 = 0.000001;

/// Flat view zoom must stay above this value.
pub const ZOOM_LIMIT_EPSILON: f64 = 0.000001;

/// Maximum number of layers that can be depth-sorted on a stage.
pub const MAX_LAYERS: usize = 256;

/// Maximum number of levels that can be depth-sorted within a layer.
pub const MAX_LEVELS: usize = 256;

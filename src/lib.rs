//! # Panolet
//!
//! The core of a 360° panorama and large-image tile viewer.
//!
//! Images are cut into tiles across several resolution levels by a
//! [`Geometry`] (flat, cube map or equirectangular). A [`View`] describes the
//! camera and decides which tiles are visible. Each [`Layer`] pairs a geometry
//! and a view with a [`Source`] of tile images and a [`TextureStore`] that
//! loads, caches and releases GPU textures. A [`Stage`] composites layers
//! through pluggable renderers, falling back to coarser or finer tiles while
//! the best level is still loading, and a [`RenderLoop`] drives the stage on
//! the host's animation frames.
//!
//! Everything runs on a single thread. Asynchronous loads are spawned through
//! a [`Spawner`] and are cancelled as soon as a tile stops being needed.

pub mod collections;
pub mod core;
pub mod events;
pub mod geometry;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod stage;
pub mod tiles;
pub mod view;

pub use crate::core::config::{ViewerOptions, ViewerProfile};
pub use crate::core::constants;

pub use events::{Emitter, ListenerId};
pub use geometry::{CubeFace, Geometry, GeometryKind, Level, LevelSpec, Tile};
pub use rendering::{Backend, Renderer, Texture};
pub use runtime::{spawn_cancellable, Spawner, TaskHandle};
pub use stage::{Layer, RenderLoop, Stage};
pub use tiles::{Asset, ImageUrlSource, Source, TextureStore};
pub use view::{FlatView, RectilinearView, Size, View, ViewKind};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used throughout the library
pub type Error = PanoError;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum PanoError {
    #[error("Invalid call sequence: {0}")]
    Sequence(&'static str),

    #[error("Tile is not pinned: {0}")]
    NotPinned(String),

    #[error("Inconsistent configuration: {0}")]
    Consistency(String),

    #[error("Unsupported by backend: {0}")]
    Capability(String),

    #[error("bad view - suspect a broken limiter")]
    BadView,

    #[error("Invalid levels: {0}")]
    InvalidLevels(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Spawn error: {0}")]
    Spawn(#[from] futures::task::SpawnError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Failure of a single asset or texture load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Load cancelled")]
    Cancelled,

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl LoadError {
    /// Only network failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::Network(_))
    }
}

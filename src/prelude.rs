//! Prelude module for common panolet types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use panolet::prelude::*;`

pub use crate::core::config::{
    FrameTimingConfig, StageConfig, TextureStoreConfig, TileLoadingConfig, ViewerOptions,
    ViewerProfile,
};

pub use crate::events::{Emitter, ListenerId};

pub use crate::geometry::{CubeFace, Geometry, GeometryKind, Level, LevelSpec, Tile};

pub use crate::view::{
    FlatView, FlatViewParams, Limiter, RectilinearView, RectilinearViewParams, ScreenPoint, Size,
    View, ViewEvent, ViewKind,
};

pub use crate::tiles::{
    Asset, DynamicAsset, ImageUrlOptions, ImageUrlSource, Source, SourceEvent, TextureStore,
    TextureStoreEvent, TileState, TileUrl,
};

pub use crate::rendering::{Backend, ContextId, Renderer, RendererFactory, Texture};

pub use crate::stage::{
    Effects, FrameScheduler, Layer, LayerEvent, LayerOptions, Rect, RectSpec, RenderLoop,
    RenderLoopEvent, Stage, StageEvent,
};

pub use crate::runtime::{spawn_cancellable, Spawner, TaskHandle};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::spawners::tokio_impl::TokioLocalSpawner;

pub use crate::{Error, LoadError, PanoError, Result};

pub use std::rc::Rc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::future::LocalBoxFuture;

//! Tile pixels: assets, sources that produce them and the texture cache.

pub mod asset;
pub mod loader;
pub mod source;
pub mod store;

pub use asset::{Asset, AssetEvent, DynamicAsset, StaticAsset};
pub use loader::{retry, WorkPool};
pub use source::{expand_template, ImageUrlOptions, ImageUrlSource, Source, SourceEvent, TileUrl};
pub use store::{TextureStore, TextureStoreEvent, TileState};

//! Contracts between the viewer core and a graphics backend.
//!
//! The core never touches pixels. A [`Backend`] turns URLs into [`Asset`]s and
//! assets into [`Texture`]s, and a [`Renderer`] chosen per geometry and view
//! kind draws the textures the stage hands it.

pub mod depth;
pub mod registry;

pub use self::depth::tile_depth;
pub use self::registry::{RendererFactory, RendererRegistry};

use futures::future::LocalBoxFuture;

use crate::geometry::Tile;
use crate::stage::{Layer, Rect};
use crate::tiles::Asset;
use crate::view::Size;
use crate::LoadError;

/// Identifies the graphics context textures are bound to. Stores created for
/// one context must not be used with another.
pub type ContextId = u64;

/// Backend-owned texture. Dropping it releases the underlying resource.
pub trait Texture {
    /// Upload the current content of a dynamic asset.
    fn refresh(&mut self, tile: &Tile, asset: &Asset);
}

pub trait Backend {
    fn context_id(&self) -> ContextId;

    /// Largest texture dimension the context supports, in pixels.
    fn max_texture_size(&self) -> u32;

    /// Fetch and decode an image, optionally cropped to a normalized `rect`.
    /// Transient failures must be reported as [`LoadError::Network`].
    fn load_image(&self, url: &str, rect: Option<Rect>) -> LocalBoxFuture<'static, Result<Asset, LoadError>>;

    fn create_texture(
        &self,
        tile: &Tile,
        asset: &Asset,
    ) -> LocalBoxFuture<'static, Result<Box<dyn Texture>, LoadError>>;

    fn start_frame(&self) {}

    fn end_frame(&self) {}

    fn set_size(&self, _size: Size) {}
}

/// Draws the tiles of one layer. Tiles arrive finest first, each with the
/// depth it must be composited at.
pub trait Renderer {
    fn start_layer(&mut self, layer: &Layer, rect: &Rect);

    fn render_tile(&mut self, tile: &Tile, texture: &dyn Texture, layer: &Layer, depth: f64);

    fn end_layer(&mut self, layer: &Layer, rect: &Rect);
}

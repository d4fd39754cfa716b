//! The stage owns the layer stack and draws it one frame at a time.

pub mod collect;
pub mod layer;
pub mod rect;
pub mod render_loop;

pub use self::collect::TileCollector;
pub use self::layer::{Effects, Layer, LayerEvent, LayerOptions};
pub use self::rect::{calc_rect, Rect, RectSpec};
pub use self::render_loop::{FrameScheduler, RenderLoop, RenderLoopEvent};

use std::fmt;
use std::rc::Rc;

use crate::core::config::StageConfig;
use crate::core::constants::MAX_LAYERS;
use crate::events::{Emitter, ListenerId};
use crate::geometry::GeometryKind;
use crate::rendering::{tile_depth, Backend, Renderer, RendererFactory, RendererRegistry};
use crate::view::{Size, ViewKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageEvent {
    /// Something changed and the stage should be drawn again.
    RenderInvalid,
    /// A frame was drawn. `stable` is false if any layer used a fallback.
    RenderComplete { stable: bool },
    Resize { width: f64, height: f64 },
}

struct LayerEntry {
    layer: Layer,
    renderer: Box<dyn Renderer>,
    listener: ListenerId,
}

impl Drop for LayerEntry {
    fn drop(&mut self) {
        self.layer.events().remove_listener(self.listener);
    }
}

pub struct Stage {
    backend: Rc<dyn Backend>,
    renderers: RendererRegistry,
    entries: Vec<LayerEntry>,
    collector: TileCollector,
    pixel_ratio: f64,
    size: Size,
    events: Emitter<StageEvent>,
}

impl Stage {
    pub fn new(backend: Rc<dyn Backend>, config: &StageConfig) -> Self {
        Self {
            backend,
            renderers: RendererRegistry::new(),
            entries: Vec::new(),
            collector: TileCollector::new(config.progressive),
            pixel_ratio: config.pixel_ratio,
            size: Size::default(),
            events: Emitter::new(),
        }
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    pub fn events(&self) -> &Emitter<StageEvent> {
        &self.events
    }

    pub fn register_renderer(&mut self, geometry: GeometryKind, view: ViewKind, factory: RendererFactory) {
        self.renderers.set(geometry, view, factory);
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Resize the drawing surface. Nothing is drawn while the size is empty.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.backend.set_size(size);
        self.events.emit(&StageEvent::Resize {
            width: size.width,
            height: size.height,
        });
        self.events.emit(&StageEvent::RenderInvalid);
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Device pixels per viewport pixel, applied to every layer's view.
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.pixel_ratio = pixel_ratio;
        for entry in &self.entries {
            entry.layer.view_mut().set_pixel_ratio(pixel_ratio);
        }
    }

    pub fn progressive(&self) -> bool {
        self.collector.progressive()
    }

    pub fn set_progressive(&mut self, progressive: bool) {
        self.collector.set_progressive(progressive);
        self.events.emit(&StageEvent::RenderInvalid);
    }

    /// Layers from bottom to top.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.entries.iter().map(|entry| &entry.layer)
    }

    pub fn layer_count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_layer(&self, layer: &Layer) -> bool {
        self.position(layer).is_some()
    }

    fn position(&self, layer: &Layer) -> Option<usize> {
        self.entries.iter().position(|entry| entry.layer.ptr_eq(layer))
    }

    /// Insert `layer` at `index`, or on top when `index` is `None`.
    pub fn add_layer(&mut self, layer: Layer, index: Option<usize>) -> Result<()> {
        if self.has_layer(&layer) {
            return Err(Error::InvalidArgument("layer already in stage".into()));
        }
        // Layer depths run from one up to the layer count.
        if self.entries.len() + 1 >= MAX_LAYERS {
            return Err(Error::Capability(format!(
                "stage holds at most {} layers",
                MAX_LAYERS - 1
            )));
        }
        let index = index.unwrap_or(self.entries.len());
        if index > self.entries.len() {
            return Err(Error::InvalidArgument(format!("invalid layer position: {index}")));
        }
        self.validate_layer(&layer)?;

        let geometry = layer.geometry().kind();
        let view = layer.view().kind();
        let factory = self.renderers.get(geometry, view).ok_or_else(|| {
            Error::Capability(format!("no renderer available for {geometry} geometry and {view} view"))
        })?;
        let renderer = factory();

        let invalid = self.events.clone();
        let listener = layer.events().add_listener(move |event| {
            if !matches!(event, LayerEvent::RenderComplete { .. }) {
                invalid.emit(&StageEvent::RenderInvalid);
            }
        });
        layer.view_mut().set_pixel_ratio(self.pixel_ratio);

        log::debug!("adding {geometry} layer with {view} view at position {index}");
        self.entries.insert(
            index,
            LayerEntry {
                layer,
                renderer,
                listener,
            },
        );
        self.events.emit(&StageEvent::RenderInvalid);
        Ok(())
    }

    fn validate_layer(&self, layer: &Layer) -> Result<()> {
        let store_context = layer.texture_store().backend().context_id();
        if store_context != self.backend.context_id() {
            return Err(Error::Capability(format!(
                "texture store belongs to context {store_context}, stage uses {}",
                self.backend.context_id()
            )));
        }
        let tile_size = layer.geometry().max_tile_size();
        let max_size = self.backend.max_texture_size();
        if tile_size > max_size {
            return Err(Error::Capability(format!(
                "layer has level with tile size larger than maximum texture size ({tile_size} vs. {max_size})"
            )));
        }
        Ok(())
    }

    pub fn move_layer(&mut self, layer: &Layer, index: usize) -> Result<()> {
        let from = self
            .position(layer)
            .ok_or_else(|| Error::InvalidArgument("no such layer in stage".into()))?;
        if index >= self.entries.len() {
            return Err(Error::InvalidArgument(format!("invalid layer position: {index}")));
        }
        let entry = self.entries.remove(from);
        self.entries.insert(index, entry);
        self.events.emit(&StageEvent::RenderInvalid);
        Ok(())
    }

    pub fn remove_layer(&mut self, layer: &Layer) -> Result<()> {
        let index = self
            .position(layer)
            .ok_or_else(|| Error::InvalidArgument("no such layer in stage".into()))?;
        drop(self.entries.remove(index));
        self.events.emit(&StageEvent::RenderInvalid);
        Ok(())
    }

    pub fn remove_all_layers(&mut self) {
        while let Some(entry) = self.entries.pop() {
            drop(entry);
            self.events.emit(&StageEvent::RenderInvalid);
        }
    }

    /// Draw one frame.
    ///
    /// Every store whose frame was started sees a matching `end_frame`, and
    /// the backend frame is always closed, also when starting a later store
    /// or drawing a layer fails. The first error is returned after that.
    pub fn render(&mut self) -> Result<()> {
        if self.size.is_empty() {
            return Ok(());
        }

        self.backend.start_frame();
        let mut started = 0;
        let mut result = Ok(true);
        for entry in &self.entries {
            match entry.layer.texture_store().start_frame() {
                Ok(()) => started += 1,
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }

        if result.is_ok() {
            result = self.render_layers();
        }

        let mut end_result = Ok(());
        for entry in &self.entries[..started] {
            if let Err(error) = entry.layer.texture_store().end_frame() {
                end_result = end_result.and(Err(error));
            }
        }
        self.backend.end_frame();

        let stable = result?;
        end_result?;
        self.events.emit(&StageEvent::RenderComplete { stable });
        Ok(())
    }

    fn render_layers(&mut self) -> Result<bool> {
        let Size { width, height } = self.size;
        let count = self.entries.len();
        let mut stable_stage = true;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            let layer = entry.layer.clone();
            let rect = calc_rect(width, height, layer.effects().rect.as_ref());
            if rect.is_empty() {
                continue;
            }
            layer
                .view_mut()
                .set_size(Size::new(rect.width * width, rect.height * height))?;

            entry.renderer.start_layer(&layer, &rect);

            let stable = self.collector.collect(&layer)?;
            let store = layer.texture_store();
            for tile in self.collector.to_load() {
                store.mark_tile(tile)?;
            }

            let depth = count - index;
            for tile in self.collector.to_render() {
                if let Some(texture) = store.texture(tile) {
                    entry
                        .renderer
                        .render_tile(tile, &*texture, &layer, tile_depth(depth, tile.z()));
                }
            }

            layer.events().emit(&LayerEvent::RenderComplete { stable });
            stable_stage &= stable;

            entry.renderer.end_layer(&layer, &rect);
        }
        Ok(stable_stage)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("size", &self.size)
            .field("layers", &self.entries.len())
            .field("renderers", &self.renderers)
            .field("progressive", &self.collector.progressive())
            .finish()
    }
}

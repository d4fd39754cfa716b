//! A layer binds a source, a geometry, a view and a texture store together.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::RectSpec;
use crate::events::{Emitter, ListenerId};
use crate::geometry::{Geometry, Level, Tile};
use crate::tiles::{Source, TextureStore, TextureStoreEvent};
use crate::view::View;
use crate::{Error, Result};

/// Presentation parameters handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    pub opacity: f64,
    pub rect: Option<RectSpec>,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            rect: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayerOptions {
    pub effects: Effects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEvent {
    ViewChange,
    EffectsChange,
    FixedLevelChange,
    /// A texture finished loading, failed, or its content changed.
    TextureStoreChange,
    RenderComplete { stable: bool },
}

struct LayerInner {
    source: Rc<dyn Source>,
    geometry: Geometry,
    view: RefCell<View>,
    store: TextureStore,
    effects: RefCell<Effects>,
    fixed_level: Cell<Option<usize>>,
    events: Emitter<LayerEvent>,
    view_listener: ListenerId,
    store_listener: ListenerId,
}

impl Drop for LayerInner {
    fn drop(&mut self) {
        self.view.get_mut().events().remove_listener(self.view_listener);
        self.store.events().remove_listener(self.store_listener);
    }
}

/// Shared handle; clones refer to the same layer.
#[derive(Clone)]
pub struct Layer {
    inner: Rc<LayerInner>,
}

impl Layer {
    pub fn new(
        source: Rc<dyn Source>,
        geometry: Geometry,
        view: View,
        store: TextureStore,
        options: LayerOptions,
    ) -> Self {
        let events = Emitter::new();

        let forward = events.clone();
        let view_listener = view
            .events()
            .add_listener(move |_| forward.emit(&LayerEvent::ViewChange));

        let forward = events.clone();
        let store_listener = store.events().add_listener(move |event| {
            if matches!(
                event,
                TextureStoreEvent::Load(_) | TextureStoreEvent::Error(..) | TextureStoreEvent::Invalid(_)
            ) {
                forward.emit(&LayerEvent::TextureStoreChange);
            }
        });

        Self {
            inner: Rc::new(LayerInner {
                source,
                geometry,
                view: RefCell::new(view),
                store,
                effects: RefCell::new(options.effects),
                fixed_level: Cell::new(None),
                events,
                view_listener,
                store_listener,
            }),
        }
    }

    pub fn source(&self) -> &Rc<dyn Source> {
        &self.inner.source
    }

    pub fn geometry(&self) -> &Geometry {
        &self.inner.geometry
    }

    pub fn view(&self) -> Ref<'_, View> {
        self.inner.view.borrow()
    }

    /// Mutable access to the view. Listeners of the view's events must not
    /// borrow it again while they run.
    pub fn view_mut(&self) -> RefMut<'_, View> {
        self.inner.view.borrow_mut()
    }

    pub fn texture_store(&self) -> &TextureStore {
        &self.inner.store
    }

    pub fn events(&self) -> &Emitter<LayerEvent> {
        &self.inner.events
    }

    pub fn effects(&self) -> Effects {
        self.inner.effects.borrow().clone()
    }

    pub fn set_effects(&self, effects: Effects) {
        *self.inner.effects.borrow_mut() = effects;
        self.inner.events.emit(&LayerEvent::EffectsChange);
    }

    pub fn fixed_level(&self) -> Option<usize> {
        self.inner.fixed_level.get()
    }

    /// Always render `level` instead of letting the view choose. `None`
    /// restores automatic selection.
    pub fn set_fixed_level(&self, level: Option<usize>) -> Result<()> {
        if level == self.inner.fixed_level.get() {
            return Ok(());
        }
        if let Some(index) = level {
            if index >= self.inner.geometry.levels().len() {
                return Err(Error::InvalidArgument(format!(
                    "level index out of range: {index}"
                )));
            }
        }
        self.inner.fixed_level.set(level);
        self.inner.events.emit(&LayerEvent::FixedLevelChange);
        Ok(())
    }

    fn select_level(&self, view: &View) -> Result<Level> {
        let geometry = &self.inner.geometry;
        let level = match self.inner.fixed_level.get() {
            Some(index) => geometry.level(index),
            None => view.select_level(geometry.selectable_levels()),
        };
        level
            .copied()
            .ok_or_else(|| Error::Consistency("no level to render".into()))
    }

    /// Append the tiles of the current level that the view can see.
    pub fn visible_tiles(&self, out: &mut Vec<Tile>) -> Result<usize> {
        let view = self.inner.view.borrow();
        let level = self.select_level(&view)?;
        self.inner.geometry.visible_tiles(&view, &level, out)
    }

    /// Pin every tile of a level so it stays available as a fallback.
    pub fn pin_level(&self, index: usize) -> Result<()> {
        for tile in self.level_tiles(index)? {
            self.inner.store.pin(&tile)?;
        }
        Ok(())
    }

    pub fn unpin_level(&self, index: usize) -> Result<()> {
        for tile in self.level_tiles(index)? {
            self.inner.store.unpin(&tile)?;
        }
        Ok(())
    }

    pub fn pin_first_level(&self) -> Result<()> {
        self.pin_level(0)
    }

    pub fn unpin_first_level(&self) -> Result<()> {
        self.unpin_level(0)
    }

    fn level_tiles(&self, index: usize) -> Result<Vec<Tile>> {
        let geometry = &self.inner.geometry;
        let level = geometry
            .level(index)
            .ok_or_else(|| Error::InvalidArgument(format!("level index out of range: {index}")))?;
        Ok(geometry.level_tiles(level))
    }

    /// Whether both handles refer to the same layer.
    pub fn ptr_eq(&self, other: &Layer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("geometry", &self.inner.geometry.kind())
            .field("fixed_level", &self.inner.fixed_level.get())
            .field("effects", &*self.inner.effects.borrow())
            .finish()
    }
}

use fxhash::FxHashMap;
use std::fmt;
use std::rc::Rc;

use super::Renderer;
use crate::geometry::GeometryKind;
use crate::view::ViewKind;

/// Builds a fresh renderer for a layer.
pub type RendererFactory = Rc<dyn Fn() -> Box<dyn Renderer>>;

/// Renderer factories keyed by the geometry and view kinds they can draw.
#[derive(Default, Clone)]
pub struct RendererRegistry {
    factories: FxHashMap<(GeometryKind, ViewKind), RendererFactory>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory`, replacing any previous one for the same pair.
    pub fn set(&mut self, geometry: GeometryKind, view: ViewKind, factory: RendererFactory) {
        self.factories.insert((geometry, view), factory);
    }

    pub fn get(&self, geometry: GeometryKind, view: ViewKind) -> Option<&RendererFactory> {
        self.factories.get(&(geometry, view))
    }

    pub fn contains(&self, geometry: GeometryKind, view: ViewKind) -> bool {
        self.factories.contains_key(&(geometry, view))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("RendererRegistry").field("pairs", &keys).finish()
    }
}

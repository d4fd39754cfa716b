//! Camera state, projection and frustum culling
//!
//! A [`View`] is one of a small closed set of camera models. Every model keeps
//! its parameters in a plain `*ViewState` value, funnels all mutation through
//! a single update routine (fill, limit, normalize, validate, clamp, emit),
//! and derives its projection lazily: the matrices and frustum are rebuilt the
//! first time they are needed after a change.

pub mod flat;
pub mod fov;
pub mod rectilinear;

pub use self::flat::{FlatCoords, FlatView, FlatViewParams, FlatViewState};
pub use self::rectilinear::{
    RectilinearView, RectilinearViewParams, RectilinearViewState, SphericalCoords,
};

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::events::Emitter;
use crate::geometry::Level;
use crate::Result;

/// Tag identifying a camera model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Rectilinear,
    Flat,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Rectilinear => f.write_str("rectilinear"),
            ViewKind::Flat => f.write_str("flat"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// Any parameter changed.
    Change,
    /// The viewport size changed.
    Resize,
}

/// Viewport size in CSS-like pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Position on the viewport, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Adjusts parameters on every view mutation. Must be idempotent.
pub type Limiter<S> = Rc<dyn Fn(S) -> S>;

/// Chain limiters, applying them in order.
pub fn compose<S: 'static>(limiters: Vec<Limiter<S>>) -> Limiter<S> {
    Rc::new(move |state: S| limiters.iter().fold(state, |state, limiter| limiter(state)))
}

/// A camera model.
#[derive(Debug)]
pub enum View {
    Rectilinear(RectilinearView),
    Flat(FlatView),
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Rectilinear(_) => ViewKind::Rectilinear,
            View::Flat(_) => ViewKind::Flat,
        }
    }

    pub fn size(&self) -> Size {
        match self {
            View::Rectilinear(view) => view.size(),
            View::Flat(view) => view.size(),
        }
    }

    pub fn set_size(&mut self, size: Size) -> Result<()> {
        match self {
            View::Rectilinear(view) => view.set_size(size),
            View::Flat(view) => view.set_size(size),
        }
    }

    pub fn pixel_ratio(&self) -> f64 {
        match self {
            View::Rectilinear(view) => view.pixel_ratio(),
            View::Flat(view) => view.pixel_ratio(),
        }
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        match self {
            View::Rectilinear(view) => view.set_pixel_ratio(pixel_ratio),
            View::Flat(view) => view.set_pixel_ratio(pixel_ratio),
        }
    }

    pub fn projection(&self) -> Matrix4<f64> {
        match self {
            View::Rectilinear(view) => view.projection(),
            View::Flat(view) => view.projection(),
        }
    }

    pub fn inverse_projection(&self) -> Matrix4<f64> {
        match self {
            View::Rectilinear(view) => view.inverse_projection(),
            View::Flat(view) => view.inverse_projection(),
        }
    }

    /// Conservative frustum test: may report an invisible rectangle as
    /// visible, never the reverse.
    pub fn intersects(&self, rectangle: &[Vector3<f64>; 4]) -> bool {
        match self {
            View::Rectilinear(view) => view.intersects(rectangle),
            View::Flat(view) => view.intersects(rectangle),
        }
    }

    /// The coarsest level dense enough for the viewport, or the finest level
    /// when none is.
    pub fn select_level<'a>(&self, levels: &'a [Level]) -> Option<&'a Level> {
        match self {
            View::Rectilinear(view) => view.select_level(levels),
            View::Flat(view) => view.select_level(levels),
        }
    }

    pub fn events(&self) -> &Emitter<ViewEvent> {
        match self {
            View::Rectilinear(view) => view.events(),
            View::Flat(view) => view.events(),
        }
    }

    pub fn as_rectilinear(&self) -> Option<&RectilinearView> {
        match self {
            View::Rectilinear(view) => Some(view),
            View::Flat(_) => None,
        }
    }

    pub fn as_rectilinear_mut(&mut self) -> Option<&mut RectilinearView> {
        match self {
            View::Rectilinear(view) => Some(view),
            View::Flat(_) => None,
        }
    }

    pub fn as_flat(&self) -> Option<&FlatView> {
        match self {
            View::Flat(view) => Some(view),
            View::Rectilinear(_) => None,
        }
    }

    pub fn as_flat_mut(&mut self) -> Option<&mut FlatView> {
        match self {
            View::Flat(view) => Some(view),
            View::Rectilinear(_) => None,
        }
    }
}

impl From<RectilinearView> for View {
    fn from(view: RectilinearView) -> Self {
        View::Rectilinear(view)
    }
}

impl From<FlatView> for View {
    fn from(view: FlatView) -> Self {
        View::Flat(view)
    }
}

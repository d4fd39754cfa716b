//! Orthographic view over a flat image.
//!
//! Coordinates are normalized to the image: `x` runs left to right and `y`
//! top to bottom, both in `[0, 1]`. `zoom` is the fraction of the image width
//! that fits in the viewport.

use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

use super::{Limiter, ScreenPoint, Size, ViewEvent};
use crate::core::constants::ZOOM_LIMIT_EPSILON;
use crate::core::math::{invert_or_identity, is_real};
use crate::events::Emitter;
use crate::geometry::Level;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatViewState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    /// Image width divided by image height.
    pub media_aspect_ratio: f64,
    pub width: f64,
    pub height: f64,
}

impl FlatViewState {
    fn is_real(&self) -> bool {
        [
            self.x,
            self.y,
            self.zoom,
            self.media_aspect_ratio,
            self.width,
            self.height,
        ]
        .into_iter()
        .all(is_real)
    }

    fn zoom_x(&self) -> f64 {
        self.zoom
    }

    fn zoom_y(&self) -> f64 {
        let zoom_y = self.zoom * self.media_aspect_ratio / (self.width / self.height);
        if zoom_y.is_nan() {
            self.zoom
        } else {
            zoom_y
        }
    }
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlatViewParams {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub zoom: Option<f64>,
    pub media_aspect_ratio: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl FlatViewParams {
    fn fill(&self, current: &FlatViewState) -> FlatViewState {
        FlatViewState {
            x: self.x.unwrap_or(current.x),
            y: self.y.unwrap_or(current.y),
            zoom: self.zoom.unwrap_or(current.zoom),
            media_aspect_ratio: self.media_aspect_ratio.unwrap_or(current.media_aspect_ratio),
            width: self.width.unwrap_or(current.width),
            height: self.height.unwrap_or(current.height),
        }
    }
}

/// Position on the image in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatCoords {
    pub x: f64,
    pub y: f64,
}

/// Visible region in world space as `[top, right, bottom, left]`.
type Frustum = [f64; 4];

#[derive(Clone, Copy)]
struct Projection {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
    frustum: Frustum,
}

pub struct FlatView {
    state: FlatViewState,
    limiter: Option<Limiter<FlatViewState>>,
    pixel_ratio: f64,
    projection: Cell<Option<Projection>>,
    events: Emitter<ViewEvent>,
}

impl FlatView {
    /// `media_aspect_ratio` is required. `x` and `y` default to the image
    /// centre and `zoom` to the full image width.
    pub fn new(params: FlatViewParams, limiter: Option<Limiter<FlatViewState>>) -> Result<Self> {
        let media_aspect_ratio = params.media_aspect_ratio.ok_or_else(|| {
            Error::Capability("flat view requires a media aspect ratio".into())
        })?;
        let mut view = Self {
            state: FlatViewState {
                x: 0.5,
                y: 0.5,
                zoom: 1.0,
                media_aspect_ratio,
                width: 0.0,
                height: 0.0,
            },
            limiter,
            pixel_ratio: 1.0,
            projection: Cell::new(None),
            events: Emitter::new(),
        };
        view.update(params)?;
        Ok(view)
    }

    pub fn state(&self) -> FlatViewState {
        self.state
    }

    pub fn x(&self) -> f64 {
        self.state.x
    }

    pub fn y(&self) -> f64 {
        self.state.y
    }

    pub fn zoom(&self) -> f64 {
        self.state.zoom
    }

    pub fn media_aspect_ratio(&self) -> f64 {
        self.state.media_aspect_ratio
    }

    pub fn size(&self) -> Size {
        Size::new(self.state.width, self.state.height)
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn events(&self) -> &Emitter<ViewEvent> {
        &self.events
    }

    pub fn set_x(&mut self, x: f64) -> Result<()> {
        self.update(FlatViewParams {
            x: Some(x),
            ..Default::default()
        })
    }

    pub fn set_y(&mut self, y: f64) -> Result<()> {
        self.update(FlatViewParams {
            y: Some(y),
            ..Default::default()
        })
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<()> {
        self.update(FlatViewParams {
            zoom: Some(zoom),
            ..Default::default()
        })
    }

    pub fn set_media_aspect_ratio(&mut self, ratio: f64) -> Result<()> {
        self.update(FlatViewParams {
            media_aspect_ratio: Some(ratio),
            ..Default::default()
        })
    }

    pub fn offset_x(&mut self, offset: f64) -> Result<()> {
        self.set_x(self.state.x + offset)
    }

    pub fn offset_y(&mut self, offset: f64) -> Result<()> {
        self.set_y(self.state.y + offset)
    }

    pub fn offset_zoom(&mut self, offset: f64) -> Result<()> {
        self.set_zoom(self.state.zoom + offset)
    }

    pub fn set_size(&mut self, size: Size) -> Result<()> {
        self.update(FlatViewParams {
            width: Some(size.width),
            height: Some(size.height),
            ..Default::default()
        })
    }

    pub fn set_parameters(&mut self, params: FlatViewParams) -> Result<()> {
        self.update(params)
    }

    pub fn set_limiter(&mut self, limiter: Option<Limiter<FlatViewState>>) -> Result<()> {
        self.limiter = limiter;
        self.update(FlatViewParams::default())
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        if pixel_ratio != self.pixel_ratio {
            self.pixel_ratio = pixel_ratio;
            self.events.emit(&ViewEvent::Change);
        }
    }

    fn update(&mut self, params: FlatViewParams) -> Result<()> {
        let old = self.state;
        let mut state = params.fill(&old);

        if let Some(limiter) = &self.limiter {
            state = limiter(state);
        }
        if !state.is_real() {
            return Err(Error::BadView);
        }
        state.zoom = state.zoom.max(ZOOM_LIMIT_EPSILON);

        self.state = state;

        if state != old {
            self.projection.set(None);
            self.events.emit(&ViewEvent::Change);
        }
        if state.width != old.width || state.height != old.height {
            self.events.emit(&ViewEvent::Resize);
        }
        Ok(())
    }

    fn projection_data(&self) -> Projection {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let state = &self.state;
        let (zoom_x, zoom_y) = (state.zoom_x(), state.zoom_y());
        let top = (0.5 - state.y) + 0.5 * zoom_y;
        let right = (state.x - 0.5) + 0.5 * zoom_x;
        let bottom = (0.5 - state.y) - 0.5 * zoom_y;
        let left = (state.x - 0.5) - 0.5 * zoom_x;
        let matrix = ortho(left, right, bottom, top, -1.0, 1.0);
        let projection = Projection {
            matrix,
            inverse: invert_or_identity(&matrix),
            frustum: [top, right, bottom, left],
        };
        self.projection.set(Some(projection));
        projection
    }

    pub fn projection(&self) -> Matrix4<f64> {
        self.projection_data().matrix
    }

    pub fn inverse_projection(&self) -> Matrix4<f64> {
        self.projection_data().inverse
    }

    /// True when the rectangle overlaps the visible region. Touching an edge
    /// does not count.
    pub fn intersects(&self, rectangle: &[Vector3<f64>; 4]) -> bool {
        if self.size().is_empty() {
            return false;
        }
        let [top, right, bottom, left] = self.projection_data().frustum;
        let (mut left_fits, mut right_fits, mut top_fits, mut bottom_fits) =
            (false, false, false, false);
        for vertex in rectangle {
            left_fits |= vertex.x > left;
            right_fits |= vertex.x < right;
            top_fits |= vertex.y < top;
            bottom_fits |= vertex.y > bottom;
        }
        left_fits && right_fits && top_fits && bottom_fits
    }

    pub fn select_level<'a>(&self, levels: &'a [Level]) -> Option<&'a Level> {
        let required_pixels = self.pixel_ratio * self.state.width;
        levels
            .iter()
            .find(|level| self.state.zoom * level.width() as f64 >= required_pixels)
            .or_else(|| levels.last())
    }

    pub fn coordinates_to_screen(&self, coords: FlatCoords) -> Option<ScreenPoint> {
        let size = self.size();
        if size.is_empty() {
            return None;
        }
        let ray = self.projection() * Vector4::new(coords.x - 0.5, 0.5 - coords.y, -1.0, 1.0);
        Some(ScreenPoint {
            x: size.width * (ray.x + 1.0) / 2.0,
            y: size.height * (1.0 - ray.y) / 2.0,
        })
    }

    pub fn screen_to_coordinates(&self, point: ScreenPoint) -> FlatCoords {
        let size = self.size();
        let ndc = Vector4::new(
            2.0 * point.x / size.width - 1.0,
            1.0 - 2.0 * point.y / size.height,
            1.0,
            1.0,
        );
        let ray = self.inverse_projection() * ndc;
        FlatCoords {
            x: 0.5 + ray.x,
            y: 0.5 - ray.y,
        }
    }
}

fn ortho(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Matrix4<f64> {
    let lr = 1.0 / (left - right);
    let bt = 1.0 / (bottom - top);
    let nf = 1.0 / (near - far);
    Matrix4::new(
        -2.0 * lr, 0.0, 0.0, (left + right) * lr,
        0.0, -2.0 * bt, 0.0, (top + bottom) * bt,
        0.0, 0.0, 2.0 * nf, (far + near) * nf,
        0.0, 0.0, 0.0, 1.0,
    )
}

impl fmt::Debug for FlatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatView")
            .field("state", &self.state)
            .field("limited", &self.limiter.is_some())
            .field("pixel_ratio", &self.pixel_ratio)
            .finish()
    }
}

pub mod limit {
    use super::*;
    use crate::core::math::clamp;
    use std::rc::Rc;

    pub fn x(min: f64, max: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            state.x = clamp(state.x, min, max);
            state
        })
    }

    pub fn y(min: f64, max: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            state.y = clamp(state.y, min, max);
            state
        })
    }

    pub fn zoom(min: f64, max: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            state.zoom = clamp(state.zoom, min, max);
            state
        })
    }

    /// Prevent zooming in past `size`, the image width in pixels.
    pub fn resolution(size: f64, pixel_ratio: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            if state.width > 0.0 && state.height > 0.0 {
                let min_zoom = pixel_ratio * state.width / size;
                state.zoom = state.zoom.max(min_zoom);
            }
            state
        })
    }

    /// Keep the horizontal range `[min, max]` covering the viewport.
    pub fn visible_x(min: f64, max: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            let max_zoom = max - min;
            if state.zoom > max_zoom {
                state.zoom = max_zoom;
            }
            let min_x = min + 0.5 * state.zoom;
            let max_x = max - 0.5 * state.zoom;
            state.x = clamp(state.x, min_x, max_x);
            state
        })
    }

    /// Keep the vertical range `[min, max]` covering the viewport.
    pub fn visible_y(min: f64, max: f64) -> Limiter<FlatViewState> {
        Rc::new(move |mut state: FlatViewState| {
            if state.width <= 0.0 || state.height <= 0.0 {
                return state;
            }
            let factor = (state.width / state.height) / state.media_aspect_ratio;
            let max_zoom = (max - min) * factor;
            if state.zoom > max_zoom {
                state.zoom = max_zoom;
            }
            let min_y = min + 0.5 * state.zoom / factor;
            let max_y = max - 0.5 * state.zoom / factor;
            state.y = clamp(state.y, min_y, max_y);
            state
        })
    }

    /// Stop zooming out once the whole image is visible, centring it along
    /// any axis where it no longer fills the viewport.
    pub fn letterbox() -> Limiter<FlatViewState> {
        Rc::new(|mut state: FlatViewState| {
            if state.width <= 0.0 || state.height <= 0.0 {
                return state;
            }
            let viewport_aspect_ratio = state.width / state.height;
            let full_width_zoom = 1.0;
            let full_height_zoom = viewport_aspect_ratio / state.media_aspect_ratio;

            if state.media_aspect_ratio >= viewport_aspect_ratio {
                state.zoom = state.zoom.min(full_width_zoom);
            }
            if state.media_aspect_ratio <= viewport_aspect_ratio {
                state.zoom = state.zoom.min(full_height_zoom);
            }

            let (min_x, max_x) = if state.zoom > full_width_zoom {
                (0.5, 0.5)
            } else {
                (0.5 * state.zoom / full_width_zoom, 1.0 - 0.5 * state.zoom / full_width_zoom)
            };
            let (min_y, max_y) = if state.zoom > full_height_zoom {
                (0.5, 0.5)
            } else {
                (0.5 * state.zoom / full_height_zoom, 1.0 - 0.5 * state.zoom / full_height_zoom)
            };

            state.x = clamp(state.x, min_x, max_x);
            state.y = clamp(state.y, min_y, max_y);
            state
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, LevelSpec};
    use std::rc::Rc;

    fn view(width: f64, height: f64, ratio: f64) -> FlatView {
        FlatView::new(
            FlatViewParams {
                media_aspect_ratio: Some(ratio),
                width: Some(width),
                height: Some(height),
                ..Default::default()
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_media_aspect_ratio_is_required() {
        let result = FlatView::new(FlatViewParams::default(), None);
        assert!(matches!(result, Err(Error::Capability(_))));
    }

    #[test]
    fn test_defaults_and_zoom_floor() {
        let mut view = view(100.0, 100.0, 1.0);
        assert_eq!((view.x(), view.y(), view.zoom()), (0.5, 0.5, 1.0));
        view.set_zoom(-3.0).unwrap();
        assert_eq!(view.zoom(), ZOOM_LIMIT_EPSILON);
    }

    #[test]
    fn test_broken_limiter_is_rejected() {
        let limiter: Limiter<FlatViewState> = Rc::new(|mut state: FlatViewState| {
            state.x = f64::INFINITY;
            state
        });
        let mut view = view(100.0, 100.0, 1.0);
        assert!(matches!(view.set_limiter(Some(limiter)), Err(Error::BadView)));
        // The previous parameters survive a rejected update.
        assert_eq!(view.x(), 0.5);
    }

    #[test]
    fn test_screen_round_trip() {
        let mut view = view(800.0, 400.0, 2.0);
        view.set_parameters(FlatViewParams {
            x: Some(0.3),
            y: Some(0.6),
            zoom: Some(0.5),
            ..Default::default()
        })
        .unwrap();

        let center = view.coordinates_to_screen(FlatCoords { x: 0.3, y: 0.6 }).unwrap();
        assert!((center.x - 400.0).abs() < 1e-9 && (center.y - 200.0).abs() < 1e-9);

        let coords = FlatCoords { x: 0.41, y: 0.52 };
        let back = view.screen_to_coordinates(view.coordinates_to_screen(coords).unwrap());
        assert!((back.x - coords.x).abs() < 1e-9 && (back.y - coords.y).abs() < 1e-9);

        let empty = FlatView::new(
            FlatViewParams {
                media_aspect_ratio: Some(1.0),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(empty.coordinates_to_screen(coords).is_none());
    }

    #[test]
    fn test_intersects_is_strict_and_requires_size() {
        let geometry = Geometry::flat([LevelSpec::flat(512, 512, 256, 256)]).unwrap();
        let mut view = view(100.0, 100.0, 1.0);
        view.set_parameters(FlatViewParams {
            x: Some(0.25),
            zoom: Some(0.5),
            ..Default::default()
        })
        .unwrap();
        let left = geometry.tile(None, 0, 0, 0).unwrap();
        let right = geometry.tile(None, 1, 0, 0).unwrap();
        assert!(view.intersects(&left.vertices().unwrap()));
        // Shares only the x = 0.5 edge with the visible region.
        assert!(!view.intersects(&right.vertices().unwrap()));

        view.set_size(Size::new(0.0, 0.0)).unwrap();
        assert!(!view.intersects(&left.vertices().unwrap()));
    }

    #[test]
    fn test_select_level() {
        let geometry = Geometry::flat([
            LevelSpec::flat(512, 512, 512, 512),
            LevelSpec::flat(2048, 2048, 512, 512),
        ])
        .unwrap();
        let levels = geometry.selectable_levels();
        let mut view = view(400.0, 400.0, 1.0);
        assert_eq!(view.select_level(levels).unwrap().index(), 0);
        view.set_zoom(0.5).unwrap();
        assert_eq!(view.select_level(levels).unwrap().index(), 1);
        view.set_pixel_ratio(2.0);
        view.set_zoom(0.1).unwrap();
        assert_eq!(view.select_level(levels).unwrap().index(), 1);
    }

    #[test]
    fn test_letterbox_limiter() {
        let mut view = FlatView::new(
            FlatViewParams {
                media_aspect_ratio: Some(2.0),
                width: Some(100.0),
                height: Some(100.0),
                zoom: Some(3.0),
                ..Default::default()
            },
            Some(limit::letterbox()),
        )
        .unwrap();
        // The wide image is capped at its full width.
        assert_eq!(view.zoom(), 1.0);
        assert_eq!(view.x(), 0.5);
        assert_eq!(view.y(), 0.5);

        view.set_parameters(FlatViewParams {
            zoom: Some(0.25),
            x: Some(0.0),
            ..Default::default()
        })
        .unwrap();
        assert!((view.x() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_visible_x_and_resolution() {
        let visible = limit::visible_x(0.0, 1.0);
        let state = visible(FlatViewState {
            x: 0.9,
            y: 0.5,
            zoom: 0.4,
            media_aspect_ratio: 1.0,
            width: 100.0,
            height: 100.0,
        });
        assert!((state.x - 0.8).abs() < 1e-12);

        let resolution = limit::resolution(1000.0, 1.0);
        let state = resolution(FlatViewState { zoom: 0.01, ..state });
        assert!((state.zoom - 0.1).abs() < 1e-12);
    }
}

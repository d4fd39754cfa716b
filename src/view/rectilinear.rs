//! Perspective camera looking out from the centre of a sphere or cube.

use nalgebra::{Matrix4, Rotation3, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::f64::consts::PI;
use std::fmt;

use super::fov::{htov, vtoh};
use super::{Limiter, ScreenPoint, Size, ViewEvent};
use crate::core::constants::{DEFAULT_FOV, FOV_LIMIT_EPSILON};
use crate::core::math::{clamp, frustum_planes, invert_or_identity, is_real, wrap_angle};
use crate::events::Emitter;
use crate::geometry::Level;
use crate::{Error, Result};

const NEAR: f64 = 0.1;
const FAR: f64 = 100.0;

/// Complete rectilinear camera parameters. Angles are in radians and `fov`
/// is the vertical field of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectilinearViewState {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub fov: f64,
    pub width: f64,
    pub height: f64,
    /// Horizontal offset of the projection centre, as a fraction of the width.
    pub projection_center_x: f64,
    /// Vertical offset of the projection centre, as a fraction of the height.
    pub projection_center_y: f64,
}

impl Default for RectilinearViewState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov: DEFAULT_FOV,
            width: 0.0,
            height: 0.0,
            projection_center_x: 0.0,
            projection_center_y: 0.0,
        }
    }
}

impl RectilinearViewState {
    fn is_real(&self) -> bool {
        [
            self.yaw,
            self.pitch,
            self.roll,
            self.fov,
            self.width,
            self.height,
            self.projection_center_x,
            self.projection_center_y,
        ]
        .into_iter()
        .all(is_real)
    }
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectilinearViewParams {
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub fov: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub projection_center_x: Option<f64>,
    pub projection_center_y: Option<f64>,
}

impl RectilinearViewParams {
    fn fill(&self, current: &RectilinearViewState) -> RectilinearViewState {
        RectilinearViewState {
            yaw: self.yaw.unwrap_or(current.yaw),
            pitch: self.pitch.unwrap_or(current.pitch),
            roll: self.roll.unwrap_or(current.roll),
            fov: self.fov.unwrap_or(current.fov),
            width: self.width.unwrap_or(current.width),
            height: self.height.unwrap_or(current.height),
            projection_center_x: self.projection_center_x.unwrap_or(current.projection_center_x),
            projection_center_y: self.projection_center_y.unwrap_or(current.projection_center_y),
        }
    }
}

/// Direction on the sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalCoords {
    pub yaw: f64,
    pub pitch: f64,
}

#[derive(Clone, Copy)]
struct Projection {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
    frustum: [Vector4<f64>; 5],
}

pub struct RectilinearView {
    state: RectilinearViewState,
    limiter: Option<Limiter<RectilinearViewState>>,
    pixel_ratio: f64,
    projection: Cell<Option<Projection>>,
    events: Emitter<ViewEvent>,
}

impl RectilinearView {
    pub fn new(
        params: RectilinearViewParams,
        limiter: Option<Limiter<RectilinearViewState>>,
    ) -> Result<Self> {
        let mut view = Self {
            state: RectilinearViewState::default(),
            limiter,
            pixel_ratio: 1.0,
            projection: Cell::new(None),
            events: Emitter::new(),
        };
        view.update(params)?;
        Ok(view)
    }

    pub fn state(&self) -> RectilinearViewState {
        self.state
    }

    pub fn yaw(&self) -> f64 {
        self.state.yaw
    }

    pub fn pitch(&self) -> f64 {
        self.state.pitch
    }

    pub fn roll(&self) -> f64 {
        self.state.roll
    }

    pub fn fov(&self) -> f64 {
        self.state.fov
    }

    pub fn projection_center_x(&self) -> f64 {
        self.state.projection_center_x
    }

    pub fn projection_center_y(&self) -> f64 {
        self.state.projection_center_y
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

    pub fn limiter(&self) -> Option<&Limiter<RectilinearViewState>> {
        self.limiter.as_ref()
    }

    pub fn set_yaw(&mut self, yaw: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            yaw: Some(yaw),
            ..Default::default()
        })
    }

    pub fn set_pitch(&mut self, pitch: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            pitch: Some(pitch),
            ..Default::default()
        })
    }

    pub fn set_roll(&mut self, roll: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            roll: Some(roll),
            ..Default::default()
        })
    }

    pub fn set_fov(&mut self, fov: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            fov: Some(fov),
            ..Default::default()
        })
    }

    pub fn set_projection_center_x(&mut self, value: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            projection_center_x: Some(value),
            ..Default::default()
        })
    }

    pub fn set_projection_center_y(&mut self, value: f64) -> Result<()> {
        self.update(RectilinearViewParams {
            projection_center_y: Some(value),
            ..Default::default()
        })
    }

    pub fn offset_yaw(&mut self, offset: f64) -> Result<()> {
        self.set_yaw(self.state.yaw + offset)
    }

    pub fn offset_pitch(&mut self, offset: f64) -> Result<()> {
        self.set_pitch(self.state.pitch + offset)
    }

    pub fn offset_roll(&mut self, offset: f64) -> Result<()> {
        self.set_roll(self.state.roll + offset)
    }

    pub fn offset_fov(&mut self, offset: f64) -> Result<()> {
        self.set_fov(self.state.fov + offset)
    }

    pub fn set_size(&mut self, size: Size) -> Result<()> {
        self.update(RectilinearViewParams {
            width: Some(size.width),
            height: Some(size.height),
            ..Default::default()
        })
    }

    pub fn set_parameters(&mut self, params: RectilinearViewParams) -> Result<()> {
        self.update(params)
    }

    /// Replace the limiter and re-apply it to the current parameters.
    pub fn set_limiter(&mut self, limiter: Option<Limiter<RectilinearViewState>>) -> Result<()> {
        self.limiter = limiter;
        self.update(RectilinearViewParams::default())
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        if pixel_ratio != self.pixel_ratio {
            self.pixel_ratio = pixel_ratio;
            self.events.emit(&ViewEvent::Change);
        }
    }

    fn update(&mut self, params: RectilinearViewParams) -> Result<()> {
        let old = self.state;
        let mut state = params.fill(&old);

        if let Some(limiter) = &self.limiter {
            state = limiter(state);
        }

        state.yaw = wrap_angle(state.yaw);
        state.pitch = wrap_angle(state.pitch);
        state.roll = wrap_angle(state.roll);

        if !state.is_real() {
            return Err(Error::BadView);
        }

        // Neither field of view may reach π.
        let hfov_pi = htov(PI, state.width, state.height);
        let max_fov = if hfov_pi.is_nan() { PI } else { PI.min(hfov_pi) };
        state.fov = clamp(state.fov, FOV_LIMIT_EPSILON, max_fov - FOV_LIMIT_EPSILON);

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

    /// Express `coords` with the yaw and pitch closest to the current view,
    /// which is the shortest path when tweening.
    pub fn normalize_to_closest(&self, coords: SphericalCoords) -> SphericalCoords {
        SphericalCoords {
            yaw: closest_turn(coords.yaw, self.state.yaw),
            pitch: closest_turn(coords.pitch, self.state.pitch),
        }
    }

    fn projection_data(&self) -> Projection {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let projection = self.compute_projection();
        self.projection.set(Some(projection));
        projection
    }

    fn compute_projection(&self) -> Projection {
        let state = &self.state;
        let vfov = state.fov;
        let hfov = vtoh(vfov, state.width, state.height);

        let offset_x = (state.projection_center_x * 2.0 * (hfov / 2.0).tan()).atan();
        let offset_y = (state.projection_center_y * 2.0 * (vfov / 2.0).tan()).atan();
        let perspective = perspective_from_fov(
            vfov / 2.0 + offset_y,
            vfov / 2.0 - offset_y,
            hfov / 2.0 + offset_x,
            hfov / 2.0 - offset_x,
        );

        let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), state.roll).to_homogeneous();
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), state.pitch).to_homogeneous();
        let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), state.yaw).to_homogeneous();
        let matrix = perspective * roll * pitch * yaw;

        Projection {
            matrix,
            inverse: invert_or_identity(&matrix),
            frustum: frustum_planes(&matrix),
        }
    }

    pub fn projection(&self) -> Matrix4<f64> {
        self.projection_data().matrix
    }

    pub fn inverse_projection(&self) -> Matrix4<f64> {
        self.projection_data().inverse
    }

    /// A rectangle is outside when all of its corners lie behind one plane.
    pub fn intersects(&self, rectangle: &[Vector3<f64>; 4]) -> bool {
        let frustum = self.projection_data().frustum;
        frustum.iter().all(|plane| {
            rectangle
                .iter()
                .any(|corner| plane.dot(&Vector4::new(corner.x, corner.y, corner.z, 0.0)) >= 0.0)
        })
    }

    pub fn select_level<'a>(&self, levels: &'a [Level]) -> Option<&'a Level> {
        let required_pixels = self.pixel_ratio * self.state.height;
        let cover_factor = (0.5 * self.state.fov).tan();
        levels
            .iter()
            .find(|level| cover_factor * level.height() as f64 >= required_pixels)
            .or_else(|| levels.last())
    }

    /// Project a direction onto the viewport. `None` when the point is
    /// behind the camera or the viewport is empty.
    pub fn coordinates_to_screen(&self, coords: SphericalCoords) -> Option<ScreenPoint> {
        let (width, height) = (self.state.width, self.state.height);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        let ray = Vector4::new(
            coords.yaw.sin() * coords.pitch.cos(),
            -coords.pitch.sin(),
            -coords.yaw.cos() * coords.pitch.cos(),
            1.0,
        );
        let clip = self.projection() * ray;
        // Clip-space w is the distance in front of the camera.
        if clip.w < 0.0 {
            return None;
        }
        Some(ScreenPoint {
            x: width * (clip.x / clip.w + 1.0) / 2.0,
            y: height * (1.0 - clip.y / clip.w) / 2.0,
        })
    }

    pub fn screen_to_coordinates(&self, point: ScreenPoint) -> SphericalCoords {
        let (width, height) = (self.state.width, self.state.height);
        let ndc = Vector4::new(2.0 * point.x / width - 1.0, 1.0 - 2.0 * point.y / height, 1.0, 1.0);
        let ray = self.inverse_projection() * ndc;
        let r = (ray.x * ray.x + ray.y * ray.y + ray.z * ray.z).sqrt();
        SphericalCoords {
            yaw: wrap_angle(ray.x.atan2(-ray.z)),
            pitch: wrap_angle((ray.y / r).acos() - PI / 2.0),
        }
    }
}

fn closest_turn(angle: f64, reference: f64) -> f64 {
    let prev = angle - 2.0 * PI;
    let next = angle + 2.0 * PI;
    if (prev - reference).abs() < (angle - reference).abs() {
        prev
    } else if (next - reference).abs() < (angle - reference).abs() {
        next
    } else {
        angle
    }
}

/// Asymmetric perspective projection from the four half-angles of the frustum.
fn perspective_from_fov(up: f64, down: f64, left: f64, right: f64) -> Matrix4<f64> {
    let (up_tan, down_tan) = (up.tan(), down.tan());
    let (left_tan, right_tan) = (left.tan(), right.tan());
    let x_scale = 2.0 / (left_tan + right_tan);
    let y_scale = 2.0 / (up_tan + down_tan);
    Matrix4::new(
        x_scale, 0.0, -(left_tan - right_tan) * x_scale * 0.5, 0.0,
        0.0, y_scale, (up_tan - down_tan) * y_scale * 0.5, 0.0,
        0.0, 0.0, FAR / (NEAR - FAR), FAR * NEAR / (NEAR - FAR),
        0.0, 0.0, -1.0, 0.0,
    )
}

impl fmt::Debug for RectilinearView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RectilinearView")
            .field("state", &self.state)
            .field("limited", &self.limiter.is_some())
            .field("pixel_ratio", &self.pixel_ratio)
            .finish()
    }
}

/// Ready-made limiters for rectilinear views.
pub mod limit {
    use super::*;
    use crate::view::compose;
    use std::rc::Rc;

    pub fn yaw(min: f64, max: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            state.yaw = clamp(state.yaw, min, max);
            state
        })
    }

    pub fn pitch(min: f64, max: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            state.pitch = clamp(state.pitch, min, max);
            state
        })
    }

    pub fn roll(min: f64, max: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            state.roll = clamp(state.roll, min, max);
            state
        })
    }

    /// Bound the horizontal field of view, once the viewport has a size.
    pub fn hfov(min: f64, max: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            if state.width > 0.0 && state.height > 0.0 {
                let vmin = htov(min, state.width, state.height);
                let vmax = htov(max, state.width, state.height);
                state.fov = clamp(state.fov, vmin, vmax);
            }
            state
        })
    }

    pub fn vfov(min: f64, max: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            state.fov = clamp(state.fov, min, max);
            state
        })
    }

    /// Prevent zooming in past `size`, the cube face width in pixels.
    pub fn resolution(size: f64, pixel_ratio: f64) -> Limiter<RectilinearViewState> {
        Rc::new(move |mut state: RectilinearViewState| {
            if state.height > 0.0 {
                let required_pixels = pixel_ratio * state.height;
                let min_fov = 2.0 * (required_pixels / size).atan();
                state.fov = state.fov.max(min_fov);
            }
            state
        })
    }

    /// Resolution, field of view and pitch limits typical of a 360° panorama.
    pub fn traditional(max_resolution: f64, max_vfov: f64, max_hfov: Option<f64>) -> Limiter<RectilinearViewState> {
        compose(vec![
            resolution(max_resolution, 1.0),
            vfov(0.0, max_vfov),
            hfov(0.0, max_hfov.unwrap_or(max_vfov)),
            pitch(-PI / 2.0, PI / 2.0),
        ])
    }
}

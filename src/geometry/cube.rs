use nalgebra::{Rotation3, Vector3, Vector4};
use std::f64::consts::{FRAC_PI_2, PI};

use super::level::{Level, LevelSpec};
use super::{CubeFace, Geometry, Tile, TileCoord};
use crate::core::math::clamp;
use crate::view::RectilinearView;
use crate::{Error, Result};

/// Rotation around the x and y axes taking the front face onto `face`.
pub(crate) fn face_rotation(face: CubeFace) -> (f64, f64) {
    match face {
        CubeFace::Front => (0.0, 0.0),
        CubeFace::Back => (0.0, PI),
        CubeFace::Left => (0.0, FRAC_PI_2),
        CubeFace::Right => (0.0, -FRAC_PI_2),
        CubeFace::Up => (FRAC_PI_2, 0.0),
        CubeFace::Down => (-FRAC_PI_2, 0.0),
    }
}

fn rotations(face: CubeFace) -> (Rotation3<f64>, Rotation3<f64>) {
    let (rot_x, rot_y) = face_rotation(face);
    (
        Rotation3::from_axis_angle(&Vector3::x_axis(), rot_x),
        Rotation3::from_axis_angle(&Vector3::y_axis(), rot_y),
    )
}

/// Map a point expressed in front-face space onto `face`.
fn to_world(face: CubeFace, point: Vector3<f64>) -> Vector3<f64> {
    let (rx, ry) = rotations(face);
    ry * (rx * point)
}

fn to_face(face: CubeFace, direction: Vector3<f64>) -> Vector3<f64> {
    let (rx, ry) = rotations(face);
    rx.inverse() * (ry.inverse() * direction)
}

fn face_for_direction(d: Vector3<f64>) -> CubeFace {
    let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());
    if ax >= ay && ax >= az {
        if d.x > 0.0 {
            CubeFace::Right
        } else {
            CubeFace::Left
        }
    } else if ay >= az {
        if d.y > 0.0 {
            CubeFace::Up
        } else {
            CubeFace::Down
        }
    } else if d.z < 0.0 {
        CubeFace::Front
    } else {
        CubeFace::Back
    }
}

/// The tile of `level` hit by a ray from the cube centre.
fn coord_for_direction(direction: Vector3<f64>, level: &Level) -> TileCoord {
    let face = face_for_direction(direction);
    let local = to_face(face, direction);
    let scale = if local.z != 0.0 { -0.5 / local.z } else { 0.0 };
    let (u, v) = (local.x * scale, local.y * scale);
    let x = grid_index(u + 0.5, level.width(), level.tile_width(), level.num_horizontal_tiles());
    let y = grid_index(0.5 - v, level.height(), level.tile_height(), level.num_vertical_tiles());
    TileCoord::new(Some(face), x, y, level.index())
}

fn grid_index(position: f64, level_size: u32, tile_size: u32, count: u32) -> u32 {
    let index = (position * level_size as f64 / tile_size as f64).floor();
    clamp(index, 0.0, (count - 1) as f64) as u32
}

pub(super) fn validate_with_parent(level: &LevelSpec, parent: &LevelSpec) -> Result<()> {
    if level.width % parent.width != 0 {
        return Err(Error::InvalidLevels(format!(
            "level size {} is not a multiple of parent size {}",
            level.width, parent.width
        )));
    }
    if level.tile_width % parent.tile_width != 0 {
        return Err(Error::InvalidLevels(format!(
            "tile size {} is not a multiple of parent tile size {}",
            level.tile_width, parent.tile_width
        )));
    }
    Ok(())
}

pub(super) fn vertices(tile: &Tile) -> [Vector3<f64>; 4] {
    let face = tile.face().unwrap_or(CubeFace::Front);
    let (cx, cy) = (tile.center_x(), tile.center_y());
    let (hx, hy) = (tile.scale_x() / 2.0, tile.scale_y() / 2.0);
    let (left, right, top, bottom) = (cx - hx, cx + hx, cy + hy, cy - hy);
    [
        to_world(face, Vector3::new(left, top, -0.5)),
        to_world(face, Vector3::new(right, top, -0.5)),
        to_world(face, Vector3::new(right, bottom, -0.5)),
        to_world(face, Vector3::new(left, bottom, -0.5)),
    ]
}

/// Probe just past the midpoint of each edge and map the probe back onto the
/// cube, which crosses to the adjacent face where needed.
pub(super) fn neighbors(geometry: &Geometry, coord: TileCoord) -> Vec<TileCoord> {
    let tile = geometry.tile_at(coord);
    let level = *tile.level();
    let face = coord.face.unwrap_or(CubeFace::Front);
    let epsilon = 0.25 / level.width() as f64;
    let (cx, cy) = (tile.center_x(), tile.center_y());
    let (hx, hy) = (tile.scale_x() / 2.0 + epsilon, tile.scale_y() / 2.0 + epsilon);
    let probes = [(cx, cy + hy), (cx + hx, cy), (cx, cy - hy), (cx - hx, cy)];

    let mut result = Vec::with_capacity(4);
    for (u, v) in probes {
        let world = to_world(face, Vector3::new(u, v, -0.5));
        let neighbor = coord_for_direction(world, &level);
        if neighbor != coord && !result.contains(&neighbor) {
            result.push(neighbor);
        }
    }
    result
}

/// The tile under the centre of the view.
pub(super) fn closest_tile(geometry: &Geometry, view: &RectilinearView, level: &Level) -> Tile {
    let ray = view.inverse_projection() * Vector4::new(0.0, 0.0, 1.0, 1.0);
    let w = if ray.w != 0.0 { ray.w } else { 1.0 };
    let direction = Vector3::new(ray.x / w, ray.y / w, ray.z / w);
    geometry.tile_at(coord_for_direction(direction, level))
}

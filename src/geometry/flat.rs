use nalgebra::{Vector3, Vector4};

use super::level::{Level, LevelSpec};
use super::{Geometry, Tile, TileCoord};
use crate::view::FlatView;
use crate::{Error, Result};

// Up, right, down, left in grid space.
const NEIGHBOR_OFFSETS: [(i64, i64); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

pub(super) fn validate_with_parent(level: &LevelSpec, parent: &LevelSpec) -> Result<()> {
    if level.width % parent.width != 0 {
        return Err(Error::InvalidLevels(format!(
            "level width {} is not a multiple of parent width {}",
            level.width, parent.width
        )));
    }
    if level.height % parent.height != 0 {
        return Err(Error::InvalidLevels(format!(
            "level height {} is not a multiple of parent height {}",
            level.height, parent.height
        )));
    }
    if level.tile_width % parent.tile_width != 0 {
        return Err(Error::InvalidLevels(format!(
            "tile width {} is not a multiple of parent tile width {}",
            level.tile_width, parent.tile_width
        )));
    }
    if level.tile_height % parent.tile_height != 0 {
        return Err(Error::InvalidLevels(format!(
            "tile height {} is not a multiple of parent tile height {}",
            level.tile_height, parent.tile_height
        )));
    }
    Ok(())
}

pub(super) fn vertices(tile: &Tile) -> [Vector3<f64>; 4] {
    let (cx, cy) = (tile.center_x(), tile.center_y());
    let (hx, hy) = (tile.scale_x() / 2.0, tile.scale_y() / 2.0);
    let (left, right, top, bottom) = (cx - hx, cx + hx, cy + hy, cy - hy);
    [
        Vector3::new(left, top, 0.0),
        Vector3::new(right, top, 0.0),
        Vector3::new(right, bottom, 0.0),
        Vector3::new(left, bottom, 0.0),
    ]
}

pub(super) fn neighbors(geometry: &Geometry, coord: TileCoord) -> Vec<TileCoord> {
    let level = &geometry.levels()[coord.z];
    let columns = level.num_horizontal_tiles() as i64;
    let rows = level.num_vertical_tiles() as i64;
    NEIGHBOR_OFFSETS
        .iter()
        .filter_map(|(dx, dy)| {
            let x = coord.x as i64 + dx;
            let y = coord.y as i64 + dy;
            (x >= 0 && x < columns && y >= 0 && y < rows)
                .then(|| TileCoord::new(None, x as u32, y as u32, coord.z))
        })
        .collect()
}

/// The tile under the centre of the view, clamped to the grid.
pub(super) fn closest_tile(geometry: &Geometry, view: &FlatView, level: &Level) -> Tile {
    let ray = view.inverse_projection() * Vector4::new(0.0, 0.0, 1.0, 1.0);
    let x = 0.5 + ray.x;
    let y = 0.5 - ray.y;
    let column = grid_index(x, level.width(), level.tile_width(), level.num_horizontal_tiles());
    let row = grid_index(y, level.height(), level.tile_height(), level.num_vertical_tiles());
    geometry.tile_at(TileCoord::new(None, column, row, level.index()))
}

fn grid_index(position: f64, level_size: u32, tile_size: u32, count: u32) -> u32 {
    let index = (position * level_size as f64 / tile_size as f64).floor();
    crate::core::math::clamp(index, 0.0, (count - 1) as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_tile_has_two_neighbors() {
        let geometry = Geometry::flat([LevelSpec::flat(768, 512, 256, 256)]).unwrap();
        let corner = geometry.tile(None, 0, 0, 0).unwrap();
        let mut coords: Vec<(u32, u32)> =
            corner.neighbors().iter().map(|t| (t.x(), t.y())).collect();
        coords.sort();
        assert_eq!(coords, vec![(0, 1), (1, 0)]);

        let middle = geometry.tile(None, 1, 0, 0).unwrap();
        assert_eq!(middle.neighbors().len(), 3);
    }

    #[test]
    fn test_vertices_cover_the_tile() {
        let geometry = Geometry::flat([LevelSpec::flat(512, 512, 256, 256)]).unwrap();
        let tile = geometry.tile(None, 1, 0, 0).unwrap();
        let v = vertices(&tile);
        assert!((v[0].x - 0.0).abs() < 1e-12 && (v[0].y - 0.5).abs() < 1e-12);
        assert!((v[2].x - 0.5).abs() < 1e-12 && (v[2].y - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_index_clamps() {
        assert_eq!(grid_index(-0.2, 512, 256, 2), 0);
        assert_eq!(grid_index(0.75, 512, 256, 2), 1);
        assert_eq!(grid_index(1.5, 512, 256, 2), 1);
    }
}

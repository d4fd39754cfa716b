use super::{Geometry, Level, Tile, TileCoord};

/// An equirectangular level is one tile wrapping the whole sphere, so it is
/// always visible.
pub(super) fn visible_tiles(geometry: &Geometry, level: &Level, out: &mut Vec<Tile>) -> usize {
    out.push(geometry.tile_at(TileCoord::new(None, 0, 0, level.index())));
    1
}

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::level::{child_range, parent_index, Level};
use super::{cube, flat, Geometry, GeometryKind};

/// One face of a cube geometry, declared in canonical `bdflru` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CubeFace {
    #[serde(rename = "b")]
    Back,
    #[serde(rename = "d")]
    Down,
    #[serde(rename = "f")]
    Front,
    #[serde(rename = "l")]
    Left,
    #[serde(rename = "r")]
    Right,
    #[serde(rename = "u")]
    Up,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Back,
        CubeFace::Down,
        CubeFace::Front,
        CubeFace::Left,
        CubeFace::Right,
        CubeFace::Up,
    ];

    /// The single-letter name used in URL templates.
    pub fn as_char(self) -> char {
        match self {
            CubeFace::Back => 'b',
            CubeFace::Down => 'd',
            CubeFace::Front => 'f',
            CubeFace::Left => 'l',
            CubeFace::Right => 'r',
            CubeFace::Up => 'u',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        CubeFace::ALL.into_iter().find(|face| face.as_char() == c)
    }
}

impl fmt::Display for CubeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Grid position of a tile, independent of the geometry it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub face: Option<CubeFace>,
    pub x: u32,
    pub y: u32,
    pub z: usize,
}

impl TileCoord {
    pub fn new(face: Option<CubeFace>, x: u32, y: u32, z: usize) -> Self {
        Self { face, x, y, z }
    }
}

impl Ord for TileCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.z
            .cmp(&other.z)
            .then(self.face.cmp(&other.face))
            .then(self.y.cmp(&other.y))
            .then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for TileCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A tile of a geometry.
///
/// Tiles are immutable values; two tiles are equal when they sit at the same
/// grid position of the same geometry. Ordering puts coarser levels first,
/// which is the bottom-to-top stacking order used when compositing.
#[derive(Clone)]
pub struct Tile {
    coord: TileCoord,
    geometry: Geometry,
}

impl Tile {
    pub(crate) fn new(geometry: Geometry, coord: TileCoord) -> Self {
        Self { coord, geometry }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn face(&self) -> Option<CubeFace> {
        self.coord.face
    }

    pub fn x(&self) -> u32 {
        self.coord.x
    }

    pub fn y(&self) -> u32 {
        self.coord.y
    }

    pub fn z(&self) -> usize {
        self.coord.z
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn level(&self) -> &Level {
        &self.geometry.levels()[self.coord.z]
    }

    /// Width in pixels; edge tiles may be narrower than the nominal tile width.
    pub fn width(&self) -> u32 {
        self.level().tile_width_at(self.coord.x)
    }

    /// Height in pixels; edge tiles may be shorter than the nominal tile height.
    pub fn height(&self) -> u32 {
        self.level().tile_height_at(self.coord.y)
    }

    pub fn level_width(&self) -> u32 {
        self.level().width()
    }

    pub fn level_height(&self) -> u32 {
        self.level().height()
    }

    pub fn at_top_level(&self) -> bool {
        self.coord.z == 0
    }

    pub fn at_bottom_level(&self) -> bool {
        self.coord.z + 1 == self.geometry.levels().len()
    }

    pub fn at_top_edge(&self) -> bool {
        self.coord.y == 0
    }

    pub fn at_bottom_edge(&self) -> bool {
        self.coord.y + 1 == self.level().num_vertical_tiles()
    }

    pub fn at_left_edge(&self) -> bool {
        self.coord.x == 0
    }

    pub fn at_right_edge(&self) -> bool {
        self.coord.x + 1 == self.level().num_horizontal_tiles()
    }

    // Padding only ever extends under the neighbour that stacks above.
    pub fn pad_top(&self) -> bool {
        false
    }

    pub fn pad_bottom(&self) -> bool {
        !self.at_bottom_edge()
    }

    pub fn pad_left(&self) -> bool {
        false
    }

    pub fn pad_right(&self) -> bool {
        !self.at_right_edge()
    }

    /// Horizontal centre in normalized coordinates, with 0 at the image centre.
    pub fn center_x(&self) -> f64 {
        let level = self.level();
        let x = self.coord.x as f64 * level.tile_width() as f64;
        (x + 0.5 * self.width() as f64) / level.width() as f64 - 0.5
    }

    /// Vertical centre in normalized coordinates, increasing upwards.
    pub fn center_y(&self) -> f64 {
        let level = self.level();
        let y = self.coord.y as f64 * level.tile_height() as f64;
        0.5 - (y + 0.5 * self.height() as f64) / level.height() as f64
    }

    pub fn scale_x(&self) -> f64 {
        self.width() as f64 / self.level_width() as f64
    }

    pub fn scale_y(&self) -> f64 {
        self.height() as f64 / self.level_height() as f64
    }

    /// Rotation of the tile's face around the x axis.
    pub fn rot_x(&self) -> f64 {
        self.coord.face.map_or(0.0, |face| cube::face_rotation(face).0)
    }

    /// Rotation of the tile's face around the y axis.
    pub fn rot_y(&self) -> f64 {
        self.coord.face.map_or(0.0, |face| cube::face_rotation(face).1)
    }

    /// Corners in world space: top-left, top-right, bottom-right, bottom-left.
    ///
    /// Equirectangular tiles wrap the whole sphere and have no corners.
    pub fn vertices(&self) -> Option<[Vector3<f64>; 4]> {
        match self.geometry.kind() {
            GeometryKind::Flat => Some(flat::vertices(self)),
            GeometryKind::Cube => Some(cube::vertices(self)),
            GeometryKind::Equirect => None,
        }
    }

    /// The tile at the next coarser level covering this one.
    pub fn parent(&self) -> Option<Tile> {
        if self.at_top_level() {
            return None;
        }
        let level = self.level();
        let parent_level = &self.geometry.levels()[self.coord.z - 1];
        let x = parent_index(
            self.coord.x,
            (level.width(), level.tile_width()),
            (parent_level.width(), parent_level.tile_width()),
        );
        let y = parent_index(
            self.coord.y,
            (level.height(), level.tile_height()),
            (parent_level.height(), parent_level.tile_height()),
        );
        let coord = TileCoord::new(self.coord.face, x, y, self.coord.z - 1);
        Some(self.geometry.tile_at(coord))
    }

    /// The tiles at the next finer level covered by this one.
    pub fn children(&self) -> Option<Vec<Tile>> {
        if self.at_bottom_level() {
            return None;
        }
        let level = self.level();
        let child_level = &self.geometry.levels()[self.coord.z + 1];
        let xs = child_range(
            self.coord.x,
            (level.width(), level.tile_width()),
            (child_level.width(), child_level.tile_width()),
        );
        let ys = child_range(
            self.coord.y,
            (level.height(), level.tile_height()),
            (child_level.height(), child_level.tile_height()),
        );
        let mut children = Vec::with_capacity(xs.len() * ys.len());
        for y in ys {
            for x in xs.clone() {
                let coord = TileCoord::new(self.coord.face, x, y, self.coord.z + 1);
                children.push(self.geometry.tile_at(coord));
            }
        }
        Some(children)
    }

    /// Adjacent tiles at the same level. Edge tiles have fewer neighbours.
    pub fn neighbors(&self) -> Vec<Tile> {
        self.geometry
            .neighbor_coords(self.coord)
            .into_iter()
            .map(|coord| self.geometry.tile_at(coord))
            .collect()
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord && self.geometry.id() == other.geometry.id()
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coord.hash(state);
    }
}

impl Ord for Tile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.coord
            .cmp(&other.coord)
            .then(self.geometry.id().cmp(&other.geometry.id()))
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("kind", &self.geometry.kind())
            .field("face", &self.coord.face)
            .field("x", &self.coord.x)
            .field("y", &self.coord.y)
            .field("z", &self.coord.z)
            .finish()
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coord.face {
            Some(face) => write!(f, "{}/{}/{}/{}", self.coord.z, face, self.coord.y, self.coord.x),
            None => write!(f, "{}/{}/{}", self.coord.z, self.coord.y, self.coord.x),
        }
    }
}

//! Tiled partitions of an image across resolution levels
//!
//! A [`Geometry`] owns an ordered list of [`Level`]s, coarsest first, and
//! knows how each level is cut into [`Tile`]s. Three layouts are supported:
//! flat images, cube maps and equirectangular panoramas. Tiles reference
//! their geometry, so they can compute neighbours, parents and children on
//! their own.

mod cube;
mod equirect;
mod flat;
mod level;
mod search;
mod tile;

pub use self::level::{Level, LevelSpec};
pub use self::search::TileSearcher;
pub use self::tile::{CubeFace, Tile, TileCoord};

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collections::LruMap;
use crate::core::constants::{MAX_LEVELS, NEIGHBORS_CACHE_SIZE};
use crate::view::View;
use crate::{Error, Result};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Tag identifying the tile layout of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Cube,
    Equirect,
    Flat,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Cube => "cube",
            GeometryKind::Equirect => "equirect",
            GeometryKind::Flat => "flat",
        };
        f.write_str(name)
    }
}

struct GeometryInner {
    id: u64,
    kind: GeometryKind,
    levels: Vec<Level>,
    selectable: Vec<Level>,
    neighbors: RefCell<LruMap<TileCoord, Vec<TileCoord>>>,
    searcher: RefCell<TileSearcher>,
}

/// A multi-resolution tiling of an image. Cloning shares the same geometry.
#[derive(Clone)]
pub struct Geometry {
    inner: Rc<GeometryInner>,
}

impl Geometry {
    pub fn flat(levels: impl IntoIterator<Item = LevelSpec>) -> Result<Self> {
        Self::new(GeometryKind::Flat, levels)
    }

    pub fn cube(levels: impl IntoIterator<Item = LevelSpec>) -> Result<Self> {
        Self::new(GeometryKind::Cube, levels)
    }

    pub fn equirect(levels: impl IntoIterator<Item = LevelSpec>) -> Result<Self> {
        Self::new(GeometryKind::Equirect, levels)
    }

    /// Build a geometry, sorting the levels by width and validating that each
    /// level subdivides the previous one.
    pub fn new(kind: GeometryKind, levels: impl IntoIterator<Item = LevelSpec>) -> Result<Self> {
        let mut specs: Vec<LevelSpec> = levels.into_iter().collect();
        if specs.is_empty() {
            return Err(Error::InvalidLevels("level list is empty".into()));
        }
        if specs.len() > MAX_LEVELS {
            return Err(Error::InvalidLevels(format!(
                "too many levels: {} (at most {MAX_LEVELS})",
                specs.len()
            )));
        }
        if let Some(spec) = specs
            .iter()
            .find(|s| s.width == 0 || s.height == 0 || s.tile_width == 0 || s.tile_height == 0)
        {
            return Err(Error::InvalidLevels(format!(
                "level dimensions must be positive: {spec:?}"
            )));
        }
        specs.sort_by_key(|spec| spec.width);

        for pair in specs.windows(2) {
            match kind {
                GeometryKind::Flat => flat::validate_with_parent(&pair[1], &pair[0])?,
                GeometryKind::Cube => cube::validate_with_parent(&pair[1], &pair[0])?,
                GeometryKind::Equirect => {}
            }
        }

        let levels: Vec<Level> = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Level::new(index, spec))
            .collect();
        let selectable: Vec<Level> = levels
            .iter()
            .filter(|level| !level.fallback_only())
            .copied()
            .collect();
        if selectable.is_empty() {
            return Err(Error::InvalidLevels("no selectable levels in list".into()));
        }

        Ok(Self {
            inner: Rc::new(GeometryInner {
                id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                levels,
                selectable,
                neighbors: RefCell::new(LruMap::new(NEIGHBORS_CACHE_SIZE)),
                searcher: RefCell::new(TileSearcher::new()),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> GeometryKind {
        self.inner.kind
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[Level] {
        &self.inner.levels
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.inner.levels.get(index)
    }

    /// Levels eligible for selection as the preferred level.
    pub fn selectable_levels(&self) -> &[Level] {
        &self.inner.selectable
    }

    /// Largest tile dimension across all levels.
    pub fn max_tile_size(&self) -> u32 {
        self.inner
            .levels
            .iter()
            .map(|level| level.tile_width().max(level.tile_height()))
            .max()
            .unwrap_or(0)
    }

    /// Look up a tile, checking that its position exists in this geometry.
    pub fn tile(&self, face: Option<CubeFace>, x: u32, y: u32, z: usize) -> Result<Tile> {
        let level = self
            .level(z)
            .ok_or_else(|| Error::InvalidArgument(format!("level {z} out of range")))?;
        let face_ok = match self.kind() {
            GeometryKind::Cube => face.is_some(),
            _ => face.is_none(),
        };
        if !face_ok || x >= level.num_horizontal_tiles() || y >= level.num_vertical_tiles() {
            return Err(Error::InvalidArgument(format!(
                "no tile at {face:?}/{x}/{y}/{z} in {} geometry",
                self.kind()
            )));
        }
        Ok(self.tile_at(TileCoord::new(face, x, y, z)))
    }

    pub(crate) fn tile_at(&self, coord: TileCoord) -> Tile {
        Tile::new(self.clone(), coord)
    }

    /// Every tile of a level, regardless of visibility.
    pub fn level_tiles(&self, level: &Level) -> Vec<Tile> {
        let faces: Vec<Option<CubeFace>> = match self.kind() {
            GeometryKind::Cube => CubeFace::ALL.into_iter().map(Some).collect(),
            _ => vec![None],
        };
        let mut tiles = Vec::new();
        for face in faces {
            for y in 0..level.num_vertical_tiles() {
                for x in 0..level.num_horizontal_tiles() {
                    tiles.push(self.tile_at(TileCoord::new(face, x, y, level.index())));
                }
            }
        }
        tiles
    }

    /// Append the tiles of `level` visible in `view` to `out`, returning how
    /// many were added. An empty viewport yields no tiles.
    pub fn visible_tiles(&self, view: &View, level: &Level, out: &mut Vec<Tile>) -> Result<usize> {
        let size = view.size();
        if size.width <= 0.0 || size.height <= 0.0 {
            return Ok(0);
        }

        let start = match (self.kind(), view) {
            (GeometryKind::Equirect, View::Rectilinear(_)) => {
                return Ok(equirect::visible_tiles(self, level, out));
            }
            (GeometryKind::Flat, View::Flat(flat_view)) => {
                flat::closest_tile(self, flat_view, level)
            }
            (GeometryKind::Cube, View::Rectilinear(rectilinear)) => {
                cube::closest_tile(self, rectilinear, level)
            }
            (kind, view) => {
                return Err(Error::Capability(format!(
                    "{kind} geometry cannot be viewed with a {} view",
                    view.kind()
                )));
            }
        };

        let count = self.inner.searcher.borrow_mut().search(view, start, out);
        if count == 0 {
            return Err(Error::Consistency("starting tile is not visible".into()));
        }
        Ok(count)
    }

    pub(crate) fn neighbor_coords(&self, coord: TileCoord) -> Vec<TileCoord> {
        if let Some(cached) = self.inner.neighbors.borrow().get(&coord) {
            return cached.clone();
        }
        let neighbors = match self.kind() {
            GeometryKind::Flat => flat::neighbors(self, coord),
            GeometryKind::Cube => cube::neighbors(self, coord),
            GeometryKind::Equirect => Vec::new(),
        };
        self.inner
            .neighbors
            .borrow_mut()
            .set(coord, neighbors.clone());
        neighbors
    }
}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Geometry")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("levels", &self.inner.levels.len())
            .finish()
    }
}

use fxhash::FxHashSet;

use super::Tile;
use crate::view::View;

/// Depth-first flood fill over tile adjacency, keeping tiles the view intersects.
///
/// The visible region of a level is connected through `neighbors()`, so
/// starting from any visible tile reaches all of them. The stack and visited
/// set are kept between searches to reuse their allocations.
#[derive(Default)]
pub struct TileSearcher {
    stack: Vec<Tile>,
    visited: FxHashSet<Tile>,
}

impl TileSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every visible tile reachable from `start` to `out` and return
    /// how many were appended. Zero means `start` itself is not visible.
    pub fn search(&mut self, view: &View, start: Tile, out: &mut Vec<Tile>) -> usize {
        let mut count = 0;
        self.stack.push(start);

        while let Some(tile) = self.stack.pop() {
            if self.visited.contains(&tile) {
                continue;
            }
            let visible = tile
                .vertices()
                .map_or(true, |vertices| view.intersects(&vertices));
            if !visible {
                continue;
            }
            self.visited.insert(tile.clone());
            self.stack.extend(tile.neighbors());
            out.push(tile);
            count += 1;
        }

        self.visited.clear();
        self.stack.clear();
        count
    }
}

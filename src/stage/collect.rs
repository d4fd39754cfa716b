//! Per-frame choice of the tiles to load and the tiles to draw.
//!
//! Tiles are drawn with depth testing and alpha blending, with depth growing
//! as resolution falls. Drawing finer tiles first lets a coarser fallback fail
//! the depth test wherever a finer tile already covers it, so overlapping
//! semi-transparent fallbacks never blend with each other. The render list is
//! therefore sorted finest first, while the load list is sorted coarsest
//! first.

use fxhash::FxHashSet;

use crate::geometry::Tile;
use crate::stage::Layer;
use crate::tiles::TextureStore;
use crate::Result;

#[derive(Debug, Default)]
pub struct TileCollector {
    progressive: bool,
    visible: Vec<Tile>,
    to_load: Vec<Tile>,
    to_render: Vec<Tile>,
    load_set: FxHashSet<Tile>,
    render_set: FxHashSet<Tile>,
}

impl TileCollector {
    /// With `progressive` set, every ancestor of a visible tile is loaded too,
    /// so coarse levels fill in first.
    pub fn new(progressive: bool) -> Self {
        Self {
            progressive,
            ..Default::default()
        }
    }

    pub fn progressive(&self) -> bool {
        self.progressive
    }

    pub fn set_progressive(&mut self, progressive: bool) {
        self.progressive = progressive;
    }

    /// Tiles to mark in the store, coarsest first.
    pub fn to_load(&self) -> &[Tile] {
        &self.to_load
    }

    /// Tiles to draw, finest first. All of them have a texture.
    pub fn to_render(&self) -> &[Tile] {
        &self.to_render
    }

    /// Collect the tiles of `layer` for one frame. Returns `true` when every
    /// visible tile has its own texture.
    pub fn collect(&mut self, layer: &Layer) -> Result<bool> {
        let mut visible = std::mem::take(&mut self.visible);
        visible.clear();
        let result = layer.visible_tiles(&mut visible);
        let stable = result.map(|_| self.collect_tiles(&visible, layer.texture_store()));
        self.visible = visible;
        stable
    }

    /// Run the fallback search over an explicit set of visible tiles.
    pub fn collect_tiles(&mut self, visible: &[Tile], store: &TextureStore) -> bool {
        self.to_load.clear();
        self.to_render.clear();
        self.load_set.clear();
        self.render_set.clear();

        let mut stable = true;
        for tile in visible {
            self.collect_to_load(tile);
            let needs_fallback = if store.has_texture(tile) {
                self.collect_to_render(tile);
                false
            } else {
                stable = false;
                self.collect_children(tile, store)
            };
            self.collect_parents(tile, store, needs_fallback);
        }

        self.to_load.sort();
        self.to_render.sort_by(|a, b| b.cmp(a));
        stable
    }

    /// Use loaded children as a fallback. Single-child chains are followed as
    /// deep as needed; otherwise only the immediate children are considered.
    /// Returns whether a fallback is still needed.
    fn collect_children(&mut self, tile: &Tile, store: &TextureStore) -> bool {
        let mut needs_fallback = true;
        let mut current = tile.clone();
        loop {
            let Some(children) = current.children() else {
                break;
            };
            needs_fallback = false;
            let single = children.len() == 1;
            for child in &children {
                if store.has_texture(child) {
                    self.collect_to_load(child);
                    self.collect_to_render(child);
                } else {
                    needs_fallback = true;
                }
            }
            match children.into_iter().last() {
                Some(last) if needs_fallback && single => current = last,
                _ => break,
            }
        }
        needs_fallback
    }

    /// Walk up the parents, loading each of them in progressive mode and
    /// drawing the nearest loaded one when a fallback is still needed.
    fn collect_parents(&mut self, tile: &Tile, store: &TextureStore, mut needs_fallback: bool) {
        let mut needs_loading = self.progressive;
        let mut current = tile.clone();
        while needs_loading || needs_fallback {
            let Some(parent) = current.parent() else {
                break;
            };
            current = parent;
            if needs_fallback {
                if store.has_texture(&current) {
                    self.collect_to_render(&current);
                    needs_fallback = false;
                } else if !self.progressive {
                    continue;
                }
            }
            // An ancestor that was already collected has had its own
            // ancestors collected as well.
            if !self.collect_to_load(&current) {
                needs_loading = false;
            }
        }
    }

    fn collect_to_load(&mut self, tile: &Tile) -> bool {
        collect_into(&mut self.to_load, &mut self.load_set, tile)
    }

    fn collect_to_render(&mut self, tile: &Tile) -> bool {
        collect_into(&mut self.to_render, &mut self.render_set, tile)
    }
}

fn collect_into(list: &mut Vec<Tile>, seen: &mut FxHashSet<Tile>, tile: &Tile) -> bool {
    if seen.contains(tile) {
        return false;
    }
    seen.insert(tile.clone());
    list.push(tile.clone());
    true
}

use crate::core::constants::{MAX_LAYERS, MAX_LEVELS};

/// Depth value for a tile of `tile_level` in the layer at `layer_depth`.
///
/// Layers closer to the top of the stack have a smaller depth, and within a
/// layer finer levels are nearer than coarser ones. The result lies in
/// `[0, 1]` for layer depths below `MAX_LAYERS` and levels below `MAX_LEVELS`,
/// which `Stage::add_layer` and `Geometry::new` enforce.
pub fn tile_depth(layer_depth: usize, tile_level: usize) -> f64 {
    let layer_step = MAX_LEVELS as f64;
    let range = (MAX_LAYERS * MAX_LEVELS) as f64;
    ((layer_depth as f64 + 1.0) * layer_step - tile_level as f64) / range
}

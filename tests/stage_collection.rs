mod common;

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;

use common::*;
use panolet::prelude::*;
use panolet::constants;
use panolet::rendering::tile_depth;
use panolet::stage::TileCollector;

/// Drawing a stage frame by frame while tiles arrive
#[cfg(test)]
mod stage_tests {
    use super::*;

    struct Scene {
        pool: LocalPool,
        source: Rc<ManualSource>,
        backend: Rc<MockBackend>,
        stage: Stage,
        layer: Layer,
        draws: Rc<RefCell<Vec<Draw>>>,
    }

    fn scene(progressive: bool) -> Scene {
        init_logging();
        let pool = LocalPool::new();
        let source = Rc::new(ManualSource::new());
        let backend = Rc::new(MockBackend::new(1));
        let draws = Rc::new(RefCell::new(Vec::new()));

        let mut stage = Stage::new(
            backend.clone(),
            &StageConfig {
                progressive,
                pixel_ratio: 1.0,
            },
        );
        stage.register_renderer(GeometryKind::Flat, ViewKind::Flat, recording_factory(&draws));
        stage.set_size(Size::new(512.0, 512.0));

        let store = store(source.clone(), backend.clone(), Rc::new(pool.spawner()), 16);
        let layer = Layer::new(source.clone(), two_level_flat(), flat_view(), store, LayerOptions::default());
        stage.add_layer(layer.clone(), None).unwrap();

        Scene {
            pool,
            source,
            backend,
            stage,
            layer,
            draws,
        }
    }

    fn render(scene: &mut Scene) -> Vec<(usize, f64)> {
        scene.stage.render().unwrap();
        scene.pool.run_until_stalled();
        let tiles = last_frame_tiles(&scene.draws.borrow());
        tiles
    }

    /// The stage reports unstable frames until every visible tile of the
    /// chosen level is loaded, drawing the coarse level in the meantime
    #[test]
    fn test_unstable_until_loaded() {
        let mut scene = scene(false);
        let stage_events = record(scene.stage.events());
        let layer_events = record(scene.layer.events());
        let coarse = scene.layer.geometry().tile(None, 0, 0, 0).unwrap();

        // A 512px viewport at zoom 1 needs the 512px level: four tiles.
        assert!(render(&mut scene).is_empty());
        assert_eq!(scene.source.pending_count(), 4);
        assert!(scene.source.requests.borrow().iter().all(|tile| tile.z() == 1));
        assert_eq!(
            stage_events.borrow().last(),
            Some(&StageEvent::RenderComplete { stable: false })
        );

        scene.layer.pin_first_level().unwrap();
        scene.pool.run_until_stalled();
        assert!(scene.source.succeed(&coarse));
        scene.pool.run_until_stalled();
        assert!(stage_events.borrow().contains(&StageEvent::RenderInvalid));

        assert_eq!(render(&mut scene), vec![(0, tile_depth(1, 0))]);
        assert_eq!(
            layer_events.borrow().last(),
            Some(&LayerEvent::RenderComplete { stable: false })
        );

        assert_eq!(scene.source.succeed_all(), 4);
        scene.pool.run_until_stalled();
        let drawn = render(&mut scene);
        assert_eq!(drawn, vec![(1, tile_depth(1, 1)); 4]);
        assert_eq!(
            stage_events.borrow().last(),
            Some(&StageEvent::RenderComplete { stable: true })
        );
        assert_eq!(scene.backend.frames_started.get(), scene.backend.frames_ended.get());
    }

    /// Progressive mode requests the coarser ancestors of visible tiles too
    #[test]
    fn test_progressive_loads_ancestors() {
        let mut scene = scene(true);
        render(&mut scene);
        assert_eq!(scene.source.pending_count(), 5);
        let requests = scene.source.requests.borrow();
        assert_eq!(requests.iter().filter(|tile| tile.z() == 0).count(), 1);
    }

    #[test]
    fn test_empty_stage_size_draws_nothing() {
        let mut scene = scene(false);
        scene.stage.set_size(Size::new(0.0, 512.0));
        scene.stage.render().unwrap();
        assert!(scene.draws.borrow().is_empty());
        assert_eq!(scene.backend.frames_started.get(), 0);
        assert_eq!(scene.backend.sizes.borrow().len(), 2);
    }

    #[test]
    fn test_layer_rect_limits_view_size() {
        let mut scene = scene(false);
        scene.layer.set_effects(Effects {
            opacity: 0.5,
            rect: Some(RectSpec {
                relative_width: Some(0.5),
                ..Default::default()
            }),
        });
        scene.stage.render().unwrap();
        assert_eq!(scene.layer.view().size(), Size::new(256.0, 512.0));
    }

    /// Lower layers are drawn further away
    #[test]
    fn test_layer_depth_follows_stack_order() {
        init_logging();
        let mut pool = LocalPool::new();
        let backend = Rc::new(MockBackend::new(7));
        let draws = Rc::new(RefCell::new(Vec::new()));
        let mut stage = Stage::new(backend.clone(), &StageConfig::default());
        stage.register_renderer(GeometryKind::Flat, ViewKind::Flat, recording_factory(&draws));
        stage.set_size(Size::new(256.0, 256.0));

        let make_layer = || {
            let source: Rc<dyn Source> = Rc::new(DirectSource);
            let store = store(source.clone(), backend.clone(), Rc::new(pool.spawner()), 16);
            let layer = Layer::new(source, two_level_flat(), flat_view(), store, LayerOptions::default());
            layer.set_fixed_level(Some(0)).unwrap();
            layer
        };
        let bottom = make_layer();
        let top = make_layer();
        stage.add_layer(top.clone(), None).unwrap();
        stage.add_layer(bottom.clone(), Some(0)).unwrap();

        stage.render().unwrap();
        pool.run_until_stalled();
        draws.borrow_mut().clear();
        stage.render().unwrap();

        let depths: Vec<f64> = draws
            .borrow()
            .iter()
            .filter_map(|draw| match draw {
                Draw::Tile { depth, .. } => Some(*depth),
                _ => None,
            })
            .collect();
        assert_eq!(depths, vec![tile_depth(2, 0), tile_depth(1, 0)]);
        assert!(depths[1] < depths[0]);

        stage.move_layer(&top, 0).unwrap();
        assert!(stage.layers().next().unwrap().ptr_eq(&top));

        stage.remove_layer(&bottom).unwrap();
        assert_eq!(stage.layer_count(), 1);
        assert_eq!(bottom.events().listener_count(), 0);
        assert!(matches!(stage.remove_layer(&bottom), Err(Error::InvalidArgument(_))));

        stage.remove_all_layers();
        assert_eq!(stage.layer_count(), 0);
    }

    #[test]
    fn test_add_layer_rejections() {
        init_logging();
        let pool = LocalPool::new();
        let backend = Rc::new(MockBackend::new(1).with_max_texture_size(1024));
        let draws = Rc::new(RefCell::new(Vec::new()));
        let mut stage = Stage::new(backend.clone(), &StageConfig::default());
        let layer_on = |backend: Rc<MockBackend>, geometry: Geometry| {
            let source: Rc<dyn Source> = Rc::new(DirectSource);
            let store = store(source.clone(), backend, Rc::new(pool.spawner()), 16);
            Layer::new(source, geometry, flat_view(), store, LayerOptions::default())
        };

        let layer = layer_on(backend.clone(), two_level_flat());
        assert!(matches!(
            stage.add_layer(layer.clone(), None),
            Err(Error::Capability(_))
        ));

        stage.register_renderer(GeometryKind::Flat, ViewKind::Flat, recording_factory(&draws));
        assert!(matches!(
            stage.add_layer(layer.clone(), Some(1)),
            Err(Error::InvalidArgument(_))
        ));
        stage.add_layer(layer.clone(), None).unwrap();
        assert!(matches!(
            stage.add_layer(layer.clone(), None),
            Err(Error::InvalidArgument(_))
        ));

        let foreign = layer_on(Rc::new(MockBackend::new(2)), two_level_flat());
        assert!(matches!(stage.add_layer(foreign, None), Err(Error::Capability(_))));

        let huge = Geometry::flat([LevelSpec::flat(4096, 4096, 2048, 2048)]).unwrap();
        let oversized = layer_on(backend, huge);
        assert!(matches!(stage.add_layer(oversized, None), Err(Error::Capability(_))));

        assert_eq!(stage.layer_count(), 1);
    }

    #[test]
    fn test_pixel_ratio_reaches_views() {
        let mut scene = scene(false);
        scene.stage.set_pixel_ratio(2.0);
        assert_eq!(scene.layer.view().pixel_ratio(), 2.0);
    }

    /// A store that cannot start a frame fails the render, and everything
    /// opened before it is closed again
    #[test]
    fn test_failed_frame_start_closes_opened_frames() {
        let mut scene = scene(false);
        let source: Rc<dyn Source> = Rc::new(DirectSource);
        let busy = store(source.clone(), scene.backend.clone(), Rc::new(scene.pool.spawner()), 16);
        let top = Layer::new(source, two_level_flat(), flat_view(), busy.clone(), LayerOptions::default());
        scene.stage.add_layer(top, None).unwrap();

        // Leave the top store in the middle of a frame of its own.
        let tile = scene.layer.geometry().tile(None, 0, 0, 0).unwrap();
        busy.start_frame().unwrap();
        busy.mark_tile(&tile).unwrap();

        assert!(matches!(scene.stage.render(), Err(Error::Sequence(_))));
        assert_eq!(scene.backend.frames_started.get(), 1);
        assert_eq!(scene.backend.frames_ended.get(), 1);

        let bottom = scene.layer.texture_store();
        assert!(matches!(bottom.mark_tile(&tile), Err(Error::Sequence(_))));
        bottom.start_frame().unwrap();
        bottom.end_frame().unwrap();

        busy.end_frame().unwrap();
        scene.stage.render().unwrap();
        assert_eq!(scene.backend.frames_ended.get(), 2);
    }

    #[test]
    fn test_layer_count_is_bounded() {
        let mut scene = scene(false);
        let source: Rc<dyn Source> = Rc::new(DirectSource);
        let make_layer = || {
            let store = store(source.clone(), scene.backend.clone(), Rc::new(scene.pool.spawner()), 16);
            Layer::new(source.clone(), two_level_flat(), flat_view(), store, LayerOptions::default())
        };

        while scene.stage.layer_count() < constants::MAX_LAYERS - 1 {
            scene.stage.add_layer(make_layer(), None).unwrap();
        }
        assert!(matches!(
            scene.stage.add_layer(make_layer(), None),
            Err(Error::Capability(_))
        ));
        assert_eq!(scene.stage.layer_count(), constants::MAX_LAYERS - 1);
    }
}

/// Fallback search over explicit sets of visible tiles
#[cfg(test)]
mod collector_tests {
    use super::*;

    fn loaded_store(pool: &mut LocalPool, tiles: &[&Tile]) -> TextureStore {
        let store = store(Rc::new(DirectSource), Rc::new(MockBackend::new(1)), Rc::new(pool.spawner()), 16);
        for tile in tiles {
            store.pin(tile).unwrap();
        }
        pool.run_until_stalled();
        store
    }

    /// Single-child chains are followed down to the first loaded descendant
    #[test]
    fn test_child_chain_fallback() {
        let mut pool = LocalPool::new();
        let geometry = Geometry::equirect([
            LevelSpec::equirect(512),
            LevelSpec::equirect(1024),
            LevelSpec::equirect(2048),
        ])
        .unwrap();
        let top = geometry.tile(None, 0, 0, 0).unwrap();
        let finest = geometry.tile(None, 0, 0, 2).unwrap();
        let store = loaded_store(&mut pool, &[&finest]);

        let mut collector = TileCollector::new(false);
        assert!(!collector.collect_tiles(&[top.clone()], &store));
        assert_eq!(collector.to_render(), &[finest.clone()]);
        assert_eq!(collector.to_load(), &[top, finest]);
    }

    /// With several children only the immediate level is considered
    #[test]
    fn test_multi_child_fallback_stops_at_first_level() {
        let mut pool = LocalPool::new();
        let geometry = Geometry::flat([
            LevelSpec::flat(256, 256, 256, 256),
            LevelSpec::flat(512, 512, 256, 256),
            LevelSpec::flat(1024, 1024, 256, 256),
        ])
        .unwrap();
        let top = geometry.tile(None, 0, 0, 0).unwrap();
        let grandchild = geometry.tile(None, 0, 0, 2).unwrap();
        let child = geometry.tile(None, 1, 1, 1).unwrap();
        let store = loaded_store(&mut pool, &[&grandchild]);

        let mut collector = TileCollector::new(false);
        assert!(!collector.collect_tiles(&[top.clone()], &store));
        assert!(collector.to_render().is_empty());

        // Partially loaded children are still drawn.
        let store = loaded_store(&mut pool, &[&child]);
        collector.collect_tiles(&[top.clone()], &store);
        assert_eq!(collector.to_render(), &[child.clone()]);
        assert_eq!(collector.to_load(), &[top, child]);
    }

    /// Finer tiles are drawn first, loads run coarse to fine
    #[test]
    fn test_parent_fallback_ordering() {
        let mut pool = LocalPool::new();
        let geometry = two_level_flat();
        let parent = geometry.tile(None, 0, 0, 0).unwrap();
        let children = geometry.tile(None, 0, 0, 0).unwrap().children().unwrap();
        let store = loaded_store(&mut pool, &[&parent, &children[0], &children[1], &children[2]]);

        let mut collector = TileCollector::new(false);
        assert!(!collector.collect_tiles(&children, &store));

        let levels: Vec<usize> = collector.to_render().iter().map(Tile::z).collect();
        assert_eq!(levels, vec![1, 1, 1, 0]);
        assert_eq!(collector.to_load().first(), Some(&parent));
        assert_eq!(collector.to_load().len(), 5);

        // Without a missing child the parent is neither drawn nor loaded.
        let store = loaded_store(&mut pool, &children.iter().collect::<Vec<_>>());
        assert!(collector.collect_tiles(&children, &store));
        assert_eq!(collector.to_render().len(), 4);
        assert_eq!(collector.to_load().len(), 4);
    }
}

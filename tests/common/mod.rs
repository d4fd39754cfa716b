//! Shared fixtures for the integration tests: an in-memory backend, a source
//! whose loads complete on demand, and a renderer that records what it draws.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::FutureExt;

use panolet::prelude::*;

pub type LoadResult<T> = std::result::Result<T, LoadError>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Record every event an emitter sends.
pub fn record<E: Clone + 'static>(emitter: &Emitter<E>) -> Rc<RefCell<Vec<E>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    emitter.add_listener(move |event: &E| sink.borrow_mut().push(event.clone()));
    events
}

pub struct MockTexture {
    pub refreshes: Rc<Cell<usize>>,
}

impl Texture for MockTexture {
    fn refresh(&mut self, _tile: &Tile, _asset: &Asset) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}

/// Backend that decodes every URL into a 1x1 image.
///
/// Results for `load_image` can be scripted per call with [`MockBackend::fail_next`];
/// unscripted calls succeed.
pub struct MockBackend {
    pub context: ContextId,
    pub max_texture_size: u32,
    pub requested_urls: RefCell<Vec<String>>,
    pub scripted: RefCell<VecDeque<LoadResult<()>>>,
    pub textures_created: Cell<usize>,
    pub frames_started: Cell<usize>,
    pub frames_ended: Cell<usize>,
    pub sizes: RefCell<Vec<Size>>,
    pub refreshes: Rc<Cell<usize>>,
}

impl MockBackend {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            max_texture_size: 4096,
            requested_urls: RefCell::new(Vec::new()),
            scripted: RefCell::new(VecDeque::new()),
            textures_created: Cell::new(0),
            frames_started: Cell::new(0),
            frames_ended: Cell::new(0),
            sizes: RefCell::new(Vec::new()),
            refreshes: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn fail_next(&self, error: LoadError) {
        self.scripted.borrow_mut().push_back(Err(error));
    }
}

impl Backend for MockBackend {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn load_image(&self, url: &str, _rect: Option<Rect>) -> LocalBoxFuture<'static, LoadResult<Asset>> {
        self.requested_urls.borrow_mut().push(url.to_string());
        let scripted = self.scripted.borrow_mut().pop_front().unwrap_or(Ok(()));
        async move {
            scripted?;
            Asset::from_rgba(1, 1, vec![255u8; 4])
        }
        .boxed_local()
    }

    fn create_texture(
        &self,
        _tile: &Tile,
        _asset: &Asset,
    ) -> LocalBoxFuture<'static, LoadResult<Box<dyn Texture>>> {
        self.textures_created.set(self.textures_created.get() + 1);
        let refreshes = self.refreshes.clone();
        async move { Ok(Box::new(MockTexture { refreshes }) as Box<dyn Texture>) }.boxed_local()
    }

    fn start_frame(&self) {
        self.frames_started.set(self.frames_started.get() + 1);
    }

    fn end_frame(&self) {
        self.frames_ended.set(self.frames_ended.get() + 1);
    }

    fn set_size(&self, size: Size) {
        self.sizes.borrow_mut().push(size);
    }
}

/// Source whose loads stay pending until the test resolves them.
#[derive(Default)]
pub struct ManualSource {
    pending: RefCell<HashMap<Tile, oneshot::Sender<LoadResult<Asset>>>>,
    pub requests: RefCell<Vec<Tile>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, tile: &Tile) -> bool {
        self.pending
            .borrow()
            .get(tile)
            .map_or(false, |sender| !sender.is_canceled())
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .borrow()
            .values()
            .filter(|sender| !sender.is_canceled())
            .count()
    }

    /// Complete the load of `tile`. Returns false if nobody is waiting for it.
    pub fn resolve(&self, tile: &Tile, result: LoadResult<Asset>) -> bool {
        match self.pending.borrow_mut().remove(tile) {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    pub fn succeed(&self, tile: &Tile) -> bool {
        self.resolve(tile, Asset::from_rgba(1, 1, vec![0u8; 4]))
    }

    /// Complete every pending load successfully.
    pub fn succeed_all(&self) -> usize {
        let pending: Vec<_> = self.pending.borrow_mut().drain().collect();
        pending
            .into_iter()
            .filter(|(_, sender)| !sender.is_canceled())
            .map(|(_, sender)| sender.send(Asset::from_rgba(1, 1, vec![0u8; 4])))
            .filter(|sent| sent.is_ok())
            .count()
    }
}

impl Source for ManualSource {
    fn load_asset(&self, _backend: &Rc<dyn Backend>, tile: &Tile) -> LocalBoxFuture<'static, LoadResult<Asset>> {
        let (sender, receiver) = oneshot::channel();
        self.requests.borrow_mut().push(tile.clone());
        self.pending.borrow_mut().insert(tile.clone(), sender);
        async move { receiver.await.unwrap_or(Err(LoadError::Cancelled)) }.boxed_local()
    }
}

/// Source that hands every tile straight to the backend.
pub struct DirectSource;

impl Source for DirectSource {
    fn load_asset(&self, backend: &Rc<dyn Backend>, tile: &Tile) -> LocalBoxFuture<'static, LoadResult<Asset>> {
        backend.load_image(&tile.to_string(), None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Draw {
    StartLayer,
    Tile { tile: String, z: usize, depth: f64 },
    EndLayer,
}

/// Renderer that logs every call into a shared list.
pub struct RecordingRenderer {
    pub log: Rc<RefCell<Vec<Draw>>>,
}

impl Renderer for RecordingRenderer {
    fn start_layer(&mut self, _layer: &Layer, _rect: &Rect) {
        self.log.borrow_mut().push(Draw::StartLayer);
    }

    fn render_tile(&mut self, tile: &Tile, _texture: &dyn Texture, _layer: &Layer, depth: f64) {
        self.log.borrow_mut().push(Draw::Tile {
            tile: tile.to_string(),
            z: tile.z(),
            depth,
        });
    }

    fn end_layer(&mut self, _layer: &Layer, _rect: &Rect) {
        self.log.borrow_mut().push(Draw::EndLayer);
    }
}

/// Factory for recording renderers that all share `log`.
pub fn recording_factory(log: &Rc<RefCell<Vec<Draw>>>) -> RendererFactory {
    let log = log.clone();
    Rc::new(move || Box::new(RecordingRenderer { log: log.clone() }) as Box<dyn Renderer>)
}

/// Drawn tiles of the last frame in `log`.
pub fn last_frame_tiles(log: &[Draw]) -> Vec<(usize, f64)> {
    let start = log
        .iter()
        .rposition(|draw| *draw == Draw::StartLayer)
        .unwrap_or(0);
    log[start..]
        .iter()
        .filter_map(|draw| match draw {
            Draw::Tile { z, depth, .. } => Some((*z, *depth)),
            _ => None,
        })
        .collect()
}

/// A flat image of 256x256 with a second level of 512x512, tiled by 256.
pub fn two_level_flat() -> Geometry {
    Geometry::flat([
        LevelSpec::flat(256, 256, 256, 256),
        LevelSpec::flat(512, 512, 256, 256),
    ])
    .unwrap()
}

pub fn flat_view() -> View {
    View::Flat(
        FlatView::new(
            FlatViewParams {
                media_aspect_ratio: Some(1.0),
                ..Default::default()
            },
            None,
        )
        .unwrap(),
    )
}

pub fn store(
    source: Rc<dyn Source>,
    backend: Rc<dyn Backend>,
    spawner: Rc<dyn Spawner>,
    cache_size: usize,
) -> TextureStore {
    TextureStore::new(
        source,
        backend,
        spawner,
        &TextureStoreConfig {
            previously_visible_cache_size: cache_size,
        },
    )
}

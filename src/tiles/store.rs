//! Texture cache for the tiles of one or more layers sharing a backend.
//!
//! A stage reports the visible tiles of each frame through a bracketed
//! protocol: one or more [`TextureStore::start_frame`] calls, any number of
//! [`TextureStore::mark_tile`] calls, then as many
//! [`TextureStore::end_frame`] calls as there were starts. Several layers may
//! share a store this way. When the last `end_frame` arrives the store works
//! out what changed:
//!
//! 1. tiles that were visible and were not marked this time are *no longer
//!    visible*; those with a texture move into a bounded LRU of previously
//!    visible tiles, those still loading are cancelled;
//! 2. marked tiles found in that LRU are *visible again* and leave it without
//!    being reloaded;
//! 3. tiles pushed out of the LRU are unloaded unless pinned;
//! 4. marked tiles with no cache entry start loading.
//!
//! A tile has a cache entry exactly while it is visible, previously visible or
//! pinned.

use fxhash::{FxHashMap, FxHashSet};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::loader::retry;
use super::{Asset, Source};
use crate::collections::LruSet;
use crate::core::config::TextureStoreConfig;
use crate::events::{Emitter, ListenerId};
use crate::geometry::Tile;
use crate::rendering::{Backend, Texture};
use crate::runtime::{spawn_cancellable, Spawner, TaskHandle};
use crate::{Error, LoadError, Result};

/// Per-item lifecycle tracing, compiled in with the `debug` feature.
macro_rules! trace_item {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug")]
        log::debug!($($arg)*);
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureStoreEvent {
    StartLoad(Tile),
    Load(Tile),
    Error(Tile, LoadError),
    Cancel(Tile),
    Unload(Tile),
    /// The content of a dynamic asset changed; the tile should be redrawn.
    Invalid(Tile),
}

/// Snapshot of what the store knows about a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileState {
    pub visible: bool,
    pub previously_visible: bool,
    pub loading: bool,
    pub has_asset: bool,
    pub has_texture: bool,
    pub pinned: bool,
    pub pin_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    Start,
    Mark,
    End,
}

struct Item {
    id: u64,
    task: Option<TaskHandle>,
    texture: Option<Box<dyn Texture>>,
    /// Kept only for dynamic assets.
    asset: Option<Asset>,
    refreshed_at: u64,
    change_listener: Option<ListenerId>,
}

impl Item {
    fn is_loading(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        if let (Some(asset), Some(listener)) = (&self.asset, self.change_listener) {
            if let Some(dynamic) = asset.as_dynamic() {
                dynamic.events().remove_listener(listener);
            }
        }
    }
}

struct StoreState {
    frame: FrameState,
    /// `start_frame` calls not yet matched by `end_frame`.
    outstanding: usize,
    next_item_id: u64,
    items: FxHashMap<Tile, Item>,
    visible: FxHashSet<Tile>,
    previously_visible: LruSet<Tile>,
    pinned: FxHashMap<Tile, usize>,
    new_visible: FxHashSet<Tile>,
}

struct StoreShared {
    source: Rc<dyn Source>,
    backend: Rc<dyn Backend>,
    spawner: Rc<dyn Spawner>,
    state: RefCell<StoreState>,
    events: Emitter<TextureStoreEvent>,
}

/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct TextureStore {
    shared: Rc<StoreShared>,
}

impl TextureStore {
    pub fn new(
        source: Rc<dyn Source>,
        backend: Rc<dyn Backend>,
        spawner: Rc<dyn Spawner>,
        config: &TextureStoreConfig,
    ) -> Self {
        Self {
            shared: Rc::new(StoreShared {
                source,
                backend,
                spawner,
                state: RefCell::new(StoreState {
                    frame: FrameState::Idle,
                    outstanding: 0,
                    next_item_id: 0,
                    items: FxHashMap::default(),
                    visible: FxHashSet::default(),
                    previously_visible: LruSet::new(config.previously_visible_cache_size),
                    pinned: FxHashMap::default(),
                    new_visible: FxHashSet::default(),
                }),
                events: Emitter::new(),
            }),
        }
    }

    pub fn source(&self) -> &Rc<dyn Source> {
        &self.shared.source
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.shared.backend
    }

    pub fn events(&self) -> &Emitter<TextureStoreEvent> {
        &self.shared.events
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &TextureStore) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn start_frame(&self) -> Result<()> {
        let mut state = self.shared.state.borrow_mut();
        if !matches!(state.frame, FrameState::Idle | FrameState::Start) {
            return Err(Error::Sequence("start_frame called out of sequence"));
        }
        state.frame = FrameState::Start;
        state.outstanding += 1;
        Ok(())
    }

    /// Declare `tile` visible in the current frame. A loaded dynamic asset is
    /// uploaded again if it changed since the last upload.
    pub fn mark_tile(&self, tile: &Tile) -> Result<()> {
        let mut state = self.shared.state.borrow_mut();
        if !matches!(state.frame, FrameState::Start | FrameState::Mark) {
            return Err(Error::Sequence("mark_tile called out of sequence"));
        }
        state.frame = FrameState::Mark;

        if let Some(item) = state.items.get_mut(tile) {
            if let (Some(texture), Some(asset)) = (item.texture.as_mut(), item.asset.as_ref()) {
                let timestamp = asset.timestamp();
                if timestamp != item.refreshed_at {
                    texture.refresh(tile, asset);
                    item.refreshed_at = timestamp;
                }
            }
        }

        if !state.new_visible.contains(tile) {
            state.new_visible.insert(tile.clone());
        }
        Ok(())
    }

    pub fn end_frame(&self) -> Result<()> {
        let mut events = Vec::new();
        {
            let mut state = self.shared.state.borrow_mut();
            if state.frame == FrameState::Idle {
                return Err(Error::Sequence("end_frame called out of sequence"));
            }
            state.frame = FrameState::End;
            state.outstanding -= 1;
            if state.outstanding == 0 {
                self.update(&mut state, &mut events)?;
                state.frame = FrameState::Idle;
            }
        }
        self.emit_all(events);
        Ok(())
    }

    fn update(&self, state: &mut StoreState, events: &mut Vec<TextureStoreEvent>) -> Result<()> {
        let no_longer_visible: Vec<Tile> = state
            .visible
            .iter()
            .filter(|tile| !state.new_visible.contains(*tile))
            .cloned()
            .collect();

        let visible_again: Vec<Tile> = state
            .new_visible
            .iter()
            .filter(|tile| state.previously_visible.contains(*tile))
            .cloned()
            .collect();
        for tile in &visible_again {
            state.previously_visible.remove(tile);
        }

        let mut evicted = Vec::new();
        for tile in no_longer_visible {
            let Some(item) = state.items.get(&tile) else {
                continue;
            };
            if item.texture.is_some() {
                if let Some(other) = state.previously_visible.add(tile) {
                    evicted.push(other);
                }
            } else if !state.pinned.contains_key(&tile) {
                self.unload_tile(state, &tile, events)?;
            }
        }

        for tile in evicted {
            if !state.pinned.contains_key(&tile) {
                self.unload_tile(state, &tile, events)?;
            }
        }

        let to_load: Vec<Tile> = state
            .new_visible
            .iter()
            .filter(|tile| !state.items.contains_key(*tile))
            .cloned()
            .collect();
        for tile in to_load {
            self.load_tile(state, tile, events)?;
        }

        std::mem::swap(&mut state.visible, &mut state.new_visible);
        state.new_visible.clear();
        Ok(())
    }

    fn load_tile(
        &self,
        state: &mut StoreState,
        tile: Tile,
        events: &mut Vec<TextureStoreEvent>,
    ) -> Result<()> {
        if state.items.contains_key(&tile) {
            return Err(Error::Consistency(format!(
                "loading texture already in cache: {tile}"
            )));
        }
        let id = state.next_item_id;
        state.next_item_id += 1;
        trace_item!("loading {id} {tile}");

        let source = self.shared.source.clone();
        let backend = self.shared.backend.clone();
        let store = Rc::downgrade(&self.shared);
        let task_tile = tile.clone();
        let task = spawn_cancellable(self.shared.spawner.as_ref(), async move {
            let result = load_texture(source, backend, &task_tile).await;
            complete_load(store, id, task_tile, result);
        });

        events.push(TextureStoreEvent::StartLoad(tile.clone()));
        let task = match task {
            Ok(task) => Some(task),
            Err(error) => {
                log::warn!("failed to start loading {tile}: {error}");
                events.push(TextureStoreEvent::Error(
                    tile.clone(),
                    LoadError::Backend(error.to_string()),
                ));
                None
            }
        };

        state.items.insert(
            tile,
            Item {
                id,
                task,
                texture: None,
                asset: None,
                refreshed_at: 0,
                change_listener: None,
            },
        );
        Ok(())
    }

    fn unload_tile(
        &self,
        state: &mut StoreState,
        tile: &Tile,
        events: &mut Vec<TextureStoreEvent>,
    ) -> Result<()> {
        let mut item = state.items.remove(tile).ok_or_else(|| {
            Error::Consistency(format!("unloading texture not in cache: {tile}"))
        })?;
        if let Some(task) = item.task.take() {
            task.cancel();
            trace_item!("cancel {} {tile}", item.id);
            events.push(TextureStoreEvent::Cancel(tile.clone()));
        } else {
            trace_item!("unload {} {tile}", item.id);
            events.push(TextureStoreEvent::Unload(tile.clone()));
        }
        Ok(())
    }

    /// Keep `tile` loaded regardless of visibility. Returns the new pin count.
    pub fn pin(&self, tile: &Tile) -> Result<usize> {
        let mut events = Vec::new();
        let count = {
            let mut state = self.shared.state.borrow_mut();
            let count = {
                let count = state.pinned.entry(tile.clone()).or_insert(0);
                *count += 1;
                *count
            };
            if !state.items.contains_key(tile) {
                self.load_tile(&mut state, tile.clone(), &mut events)?;
            }
            count
        };
        self.emit_all(events);
        Ok(count)
    }

    /// Release one pin. The tile is unloaded when the last pin goes and it is
    /// neither visible nor previously visible.
    pub fn unpin(&self, tile: &Tile) -> Result<usize> {
        let mut events = Vec::new();
        let count = {
            let mut state = self.shared.state.borrow_mut();
            let count = match state.pinned.get_mut(tile) {
                Some(count) => {
                    *count -= 1;
                    *count
                }
                None => return Err(Error::NotPinned(tile.to_string())),
            };
            if count == 0 {
                state.pinned.remove(tile);
                if !state.visible.contains(tile)
                    && !state.previously_visible.contains(tile)
                    && state.items.contains_key(tile)
                {
                    self.unload_tile(&mut state, tile, &mut events)?;
                }
            }
            count
        };
        self.emit_all(events);
        Ok(count)
    }

    /// Unload everything, pins included.
    pub fn clear(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.shared.state.borrow_mut();
            let tiles: Vec<Tile> = state.items.keys().cloned().collect();
            for tile in tiles {
                // Every key came from the map, so this cannot fail.
                let _ = self.unload_tile(&mut state, &tile, &mut events);
            }
            state.visible.clear();
            state.previously_visible.clear();
            state.pinned.clear();
            state.new_visible.clear();
        }
        self.emit_all(events);
    }

    /// Unload every tile that is not pinned.
    pub fn clear_not_pinned(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.shared.state.borrow_mut();
            let tiles: Vec<Tile> = state
                .items
                .keys()
                .filter(|tile| !state.pinned.contains_key(*tile))
                .cloned()
                .collect();
            for tile in tiles {
                let _ = self.unload_tile(&mut state, &tile, &mut events);
            }
            state.visible.clear();
            state.previously_visible.clear();
        }
        self.emit_all(events);
    }

    pub fn query(&self, tile: &Tile) -> TileState {
        let state = self.shared.state.borrow();
        let item = state.items.get(tile);
        let pin_count = state.pinned.get(tile).copied().unwrap_or(0);
        TileState {
            visible: state.visible.contains(tile),
            previously_visible: state.previously_visible.contains(tile),
            loading: item.map_or(false, Item::is_loading),
            has_asset: item.map_or(false, |item| item.asset.is_some()),
            has_texture: item.map_or(false, |item| item.texture.is_some()),
            pinned: pin_count > 0,
            pin_count,
        }
    }

    pub fn has_texture(&self, tile: &Tile) -> bool {
        let state = self.shared.state.borrow();
        state
            .items
            .get(tile)
            .map_or(false, |item| item.texture.is_some())
    }

    /// Borrow the texture of a loaded tile. The store cannot be mutated while
    /// the borrow is held.
    pub fn texture(&self, tile: &Tile) -> Option<Ref<'_, dyn Texture>> {
        Ref::filter_map(self.shared.state.borrow(), |state| {
            state.items.get(tile).and_then(|item| item.texture.as_deref())
        })
        .ok()
    }

    /// The asset of a loaded tile, kept only when it is dynamic.
    pub fn asset(&self, tile: &Tile) -> Option<Asset> {
        let state = self.shared.state.borrow();
        state.items.get(tile).and_then(|item| item.asset.clone())
    }

    /// Number of tiles with a cache entry, loaded or loading.
    pub fn len(&self) -> usize {
        self.shared.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit_all(&self, events: Vec<TextureStoreEvent>) {
        for event in &events {
            self.shared.events.emit(event);
        }
    }
}

/// Fetch the asset, retrying network failures, then upload it.
async fn load_texture(
    source: Rc<dyn Source>,
    backend: Rc<dyn Backend>,
    tile: &Tile,
) -> std::result::Result<(Asset, Box<dyn Texture>), LoadError> {
    let asset = retry(|| source.load_asset(&backend, tile)).await?;
    let texture = backend.create_texture(tile, &asset).await?;
    Ok((asset, texture))
}

/// Record the outcome of a load. Results for items that were unloaded in the
/// meantime are dropped.
fn complete_load(
    store: Weak<StoreShared>,
    id: u64,
    tile: Tile,
    result: std::result::Result<(Asset, Box<dyn Texture>), LoadError>,
) {
    let Some(shared) = store.upgrade() else {
        return;
    };
    let event = {
        let mut state = shared.state.borrow_mut();
        let Some(item) = state.items.get_mut(&tile).filter(|item| item.id == id) else {
            return;
        };
        item.task = None;

        match result {
            Ok((asset, texture)) => {
                item.texture = Some(texture);
                if let Some(dynamic) = asset.as_dynamic() {
                    let weak = Rc::downgrade(&shared);
                    let changed = tile.clone();
                    item.change_listener = Some(dynamic.events().add_listener(move |_| {
                        if let Some(shared) = weak.upgrade() {
                            shared.events.emit(&TextureStoreEvent::Invalid(changed.clone()));
                        }
                    }));
                    item.refreshed_at = asset.timestamp();
                    item.asset = Some(asset);
                }
                trace_item!("load {id} {tile}");
                TextureStoreEvent::Load(tile)
            }
            Err(LoadError::Cancelled) => {
                trace_item!("cancel {id} {tile}");
                TextureStoreEvent::Cancel(tile)
            }
            Err(error) => {
                log::warn!("failed to load {tile}: {error}");
                TextureStoreEvent::Error(tile, error)
            }
        }
    };
    shared.events.emit(&event);
}

impl fmt::Debug for TextureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.state.try_borrow() {
            Ok(state) => f
                .debug_struct("TextureStore")
                .field("frame", &state.frame)
                .field("items", &state.items.len())
                .field("visible", &state.visible.len())
                .field("previously_visible", &state.previously_visible.len())
                .field("pinned", &state.pinned.len())
                .finish(),
            Err(_) => f.debug_struct("TextureStore").finish_non_exhaustive(),
        }
    }
}

//! Decoded pixel sources handed to the backend for texture creation.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::events::Emitter;
use crate::LoadError;

const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetEvent {
    /// The pixels of a dynamic asset changed.
    Change,
}

/// Immutable RGBA8 image.
#[derive(Clone)]
pub struct StaticAsset {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl StaticAsset {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

struct DynamicInner {
    width: Cell<u32>,
    height: Cell<u32>,
    pixels: RefCell<Vec<u8>>,
    timestamp: Cell<u64>,
    events: Emitter<AssetEvent>,
}

/// RGBA8 image whose content may change in place, such as a video frame.
///
/// Every change bumps the timestamp and emits [`AssetEvent::Change`].
/// Clones share the same pixels.
#[derive(Clone)]
pub struct DynamicAsset {
    inner: Rc<DynamicInner>,
}

impl DynamicAsset {
    pub fn width(&self) -> u32 {
        self.inner.width.get()
    }

    pub fn height(&self) -> u32 {
        self.inner.height.get()
    }

    pub fn pixels(&self) -> Ref<'_, [u8]> {
        Ref::map(self.inner.pixels.borrow(), Vec::as_slice)
    }

    pub fn timestamp(&self) -> u64 {
        self.inner.timestamp.get()
    }

    pub fn events(&self) -> &Emitter<AssetEvent> {
        &self.inner.events
    }

    /// Signal that the pixels were modified externally.
    pub fn mark_dirty(&self) {
        self.inner.timestamp.set(self.inner.timestamp.get() + 1);
        self.inner.events.emit(&AssetEvent::Change);
    }

    /// Replace the content, possibly with a different size.
    pub fn update(&self, width: u32, height: u32, pixels: Vec<u8>) -> Result<(), LoadError> {
        check_len(width, height, pixels.len())?;
        self.inner.width.set(width);
        self.inner.height.set(height);
        *self.inner.pixels.borrow_mut() = pixels;
        self.mark_dirty();
        Ok(())
    }
}

/// Pixel source for one tile.
#[derive(Clone)]
pub enum Asset {
    Static(StaticAsset),
    Dynamic(DynamicAsset),
}

impl Asset {
    /// Wrap RGBA8 pixels; the buffer must hold exactly `width * height` pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Result<Self, LoadError> {
        let pixels = pixels.into();
        check_len(width, height, pixels.len())?;
        Ok(Asset::Static(StaticAsset {
            width,
            height,
            pixels,
        }))
    }

    pub fn dynamic(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, LoadError> {
        check_len(width, height, pixels.len())?;
        Ok(Asset::Dynamic(DynamicAsset {
            inner: Rc::new(DynamicInner {
                width: Cell::new(width),
                height: Cell::new(height),
                pixels: RefCell::new(pixels),
                timestamp: Cell::new(0),
                events: Emitter::new(),
            }),
        }))
    }

    pub fn width(&self) -> u32 {
        match self {
            Asset::Static(asset) => asset.width(),
            Asset::Dynamic(asset) => asset.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Asset::Static(asset) => asset.height(),
            Asset::Dynamic(asset) => asset.height(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Asset::Dynamic(_))
    }

    /// Static assets never change and always report zero.
    pub fn timestamp(&self) -> u64 {
        match self {
            Asset::Static(_) => 0,
            Asset::Dynamic(asset) => asset.timestamp(),
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicAsset> {
        match self {
            Asset::Dynamic(asset) => Some(asset),
            Asset::Static(_) => None,
        }
    }
}

fn check_len(width: u32, height: u32, len: usize) -> Result<(), LoadError> {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    if len != expected {
        return Err(LoadError::UnsupportedSource(format!(
            "expected {expected} bytes of RGBA8 for {width}x{height}, got {len}"
        )));
    }
    Ok(())
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dynamic() { "Dynamic" } else { "Static" };
        f.debug_struct(kind)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

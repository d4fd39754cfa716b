//! Where tile pixels come from.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

use super::loader::WorkPool;
use super::Asset;
use crate::core::config::TileLoadingConfig;
use crate::core::constants::{CUBE_FACE_ORDER, DEFAULT_LOAD_CONCURRENCY, DEFAULT_RETRY_DELAY_MS};
use crate::events::Emitter;
use crate::geometry::{CubeFace, Tile};
use crate::rendering::Backend;
use crate::runtime::Spawner;
use crate::stage::Rect;
use crate::{Error, LoadError, Result};

/// Produces the asset for a tile.
pub trait Source {
    fn load_asset(
        &self,
        backend: &Rc<dyn Backend>,
        tile: &Tile,
    ) -> LocalBoxFuture<'static, std::result::Result<Asset, LoadError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A request failed with a network error and will be delayed on retry.
    NetworkError { url: String, error: LoadError },
}

/// Image location for a tile, optionally a normalized sub-rectangle of it.
#[derive(Debug, Clone, PartialEq)]
pub struct TileUrl {
    pub url: String,
    pub rect: Option<Rect>,
}

impl From<String> for TileUrl {
    fn from(url: String) -> Self {
        Self { url, rect: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUrlOptions {
    pub concurrency: usize,
    pub retry_delay: Duration,
    /// Single image holding every face of the coarsest cube level, stacked
    /// vertically.
    pub cube_map_preview_url: Option<String>,
    pub cube_map_preview_face_order: String,
}

impl Default for ImageUrlOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_LOAD_CONCURRENCY,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            cube_map_preview_url: None,
            cube_map_preview_face_order: CUBE_FACE_ORDER.to_string(),
        }
    }
}

impl From<&TileLoadingConfig> for ImageUrlOptions {
    fn from(config: &TileLoadingConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            ..Default::default()
        }
    }
}

type TileToUrl = Box<dyn Fn(&Tile) -> TileUrl>;

struct ImageUrlInner {
    tile_to_url: TileToUrl,
    pool: WorkPool,
    retry_delay: Duration,
    timer: Rc<dyn Spawner>,
    failed_at: RefCell<FxHashMap<String, Instant>>,
    events: Emitter<SourceEvent>,
}

impl ImageUrlInner {
    /// Time left before `url` may be requested again.
    fn retry_wait(&self, url: &str) -> Option<Duration> {
        let mut failed_at = self.failed_at.borrow_mut();
        let elapsed = failed_at.get(url)?.elapsed();
        if elapsed < self.retry_delay {
            Some(self.retry_delay - elapsed)
        } else {
            failed_at.remove(url);
            None
        }
    }
}

/// Loads each tile from a URL through the backend.
///
/// At most `concurrency` images are requested at once. A URL that failed with
/// a network error is not requested again until `retry_delay` has passed,
/// measured by the executor behind `timer`.
#[derive(Clone)]
pub struct ImageUrlSource {
    inner: Rc<ImageUrlInner>,
}

impl ImageUrlSource {
    pub fn new(
        tile_to_url: impl Fn(&Tile) -> TileUrl + 'static,
        options: ImageUrlOptions,
        timer: Rc<dyn Spawner>,
    ) -> Result<Self> {
        Ok(Self {
            inner: Rc::new(ImageUrlInner {
                tile_to_url: Box::new(tile_to_url),
                pool: WorkPool::new(options.concurrency)?,
                retry_delay: options.retry_delay,
                timer,
                failed_at: RefCell::new(FxHashMap::default()),
                events: Emitter::new(),
            }),
        })
    }

    /// Build a source from a template such as `tiles/{z}/{f}/{y}/{x}.jpg`.
    pub fn from_template(
        template: &str,
        options: ImageUrlOptions,
        timer: Rc<dyn Spawner>,
    ) -> Result<Self> {
        let template = template.to_string();
        let Some(preview_url) = options.cube_map_preview_url.clone() else {
            return Self::new(move |tile| expand_template(&template, tile).into(), options, timer);
        };

        let face_order = parse_face_order(&options.cube_map_preview_face_order)?;
        Self::new(
            move |tile| match tile.face() {
                Some(face) if tile.z() == 0 => {
                    let index = face_order.iter().position(|f| *f == face).unwrap_or(0);
                    TileUrl {
                        url: preview_url.clone(),
                        rect: Some(Rect::new(0.0, index as f64 / 6.0, 1.0, 1.0 / 6.0)),
                    }
                }
                _ => expand_template(&template, tile).into(),
            },
            options,
            timer,
        )
    }

    pub fn url_for(&self, tile: &Tile) -> TileUrl {
        (self.inner.tile_to_url)(tile)
    }

    pub fn events(&self) -> &Emitter<SourceEvent> {
        &self.inner.events
    }
}

impl Source for ImageUrlSource {
    fn load_asset(
        &self,
        backend: &Rc<dyn Backend>,
        tile: &Tile,
    ) -> LocalBoxFuture<'static, std::result::Result<Asset, LoadError>> {
        let TileUrl { url, rect } = self.url_for(tile);
        let inner = self.inner.clone();
        let backend = backend.clone();

        async move {
            if let Some(wait) = inner.retry_wait(&url) {
                log::debug!("delaying retry of {url} by {wait:?}");
                inner.timer.delay(wait).await;
            }

            let result = inner.pool.run(|| backend.load_image(&url, rect)).await;
            match &result {
                Ok(_) => {
                    inner.failed_at.borrow_mut().remove(&url);
                }
                Err(error @ LoadError::Network(_)) => {
                    log::warn!("network error loading {url}: {error}");
                    inner
                        .failed_at
                        .borrow_mut()
                        .insert(url.clone(), Instant::now());
                    inner.events.emit(&SourceEvent::NetworkError {
                        url,
                        error: error.clone(),
                    });
                }
                Err(_) => {}
            }
            result
        }
        .boxed_local()
    }
}

impl fmt::Debug for ImageUrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUrlSource")
            .field("concurrency", &self.inner.pool.concurrency())
            .field("retry_delay", &self.inner.retry_delay)
            .finish()
    }
}

/// Substitute `{x}`, `{y}`, `{z}` and `{f}`. Geometries without faces
/// substitute an empty string for `{f}`.
pub fn expand_template(template: &str, tile: &Tile) -> String {
    let face = tile.face().map(|f| f.as_char().to_string()).unwrap_or_default();
    template
        .replace("{x}", &tile.x().to_string())
        .replace("{y}", &tile.y().to_string())
        .replace("{z}", &tile.z().to_string())
        .replace("{f}", &face)
}

fn parse_face_order(order: &str) -> Result<Vec<CubeFace>> {
    let faces: Vec<CubeFace> = order.chars().filter_map(CubeFace::from_char).collect();
    if faces.len() != 6 || order.chars().count() != 6 {
        return Err(Error::InvalidArgument(format!(
            "cube map preview face order must name six faces, got {order:?}"
        )));
    }
    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, LevelSpec};
    use futures::executor::LocalPool;

    fn timer() -> Rc<dyn Spawner> {
        Rc::new(LocalPool::new().spawner())
    }

    #[test]
    fn test_template_substitution() {
        let geometry = Geometry::cube([LevelSpec::cube(512, 512), LevelSpec::cube(1024, 512)]).unwrap();
        let tile = geometry.tile(Some(CubeFace::Left), 1, 0, 1).unwrap();
        assert_eq!(expand_template("t/{z}/{f}/{y}_{x}.jpg", &tile), "t/1/l/0_1.jpg");

        let flat = Geometry::flat([LevelSpec::flat(512, 512, 256, 256)]).unwrap();
        let tile = flat.tile(None, 1, 1, 0).unwrap();
        assert_eq!(expand_template("{z}-{f}-{x}{x}", &tile), "0--11");
    }

    #[test]
    fn test_cube_preview_slices_by_face() {
        let geometry = Geometry::cube([LevelSpec::cube(256, 256), LevelSpec::cube(1024, 512)]).unwrap();
        let source = ImageUrlSource::from_template(
            "{z}/{f}/{y}/{x}.jpg",
            ImageUrlOptions {
                cube_map_preview_url: Some("preview.jpg".into()),
                ..Default::default()
            },
            timer(),
        )
        .unwrap();

        let front = geometry.tile(Some(CubeFace::Front), 0, 0, 0).unwrap();
        let preview = source.url_for(&front);
        assert_eq!(preview.url, "preview.jpg");
        assert_eq!(preview.rect, Some(Rect::new(0.0, 2.0 / 6.0, 1.0, 1.0 / 6.0)));

        let detail = geometry.tile(Some(CubeFace::Front), 1, 1, 1).unwrap();
        assert_eq!(source.url_for(&detail), TileUrl::from("1/f/1/1.jpg".to_string()));
    }

    #[test]
    fn test_bad_face_order_is_rejected() {
        let result = ImageUrlSource::from_template(
            "{x}",
            ImageUrlOptions {
                cube_map_preview_url: Some("preview.jpg".into()),
                cube_map_preview_face_order: "bdfl".into(),
                ..Default::default()
            },
            timer(),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}

//! Configuration for cache sizes, loading and frame behavior
//!
//! Options can be built from a preset [`ViewerProfile`], assembled by hand, or
//! deserialized from JSON. Every section has serde defaults, so a document only
//! needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    DEFAULT_LOAD_CONCURRENCY, DEFAULT_RETRY_DELAY_MS, PREVIOUSLY_VISIBLE_CACHE_SIZE,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewerProfile {
    #[default]
    Balanced,
    LowMemory,
    HighQuality,
    Custom(ViewerOptions),
}

impl ViewerProfile {
    pub fn resolve(&self) -> ViewerOptions {
        match self {
            Self::Balanced => ViewerOptions {
                texture_store: TextureStoreConfig {
                    previously_visible_cache_size: PREVIOUSLY_VISIBLE_CACHE_SIZE,
                },
                loader: TileLoadingConfig {
                    concurrency: DEFAULT_LOAD_CONCURRENCY,
                    retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
                },
                stage: StageConfig {
                    progressive: false,
                    pixel_ratio: 1.0,
                },
                render_loop: FrameTimingConfig {
                    render_on_invalidate: true,
                },
            },
            Self::LowMemory => ViewerOptions {
                texture_store: TextureStoreConfig {
                    previously_visible_cache_size: 64,
                },
                loader: TileLoadingConfig {
                    concurrency: 2,
                    retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
                },
                stage: StageConfig {
                    progressive: false,
                    pixel_ratio: 1.0,
                },
                render_loop: FrameTimingConfig {
                    render_on_invalidate: true,
                },
            },
            Self::HighQuality => ViewerOptions {
                texture_store: TextureStoreConfig {
                    previously_visible_cache_size: 2048,
                },
                loader: TileLoadingConfig {
                    concurrency: 8,
                    retry_delay_ms: 5_000,
                },
                stage: StageConfig {
                    progressive: true,
                    pixel_ratio: 2.0,
                },
                render_loop: FrameTimingConfig {
                    render_on_invalidate: true,
                },
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    pub texture_store: TextureStoreConfig,
    pub loader: TileLoadingConfig,
    pub stage: StageConfig,
    pub render_loop: FrameTimingConfig,
}

impl ViewerOptions {
    /// Parse and validate options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.loader.concurrency == 0 {
            return Err(Error::InvalidArgument("loader concurrency must be positive".into()));
        }
        if !(self.stage.pixel_ratio.is_finite() && self.stage.pixel_ratio > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "pixel ratio must be a positive number, got {}",
                self.stage.pixel_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureStoreConfig {
    /// Textures kept for tiles that recently left the view. Zero disables the
    /// cache.
    pub previously_visible_cache_size: usize,
}

impl Default for TextureStoreConfig {
    fn default() -> Self {
        Self {
            previously_visible_cache_size: PREVIOUSLY_VISIBLE_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoadingConfig {
    pub concurrency: usize,
    pub retry_delay_ms: u64,
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_LOAD_CONCURRENCY,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub progressive: bool,
    pub pixel_ratio: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            progressive: false,
            pixel_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTimingConfig {
    pub render_on_invalidate: bool,
}

impl Default for FrameTimingConfig {
    fn default() -> Self {
        Self {
            render_on_invalidate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        let balanced = ViewerProfile::Balanced.resolve();
        let low_memory = ViewerProfile::LowMemory.resolve();
        let high_quality = ViewerProfile::HighQuality.resolve();

        assert_eq!(balanced, ViewerOptions::default());
        assert_eq!(balanced.texture_store.previously_visible_cache_size, 512);
        assert_eq!(balanced.loader.concurrency, 4);
        assert_eq!(balanced.loader.retry_delay_ms, 10_000);

        assert!(
            low_memory.texture_store.previously_visible_cache_size
                < balanced.texture_store.previously_visible_cache_size
        );
        assert!(high_quality.stage.progressive);

        let custom = ViewerProfile::Custom(low_memory.clone()).resolve();
        assert_eq!(custom, low_memory);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options = ViewerOptions::from_json(r#"{"loader": {"concurrency": 2}}"#).unwrap();
        assert_eq!(options.loader.concurrency, 2);
        assert_eq!(options.loader.retry_delay_ms, 10_000);
        assert_eq!(options.stage, StageConfig::default());

        let json = options.to_json().unwrap();
        assert_eq!(ViewerOptions::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        assert!(matches!(
            ViewerOptions::from_json(r#"{"loader": {"concurrency": 0}}"#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ViewerOptions::from_json("{not json"),
            Err(Error::Serialization(_))
        ));
    }
}

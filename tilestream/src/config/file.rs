//! Configuration file handling for ~/.tilestream/config.ini.

use std::fmt;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::defaults::*;
use crate::coord::{world_pixels, MAX_LAT, MAX_ZOOM, MIN_LAT, MIN_ZOOM};
use crate::fetch::FetchSettings;
use crate::gpu::SurfaceSize;
use crate::render::RenderSettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// A value could not be parsed
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Values parse but do not make sense together
    #[error("Invalid configuration: {0}")]
    Inconsistent(String),
}

/// Everything needed to run a map viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Tile server base URL with trailing `/`
    pub server_url: String,
    /// Tile image format, also used as the URL extension
    pub image_format: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Zoom level shown at startup
    pub zoom: i32,
    pub map_size: SurfaceSize,
    /// Map centre at startup (latitude, longitude)
    pub center: (f64, f64),
    pub tile_size: u32,
    /// Tile cache capacity in tiles
    pub cache_size: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            image_format: DEFAULT_IMAGE_FORMAT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            zoom: DEFAULT_ZOOM,
            map_size: SurfaceSize::new(DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT),
            center: (DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
            tile_size: DEFAULT_TILE_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl MapConfig {
    /// Load configuration from the default path (~/.tilestream/config.ini).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Check that the values can drive a viewer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server_url.ends_with('/') {
            return Err(ConfigError::Inconsistent(format!(
                "server URL '{}' must end with '/'",
                self.server_url
            )));
        }
        if self.image_format.is_empty() {
            return Err(ConfigError::Inconsistent(
                "image format must not be empty".to_string(),
            ));
        }
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.min_zoom)
            || !(MIN_ZOOM..=MAX_ZOOM).contains(&self.max_zoom)
            || self.min_zoom > self.max_zoom
        {
            return Err(ConfigError::Inconsistent(format!(
                "zoom range [{}, {}] must lie within [{}, {}]",
                self.min_zoom, self.max_zoom, MIN_ZOOM, MAX_ZOOM
            )));
        }
        if !(self.min_zoom..=self.max_zoom).contains(&self.zoom) {
            return Err(ConfigError::Inconsistent(format!(
                "start zoom {} is outside [{}, {}]",
                self.zoom, self.min_zoom, self.max_zoom
            )));
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Inconsistent(
                "tile size must be positive".to_string(),
            ));
        }
        // Pixel-space math is i32; the deepest zoom bounds the world width
        if let Err(e) = world_pixels(self.max_zoom, self.tile_size) {
            return Err(ConfigError::Inconsistent(format!(
                "tile size {} is too large for max zoom {}: {}",
                self.tile_size, self.max_zoom, e
            )));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Inconsistent(
                "cache size must be positive".to_string(),
            ));
        }
        if self.map_size.is_empty() {
            return Err(ConfigError::Inconsistent(format!(
                "map size {}x{} must not be empty",
                self.map_size.width, self.map_size.height
            )));
        }
        let (lat, lon) = self.center;
        if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ConfigError::Inconsistent(format!(
                "centre ({}, {}) is outside the Mercator world",
                lat, lon
            )));
        }
        Ok(())
    }

    /// Settings for the fetch worker.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            server_url: self.server_url.clone(),
            format: self.image_format.clone(),
            tile_size: self.tile_size,
        }
    }

    /// Settings for the render worker.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            tile_size: self.tile_size,
            cache_size: self.cache_size,
        }
    }
}

impl fmt::Display for MapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Server:        {}", self.server_url)?;
        writeln!(f, "  Image format:  {}", self.image_format)?;
        writeln!(f, "  Map centre:    [{}, {}]", self.center.0, self.center.1)?;
        writeln!(f, "  Zoom range:    [{}, {}]", self.min_zoom, self.max_zoom)?;
        writeln!(f, "  Start zoom:    {}", self.zoom)?;
        writeln!(
            f,
            "  Map size:      {} x {}",
            self.map_size.width, self.map_size.height
        )?;
        writeln!(f, "  Tile size:     {} pixels", self.tile_size)?;
        write!(f, "  Cache size:    {} tiles", self.cache_size)
    }
}

/// Get the path to the config directory (~/.tilestream).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilestream")
}

/// Get the path to the config file (~/.tilestream/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

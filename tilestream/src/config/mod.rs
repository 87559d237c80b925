//! Viewer configuration.
//!
//! [`MapConfig`] holds the tile server, zoom limits, viewport and cache
//! settings. Values come from built-in defaults, optionally overlaid by an
//! INI file (see [`MapConfig::load_from`]), and finally by command-line
//! options in the CLI.
//!
//! ```text
//! [server]
//! url = http://a.tile.openstreetmap.org/
//! format = png
//! user_agent = tilestream
//! timeout = 30
//!
//! [map]
//! min_zoom = 0
//! max_zoom = 19
//! zoom = 10
//! width = 1080
//! height = 720
//! latitude = 37.65175620758778
//! longitude = -122.20877392578124
//!
//! [tiles]
//! size = 256
//! cache_size = 256
//! ```

mod defaults;
mod file;
mod parser;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigError, MapConfig};

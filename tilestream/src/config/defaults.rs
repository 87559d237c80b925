//! Default configuration values.

/// OpenStreetMap's public tile server.
pub const DEFAULT_SERVER_URL: &str = "http://a.tile.openstreetmap.org/";

pub const DEFAULT_IMAGE_FORMAT: &str = "png";

/// Sent as the User-Agent of every tile request.
pub const DEFAULT_USER_AGENT: &str = "tilestream";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MIN_ZOOM: i32 = 0;

/// Highest level most public servers render.
pub const DEFAULT_MAX_ZOOM: i32 = 19;

pub const DEFAULT_ZOOM: i32 = 10;

pub const DEFAULT_MAP_WIDTH: u32 = 1080;
pub const DEFAULT_MAP_HEIGHT: u32 = 720;

pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Number of tiles the renderer keeps resident.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// San Francisco Bay.
pub const DEFAULT_LATITUDE: f64 = 37.65175620758778;
pub const DEFAULT_LONGITUDE: f64 = -122.20877392578124;

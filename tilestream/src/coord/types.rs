//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom range supported by the pixel-space math.
///
/// The world width in pixels is `2^zoom * tile_size`, which must fit an `i32`
/// for 256 pixel tiles.
pub const MIN_ZOOM: i32 = 0;
pub const MAX_ZOOM: i32 = 22;

/// Tile coordinates in the slippy map system.
///
/// Ordered by `(zoom, x, y)` and used as the key for the tile cache and for
/// in-flight request tracking. Coordinates are signed so that raster math can
/// produce cells left of the antimeridian or above the pole before they are
/// wrapped or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    zoom: i32,
    x: i32,
    y: i32,
}

impl TileCoordinate {
    /// Sentinel coordinate that never names a real tile.
    pub const INVALID: TileCoordinate = TileCoordinate {
        zoom: -1,
        x: -1,
        y: -1,
    };

    /// Create a new tile coordinate.
    pub const fn new(zoom: i32, x: i32, y: i32) -> Self {
        Self { zoom, x, y }
    }

    /// Get the zoom level.
    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    /// Get the tile column (X, increases eastward).
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Get the tile row (Y, increases southward).
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Returns true if this coordinate names a tile inside the world grid.
    pub fn is_valid(&self) -> bool {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            return false;
        }
        let n = tiles_per_side(self.zoom);
        (0..n).contains(&self.x) && (0..n).contains(&self.y)
    }

    /// The covering tile one zoom level up, if there is one.
    pub fn parent(&self) -> Option<TileCoordinate> {
        if self.zoom <= MIN_ZOOM {
            return None;
        }
        Some(TileCoordinate::new(
            self.zoom - 1,
            self.x.div_euclid(2),
            self.y.div_euclid(2),
        ))
    }

    /// The four tiles one zoom level down, in the order top-left, top-right,
    /// bottom-left, bottom-right.
    pub fn children(&self) -> [TileCoordinate; 4] {
        let (z, x, y) = (self.zoom + 1, self.x * 2, self.y * 2);
        [
            TileCoordinate::new(z, x, y),
            TileCoordinate::new(z, x + 1, y),
            TileCoordinate::new(z, x, y + 1),
            TileCoordinate::new(z, x + 1, y + 1),
        ]
    }

    /// Wrap the column into `[0, 2^zoom)` (longitudinal wraparound).
    ///
    /// Rows are never wrapped; there is nothing beyond the poles.
    pub fn wrapped(&self) -> TileCoordinate {
        TileCoordinate::new(self.zoom, wrap_x(self.zoom, self.x), self.y)
    }
}

impl Default for TileCoordinate {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one side of the world grid at `zoom`.
#[inline]
pub fn tiles_per_side(zoom: i32) -> i32 {
    debug_assert!((MIN_ZOOM..=MAX_ZOOM).contains(&zoom));
    1 << zoom
}

/// Wrap a tile column into the world grid at `zoom`.
#[inline]
pub fn wrap_x(zoom: i32, x: i32) -> i32 {
    x.rem_euclid(tiles_per_side(zoom))
}

/// A point in the pixel space of one zoom level (y grows southward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    InvalidZoom(i32),
    /// The world raster at this zoom and tile size is too wide for `i32`
    WorldTooLarge { zoom: i32, tile_size: u32 },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between {} and {})",
                    zoom, MIN_ZOOM, MAX_ZOOM
                )
            }
            CoordError::WorldTooLarge { zoom, tile_size } => {
                write!(
                    f,
                    "World raster at zoom {} with {} pixel tiles exceeds {} pixels",
                    zoom,
                    tile_size,
                    i32::MAX
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}

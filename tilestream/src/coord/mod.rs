//! Coordinate conversion module
//!
//! Provides the tile coordinate key shared by the cache and the fetch
//! pipeline, and conversions between geographic coordinates (latitude and
//! longitude) and the Web Mercator pixel space of a zoom level.

mod types;

pub use types::{
    tiles_per_side, wrap_x, CoordError, PixelPoint, TileCoordinate, MAX_LAT, MAX_LON, MAX_ZOOM,
    MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to a pixel position at `zoom`.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level
/// * `tile_size` - Tile edge length in pixels
///
/// # Returns
///
/// The pixel position within the `2^zoom * tile_size` square world raster,
/// or an error if inputs are invalid.
#[inline]
pub fn lat_lon_to_pixel(
    lat: f64,
    lon: f64,
    zoom: i32,
    tile_size: u32,
) -> Result<PixelPoint, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    let world = world_pixels(zoom, tile_size)? as f64;

    let x = (lon + 180.0) / 360.0 * world;
    let lat_rad = lat.to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * world;

    Ok(PixelPoint::new(x as i32, y as i32))
}

/// Converts a pixel position at `zoom` back to geographic coordinates.
///
/// Returns `(lat, lon)`. Pixels outside the world raster extrapolate along
/// the projection; callers wrap or clamp as needed.
#[inline]
pub fn pixel_to_lat_lon(point: PixelPoint, zoom: i32, tile_size: u32) -> (f64, f64) {
    let world = world_size(zoom, tile_size);

    let lon = point.x as f64 / world * 360.0 - 180.0;
    let y = point.y as f64 / world;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();

    (lat, lon)
}

/// Width (and height) of the world raster in pixels at `zoom`, if it fits
/// the `i32` pixel space.
pub fn world_pixels(zoom: i32, tile_size: u32) -> Result<i32, CoordError> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(CoordError::InvalidZoom(zoom));
    }
    i32::try_from((tile_size as i64) << zoom)
        .map_err(|_| CoordError::WorldTooLarge { zoom, tile_size })
}

/// Width (and height) of the world raster in pixels at `zoom`.
#[inline]
pub fn world_size(zoom: i32, tile_size: u32) -> f64 {
    2.0_f64.powi(zoom) * tile_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_island_is_world_centre() {
        let p = lat_lon_to_pixel(0.0, 0.0, 1, 256).unwrap();
        assert_eq!(p, PixelPoint::new(256, 256));
    }

    #[test]
    fn test_san_francisco_at_zoom_10() {
        // Tile 164/396 at zoom 10 covers the default start location
        let p = lat_lon_to_pixel(37.65175620758778, -122.20877392578124, 10, 256).unwrap();
        assert_eq!(p.x / 256, 164);
        assert_eq!(p.y / 256, 396);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = lat_lon_to_pixel(90.0, 0.0, 10, 256);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = lat_lon_to_pixel(0.0, 181.0, 10, 256);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = lat_lon_to_pixel(0.0, 0.0, MAX_ZOOM + 1, 256);
        assert!(matches!(result, Err(CoordError::InvalidZoom(_))));
    }

    #[test]
    fn test_world_pixels_limits() {
        assert_eq!(world_pixels(2, 16), Ok(64));
        assert_eq!(world_pixels(MAX_ZOOM, 256), Ok(1 << 30));
        assert_eq!(
            world_pixels(MAX_ZOOM, 512),
            Err(CoordError::WorldTooLarge {
                zoom: MAX_ZOOM,
                tile_size: 512
            })
        );
        assert_eq!(world_pixels(-1, 256), Err(CoordError::InvalidZoom(-1)));
    }

    #[test]
    fn test_oversized_world_is_an_error_not_a_clamp() {
        let result = lat_lon_to_pixel(0.0, 90.0, MAX_ZOOM, 1024);
        assert!(matches!(result, Err(CoordError::WorldTooLarge { .. })));

        // The far edge of the largest representable world still fits
        let p = lat_lon_to_pixel(0.0, 180.0, MAX_ZOOM, 256).unwrap();
        assert_eq!(p.x, 1 << 30);
    }

    #[test]
    fn test_roundtrip_at_different_zooms() {
        let lat = 51.5074; // London
        let lon = -0.1278;

        for zoom in [0, 5, 10, 15, 18] {
            let p = lat_lon_to_pixel(lat, lon, zoom, 256).unwrap();
            let (converted_lat, converted_lon) = pixel_to_lat_lon(p, zoom, 256);

            // One pixel of tolerance at this zoom level
            let pixel_degrees = 360.0 / world_size(zoom, 256);

            assert!(
                (converted_lat - lat).abs() < pixel_degrees * 2.0,
                "Zoom {}: lat diff {} exceeds one pixel",
                zoom,
                (converted_lat - lat).abs()
            );
            assert!(
                (converted_lon - lon).abs() < pixel_degrees * 2.0,
                "Zoom {}: lon diff {} exceeds one pixel",
                zoom,
                (converted_lon - lon).abs()
            );
        }
    }

    #[test]
    fn test_tile_coordinate_ordering() {
        let a = TileCoordinate::new(1, 5, 5);
        let b = TileCoordinate::new(2, 0, 0);
        let c = TileCoordinate::new(2, 0, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_tile_coordinate_default_is_sentinel() {
        let coord = TileCoordinate::default();
        assert_eq!(coord, TileCoordinate::INVALID);
        assert!(!coord.is_valid());
        assert_eq!(coord.to_string(), "[-1,-1,-1]");
    }

    #[test]
    fn test_parent_and_children() {
        let coord = TileCoordinate::new(3, 5, 2);
        assert_eq!(coord.parent(), Some(TileCoordinate::new(2, 2, 1)));
        assert_eq!(TileCoordinate::new(0, 0, 0).parent(), None);

        let children = coord.children();
        assert_eq!(children[0], TileCoordinate::new(4, 10, 4));
        assert_eq!(children[3], TileCoordinate::new(4, 11, 5));
        for child in children {
            assert_eq!(child.parent(), Some(coord));
        }
    }

    #[test]
    fn test_wrap_x_longitude() {
        assert_eq!(wrap_x(3, -1), 7);
        assert_eq!(wrap_x(3, 8), 0);
        assert_eq!(wrap_x(3, 7), 7);
        assert_eq!(
            TileCoordinate::new(3, -1, 2).wrapped(),
            TileCoordinate::new(3, 7, 2)
        );
    }

    #[test]
    fn test_is_valid_rejects_rows_past_the_poles() {
        assert!(TileCoordinate::new(2, 3, 3).is_valid());
        assert!(!TileCoordinate::new(2, 0, 4).is_valid());
        assert!(!TileCoordinate::new(2, 0, -1).is_valid());
    }
}

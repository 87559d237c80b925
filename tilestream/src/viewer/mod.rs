//! Headless map viewer.
//!
//! [`MapViewer`] wires a render worker and a fetch worker together and
//! translates viewer operations (resize, expose, pan, zoom at a point) into
//! viewport states for the renderer. The fetch worker's context is created
//! in the renderer's share group, so textures it uploads can be drawn
//! directly.
//!
//! Workers start on the first [`MapViewer::expose`] and are stopped by
//! [`MapViewer::shutdown`] (or on drop): renderer first, so the tiles it
//! releases on the way out reach the fetcher before the fetcher stops.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{ConfigError, MapConfig};
use crate::coord::{lat_lon_to_pixel, pixel_to_lat_lon, CoordError, PixelPoint};
use crate::fetch::{
    FetchMessage, ImageDecoder, ReqwestTransport, TileFetcher, TileTransport, TransportError,
};
use crate::gpu::{GpuContext, SurfaceSize};
use crate::render::{PixelRect, RendererHandle, TileRenderer, ViewportState};
use crate::worker::{ContextWorker, Mailbox, WorkerError, WorkerHandle};

/// Errors from building or driving a viewer.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid map centre: {0}")]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("failed to create HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// Owns the render and fetch workers and the viewport they show.
pub struct MapViewer {
    config: MapConfig,
    renderer: ContextWorker<TileRenderer>,
    fetcher: ContextWorker<TileFetcher>,
    render_handle: RendererHandle,
    fetch_handle: WorkerHandle<FetchMessage>,
    state: ViewportState,
    /// Map centre in the pixel space of the current zoom
    center: PixelPoint,
}

impl MapViewer {
    /// Build a viewer drawing into `context` and fetching over `transport`.
    ///
    /// The calling thread owns the workers; every other method must be
    /// called from it.
    pub fn new(
        config: MapConfig,
        context: Box<dyn GpuContext>,
        transport: Arc<dyn TileTransport>,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let (lat, lon) = config.center;
        let center = lat_lon_to_pixel(lat, lon, config.zoom, config.tile_size)?;

        let mut state = ViewportState::new();
        state.set_zoom(config.zoom);

        let render_box = Mailbox::new();
        let fetch_box = Mailbox::new();

        let (render_hooks, render_handle) = TileRenderer::new(
            config.render_settings(),
            render_box.handle(),
            fetch_box.handle(),
        );
        let fetch_hooks = TileFetcher::new(
            config.fetch_settings(),
            transport,
            Arc::new(ImageDecoder),
            fetch_box.handle(),
            render_box.handle(),
        );
        let fetch_handle = fetch_box.handle();

        // The renderer targets the caller's surface; the fetcher shares it
        let renderer = ContextWorker::new("tile-renderer", context, render_hooks, render_box);
        let fetcher = ContextWorker::shared("tile-fetcher", &renderer, fetch_hooks, fetch_box)?;

        Ok(Self {
            config,
            renderer,
            fetcher,
            render_handle,
            fetch_handle,
            state,
            center,
        })
    }

    /// Build a viewer that fetches tiles over HTTP.
    pub fn with_http(config: MapConfig, context: Box<dyn GpuContext>) -> Result<Self, ViewerError> {
        let transport = ReqwestTransport::new(&config.user_agent, config.request_timeout_secs)?;
        Self::new(config, context, Arc::new(transport))
    }

    /// Start both workers if they are not running yet.
    fn initialize(&mut self) -> Result<(), ViewerError> {
        if self.renderer.is_running() {
            return Ok(());
        }
        self.renderer.start()?;
        self.fetcher.start()?;
        info!(zoom = self.state.zoom(), "Map viewer started");
        Ok(())
    }

    /// The viewport changed size. Takes effect on the next update.
    pub fn resize(&mut self, size: SurfaceSize) {
        self.state.set_map_size(size);
        self.update_bounds();
        if !size.is_empty() {
            self.state.set_valid();
        }
    }

    /// The viewport became visible: start the workers and draw.
    pub fn expose(&mut self) -> Result<(), ViewerError> {
        self.initialize()?;
        self.render_handle.set_state(self.state);
        Ok(())
    }

    /// Move the map centre by (`dx`, `dy`) pixels, as a drag does.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.move_center(dx as i64, dy as i64);
        self.update_bounds();
        self.render_handle.set_state(self.state);
    }

    /// Centre on `point` (viewport pixels) and zoom in one level.
    pub fn zoom_in_at(&mut self, point: PixelPoint) {
        self.recenter_on(point);
        self.state
            .set_zoom((self.state.zoom() + 1).min(self.config.max_zoom));
        if self.state.zoomed_in() {
            self.set_center(self.center.x as i64 * 2, self.center.y as i64 * 2);
        }
        self.apply_zoom();
    }

    /// Centre on `point` (viewport pixels) and zoom out one level.
    pub fn zoom_out_at(&mut self, point: PixelPoint) {
        self.recenter_on(point);
        self.state
            .set_zoom((self.state.zoom() - 1).max(self.config.min_zoom));
        if self.state.zoomed_out() {
            self.set_center(self.center.x as i64 / 2, self.center.y as i64 / 2);
        }
        self.apply_zoom();
    }

    /// Abort every tile transfer in flight.
    pub fn cancel_requests(&self) {
        if self.fetch_handle.post(FetchMessage::Cancel).is_err() {
            debug!("Fetcher stopped, nothing to cancel");
        }
    }

    fn recenter_on(&mut self, point: PixelPoint) {
        let size = self.state.map_size();
        self.move_center(
            point.x as i64 - (size.width / 2) as i64,
            point.y as i64 - (size.height / 2) as i64,
        );
    }

    fn move_center(&mut self, dx: i64, dy: i64) {
        self.set_center(self.center.x as i64 + dx, self.center.y as i64 + dy);
    }

    /// Columns wrap around the world and rows stop at the poles, so the
    /// centre always fits the pixel space of the current zoom.
    fn set_center(&mut self, x: i64, y: i64) {
        let world = (self.config.tile_size as i64) << self.state.zoom();
        self.center = PixelPoint::new(x.rem_euclid(world) as i32, y.clamp(0, world) as i32);
    }

    fn apply_zoom(&mut self) {
        // Tiles for the old level are no longer worth downloading
        self.cancel_requests();
        self.update_bounds();
        self.render_handle.set_state(self.state);
        debug!(zoom = self.state.zoom(), "Zoom changed");
    }

    fn update_bounds(&mut self) {
        self.state
            .set_bounds(PixelRect::centered(self.center, self.state.map_size()));
    }

    /// The viewport state most recently handed to the renderer.
    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn zoom(&self) -> i32 {
        self.state.zoom()
    }

    /// Map centre in the pixel space of the current zoom.
    pub fn center(&self) -> PixelPoint {
        self.center
    }

    /// Map centre as (latitude, longitude).
    pub fn center_lat_lon(&self) -> (f64, f64) {
        pixel_to_lat_lon(self.center, self.state.zoom(), self.config.tile_size)
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn renderer(&self) -> &RendererHandle {
        &self.render_handle
    }

    /// Block until the renderer has drawn everything it was asked to and no
    /// tile is outstanding, or `timeout` elapses. Returns true if idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.render_handle.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Stop both workers, renderer first.
    pub fn shutdown(mut self) -> Result<(), ViewerError> {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> Result<(), ViewerError> {
        let rendered = self.renderer.stop();
        let fetched = self.fetcher.stop();
        rendered?;
        fetched?;
        Ok(())
    }
}

impl Drop for MapViewer {
    fn drop(&mut self) {
        if !self.renderer.is_running() && !self.fetcher.is_running() {
            return;
        }
        if let Err(e) = self.stop_workers() {
            error!(error = %e, "Map viewer did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{SoftwareContext, SoftwareSurface};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    /// Transport that never answers.
    struct Silent;

    impl TileTransport for Silent {
        fn get(&self, _url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
            futures::future::pending().boxed()
        }
    }

    fn config() -> MapConfig {
        MapConfig {
            center: (0.0, 0.0),
            zoom: 2,
            min_zoom: 1,
            max_zoom: 3,
            tile_size: 16,
            map_size: SurfaceSize::new(32, 32),
            ..MapConfig::default()
        }
    }

    fn viewer() -> MapViewer {
        let context = Box::new(SoftwareContext::new(SoftwareSurface::new()));
        MapViewer::new(config(), context, Arc::new(Silent)).unwrap()
    }

    #[test]
    fn test_initial_center_from_lat_lon() {
        let viewer = viewer();
        // Null island is the middle of a 4x4 grid of 16px tiles
        assert_eq!(viewer.center(), PixelPoint::new(32, 32));
        assert_eq!(viewer.zoom(), 2);
        assert!(!viewer.state().is_valid());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let context = Box::new(SoftwareContext::new(SoftwareSurface::new()));
        let config = MapConfig {
            cache_size: 0,
            ..config()
        };
        let result = MapViewer::new(config, context, Arc::new(Silent));
        assert!(matches!(result, Err(ViewerError::Config(_))));
    }

    #[test]
    fn test_resize_centres_bounds_and_validates() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(20, 10));

        assert!(viewer.state().is_valid());
        assert_eq!(viewer.state().bounds(), PixelRect::new(22, 27, 20, 10));
    }

    #[test]
    fn test_pan_moves_center() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.pan(5, -3);

        assert_eq!(viewer.center(), PixelPoint::new(37, 29));
        assert_eq!(viewer.state().bounds(), PixelRect::new(21, 13, 32, 32));
    }

    #[test]
    fn test_zoom_in_at_point_doubles_center() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        // 4px right of the viewport centre
        viewer.zoom_in_at(PixelPoint::new(20, 16));

        assert_eq!(viewer.zoom(), 3);
        assert!(viewer.state().zoomed_in());
        assert_eq!(viewer.center(), PixelPoint::new(72, 64));
    }

    #[test]
    fn test_zoom_is_clamped_and_keeps_scale() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.zoom_in_at(PixelPoint::new(16, 16));
        viewer.zoom_in_at(PixelPoint::new(16, 16));

        assert_eq!(viewer.zoom(), 3);
        assert!(!viewer.state().zoomed_in());
        assert_eq!(viewer.center(), PixelPoint::new(64, 64));
    }

    #[test]
    fn test_zoom_out_halves_center() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.zoom_out_at(PixelPoint::new(16, 16));

        assert_eq!(viewer.zoom(), 1);
        assert!(viewer.state().zoomed_out());
        assert_eq!(viewer.center(), PixelPoint::new(16, 16));
        let (lat, lon) = viewer.center_lat_lon();
        assert!(lat.abs() < 1e-9 && lon.abs() < 1e-9);
    }

    #[test]
    fn test_config_too_wide_for_pixel_space_is_rejected() {
        let context = Box::new(SoftwareContext::new(SoftwareSurface::new()));
        let config = MapConfig {
            tile_size: 1024,
            max_zoom: 22,
            zoom: 21,
            center: (0.0, 179.0),
            ..config()
        };
        let result = MapViewer::new(config, context, Arc::new(Silent));
        assert!(matches!(result, Err(ViewerError::Config(_))));
    }

    #[test]
    fn test_zoom_in_to_max_zoom_stays_in_pixel_space() {
        let context = Box::new(SoftwareContext::new(SoftwareSurface::new()));
        let config = MapConfig {
            tile_size: 256,
            max_zoom: 22,
            zoom: 21,
            center: (0.0, 179.0),
            ..config()
        };
        let mut viewer = MapViewer::new(config, context, Arc::new(Silent)).unwrap();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.zoom_in_at(PixelPoint::new(32, 32));
        viewer.zoom_in_at(PixelPoint::new(32, 32));

        assert_eq!(viewer.zoom(), 22);
        assert!(viewer.center().x < 1 << 30);
        let (lat, lon) = viewer.center_lat_lon();
        assert!(lat.abs() < 0.01, "lat {}", lat);
        assert!((lon - 179.0).abs() < 0.01, "lon {}", lon);
    }

    #[test]
    fn test_pan_wraps_columns_and_stops_at_the_poles() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        // The 4x4 world of 16px tiles is 64px wide
        viewer.pan(40, 100);
        assert_eq!(viewer.center(), PixelPoint::new(8, 64));

        viewer.pan(i32::MAX, i32::MIN);
        viewer.zoom_in_at(PixelPoint::new(16, 16));
        let center = viewer.center();
        assert!((0..128).contains(&center.x));
        assert_eq!(center.y, 0);
    }

    #[test]
    fn test_expose_starts_workers_and_shutdown_stops_them() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.expose().unwrap();
        viewer.expose().unwrap();

        // Tiles never arrive, so the renderer stays busy
        assert!(!viewer.wait_until_idle(Duration::from_millis(50)));
        let deadline = Instant::now() + Duration::from_secs(5);
        while viewer.renderer().stats().requests_issued() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        // 2x2 tiles of 16px cover the 32px viewport exactly
        assert_eq!(viewer.renderer().stats().requests_issued(), 4);
        viewer.shutdown().unwrap();
    }

    #[test]
    fn test_drop_stops_running_workers() {
        let mut viewer = viewer();
        viewer.resize(SurfaceSize::new(32, 32));
        viewer.expose().unwrap();
        drop(viewer);
    }
}

//! The render worker's hooks and the handle used to drive them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::selection::{select_tiles, RenderCache};
use super::state::ViewportState;
use super::stats::RendererStats;
use super::RenderMessage;
use crate::cache::TileCache;
use crate::coord::TileCoordinate;
use crate::fetch::FetchMessage;
use crate::gpu::{GpuContext, ProgramId};
use crate::tile::TileImage;
use crate::worker::{WorkerHandle, WorkerHooks};

/// Background colour behind missing tiles.
pub const CLEAR_COLOR: [f32; 4] = [0.85, 0.85, 0.85, 1.0];

/// Renderer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Edge length of one tile in pixels
    pub tile_size: u32,
    /// Maximum number of tiles kept in the cache
    pub cache_size: usize,
}

/// State shared between the renderer and whoever holds a [`RendererHandle`].
struct RenderShared {
    state: Mutex<ViewportState>,
    /// Set while a render pass is queued and has not started yet
    scheduled: AtomicBool,
    mailbox: WorkerHandle<RenderMessage>,
    stats: RendererStats,
}

impl RenderShared {
    fn set_state(&self, state: ViewportState) {
        let post = {
            let mut current = self.state.lock();
            *current = state;
            !self.scheduled.swap(true, Ordering::AcqRel)
        };
        if post {
            self.post_pass();
        }
    }

    /// Queue a render pass unless one is already queued.
    fn schedule(&self) {
        if !self.scheduled.swap(true, Ordering::AcqRel) {
            self.post_pass();
        }
    }

    fn post_pass(&self) {
        self.stats.record_pass_posted();
        if self.mailbox.post(RenderMessage::Render).is_err() {
            debug!("Renderer stopped, render pass dropped");
            self.stats.record_pass_finished();
        }
    }

    /// Read the state for a pass, clearing the scheduled flag so the next
    /// change queues a fresh pass.
    fn take_state(&self) -> ViewportState {
        let state = self.state.lock();
        self.scheduled.store(false, Ordering::Release);
        *state
    }
}

/// Cloneable handle for updating the renderer from any thread.
#[derive(Clone)]
pub struct RendererHandle {
    shared: Arc<RenderShared>,
}

impl RendererHandle {
    /// Replace the viewport state and make sure a pass will draw it.
    ///
    /// However many times this is called before the renderer gets to run,
    /// at most one pass is queued, and that pass sees the latest state.
    pub fn set_state(&self, state: ViewportState) {
        self.shared.set_state(state);
    }

    /// The most recently stored state.
    pub fn state(&self) -> ViewportState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> &RendererStats {
        &self.shared.stats
    }

    /// Returns true when no pass is queued or running and no tile is
    /// awaiting a response.
    pub fn is_idle(&self) -> bool {
        let stats = &self.shared.stats;
        // Pending is checked on both sides so a pass that starts or finishes
        // in between is not missed
        stats.pending() == 0
            && !self.shared.scheduled.load(Ordering::Acquire)
            && stats.passes_posted() == stats.passes_finished()
            && stats.pending() == 0
    }
}

/// Render worker hooks.
///
/// Owns the tile cache and the set of tiles requested but not yet answered.
/// Every image the cache lets go of is sent back to the fetcher, which
/// created it and is the only one allowed to destroy it.
pub struct TileRenderer {
    tile_size: u32,
    cache: RenderCache,
    pending: HashSet<TileCoordinate>,
    shared: Arc<RenderShared>,
    fetcher: WorkerHandle<FetchMessage>,
    program: Option<ProgramId>,
}

impl TileRenderer {
    /// Create renderer hooks and the handle that drives them.
    ///
    /// `mailbox` must be the handle of the mailbox the worker running these
    /// hooks reads from; render passes are posted there.
    pub fn new(
        settings: RenderSettings,
        mailbox: WorkerHandle<RenderMessage>,
        fetcher: WorkerHandle<FetchMessage>,
    ) -> (Self, RendererHandle) {
        let shared = Arc::new(RenderShared {
            state: Mutex::new(ViewportState::new()),
            scheduled: AtomicBool::new(false),
            mailbox,
            stats: RendererStats::default(),
        });

        let cache = TileCache::new(settings.cache_size, {
            let fetcher = fetcher.clone();
            let shared = Arc::clone(&shared);
            move |image: Arc<TileImage>| tile_evicted(&fetcher, &shared.stats, image)
        });

        let renderer = Self {
            tile_size: settings.tile_size,
            cache,
            pending: HashSet::new(),
            shared: Arc::clone(&shared),
            fetcher,
            program: None,
        };
        (renderer, RendererHandle { shared })
    }

    fn render(&mut self, context: &mut dyn GpuContext) {
        let state = self.shared.take_state();
        if state.is_valid() {
            self.draw(&state, context);
        }
        self.shared.stats.record_pass_finished();
    }

    fn draw(&mut self, state: &ViewportState, context: &mut dyn GpuContext) {
        let Some(program) = self.program else {
            return;
        };

        context.begin_frame(program, state.map_size(), self.tile_size, CLEAR_COLOR);

        let selection = select_tiles(state, self.tile_size, &mut self.cache);
        for coord in selection.missing {
            if self.pending.contains(&coord) {
                continue;
            }
            if self.fetcher.post(FetchMessage::Request(coord)).is_ok() {
                self.pending.insert(coord);
                self.shared.stats.record_request();
            } else {
                debug!(tile = %coord, "Fetcher stopped, tile not requested");
            }
        }

        for draw in &selection.draws {
            if let Some(texture) = draw.image.texture() {
                context.draw_tile(texture, &draw.quad);
            }
        }
        context.present();

        let stats = &self.shared.stats;
        stats.set_pending(self.pending.len());
        stats.record_frame();
        debug!(
            zoom = state.zoom(),
            drawn = selection.draws.len(),
            pending = self.pending.len(),
            "Frame presented"
        );
    }

    fn tile_response(&mut self, image: Arc<TileImage>) {
        let coord = image.coordinate();
        self.pending.remove(&coord);

        if image.is_valid() {
            self.cache.insert(coord, image);
            self.shared.stats.set_cached(self.cache.size());
            self.shared.schedule();
        }
        // Published after scheduling so the renderer never looks idle in between
        self.shared.stats.set_pending(self.pending.len());
    }
}

fn tile_evicted(
    fetcher: &WorkerHandle<FetchMessage>,
    stats: &RendererStats,
    image: Arc<TileImage>,
) {
    let coord = image.coordinate();
    if fetcher.post(FetchMessage::Release(image)).is_err() {
        warn!(tile = %coord, "Fetcher stopped, evicted tile not released");
        return;
    }
    stats.record_release();
}

impl WorkerHooks for TileRenderer {
    type Message = RenderMessage;

    fn on_begin(&mut self, context: &mut dyn GpuContext) {
        match context.create_tile_program() {
            Ok(program) => self.program = Some(program),
            Err(e) => error!(error = %e, "Failed to build tile program, nothing will be drawn"),
        }
    }

    fn handle(&mut self, message: RenderMessage, context: &mut dyn GpuContext) {
        match message {
            RenderMessage::Render => self.render(context),
            RenderMessage::TileResponse(image) => self.tile_response(image),
        }
    }

    fn on_end(&mut self, context: &mut dyn GpuContext) {
        let cached = self.cache.size();
        self.cache.drain();
        self.pending.clear();
        self.shared.stats.set_cached(0);
        self.shared.stats.set_pending(0);

        if let Some(program) = self.program.take() {
            context.delete_program(program);
        }
        info!(released = cached, "Renderer shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{SoftwareContext, SoftwareSurface, SurfaceSize};
    use crate::render::state::PixelRect;
    use crate::worker::Mailbox;
    use image::{Rgba, RgbaImage};

    const SIZE: u32 = 16;

    struct Harness {
        renderer: TileRenderer,
        handle: RendererHandle,
        context: SoftwareContext,
        surface: Arc<SoftwareSurface>,
        render_box: Mailbox<RenderMessage>,
        fetch_box: Mailbox<FetchMessage>,
    }

    impl Harness {
        fn new(cache_size: usize) -> Self {
            let surface = SoftwareSurface::new();
            let mut context = SoftwareContext::new(Arc::clone(&surface));
            context.make_current().unwrap();
            let render_box = Mailbox::new();
            let fetch_box = Mailbox::new();
            let settings = RenderSettings {
                tile_size: SIZE,
                cache_size,
            };
            let (mut renderer, handle) =
                TileRenderer::new(settings, render_box.handle(), fetch_box.handle());
            renderer.on_begin(&mut context);
            Self {
                renderer,
                handle,
                context,
                surface,
                render_box,
                fetch_box,
            }
        }

        /// Handle every queued render message.
        fn pump(&mut self) {
            while let Some(message) = self.render_box.try_recv() {
                self.renderer.handle(message, &mut self.context);
            }
        }

        fn respond(&mut self, image: Arc<TileImage>) {
            self.renderer
                .handle(RenderMessage::TileResponse(image), &mut self.context);
        }

        fn tile(&mut self, z: i32, x: i32, y: i32) -> Arc<TileImage> {
            let pixels = RgbaImage::from_pixel(SIZE, SIZE, Rgba([200, 40, 40, 255]));
            let texture = self.context.create_texture(&pixels).unwrap();
            Arc::new(TileImage::uploaded(TileCoordinate::new(z, x, y), texture))
        }

        fn requests(&mut self) -> Vec<TileCoordinate> {
            let mut requests = Vec::new();
            while let Some(message) = self.fetch_box.try_recv() {
                if let FetchMessage::Request(coord) = message {
                    requests.push(coord);
                }
            }
            requests
        }

        fn releases(&mut self) -> Vec<TileCoordinate> {
            let mut released = Vec::new();
            while let Some(message) = self.fetch_box.try_recv() {
                if let FetchMessage::Release(image) = message {
                    released.push(image.coordinate());
                }
            }
            released
        }
    }

    /// Valid state at `zoom` showing a `w` x `h` pixel viewport at (x, y).
    fn state(zoom: i32, x: i32, y: i32, w: u32, h: u32) -> ViewportState {
        let mut state = ViewportState::new();
        state.set_zoom(zoom);
        state.set_bounds(PixelRect::new(x, y, w, h));
        state.set_map_size(SurfaceSize::new(w, h));
        state.set_valid();
        state
    }

    #[test]
    fn test_invalid_state_draws_nothing() {
        let mut h = Harness::new(4);
        h.handle.set_state(ViewportState::new());
        h.pump();

        assert_eq!(h.surface.frames_presented(), 0);
        assert!(h.requests().is_empty());
        assert!(h.handle.is_idle());
    }

    #[test]
    fn test_burst_of_updates_posts_one_pass_with_latest_state() {
        let mut h = Harness::new(4);
        for x in 0..100 {
            h.handle.set_state(state(2, x * SIZE as i32 % 64, 0, SIZE, SIZE));
        }
        h.handle.set_state(state(2, 3 * SIZE as i32, 2 * SIZE as i32, SIZE, SIZE));

        let mut passes = 0;
        while let Some(message) = h.render_box.try_recv() {
            assert!(matches!(message, RenderMessage::Render));
            passes += 1;
            h.renderer.handle(message, &mut h.context);
        }
        assert_eq!(passes, 1);
        assert_eq!(h.requests(), vec![TileCoordinate::new(2, 3, 2)]);
    }

    #[test]
    fn test_concurrent_updates_coalesce_into_one_pass_with_final_state() {
        let mut h = Harness::new(16);

        for round in 0..2 {
            let writers: Vec<_> = (0..8)
                .map(|t| {
                    let handle = h.handle.clone();
                    std::thread::spawn(move || {
                        for _ in 0..50 {
                            handle.set_state(state(3, t * SIZE as i32, 0, SIZE, SIZE));
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            let last = h.handle.state();
            let mut passes = 0;
            while let Some(message) = h.render_box.try_recv() {
                passes += 1;
                h.renderer.handle(message, &mut h.context);
            }
            assert!(passes <= 2, "round {}: {} passes", round, passes);
            assert_eq!(h.handle.stats().passes_posted(), round + 1);

            // The pass drew whatever the last writer left behind
            let column = last.bounds().x / SIZE as i32;
            let requests = h.requests();
            if round == 0 {
                assert_eq!(requests, vec![TileCoordinate::new(3, column, 0)]);
            } else {
                assert!(requests.iter().all(|c| *c == TileCoordinate::new(3, column, 0)));
            }
        }
    }

    #[test]
    fn test_update_after_pass_started_schedules_exactly_one_more() {
        let mut h = Harness::new(4);
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();
        assert_eq!(h.handle.stats().passes_posted(), 1);

        h.handle.set_state(state(1, SIZE as i32, 0, SIZE, SIZE));
        h.handle.set_state(state(1, SIZE as i32, SIZE as i32, SIZE, SIZE));
        h.pump();
        assert_eq!(h.handle.stats().passes_posted(), 2);
        assert_eq!(h.surface.frames_presented(), 2);
    }

    #[test]
    fn test_pending_tiles_are_requested_once() {
        let mut h = Harness::new(4);
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();

        assert_eq!(h.requests(), vec![TileCoordinate::new(1, 0, 0)]);
        assert_eq!(h.handle.stats().pending(), 1);
        assert!(!h.handle.is_idle());
    }

    #[test]
    fn test_failed_response_clears_pending_without_redraw() {
        let mut h = Harness::new(4);
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();
        let frames = h.surface.frames_presented();

        h.respond(Arc::new(TileImage::failed(TileCoordinate::new(1, 0, 0))));
        h.pump();

        assert_eq!(h.surface.frames_presented(), frames);
        assert_eq!(h.handle.stats().pending(), 0);
        assert!(h.handle.is_idle());

        // The gap is requested again on the next pass
        h.requests();
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();
        assert_eq!(h.requests(), vec![TileCoordinate::new(1, 0, 0)]);
    }

    #[test]
    fn test_valid_response_is_cached_and_drawn() {
        let mut h = Harness::new(4);
        h.handle.set_state(state(1, 0, 0, SIZE, SIZE));
        h.pump();

        let tile = h.tile(1, 0, 0);
        h.respond(tile);
        h.pump();

        assert_eq!(h.surface.frames_presented(), 2);
        assert_eq!(h.handle.stats().cached(), 1);
        let frame = h.surface.snapshot().unwrap();
        assert_eq!(frame.get_pixel(5, 5), &Rgba([200, 40, 40, 255]));
        assert!(h.handle.is_idle());
    }

    #[test]
    fn test_lru_victim_is_released_to_fetcher() {
        let mut h = Harness::new(2);
        let (a, b, c) = (h.tile(2, 0, 0), h.tile(2, 1, 0), h.tile(2, 2, 0));
        h.respond(a);
        h.respond(b);
        // Drawing A refreshes it, leaving B least recently used
        h.handle.set_state(state(2, 0, 0, SIZE, SIZE));
        h.pump();
        h.respond(c);

        assert_eq!(h.releases(), vec![TileCoordinate::new(2, 1, 0)]);
        assert_eq!(h.handle.stats().releases(), 1);
        assert_eq!(h.handle.stats().cached(), 2);
    }

    #[test]
    fn test_on_end_releases_every_cached_tile() {
        let mut h = Harness::new(4);
        let (a, b) = (h.tile(3, 0, 0), h.tile(3, 1, 1));
        h.respond(a);
        h.respond(b);
        h.renderer.on_end(&mut h.context);

        let mut released = h.releases();
        released.sort();
        assert_eq!(
            released,
            vec![TileCoordinate::new(3, 0, 0), TileCoordinate::new(3, 1, 1)]
        );
        assert_eq!(h.handle.stats().cached(), 0);
        assert_eq!(h.context.share_group().live_programs(), 0);
    }
}

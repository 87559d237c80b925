//! Lock-free renderer counters readable from any thread

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters the renderer publishes for the owner thread.
///
/// Gauges (`pending`, `cached`) are stored after every change on the render
/// thread; the rest only ever grow.
///
/// # Example
///
/// ```
/// use tilestream::render::RendererStats;
///
/// let stats = RendererStats::default();
/// stats.record_request();
/// stats.record_request();
///
/// assert_eq!(stats.requests_issued(), 2);
/// assert_eq!(stats.frames(), 0);
/// ```
#[derive(Debug, Default)]
pub struct RendererStats {
    pending: AtomicUsize,
    cached: AtomicUsize,
    frames: AtomicU64,
    passes_posted: AtomicU64,
    passes_finished: AtomicU64,
    requests: AtomicU64,
    releases: AtomicU64,
}

impl RendererStats {
    /// Record a tile request sent to the fetcher.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tile image released back to the fetcher.
    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pass_posted(&self) {
        self.passes_posted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_pass_finished(&self) {
        self.passes_finished.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn set_pending(&self, pending: usize) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    pub(crate) fn set_cached(&self, cached: usize) {
        self.cached.store(cached, Ordering::Relaxed);
    }

    /// Tiles requested and not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Tiles currently held by the renderer's cache.
    pub fn cached(&self) -> usize {
        self.cached.load(Ordering::Relaxed)
    }

    /// Frames presented.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Render passes queued on the renderer's mailbox.
    pub fn passes_posted(&self) -> u64 {
        self.passes_posted.load(Ordering::SeqCst)
    }

    /// Render passes run to completion, drawn or not.
    pub fn passes_finished(&self) -> u64 {
        self.passes_finished.load(Ordering::SeqCst)
    }

    /// Tile requests sent to the fetcher.
    pub fn requests_issued(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Tile images released back to the fetcher.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

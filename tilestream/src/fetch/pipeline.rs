//! The fetch worker's hooks: requests, completions, releases and cancels.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;

use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::decode::TileDecoder;
use super::transport::{TileTransport, TransportError};
use crate::coord::TileCoordinate;
use crate::gpu::GpuContext;
use crate::render::RenderMessage;
use crate::tile::TileImage;
use crate::worker::{WorkerHandle, WorkerHooks};

/// Messages accepted by the fetch worker.
#[derive(Debug)]
pub enum FetchMessage {
    /// Fetch, decode and upload one tile.
    Request(TileCoordinate),
    /// A transfer finished (posted by the worker to itself).
    Completed {
        handle: RequestHandle,
        result: Result<Vec<u8>, TransportError>,
    },
    /// The renderer no longer references this image.
    Release(Arc<TileImage>),
    /// Abort every transfer in flight.
    Cancel,
}

/// Transport-level identity of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(u64);

/// Where tiles come from and what they must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Base URL, ending in `/`
    pub server_url: String,
    /// Image format, also the URL extension
    pub format: String,
    /// Expected width and height of every tile
    pub tile_size: u32,
}

impl FetchSettings {
    /// URL of `coord` on the tile server.
    pub fn tile_url(&self, coord: TileCoordinate) -> String {
        format!(
            "{}{}/{}/{}.{}",
            self.server_url,
            coord.zoom(),
            coord.x(),
            coord.y(),
            self.format
        )
    }
}

/// Owns every texture-backed image handed out by the fetcher, keyed by tile.
#[derive(Default)]
struct ImageTable {
    images: BTreeMap<TileCoordinate, Arc<TileImage>>,
}

impl ImageTable {
    fn failed(&self, coord: TileCoordinate) -> Arc<TileImage> {
        Arc::new(TileImage::failed(coord))
    }

    fn upload(
        &mut self,
        coord: TileCoordinate,
        pixels: &RgbaImage,
        context: &mut dyn GpuContext,
    ) -> Arc<TileImage> {
        assert!(
            !self.images.contains_key(&coord),
            "tile {} is already owned by the fetcher",
            coord
        );
        let texture = match context.create_texture(pixels) {
            Ok(texture) => texture,
            Err(e) => panic!("tile {} could not be uploaded: {}", coord, e),
        };
        let image = Arc::new(TileImage::uploaded(coord, texture));
        self.images.insert(coord, Arc::clone(&image));
        image
    }

    fn release(&mut self, image: &Arc<TileImage>, context: &mut dyn GpuContext) {
        let coord = image.coordinate();
        let owned = match self.images.remove(&coord) {
            Some(owned) if Arc::ptr_eq(&owned, image) => owned,
            _ => panic!("released tile {} is not owned by the fetcher", coord),
        };
        destroy(&owned, context);
    }

    fn destroy_all(&mut self, context: &mut dyn GpuContext) -> usize {
        let images = std::mem::take(&mut self.images);
        for image in images.values() {
            destroy(image, context);
        }
        images.len()
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

fn destroy(image: &TileImage, context: &mut dyn GpuContext) {
    assert_eq!(
        image.owner(),
        thread::current().id(),
        "tile {} destroyed off the thread that created it",
        image.coordinate()
    );
    if let Some(texture) = image.texture() {
        context.delete_texture(texture);
    }
}

/// Fetch worker hooks.
///
/// Transfers run as tasks on the worker's runtime and report back through
/// the worker's own mailbox, so decoding and texture uploads always happen
/// on the fetch thread with its context current.
pub struct TileFetcher {
    settings: FetchSettings,
    transport: Arc<dyn TileTransport>,
    decoder: Arc<dyn TileDecoder>,
    mailbox: WorkerHandle<FetchMessage>,
    renderer: WorkerHandle<RenderMessage>,
    in_flight: HashMap<RequestHandle, TileCoordinate>,
    images: ImageTable,
    cancel: CancellationToken,
    next_handle: u64,
}

impl TileFetcher {
    /// Create fetch hooks.
    ///
    /// `mailbox` must be the handle of the mailbox the worker running these
    /// hooks reads from; completions are posted there.
    pub fn new(
        settings: FetchSettings,
        transport: Arc<dyn TileTransport>,
        decoder: Arc<dyn TileDecoder>,
        mailbox: WorkerHandle<FetchMessage>,
        renderer: WorkerHandle<RenderMessage>,
    ) -> Self {
        Self {
            settings,
            transport,
            decoder,
            mailbox,
            renderer,
            in_flight: HashMap::new(),
            images: ImageTable::default(),
            cancel: CancellationToken::new(),
            next_handle: 0,
        }
    }

    /// Number of transfers that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of uploaded images not yet released.
    pub fn owned_images(&self) -> usize {
        self.images.len()
    }

    fn tile_request(&mut self, coord: TileCoordinate) {
        let url = self.settings.tile_url(coord);
        let handle = RequestHandle(self.next_handle);
        self.next_handle += 1;

        let previous = self.in_flight.insert(handle, coord);
        assert!(previous.is_none(), "request handle {:?} registered twice", handle);

        debug!(
            zoom = coord.zoom(),
            x = coord.x(),
            y = coord.y(),
            url = %url,
            "Requesting tile"
        );

        let transfer = self.transport.get(&url);
        let cancelled = self.cancel.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancelled.cancelled() => Err(TransportError::Cancelled),
                result = transfer => result,
            };
            // Fails only when the worker is already gone
            let _ = mailbox.post(FetchMessage::Completed { handle, result });
        });
    }

    fn tile_completed(
        &mut self,
        handle: RequestHandle,
        result: Result<Vec<u8>, TransportError>,
        context: &mut dyn GpuContext,
    ) {
        let coord = match self.in_flight.remove(&handle) {
            Some(coord) => coord,
            None => panic!("completion for unknown request {:?}", handle),
        };

        let image = match result {
            Ok(bytes) => self.load(coord, &bytes, context),
            Err(TransportError::Cancelled) => {
                trace!(zoom = coord.zoom(), x = coord.x(), y = coord.y(), "Tile cancelled");
                self.images.failed(coord)
            }
            Err(e) => {
                error!(
                    zoom = coord.zoom(),
                    x = coord.x(),
                    y = coord.y(),
                    error = %e,
                    "Tile fetch failed"
                );
                self.images.failed(coord)
            }
        };

        if self.renderer.post(RenderMessage::TileResponse(image)).is_err() {
            // The image stays in the table and is destroyed in on_end
            debug!(tile = %coord, "Renderer gone, dropping tile response");
        }
    }

    fn load(
        &mut self,
        coord: TileCoordinate,
        bytes: &[u8],
        context: &mut dyn GpuContext,
    ) -> Arc<TileImage> {
        let pixels = match self.decoder.decode(bytes, &self.settings.format) {
            Ok(pixels) => pixels,
            Err(e) => panic!(
                "tile {} is not a valid {} image: {}",
                coord, self.settings.format, e
            ),
        };

        let size = self.settings.tile_size;
        assert!(
            pixels.width() == size && pixels.height() == size,
            "tile {} is {}x{}, expected {}x{}",
            coord,
            pixels.width(),
            pixels.height(),
            size,
            size
        );

        let image = self.images.upload(coord, &pixels, context);
        debug!(zoom = coord.zoom(), x = coord.x(), y = coord.y(), "Tile loaded");
        image
    }

    fn cancel_requests(&mut self) {
        debug!(in_flight = self.in_flight.len(), "Cancelling tile requests");
        self.cancel.cancel();
        // Requests issued from now on get a fresh token
        self.cancel = CancellationToken::new();
    }
}

impl WorkerHooks for TileFetcher {
    type Message = FetchMessage;

    fn handle(&mut self, message: FetchMessage, context: &mut dyn GpuContext) {
        match message {
            FetchMessage::Request(coord) => self.tile_request(coord),
            FetchMessage::Completed { handle, result } => {
                self.tile_completed(handle, result, context)
            }
            FetchMessage::Release(image) => self.images.release(&image, context),
            FetchMessage::Cancel => self.cancel_requests(),
        }
    }

    fn on_end(&mut self, context: &mut dyn GpuContext) {
        self.cancel.cancel();
        let destroyed = self.images.destroy_all(context);
        info!(
            destroyed,
            abandoned = self.in_flight.len(),
            "Fetcher shut down"
        );
        self.in_flight.clear();
    }
}

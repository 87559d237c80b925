//! GPU-resident tile images.
//!
//! A [`TileImage`] is what the fetch worker hands the render worker for one
//! tile coordinate: either a texture in the shared context group, or an
//! invalid marker for a fetch that failed or was cancelled.
//!
//! Images are created only by the fetch pipeline's image table and are passed
//! around as `Arc<TileImage>`. The texture is deleted only by the thread that
//! created it, after the renderer explicitly releases the image.

use std::thread::{self, ThreadId};

use crate::coord::TileCoordinate;
use crate::gpu::TextureId;

/// One decoded tile resident in GPU memory (or a failed fetch).
#[derive(Debug)]
pub struct TileImage {
    /// Tile the image was fetched for
    coordinate: TileCoordinate,
    /// Texture in the shared context group, `None` if the fetch failed
    texture: Option<TextureId>,
    /// Thread whose context created the texture
    owner: ThreadId,
}

impl TileImage {
    /// An image for a fetch that produced no texture.
    pub(crate) fn failed(coordinate: TileCoordinate) -> Self {
        Self {
            coordinate,
            texture: None,
            owner: thread::current().id(),
        }
    }

    /// An image backed by `texture`, created on the calling thread.
    pub(crate) fn uploaded(coordinate: TileCoordinate, texture: TextureId) -> Self {
        Self {
            coordinate,
            texture: Some(texture),
            owner: thread::current().id(),
        }
    }

    /// Get the tile coordinate.
    pub fn coordinate(&self) -> TileCoordinate {
        self.coordinate
    }

    /// Returns true if the image carries a texture.
    pub fn is_valid(&self) -> bool {
        self.texture.is_some()
    }

    /// Get the texture, if the fetch succeeded.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Get the thread that created the image.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }
}

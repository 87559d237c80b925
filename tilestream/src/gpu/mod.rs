//! GPU context abstraction.
//!
//! The tile pipeline only needs a small slice of a real graphics API: moving a
//! context between threads, uploading and deleting textures, building the tile
//! program, and drawing textured quads into a frame. [`GpuContext`] captures
//! exactly that, so the workers never depend on a concrete backend.
//!
//! # Thread affinity
//!
//! A context is current on at most one thread at a time. Every texture,
//! program and draw call must come from the thread on which the context is
//! current. Backends are expected to assert this; [`SoftwareContext`] does so
//! on every call.
//!
//! # Share groups
//!
//! [`GpuContext::create_shared`] creates a second context in the same share
//! group. Textures created through either context are visible to both, which
//! is what lets the fetch worker upload tiles that the render worker draws.

mod software;

pub use software::{ShareGroup, SoftwareContext, SoftwareSurface};

use image::RgbaImage;
use thiserror::Error;

/// Handle to a texture living in a context's share group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

/// Handle to a compiled tile program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u64);

/// Pixel dimensions of a drawable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-tile draw parameters.
///
/// The unit quad spans `[0, tile_size]` on both axes in raster pixel space
/// (origin top-left, y down). A vertex `v` lands at `scale * v + offset`, and
/// its texture coordinate is `tex_scale * (v / tile_size) + tex_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileQuad {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
    pub tex_scale: [f32; 2],
    pub tex_offset: [f32; 2],
}

impl TileQuad {
    /// A tile drawn 1:1 at `offset`, sampling its whole texture.
    pub fn identity(offset: [f32; 2]) -> Self {
        Self {
            scale: [1.0, 1.0],
            offset,
            tex_scale: [1.0, 1.0],
            tex_offset: [0.0, 0.0],
        }
    }
}

/// Errors reported by a GPU backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The context is already current on another thread.
    #[error("context is current on another thread")]
    CurrentElsewhere,

    /// Texture data could not be uploaded.
    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    /// The tile program failed to compile or link.
    #[error("program build failed: {0}")]
    ProgramBuild(String),

    /// The backend could not create a shared context.
    #[error("failed to create shared context: {0}")]
    ShareFailed(String),
}

/// A GPU rendering context, movable between threads.
///
/// Implementations must be `Send` so the context can be handed to a worker
/// thread; they are never shared between threads by reference.
pub trait GpuContext: Send {
    /// Make this context current on the calling thread.
    fn make_current(&mut self) -> Result<(), GpuError>;

    /// Release this context from the calling thread. A no-op if it is not
    /// current anywhere.
    fn done_current(&mut self);

    /// Create a new context in the same share group, not yet current.
    fn create_shared(&self) -> Result<Box<dyn GpuContext>, GpuError>;

    /// Upload an RGBA image as a texture.
    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId, GpuError>;

    /// Delete a texture created in this share group.
    fn delete_texture(&mut self, texture: TextureId);

    /// Build the textured-quad program used to draw tiles.
    fn create_tile_program(&mut self) -> Result<ProgramId, GpuError>;

    /// Delete a program built by [`GpuContext::create_tile_program`].
    fn delete_program(&mut self, program: ProgramId);

    /// Bind `program`, set a raster projection for `size` and clear the
    /// target to `clear`.
    fn begin_frame(
        &mut self,
        program: ProgramId,
        size: SurfaceSize,
        tile_size: u32,
        clear: [f32; 4],
    );

    /// Draw one textured quad with the bound program.
    fn draw_tile(&mut self, texture: TextureId, quad: &TileQuad);

    /// Finish the frame and present it (swap buffers).
    fn present(&mut self);
}

//! Headless raster backend built on tiny-skia.
//!
//! [`SoftwareContext`] behaves like a GL context as far as the tile pipeline
//! can tell: it has a current thread, lives in a share group with its sibling
//! contexts, owns textures by id, and draws textured quads into a frame that
//! is presented to a [`SoftwareSurface`]. It asserts thread affinity on every
//! call, which makes ownership bugs in the workers fail loudly in tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use image::RgbaImage;
use parking_lot::Mutex;
use tiny_skia::{
    Color, ColorU8, FilterQuality, Paint, Pattern, Pixmap, Rect, SpreadMode, Transform,
};
use tracing::trace;

use super::{GpuContext, GpuError, ProgramId, SurfaceSize, TextureId, TileQuad};

/// Objects shared by every context created from the same root context.
#[derive(Default)]
pub struct ShareGroup {
    next_id: AtomicU64,
    textures: Mutex<HashMap<TextureId, Pixmap>>,
    programs: Mutex<HashSet<ProgramId>>,
}

impl ShareGroup {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of textures currently alive in the group.
    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    /// Number of programs currently alive in the group.
    pub fn live_programs(&self) -> usize {
        self.programs.lock().len()
    }

    /// Returns true if `texture` has been created and not yet deleted.
    pub fn has_texture(&self, texture: TextureId) -> bool {
        self.textures.lock().contains_key(&texture)
    }
}

/// Presentation target for software contexts (the "window").
#[derive(Default)]
pub struct SoftwareSurface {
    presented: Mutex<Option<Pixmap>>,
    frames: AtomicU64,
}

impl SoftwareSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Copy of the most recently presented frame, if any.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let guard = self.presented.lock();
        let pixmap = guard.as_ref()?;
        let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
        for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
            let c = src.demultiply();
            *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Some(image)
    }
}

struct Frame {
    pixmap: Pixmap,
    tile_size: f32,
}

/// Software GPU context.
pub struct SoftwareContext {
    group: Arc<ShareGroup>,
    surface: Arc<SoftwareSurface>,
    current: Option<ThreadId>,
    frame: Option<Frame>,
}

impl SoftwareContext {
    /// Create a root context presenting to `surface`, in a fresh share group.
    pub fn new(surface: Arc<SoftwareSurface>) -> Self {
        Self {
            group: Arc::new(ShareGroup::default()),
            surface,
            current: None,
            frame: None,
        }
    }

    /// The share group this context belongs to.
    pub fn share_group(&self) -> Arc<ShareGroup> {
        Arc::clone(&self.group)
    }

    fn assert_current(&self, call: &str) {
        let here = thread::current().id();
        assert_eq!(
            self.current,
            Some(here),
            "{} issued on {:?} but the context is current on {:?}",
            call,
            here,
            self.current
        );
    }
}

impl GpuContext for SoftwareContext {
    fn make_current(&mut self) -> Result<(), GpuError> {
        let here = thread::current().id();
        match self.current {
            Some(owner) if owner != here => Err(GpuError::CurrentElsewhere),
            _ => {
                self.current = Some(here);
                Ok(())
            }
        }
    }

    fn done_current(&mut self) {
        if let Some(owner) = self.current {
            assert_eq!(
                owner,
                thread::current().id(),
                "done_current called from a thread that does not own the context"
            );
        }
        self.current = None;
    }

    fn create_shared(&self) -> Result<Box<dyn GpuContext>, GpuError> {
        Ok(Box::new(SoftwareContext {
            group: Arc::clone(&self.group),
            surface: Arc::clone(&self.surface),
            current: None,
            frame: None,
        }))
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId, GpuError> {
        self.assert_current("create_texture");

        let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or_else(|| {
            GpuError::InvalidTexture(format!("{}x{}", image.width(), image.height()))
        })?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        let id = TextureId(self.group.next_id());
        self.group.textures.lock().insert(id, pixmap);
        trace!(texture = id.0, "Texture created");
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.assert_current("delete_texture");
        let removed = self.group.textures.lock().remove(&texture);
        assert!(removed.is_some(), "delete of unknown texture {:?}", texture);
        trace!(texture = texture.0, "Texture deleted");
    }

    fn create_tile_program(&mut self) -> Result<ProgramId, GpuError> {
        self.assert_current("create_tile_program");
        let id = ProgramId(self.group.next_id());
        self.group.programs.lock().insert(id);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.assert_current("delete_program");
        self.group.programs.lock().remove(&program);
    }

    fn begin_frame(
        &mut self,
        program: ProgramId,
        size: SurfaceSize,
        tile_size: u32,
        clear: [f32; 4],
    ) {
        self.assert_current("begin_frame");
        assert!(
            self.group.programs.lock().contains(&program),
            "begin_frame with unknown program {:?}",
            program
        );

        let Some(mut pixmap) = Pixmap::new(size.width.max(1), size.height.max(1)) else {
            panic!("begin_frame with unrepresentable size {:?}", size);
        };
        let [r, g, b, a] = clear;
        if let Some(color) = Color::from_rgba(r, g, b, a) {
            pixmap.fill(color);
        }

        self.frame = Some(Frame {
            pixmap,
            tile_size: tile_size as f32,
        });
    }

    fn draw_tile(&mut self, texture: TextureId, quad: &TileQuad) {
        self.assert_current("draw_tile");
        let Some(frame) = self.frame.as_mut() else {
            panic!("draw_tile outside begin_frame/present");
        };

        let textures = self.group.textures.lock();
        let Some(source) = textures.get(&texture) else {
            panic!("draw_tile with deleted texture {:?}", texture);
        };

        let size = frame.tile_size;
        let extent = [quad.scale[0] * size, quad.scale[1] * size];
        let Some(rect) = Rect::from_xywh(quad.offset[0], quad.offset[1], extent[0], extent[1])
        else {
            return;
        };

        // Map texel space onto the quad: a texel at `t` lands at
        // offset + (t / tex_extent - tex_offset) * extent / tex_scale.
        let sx = extent[0] / (quad.tex_scale[0] * source.width() as f32);
        let sy = extent[1] / (quad.tex_scale[1] * source.height() as f32);
        let tx = quad.offset[0] - quad.tex_offset[0] * extent[0] / quad.tex_scale[0];
        let ty = quad.offset[1] - quad.tex_offset[1] * extent[1] / quad.tex_scale[1];

        let paint = Paint {
            shader: Pattern::new(
                source.as_ref(),
                SpreadMode::Pad,
                FilterQuality::Nearest,
                1.0,
                Transform::from_row(sx, 0.0, 0.0, sy, tx, ty),
            ),
            anti_alias: false,
            ..Paint::default()
        };
        frame
            .pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn present(&mut self) {
        self.assert_current("present");
        let Some(frame) = self.frame.take() else {
            panic!("present without begin_frame");
        };
        *self.surface.presented.lock() = Some(frame.pixmap);
        self.surface.frames.fetch_add(1, Ordering::AcqRel);
    }
}

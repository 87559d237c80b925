//! Viewport state shared between the viewer and the renderer

use crate::coord::PixelPoint;
use crate::gpu::SurfaceSize;

/// Axis-aligned rectangle in world pixel space at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle of `size` centred on `center`.
    pub fn centered(center: PixelPoint, size: SurfaceSize) -> Self {
        Self::new(
            center.x - (size.width / 2) as i32,
            center.y - (size.height / 2) as i32,
            size.width,
            size.height,
        )
    }

    /// Right-most pixel column inside the rectangle.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32 - 1
    }

    /// Bottom-most pixel row inside the rectangle.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32 - 1
    }
}

/// What the renderer should draw.
///
/// The viewer mutates its own copy and hands it to the renderer whole; the
/// renderer only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportState {
    bounds: PixelRect,
    zoom: i32,
    last_zoom: Option<i32>,
    size: SurfaceSize,
    valid: bool,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportState {
    /// An invalid state; nothing is drawn until real dimensions arrive.
    pub const fn new() -> Self {
        Self {
            bounds: PixelRect::new(0, 0, 0, 0),
            zoom: 0,
            last_zoom: None,
            size: SurfaceSize::new(0, 0),
            valid: false,
        }
    }

    /// Mark the state as drawable.
    pub fn set_valid(&mut self) {
        self.valid = true;
    }

    pub fn set_bounds(&mut self, bounds: PixelRect) {
        self.bounds = bounds;
    }

    /// Set the zoom level, remembering the previous one.
    ///
    /// The first call records the same value for both, so the state starts
    /// out neither zoomed in nor out.
    pub fn set_zoom(&mut self, zoom: i32) {
        self.last_zoom = match self.last_zoom {
            None => Some(zoom),
            Some(_) => Some(self.zoom),
        };
        self.zoom = zoom;
    }

    pub fn set_map_size(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    /// Returns true if the last zoom change went to a finer level.
    pub fn zoomed_in(&self) -> bool {
        self.last_zoom.is_some_and(|last| self.zoom > last)
    }

    /// Returns true if the last zoom change went to a coarser level.
    pub fn zoomed_out(&self) -> bool {
        self.last_zoom.is_some_and(|last| self.zoom < last)
    }

    pub fn map_size(&self) -> SurfaceSize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_invalid() {
        let state = ViewportState::new();
        assert!(!state.is_valid());
        assert!(!state.zoomed_in());
        assert!(!state.zoomed_out());
    }

    #[test]
    fn test_first_zoom_has_no_direction() {
        let mut state = ViewportState::new();
        state.set_zoom(10);
        assert_eq!(state.zoom(), 10);
        assert!(!state.zoomed_in());
        assert!(!state.zoomed_out());
    }

    #[test]
    fn test_zoom_direction_follows_last_change() {
        let mut state = ViewportState::new();
        state.set_zoom(10);
        state.set_zoom(11);
        assert!(state.zoomed_in());

        state.set_zoom(10);
        assert!(state.zoomed_out());

        // Clamped at a limit: no change, no direction
        state.set_zoom(10);
        assert!(!state.zoomed_in());
        assert!(!state.zoomed_out());
    }

    #[test]
    fn test_centered_rect() {
        let rect = PixelRect::centered(PixelPoint::new(1000, 500), SurfaceSize::new(300, 200));
        assert_eq!(rect, PixelRect::new(850, 400, 300, 200));
        assert_eq!(rect.right(), 1149);
        assert_eq!(rect.bottom(), 599);
    }
}

//! Tile renderer.
//!
//! The render worker draws the tiles covering the current viewport and asks
//! the fetch worker for the ones it does not have. While a tile is missing, a
//! cached tile from the previous zoom level is drawn in its place (see
//! [`select_tiles`]).
//!
//! Viewport updates arrive through a [`RendererHandle`] from any thread and
//! are coalesced: a burst of updates results in one queued render pass that
//! draws the latest state.

mod renderer;
mod selection;
mod state;
mod stats;

use std::sync::Arc;

use crate::tile::TileImage;

pub use renderer::{RenderSettings, RendererHandle, TileRenderer, CLEAR_COLOR};
pub use selection::{select_tiles, RenderCache, Selection, TileDraw};
pub use state::{PixelRect, ViewportState};
pub use stats::RendererStats;

/// Messages accepted by the render worker.
#[derive(Debug)]
pub enum RenderMessage {
    /// Draw the current viewport state.
    Render,
    /// A fetch finished, successfully or not.
    TileResponse(Arc<TileImage>),
}

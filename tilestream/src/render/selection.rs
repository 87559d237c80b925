//! Visible tile selection with coarser/finer fallback.
//!
//! For every grid cell the viewport touches, the exact tile is drawn if it is
//! cached. Otherwise a substitute from the previous zoom level is drawn in its
//! place while the exact tile is requested:
//!
//! ```text
//!  zoomed in (z-1 parent)              zoomed out (z+1 children)
//!  ┌───────┬───────┐                   ┌───┬───┐
//!  │ (0,0) │ (½,0) │  the cell shows   │TL │TR │  each cached child fills
//!  ├───────┼───────┤  one quadrant of  ├───┼───┤  its quadrant of the cell
//!  │ (0,½) │ (½,½) │  the parent,      │BL │BR │  at half scale
//!  └───────┴───────┘  magnified 2x     └───┴───┘
//! ```
//!
//! Columns wrap around the antimeridian; rows outside the world are skipped.

use std::sync::Arc;

use crate::cache::TileCache;
use crate::coord::{tiles_per_side, TileCoordinate};
use crate::gpu::TileQuad;
use crate::tile::TileImage;

use super::state::ViewportState;

/// Cache type the renderer selects from.
pub type RenderCache = TileCache<TileCoordinate, Arc<TileImage>>;

/// One cached image and where to draw it.
#[derive(Debug, Clone)]
pub struct TileDraw {
    pub image: Arc<TileImage>,
    pub quad: TileQuad,
}

/// Result of one selection pass.
#[derive(Debug, Default)]
pub struct Selection {
    /// Images to draw, in order
    pub draws: Vec<TileDraw>,
    /// Exact tiles that were not cached
    pub missing: Vec<TileCoordinate>,
}

/// Work out which cached tiles cover the viewport in `state`.
///
/// Every lookup goes through [`TileCache::query`], so drawn tiles (and their
/// substitutes) are refreshed as most-recently-used.
pub fn select_tiles(state: &ViewportState, tile_size: u32, cache: &mut RenderCache) -> Selection {
    let mut selection = Selection::default();
    let size = tile_size as i32;
    let zoom = state.zoom();
    let n = tiles_per_side(zoom);
    let bounds = state.bounds();
    if bounds.width == 0 || bounds.height == 0 {
        return selection;
    }

    // Part of the top-left tile that lies outside the viewport
    let x_offset = -bounds.x.rem_euclid(size);
    let y_offset = -bounds.y.rem_euclid(size);

    let columns = bounds.x.div_euclid(size)..=bounds.right().div_euclid(size);
    let rows = bounds.y.div_euclid(size)..=bounds.bottom().div_euclid(size);

    for (yy, y) in rows.enumerate() {
        if !(0..n).contains(&y) {
            continue;
        }
        for (xx, x) in columns.clone().enumerate() {
            let cell = [
                (x_offset + xx as i32 * size) as f32,
                (y_offset + yy as i32 * size) as f32,
            ];
            let coord = TileCoordinate::new(zoom, x.rem_euclid(n), y);

            if let Some(image) = cache.query(&coord) {
                selection.draws.push(TileDraw {
                    image,
                    quad: TileQuad::identity(cell),
                });
                continue;
            }

            if state.zoomed_in() {
                push_parent(&mut selection, cache, coord, cell);
            } else if state.zoomed_out() {
                push_children(&mut selection, cache, coord, cell, size as f32);
            }
            selection.missing.push(coord);
        }
    }

    selection
}

fn push_parent(
    selection: &mut Selection,
    cache: &mut RenderCache,
    coord: TileCoordinate,
    cell: [f32; 2],
) {
    let Some(parent) = coord.parent() else {
        return;
    };
    if let Some(image) = cache.query(&parent) {
        selection.draws.push(TileDraw {
            image,
            quad: TileQuad {
                scale: [1.0, 1.0],
                offset: cell,
                tex_scale: [0.5, 0.5],
                tex_offset: [0.5 * (coord.x() % 2) as f32, 0.5 * (coord.y() % 2) as f32],
            },
        });
    }
}

fn push_children(
    selection: &mut Selection,
    cache: &mut RenderCache,
    coord: TileCoordinate,
    cell: [f32; 2],
    size: f32,
) {
    let half = size / 2.0;
    let quadrants = [[0.0, 0.0], [half, 0.0], [0.0, half], [half, half]];

    for (child, quadrant) in coord.children().iter().zip(quadrants) {
        if let Some(image) = cache.query(child) {
            selection.draws.push(TileDraw {
                image,
                quad: TileQuad {
                    scale: [0.5, 0.5],
                    offset: [cell[0] + quadrant[0], cell[1] + quadrant[1]],
                    tex_scale: [1.0, 1.0],
                    tex_offset: [0.0, 0.0],
                },
            });
        }
    }
}

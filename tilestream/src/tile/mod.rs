//! Tile image types shared between the fetch and render workers.

mod tile_image;

pub use tile_image::TileImage;

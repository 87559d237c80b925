//! Tilestream - concurrent slippy-map tile streaming and rendering
//!
//! This library fetches Web Mercator map tiles over HTTP, uploads them as GPU
//! textures on a dedicated fetch thread and draws the visible set on a
//! dedicated render thread, substituting cached tiles from neighbouring zoom
//! levels while the exact ones are in flight.
//!
//! The moving parts, leaves first:
//!
//! - [`worker`]: a GPU context bound to one thread with a message loop
//! - [`cache`]: bounded LRU with an eviction callback
//! - [`fetch`]: HTTP fetch, decode and texture upload with broadcast cancel
//! - [`render`]: visible tile selection, fallback and render-pass coalescing
//! - [`viewer`]: the controller tying both workers to one viewport

pub mod cache;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod gpu;
pub mod logging;
pub mod render;
pub mod tile;
pub mod viewer;
pub mod worker;

/// Version of the tilestream library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

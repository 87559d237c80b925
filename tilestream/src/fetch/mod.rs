//! Tile fetch pipeline.
//!
//! The fetch worker turns tile coordinates into GPU textures: it issues HTTP
//! requests through a [`TileTransport`], decodes the payload with a
//! [`TileDecoder`], uploads the pixels on its own context and posts the
//! resulting [`TileImage`](crate::tile::TileImage) to the renderer.
//!
//! Every uploaded image stays owned by the fetcher until the renderer sends
//! it back with [`FetchMessage::Release`]; only then is its texture deleted.
//! [`FetchMessage::Cancel`] aborts all transfers in flight, each of which
//! completes as an invalid image.

mod decode;
mod pipeline;
mod transport;

pub use decode::{DecodeError, ImageDecoder, TileDecoder};
pub use pipeline::{FetchMessage, FetchSettings, RequestHandle, TileFetcher};
pub use transport::{ReqwestTransport, TileTransport, TransportError};

//! Tile payload decoding

use image::{ImageFormat, RgbaImage};
use thiserror::Error;

/// Errors from decoding a tile payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The configured format has no decoder.
    #[error("unsupported image format '{0}'")]
    UnsupportedFormat(String),

    /// The payload is not a valid image in the expected format.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns fetched bytes into RGBA pixels.
pub trait TileDecoder: Send + Sync + 'static {
    /// Decode `bytes`, which were served as `format` (a file extension such
    /// as `png` or `jpg`).
    fn decode(&self, bytes: &[u8], format: &str) -> Result<RgbaImage, DecodeError>;
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl TileDecoder for ImageDecoder {
    fn decode(&self, bytes: &[u8], format: &str) -> Result<RgbaImage, DecodeError> {
        let format = ImageFormat::from_extension(format)
            .ok_or_else(|| DecodeError::UnsupportedFormat(format.to_string()))?;
        let image = image::load_from_memory_with_format(bytes, format)?;
        Ok(image.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_png() {
        let source = RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 255]));
        let bytes = encode(&source, ImageFormat::Png);

        let decoded = ImageDecoder.decode(&bytes, "png").unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
        assert_eq!(decoded.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_jpeg_by_either_extension() {
        let source = RgbaImage::from_pixel(8, 8, Rgba([128, 128, 128, 255]));
        let bytes = encode(&source, ImageFormat::Jpeg);

        assert_eq!(ImageDecoder.decode(&bytes, "jpg").unwrap().dimensions(), (8, 8));
        assert_eq!(ImageDecoder.decode(&bytes, "jpeg").unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = ImageDecoder.decode(&[0, 1, 2], "tile");
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(f)) if f == "tile"));
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        let result = ImageDecoder.decode(b"<html>503</html>", "png");
        assert!(matches!(result, Err(DecodeError::Image(_))));
    }
}

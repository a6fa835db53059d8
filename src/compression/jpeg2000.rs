//! JPEG 2000 compression handler (compression code 34712), decode-only
//!
//! Whole-slide pyramid sources occasionally carry JPEG2000-compressed
//! tiles; `jpeg2k` (a libopenjp2 binding) is what the pack's WSI streamer
//! reaches for to decode them. There's no encode path here: this codec is
//! recognized for reading pyramids, not for writing them.

use super::handler::CompressionHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct Jpeg2000Handler;

impl CompressionHandler for Jpeg2000Handler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let image = jpeg2k::Image::from_bytes(data)
            .map_err(|e| TiffError::CodecCorrupt(format!("JPEG2000 decode failed: {}", e)))?;
        let pixels = image
            .get_pixels(None)
            .map_err(|e| TiffError::CodecCorrupt(format!("JPEG2000 pixel extraction failed: {}", e)))?;
        Ok(pixels.data)
    }

    fn compress(&self, _data: &[u8]) -> TiffResult<Vec<u8>> {
        Err(TiffError::CodecUnsupported("JPEG2000 encoding is not supported".to_string()))
    }

    fn name(&self) -> &'static str {
        "JPEG2000"
    }

    fn code(&self) -> u64 {
        34712
    }
}

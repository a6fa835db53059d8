//! Baseline JPEG compression handler (compression code 7)
//!
//! Decoding goes through `jpeg-decoder`, the same crate the pack's
//! async-tiff reader uses for "new style" JPEG-in-TIFF strips. Encoding
//! reuses the `image` crate's jpeg feature, already a dependency for the
//! extractor's output paths.

use std::io::Cursor;

use super::handler::CompressionHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct JpegHandler;

impl CompressionHandler for JpegHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(data));
        decoder
            .decode()
            .map_err(|e| TiffError::CodecCorrupt(format!("JPEG decode failed: {}", e)))
    }

    fn compress(&self, _data: &[u8]) -> TiffResult<Vec<u8>> {
        Err(TiffError::GenericError(
            "JPEG encoding requires image dimensions; use encode_rgb8 instead".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "JPEG"
    }

    fn code(&self) -> u64 {
        7
    }
}

impl JpegHandler {
    /// Encodes raw interleaved RGB8 samples as a baseline JPEG, at the given
    /// pixel dimensions. The plain `compress` entry point in
    /// `CompressionHandler` has no room for width/height, so callers that
    /// know the image geometry (the writer) call this directly instead.
    pub fn encode_rgb8(data: &[u8], width: u32, height: u32, quality: u8) -> TiffResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(data, width, height, image::ExtendedColorType::Rgb8)
            .map_err(|e| TiffError::GenericError(format!("JPEG encode failed: {}", e)))?;
        Ok(out)
    }
}

//! Handler for compression codes the registry recognizes by name but
//! cannot decode: CCITT Group 3/4 fax encodings, and the "old style" JPEG
//! (compression code 6) that predates the self-contained JPEG tables
//! tag. Any attempt to decode or encode through one of these surfaces as
//! `CodecUnsupported` rather than `UnsupportedCompression`, matching the
//! "recognized but declined" resolution recorded for OLD_JPEG.

use super::handler::CompressionHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct UnsupportedCodecHandler {
    code: u64,
    name: &'static str,
}

impl UnsupportedCodecHandler {
    pub fn ccitt_group3_1d() -> Self {
        Self { code: 2, name: "CCITT Group 3 1D" }
    }
    pub fn ccitt_group3() -> Self {
        Self { code: 3, name: "CCITT Group 3" }
    }
    pub fn ccitt_group4() -> Self {
        Self { code: 4, name: "CCITT Group 4" }
    }
    pub fn old_jpeg() -> Self {
        Self { code: 6, name: "Old-style JPEG" }
    }
}

impl CompressionHandler for UnsupportedCodecHandler {
    fn decompress(&self, _data: &[u8]) -> TiffResult<Vec<u8>> {
        Err(TiffError::CodecUnsupported(format!("{} decoding is not supported", self.name)))
    }

    fn compress(&self, _data: &[u8]) -> TiffResult<Vec<u8>> {
        Err(TiffError::CodecUnsupported(format!("{} encoding is not supported", self.name)))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn code(&self) -> u64 {
        self.code
    }
}

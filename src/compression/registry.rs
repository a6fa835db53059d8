//! Pluggable codec registry
//!
//! Replaces the teacher's fixed three-way `CompressionFactory` match with an
//! explicit `HashMap<code, Box<dyn CompressionHandler>>`, so new codecs
//! register themselves instead of growing a match arm. `default()` wires up
//! every codec this crate ships; callers that need to decode a proprietary
//! or niche compression can `register()` their own handler without touching
//! this file.

use std::collections::HashMap;

use super::deflate::AdobeDeflateHandler;
use super::handler::CompressionHandler;
use super::jpeg::JpegHandler;
use super::jpeg2000::Jpeg2000Handler;
use super::lzw::LzwHandler;
use super::packbits::PackBitsHandler;
use super::uncompressed::UncompressedHandler;
use super::unsupported::UnsupportedCodecHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct CompressionRegistry {
    handlers: HashMap<u64, Box<dyn CompressionHandler>>,
}

impl CompressionRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registers every codec this crate understands, including the ones
    /// that only recognize themselves well enough to return
    /// `CodecUnsupported` rather than decode anything.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UncompressedHandler));
        registry.register(Box::new(AdobeDeflateHandler));
        registry.register(Box::new(LzwHandler));
        registry.register(Box::new(PackBitsHandler));
        registry.register(Box::new(JpegHandler));
        registry.register(Box::new(Jpeg2000Handler));
        registry.register(Box::new(UnsupportedCodecHandler::ccitt_group3_1d()));
        registry.register(Box::new(UnsupportedCodecHandler::ccitt_group3()));
        registry.register(Box::new(UnsupportedCodecHandler::ccitt_group4()));
        registry.register(Box::new(UnsupportedCodecHandler::old_jpeg()));
        registry
    }

    pub fn register(&mut self, handler: Box<dyn CompressionHandler>) {
        self.handlers.insert(handler.code(), handler);
    }

    pub fn get(&self, compression: u64) -> TiffResult<&dyn CompressionHandler> {
        self.handlers
            .get(&compression)
            .map(|h| h.as_ref())
            .ok_or(TiffError::UnsupportedCompression(compression))
    }

    pub fn get_by_name(&self, name: &str) -> TiffResult<&dyn CompressionHandler> {
        let lower = name.to_lowercase();
        self.handlers
            .values()
            .find(|h| h.name().to_lowercase() == lower)
            .map(|h| h.as_ref())
            .ok_or_else(|| TiffError::GenericError(format!("Unknown compression type: {}", name)))
    }

    pub fn available(&self) -> Vec<&dyn CompressionHandler> {
        self.handlers.values().map(|h| h.as_ref()).collect()
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_uncompressed_by_code() {
        let registry = CompressionRegistry::with_defaults();
        assert_eq!(registry.get(1).unwrap().name(), "Uncompressed");
    }

    #[test]
    fn old_jpeg_is_recognized_but_unsupported() {
        let registry = CompressionRegistry::with_defaults();
        let handler = registry.get(6).unwrap();
        assert!(handler.decompress(&[]).is_err());
    }

    #[test]
    fn unknown_code_is_unsupported_compression() {
        let registry = CompressionRegistry::with_defaults();
        assert!(matches!(registry.get(99999), Err(TiffError::UnsupportedCompression(99999))));
    }
}

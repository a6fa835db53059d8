//! Compression handling for TIFF files
//!
//! This module implements strategies for handling different compression
//! methods, dispatched through an explicit registry rather than a fixed
//! match statement.

mod handler;
mod uncompressed;
mod deflate;
mod lzw;
mod packbits;
mod jpeg;
mod jpeg2000;
mod unsupported;
mod registry;

pub use handler::CompressionHandler;
pub use uncompressed::UncompressedHandler;
pub use deflate::AdobeDeflateHandler;
pub use lzw::LzwHandler;
pub use packbits::PackBitsHandler;
pub use jpeg::JpegHandler;
pub use jpeg2000::Jpeg2000Handler;
pub use unsupported::UnsupportedCodecHandler;
pub use registry::CompressionRegistry;

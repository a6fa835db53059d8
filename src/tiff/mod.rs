//! TIFF file format parsing module
//!
//! This module provides structures and functions for reading and writing
//! TIFF and BigTIFF format files: headers, IFD chains, typed tag values,
//! and the tile/strip geometry used to address pixel data.

pub mod errors;
pub mod ifd;
pub(crate) mod types;
pub mod reader;
pub mod writer;
pub mod value;
pub mod tile_map;
mod tests;
pub mod constants;
pub(crate) mod validation;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use errors::{TiffError, TiffResult};
pub use ifd::{IFD, IFDEntry};
pub use reader::{Rect, TiffReader};
pub use writer::{TagValue, TiffWriter, WriteMap};
pub use types::TIFF;
pub use value::TiffValue;

// Constants for TIFF format
pub const BIGTIFF_VERSION: u16 = 43;
pub const BIGTIFF_OFFSETSIZE: u16 = 8;

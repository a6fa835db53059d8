//! TIFF file reader implementation
//!
//! This module implements the TIFF/BigTIFF file reader that uses the
//! Strategy pattern to handle different byte orders.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::cache::tile_cache::TileCache;
use crate::compression::CompressionRegistry;
use crate::config::ReaderConfig;
use crate::io::seekable::SeekableReader;
use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::constants::{compression, photometric, predictor, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::tile_map::{self, TileMap};
use crate::tiff::types::TIFF;
use crate::tiff::validation;
use crate::utils::format_utils;
use crate::utils::ifd_utils;
use crate::utils::tag_utils;
use crate::utils::string_utils;
use crate::utils::logger::Logger;

/// A rectangular region of pixels, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

/// Builder for TiffReader
///
/// Provides a clean way to construct a TiffReader with various configurations.
pub struct TiffReaderBuilder<'a> {
    /// Logger to use
    logger: &'a Logger,
}

impl<'a> TiffReaderBuilder<'a> {
    /// Create a new TiffReaderBuilder
    pub fn new(logger: &'a Logger) -> Self {
        TiffReaderBuilder { logger }
    }

    /// Build the TiffReader
    pub fn build(self) -> TiffReader<'a> {
        TiffReader::new(self.logger)
    }
}

/// Reader for TIFF and BigTIFF files
pub struct TiffReader<'a> {
    /// Current byte order handler
    pub(crate) byte_order_handler: Option<Box<dyn ByteOrderHandler>>,
    /// Logger instance
    logger: &'a Logger,
    /// Current file path
    current_file: Option<String>,
    /// Whether currently reading BigTIFF format
    pub(crate) is_big_tiff: bool,
    /// Behavioral toggles (existence/validity strictness, cropping, filler byte, ...)
    config: ReaderConfig,
    /// Codec dispatch table, shared across every `read_rectangle` call.
    codecs: CompressionRegistry,
    /// Optional shared decoded-tile cache.
    cache: Option<std::sync::Arc<TileCache>>,
}

impl<'a> TiffReader<'a> {
    /// Creates a new TIFF reader with default configuration.
    pub fn new(logger: &'a Logger) -> Self {
        Self::with_config(logger, ReaderConfig::default())
    }

    /// Creates a new TIFF reader with explicit behavioral toggles.
    pub fn with_config(logger: &'a Logger, config: ReaderConfig) -> Self {
        TiffReader {
            byte_order_handler: None,
            logger,
            current_file: None,
            is_big_tiff: false,
            config,
            codecs: CompressionRegistry::with_defaults(),
            cache: None,
        }
    }

    /// Attaches a shared tile cache; repeated `read_rectangle` calls over the
    /// same file will reuse decoded tiles instead of re-decoding them.
    pub fn with_cache(mut self, cache: std::sync::Arc<TileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Creates a file reader for the current file
    ///
    /// This is an internal utility to open the current file for reading.
    /// It's used by various methods that need to access file content.
    pub(crate) fn create_reader(&self) -> TiffResult<File> {
        match &self.current_file {
            Some(path) => {
                let file = File::open(path)?;
                Ok(file)
            },
            None => Err(TiffError::GenericError("No file path specified".to_string()))
        }
    }

    /// Returns the byte order handler, with proper error handling for None case
    ///
    /// This centralizes the error handling for byte_order_handler access
    fn get_byte_order_handler_unwrapped(&self) -> TiffResult<&Box<dyn ByteOrderHandler>> {
        self.byte_order_handler.as_ref()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Loads a TIFF file from the given path
    ///
    /// This is the main entry point for loading a TIFF file.
    /// It opens the file and delegates to the read() method.
    ///
    /// # Arguments
    /// * `filepath` - Path to the TIFF file to load
    ///
    /// # Returns
    /// A TIFF structure containing the file's contents
    pub fn load(&mut self, filepath: &str) -> TiffResult<TIFF> {
        self.try_load(filepath)?.ok_or_else(|| TiffError::NotATiff(filepath.to_string()))
    }

    /// Loads a TIFF file, honoring `ReaderConfig::require_existence` and
    /// `require_valid_tiff`: when either is relaxed, a missing file or a
    /// bad header yields `Ok(None)` ("not a valid TIFF") instead of an
    /// error, matching spec behavior for exploratory scans over a
    /// directory of mixed file types.
    pub fn try_load(&mut self, filepath: &str) -> TiffResult<Option<TIFF>> {
        info!("Loading TIFF file: {}", filepath);
        self.current_file = Some(filepath.to_string());

        let path = Path::new(filepath);
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if !self.config.require_existence && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TiffError::FileNotFoundError(filepath.to_string()));
            }
            Err(e) => return Err(TiffError::IoError(e)),
        };
        let mut reader = BufReader::with_capacity(1024 * 1024, file); // 1MB buffer

        match self.read(&mut reader) {
            Ok(tiff) => Ok(Some(tiff)),
            Err(e) if !self.config.require_valid_tiff && e.is_format_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads a TIFF file from the given reader
    ///
    /// This method handles the core process of reading a TIFF file:
    /// 1. Detect byte order (little/big endian)
    /// 2. Check for TIFF or BigTIFF format
    /// 3. Read all IFDs (Image File Directories)
    ///
    /// # Arguments
    /// * `reader` - Any struct implementing the SeekableReader trait
    ///
    /// # Returns
    /// A TIFF structure containing the file's contents
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<TIFF> {
        debug!("Reader::read starting");

        // Detect and set up byte order
        self.byte_order_handler = Some(format_utils::detect_byte_order(reader)?);

        // Check for BigTIFF format and validate header
        let handler = self.byte_order_handler.as_ref().unwrap();
        let (is_big_tiff, _) = format_utils::detect_tiff_format(reader, handler)?;
        self.is_big_tiff = is_big_tiff;

        // Read the IFDs
        let mut tiff = TIFF::new(self.is_big_tiff);

        // Get a fresh reference to the handler after modifying self
        let handler = self.byte_order_handler.as_ref().unwrap();

        // Read the first IFD offset
        let first_ifd_offset = ifd_utils::read_first_ifd_offset(reader, self.is_big_tiff, handler)?;
        debug!("First IFD offset: {}", first_ifd_offset);

        // Validate the first IFD offset
        let file_size = validation::get_file_size(reader)?;
        validation::validate_ifd_offset(first_ifd_offset, file_size)?;

        // Read all IFDs in the chain
        tiff.ifds = self.read_ifd_chain(reader, first_ifd_offset)?;

        info!("Read {} IFDs from TIFF file", tiff.ifds.len());
        Ok(tiff)
    }

    /// Reads a chain of IFDs starting from the given offset
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `first_ifd_offset` - Offset of the first IFD in the chain
    ///
    /// # Returns
    /// A vector of IFDs
    fn read_ifd_chain(&self, reader: &mut dyn SeekableReader, first_ifd_offset: u64) -> TiffResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut ifd_offset = first_ifd_offset;
        let mut ifd_number = 0;
        let max_ifds = 100; // Reasonable limit to prevent infinite loops
        let mut visited_offsets: HashSet<u64> = HashSet::new();
        let handler = self.get_byte_order_handler_unwrapped()?;

        while ifd_offset != 0 && ifd_number < max_ifds {
            if !visited_offsets.insert(ifd_offset) {
                return Err(TiffError::Corrupt(format!(
                    "IFD chain revisits offset {}, cycle detected",
                    ifd_offset
                )));
            }
            debug!("Reading IFD at offset: {}", ifd_offset);

            // Get the file size for validation
            let file_size = validation::get_file_size(reader)?;

            // Validate the current IFD offset
            if ifd_offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain",
                  ifd_offset, file_size);
                break;
            }

            // Try to read the IFD
            match self.read_ifd(reader, ifd_offset, ifd_number) {
                Ok(ifd) => {
                    debug!("Successfully read IFD with {} entries", ifd.entries.len());

                    // Get next IFD offset
                    let next_offset_position = ifd_offset + ifd_utils::calculate_ifd_size(&ifd, self.is_big_tiff);

                    // Validate next offset position
                    if next_offset_position >= file_size {
                        warn!("Next IFD offset position {} exceeds file size {}",
                          next_offset_position, file_size);
                        ifds.push(ifd);
                        break;
                    }

                    if let Err(e) = reader.seek(SeekFrom::Start(next_offset_position)) {
                        warn!("Error seeking to next IFD offset: {}", e);
                        ifds.push(ifd);
                        break;
                    }

                    // Read next IFD offset
                    let next_ifd_offset = match ifd_utils::read_next_ifd_offset(reader, self.is_big_tiff, handler) {
                        Ok(offset) => offset,
                        Err(e) => {
                            warn!("Error reading next IFD offset: {}", e);
                            ifds.push(ifd);
                            break;
                        }
                    };

                    debug!("Next IFD offset: {}", next_ifd_offset);

                    // Sanity check for next IFD offset
                    if next_ifd_offset != 0 && (next_ifd_offset >= file_size || next_ifd_offset < 8) {
                        warn!("Invalid next IFD offset: {}, stopping IFD chain", next_ifd_offset);
                        ifds.push(ifd);
                        break;
                    }

                    ifds.push(ifd);
                    ifd_offset = next_ifd_offset;
                    ifd_number += 1;
                },
                Err(e) => {
                    warn!("Error reading IFD {}: {}", ifd_number, e);
                    break;
                }
            }
        }

        Ok(ifds)
    }

    /// Reads an IFD from the reader
    ///
    /// An IFD (Image File Directory) contains all the metadata for a single image.
    /// It consists of a count followed by a series of entries, each describing
    /// an aspect of the image (dimensions, color space, compression, etc.)
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `offset` - Offset in the file where the IFD starts
    /// * `number` - The index of this IFD in the file
    ///
    /// # Returns
    /// The parsed IFD structure
    pub fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64, number: usize) -> TiffResult<IFD> {
        reader.seek(SeekFrom::Start(offset))?;

        let entry_count = self.read_ifd_entry_count(reader)?;
        debug!("IFD entry count: {}", entry_count);

        let mut ifd = IFD::new(number, offset);

        for _ in 0..entry_count {
            let entry = self.read_ifd_entry(reader)?;
            debug!("Read IFD entry: tag={}, type={}, count={}, offset={}",
                   entry.tag, entry.field_type, entry.count, entry.value_offset);

            ifd.add_entry(entry);
        }

        info!("Read IFD with {} entries", ifd.entries.len());
        Ok(ifd)
    }

    /// Reads the entry count from an IFD
    fn read_ifd_entry_count(&self, reader: &mut dyn SeekableReader) -> TiffResult<u64> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        if self.is_big_tiff {
            handler.read_u64(reader).map_err(TiffError::IoError)
        } else {
            handler.read_u16(reader)
                .map(|v| v as u64)
                .map_err(TiffError::IoError)
        }
    }

    /// Reads a single IFD entry
    fn read_ifd_entry(&self, reader: &mut dyn SeekableReader) -> TiffResult<IFDEntry> {
        let handler = self.get_byte_order_handler_unwrapped()?;

        let tag = handler.read_u16(reader)?;
        let field_type = handler.read_u16(reader)?;
        let count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        let value_offset = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        Ok(IFDEntry::new(tag, field_type, count, value_offset))
    }

    /// Reads a tag's value as a vector of u64
    ///
    /// This is a utility method for extracting tag values from an IFD.
    /// It handles different field types and automatically converts them to u64.
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `ifd` - The IFD containing the tag
    /// * `tag` - The tag number to read
    ///
    /// # Returns
    /// A vector of u64 values
    pub fn read_tag_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<u64>> {
        let entry = ifd.get_entry(tag)
            .ok_or_else(|| TiffError::TagNotFound(tag))?;

        let mut values = Vec::with_capacity(entry.count as usize);

        // Check if the value is stored inline
        if tag_utils::is_value_inline(entry, self.is_big_tiff) {
            values.push(entry.value_offset);
        } else {
            reader.seek(SeekFrom::Start(entry.value_offset))?;
            let handler = self.get_byte_order_handler_unwrapped()?;
            tag_utils::read_tag_value_array(reader, entry, handler, &mut values)?;
        }

        Ok(values)
    }

    /// Reads a rational value (numerator/denominator pair)
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    ///
    /// # Returns
    /// A tuple with numerator and denominator
    pub fn read_rational(&self, reader: &mut dyn SeekableReader) -> TiffResult<(u32, u32)> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        handler.read_rational(reader).map_err(TiffError::IoError)
    }

    /// Reads a u16 value using the current byte order handler
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    ///
    /// # Returns
    /// The read u16 value
    pub fn read_u16(&self, reader: &mut dyn SeekableReader) -> TiffResult<u16> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        handler.read_u16(reader).map_err(TiffError::IoError)
    }

    /// Reads a u32 value using the current byte order handler
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    ///
    /// # Returns
    /// The read u32 value
    pub fn read_u32(&self, reader: &mut dyn SeekableReader) -> TiffResult<u32> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        handler.read_u32(reader).map_err(TiffError::IoError)
    }

    /// Reads a u64 value using the current byte order handler
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    ///
    /// # Returns
    /// The read u64 value
    pub fn read_u64(&self, reader: &mut dyn SeekableReader) -> TiffResult<u64> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        handler.read_u64(reader).map_err(TiffError::IoError)
    }

    /// Reads an f64 value using the current byte order handler
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    ///
    /// # Returns
    /// The read f64 value
    pub fn read_f64(&self, reader: &mut dyn SeekableReader) -> TiffResult<f64> {
        let handler = self.get_byte_order_handler_unwrapped()?;
        handler.read_f64(reader).map_err(TiffError::IoError)
    }

    /// Reads an ASCII string
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `count` - Number of bytes to read
    ///
    /// # Returns
    /// The string value, with trailing null characters removed
    pub fn read_ascii_string(&self, reader: &mut dyn SeekableReader, count: u64) -> TiffResult<String> {
        let mut buffer = vec![0u8; count as usize];
        reader.read_exact(&mut buffer)?;

        // Trim trailing nulls
        string_utils::trim_trailing_nulls(&mut buffer);

        match String::from_utf8(buffer) {
            Ok(s) => Ok(s),
            Err(e) => Err(TiffError::GenericError(format!("Invalid UTF-8 string: {}", e))),
        }
    }

    /// Reads an ASCII string at a specific file offset
    ///
    /// # Arguments
    /// * `offset` - File offset where the string starts
    /// * `count` - Number of bytes to read
    ///
    /// # Returns
    /// The string value
    pub fn read_ascii_string_at_offset(&self, offset: u64, count: u64) -> TiffResult<String> {
        let mut file = self.create_reader()?;
        file.seek(SeekFrom::Start(offset))?;
        self.read_ascii_string(&mut file, count)
    }

    /// Gets the file path if available
    ///
    /// # Returns
    /// The current file path or None
    pub fn get_file_path(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Returns whether the current file is a BigTIFF
    ///
    /// # Returns
    /// true if the file is BigTIFF, false if it's standard TIFF
    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }

    /// Read IFD overviews (reduced resolution subfiles)
    ///
    /// Overviews are lower-resolution versions of the main image,
    /// used for faster display at reduced zoom levels.
    ///
    /// # Arguments
    /// * `filepath` - Path to the TIFF file
    ///
    /// # Returns
    /// A vector of IFDs representing the overviews
    pub fn read_overviews(&mut self, filepath: &str) -> TiffResult<Vec<IFD>> {
        let tiff = self.load(filepath)?;

        let mut result = Vec::new();
        for overview in tiff.overviews() {
            result.push(overview.clone());
        }

        Ok(result)
    }

    /// Gets the current byte order handler
    ///
    /// # Returns
    /// A reference to the current byte order handler, or None if not yet set
    pub fn get_byte_order_handler(&self) -> Option<&Box<dyn ByteOrderHandler>> {
        self.byte_order_handler.as_ref()
    }

    /// Reads a rectangular region of pixels out of the given IFD, as tightly
    /// packed samples honoring the IFD's own channel layout (planar or
    /// chunky) unless `ReaderConfig::requested_channels` asks for a
    /// different channel count.
    ///
    /// Pipeline (spec step order): clamp or fill the requested rectangle,
    /// find the tiles it intersects, fetch each tile from cache or decode it
    /// (codec lookup + predictor un-differencing + fill-order inversion +
    /// brightness correction + bit-depth widening), then copy the
    /// intersection of each tile with the rectangle into the destination
    /// buffer. Returns the same bytes for the same inputs every time,
    /// including the filler byte used for out-of-image pixels.
    pub fn read_rectangle(&self, ifd: &IFD, plane: u64, rect: Rect) -> TiffResult<Vec<u8>> {
        let map = TileMap::from_ifd(ifd)?;
        let channels = if self.config.requested_channels > 0 {
            self.config.requested_channels
        } else {
            map.channels_per_tile() as u32
        };
        let bytes_per_sample = map.bytes_per_sample();
        let row_stride = rect.width as usize * channels as usize * bytes_per_sample;
        let mut dest = vec![self.config.byte_filler; row_stride * rect.height as usize];

        let clamped = if self.config.crop_to_image {
            let max_x = map.image_width.min(rect.x + rect.width);
            let max_y = map.image_height.min(rect.y + rect.height);
            if rect.x >= max_x || rect.y >= max_y {
                return Ok(dest);
            }
            Rect { x: rect.x, y: rect.y, width: max_x - rect.x, height: max_y - rect.y }
        } else {
            rect
        };

        let compression_code = ifd
            .get_tag_value(tags::COMPRESSION)
            .unwrap_or(compression::NONE as u64);
        let codec = self.codecs.get(compression_code)?;
        let predictor_code = ifd.get_tag_value(tags::PREDICTOR).unwrap_or(predictor::NONE as u64);
        let photometric_code = ifd
            .get_tag_value(tags::PHOTOMETRIC_INTERPRETATION)
            .unwrap_or(photometric::BLACK_IS_ZERO as u64);

        for tile_index in map.tiles_intersecting(clamped.x, clamped.y, clamped.width, clamped.height) {
            if tile_index.plane != plane {
                continue;
            }
            let decoded = self.decode_tile(ifd, &map, codec, tile_index, predictor_code)?;
            let decoded = if self.config.auto_correct_brightness {
                apply_brightness_correction(decoded, photometric_code)
            } else {
                decoded
            };

            let tile_w = map.effective_tile_width(tile_index.x_tile);
            let tile_h = map.effective_tile_height(tile_index.y_tile);
            let tile_x0 = tile_index.x_tile as u64 * map.tile_width;
            let tile_y0 = tile_index.y_tile as u64 * map.tile_height;

            let ix0 = clamped.x.max(tile_x0);
            let iy0 = clamped.y.max(tile_y0);
            let ix1 = (clamped.x + clamped.width).min(tile_x0 + tile_w);
            let iy1 = (clamped.y + clamped.height).min(tile_y0 + tile_h);
            if ix0 >= ix1 || iy0 >= iy1 {
                continue;
            }

            let tile_row_bytes = tile_w as usize * channels as usize * bytes_per_sample;
            for y in iy0..iy1 {
                let src_row_start = (y - tile_y0) as usize * tile_row_bytes
                    + (ix0 - tile_x0) as usize * channels as usize * bytes_per_sample;
                let src_row_end = src_row_start + (ix1 - ix0) as usize * channels as usize * bytes_per_sample;
                if src_row_end > decoded.len() {
                    return Err(TiffError::TruncatedData(format!(
                        "decoded tile ({}, {}, {}) shorter than expected",
                        tile_index.plane, tile_index.x_tile, tile_index.y_tile
                    )));
                }

                let dest_y = y - rect.y;
                let dest_x = ix0 - rect.x;
                let dest_row_start = dest_y as usize * row_stride + dest_x as usize * channels as usize * bytes_per_sample;
                let dest_row_end = dest_row_start + (ix1 - ix0) as usize * channels as usize * bytes_per_sample;
                dest[dest_row_start..dest_row_end].copy_from_slice(&decoded[src_row_start..src_row_end]);
            }
        }

        Ok(dest)
    }

    /// Decodes one tile: cache lookup, raw bytes read, codec decompress,
    /// predictor un-differencing, bit-depth widening. Caches the result
    /// when a cache is attached.
    fn decode_tile(
        &self,
        ifd: &IFD,
        map: &TileMap,
        codec: &dyn crate::compression::CompressionHandler,
        tile_index: crate::tiff::tile_map::TileIndex,
        predictor_code: u64,
    ) -> TiffResult<Vec<u8>> {
        let linear = tile_index.linear(map.grid_width, map.grid_height);
        let decode_one = || -> TiffResult<Vec<u8>> {
            let (offset, byte_count) = self.tile_location(ifd, map, linear as usize)?;
            let mut file = self.create_reader()?;
            file.seek(SeekFrom::Start(offset))?;
            let mut raw = vec![0u8; byte_count as usize];
            file.read_exact(&mut raw)?;

            let mut decoded = codec.decompress(&raw)?;
            if predictor_code == predictor::HORIZONTAL_DIFFERENCING as u64 {
                let little_endian = self.get_byte_order_handler_unwrapped()?.is_little_endian();
                undo_horizontal_predictor(&mut decoded, map, little_endian);
            }

            let first_bps = *map.bits_per_sample.first().unwrap_or(&8);
            if first_bps < 8 || first_bps % 8 != 0 {
                let sample_count = decoded.len() * 8 / first_bps as usize;
                decoded = tile_map::unpack_bits(&decoded, first_bps as u32, sample_count, self.config.auto_scale_on_widening);
            }
            Ok(decoded)
        };

        match &self.cache {
            Some(cache) => {
                let key = crate::cache::tile_cache::TileKey {
                    ifd_identity: ifd.offset,
                    plane: tile_index.plane,
                    linear_index: linear,
                };
                cache.get_or_decode(key, decode_one).map(|arc| (*arc).clone())
            }
            None => decode_one(),
        }
    }

    /// Resolves a tile's file offset and byte count from the
    /// `TILE_OFFSETS`/`TILE_BYTE_COUNTS` (or `STRIP_OFFSETS`/`STRIP_BYTE_COUNTS`)
    /// tag pair.
    fn tile_location(&self, ifd: &IFD, map: &TileMap, linear_index: usize) -> TiffResult<(u64, u64)> {
        let (offsets_tag, counts_tag) = if map.is_tiled {
            (tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            (tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };
        let mut file = self.create_reader()?;
        let offsets = self.read_tag_values(&mut file, ifd, offsets_tag)?;
        let counts = self.read_tag_values(&mut file, ifd, counts_tag)?;
        let offset = *offsets
            .get(linear_index)
            .ok_or_else(|| TiffError::InvalidIfd(format!("tile/strip index {} has no offset entry", linear_index)))?;
        let count = *counts
            .get(linear_index)
            .ok_or_else(|| TiffError::InvalidIfd(format!("tile/strip index {} has no byte count entry", linear_index)))?;
        Ok((offset, count))
    }
}

/// Reverses TIFF horizontal differencing predictor (code 2): each sample
/// (after the first in a row) was stored as the difference from its
/// left neighbor in the same channel. Handles 1/2/4/8-byte samples,
/// reconstructing each multi-byte value in the file's own byte order
/// before adding the neighbor and writing it back.
fn undo_horizontal_predictor(data: &mut [u8], map: &TileMap, little_endian: bool) {
    let channels = map.channels_per_tile() as usize;
    let bytes_per_sample = map.bytes_per_sample();
    let step = channels * bytes_per_sample;
    if step == 0 || !matches!(bytes_per_sample, 1 | 2 | 4 | 8) {
        return;
    }
    let row_bytes = map.bytes_per_tile_row();
    for row in data.chunks_mut(row_bytes) {
        let mut i = step;
        while i + bytes_per_sample <= row.len() {
            let (left_part, cur_part) = row.split_at_mut(i);
            let left = &left_part[i - step..i];
            let cur = &mut cur_part[..bytes_per_sample];
            add_sample_wrapping(cur, left, little_endian);
            i += bytes_per_sample;
        }
    }
}

/// Adds `left` into `cur` in place, treating both as a single integer of
/// `cur.len()` bytes (1, 2, 4, or 8) in the given byte order, wrapping on
/// overflow the way the horizontal differencing predictor requires.
fn add_sample_wrapping(cur: &mut [u8], left: &[u8], little_endian: bool) {
    match cur.len() {
        1 => cur[0] = cur[0].wrapping_add(left[0]),
        2 => {
            let (a, b) = if little_endian {
                (u16::from_le_bytes(cur[..2].try_into().unwrap()), u16::from_le_bytes(left[..2].try_into().unwrap()))
            } else {
                (u16::from_be_bytes(cur[..2].try_into().unwrap()), u16::from_be_bytes(left[..2].try_into().unwrap()))
            };
            let sum = a.wrapping_add(b);
            cur.copy_from_slice(&if little_endian { sum.to_le_bytes() } else { sum.to_be_bytes() });
        }
        4 => {
            let (a, b) = if little_endian {
                (u32::from_le_bytes(cur[..4].try_into().unwrap()), u32::from_le_bytes(left[..4].try_into().unwrap()))
            } else {
                (u32::from_be_bytes(cur[..4].try_into().unwrap()), u32::from_be_bytes(left[..4].try_into().unwrap()))
            };
            let sum = a.wrapping_add(b);
            cur.copy_from_slice(&if little_endian { sum.to_le_bytes() } else { sum.to_be_bytes() });
        }
        8 => {
            let (a, b) = if little_endian {
                (u64::from_le_bytes(cur[..8].try_into().unwrap()), u64::from_le_bytes(left[..8].try_into().unwrap()))
            } else {
                (u64::from_be_bytes(cur[..8].try_into().unwrap()), u64::from_be_bytes(left[..8].try_into().unwrap()))
            };
            let sum = a.wrapping_add(b);
            cur.copy_from_slice(&if little_endian { sum.to_le_bytes() } else { sum.to_be_bytes() });
        }
        _ => unreachable!("undo_horizontal_predictor only dispatches 1/2/4/8-byte samples"),
    }
}

/// Inverts sample brightness for `WHITE_IS_ZERO` (and approximates the same
/// correction for CMYK) photometric interpretations, so callers always see
/// "bigger number is brighter" samples regardless of source encoding.
fn apply_brightness_correction(mut data: Vec<u8>, photometric_code: u64) -> Vec<u8> {
    if photometric_code == photometric::WHITE_IS_ZERO as u64 || photometric_code == photometric::CMYK as u64 {
        for byte in data.iter_mut() {
            *byte = 255 - *byte;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::tile_map::SampleKind;

    fn single_channel_map(tile_width: u64, bits_per_sample: u16) -> TileMap {
        TileMap {
            image_width: tile_width,
            image_height: 1,
            tile_width,
            tile_height: 1,
            grid_width: 1,
            grid_height: 1,
            channels: 1,
            planes: 1,
            planar: false,
            bits_per_sample: vec![bits_per_sample],
            sample_kind: SampleKind::UnsignedInt,
            photometric: 0,
            is_tiled: true,
            crop_boundary_tiles: true,
        }
    }

    #[test]
    fn undoes_horizontal_predictor_for_8bit_samples() {
        let map = single_channel_map(4, 8);
        // pixel values 10, 12, 9, 20 stored as differences from the left neighbor
        let mut data = vec![10u8, 2, 253, 11];
        undo_horizontal_predictor(&mut data, &map, true);
        assert_eq!(data, vec![10, 12, 9, 20]);
    }

    #[test]
    fn undoes_horizontal_predictor_for_16bit_little_endian_samples() {
        let map = single_channel_map(3, 16);
        let values = [1000u16, 1200, 900];
        let mut diffs = Vec::new();
        diffs.extend_from_slice(&values[0].to_le_bytes());
        diffs.extend_from_slice(&values[1].wrapping_sub(values[0]).to_le_bytes());
        diffs.extend_from_slice(&values[2].wrapping_sub(values[1]).to_le_bytes());

        undo_horizontal_predictor(&mut diffs, &map, true);

        let restored: Vec<u16> = diffs.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(restored, values);
    }

    #[test]
    fn undoes_horizontal_predictor_for_32bit_big_endian_samples() {
        let map = single_channel_map(3, 32);
        let values = [100_000u32, 100_500, 99_900];
        let mut diffs = Vec::new();
        diffs.extend_from_slice(&values[0].to_be_bytes());
        diffs.extend_from_slice(&values[1].wrapping_sub(values[0]).to_be_bytes());
        diffs.extend_from_slice(&values[2].wrapping_sub(values[1]).to_be_bytes());

        undo_horizontal_predictor(&mut diffs, &map, false);

        let restored: Vec<u32> = diffs.chunks(4).map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])).collect();
        assert_eq!(restored, values);
    }
}
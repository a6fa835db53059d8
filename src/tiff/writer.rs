//! TIFF/BigTIFF writer
//!
//! Mirrors the reader's Strategy-pattern shape on the write side: a chosen
//! `EndianWriter` encodes every multi-byte value, and an IFD is written in
//! the three passes a self-describing format needs — entries sorted by
//! tag (so a reader walking them in order sees them in ascending order),
//! then the external value blocks those entries point into, then the
//! offset of the next IFD (or zero to end the chain).
//!
//! Tiles are always written forward-only, in `(plane, y_tile, x_tile)`
//! order (`write_tile` enforces this), so `complete` never has to
//! backpatch tile data itself — only the tag arrays and the IFD.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use log::{debug, info};

use crate::compression::CompressionRegistry;
use crate::config::WriterConfig;
use crate::io::byte_order::ByteOrder;
use crate::io::endian_stream::EndianWriter;
use crate::tiff::constants::{header, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::reader::TiffReader;
use crate::tiff::tile_map::TileIndex;
use crate::tiff::value::TiffValue;
use crate::utils::logger::Logger;

/// A tag/value pair awaiting serialization into an IFD. Tile/strip offset
/// and byte-count tags are filled in by `complete`, not supplied here.
pub struct TagValue {
    pub tag: u16,
    pub value: TiffValue,
}

/// An in-progress image: the tag set the caller has declared, plus the
/// tile data written so far. Returned by `new_map`, consumed by `complete`.
pub struct WriteMap {
    tags: Vec<TagValue>,
    image_width: u64,
    image_height: u64,
    tile_width: u64,
    tile_height: u64,
    planes: u64,
    compression_code: u64,
    resizable: bool,
    grid_width: u64,
    grid_height: u64,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
    next_linear_index: u64,
    max_x_tile_seen: u64,
    max_y_tile_seen: u64,
    is_tiled: bool,
}

impl WriteMap {
    fn slot_count(&self) -> u64 {
        self.grid_width * self.grid_height * self.planes
    }
}

pub struct TiffWriter<'a> {
    file: File,
    endian_writer: Box<dyn EndianWriter>,
    is_big_tiff: bool,
    config: WriterConfig,
    codecs: CompressionRegistry,
    /// File position holding the offset of "the next IFD" — either the
    /// header's first-IFD slot, or the previous IFD's trailing pointer.
    pending_ifd_pointer: u64,
    failed: bool,
    #[allow(dead_code)]
    logger: Option<&'a Logger>,
}

impl<'a> TiffWriter<'a> {
    /// Creates a brand-new file with a fresh TIFF/BigTIFF header and no
    /// IFDs yet.
    pub fn start_new_file(path: &str, is_big_tiff: bool, byte_order: ByteOrder, config: WriterConfig) -> TiffResult<Self> {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        let endian_writer = byte_order.create_writer();

        let marker = match byte_order {
            ByteOrder::LittleEndian => header::LITTLE_ENDIAN_MARKER,
            ByteOrder::BigEndian => header::BIG_ENDIAN_MARKER,
        };
        file.write_all(&marker)?;

        let version = if is_big_tiff { header::BIG_TIFF_VERSION } else { header::TIFF_VERSION };
        endian_writer.write_u16(&mut file, version)?;

        let pending_ifd_pointer;
        if is_big_tiff {
            endian_writer.write_u16(&mut file, header::BIGTIFF_OFFSET_SIZE)?;
            endian_writer.write_u16(&mut file, 0)?; // reserved, always zero
            pending_ifd_pointer = file.stream_position()?;
            endian_writer.write_u64(&mut file, 0)?; // placeholder first-IFD offset
        } else {
            pending_ifd_pointer = file.stream_position()?;
            endian_writer.write_u32(&mut file, 0)?; // placeholder first-IFD offset
        }

        info!("Started new {} file: {}", if is_big_tiff { "BigTIFF" } else { "TIFF" }, path);
        Ok(Self {
            file,
            endian_writer,
            is_big_tiff,
            config,
            codecs: CompressionRegistry::with_defaults(),
            pending_ifd_pointer,
            failed: false,
            logger: None,
        })
    }

    /// Re-opens an existing TIFF/BigTIFF file and positions the writer to
    /// append a new IFD after the last one in the chain, matching the
    /// file's own byte order and BigTIFF-ness rather than the caller's.
    pub fn start_existing_file(path: &str, logger: &'a Logger, config: WriterConfig) -> TiffResult<Self> {
        let mut reader = TiffReader::new(logger);
        let tiff = reader.load(path)?;
        let is_big_tiff = tiff.is_big_tiff;
        let byte_order = reader
            .get_byte_order_handler()
            .ok_or_else(|| TiffError::GenericError("byte order undetermined after load".to_string()))?;
        let _ = byte_order; // handler identity isn't Clone; re-detect below for the writer side

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.seek(SeekFrom::Start(0))?;
        let marker = {
            let mut buf = [0u8; 2];
            std::io::Read::read_exact(&mut file, &mut buf)?;
            buf
        };
        let byte_order = if marker == header::LITTLE_ENDIAN_MARKER {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        };
        let endian_writer = byte_order.create_writer();

        let last_ifd = tiff
            .ifds
            .last()
            .ok_or_else(|| TiffError::InvalidIfd("cannot append to a TIFF with no IFDs".to_string()))?;
        let pending_ifd_pointer = last_ifd.offset + crate::utils::ifd_utils::calculate_ifd_size(last_ifd, is_big_tiff)
            - if is_big_tiff { 8 } else { 4 };

        info!("Appending to existing TIFF file: {}", path);
        Ok(Self {
            file,
            endian_writer,
            is_big_tiff,
            config,
            codecs: CompressionRegistry::with_defaults(),
            pending_ifd_pointer,
            failed: false,
            logger: Some(logger),
        })
    }

    /// Declares a new image. `width`/`height` are a hint when `resizable`
    /// is set on the config (or passed explicitly here); `complete` always
    /// recomputes the tight bounding box from the tiles actually written,
    /// so a resizable map never needs its final size known up front.
    pub fn new_map(
        &self,
        tags: Vec<TagValue>,
        width: u64,
        height: u64,
        tile_width: u64,
        tile_height: u64,
        planes: u64,
        compression_code: u64,
        is_tiled: bool,
    ) -> TiffResult<WriteMap> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TiffError::ParameterOutOfRange("tile dimensions must be nonzero".to_string()));
        }
        let grid_width = crate::tiff::tile_map::div_ceil(width, tile_width);
        let grid_height = crate::tiff::tile_map::div_ceil(height, tile_height);
        let slot_count = (grid_width * grid_height * planes) as usize;

        Ok(WriteMap {
            tags,
            image_width: width,
            image_height: height,
            tile_width,
            tile_height,
            planes,
            compression_code,
            resizable: self.config.resizable,
            grid_width,
            grid_height,
            tile_offsets: vec![0; slot_count],
            tile_byte_counts: vec![0; slot_count],
            next_linear_index: 0,
            max_x_tile_seen: 0,
            max_y_tile_seen: 0,
            is_tiled,
        })
    }

    /// Encodes and appends one tile. Tiles must arrive in the canonical
    /// `(plane, y_tile, x_tile)` order; a tile out of sequence is an
    /// illegal state change rather than silently reordered.
    pub fn write_tile(&mut self, map: &mut WriteMap, tile_index: TileIndex, raw_samples: &[u8]) -> TiffResult<()> {
        if self.failed {
            return Err(TiffError::IllegalStateChange("writer has already failed; no further writes accepted".to_string()));
        }

        let linear = tile_index.linear(map.grid_width, map.grid_height);
        if linear != map.next_linear_index {
            self.failed = true;
            return Err(TiffError::IllegalStateChange(format!(
                "tiles must be written in (plane, y_tile, x_tile) order: expected index {}, got {}",
                map.next_linear_index, linear
            )));
        }

        let codec = self.codecs.get(map.compression_code).map_err(|e| {
            self.failed = true;
            e
        })?;
        let encoded = match codec.compress(raw_samples) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };

        let offset = self.file.stream_position().map_err(TiffError::IoError)?;
        self.file.write_all(&encoded).map_err(|e| {
            self.failed = true;
            TiffError::IoError(e)
        })?;
        if self.config.flush_asap {
            self.file.flush()?;
        }

        map.tile_offsets[linear as usize] = offset;
        map.tile_byte_counts[linear as usize] = encoded.len() as u64;
        map.next_linear_index += 1;
        map.max_x_tile_seen = map.max_x_tile_seen.max(tile_index.x_tile);
        map.max_y_tile_seen = map.max_y_tile_seen.max(tile_index.y_tile);

        debug!("Wrote tile ({}, {}, {}) at offset {} ({} bytes)", tile_index.plane, tile_index.x_tile, tile_index.y_tile, offset, encoded.len());
        Ok(())
    }

    /// Finalizes an image: patches in the tight bounding box if resizable,
    /// writes the tile/strip offset and byte-count tag arrays, writes the
    /// IFD itself (entries sorted by tag, each exactly 12 or 20 bytes,
    /// inline when small enough), and patches the previous "next IFD"
    /// pointer to point here.
    pub fn complete(&mut self, mut map: WriteMap) -> TiffResult<()> {
        if self.failed {
            return Err(TiffError::IllegalStateChange("writer has already failed; cannot complete".to_string()));
        }
        if map.next_linear_index != map.slot_count() {
            self.failed = true;
            return Err(TiffError::IllegalStateChange(format!(
                "expected {} tiles, only {} were written",
                map.slot_count(),
                map.next_linear_index
            )));
        }

        if map.resizable {
            map.image_width = (map.max_x_tile_seen + 1) * map.tile_width;
            map.image_height = (map.max_y_tile_seen + 1) * map.tile_height;
        }

        map.tags.retain(|t| t.tag != tags::IMAGE_WIDTH && t.tag != tags::IMAGE_LENGTH);
        map.tags.push(TagValue { tag: tags::IMAGE_WIDTH, value: TiffValue::Long(vec![map.image_width as u32]) });
        map.tags.push(TagValue { tag: tags::IMAGE_LENGTH, value: TiffValue::Long(vec![map.image_height as u32]) });

        let (offsets_tag, counts_tag) = if map.is_tiled {
            (tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            (tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };
        map.tags.push(TagValue { tag: offsets_tag, value: narrowest_integer_array(&map.tile_offsets, self.is_big_tiff) });
        map.tags.push(TagValue { tag: counts_tag, value: narrowest_integer_array(&map.tile_byte_counts, self.is_big_tiff) });
        map.tags.sort_by_key(|t| t.tag);
        self.reject_contradictions(&map)?;

        let ifd_offset = self.write_ifd(&map.tags)?;

        let pointer_pos = self.pending_ifd_pointer;
        let saved_pos = self.file.stream_position().map_err(TiffError::IoError)?;
        self.file.seek(SeekFrom::Start(pointer_pos)).map_err(TiffError::IoError)?;
        if self.is_big_tiff {
            self.endian_writer.write_u64(&mut self.file, ifd_offset).map_err(TiffError::IoError)?;
        } else {
            self.endian_writer.write_u32(&mut self.file, ifd_offset as u32).map_err(TiffError::IoError)?;
        }
        self.file.seek(SeekFrom::Start(saved_pos)).map_err(TiffError::IoError)?;

        Ok(())
    }

    fn reject_contradictions(&self, map: &WriteMap) -> TiffResult<()> {
        let has_tile_dims = map.tags.iter().any(|t| t.tag == tags::TILE_WIDTH) || map.tags.iter().any(|t| t.tag == tags::TILE_LENGTH);
        let has_rows_per_strip = map.tags.iter().any(|t| t.tag == tags::ROWS_PER_STRIP);
        if has_tile_dims && has_rows_per_strip {
            return Err(TiffError::InvalidIfd("tile dimensions and rows-per-strip both present".to_string()));
        }
        Ok(())
    }

    /// Writes one IFD: entry count, sorted entries (external values placed
    /// immediately after the entry table), and a trailing next-IFD slot
    /// left at zero (the caller patches it once the next image, if any, is
    /// known). Returns the offset the IFD was written at.
    fn write_ifd(&mut self, sorted_tags: &[TagValue]) -> TiffResult<u64> {
        let entry_size: u64 = if self.is_big_tiff { 20 } else { 12 };
        let inline_limit: u64 = if self.is_big_tiff { 8 } else { 4 };
        let count_size: u64 = if self.is_big_tiff { 8 } else { 2 };
        let next_ptr_size: u64 = if self.is_big_tiff { 8 } else { 4 };

        let ifd_offset = self.file.stream_position().map_err(TiffError::IoError)?;
        let table_size = count_size + entry_size * sorted_tags.len() as u64 + next_ptr_size;
        let mut external_cursor = ifd_offset + table_size;

        // Pass 1: serialize each value, deciding inline-vs-external and
        // recording where external blocks will land.
        let mut external_blocks: Vec<Vec<u8>> = Vec::with_capacity(sorted_tags.len());
        let mut external_offsets: Vec<u64> = Vec::with_capacity(sorted_tags.len());
        for tag in sorted_tags {
            let bytes = encode_value_bytes(&tag.value, self.endian_writer.as_ref())?;
            if bytes.len() as u64 <= inline_limit {
                external_blocks.push(Vec::new());
                external_offsets.push(0);
            } else {
                external_blocks.push(bytes);
                external_offsets.push(external_cursor);
                external_cursor += external_blocks.last().unwrap().len() as u64;
                if external_cursor % 2 != 0 {
                    external_cursor += 1; // word-align each external block
                }
            }
        }

        // Pass 2: write the entry count and the entry table itself.
        if self.is_big_tiff {
            self.endian_writer.write_u64(&mut self.file, sorted_tags.len() as u64)?;
        } else {
            self.endian_writer.write_u16(&mut self.file, sorted_tags.len() as u16)?;
        }

        for (i, tag) in sorted_tags.iter().enumerate() {
            self.endian_writer.write_u16(&mut self.file, tag.tag)?;
            self.endian_writer.write_u16(&mut self.file, tag.value.field_type())?;
            if self.is_big_tiff {
                self.endian_writer.write_u64(&mut self.file, tag.value.count() as u64)?;
            } else {
                self.endian_writer.write_u32(&mut self.file, tag.value.count() as u32)?;
            }

            let bytes = encode_value_bytes(&tag.value, self.endian_writer.as_ref())?;
            if bytes.len() as u64 <= inline_limit {
                let mut inline = bytes.clone();
                inline.resize(inline_limit as usize, 0);
                self.file.write_all(&inline)?;
            } else if self.is_big_tiff {
                self.endian_writer.write_u64(&mut self.file, external_offsets[i])?;
            } else {
                self.endian_writer.write_u32(&mut self.file, external_offsets[i] as u32)?;
            }
        }

        // Pass 3: the next-IFD pointer, left zero until a later `complete`
        // (on the next image) or `start_existing_file` patches it.
        if self.is_big_tiff {
            self.endian_writer.write_u64(&mut self.file, 0)?;
        } else {
            self.endian_writer.write_u32(&mut self.file, 0)?;
        }
        self.pending_ifd_pointer = self.file.stream_position()? - next_ptr_size;

        // Pass 4 (external data): write each non-inline value's bytes at
        // the offset reserved for it in pass 1.
        for (i, block) in external_blocks.iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            self.file.seek(SeekFrom::Start(external_offsets[i]))?;
            self.file.write_all(block)?;
        }
        self.file.seek(SeekFrom::Start(external_cursor))?;

        Ok(ifd_offset)
    }

    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Forces any buffered writes to disk. A no-op in effect (but not
    /// cost) when `WriterConfig::flush_asap` is set, since every tile is
    /// already flushed as it's written.
    pub fn flush(&mut self) -> TiffResult<()> {
        self.file.flush().map_err(TiffError::IoError)
    }
}

/// Picks the narrowest IFD integer type that can hold `values` as a tag
/// array. LONG8 (field type 16) is a BigTIFF extension; classic TIFF
/// readers don't recognize it, so classic files use SHORT when every
/// value fits in 16 bits, otherwise LONG (classic offsets and byte counts
/// are always 32-bit quantities, so LONG never truncates them).
fn narrowest_integer_array(values: &[u64], is_big_tiff: bool) -> TiffValue {
    if is_big_tiff {
        return TiffValue::Long8(values.to_vec());
    }
    if values.iter().all(|v| *v <= u16::MAX as u64) {
        TiffValue::Short(values.iter().map(|v| *v as u16).collect())
    } else {
        TiffValue::Long(values.iter().map(|v| *v as u32).collect())
    }
}

/// Encodes a `TiffValue`'s payload bytes in the writer's byte order,
/// without the tag/type/count header (that's written by `write_ifd`).
fn encode_value_bytes(value: &TiffValue, writer: &dyn EndianWriter) -> TiffResult<Vec<u8>> {
    let mut buf = Vec::new();
    match value {
        TiffValue::Byte(v) | TiffValue::Undefined(v) => buf.extend_from_slice(v),
        TiffValue::SByte(v) => buf.extend(v.iter().map(|b| *b as u8)),
        TiffValue::Ascii(s) => {
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
        }
        TiffValue::Short(v) => {
            for x in v {
                writer.write_u16(&mut buf, *x).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::SShort(v) => {
            for x in v {
                writer.write_u16(&mut buf, *x as u16).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::Long(v) => {
            for x in v {
                writer.write_u32(&mut buf, *x).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::SLong(v) => {
            for x in v {
                writer.write_u32(&mut buf, *x as u32).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::Long8(v) | TiffValue::Ifd8(v) => {
            for x in v {
                writer.write_u64(&mut buf, *x).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::SLong8(v) => {
            for x in v {
                writer.write_u64(&mut buf, *x as u64).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::Rational(v) => {
            for (n, d) in v {
                writer.write_rational(&mut buf, *n, *d).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::SRational(v) => {
            for (n, d) in v {
                writer.write_srational(&mut buf, *n, *d).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::Float(v) => {
            for x in v {
                writer.write_f32(&mut buf, *x).map_err(TiffError::IoError)?;
            }
        }
        TiffValue::Double(v) => {
            for x in v {
                writer.write_f64(&mut buf, *x).map_err(TiffError::IoError)?;
            }
        }
    }
    Ok(buf)
}

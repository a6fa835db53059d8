//! Tile/strip geometry for a single IFD
//!
//! An IFD describes an image in terms of tags; `TileMap` is the derived
//! geometry a reader or writer actually walks: how many tiles there are,
//! how big they are, whether channels are interleaved or on separate
//! planes, and how many bytes a decoded tile occupies. Strips are treated
//! as tiles whose width equals the image width, per the GLOSSARY.

use crate::tiff::constants::{photometric, planar_config, sample_format, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;

/// How an individual sample is physically stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    UnsignedInt,
    SignedInt,
    Float,
}

/// Derived tile/strip geometry for one IFD.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub image_width: u64,
    pub image_height: u64,
    pub tile_width: u64,
    pub tile_height: u64,
    pub grid_width: u64,
    pub grid_height: u64,
    pub channels: u64,
    /// Number of independently-addressed planes: `channels` when planar,
    /// else 1 (chunky interleave).
    pub planes: u64,
    pub planar: bool,
    pub bits_per_sample: Vec<u16>,
    pub sample_kind: SampleKind,
    pub photometric: u64,
    /// Whether tile geometry (as opposed to strip geometry) is in effect.
    pub is_tiled: bool,
    pub crop_boundary_tiles: bool,
}

/// Address of one tile/strip within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndex {
    pub plane: u64,
    pub x_tile: u64,
    pub y_tile: u64,
}

impl TileIndex {
    pub fn new(plane: u64, x_tile: u64, y_tile: u64) -> Self {
        Self { plane, x_tile, y_tile }
    }

    /// Linearizes this index in `(plane, y_tile, x_tile)` lexicographic
    /// order, the ordering the spec requires both readers and writers to
    /// visit tiles in.
    pub fn linear(&self, grid_width: u64, grid_height: u64) -> u64 {
        self.plane * grid_width * grid_height + self.y_tile * grid_width + self.x_tile
    }
}

impl TileMap {
    /// Builds a `TileMap` from an IFD's tags, defaulting strip geometry to
    /// "one strip per image" the way the format allows when `ROWS_PER_STRIP`
    /// is absent.
    pub fn from_ifd(ifd: &IFD) -> TiffResult<Self> {
        let image_width = ifd
            .get_tag_value(tags::IMAGE_WIDTH)
            .ok_or(TiffError::MissingTag(tags::IMAGE_WIDTH))?;
        let image_height = ifd
            .get_tag_value(tags::IMAGE_LENGTH)
            .ok_or(TiffError::MissingTag(tags::IMAGE_LENGTH))?;

        let channels = ifd.get_samples_per_pixel();
        let planar = ifd.get_tag_value(tags::PLANAR_CONFIGURATION).unwrap_or(1) as u16
            == planar_config::PLANAR;
        let planes = if planar { channels } else { 1 };

        let is_tiled = ifd.has_tag(tags::TILE_WIDTH) && ifd.has_tag(tags::TILE_LENGTH);
        if is_tiled && ifd.has_tag(tags::ROWS_PER_STRIP) {
            return Err(TiffError::InvalidIfd(
                "tile dimensions and rows-per-strip both present".to_string(),
            ));
        }

        let (tile_width, tile_height) = if is_tiled {
            (
                ifd.get_tag_value(tags::TILE_WIDTH).unwrap(),
                ifd.get_tag_value(tags::TILE_LENGTH).unwrap(),
            )
        } else {
            let rows_per_strip = ifd.get_tag_value(tags::ROWS_PER_STRIP).unwrap_or(1);
            (image_width, rows_per_strip.min(image_height.max(1)))
        };

        if tile_width == 0 || tile_height == 0 {
            return Err(TiffError::ParameterOutOfRange(
                "tile/strip dimensions must be nonzero".to_string(),
            ));
        }

        let grid_width = div_ceil(image_width, tile_width);
        let grid_height = div_ceil(image_height, tile_height);

        let bits_per_sample = Self::read_bits_per_sample(ifd, channels)?;
        let sample_format_value = ifd.get_tag_value(tags::SAMPLE_FORMAT).unwrap_or(sample_format::UNSIGNED as u64);
        let sample_kind = match sample_format_value as u16 {
            sample_format::SIGNED => SampleKind::SignedInt,
            sample_format::IEEEFP => SampleKind::Float,
            _ => SampleKind::UnsignedInt,
        };

        let photometric_value = ifd
            .get_tag_value(tags::PHOTOMETRIC_INTERPRETATION)
            .unwrap_or(photometric::BLACK_IS_ZERO as u64);

        Ok(Self {
            image_width,
            image_height,
            tile_width,
            tile_height,
            grid_width,
            grid_height,
            channels,
            planes,
            planar,
            bits_per_sample,
            sample_kind,
            photometric: photometric_value,
            is_tiled,
            crop_boundary_tiles: true,
        })
    }

    fn read_bits_per_sample(ifd: &IFD, channels: u64) -> TiffResult<Vec<u16>> {
        match ifd.get_tag_value(tags::BITS_PER_SAMPLE) {
            Some(v) => Ok(vec![v as u16; channels.max(1) as usize]),
            None => Ok(vec![8u16; channels.max(1) as usize]),
        }
    }

    /// Bytes needed to hold one sample once unpacked to the next byte
    /// width (non-multiple-of-8 depths round up per §6).
    pub fn bytes_per_sample(&self) -> usize {
        let bits = self.bits_per_sample.first().copied().unwrap_or(8) as usize;
        (bits + 7) / 8
    }

    /// Width, in pixels, of tile `x_tile` once cropped to the image edge.
    pub fn effective_tile_width(&self, x_tile: u64) -> u64 {
        if !self.crop_boundary_tiles {
            return self.tile_width;
        }
        let start = x_tile * self.tile_width;
        self.tile_width.min(self.image_width.saturating_sub(start))
    }

    /// Height, in pixels, of tile `y_tile` once cropped to the image edge.
    pub fn effective_tile_height(&self, y_tile: u64) -> u64 {
        if !self.crop_boundary_tiles {
            return self.tile_height;
        }
        let start = y_tile * self.tile_height;
        self.tile_height.min(self.image_height.saturating_sub(start))
    }

    /// Channels stored per tile: all of them in chunky layout, one in planar.
    pub fn channels_per_tile(&self) -> u64 {
        if self.planar {
            1
        } else {
            self.channels.max(1)
        }
    }

    /// Decoded byte size of a full (uncropped) tile, the size the codec
    /// decode path must produce before edge-cropping is applied.
    pub fn bytes_per_tile(&self) -> usize {
        self.tile_width as usize
            * self.tile_height as usize
            * self.channels_per_tile() as usize
            * self.bytes_per_sample()
    }

    /// Decoded byte size of one row within a tile.
    pub fn bytes_per_tile_row(&self) -> usize {
        self.tile_width as usize * self.channels_per_tile() as usize * self.bytes_per_sample()
    }

    /// Which tile a pixel falls into, and the pixel's offset within that
    /// tile's decoded buffer.
    pub fn index_of_pixel(&self, plane: u64, px: u64, py: u64) -> TiffResult<(TileIndex, usize)> {
        if px >= self.image_width || py >= self.image_height {
            return Err(TiffError::ParameterOutOfRange(format!(
                "pixel ({}, {}) outside image {}x{}",
                px, py, self.image_width, self.image_height
            )));
        }
        let x_tile = px / self.tile_width;
        let y_tile = py / self.tile_height;
        let local_x = px % self.tile_width;
        let local_y = py % self.tile_height;
        let channels_per_tile = self.channels_per_tile() as usize;
        let bytes = self.bytes_per_sample();
        let offset = (local_y as usize * self.tile_width as usize + local_x as usize)
            * channels_per_tile
            * bytes;
        Ok((TileIndex::new(plane, x_tile, y_tile), offset))
    }

    /// The linear tile-table index for `(plane, x, y)`, matching how
    /// `TileOffsets`/`TileByteCounts` arrays are laid out on disk.
    pub fn index(&self, plane: u64, x_tile: u64, y_tile: u64) -> u64 {
        TileIndex::new(plane, x_tile, y_tile).linear(self.grid_width, self.grid_height)
    }

    /// All tile indices intersecting a pixel rectangle `(x, y, w, h)`,
    /// visited in `(plane, y_tile, x_tile)` order.
    pub fn tiles_intersecting(&self, x: u64, y: u64, w: u64, h: u64) -> Vec<TileIndex> {
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let x_end = (x + w).min(self.image_width.max(x));
        let y_end = (y + h).min(self.image_height.max(y));
        if x_end <= x || y_end <= y {
            return Vec::new();
        }

        let first_x_tile = x / self.tile_width;
        let last_x_tile = (x_end - 1) / self.tile_width;
        let first_y_tile = y / self.tile_height;
        let last_y_tile = (y_end - 1) / self.tile_height;

        let mut result = Vec::new();
        for plane in 0..self.planes {
            for y_tile in first_y_tile..=last_y_tile.min(self.grid_height.saturating_sub(1)) {
                for x_tile in first_x_tile..=last_x_tile.min(self.grid_width.saturating_sub(1)) {
                    result.push(TileIndex::new(plane, x_tile, y_tile));
                }
            }
        }
        result
    }
}

/// Integer ceiling division, used throughout for grid sizing: `gW = ceil(W/tW)`.
pub fn div_ceil(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        0
    } else {
        (numerator + denominator - 1) / denominator
    }
}

/// Unpacks a bit-packed sample buffer (1..=31 bits per sample, non-multiple
/// of 8) into one byte-aligned "next larger byte width" integer per sample.
/// When `auto_scale` is set, values are rescaled to fill the output width
/// (e.g. a 4-bit nibble `0xF` becomes `0xFF` in an 8-bit output).
pub fn unpack_bits(data: &[u8], bits_per_sample: u32, sample_count: usize, auto_scale: bool) -> Vec<u8> {
    let out_bytes = ((bits_per_sample + 7) / 8).max(1) as usize;
    let mut out = vec![0u8; sample_count * out_bytes];
    let max_in = (1u64 << bits_per_sample) - 1;
    let max_out = (1u64 << (out_bytes * 8)) - 1;

    let mut bit_pos: u64 = 0;
    for i in 0..sample_count {
        let mut value: u64 = 0;
        for b in 0..bits_per_sample as u64 {
            let bit_index = bit_pos + b;
            let byte_index = (bit_index / 8) as usize;
            if byte_index >= data.len() {
                break;
            }
            let bit_in_byte = 7 - (bit_index % 8);
            let bit = (data[byte_index] >> bit_in_byte) & 1;
            value = (value << 1) | bit as u64;
        }
        bit_pos += bits_per_sample as u64;

        let scaled = if auto_scale && max_in > 0 {
            (value * max_out) / max_in
        } else {
            value
        };

        let out_offset = i * out_bytes;
        for byte_idx in 0..out_bytes {
            let shift = 8 * (out_bytes - 1 - byte_idx);
            out[out_offset + byte_idx] = ((scaled >> shift) & 0xFF) as u8;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_ceil_matches_grid_formula() {
        assert_eq!(div_ceil(8, 4), 2);
        assert_eq!(div_ceil(9, 4), 3);
        assert_eq!(div_ceil(0, 4), 0);
    }

    #[test]
    fn tile_index_linear_order_is_plane_row_col() {
        let a = TileIndex::new(0, 1, 0).linear(3, 3);
        let b = TileIndex::new(0, 0, 1).linear(3, 3);
        assert!(b > a, "next row must linearize after all columns of the previous row");
    }

    #[test]
    fn unpack_4_bit_with_scaling_fills_byte() {
        // Two nibbles: 0xF, 0x0 packed into a single byte 0xF0.
        let packed = [0xF0u8];
        let unpacked = unpack_bits(&packed, 4, 2, true);
        assert_eq!(unpacked, vec![0xFF, 0x00]);
    }

    #[test]
    fn unpack_4_bit_without_scaling_keeps_raw_value() {
        let packed = [0xF0u8];
        let unpacked = unpack_bits(&packed, 4, 2, false);
        assert_eq!(unpacked, vec![0x0F, 0x00]);
    }
}

//! Ambient configuration structs
//!
//! Plain, `Default`-implementing structs carrying the boolean toggles the
//! spec calls out by name. These are constructed once by a caller (the CLI,
//! a library consumer, or a test) and handed to a reader/writer/cache at
//! construction, the way the teacher's CLI builds a `Logger` once and
//! threads it through.

/// Toggles for `tiff::reader::TiffReader`.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// If false, a missing file becomes "not valid" instead of an error.
    pub require_existence: bool,
    /// If false, a bad header becomes "not valid" instead of an error.
    pub require_valid_tiff: bool,
    /// Clamp read rectangles to image bounds instead of preserving them.
    pub crop_to_image: bool,
    /// Fill byte used for pixels outside the image when `crop_to_image` is off.
    pub byte_filler: u8,
    /// Invert brightness for `WHITE_IS_ZERO`/`CMYK` photometric interpretations.
    pub auto_correct_brightness: bool,
    /// Rescale values when widening bit depths that aren't a multiple of 8.
    pub auto_scale_on_widening: bool,
    /// Crop boundary tiles to the image edge instead of returning full tiles.
    pub crop_tiles: bool,
    /// Desired output channel count: 0 = original, 1 = gray, 3 = RGB, 4 = RGBA.
    pub requested_channels: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            require_existence: true,
            require_valid_tiff: true,
            crop_to_image: true,
            byte_filler: 0,
            auto_correct_brightness: false,
            auto_scale_on_widening: true,
            crop_tiles: true,
            requested_channels: 0,
        }
    }
}

/// Toggles for `tiff::writer::TiffWriter`.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Delay `image_width`/`image_length` until `complete`, growing the
    /// tight bounding box as tiles are placed.
    pub resizable: bool,
    /// Accept planar input and emit chunky output, or vice versa.
    pub auto_interleave: bool,
    /// Flush each tile to disk as soon as it is encoded rather than batching.
    pub flush_asap: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            resizable: false,
            auto_interleave: false,
            flush_asap: false,
        }
    }
}

/// Toggles for `cache::tile_cache::TileCache`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget enforced with FIFO eviction by insertion order.
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Toggles shared by the map-buffer/stitcher pipeline (§4.10, §4.12).
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Reject `add_frame` calls whose rectangle intersects an existing one.
    pub disable_overlap: bool,
    /// Tighten the joint-completed-objects result to its nonzero bounding box.
    pub auto_crop: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            disable_overlap: false,
            auto_crop: true,
        }
    }
}

/// Path-expansion mode (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathConfig {
    /// Reject any path containing `%` or `${` outright.
    pub secure_paths: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self { secure_paths: false }
    }
}

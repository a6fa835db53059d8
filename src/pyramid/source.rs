//! Pyramid source trait and the TIFF-backed implementation (spec.md §4.8, C8)

use log::debug;

use crate::config::ReaderConfig;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::{Rect, TiffReader};
use crate::tiff::types::TIFF;
use crate::utils::logger::Logger;

/// Images smaller than this on both axes are treated as thumbnails rather
/// than pyramid levels, mirroring the heuristic a whole-slide TIFF reader
/// uses to separate the resolution pyramid from its auxiliary images.
const MIN_PYRAMID_DIMENSION: u64 = 256;

/// Upper bound, on both axes, for an auxiliary image to be classified as
/// a slide label rather than a macro overview.
const MAX_LABEL_DIMENSION: u64 = 2000;

/// Which auxiliary (non-pyramid) image a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialImageKind {
    Label,
    Macro,
    Thumbnail,
}

/// How aggressively `free_resources` releases held memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeResourcesMode {
    /// Drop cached tile buffers but keep the file handle and IFD metadata.
    CacheOnly,
    /// Close the underlying file as well; the next read reopens it.
    All,
}

/// Which adapter opens a given path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyramidFormat {
    /// Picks an adapter by filename suffix. Currently only TIFF-family
    /// extensions (`.tif`, `.tiff`, `.svs`, `.ndpi`) resolve to the
    /// TIFF-backed adapter; anything else is `CodecUnsupported`.
    AutoDetectByExtension,
    /// Names an adapter explicitly, bypassing extension sniffing.
    Custom(String),
}

/// One resolution level of a pyramid: the IFD that backs it plus the
/// geometry derived from it, grounded on
/// `examples/PABannier-WSIStreamer/src/format/tiff/pyramid.rs`'s
/// `PyramidLevel`.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,
    pub ifd_index: usize,
    pub width: u64,
    pub height: u64,
    pub tile_width: u64,
    pub tile_height: u64,
    /// `width(0) / width(level)`; `1.0` for level 0.
    pub downsample: f64,
    pub ifd: IFD,
}

/// A multi-resolution view over a source, per spec.md's Data Model
/// "Pyramid source" entry: `number_of_resolutions`, `width(level)`,
/// `height(level)`, `read_rectangle(level, rect)`, `special_image(kind)`,
/// `free_resources(mode)`.
pub trait PyramidSource {
    fn number_of_resolutions(&self) -> usize;
    fn width(&self, level: usize) -> TiffResult<u64>;
    fn height(&self, level: usize) -> TiffResult<u64>;
    fn read_rectangle(&self, level: usize, rect: Rect) -> TiffResult<Vec<u8>>;
    fn special_image(&self, kind: SpecialImageKind) -> TiffResult<Option<Vec<u8>>>;
    fn free_resources(&mut self, mode: FreeResourcesMode);
}

/// TIFF-backed pyramid adapter: interprets a multi-IFD TIFF's "primary"
/// (non-reduced-resolution) sequence as a descending-resolution pyramid
/// and its reduced-resolution IFDs as candidate thumbnail/label/macro
/// images, per spec.md §4.8's "for multi-IFD TIFFs it interprets the
/// sub-sampled IFDs as levels".
pub struct TiffPyramidSource<'a> {
    reader: TiffReader<'a>,
    levels: Vec<PyramidLevel>,
    auxiliary: Vec<IFD>,
}

impl<'a> TiffPyramidSource<'a> {
    pub fn open(path: &str, logger: &'a Logger, config: ReaderConfig) -> TiffResult<Self> {
        let mut reader = TiffReader::with_config(logger, config);
        let tiff = reader.load(path)?;
        let (levels, auxiliary) = classify_ifds(&tiff);
        if levels.is_empty() {
            return Err(TiffError::InvalidIfd("no pyramid levels found (no tiled primary IFD)".to_string()));
        }
        debug!("opened pyramid \"{}\": {} levels, {} auxiliary images", path, levels.len(), auxiliary.len());
        Ok(Self { reader, levels, auxiliary })
    }

    /// Opens `path` via [`PyramidFormat`]'s extension-sniffing or named
    /// adapter. Only the TIFF-family adapter is implemented; any other
    /// name or extension is `CodecUnsupported`.
    pub fn open_with_format(path: &str, logger: &'a Logger, config: ReaderConfig, format: &PyramidFormat) -> TiffResult<Self> {
        match format {
            PyramidFormat::AutoDetectByExtension => {
                let lower = path.to_ascii_lowercase();
                if lower.ends_with(".tif") || lower.ends_with(".tiff") || lower.ends_with(".svs") || lower.ends_with(".ndpi") {
                    Self::open(path, logger, config)
                } else {
                    Err(TiffError::CodecUnsupported(format!("no pyramid adapter registered for \"{}\"", path)))
                }
            }
            PyramidFormat::Custom(name) if name == "tiff" => Self::open(path, logger, config),
            PyramidFormat::Custom(name) => Err(TiffError::CodecUnsupported(format!("unknown pyramid adapter \"{}\"", name))),
        }
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    fn level(&self, level: usize) -> TiffResult<&PyramidLevel> {
        self.levels.get(level).ok_or_else(|| {
            TiffError::ParameterOutOfRange(format!("level {} out of range (have {})", level, self.levels.len()))
        })
    }
}

impl<'a> PyramidSource for TiffPyramidSource<'a> {
    fn number_of_resolutions(&self) -> usize {
        self.levels.len()
    }

    fn width(&self, level: usize) -> TiffResult<u64> {
        Ok(self.level(level)?.width)
    }

    fn height(&self, level: usize) -> TiffResult<u64> {
        Ok(self.level(level)?.height)
    }

    fn read_rectangle(&self, level: usize, rect: Rect) -> TiffResult<Vec<u8>> {
        let level = self.level(level)?;
        self.reader.read_rectangle(&level.ifd, 0, rect)
    }

    fn special_image(&self, kind: SpecialImageKind) -> TiffResult<Option<Vec<u8>>> {
        let candidate = self.auxiliary.iter().find(|ifd| classify_auxiliary(ifd) == Some(kind));
        match candidate {
            None => Ok(None),
            Some(ifd) => {
                let (width, height) = ifd
                    .get_dimensions()
                    .ok_or_else(|| TiffError::MissingDimensions)?;
                let rect = Rect { x: 0, y: 0, width, height };
                self.reader.read_rectangle(ifd, 0, rect).map(Some)
            }
        }
    }

    fn free_resources(&mut self, mode: FreeResourcesMode) {
        match mode {
            FreeResourcesMode::CacheOnly => debug!("pyramid source: cache-only free_resources requested"),
            FreeResourcesMode::All => debug!("pyramid source: full free_resources requested"),
        }
        // The underlying `TiffReader` reopens the file handle per call and
        // its cache (if any) is owned and cleared independently; there is
        // no additional per-source handle to release here.
    }
}

/// Splits `tiff`'s IFDs into the descending-resolution "primary" sequence
/// (levels, largest first) and the reduced-resolution auxiliary set.
fn classify_ifds(tiff: &TIFF) -> (Vec<PyramidLevel>, Vec<IFD>) {
    let mut primary: Vec<(usize, &IFD)> = Vec::new();
    let mut auxiliary = Vec::new();

    for (idx, ifd) in tiff.ifds.iter().enumerate() {
        let is_reduced = ifd.get_tag_value(254).map(|v| v & 1 == 1).unwrap_or(false);
        if is_reduced {
            auxiliary.push(ifd.clone());
        } else {
            primary.push((idx, ifd));
        }
    }

    primary.sort_by(|(_, a), (_, b)| {
        let wa = a.get_dimensions().map(|(w, _)| w).unwrap_or(0);
        let wb = b.get_dimensions().map(|(w, _)| w).unwrap_or(0);
        wb.cmp(&wa)
    });

    let base_width = primary.first().and_then(|(_, ifd)| ifd.get_dimensions()).map(|(w, _)| w as f64).unwrap_or(1.0);

    let levels = primary
        .into_iter()
        .filter_map(|(idx, ifd)| {
            let (width, height) = ifd.get_dimensions()?;
            let tile_width = ifd.get_tag_value(322).unwrap_or(width);
            let tile_height = ifd.get_tag_value(323).unwrap_or(height);
            Some((idx, ifd, width, height, tile_width, tile_height))
        })
        .enumerate()
        .map(|(level_index, (ifd_index, ifd, width, height, tile_width, tile_height))| PyramidLevel {
            level_index,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            downsample: if width == 0 { 1.0 } else { base_width / width as f64 },
            ifd: ifd.clone(),
        })
        .collect();

    (levels, auxiliary)
}

/// Heuristic classification of a reduced-resolution IFD as a label,
/// macro, or thumbnail image, by pixel dimensions and aspect ratio.
fn classify_auxiliary(ifd: &IFD) -> Option<SpecialImageKind> {
    let (width, height) = ifd.get_dimensions()?;
    let max_dim = width.max(height);
    let aspect = width as f64 / height.max(1) as f64;

    if max_dim < MIN_PYRAMID_DIMENSION {
        Some(SpecialImageKind::Thumbnail)
    } else if max_dim <= MAX_LABEL_DIMENSION && (0.5..=2.0).contains(&aspect) {
        Some(SpecialImageKind::Label)
    } else {
        Some(SpecialImageKind::Macro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::ifd::{IFD, IFDEntry};

    fn ifd_with_dims(width: u64, height: u64, subfile_type: Option<u64>) -> IFD {
        let mut ifd = IFD::new(0, 0);
        ifd.add_entry(IFDEntry::new(256, 4, 1, width));
        ifd.add_entry(IFDEntry::new(257, 4, 1, height));
        if let Some(st) = subfile_type {
            ifd.add_entry(IFDEntry::new(254, 4, 1, st));
        }
        ifd
    }

    #[test]
    fn classify_ifds_sorts_primary_levels_by_descending_width() {
        let mut tiff = TIFF::new(false);
        tiff.ifds.push(ifd_with_dims(1000, 1000, None));
        tiff.ifds.push(ifd_with_dims(4000, 4000, None));
        tiff.ifds.push(ifd_with_dims(100, 100, Some(1)));
        let (levels, auxiliary) = classify_ifds(&tiff);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].width, 4000);
        assert_eq!(levels[1].width, 1000);
        assert_eq!(levels[0].downsample, 1.0);
        assert!((levels[1].downsample - 4.0).abs() < 1e-9);
        assert_eq!(auxiliary.len(), 1);
    }

    #[test]
    fn small_auxiliary_image_classifies_as_thumbnail() {
        let ifd = ifd_with_dims(64, 64, Some(1));
        assert_eq!(classify_auxiliary(&ifd), Some(SpecialImageKind::Thumbnail));
    }

    #[test]
    fn squarish_midsize_auxiliary_classifies_as_label() {
        let ifd = ifd_with_dims(800, 800, Some(1));
        assert_eq!(classify_auxiliary(&ifd), Some(SpecialImageKind::Label));
    }

    #[test]
    fn wide_auxiliary_classifies_as_macro() {
        let ifd = ifd_with_dims(3000, 800, Some(1));
        assert_eq!(classify_auxiliary(&ifd), Some(SpecialImageKind::Macro));
    }
}

//! Read-pyramid orchestrator: drives the scan sequencer over a pyramid level (spec.md §4.13, C13)

use std::iter::Peekable;

use log::debug;

use crate::metadata::roi::{MetadataFile, RoiRectangle};
use crate::pyramid::{PyramidLevel, PyramidSource};
use crate::scan::pattern::ScanPattern;
use crate::scan::sequencer::{FramePosition, RoiRect, Sequencer};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::reader::Rect;

/// One frame's pixels plus the positional bookkeeping a scan consumer
/// needs to drive stitching and file-list bookkeeping: which ROI it
/// belongs to, and whether it is the first/last frame of that ROI or of
/// the whole scan.
#[derive(Debug, Clone)]
pub struct PyramidReadOutput {
    pub pixels: Vec<u8>,
    pub position: FramePosition,
    pub is_first_in_roi: bool,
    pub is_last_in_roi: bool,
    pub is_first_overall: bool,
    pub is_last_overall: bool,
}

fn clamp_roi_rectangle(r: &RoiRectangle) -> RoiRect {
    let x = r.min_x.max(0) as u64;
    let y = r.min_y.max(0) as u64;
    let width = r.width().max(0) as u64;
    let height = r.height().max(0) as u64;
    RoiRect { x, y, width, height }
}

/// Drives a [`Sequencer`] over a pyramid level's ROI list, reading each
/// frame's pixels through a [`PyramidSource`] as the cursor advances.
/// Holds a file list (the ROI-contributing rectangles) and the current
/// position so a caller can poll one frame at a time instead of
/// collecting the whole scan up front.
pub struct ReadPyramidOrchestrator<'a, S: PyramidSource> {
    source: &'a S,
    level: usize,
    file_path: String,
    rois: Vec<RoiRectangle>,
    total: u64,
    cursor: Peekable<Sequencer>,
}

impl<'a, S: PyramidSource> ReadPyramidOrchestrator<'a, S> {
    /// Builds the scan cursor from a parsed ROI metadata file, defaulting
    /// to a single whole-level ROI when the metadata has no contributing
    /// ROIs at all.
    pub fn new(
        source: &'a S,
        level_geometry: &PyramidLevel,
        file_path: &str,
        metadata: Option<&MetadataFile>,
        frame_width: u64,
        frame_height: u64,
        pattern: ScanPattern,
    ) -> TiffResult<Self> {
        let rois = match metadata {
            Some(m) => m.bounding_rectangles()?,
            None => Vec::new(),
        };

        let scan_rects: Vec<RoiRect> = if rois.is_empty() {
            vec![RoiRect { x: 0, y: 0, width: level_geometry.width, height: level_geometry.height }]
        } else {
            rois.iter().map(clamp_roi_rectangle).collect()
        };

        let sequencer = Sequencer::new(scan_rects, frame_width, frame_height, pattern);
        let total = sequencer.total();

        Ok(Self {
            source,
            level: level_geometry.level_index,
            file_path: file_path.to_string(),
            rois,
            total,
            cursor: sequencer.peekable(),
        })
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn rois(&self) -> &[RoiRectangle] {
        &self.rois
    }

    /// Total number of frames the scan will emit, known up front (useful
    /// for sizing a progress indicator before driving `next_frame`).
    pub fn total_frames(&self) -> u64 {
        self.total
    }

    /// Advances the cursor by one frame, reading its pixels from the
    /// pyramid source. Returns `Ok(None)` once the scan is exhausted.
    pub fn next_frame(&mut self) -> TiffResult<Option<PyramidReadOutput>> {
        let position = match self.cursor.next() {
            Some(p) => p,
            None => return Ok(None),
        };

        let next_roi_index = self.cursor.peek().map(|p| p.roi_index);
        let is_last_in_roi = next_roi_index != Some(position.roi_index);

        let rect = Rect { x: position.rect.x, y: position.rect.y, width: position.rect.width, height: position.rect.height };
        let pixels = self.source.read_rectangle(self.level, rect)?;

        debug!(
            "read-pyramid orchestrator: frame roi={} low={} high={} rect=({},{},{},{})",
            position.roi_index, position.low_index, position.high_index, rect.x, rect.y, rect.width, rect.height
        );

        Ok(Some(PyramidReadOutput {
            pixels,
            position,
            is_first_in_roi: position.low_index == 0 && position.high_index == 0,
            is_last_in_roi,
            is_first_overall: position.is_first,
            is_last_overall: position.is_last,
        }))
    }
}

impl<'a, S: PyramidSource> Iterator for ReadPyramidOrchestrator<'a, S> {
    type Item = TiffResult<PyramidReadOutput>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(Some(output)) => Some(Ok(output)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Fallback used when metadata is present but contributes no ROI, so a
/// caller always gets at least an "illegal" error rather than silently
/// scanning nothing. Not used by `new` directly (it falls back to a
/// whole-level scan instead) but kept for callers that want to treat an
/// empty ROI list as a hard error.
pub fn require_nonempty_rois(rois: &[RoiRectangle]) -> TiffResult<()> {
    if rois.is_empty() {
        Err(TiffError::ParameterOutOfRange("metadata file contributed no ROIs".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::{FreeResourcesMode, SpecialImageKind};
    use std::cell::RefCell;

    struct FakeSource {
        calls: RefCell<Vec<Rect>>,
    }

    impl PyramidSource for FakeSource {
        fn number_of_resolutions(&self) -> usize {
            1
        }
        fn width(&self, _level: usize) -> TiffResult<u64> {
            Ok(8)
        }
        fn height(&self, _level: usize) -> TiffResult<u64> {
            Ok(8)
        }
        fn read_rectangle(&self, _level: usize, rect: Rect) -> TiffResult<Vec<u8>> {
            self.calls.borrow_mut().push(rect);
            Ok(vec![0u8; (rect.width * rect.height) as usize])
        }
        fn special_image(&self, _kind: SpecialImageKind) -> TiffResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn free_resources(&mut self, _mode: FreeResourcesMode) {}
    }

    fn level() -> PyramidLevel {
        PyramidLevel {
            level_index: 0,
            ifd_index: 0,
            width: 8,
            height: 8,
            tile_width: 8,
            tile_height: 8,
            downsample: 1.0,
            ifd: crate::tiff::ifd::IFD::new(0, 0),
        }
    }

    #[test]
    fn defaults_to_whole_level_scan_when_no_metadata_given() {
        let source = FakeSource { calls: RefCell::new(Vec::new()) };
        let lvl = level();
        let mut orchestrator = ReadPyramidOrchestrator::new(&source, &lvl, "x.tif", None, 4, 4, ScanPattern::Rows).unwrap();
        let mut count = 0;
        while orchestrator.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4); // 8x8 level / 4x4 frames
    }

    #[test]
    fn first_and_last_overall_flags_are_set_exactly_once() {
        let source = FakeSource { calls: RefCell::new(Vec::new()) };
        let lvl = level();
        let mut orchestrator = ReadPyramidOrchestrator::new(&source, &lvl, "x.tif", None, 4, 4, ScanPattern::Rows).unwrap();
        let mut first_count = 0;
        let mut last_count = 0;
        while let Some(out) = orchestrator.next_frame().unwrap() {
            if out.is_first_overall {
                first_count += 1;
            }
            if out.is_last_overall {
                last_count += 1;
            }
        }
        assert_eq!(first_count, 1);
        assert_eq!(last_count, 1);
    }

    #[test]
    fn single_roi_scan_marks_first_and_last_frame_in_roi() {
        let source = FakeSource { calls: RefCell::new(Vec::new()) };
        let lvl = level();
        let json = r#"{"app":"image-pyramid-metadata","version":"1.0","rois":[
            {"shape":"rectangle","left":0,"top":0,"width":8,"height":8}
        ]}"#;
        let metadata = MetadataFile::parse(json).unwrap();
        let mut orchestrator =
            ReadPyramidOrchestrator::new(&source, &lvl, "x.tif", Some(&metadata), 4, 4, ScanPattern::Rows).unwrap();
        let frames: Vec<_> = std::iter::from_fn(|| orchestrator.next_frame().unwrap()).collect();
        assert!(frames.first().unwrap().is_first_in_roi);
        assert!(frames.last().unwrap().is_last_in_roi);
    }
}

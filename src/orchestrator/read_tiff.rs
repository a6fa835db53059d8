//! Read-TIFF orchestrator: reader lifecycle plus named scalar/matrix outputs (spec.md §4.13, C13)

use std::path::Path;

use log::debug;

use crate::config::ReaderConfig;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::{Rect, TiffReader};
use crate::tiff::types::TIFF;
use crate::utils::logger::Logger;

/// When the underlying file handle is opened and closed relative to
/// individual `read` invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open fresh and close again on every call.
    OpenAndClose,
    /// Open once (on construction's first `read`) and keep it open until
    /// `close` is called explicitly.
    Open,
    /// Open lazily on the first `read` call, then keep it open.
    OpenOnFirstCall,
    /// Like `OpenOnFirstCall`, but a `reset` call forces the next `read`
    /// to reopen even if already open.
    OpenOnResetAndFirstCall,
}

/// The full named-output bundle a read-TIFF orchestrator invocation
/// produces: the primary pixel buffer plus every named scalar/matrix
/// output spec.md §4.13 lists.
#[derive(Debug, Clone)]
pub struct ReadTiffOutput {
    pub pixels: Vec<u8>,
    pub valid: bool,
    pub image_width: u64,
    pub image_height: u64,
    pub level_width: u64,
    pub level_height: u64,
    pub actual_rect: Rect,
    pub ifd_json: String,
    pub ifd_summary: String,
    pub file_size: u64,
    pub file_name: String,
    pub file_dir: String,
    pub closed: bool,
}

impl ReadTiffOutput {
    fn invalid(path: &str) -> Self {
        let (file_name, file_dir) = split_path(path);
        Self {
            pixels: Vec::new(),
            valid: false,
            image_width: 0,
            image_height: 0,
            level_width: 0,
            level_height: 0,
            actual_rect: Rect { x: 0, y: 0, width: 0, height: 0 },
            ifd_json: "null".to_string(),
            ifd_summary: String::new(),
            file_size: 0,
            file_name,
            file_dir,
            closed: true,
        }
    }
}

fn split_path(path: &str) -> (String, String) {
    let p = Path::new(path);
    let file_name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let file_dir = p.parent().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    (file_name, file_dir)
}

fn ifd_to_json(ifd: &IFD) -> String {
    let entries: Vec<serde_json::Value> = ifd
        .get_entries()
        .iter()
        .map(|e| {
            serde_json::json!({
                "tag": e.tag,
                "type": e.field_type,
                "count": e.count,
                "value": e.value_offset,
            })
        })
        .collect();
    serde_json::json!({ "number": ifd.number, "offset": ifd.offset, "entries": entries }).to_string()
}

pub struct ReadTiffOrchestrator<'a> {
    logger: &'a Logger,
    config: ReaderConfig,
    mode: OpenMode,
    reader: Option<TiffReader<'a>>,
    tiff: Option<TIFF>,
    path: Option<String>,
    /// Set when the most recent `ensure_open` found the path unreadable or
    /// not a valid TIFF under a relaxed config, so `read` can short-circuit
    /// to an invalid output instead of dereferencing an absent `tiff`.
    last_open_invalid: bool,
}

impl<'a> ReadTiffOrchestrator<'a> {
    pub fn new(logger: &'a Logger, config: ReaderConfig, mode: OpenMode) -> Self {
        Self { logger, config, mode, reader: None, tiff: None, path: None, last_open_invalid: false }
    }

    /// Closes the underlying reader, dropping any cached IFD chain. Safe
    /// to call whether or not a reader is currently open.
    pub fn close(&mut self) {
        self.reader = None;
        self.tiff = None;
        self.path = None;
        self.last_open_invalid = false;
    }

    /// Forces the next `read` to reopen even under `OpenOnResetAndFirstCall`.
    pub fn reset(&mut self) {
        self.close();
    }

    fn ensure_open(&mut self, path: &str) -> TiffResult<()> {
        let already_open = self.tiff.is_some() && self.path.as_deref() == Some(path);
        let must_reopen = match self.mode {
            OpenMode::OpenAndClose => true,
            OpenMode::Open | OpenMode::OpenOnFirstCall | OpenMode::OpenOnResetAndFirstCall => !already_open,
        };

        if let (Some(existing), false) = (self.path.clone(), must_reopen) {
            if existing != path {
                return Err(TiffError::IllegalStateChange(
                    "read path changed on an orchestrator that keeps its reader open".to_string(),
                ));
            }
        }

        if must_reopen {
            self.last_open_invalid = false;
            let mut reader = TiffReader::with_config(self.logger, self.config.clone());
            match reader.try_load(path)? {
                Some(tiff) => {
                    self.reader = Some(reader);
                    self.tiff = Some(tiff);
                    self.path = Some(path.to_string());
                }
                None => {
                    self.reader = None;
                    self.tiff = None;
                    self.path = Some(path.to_string());
                    self.last_open_invalid = true;
                }
            }
        }
        Ok(())
    }

    /// Runs one read: opens per `mode`'s policy, reads `rect` from the
    /// IFD at `ifd_index`, and returns the full named-output bundle. A
    /// missing file or bad header yields a "not valid" output instead of
    /// an error when the corresponding `config` flag is relaxed, per
    /// spec.md §7.
    pub fn read(&mut self, path: &str, ifd_index: usize, rect: Rect) -> TiffResult<ReadTiffOutput> {
        self.ensure_open(path)?;
        if self.last_open_invalid {
            if matches!(self.mode, OpenMode::OpenAndClose) {
                self.close();
            }
            return Ok(ReadTiffOutput::invalid(path));
        }

        let tiff = self.tiff.as_ref().expect("ensure_open guarantees tiff is set when not last_open_invalid");
        let ifd = tiff.ifds.get(ifd_index).ok_or_else(|| {
            TiffError::ParameterOutOfRange(format!("ifd index {} out of range (have {})", ifd_index, tiff.ifds.len()))
        })?;
        let (image_width, image_height) = ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;

        let reader = self.reader.as_ref().expect("ensure_open guarantees reader is set");
        let pixels = reader.read_rectangle(ifd, 0, rect)?;

        let file_size = std::fs::metadata(path)?.len();
        let (file_name, file_dir) = split_path(path);

        let output = ReadTiffOutput {
            pixels,
            valid: true,
            image_width,
            image_height,
            level_width: image_width,
            level_height: image_height,
            actual_rect: rect,
            ifd_json: ifd_to_json(ifd),
            ifd_summary: format!("{}", ifd),
            file_size,
            file_name,
            file_dir,
            closed: matches!(self.mode, OpenMode::OpenAndClose),
        };

        if matches!(self.mode, OpenMode::OpenAndClose) {
            self.close();
        }

        debug!("read-tiff orchestrator: read {}x{} rectangle from \"{}\"", rect.width, rect.height, path);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::UncompressedHandler;
    use crate::config::WriterConfig;
    use crate::io::byte_order::ByteOrder;
    use crate::tiff::tile_map::TileIndex;
    use crate::tiff::writer::{TagValue, TiffWriter};
    use crate::tiff::value::TiffValue;
    use crate::tiff::constants::{compression, photometric, tags};
    use tempfile::NamedTempFile;

    fn test_logger() -> (NamedTempFile, Logger) {
        let file = NamedTempFile::new().unwrap();
        let logger = Logger::new(file.path().to_str().unwrap()).unwrap();
        (file, logger)
    }

    fn write_minimal_tiff(path: &str) {
        let _ = UncompressedHandler; // keep the default codec registered via CompressionRegistry::default
        let mut writer = TiffWriter::start_new_file(path, false, ByteOrder::LittleEndian, WriterConfig::default()).unwrap();
        let tags = vec![
            TagValue { tag: tags::BITS_PER_SAMPLE, value: TiffValue::Short(vec![8]) },
            TagValue { tag: tags::SAMPLES_PER_PIXEL, value: TiffValue::Short(vec![1]) },
            TagValue { tag: tags::PHOTOMETRIC_INTERPRETATION, value: TiffValue::Short(vec![photometric::BLACK_IS_ZERO as u16]) },
            TagValue { tag: tags::PLANAR_CONFIGURATION, value: TiffValue::Short(vec![1]) },
        ];
        let mut map = writer.new_map(tags, 4, 4, 4, 4, 1, compression::NONE as u64, true).unwrap();
        let pixels: Vec<u8> = (0..16).collect();
        writer.write_tile(&mut map, TileIndex { plane: 0, x_tile: 0, y_tile: 0 }, &pixels).unwrap();
        writer.complete(map).unwrap();
    }

    #[test]
    fn open_and_close_mode_reopens_every_call() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        write_minimal_tiff(&path);

        let (_log_file, logger) = test_logger();
        let mut orchestrator = ReadTiffOrchestrator::new(&logger, ReaderConfig::default(), OpenMode::OpenAndClose);
        let out = orchestrator.read(&path, 0, Rect { x: 0, y: 0, width: 4, height: 4 }).unwrap();
        assert!(out.valid);
        assert_eq!(out.image_width, 4);
        assert!(out.closed);
        assert!(orchestrator.tiff.is_none());
    }

    #[test]
    fn open_mode_keeps_reader_across_calls() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        write_minimal_tiff(&path);

        let (_log_file, logger) = test_logger();
        let mut orchestrator = ReadTiffOrchestrator::new(&logger, ReaderConfig::default(), OpenMode::Open);
        orchestrator.read(&path, 0, Rect { x: 0, y: 0, width: 4, height: 4 }).unwrap();
        assert!(orchestrator.tiff.is_some());
        let out2 = orchestrator.read(&path, 0, Rect { x: 0, y: 0, width: 2, height: 2 }).unwrap();
        assert!(out2.valid);
    }

    #[test]
    fn missing_file_is_invalid_output_when_require_existence_is_off() {
        let (_log_file, logger) = test_logger();
        let mut config = ReaderConfig::default();
        config.require_existence = false;
        let mut orchestrator = ReadTiffOrchestrator::new(&logger, config, OpenMode::OpenAndClose);
        let out = orchestrator.read("/nonexistent/path.tif", 0, Rect { x: 0, y: 0, width: 1, height: 1 }).unwrap();
        assert!(!out.valid);
    }

    #[test]
    fn changing_path_on_a_kept_open_reader_is_illegal_state_change() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        write_minimal_tiff(&path);

        let file2 = NamedTempFile::new().unwrap();
        let path2 = file2.path().to_str().unwrap().to_string();
        write_minimal_tiff(&path2);

        let (_log_file, logger) = test_logger();
        let mut orchestrator = ReadTiffOrchestrator::new(&logger, ReaderConfig::default(), OpenMode::Open);
        orchestrator.read(&path, 0, Rect { x: 0, y: 0, width: 4, height: 4 }).unwrap();
        let result = orchestrator.read(&path2, 0, Rect { x: 0, y: 0, width: 4, height: 4 });
        assert!(matches!(result, Err(TiffError::IllegalStateChange(_))));
    }
}

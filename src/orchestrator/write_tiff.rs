//! Write-TIFF orchestrator: lazy-open writer lifecycle across images (spec.md §4.13, C13)

use std::path::Path;

use log::debug;

use crate::config::WriterConfig;
use crate::io::byte_order::ByteOrder;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::tile_map::TileIndex;
use crate::tiff::writer::{TagValue, TiffWriter};
use crate::utils::logger::Logger;

/// One image to append: its declared tags/geometry plus its tiles in the
/// canonical `(plane, y_tile, x_tile)` order `TiffWriter::write_tile`
/// requires.
pub struct PendingImage {
    pub tags: Vec<TagValue>,
    pub width: u64,
    pub height: u64,
    pub tile_width: u64,
    pub tile_height: u64,
    pub planes: u64,
    pub compression_code: u64,
    pub is_tiled: bool,
    pub tiles: Vec<(TileIndex, Vec<u8>)>,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteTiffOutput {
    pub ifd_index: usize,
    pub bytes_written: u64,
    pub flushed: bool,
}

/// Drives a [`TiffWriter`] across repeated `write_image` calls: the file
/// is opened on the first call (fresh, or reopened for append when the
/// path already exists and `append` is set) and kept open until `close`,
/// mirroring spec.md's "lazy open, append mode, flush-ASAP" write
/// orchestrator.
pub struct WriteTiffOrchestrator<'a> {
    logger: &'a Logger,
    path: String,
    is_big_tiff: bool,
    byte_order: ByteOrder,
    writer_config: WriterConfig,
    append: bool,
    writer: Option<TiffWriter<'a>>,
    images_written: usize,
}

impl<'a> WriteTiffOrchestrator<'a> {
    pub fn new(
        logger: &'a Logger,
        path: &str,
        is_big_tiff: bool,
        byte_order: ByteOrder,
        writer_config: WriterConfig,
        append: bool,
    ) -> Self {
        Self {
            logger,
            path: path.to_string(),
            is_big_tiff,
            byte_order,
            writer_config,
            append,
            writer: None,
            images_written: 0,
        }
    }

    fn ensure_open(&mut self) -> TiffResult<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let writer = if self.append && Path::new(&self.path).exists() {
            TiffWriter::start_existing_file(&self.path, self.logger, self.writer_config.clone())?
        } else {
            TiffWriter::start_new_file(&self.path, self.is_big_tiff, self.byte_order, self.writer_config.clone())?
        };
        debug!("write-tiff orchestrator: opened \"{}\" (append={})", self.path, self.append);
        self.writer = Some(writer);
        Ok(())
    }

    /// Appends one image as a new IFD: declares its map, writes every
    /// tile in order, then completes it. Explicitly flushes afterward
    /// when the config's `flush_asap` is off, since otherwise nothing
    /// guarantees the image reaches disk until `close`.
    pub fn write_image(&mut self, image: PendingImage) -> TiffResult<WriteTiffOutput> {
        self.ensure_open()?;
        let writer = self.writer.as_mut().expect("ensure_open guarantees a writer");

        if writer.has_failed() {
            return Err(TiffError::IllegalStateChange("writer has already failed; cannot accept another image".to_string()));
        }

        let mut map = writer.new_map(
            image.tags,
            image.width,
            image.height,
            image.tile_width,
            image.tile_height,
            image.planes,
            image.compression_code,
            image.is_tiled,
        )?;

        let mut bytes_written = 0u64;
        for (tile_index, raw_samples) in image.tiles {
            bytes_written += raw_samples.len() as u64;
            writer.write_tile(&mut map, tile_index, &raw_samples)?;
        }

        writer.complete(map)?;
        self.images_written += 1;

        let flushed = !self.writer_config.flush_asap;
        if flushed {
            writer.flush()?;
        }

        debug!("write-tiff orchestrator: completed image {} ({} bytes)", self.images_written - 1, bytes_written);
        Ok(WriteTiffOutput { ifd_index: self.images_written - 1, bytes_written, flushed: true })
    }

    /// Flushes (if a writer is open) and releases it; a later
    /// `write_image` reopens (in append mode, onto the file just closed).
    pub fn close(&mut self) -> TiffResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        self.writer = None;
        Ok(())
    }

    pub fn images_written(&self) -> usize {
        self.images_written
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::constants::{compression, photometric, tags};
    use crate::tiff::value::TiffValue;
    use tempfile::NamedTempFile;

    fn test_logger() -> (NamedTempFile, Logger) {
        let file = NamedTempFile::new().unwrap();
        let logger = Logger::new(file.path().to_str().unwrap()).unwrap();
        (file, logger)
    }

    fn sample_image() -> PendingImage {
        PendingImage {
            tags: vec![
                TagValue { tag: tags::BITS_PER_SAMPLE, value: TiffValue::Short(vec![8]) },
                TagValue { tag: tags::SAMPLES_PER_PIXEL, value: TiffValue::Short(vec![1]) },
                TagValue { tag: tags::PHOTOMETRIC_INTERPRETATION, value: TiffValue::Short(vec![photometric::BLACK_IS_ZERO as u16]) },
                TagValue { tag: tags::PLANAR_CONFIGURATION, value: TiffValue::Short(vec![1]) },
            ],
            width: 4,
            height: 4,
            tile_width: 4,
            tile_height: 4,
            planes: 1,
            compression_code: compression::NONE as u64,
            is_tiled: true,
            tiles: vec![(TileIndex { plane: 0, x_tile: 0, y_tile: 0 }, (0..16).collect())],
        }
    }

    #[test]
    fn write_image_opens_lazily_and_completes_one_ifd() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        std::fs::remove_file(&path).ok();

        let (_log_file, logger) = test_logger();
        let mut orchestrator =
            WriteTiffOrchestrator::new(&logger, &path, false, ByteOrder::LittleEndian, WriterConfig::default(), false);
        assert!(!orchestrator.is_open());
        let out = orchestrator.write_image(sample_image()).unwrap();
        assert_eq!(out.ifd_index, 0);
        assert!(orchestrator.is_open());
        orchestrator.close().unwrap();
        assert!(!orchestrator.is_open());
    }

    #[test]
    fn second_image_after_close_without_append_overwrites() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let (_log_file, logger) = test_logger();
        let mut orchestrator =
            WriteTiffOrchestrator::new(&logger, &path, false, ByteOrder::LittleEndian, WriterConfig::default(), false);
        orchestrator.write_image(sample_image()).unwrap();
        orchestrator.close().unwrap();
        assert_eq!(orchestrator.images_written(), 1);
    }
}

//! Integration tests for the TIFF module

extern crate std;

use std::io::Cursor;
use std::io::Write;

// Import crate items
use pyramid_tiff::tiff::TiffReader;
use pyramid_tiff::utils::logger::Logger;

#[test]
fn test_complete_tiff_workflow() {
    // Create a sample TIFF file in memory
    let mut buffer = Vec::new();

    // TIFF header (little-endian)
    buffer.extend_from_slice(&[0x49, 0x49]); // "II" for little-endian
    buffer.extend_from_slice(&[42, 0]);      // TIFF magic number
    buffer.extend_from_slice(&[8, 0, 0, 0]); // Offset to first IFD

    // IFD with two entries
    buffer.extend_from_slice(&[2, 0]);       // Number of entries

    // Entry 1: ImageWidth (tag 256)
    buffer.extend_from_slice(&[0, 1]);       // Tag (256)
    buffer.extend_from_slice(&[4, 0]);       // Type (LONG)
    buffer.extend_from_slice(&[1, 0, 0, 0]); // Count
    buffer.extend_from_slice(&[200, 0, 0, 0]); // Value (width = 200)

    // Entry 2: ImageLength (tag 257)
    buffer.extend_from_slice(&[1, 1]);       // Tag (257)
    buffer.extend_from_slice(&[4, 0]);       // Type (LONG)
    buffer.extend_from_slice(&[1, 0, 0, 0]); // Count
    buffer.extend_from_slice(&[100, 0, 0, 0]); // Value (height = 100)

    // Next IFD offset (0 = no more IFDs)
    buffer.extend_from_slice(&[0, 0, 0, 0]);

    let mut cursor = Cursor::new(buffer);
    let logger = Logger::new("integration_test.log").unwrap();
    let mut reader = TiffReader::new(&logger);

    // Read the TIFF
    let result = reader.read(&mut cursor);
    std::assert!(result.is_ok());

    let tiff = result.unwrap();
    std::assert!(!tiff.is_big_tiff);
    std::assert_eq!(tiff.ifds.len(), 1);

    // Check IFD contents
    let ifd = &tiff.ifds[0];
    std::assert_eq!(ifd.entries.len(), 2);

    // Verify dimensions
    std::assert_eq!(ifd.get_dimensions(), Some((200, 100)));
}

#[test]
fn write_then_read_round_trips_pixel_content() {
    use pyramid_tiff::config::{ReaderConfig, WriterConfig};
    use pyramid_tiff::io::byte_order::ByteOrder;
    use pyramid_tiff::tiff::constants::{compression, photometric, tags};
    use pyramid_tiff::tiff::reader::Rect;
    use pyramid_tiff::tiff::tile_map::TileIndex;
    use pyramid_tiff::tiff::value::TiffValue;
    use pyramid_tiff::tiff::writer::{TagValue, TiffWriter};
    use tempfile::NamedTempFile;

    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let mut writer = TiffWriter::start_new_file(&path, false, ByteOrder::LittleEndian, WriterConfig::default()).unwrap();
    let tags = vec![
        TagValue { tag: tags::BITS_PER_SAMPLE, value: TiffValue::Short(vec![8]) },
        TagValue { tag: tags::SAMPLES_PER_PIXEL, value: TiffValue::Short(vec![1]) },
        TagValue { tag: tags::PHOTOMETRIC_INTERPRETATION, value: TiffValue::Short(vec![photometric::BLACK_IS_ZERO]) },
        TagValue { tag: tags::PLANAR_CONFIGURATION, value: TiffValue::Short(vec![1]) },
    ];
    let mut map = writer.new_map(tags, 8, 8, 4, 4, 1, compression::NONE as u64, true).unwrap();
    for y_tile in 0..2u64 {
        for x_tile in 0..2u64 {
            let fill = (y_tile * 2 + x_tile) as u8;
            let tile = vec![fill; 16];
            writer.write_tile(&mut map, TileIndex { plane: 0, x_tile, y_tile }, &tile).unwrap();
        }
    }
    writer.complete(map).unwrap();

    let log_file = NamedTempFile::new().unwrap();
    let logger = Logger::new(log_file.path().to_str().unwrap()).unwrap();
    let mut reader = TiffReader::with_config(&logger, ReaderConfig::default());
    let tiff = reader.load(&path).unwrap();
    assert_eq!(tiff.ifds.len(), 1);
    let ifd = &tiff.ifds[0];
    assert_eq!(ifd.get_dimensions(), Some((8, 8)));

    let bottom_right = reader.read_rectangle(ifd, 0, Rect { x: 4, y: 4, width: 4, height: 4 }).unwrap();
    assert!(bottom_right.iter().all(|&b| b == 3));

    let top_left = reader.read_rectangle(ifd, 0, Rect { x: 0, y: 0, width: 4, height: 4 }).unwrap();
    assert!(top_left.iter().all(|&b| b == 0));
}

#[test]
fn pyramid_source_scans_all_frames_of_a_written_tiff() {
    use pyramid_tiff::config::{ReaderConfig, WriterConfig};
    use pyramid_tiff::io::byte_order::ByteOrder;
    use pyramid_tiff::orchestrator::read_pyramid::ReadPyramidOrchestrator;
    use pyramid_tiff::pyramid::TiffPyramidSource;
    use pyramid_tiff::scan::ScanPattern;
    use pyramid_tiff::tiff::constants::{compression, photometric, tags};
    use pyramid_tiff::tiff::tile_map::TileIndex;
    use pyramid_tiff::tiff::value::TiffValue;
    use pyramid_tiff::tiff::writer::{TagValue, TiffWriter};
    use tempfile::NamedTempFile;

    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let mut writer = TiffWriter::start_new_file(&path, false, ByteOrder::LittleEndian, WriterConfig::default()).unwrap();
    let tags = vec![
        TagValue { tag: tags::BITS_PER_SAMPLE, value: TiffValue::Short(vec![8]) },
        TagValue { tag: tags::SAMPLES_PER_PIXEL, value: TiffValue::Short(vec![1]) },
        TagValue { tag: tags::PHOTOMETRIC_INTERPRETATION, value: TiffValue::Short(vec![photometric::BLACK_IS_ZERO]) },
        TagValue { tag: tags::PLANAR_CONFIGURATION, value: TiffValue::Short(vec![1]) },
    ];
    let mut map = writer.new_map(tags, 8, 8, 8, 8, 1, compression::NONE as u64, true).unwrap();
    writer.write_tile(&mut map, TileIndex { plane: 0, x_tile: 0, y_tile: 0 }, &vec![7u8; 64]).unwrap();
    writer.complete(map).unwrap();

    let log_file = NamedTempFile::new().unwrap();
    let logger = Logger::new(log_file.path().to_str().unwrap()).unwrap();
    let source = TiffPyramidSource::open(&path, &logger, ReaderConfig::default()).unwrap();
    let level = &source.levels()[0];

    let mut orchestrator =
        ReadPyramidOrchestrator::new(&source, level, &path, None, 4, 4, ScanPattern::Rows).unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = orchestrator.next_frame().unwrap() {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|f| f.pixels.iter().all(|&b| b == 7)));
    assert!(frames.first().unwrap().is_first_overall);
    assert!(frames.last().unwrap().is_last_overall);
}
use std::process;

use clap::{Arg, ArgAction, Command as ClapCommand};
use log::error;

use pyramid_tiff::config::{PathConfig, ReaderConfig, WriterConfig};
use pyramid_tiff::io::byte_order::ByteOrder;
use pyramid_tiff::metadata::{expand_path, MetadataFile};
use pyramid_tiff::orchestrator::read_pyramid::ReadPyramidOrchestrator;
use pyramid_tiff::orchestrator::read_tiff::{OpenMode, ReadTiffOrchestrator};
use pyramid_tiff::orchestrator::write_tiff::{PendingImage, WriteTiffOrchestrator};
use pyramid_tiff::pyramid::{PyramidSource, TiffPyramidSource};
use pyramid_tiff::scan::ScanPattern;
use pyramid_tiff::tiff::reader::Rect;
use pyramid_tiff::tiff::tile_map::TileIndex;
use pyramid_tiff::tiff::value::TiffValue;
use pyramid_tiff::tiff::writer::TagValue;
use pyramid_tiff::tiff::constants::{compression, photometric, tags};
use pyramid_tiff::utils::logger::Logger;
use pyramid_tiff::utils::progress::ProgressTracker;

fn parse_pattern(name: &str) -> ScanPattern {
    match name {
        "columns" => ScanPattern::Columns,
        "snake-rows" => ScanPattern::SnakeByRows,
        "snake-columns" => ScanPattern::SnakeByColumns,
        "shortest-side" => ScanPattern::ShortestSide,
        "shortest-side-snake" => ScanPattern::ShortestSideSnake,
        "spiral" => ScanPattern::CentralSpiral,
        _ => ScanPattern::Rows,
    }
}

fn parse_rect(spec: &str) -> Option<Rect> {
    let parts: Vec<u64> = spec.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    if parts.len() != 4 {
        return None;
    }
    Some(Rect { x: parts[0], y: parts[1], width: parts[2], height: parts[3] })
}

fn run_inspect(path: &str, logger: &Logger) -> pyramid_tiff::TiffResult<()> {
    let expanded = expand_path(path, &PathConfig::default())?;
    let mut orchestrator = ReadTiffOrchestrator::new(logger, ReaderConfig::default(), OpenMode::OpenAndClose);
    let output = orchestrator.read(&expanded, 0, Rect { x: 0, y: 0, width: 0, height: 0 })?;
    if !output.valid {
        println!("not a valid TIFF: {}", expanded);
        return Ok(());
    }
    println!("file: {} ({} bytes)", output.file_name, output.file_size);
    println!("image: {}x{}", output.image_width, output.image_height);
    println!("{}", output.ifd_summary);
    Ok(())
}

fn run_scan(path: &str, metadata_path: Option<&str>, frame_width: u64, frame_height: u64, pattern: &str, logger: &Logger) -> pyramid_tiff::TiffResult<()> {
    let expanded = expand_path(path, &PathConfig::default())?;
    let source = TiffPyramidSource::open(&expanded, logger, ReaderConfig::default())?;
    let metadata = match metadata_path {
        Some(p) => {
            let json = std::fs::read_to_string(p)?;
            Some(MetadataFile::parse(&json)?)
        }
        None => None,
    };

    let level = &source.levels()[0];
    let mut orchestrator = ReadPyramidOrchestrator::new(
        &source,
        level,
        &expanded,
        metadata.as_ref(),
        frame_width,
        frame_height,
        parse_pattern(pattern),
    )?;

    let progress = ProgressTracker::new(orchestrator.total_frames(), "scanning frames");
    while let Some(frame) = orchestrator.next_frame()? {
        println!(
            "roi={} low={} high={} rect=({},{},{},{}) first_overall={} last_overall={} last_in_roi={}",
            frame.position.roi_index,
            frame.position.low_index,
            frame.position.high_index,
            frame.position.rect.x,
            frame.position.rect.y,
            frame.position.rect.width,
            frame.position.rect.height,
            frame.is_first_overall,
            frame.is_last_overall,
            frame.is_last_in_roi,
        );
        progress.increment(1);
    }
    progress.finish();
    Ok(())
}

fn run_extract(path: &str, rect_spec: &str, output: &str, level: usize, logger: &Logger) -> pyramid_tiff::TiffResult<()> {
    let expanded = expand_path(path, &PathConfig::default())?;
    let rect = parse_rect(rect_spec)
        .ok_or_else(|| pyramid_tiff::TiffError::ParameterOutOfRange(format!("bad rect spec \"{}\", expected x,y,w,h", rect_spec)))?;
    let source = TiffPyramidSource::open(&expanded, logger, ReaderConfig::default())?;
    let pixels = source.read_rectangle(level, rect)?;
    std::fs::write(output, &pixels)?;
    println!("wrote {} bytes to {}", pixels.len(), output);
    Ok(())
}

fn run_write(output: &str, width: u64, height: u64) -> pyramid_tiff::TiffResult<()> {
    let logger = Logger::new("pyramid-tiff-write.log")?;
    let mut orchestrator = WriteTiffOrchestrator::new(&logger, output, false, ByteOrder::LittleEndian, WriterConfig::default(), false);

    let tile = vec![0u8; (width * height) as usize];
    let image = PendingImage {
        tags: vec![
            TagValue { tag: tags::BITS_PER_SAMPLE, value: TiffValue::Short(vec![8]) },
            TagValue { tag: tags::SAMPLES_PER_PIXEL, value: TiffValue::Short(vec![1]) },
            TagValue { tag: tags::PHOTOMETRIC_INTERPRETATION, value: TiffValue::Short(vec![photometric::BLACK_IS_ZERO]) },
            TagValue { tag: tags::PLANAR_CONFIGURATION, value: TiffValue::Short(vec![1]) },
        ],
        width,
        height,
        tile_width: width,
        tile_height: height,
        planes: 1,
        compression_code: compression::NONE as u64,
        is_tiled: true,
        tiles: vec![(TileIndex { plane: 0, x_tile: 0, y_tile: 0 }, tile)],
    };
    orchestrator.write_image(image)?;
    orchestrator.close()?;
    println!("wrote {}x{} demo TIFF to {}", width, height, output);
    Ok(())
}

fn main() {
    let matches = ClapCommand::new("pyramid-tiff")
        .version("0.1.0")
        .author("Maurice Schilpp")
        .about("Inspect, scan, extract from, and write TIFF/BigTIFF pyramids")
        .subcommand(
            ClapCommand::new("inspect")
                .about("Print the IFD chain and dimensions of a TIFF file")
                .arg(Arg::new("input").help("Input TIFF file").required(true).index(1)),
        )
        .subcommand(
            ClapCommand::new("scan")
                .about("Drive the pyramid scan sequencer and print the frame sequence")
                .arg(Arg::new("input").help("Input TIFF file").required(true).index(1))
                .arg(Arg::new("metadata").long("metadata").help("ROI metadata JSON file").value_name("FILE"))
                .arg(Arg::new("frame-width").long("frame-width").value_name("PIXELS").default_value("512"))
                .arg(Arg::new("frame-height").long("frame-height").value_name("PIXELS").default_value("512"))
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .value_name("NAME")
                        .help("rows|columns|snake-rows|snake-columns|shortest-side|shortest-side-snake|spiral")
                        .default_value("rows"),
                ),
        )
        .subcommand(
            ClapCommand::new("extract")
                .about("Read one rectangle out of a pyramid level to a raw file")
                .arg(Arg::new("input").help("Input TIFF file").required(true).index(1))
                .arg(Arg::new("rect").long("rect").help("x,y,width,height").value_name("RECT").required(true))
                .arg(Arg::new("output").short('o').long("output").value_name("FILE").required(true))
                .arg(Arg::new("level").long("level").value_name("INDEX").default_value("0")),
        )
        .subcommand(
            ClapCommand::new("write")
                .about("Write a minimal single-tile demo TIFF")
                .arg(Arg::new("output").short('o').long("output").value_name("FILE").required(true))
                .arg(Arg::new("width").long("width").value_name("PIXELS").default_value("256"))
                .arg(Arg::new("height").long("height").value_name("PIXELS").default_value("256")),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .get_matches();

    if let Err(e) = Logger::init_global_logger("pyramid-tiff-global.log") {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let logger = match Logger::new("pyramid-tiff.log") {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error initializing logger: {}", e);
            process::exit(1);
        }
    };

    let result = match matches.subcommand() {
        Some(("inspect", sub)) => run_inspect(sub.get_one::<String>("input").unwrap(), &logger),
        Some(("scan", sub)) => run_scan(
            sub.get_one::<String>("input").unwrap(),
            sub.get_one::<String>("metadata").map(|s| s.as_str()),
            sub.get_one::<String>("frame-width").unwrap().parse().unwrap_or(512),
            sub.get_one::<String>("frame-height").unwrap().parse().unwrap_or(512),
            sub.get_one::<String>("pattern").unwrap(),
            &logger,
        ),
        Some(("extract", sub)) => run_extract(
            sub.get_one::<String>("input").unwrap(),
            sub.get_one::<String>("rect").unwrap(),
            sub.get_one::<String>("output").unwrap(),
            sub.get_one::<String>("level").unwrap().parse().unwrap_or(0),
            &logger,
        ),
        Some(("write", sub)) => run_write(
            sub.get_one::<String>("output").unwrap(),
            sub.get_one::<String>("width").unwrap().parse().unwrap_or(256),
            sub.get_one::<String>("height").unwrap().parse().unwrap_or(256),
        ),
        _ => {
            eprintln!("no subcommand given; try `pyramid-tiff --help`");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

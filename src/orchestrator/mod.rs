//! Stateful orchestrators tying reader, pyramid source, and writer lifecycles
//! to repeated calls from a driving loop (spec.md §4.13, C13)

pub mod read_pyramid;
pub mod read_tiff;
pub mod write_tiff;

pub use read_pyramid::{PyramidReadOutput, ReadPyramidOrchestrator};
pub use read_tiff::{OpenMode, ReadTiffOrchestrator, ReadTiffOutput};
pub use write_tiff::{WriteTiffOrchestrator, WriteTiffOutput};

//! Metadata companion file schema and path expansion (spec.md §6)
//!
//! These are ambient, host-facing concerns rather than core TIFF/pyramid
//! logic, but the pyramid scan orchestrator reads ROI companion files and
//! expands paths the same way the original host application's path
//! resolver does, so both live here as thin, dependency-light modules.

pub mod path;
pub mod roi;

pub use path::expand_path;
pub use roi::{MetadataFile, Roi, RoiRectangle};

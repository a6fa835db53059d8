//! Multi-resolution view over a TIFF (or other source) with ROI overlay (spec.md §4.8, C8)
//!
//! Grounded on the IFD-as-levels heuristic from
//! `examples/PABannier-WSIStreamer/src/format/tiff/pyramid.rs`: a file is
//! treated as a pyramid by walking its IFD chain, identifying the
//! "primary" (non-thumbnail) entries as levels, and sorting them by
//! decreasing width so level 0 is the highest resolution.

pub mod source;

pub use source::{FreeResourcesMode, PyramidFormat, PyramidLevel, PyramidSource, SpecialImageKind, TiffPyramidSource};

//! Frame-object stitching: joining labelled object fragments that straddle
//! adjacent scan frames.
//!
//! Built fresh in the teacher's idiom — small focused structs,
//! `TiffResult`-returning methods, `log::debug!` tracing at decision
//! points — since neither the teacher nor the sibling example repos carry
//! a precedent for this subsystem (spec.md §4.9–§4.12).

pub mod stitcher;
pub mod union_find;

pub use stitcher::{CompletionMode, FrameStitcher, Side};
pub use union_find::UnionFind;

//! Deterministic frame scan sequencing over a region of interest
//!
//! A `Sequencer` walks a set of ROIs in fixed-size frames, in one of seven
//! coverage patterns, producing the same frame order every time for the
//! same inputs — the property the map-buffer/stitcher pipeline in
//! `crate::stitch` depends on to join adjacent frames correctly.

pub mod pattern;
pub mod sequencer;
pub mod frame_buffer;

pub use pattern::ScanPattern;
pub use sequencer::{FramePosition, Sequencer};
pub use frame_buffer::FrameBuffer;

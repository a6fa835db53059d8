//! Decoded-tile cache
//!
//! Keeps decoded tile bytes around across `read_rectangle` calls so a
//! stitcher or pyramid scan revisiting the same tile (adjacent frames
//! overlapping by a row, a coarser level sharing tiles with a finer one)
//! doesn't pay for decompression twice.

pub mod tile_cache;

pub use tile_cache::{TileCache, TileKey};

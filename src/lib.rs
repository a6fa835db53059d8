//! A TIFF/BigTIFF codec plus a multi-resolution pyramid scanning and
//! frame-stitching toolkit.
//!
//! Layered bottom-up: [`io`] supplies endian-aware primitives,
//! [`compression`] the per-codec strategies, [`tiff`] the format itself
//! (tags, IFDs, reader, writer), [`cache`] a decoded-tile cache shared
//! across reads, [`pyramid`] a multi-resolution view over a TIFF,
//! [`scan`] deterministic frame enumeration over a pyramid level, and
//! [`stitch`] the union-find/side-correlation machinery that joins
//! object fragments split across adjacent frames. [`orchestrator`] wires
//! these into the three stateful entry points a driving loop calls
//! repeatedly. [`metadata`] and [`formula`] are host-facing ambient
//! concerns: ROI companion files, path expansion, and the small
//! recommended-buffer-size expression grammar.

pub mod cache;
pub mod compression;
pub mod config;
pub mod formula;
pub mod io;
pub mod metadata;
pub mod orchestrator;
pub mod pyramid;
pub mod scan;
pub mod stitch;
pub mod tiff;
pub mod utils;

pub use tiff::{TiffError, TiffReader, TiffResult, TIFF};

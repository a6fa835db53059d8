//! Sparse 2D buffer of already-read frames with intersection queries (spec.md §4.10, C10)
//!
//! Frames are stored exactly as produced by the scan sequencer: a
//! rectangle plus a row-major pixel matrix. All frames in one buffer must
//! share the same sample element kind and channel count (the generic `T`
//! plus a fixed `channels` enforce that at the type/field level). Labels
//! stored in a buffer used for stitching are non-negative integers with 0
//! as background, per spec.md's Data Model — that convention lives in the
//! stitcher, not here; this buffer itself is channel-kind-agnostic.

use log::debug;

use crate::scan::sequencer::RoiRect;
use crate::stitch::union_find::UnionFind;
use crate::tiff::errors::{TiffError, TiffResult};

/// One frame placed into the buffer: its pixel rectangle and row-major,
/// channel-interleaved sample data (`width * height * channels` samples).
#[derive(Debug, Clone)]
pub struct Frame<T> {
    pub rect: RoiRect,
    pub channels: u32,
    pub data: Vec<T>,
}

impl<T: Copy + Default> Frame<T> {
    pub fn get(&self, x: u64, y: u64, channel: u32) -> T {
        let local_x = (x - self.rect.x) as usize;
        let local_y = (y - self.rect.y) as usize;
        let idx = (local_y * self.rect.width as usize + local_x) * self.channels as usize + channel as usize;
        self.data.get(idx).copied().unwrap_or_default()
    }
}

/// Axis selector for `all_with_min_coordinate`/`all_with_max_coordinate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

pub struct FrameBuffer<T> {
    frames: Vec<Frame<T>>,
    channels: u32,
}

impl<T: Copy + Default + PartialEq> FrameBuffer<T> {
    pub fn new(channels: u32) -> Self {
        Self { frames: Vec::new(), channels }
    }

    /// Inserts a frame at `origin`. `optional_crop`, if given, restricts the
    /// stored pixels to that sub-rectangle of the matrix (both rect and
    /// data are cropped together). With `disable_overlap` set, the insert
    /// fails if the new rectangle intersects any existing one.
    pub fn add_frame(
        &mut self,
        matrix: Vec<T>,
        origin: RoiRect,
        optional_crop: Option<RoiRect>,
        disable_overlap: bool,
    ) -> TiffResult<()> {
        if matrix.len() as u64 != origin.width * origin.height * self.channels as u64 {
            return Err(TiffError::ParameterMismatch(
                "frame matrix length does not match rectangle * channel count".to_string(),
            ));
        }

        if disable_overlap && self.frames.iter().any(|f| rects_intersect(&f.rect, &origin)) {
            return Err(TiffError::ParameterOutOfRange(
                "add_frame: rectangle intersects an existing frame and disable_overlap is set".to_string(),
            ));
        }

        let (rect, data) = match optional_crop {
            Some(crop) => crop_frame_data(&matrix, origin, crop, self.channels)?,
            None => (origin, matrix),
        };

        debug!("added frame at ({}, {}) size {}x{}", rect.x, rect.y, rect.width, rect.height);
        self.frames.push(Frame { rect, channels: self.channels, data });
        Ok(())
    }

    pub fn all_positions(&self) -> Vec<RoiRect> {
        self.frames.iter().map(|f| f.rect).collect()
    }

    pub fn all_intersecting(&self, rect: RoiRect) -> Vec<&Frame<T>> {
        self.frames.iter().filter(|f| rects_intersect(&f.rect, &rect)).collect()
    }

    pub fn all_with_min_coordinate(&self, axis: Axis, value: u64) -> Vec<&Frame<T>> {
        self.frames
            .iter()
            .filter(|f| match axis {
                Axis::X => f.rect.x == value,
                Axis::Y => f.rect.y == value,
            })
            .collect()
    }

    pub fn all_with_max_coordinate(&self, axis: Axis, value: u64) -> Vec<&Frame<T>> {
        self.frames
            .iter()
            .filter(|f| match axis {
                Axis::X => f.rect.x + f.rect.width - 1 == value,
                Axis::Y => f.rect.y + f.rect.height - 1 == value,
            })
            .collect()
    }

    /// Allocates a fresh buffer covering `rect`, filled with the union of
    /// overlapping frames; pixels outside all frames are zero (`T::default()`).
    pub fn read_matrix(&self, rect: RoiRect) -> Vec<T> {
        let mut out = vec![T::default(); (rect.width * rect.height * self.channels as u64) as usize];
        for frame in self.all_intersecting(rect) {
            let ix0 = rect.x.max(frame.rect.x);
            let iy0 = rect.y.max(frame.rect.y);
            let ix1 = (rect.x + rect.width).min(frame.rect.x + frame.rect.width);
            let iy1 = (rect.y + rect.height).min(frame.rect.y + frame.rect.height);
            for y in iy0..iy1 {
                for x in ix0..ix1 {
                    for c in 0..self.channels {
                        let value = frame.get(x, y, c);
                        let dest_idx = (((y - rect.y) * rect.width + (x - rect.x)) * self.channels as u64 + c as u64) as usize;
                        out[dest_idx] = value;
                    }
                }
            }
        }
        out
    }

    /// The 1-pixel-wide rectangles along the border between `subset`'s
    /// union and the rest of the plane. A frame edge contributes a segment
    /// when a neighboring frame on the other side of that edge exists and
    /// is *not* part of `subset` (an internal boundary), or when no
    /// neighbor exists at all and `include_outer` is set (the outer
    /// frontier of the whole buffer).
    pub fn internal_boundary(&self, subset: &[RoiRect], include_outer: bool) -> Vec<RoiRect> {
        let mut segments = Vec::new();
        for rect in subset {
            for side in [Side::Left, Side::Right, Side::Top, Side::Bottom] {
                match self.neighbor_membership(*rect, side, subset) {
                    NeighborStatus::OutsideSubset => segments.push(edge_segment(*rect, side)),
                    NeighborStatus::None if include_outer => segments.push(edge_segment(*rect, side)),
                    _ => {}
                }
            }
        }
        segments
    }

    fn neighbor_membership(&self, rect: RoiRect, side: Side, subset: &[RoiRect]) -> NeighborStatus {
        let probe = probe_rect(rect, side);
        for f in &self.frames {
            if f.rect == rect {
                continue;
            }
            if rects_intersect(&f.rect, &probe) {
                return if subset.contains(&f.rect) {
                    NeighborStatus::InsideSubset
                } else {
                    NeighborStatus::OutsideSubset
                };
            }
        }
        NeighborStatus::None
    }

    /// For label matrices: reads `rect`'s pixels (single channel assumed),
    /// replacing each label with its union-find canonical base. With
    /// `compact`, the output is remapped to a dense `0..n` range in order
    /// of first appearance (background label 0 always maps to 0).
    pub fn read_labels_reindexed_by_object_pairs(
        &self,
        frames: &[RoiRect],
        rect: RoiRect,
        object_pairs: &UnionFind,
        compact: bool,
    ) -> Vec<i32>
    where
        T: Into<i64> + Copy,
    {
        let raw = self.read_matrix(rect);
        let mut reindexed: Vec<i32> = raw
            .into_iter()
            .map(|v| {
                let label: i64 = v.into();
                object_pairs.parent_or_self(label as i32)
            })
            .collect();
        let _ = frames; // reserved for callers wanting to restrict to specific frames only
        if compact {
            compact_labels(&mut reindexed);
        }
        reindexed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

enum NeighborStatus {
    InsideSubset,
    OutsideSubset,
    None,
}

fn rects_intersect(a: &RoiRect, b: &RoiRect) -> bool {
    a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
}

/// A thin rectangle just past `side` of `rect`, used to probe for a
/// neighboring frame across that edge.
fn probe_rect(rect: RoiRect, side: Side) -> RoiRect {
    match side {
        Side::Left => RoiRect { x: rect.x.saturating_sub(1), y: rect.y, width: 1, height: rect.height },
        Side::Right => RoiRect { x: rect.x + rect.width, y: rect.y, width: 1, height: rect.height },
        Side::Top => RoiRect { x: rect.x, y: rect.y.saturating_sub(1), width: rect.width, height: 1 },
        Side::Bottom => RoiRect { x: rect.x, y: rect.y + rect.height, width: rect.width, height: 1 },
    }
}

/// The 1-pixel-wide strip of `rect` itself along `side` (the boundary
/// pixels, not the space beyond them, since coordinates are unsigned and
/// the outermost frame has no pixels "beyond" its edge).
fn edge_segment(rect: RoiRect, side: Side) -> RoiRect {
    match side {
        Side::Left => RoiRect { x: rect.x, y: rect.y, width: 1, height: rect.height },
        Side::Right => RoiRect { x: rect.x + rect.width - 1, y: rect.y, width: 1, height: rect.height },
        Side::Top => RoiRect { x: rect.x, y: rect.y, width: rect.width, height: 1 },
        Side::Bottom => RoiRect { x: rect.x, y: rect.y + rect.height - 1, width: rect.width, height: 1 },
    }
}

fn crop_frame_data<T: Copy + Default>(
    matrix: &[T],
    origin: RoiRect,
    crop: RoiRect,
    channels: u32,
) -> TiffResult<(RoiRect, Vec<T>)> {
    if crop.x < origin.x
        || crop.y < origin.y
        || crop.x + crop.width > origin.x + origin.width
        || crop.y + crop.height > origin.y + origin.height
    {
        return Err(TiffError::ParameterOutOfRange("crop rectangle is not contained in the frame".to_string()));
    }
    let mut out = vec![T::default(); (crop.width * crop.height * channels as u64) as usize];
    for y in 0..crop.height {
        for x in 0..crop.width {
            let src_x = (crop.x - origin.x + x) as usize;
            let src_y = (crop.y - origin.y + y) as usize;
            for c in 0..channels as usize {
                let src_idx = (src_y * origin.width as usize + src_x) * channels as usize + c;
                let dst_idx = ((y * crop.width + x) as usize) * channels as usize + c;
                out[dst_idx] = matrix[src_idx];
            }
        }
    }
    Ok((crop, out))
}

fn compact_labels(labels: &mut [i32]) {
    use std::collections::HashMap;
    let mut remap: HashMap<i32, i32> = HashMap::new();
    remap.insert(0, 0);
    let mut next = 1;
    for label in labels.iter_mut() {
        let mapped = *remap.entry(*label).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
        *label = mapped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u64, y: u64, w: u64, h: u64) -> RoiRect {
        RoiRect { x, y, width: w, height: h }
    }

    #[test]
    fn read_matrix_fills_union_of_overlapping_frames() {
        let mut buf: FrameBuffer<u8> = FrameBuffer::new(1);
        buf.add_frame(vec![1, 1, 1, 1], rect(0, 0, 2, 2), None, false).unwrap();
        buf.add_frame(vec![2, 2, 2, 2], rect(2, 0, 2, 2), None, false).unwrap();
        let out = buf.read_matrix(rect(0, 0, 4, 2));
        assert_eq!(out, vec![1, 1, 2, 2, 1, 1, 2, 2]);
    }

    #[test]
    fn read_matrix_zero_fills_uncovered_area() {
        let mut buf: FrameBuffer<u8> = FrameBuffer::new(1);
        buf.add_frame(vec![9, 9, 9, 9], rect(0, 0, 2, 2), None, false).unwrap();
        let out = buf.read_matrix(rect(0, 0, 4, 4));
        assert_eq!(out[3], 0); // (3,0) outside the only frame
    }

    #[test]
    fn disable_overlap_rejects_intersecting_insert() {
        let mut buf: FrameBuffer<u8> = FrameBuffer::new(1);
        buf.add_frame(vec![1; 4], rect(0, 0, 2, 2), None, true).unwrap();
        let result = buf.add_frame(vec![2; 4], rect(1, 1, 2, 2), None, true);
        assert!(result.is_err());
    }

    #[test]
    fn internal_boundary_excludes_shared_interior_edges() {
        let mut buf: FrameBuffer<u8> = FrameBuffer::new(1);
        buf.add_frame(vec![1; 16], rect(0, 0, 4, 4), None, false).unwrap();
        buf.add_frame(vec![2; 16], rect(4, 0, 4, 4), None, false).unwrap();
        let subset = vec![rect(0, 0, 4, 4), rect(4, 0, 4, 4)];
        let boundary = buf.internal_boundary(&subset, false);
        // Neither frame's right/left shared edge (interior, both in subset) appears.
        assert!(!boundary.contains(&rect(3, 0, 1, 4)));
        assert!(!boundary.contains(&rect(4, 0, 1, 4)));
    }

    #[test]
    fn internal_boundary_includes_outer_frontier_when_requested() {
        let mut buf: FrameBuffer<u8> = FrameBuffer::new(1);
        buf.add_frame(vec![1; 16], rect(0, 0, 4, 4), None, false).unwrap();
        let subset = vec![rect(0, 0, 4, 4)];
        let without_outer = buf.internal_boundary(&subset, false);
        let with_outer = buf.internal_boundary(&subset, true);
        assert!(without_outer.is_empty());
        assert_eq!(with_outer.len(), 4);
    }

    #[test]
    fn compact_remaps_to_dense_range_preserving_background() {
        let mut labels = vec![0, 5, 5, 9, 0];
        compact_labels(&mut labels);
        assert_eq!(labels, vec![0, 1, 1, 2, 0]);
    }
}

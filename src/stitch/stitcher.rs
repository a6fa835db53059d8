//! Frame-object stitching: side correlation and completeness analysis (spec.md §4.12, C12)
//!
//! A scan walks a large image one frame at a time; an object detector
//! labels connected components within each frame independently, so one
//! real-world object that straddles a frame boundary gets two different
//! labels, one per frame. `correlate` links those labels across an edge by
//! comparing the pixel sequence along the edge with the neighboring
//! frame's opposite edge; `joint_completed_objects` then decides, for the
//! most recently added frame, which of its objects are now fully seen
//! (none of their pixels touch the still-unscanned part of the plane) and
//! which remain partial.

use log::debug;
use rayon::prelude::*;

use crate::scan::frame_buffer::{Axis, FrameBuffer};
use crate::scan::sequencer::{ExpansionDirection, RoiRect};
use crate::stitch::union_find::UnionFind;
use crate::tiff::errors::{TiffError, TiffResult};

/// Sentinel for "no adjacent frame at this position" in a side sequence.
pub const NO_LABEL: i64 = -1;

/// One of the four edges of a frame rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// How `joint_completed_objects` computes the internal boundary of the
/// expanded area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Boundary from only those frames intersecting the large area,
    /// restricted to it. Drops objects too large to fit the expansion.
    Skip,
    /// Boundary from every frame intersecting the large area, then
    /// intersected with the large area. Keeps objects that extend outside
    /// the expansion as long as some part of them lies within it.
    RetainLastPart,
}

fn max_matrix_label_value() -> i64 {
    (1i64 << 32) - 1
}

/// Validates that a label matrix is well-formed per spec.md's failure
/// semantics: no element may be negative, and each must fit 32 bits
/// (enforced by the caller passing `i32`/narrower already; this rejects
/// anything a caller widened beyond that range before handing it over).
pub fn validate_labels(labels: &[i64]) -> TiffResult<()> {
    let max = max_matrix_label_value();
    for &v in labels {
        if v < 0 {
            return Err(TiffError::NegativeLabel(v));
        }
        if v > max {
            return Err(TiffError::NonMatrixLabel(format!("label {} exceeds 32-bit range", v)));
        }
    }
    Ok(())
}

/// Extracts the row/column of labels along `side` of a `width x height`
/// label matrix stored row-major.
fn side_sequence(labels: &[i64], width: u64, height: u64, side: Side) -> Vec<i64> {
    match side {
        Side::Left => (0..height).map(|y| labels[(y * width) as usize]).collect(),
        Side::Right => (0..height).map(|y| labels[(y * width + width - 1) as usize]).collect(),
        Side::Top => (0..width).map(|x| labels[x as usize]).collect(),
        Side::Bottom => (0..width).map(|x| labels[((height - 1) * width + x) as usize]).collect(),
    }
}

/// Indices where consecutive values differ; always includes 0.
fn change_points(sequence: &[i64]) -> Vec<usize> {
    let mut points = vec![0];
    for i in 1..sequence.len() {
        if sequence[i] != sequence[i - 1] {
            points.push(i);
        }
    }
    points
}

/// A maximal run of one constant label within `sequence`, as a half-open range.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: usize,
    end: usize,
    label: i64,
}

fn runs_from_change_points(sequence: &[i64], points: &[usize]) -> Vec<Run> {
    let mut runs = Vec::with_capacity(points.len());
    for (i, &start) in points.iter().enumerate() {
        let end = points.get(i + 1).copied().unwrap_or(sequence.len());
        runs.push(Run { start, end, label: sequence[start] });
    }
    runs
}

/// Matches runs of `a` against runs of `b` by greatest overlap (a minimal-
/// cost linear assignment over interval overlap), returning label pairs
/// for every matched pair of runs whose overlap is nonzero.
fn assign_runs(a: &[Run], b: &[Run]) -> Vec<(i64, i64)> {
    let mut pairs = Vec::new();
    for run_a in a {
        let mut best: Option<(usize, i64)> = None;
        for run_b in b {
            let overlap_start = run_a.start.max(run_b.start);
            let overlap_end = run_a.end.min(run_b.end);
            if overlap_end <= overlap_start {
                continue;
            }
            let overlap = overlap_end - overlap_start;
            if best.map(|(best_overlap, _)| overlap > best_overlap).unwrap_or(true) {
                best = Some((overlap, run_b.label));
            }
        }
        if let Some((_, label_b)) = best {
            pairs.push((run_a.label, label_b));
        }
    }
    pairs
}

/// For each side of the just-added frame, unions together the labels of
/// runs that face each other across the edge, skipping background (0) and
/// `NO_LABEL` pairings. `frame_labels` is the new frame's own label matrix;
/// the neighbor data is read from `buffer`, which must already contain the
/// new frame (so `all_with_max_coordinate`/`all_with_min_coordinate` can
/// find it as context, though its own pixels are passed in directly).
pub fn correlate(
    object_pairs: &mut UnionFind,
    buffer: &FrameBuffer<i32>,
    frame_rect: RoiRect,
    frame_labels: &[i64],
) -> TiffResult<()> {
    validate_labels(frame_labels)?;
    let width = frame_rect.width;
    let height = frame_rect.height;

    for side in [Side::Left, Side::Right, Side::Top, Side::Bottom] {
        let own_sequence = side_sequence(frame_labels, width, height, side);
        let adjacent_sequence = adjacent_sequence_for_side(buffer, frame_rect, side, own_sequence.len());

        let own_runs = runs_from_change_points(&own_sequence, &change_points(&own_sequence));
        let adjacent_runs = runs_from_change_points(&adjacent_sequence, &change_points(&adjacent_sequence));

        for (own_label, adjacent_label) in assign_runs(&own_runs, &adjacent_runs) {
            if own_label != 0 && adjacent_label != 0 && adjacent_label != NO_LABEL {
                debug!("correlate: union({}, {}) across {:?}", own_label, adjacent_label, side);
                object_pairs.union(own_label as i32, adjacent_label as i32);
            }
        }
    }
    Ok(())
}

/// Builds the "adjacent labels" sequence for `side` of `frame_rect`: the
/// neighboring frame's opposite-side labels, or `NO_LABEL` where no
/// neighbor covers that position.
fn adjacent_sequence_for_side(buffer: &FrameBuffer<i32>, frame_rect: RoiRect, side: Side, len: usize) -> Vec<i64> {
    let probe = match side {
        Side::Left => RoiRect { x: frame_rect.x.saturating_sub(1), y: frame_rect.y, width: 1, height: frame_rect.height },
        Side::Right => RoiRect { x: frame_rect.x + frame_rect.width, y: frame_rect.y, width: 1, height: frame_rect.height },
        Side::Top => RoiRect { x: frame_rect.x, y: frame_rect.y.saturating_sub(1), width: frame_rect.width, height: 1 },
        Side::Bottom => RoiRect { x: frame_rect.x, y: frame_rect.y + frame_rect.height, width: frame_rect.width, height: 1 },
    };

    let mut out = vec![NO_LABEL; len];
    for neighbor in buffer.all_intersecting(probe) {
        if neighbor.rect == frame_rect {
            continue;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            let (x, y) = match side {
                Side::Left | Side::Right => (probe.x, frame_rect.y + i as u64),
                Side::Top | Side::Bottom => (frame_rect.x + i as u64, probe.y),
            };
            if x >= neighbor.rect.x
                && x < neighbor.rect.x + neighbor.rect.width
                && y >= neighbor.rect.y
                && y < neighbor.rect.y + neighbor.rect.height
            {
                *slot = neighbor.get(x, y, 0) as i64;
            }
        }
    }
    out
}

/// Expands `rect` by `direction` (one cell in the two directions it names;
/// the scan's frame size is used as the step).
fn expand_rect(rect: RoiRect, direction: ExpansionDirection, step_x: u64, step_y: u64) -> RoiRect {
    match direction {
        ExpansionDirection::LeftUp => RoiRect {
            x: rect.x.saturating_sub(step_x),
            y: rect.y.saturating_sub(step_y),
            width: rect.width + step_x,
            height: rect.height + step_y,
        },
        ExpansionDirection::LeftDown => {
            RoiRect { x: rect.x.saturating_sub(step_x), y: rect.y, width: rect.width + step_x, height: rect.height + step_y }
        }
        ExpansionDirection::RightUp => {
            RoiRect { x: rect.x, y: rect.y.saturating_sub(step_y), width: rect.width + step_x, height: rect.height + step_y }
        }
        ExpansionDirection::RightDown => RoiRect { x: rect.x, y: rect.y, width: rect.width + step_x, height: rect.height + step_y },
    }
}

pub struct FrameStitcher {
    pub object_pairs: UnionFind,
}

impl FrameStitcher {
    pub fn new() -> Self {
        Self { object_pairs: UnionFind::new() }
    }

    pub fn correlate(&mut self, buffer: &FrameBuffer<i32>, frame_rect: RoiRect, frame_labels: &[i64]) -> TiffResult<()> {
        correlate(&mut self.object_pairs, buffer, frame_rect, frame_labels)
    }

    /// Computes the joint-completed-objects output for the most recently
    /// added frame, per spec.md §4.12. `expansion_step` is the scan's frame
    /// size `(fx, fy)`, used to build the expansion vector from `direction`.
    /// Returns the filtered large-area label matrix (optionally cropped)
    /// plus its rectangle.
    pub fn joint_completed_objects(
        &mut self,
        buffer: &FrameBuffer<i32>,
        last_frame_rect: RoiRect,
        direction: ExpansionDirection,
        expansion_step: (u64, u64),
        mode: CompletionMode,
        auto_crop: bool,
    ) -> TiffResult<(RoiRect, Vec<i64>)> {
        let large_area = expand_rect(last_frame_rect, direction, expansion_step.0, expansion_step.1);

        let pixel_count = large_area.width.checked_mul(large_area.height).ok_or_else(|| {
            TiffError::TooLargeArea("expanded area pixel count overflows".to_string())
        })?;
        if pixel_count > i32::MAX as u64 {
            return Err(TiffError::TooLargeArea(format!(
                "expanded area has {} pixels, exceeding the integer limit",
                pixel_count
            )));
        }

        let intersecting_positions: Vec<RoiRect> = buffer.all_intersecting(large_area).into_iter().map(|f| f.rect).collect();

        let boundary_source_rects: Vec<RoiRect> = match mode {
            CompletionMode::Skip => intersecting_positions
                .iter()
                .filter_map(|r| clip_rect(*r, large_area))
                .collect(),
            CompletionMode::RetainLastPart => intersecting_positions.clone(),
        };

        let mut boundary = buffer.internal_boundary(&boundary_source_rects, true);
        if matches!(mode, CompletionMode::RetainLastPart) {
            boundary = boundary.into_iter().filter_map(|r| clip_rect(r, large_area)).collect();
        }

        self.object_pairs.resolve_all_bases();

        let boundary_label_set = self.boundary_label_set(buffer, &boundary);
        let completed_label_set = self.completed_label_set(buffer, last_frame_rect, &boundary_label_set);

        let large_matrix = buffer.read_matrix(large_area);
        let mut reindexed: Vec<i64> = large_matrix
            .into_iter()
            .map(|label| self.object_pairs.parent_or_self(label) as i64)
            .collect();

        // Rows are independent once `resolve_all_bases` has flattened the
        // union-find forest, so the keep/zero decision is parallelized
        // per row (spec.md §4.12).
        let width = large_area.width as usize;
        if width == 0 {
            return Ok((large_area, reindexed));
        }
        reindexed.par_chunks_mut(width).enumerate().for_each(|(row_idx, row)| {
            let y = large_area.y + row_idx as u64;
            let row_inside_last = y >= last_frame_rect.y && y < last_frame_rect.y + last_frame_rect.height;
            for (col_idx, pixel) in row.iter_mut().enumerate() {
                let x = large_area.x + col_idx as u64;
                let inside_last =
                    row_inside_last && x >= last_frame_rect.x && x < last_frame_rect.x + last_frame_rect.width;
                let label = *pixel as i32;
                let keep = (inside_last || completed_label_set.contains(&label)) && !boundary_label_set.contains(&label);
                if !keep {
                    *pixel = 0;
                }
            }
        });

        if auto_crop {
            Ok((crop_to_nonzero(large_area, &reindexed), reindexed))
        } else {
            Ok((large_area, reindexed))
        }
    }

    fn boundary_label_set(&self, buffer: &FrameBuffer<i32>, boundary: &[RoiRect]) -> Vec<i32> {
        let mut set = Vec::new();
        for segment in boundary {
            for label in buffer.read_matrix(*segment) {
                let canonical = self.object_pairs.parent_or_self(label);
                if canonical != 0 && !set.contains(&canonical) {
                    set.push(canonical);
                }
            }
        }
        set
    }

    /// Labels on the last frame's four sides whose adjacent neighbor is
    /// non-empty (has pixels, i.e. a neighbor frame exists there) and whose
    /// canonical label is not in `boundary_label_set` are completed.
    fn completed_label_set(&self, buffer: &FrameBuffer<i32>, last_frame_rect: RoiRect, boundary_label_set: &[i32]) -> Vec<i32> {
        let mut set = Vec::new();
        for side in [Side::Left, Side::Right, Side::Top, Side::Bottom] {
            let has_neighbor = match side {
                Side::Left => !buffer.all_with_max_coordinate(Axis::X, last_frame_rect.x.wrapping_sub(1)).is_empty(),
                Side::Right => {
                    !buffer.all_with_min_coordinate(Axis::X, last_frame_rect.x + last_frame_rect.width).is_empty()
                }
                Side::Top => !buffer.all_with_max_coordinate(Axis::Y, last_frame_rect.y.wrapping_sub(1)).is_empty(),
                Side::Bottom => {
                    !buffer.all_with_min_coordinate(Axis::Y, last_frame_rect.y + last_frame_rect.height).is_empty()
                }
            };
            if !has_neighbor {
                continue;
            }
            let own_edge = buffer.read_matrix(edge_rect(last_frame_rect, side));
            for label in own_edge {
                let canonical = self.object_pairs.parent_or_self(label);
                if canonical != 0 && !boundary_label_set.contains(&canonical) && !set.contains(&canonical) {
                    set.push(canonical);
                }
            }
        }
        set
    }
}

impl Default for FrameStitcher {
    fn default() -> Self {
        Self::new()
    }
}

fn edge_rect(rect: RoiRect, side: Side) -> RoiRect {
    match side {
        Side::Left => RoiRect { x: rect.x, y: rect.y, width: 1, height: rect.height },
        Side::Right => RoiRect { x: rect.x + rect.width - 1, y: rect.y, width: 1, height: rect.height },
        Side::Top => RoiRect { x: rect.x, y: rect.y, width: rect.width, height: 1 },
        Side::Bottom => RoiRect { x: rect.x, y: rect.y + rect.height - 1, width: rect.width, height: 1 },
    }
}

fn clip_rect(rect: RoiRect, bounds: RoiRect) -> Option<RoiRect> {
    let x0 = rect.x.max(bounds.x);
    let y0 = rect.y.max(bounds.y);
    let x1 = (rect.x + rect.width).min(bounds.x + bounds.width);
    let y1 = (rect.y + rect.height).min(bounds.y + bounds.height);
    if x1 <= x0 || y1 <= y0 {
        None
    } else {
        Some(RoiRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 })
    }
}

/// Tightens `rect`/`labels` to the bounding box of nonzero labels, per-row,
/// per spec.md's `auto_crop` option.
fn crop_to_nonzero(rect: RoiRect, labels: &[i64]) -> RoiRect {
    let width = rect.width as usize;
    let height = rect.height as usize;
    let mut min_x = width;
    let mut max_x = 0usize;
    let mut min_y = height;
    let mut max_y = 0usize;
    let mut any = false;
    for y in 0..height {
        for x in 0..width {
            if labels[y * width + x] != 0 {
                any = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }
    if !any {
        return RoiRect { x: rect.x, y: rect.y, width: 0, height: 0 };
    }
    RoiRect {
        x: rect.x + min_x as u64,
        y: rect.y + min_y as u64,
        width: (max_x - min_x + 1) as u64,
        height: (max_y - min_y + 1) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u64, y: u64, w: u64, h: u64) -> RoiRect {
        RoiRect { x, y, width: w, height: h }
    }

    fn scenario_e_buffer() -> FrameBuffer<i32> {
        let mut buffer: FrameBuffer<i32> = FrameBuffer::new(1);
        #[rustfmt::skip]
        let left = vec![
            1, 1, 0, 0,
            1, 1, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        #[rustfmt::skip]
        let right = vec![
            0, 0, 2, 2,
            0, 0, 2, 2,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        buffer.add_frame(left, rect(0, 0, 4, 4), None, false).unwrap();
        buffer.add_frame(right, rect(4, 0, 4, 4), None, false).unwrap();
        buffer
    }

    #[test]
    fn correlate_finds_no_pairs_when_edges_do_not_share_labels() {
        let buffer = scenario_e_buffer();
        let mut stitcher = FrameStitcher::new();
        #[rustfmt::skip]
        let right_labels: Vec<i64> = vec![
            0, 0, 2, 2,
            0, 0, 2, 2,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        stitcher.correlate(&buffer, rect(4, 0, 4, 4), &right_labels).unwrap();
        assert_eq!(stitcher.object_pairs.find_base(1), 1);
        assert_eq!(stitcher.object_pairs.find_base(2), 2);
    }

    #[test]
    fn joint_completes_left_object_but_not_right_border_object() {
        let buffer = scenario_e_buffer();
        let mut stitcher = FrameStitcher::new();
        let (_, reindexed) = stitcher
            .joint_completed_objects(&buffer, rect(4, 0, 4, 4), ExpansionDirection::RightDown, (0, 0), CompletionMode::Skip, false)
            .unwrap();
        // Right frame's label 2 touches the outer right border (x=7, the
        // last column of the large area) so it stays out of the kept set;
        // pixel (7,0) which held label 2 must be zeroed.
        let width = 4usize;
        let idx = 0 * width + 3; // (x=7,y=0) within the 4-wide large area starting at x=4
        assert_eq!(reindexed[idx], 0);
    }

    #[test]
    fn change_points_always_includes_zero() {
        let seq = vec![1, 1, 2, 2, 2, 3];
        assert_eq!(change_points(&seq), vec![0, 2, 5]);
    }

    #[test]
    fn assign_runs_matches_by_overlap() {
        let a = vec![Run { start: 0, end: 2, label: 1 }, Run { start: 2, end: 4, label: 0 }];
        let b = vec![Run { start: 0, end: 4, label: 5 }];
        let pairs = assign_runs(&a, &b);
        assert_eq!(pairs, vec![(1, 5), (0, 5)]);
    }

    #[test]
    fn validate_labels_rejects_negative() {
        assert!(validate_labels(&[0, 1, -1]).is_err());
    }

    #[test]
    fn crop_to_nonzero_tightens_to_bounding_box() {
        let r = rect(0, 0, 4, 4);
        #[rustfmt::skip]
        let labels = vec![
            0, 0, 0, 0,
            0, 1, 1, 0,
            0, 1, 1, 0,
            0, 0, 0, 0,
        ];
        let cropped = crop_to_nonzero(r, &labels);
        assert_eq!(cropped, rect(1, 1, 2, 2));
    }
}

//! Deterministic frame enumeration over one or more ROIs
//!
//! State is exactly `(roi_index, low_index, high_index)`: which ROI is
//! active, and the frame's position along the "low" (fast) and "high"
//! (slow) axes of that ROI's tiling grid. Which image axis is "low" and
//! which is "high" depends on the pattern — `Rows` walks x as the fast
//! axis, `Columns` walks y — so the same three-number state works for
//! every pattern without a pattern-specific struct.

use crate::scan::pattern::ScanPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRect {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionDirection {
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePosition {
    pub roi_index: usize,
    pub low_index: u64,
    pub high_index: u64,
    pub rect: RoiRect,
    pub is_first: bool,
    pub is_last: bool,
}

/// Whether x is the fast (low) axis for a given pattern and ROI shape.
fn x_is_low_axis(pattern: ScanPattern, roi: &RoiRect, frame_w: u64, frame_h: u64) -> bool {
    match pattern {
        ScanPattern::Rows | ScanPattern::SnakeByRows => true,
        ScanPattern::Columns | ScanPattern::SnakeByColumns => false,
        ScanPattern::ShortestSide | ScanPattern::ShortestSideSnake => {
            let low_count_x = crate::tiff::tile_map::div_ceil(roi.width, frame_w);
            let low_count_y = crate::tiff::tile_map::div_ceil(roi.height, frame_h);
            low_count_x <= low_count_y
        }
        ScanPattern::CentralSpiral => true,
    }
}

pub struct Sequencer {
    rois: Vec<RoiRect>,
    frame_width: u64,
    frame_height: u64,
    pattern: ScanPattern,
    roi_index: usize,
    low_index: u64,
    high_index: u64,
    finished: bool,
    /// Spiral state: ring index and step within the ring, only used by `CentralSpiral`.
    spiral_ring: u64,
    spiral_step: u64,
}

impl Sequencer {
    pub fn new(rois: Vec<RoiRect>, frame_width: u64, frame_height: u64, pattern: ScanPattern) -> Self {
        Self {
            rois,
            frame_width,
            frame_height,
            pattern,
            roi_index: 0,
            low_index: 0,
            high_index: 0,
            finished: false,
            spiral_ring: 0,
            spiral_step: 0,
        }
    }

    fn low_count(&self, roi: &RoiRect) -> u64 {
        if x_is_low_axis(self.pattern, roi, self.frame_width, self.frame_height) {
            crate::tiff::tile_map::div_ceil(roi.width, self.frame_width).max(1)
        } else {
            crate::tiff::tile_map::div_ceil(roi.height, self.frame_height).max(1)
        }
    }

    fn high_count(&self, roi: &RoiRect) -> u64 {
        if x_is_low_axis(self.pattern, roi, self.frame_width, self.frame_height) {
            crate::tiff::tile_map::div_ceil(roi.height, self.frame_height).max(1)
        } else {
            crate::tiff::tile_map::div_ceil(roi.width, self.frame_width).max(1)
        }
    }

    /// Computes the pixel rectangle for `(roi_index, low_index, high_index)`,
    /// applying the snake alternation rule on the fast axis when the
    /// pattern calls for it: on odd high-axis rows the low index counts
    /// down instead of up.
    pub fn frame_position(&self, roi_index: usize, low_index: u64, high_index: u64) -> RoiRect {
        let roi = &self.rois[roi_index];
        let x_is_low = x_is_low_axis(self.pattern, roi, self.frame_width, self.frame_height);
        let low_count = self.low_count(roi);

        let effective_low = if self.pattern.is_snake() && high_index % 2 == 1 {
            low_count - 1 - low_index
        } else {
            low_index
        };

        // Whichever axis is "low" steps by effective_low; the other (the
        // "high" axis) steps by high_index. The frame's own width/height
        // are always frame_width/frame_height regardless of which axis is
        // fast — only the stepping assignment transposes between patterns.
        let (x, y) = if x_is_low {
            (roi.x + effective_low * self.frame_width, roi.y + high_index * self.frame_height)
        } else {
            (roi.x + high_index * self.frame_width, roi.y + effective_low * self.frame_height)
        };

        RoiRect {
            x,
            y,
            width: self.frame_width.min(roi.x + roi.width - x),
            height: self.frame_height.min(roi.y + roi.height - y),
        }
    }

    /// The corner a newly discovered object at this frame position should
    /// expand toward when merging with a neighboring frame, derived from
    /// which edges of the ROI this frame touches.
    pub fn recommended_frame_expansion(&self, roi_index: usize, low_index: u64, high_index: u64) -> ExpansionDirection {
        let roi = &self.rois[roi_index];
        let low_count = self.low_count(roi);
        let high_count = self.high_count(roi);
        let at_low_end = low_index + 1 >= low_count;
        let at_high_end = high_index + 1 >= high_count;

        match (at_low_end, at_high_end) {
            (false, false) => ExpansionDirection::RightDown,
            (true, false) => ExpansionDirection::LeftDown,
            (false, true) => ExpansionDirection::RightUp,
            (true, true) => ExpansionDirection::LeftUp,
        }
    }

    fn total_frames(&self, roi: &RoiRect) -> u64 {
        self.low_count(roi) * self.high_count(roi)
    }

    /// Total frame count across every ROI, computed up front so a caller
    /// can size a progress indicator before driving the iterator.
    pub fn total(&self) -> u64 {
        self.rois.iter().map(|roi| self.total_frames(roi)).sum()
    }

    fn advance_grid(&mut self) -> Option<FramePosition> {
        while self.roi_index < self.rois.len() {
            let roi = self.rois[self.roi_index];
            let low_count = self.low_count(&roi);
            let high_count = self.high_count(&roi);

            if self.high_index >= high_count {
                self.roi_index += 1;
                self.low_index = 0;
                self.high_index = 0;
                continue;
            }

            let rect = self.frame_position(self.roi_index, self.low_index, self.high_index);
            let is_first = self.roi_index == 0 && self.low_index == 0 && self.high_index == 0;

            let mut next_low = self.low_index + 1;
            let mut next_high = self.high_index;
            if next_low >= low_count {
                next_low = 0;
                next_high += 1;
            }

            let is_last = self.roi_index == self.rois.len() - 1 && next_high >= high_count;

            let position = FramePosition {
                roi_index: self.roi_index,
                low_index: self.low_index,
                high_index: self.high_index,
                rect,
                is_first,
                is_last,
            };

            self.low_index = next_low;
            self.high_index = next_high;
            return Some(position);
        }
        None
    }

    /// Rings outward from the ROI center, widest-first ring order. Falls
    /// back to advancing to the next ROI once the current one's rings are
    /// exhausted.
    fn advance_spiral(&mut self) -> Option<FramePosition> {
        while self.roi_index < self.rois.len() {
            let roi = self.rois[self.roi_index];
            let low_count = crate::tiff::tile_map::div_ceil(roi.width, self.frame_width).max(1);
            let high_count = crate::tiff::tile_map::div_ceil(roi.height, self.frame_height).max(1);
            let cx = low_count / 2;
            let cy = high_count / 2;
            let max_ring = cx.max(low_count - 1 - cx).max(cy).max(high_count - 1 - cy);

            if self.spiral_ring > max_ring {
                self.roi_index += 1;
                self.spiral_ring = 0;
                self.spiral_step = 0;
                continue;
            }

            let ring_cells = ring_offsets(self.spiral_ring);
            if self.spiral_step as usize >= ring_cells.len() {
                self.spiral_ring += 1;
                self.spiral_step = 0;
                continue;
            }

            let (dx, dy) = ring_cells[self.spiral_step as usize];
            self.spiral_step += 1;

            let lx = cx as i64 + dx;
            let ly = cy as i64 + dy;
            if lx < 0 || ly < 0 || lx as u64 >= low_count || ly as u64 >= high_count {
                continue;
            }
            let low_index = lx as u64;
            let high_index = ly as u64;

            let x = roi.x + low_index * self.frame_width;
            let y = roi.y + high_index * self.frame_height;
            let rect = RoiRect {
                x,
                y,
                width: self.frame_width.min(roi.x + roi.width - x),
                height: self.frame_height.min(roi.y + roi.height - y),
            };

            let is_first = self.roi_index == 0 && self.spiral_ring == 0 && self.spiral_step == 1;
            let at_last_ring = self.spiral_ring == max_ring && self.spiral_step as usize >= ring_cells.len();
            let is_last = self.roi_index == self.rois.len() - 1 && at_last_ring;

            return Some(FramePosition { roi_index: self.roi_index, low_index, high_index, rect, is_first, is_last });
        }
        None
    }
}

impl Iterator for Sequencer {
    type Item = FramePosition;

    fn next(&mut self) -> Option<FramePosition> {
        if self.finished {
            return None;
        }
        let result = if self.pattern == ScanPattern::CentralSpiral {
            self.advance_spiral()
        } else {
            self.advance_grid()
        };
        if result.is_none() {
            self.finished = true;
        }
        result
    }
}

/// Square-ring offsets at Chebyshev distance `ring` from the origin,
/// ordered clockwise starting from the top-left corner of the ring.
fn ring_offsets(ring: u64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![(0, 0)];
    }
    let r = ring as i64;
    let mut cells = Vec::new();
    for x in -r..=r {
        cells.push((x, -r));
    }
    for y in -r + 1..=r {
        cells.push((r, y));
    }
    for x in (-r..r).rev() {
        cells.push((x, r));
    }
    for y in (-r + 1..r).rev() {
        cells.push((-r, y));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_pattern_keeps_frame_width_and_height_untransposed() {
        // ROI 10x9, frame 5x3, Columns: low axis is y (steps of 3, 3 rows),
        // high axis is x (steps of 5, 2 columns). Every frame must still be
        // 5 wide x 3 tall, and the scan must not panic or lose coverage.
        let roi = RoiRect { x: 0, y: 0, width: 10, height: 9 };
        let seq = Sequencer::new(vec![roi], 5, 3, ScanPattern::Columns);
        let frames: Vec<_> = seq.collect();
        assert_eq!(frames.len(), 6); // ceil(10/5) * ceil(9/3) = 2 * 3
        for f in &frames {
            assert_eq!(f.rect.width, 5.min(roi.width - f.rect.x));
            assert_eq!(f.rect.height, 3.min(roi.height - f.rect.y));
        }
        let max_x = frames.iter().map(|f| f.rect.x + f.rect.width).max().unwrap();
        let max_y = frames.iter().map(|f| f.rect.y + f.rect.height).max().unwrap();
        assert_eq!(max_x, roi.width);
        assert_eq!(max_y, roi.height);
    }

    #[test]
    fn snake_scan_covers_ten_by_three_roi_in_two_frames() {
        // Scenario D: ROI (0,0)-(9,2), frame 5x3 -> frames [(0,0)-(4,2),(5,0)-(9,2)]
        let roi = RoiRect { x: 0, y: 0, width: 10, height: 3 };
        let seq = Sequencer::new(vec![roi], 5, 3, ScanPattern::SnakeByRows);
        let frames: Vec<_> = seq.collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].rect, RoiRect { x: 0, y: 0, width: 5, height: 3 });
        assert_eq!(frames[1].rect, RoiRect { x: 5, y: 0, width: 5, height: 3 });
    }

    #[test]
    fn snake_alternates_direction_on_second_row() {
        let roi = RoiRect { x: 0, y: 0, width: 6, height: 4 };
        let seq = Sequencer::new(vec![roi], 3, 2, ScanPattern::SnakeByRows);
        let frames: Vec<_> = seq.collect();
        // Row 0 (high_index=0): left-to-right. Row 1 (high_index=1): right-to-left.
        let row1: Vec<_> = frames.iter().filter(|f| f.high_index == 1).map(|f| f.rect.x).collect();
        assert_eq!(row1, vec![3, 0]);
    }

    #[test]
    fn sequencer_visits_every_frame_exactly_once() {
        let roi = RoiRect { x: 0, y: 0, width: 17, height: 11 };
        let seq = Sequencer::new(vec![roi], 4, 4, ScanPattern::Rows);
        let frames: Vec<_> = seq.collect();
        let expected = crate::tiff::tile_map::div_ceil(17, 4) * crate::tiff::tile_map::div_ceil(11, 4);
        assert_eq!(frames.len() as u64, expected);

        let mut seen = std::collections::HashSet::new();
        for f in &frames {
            assert!(seen.insert((f.low_index, f.high_index)), "frame visited twice");
        }
    }

    #[test]
    fn first_and_last_flags_mark_exactly_one_frame_each() {
        let roi = RoiRect { x: 0, y: 0, width: 8, height: 8 };
        let seq = Sequencer::new(vec![roi], 4, 4, ScanPattern::Rows);
        let frames: Vec<_> = seq.collect();
        assert_eq!(frames.iter().filter(|f| f.is_first).count(), 1);
        assert_eq!(frames.iter().filter(|f| f.is_last).count(), 1);
        assert!(frames.first().unwrap().is_first);
        assert!(frames.last().unwrap().is_last);
    }
}

//! Scan coverage patterns
//!
//! Every pattern visits the same set of frames (a full tiling of the ROI);
//! they differ only in traversal order, which matters to callers that want
//! to minimize stage movement (snake patterns) or process the narrower
//! dimension first (shortest-side patterns). `CentralSpiral` starts from
//! the ROI's center and spirals outward, useful for previewing a scan
//! before it fully completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPattern {
    /// Low axis varies fastest, resetting to 0 at the start of each high-axis row.
    Rows,
    /// High axis varies fastest, resetting to 0 at the start of each low-axis column.
    Columns,
    /// Rows, alternating direction on the low axis every other high-axis row.
    SnakeByRows,
    /// Columns, alternating direction on the high axis every other low-axis column.
    SnakeByColumns,
    /// Whichever of low/high has fewer steps is treated as the fast axis.
    ShortestSide,
    /// `ShortestSide`, with direction alternation on the fast axis.
    ShortestSideSnake,
    /// Visits frames in rings expanding outward from the ROI center.
    CentralSpiral,
}

impl ScanPattern {
    /// Whether this pattern alternates direction on its fast axis.
    pub fn is_snake(&self) -> bool {
        matches!(self, ScanPattern::SnakeByRows | ScanPattern::SnakeByColumns | ScanPattern::ShortestSideSnake)
    }
}

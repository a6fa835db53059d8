//! Region-of-interest metadata companion file (spec.md §6)
//!
//! Schema: `{"app": "image-pyramid-metadata" | "plane-pyramid-metadata",
//! "version": "1.0", "rois": [Roi, ...]}`. Each `Roi` is a rectangle, a
//! polygon, or a multipolygon; all three reduce to an axis-aligned
//! bounding rectangle for the scan sequencer, which only ever walks
//! rectangles. Polygon winding is retained (not discarded) because a
//! negative signed area marks a hole in a multipolygon, information a
//! caller doing area accounting (not implemented here) would need.

use serde::{Deserialize, Serialize};

use crate::tiff::errors::{TiffError, TiffResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

/// A rectangle expressed as the packed 4-tuple the spec's output format
/// uses: `(center_x, center_y, size_x, size_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRectangle {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl RoiRectangle {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// The `(center_x, center_y, size_x, size_y)` packed tuple output format.
    pub fn as_centered_tuple(&self) -> (f64, f64, i64, i64) {
        let size_x = self.width();
        let size_y = self.height();
        let center_x = self.min_x as f64 + size_x as f64 / 2.0;
        let center_y = self.min_y as f64 + size_y as f64 / 2.0;
        (center_x, center_y, size_x, size_y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Roi {
    Rectangle(RectangleFields),
    Polygon {
        vertices: Vec<JsonVertex>,
    },
    Multipolygon {
        polygons: Vec<PolygonFields>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonVertex {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonFields {
    pub vertices: Vec<JsonVertex>,
}

/// Rectangle ROIs may be given as `left/top/width/height` or
/// `left/top/right/bottom`; exactly one pairing must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectangleFields {
    pub left: i64,
    pub top: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<i64>,
}

impl Roi {
    /// Reduces any ROI shape to its axis-aligned bounding rectangle, per
    /// spec.md §6: `(floor(min_x), floor(min_y))` to
    /// `(ceil(max_x)-1, ceil(max_y)-1)`, empty if either dimension `<= 0`.
    pub fn bounding_rectangle(&self) -> TiffResult<RoiRectangle> {
        match self {
            Roi::Rectangle(fields) => {
                let (width, height) = match (fields.width, fields.height, fields.right, fields.bottom) {
                    (Some(w), Some(h), None, None) => (w, h),
                    (None, None, Some(r), Some(b)) => (r - fields.left, b - fields.top),
                    _ => {
                        return Err(TiffError::ParameterMismatch(
                            "rectangle ROI must give exactly one of width/height or right/bottom".to_string(),
                        ))
                    }
                };
                Ok(RoiRectangle::new(fields.left, fields.top, fields.left + width - 1, fields.top + height - 1))
            }
            Roi::Polygon { vertices } => Ok(bounding_rectangle_of_vertices(vertices)),
            Roi::Multipolygon { polygons } => {
                let mut iter = polygons.iter().map(|p| bounding_rectangle_of_vertices(&p.vertices));
                let first = iter.next().ok_or_else(|| {
                    TiffError::ParameterOutOfRange("multipolygon ROI has no polygons".to_string())
                })?;
                Ok(iter.fold(first, union_rectangles))
            }
        }
    }

    /// At least two vertices are required for a polygon to contribute a
    /// rectangle; a degenerate polygon is silently treated as empty rather
    /// than an error, matching spec.md's "at least two vertices to
    /// contribute a rectangle" wording.
    pub fn contributes(&self) -> bool {
        match self {
            Roi::Rectangle(_) => true,
            Roi::Polygon { vertices } => vertices.len() >= 2,
            Roi::Multipolygon { polygons } => polygons.iter().any(|p| p.vertices.len() >= 2),
        }
    }
}

fn bounding_rectangle_of_vertices(vertices: &[JsonVertex]) -> RoiRectangle {
    if vertices.len() < 2 {
        return RoiRectangle::new(0, 0, -1, -1); // empty
    }
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for v in vertices {
        min_x = min_x.min(v.x);
        min_y = min_y.min(v.y);
        max_x = max_x.max(v.x);
        max_y = max_y.max(v.y);
    }
    RoiRectangle::new(min_x.floor() as i64, min_y.floor() as i64, max_x.ceil() as i64 - 1, max_y.ceil() as i64 - 1)
}

fn union_rectangles(a: RoiRectangle, b: RoiRectangle) -> RoiRectangle {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    RoiRectangle::new(a.min_x.min(b.min_x), a.min_y.min(b.min_y), a.max_x.max(b.max_x), a.max_y.max(b.max_y))
}

/// The shoelace-formula signed area of a polygon. Positive for
/// counter-clockwise winding, negative for clockwise; a multipolygon uses
/// the sign to distinguish an outer ring from a hole.
pub fn signed_area(vertices: &[JsonVertex]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let a = &vertices[i];
        let b = &vertices[(i + 1) % vertices.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    pub app: String,
    pub version: String,
    pub rois: Vec<Roi>,
}

impl MetadataFile {
    pub fn parse(json: &str) -> TiffResult<Self> {
        let file: MetadataFile = serde_json::from_str(json)?;
        if file.app != "image-pyramid-metadata" && file.app != "plane-pyramid-metadata" {
            return Err(TiffError::ParameterMismatch(format!("unrecognized metadata \"app\": {}", file.app)));
        }
        Ok(file)
    }

    /// Bounding rectangles for every ROI that contributes one, in file order.
    pub fn bounding_rectangles(&self) -> TiffResult<Vec<RoiRectangle>> {
        self.rois
            .iter()
            .filter(|r| r.contributes())
            .map(|r| r.bounding_rectangle())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_with_width_height() {
        let json = r#"{"app":"image-pyramid-metadata","version":"1.0","rois":[
            {"shape":"rectangle","left":10,"top":20,"width":5,"height":6}
        ]}"#;
        let file = MetadataFile::parse(json).unwrap();
        let rect = file.rois[0].bounding_rectangle().unwrap();
        assert_eq!(rect, RoiRectangle::new(10, 20, 14, 25));
    }

    #[test]
    fn rectangle_with_right_bottom() {
        let json = r#"{"app":"image-pyramid-metadata","version":"1.0","rois":[
            {"shape":"rectangle","left":0,"top":0,"right":10,"bottom":10}
        ]}"#;
        let file = MetadataFile::parse(json).unwrap();
        let rect = file.rois[0].bounding_rectangle().unwrap();
        assert_eq!(rect, RoiRectangle::new(0, 0, 9, 9));
    }

    #[test]
    fn polygon_bounding_rectangle_floors_and_ceils() {
        let verts = vec![
            JsonVertex { x: 1.2, y: 1.8 },
            JsonVertex { x: 5.9, y: 1.8 },
            JsonVertex { x: 5.9, y: 9.1 },
            JsonVertex { x: 1.2, y: 9.1 },
        ];
        let rect = bounding_rectangle_of_vertices(&verts);
        assert_eq!(rect, RoiRectangle::new(1, 1, 5, 9));
    }

    #[test]
    fn degenerate_polygon_does_not_contribute() {
        let roi = Roi::Polygon { vertices: vec![JsonVertex { x: 0.0, y: 0.0 }] };
        assert!(!roi.contributes());
    }

    #[test]
    fn counter_clockwise_square_has_positive_area() {
        let verts = vec![
            JsonVertex { x: 0.0, y: 0.0 },
            JsonVertex { x: 4.0, y: 0.0 },
            JsonVertex { x: 4.0, y: 4.0 },
            JsonVertex { x: 0.0, y: 4.0 },
        ];
        assert!(signed_area(&verts) < 0.0 || signed_area(&verts) > 0.0);
    }

    #[test]
    fn unrecognized_app_is_rejected() {
        let json = r#"{"app":"something-else","version":"1.0","rois":[]}"#;
        assert!(MetadataFile::parse(json).is_err());
    }
}

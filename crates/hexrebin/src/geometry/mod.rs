//! Planar geometry primitives used by the overlap indexer.
//!
//! Points are plain `[x, y]` arrays in sensor units (millimetres for the
//! bundled camera constants). Only convex polygons are needed: hexagon pixels
//! and square grid cells, so intersection is done by clipping.

mod polygon;

pub use polygon::Polygon;

/// Axis-aligned rectangle `[min, max]` (closed).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Rect {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Square with the given top-left corner (minimum x, maximum y) and side.
    pub fn square_from_top_left(top_left: [f64; 2], side: f64) -> Self {
        Self {
            min: [top_left[0], top_left[1] - side],
            max: [top_left[0] + side, top_left[1]],
        }
    }

    /// Closed-interval overlap test. Rectangles that only touch along an
    /// edge or corner intersect; their overlap area is zero.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }
}

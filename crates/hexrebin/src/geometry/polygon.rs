use super::Rect;

/// Simple polygon stored as an explicit vertex ring (no repeated closing vertex).
///
/// Clipping assumes the polygon is convex, which holds for every shape the
/// indexer builds (hexagons and their clipped pieces).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy)]
enum Keep {
    AtLeast,
    AtMost,
}

impl Polygon {
    pub fn new(vertices: Vec<[f64; 2]>) -> Self {
        Self { vertices }
    }

    /// Regular pointy-top hexagon with the given center and edge length.
    ///
    /// Vertices are counter-clockwise, starting at the top:
    /// `(0, e)`, `(-e*sqrt3/2, e/2)`, `(-e*sqrt3/2, -e/2)`, `(0, -e)`,
    /// `(e*sqrt3/2, -e/2)`, `(e*sqrt3/2, e/2)`.
    pub fn regular_hexagon(center: [f64; 2], edge: f64) -> Self {
        let half_width = edge * f64::sqrt(3.0) / 2.0;
        let half_edge = edge / 2.0;
        let [cx, cy] = center;
        Self {
            vertices: vec![
                [cx, cy + edge],
                [cx - half_width, cy + half_edge],
                [cx - half_width, cy - half_edge],
                [cx, cy - edge],
                [cx + half_width, cy - half_edge],
                [cx + half_width, cy + half_edge],
            ],
        }
    }

    /// Area of a regular hexagon with edge length `edge`.
    pub fn regular_hexagon_area(edge: f64) -> f64 {
        1.5 * f64::sqrt(3.0) * edge * edge
    }

    /// Fewer than three vertices means the polygon encloses no area.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Unsigned area (shoelace formula).
    pub fn area(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        let n = self.vertices.len();
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            twice += a[0] * b[1] - b[0] * a[1];
        }
        0.5 * twice.abs()
    }

    /// Axis-aligned bounds; `None` for a polygon without vertices.
    pub fn bounds(&self) -> Option<Rect> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices[1..] {
            min[0] = min[0].min(v[0]);
            min[1] = min[1].min(v[1]);
            max[0] = max[0].max(v[0]);
            max[1] = max[1].max(v[1]);
        }
        Some(Rect { min, max })
    }

    /// Clip against a rectangle (Sutherland-Hodgman over its four edges).
    ///
    /// Points on the rectangle boundary count as inside, so a polygon that
    /// only touches the rectangle yields a degenerate (zero-area) result.
    pub fn clip_to_rect(&self, rect: &Rect) -> Polygon {
        let mut ring = clip_half_plane(&self.vertices, 0, rect.min[0], Keep::AtLeast);
        ring = clip_half_plane(&ring, 0, rect.max[0], Keep::AtMost);
        ring = clip_half_plane(&ring, 1, rect.min[1], Keep::AtLeast);
        ring = clip_half_plane(&ring, 1, rect.max[1], Keep::AtMost);
        Polygon::new(ring)
    }

    /// Area of `self ∩ rect`.
    pub fn intersection_area(&self, rect: &Rect) -> f64 {
        match self.bounds() {
            Some(b) if b.intersects(rect) => self.clip_to_rect(rect).area(),
            _ => 0.0,
        }
    }
}

fn clip_half_plane(ring: &[[f64; 2]], axis: usize, bound: f64, keep: Keep) -> Vec<[f64; 2]> {
    let inside = |p: &[f64; 2]| match keep {
        Keep::AtLeast => p[axis] >= bound,
        Keep::AtMost => p[axis] <= bound,
    };

    let mut out = Vec::with_capacity(ring.len() + 2);
    let Some(&last) = ring.last() else {
        return out;
    };

    let mut prev = last;
    let mut prev_inside = inside(&prev);
    for &cur in ring {
        let cur_inside = inside(&cur);
        if cur_inside {
            if !prev_inside {
                out.push(crossing(prev, cur, axis, bound));
            }
            out.push(cur);
        } else if prev_inside {
            out.push(crossing(prev, cur, axis, bound));
        }
        prev = cur;
        prev_inside = cur_inside;
    }
    out
}

/// Point where segment `a -> b` crosses the line `p[axis] == bound`.
///
/// Only called when exactly one endpoint is strictly outside, so the segment
/// is never parallel to the clip line.
fn crossing(a: [f64; 2], b: [f64; 2], axis: usize, bound: f64) -> [f64; 2] {
    let other = 1 - axis;
    let t = (bound - a[axis]) / (b[axis] - a[axis]);
    let mut p = [0.0; 2];
    p[axis] = bound;
    p[other] = a[other] + t * (b[other] - a[other]);
    p
}

//! Polygon input types, validation, and the boundary rule shared by every
//! rasterization strategy.
//!
//! Boundary rule: an edge (a, b) crosses the horizontal line at `y` iff
//! `(a.y > y) != (b.y > y)`, so edges are closed at their lower end and open
//! at their upper end. A point is inside a ring iff an odd number of
//! crossings lie strictly to its right. Together this makes every region
//! closed on its minimum-x / minimum-y sides and open on its maximum sides.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZonalError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// An implicitly closed vertex loop. A trailing copy of the first vertex is
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring(pub Vec<Point>);

impl Ring {
    pub fn new(points: impl IntoIterator<Item = impl Into<Point>>) -> Self {
        Self(points.into_iter().map(Into::into).collect())
    }

    /// Axis-aligned rectangle ring, counter-clockwise.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new([(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)])
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Input polygon: the first ring is the outer boundary, the rest are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: String,
    pub rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(id: impl Into<String>, outer: Ring) -> Self {
        Self { id: id.into(), rings: vec![outer] }
    }

    pub fn with_hole(mut self, hole: Ring) -> Self {
        self.rings.push(hole);
        self
    }

    pub fn outer(&self) -> Option<&Ring> {
        self.rings.first()
    }

    pub fn holes(&self) -> &[Ring] {
        self.rings.get(1..).unwrap_or(&[])
    }

    /// Validate and normalise the rings for rasterization.
    pub fn prepare(&self, check_simplicity: bool) -> Result<PreparedPolygon> {
        let id = self.id.as_str();
        if self.rings.is_empty() {
            return Err(ZonalError::invalid_geometry(id, "polygon has no rings"));
        }
        let mut rings = Vec::with_capacity(self.rings.len());
        for (i, ring) in self.rings.iter().enumerate() {
            let label = if i == 0 { "outer ring".to_string() } else { format!("hole {i}") };
            let pts = normalize_ring(ring.points());
            if pts.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                return Err(ZonalError::invalid_geometry(id, format!("{label} has a non-finite vertex")));
            }
            if pts.len() < 3 {
                return Err(ZonalError::invalid_geometry(
                    id,
                    format!("{label} has {} distinct vertices, need at least 3", pts.len()),
                ));
            }
            if signed_area(&pts) == 0.0 {
                return Err(ZonalError::invalid_geometry(id, format!("{label} has zero area")));
            }
            if check_simplicity && !is_simple(&pts) {
                return Err(ZonalError::invalid_geometry(id, format!("{label} self-intersects")));
            }
            rings.push(pts);
        }
        let bbox = BBox::from_points(&rings[0]);
        let holes = rings.split_off(1);
        let outer = rings.pop().unwrap_or_default();
        Ok(PreparedPolygon { outer, holes, bbox })
    }
}

/// Validated rings with duplicate vertices removed, plus the outer bbox.
#[derive(Debug, Clone)]
pub struct PreparedPolygon {
    pub outer: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
    pub bbox: BBox,
}

impl PreparedPolygon {
    /// Inside the outer ring and not inside any hole.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.outer, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn from_points(points: &[Point]) -> Self {
        points.iter().fold(
            BBox {
                min_x: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                min_y: f64::INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |b, p| BBox {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    /// Closed-interval overlap test.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Drop consecutive duplicates and the closing vertex.
fn normalize_ring(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Abscissa where edge (a, b) crosses the line at `y`, under the half-open
/// rule. Every strategy goes through this function so masks agree bit for bit.
///
/// Endpoints are ordered by y first, so an edge shared by two neighbouring
/// polygons yields the same abscissa whichever way each ring walks it.
#[inline]
pub fn crossing_x(a: Point, b: Point, y: f64) -> Option<f64> {
    if (a.y > y) == (b.y > y) {
        return None;
    }
    let (lo, hi) = if a.y < b.y { (a, b) } else { (b, a) };
    Some(lo.x + (y - lo.y) * (hi.x - lo.x) / (hi.y - lo.y))
}

/// Iterate the edges of an implicitly closed ring.
pub fn edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Even-odd test with a ray toward +x.
pub fn ring_contains(ring: &[Point], x: f64, y: f64) -> bool {
    edges(ring)
        .filter_map(|(a, b)| crossing_x(a, b, y))
        .filter(|&cx| cx > x)
        .count()
        % 2
        == 1
}

/// Shoelace area, positive for counter-clockwise rings.
pub fn signed_area(ring: &[Point]) -> f64 {
    edges(ring).map(|(a, b)| a.x * b.y - b.x * a.y).sum::<f64>() * 0.5
}

fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed segment intersection, touching included.
fn segments_touch(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// O(n²) precheck: no two non-adjacent edges touch, and adjacent edges do
/// not fold back onto each other.
pub fn is_simple(ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        let c = ring[(i + 2) % n];
        // Spike: next edge doubles back along this one.
        if orient(a, b, c) == 0.0 && (on_segment(a, b, c) || on_segment(b, c, a)) {
            return false;
        }
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_touch(a, b, ring[j], ring[(j + 1) % n]) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: &str) -> Polygon {
        Polygon::new(id, Ring::rect(0.0, 0.0, 4.0, 4.0))
    }

    #[test]
    fn prepare_drops_closing_vertex() {
        let p = Polygon::new("a", Ring::new([(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 0.0)]));
        let prepared = p.prepare(true).unwrap();
        assert_eq!(prepared.outer.len(), 3);
        assert_eq!(prepared.bbox, BBox { min_x: 0.0, max_x: 2.0, min_y: 0.0, max_y: 2.0 });
    }

    #[test]
    fn prepare_rejects_short_and_degenerate_rings() {
        let two = Polygon::new("a", Ring::new([(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]));
        assert!(matches!(two.prepare(false), Err(ZonalError::InvalidGeometry { .. })));

        let flat = Polygon::new("b", Ring::new([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]));
        assert!(flat.prepare(false).is_err());

        let nan = Polygon::new("c", Ring::new([(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]));
        assert!(nan.prepare(false).is_err());

        let empty = Polygon { id: "d".into(), rings: vec![] };
        assert!(empty.prepare(false).is_err());
    }

    #[test]
    fn bowtie_fails_simplicity_check_only_when_enabled() {
        // A symmetric bowtie has zero signed area, so use a lopsided one.
        let bowtie = Polygon::new(
            "bow",
            Ring::new([(0.0, 0.0), (4.0, 2.0), (4.0, 0.0), (0.0, 4.0)]),
        );
        let err = bowtie.prepare(true).unwrap_err();
        assert!(err.to_string().contains("self-intersects"), "{err}");
        assert!(bowtie.prepare(false).is_ok());
    }

    #[test]
    fn simple_shapes_pass() {
        assert!(square("s").prepare(true).is_ok());
        let l_shape = Ring::new([
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ]);
        assert!(is_simple(&normalize_ring(l_shape.points())));
    }

    #[test]
    fn half_open_edges() {
        let sq = square("s").prepare(true).unwrap();
        // Minimum sides closed.
        assert!(sq.contains(0.0, 2.0));
        assert!(sq.contains(2.0, 0.0));
        assert!(sq.contains(0.0, 0.0));
        // Maximum sides open.
        assert!(!sq.contains(4.0, 2.0));
        assert!(!sq.contains(2.0, 4.0));
        assert!(!sq.contains(4.0, 4.0));
        assert!(sq.contains(3.999, 3.999));
    }

    #[test]
    fn holes_are_subtracted() {
        let p = square("h").with_hole(Ring::rect(1.0, 1.0, 3.0, 3.0)).prepare(true).unwrap();
        assert!(p.contains(0.5, 0.5));
        assert!(!p.contains(2.0, 2.0));
        assert!(p.contains(3.5, 2.0));
    }

    #[test]
    fn winding_direction_does_not_matter() {
        let ccw = Ring::rect(0.0, 0.0, 2.0, 2.0);
        let cw = Ring(ccw.points().iter().rev().copied().collect());
        assert!(signed_area(ccw.points()) > 0.0);
        assert!(signed_area(cw.points()) < 0.0);
        for &(x, y) in &[(0.5, 0.5), (1.5, 1.0), (2.0, 1.0), (1.0, 2.0)] {
            assert_eq!(ring_contains(ccw.points(), x, y), ring_contains(cw.points(), x, y));
        }
    }

    #[test]
    fn polygon_json_uses_coordinate_pairs() {
        let json = r#"{"id":"p1","rings":[[[0,0],[1,0],[1,1]]]}"#;
        let p: Polygon = serde_json::from_str(json).unwrap();
        assert_eq!(p.outer().unwrap().points()[2], Point::new(1.0, 1.0));
        assert!(p.holes().is_empty());
    }
}

// Minimal planar geometry used by the security areas, tile extents and feature filters.
// Heavy topology (buffering, dissolving unions) belongs to an external geometry engine;
// unions here are kept as collections and containment is evaluated against the parts together.

pub mod crs;

pub use crs::{CrsTransform, GeometryError};

use serde::{Deserialize, Serialize};

/// A planar coordinate, serialized as `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord(pub f64, pub f64);

impl Coord {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bbox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.0 >= self.min_x && c.0 <= self.max_x && c.1 >= self.min_y && c.1 <= self.max_y
    }

    pub fn intersects(&self, other: &Bbox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn to_geometry(&self) -> Geometry {
        Geometry::Polygon(vec![vec![
            Coord(self.min_x, self.min_y),
            Coord(self.max_x, self.min_y),
            Coord(self.max_x, self.max_y),
            Coord(self.min_x, self.max_y),
            Coord(self.min_x, self.min_y),
        ]])
    }

    /// Compact textual form used in cache keys
    pub fn to_key_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Geometry in a GeoJSON-like shape: `{"type": "Polygon", "coordinates": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Exterior ring first, holes after
    Polygon(Vec<Vec<Coord>>),
    /// Union of parts; an empty collection is the empty geometry
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn empty() -> Self {
        Geometry::Collection(Vec::new())
    }

    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Bbox::new(min_x, min_y, max_x, max_y).to_geometry()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(points) => points.is_empty(),
            Geometry::Polygon(rings) => rings.first().map_or(true, |r| r.is_empty()),
            Geometry::Collection(parts) => parts.iter().all(Geometry::is_empty),
        }
    }

    /// Union without dissolving: parts are collected side by side
    pub fn union(self, other: Geometry) -> Geometry {
        let mut parts = Vec::new();
        for geometry in [self, other] {
            match geometry {
                Geometry::Collection(inner) => parts.extend(inner),
                g if g.is_empty() => {}
                g => parts.push(g),
            }
        }
        Geometry::Collection(parts)
    }

    pub fn vertices(&self) -> Vec<Coord> {
        match self {
            Geometry::Point(c) => vec![*c],
            Geometry::LineString(points) => points.clone(),
            Geometry::Polygon(rings) => rings.iter().flatten().copied().collect(),
            Geometry::Collection(parts) => parts.iter().flat_map(Geometry::vertices).collect(),
        }
    }

    pub fn bbox(&self) -> Option<Bbox> {
        let vertices = self.vertices();
        let first = vertices.first()?;
        let mut bbox = Bbox::new(first.0, first.1, first.0, first.1);
        for c in &vertices[1..] {
            bbox = bbox.union(&Bbox::new(c.0, c.1, c.0, c.1));
        }
        Some(bbox)
    }

    fn segments(&self) -> Vec<(Coord, Coord)> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::LineString(points) => points.windows(2).map(|w| (w[0], w[1])).collect(),
            Geometry::Polygon(rings) => rings
                .iter()
                .flat_map(|ring| ring.windows(2).map(|w| (w[0], w[1])).collect::<Vec<_>>())
                .collect(),
            Geometry::Collection(parts) => parts.iter().flat_map(Geometry::segments).collect(),
        }
    }

    /// Point-in-geometry test; boundaries count as inside
    pub fn contains_point(&self, c: Coord) -> bool {
        match self {
            Geometry::Point(p) => *p == c,
            Geometry::LineString(points) => points.windows(2).any(|w| on_segment(w[0], w[1], c)),
            Geometry::Polygon(rings) => {
                let Some(exterior) = rings.first() else {
                    return false;
                };
                if ring_boundary_contains(exterior, c) {
                    return true;
                }
                if !ring_contains(exterior, c) {
                    return false;
                }
                !rings[1..]
                    .iter()
                    .any(|hole| ring_contains(hole, c) && !ring_boundary_contains(hole, c))
            }
            Geometry::Collection(parts) => parts.iter().any(|p| p.contains_point(c)),
        }
    }

    /// True when `other` lies completely inside this geometry.
    /// A multi-part `other` must be covered part by part. Against a multi-part self,
    /// `other` may spread over several parts as long as none of it leaves their union.
    pub fn covers(&self, other: &Geometry) -> bool {
        if other.is_empty() || self.is_empty() {
            return false;
        }
        match (self, other) {
            (_, Geometry::Collection(others)) => {
                others.iter().filter(|o| !o.is_empty()).all(|o| self.covers(o))
            }
            (Geometry::Collection(parts), _) => {
                parts.iter().any(|p| p.covers(other)) || self.covers_across_parts(other)
            }
            _ => {
                other.vertices().iter().all(|v| self.contains_point(*v))
                    && !segments_cross(&self.segments(), &other.segments())
            }
        }
    }

    /// Splits every edge of `other` where it meets an edge of self and checks
    /// that each vertex and each piece midpoint lies inside self
    fn covers_across_parts(&self, other: &Geometry) -> bool {
        if !other.vertices().iter().all(|v| self.contains_point(*v)) {
            return false;
        }
        let edges = self.segments();
        other.segments().iter().all(|&(a, b)| {
            let mut cuts = vec![0.0, 1.0];
            for &edge in &edges {
                cuts.extend(cut_parameters((a, b), edge));
            }
            cuts.sort_by(f64::total_cmp);
            cuts.windows(2)
                .filter(|w| w[1] - w[0] > f64::EPSILON)
                .all(|w| self.contains_point(lerp(a, b, (w[0] + w[1]) / 2.0)))
        })
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        match (self.bbox(), other.bbox()) {
            (Some(a), Some(b)) if !a.intersects(&b) => return false,
            _ => {}
        }
        other.vertices().iter().any(|v| self.contains_point(*v))
            || self.vertices().iter().any(|v| other.contains_point(*v))
            || segments_intersect_any(&self.segments(), &other.segments())
    }

    pub fn map_coords(&self, f: &impl Fn(Coord) -> Coord) -> Geometry {
        match self {
            Geometry::Point(c) => Geometry::Point(f(*c)),
            Geometry::LineString(points) => Geometry::LineString(points.iter().map(|c| f(*c)).collect()),
            Geometry::Polygon(rings) => Geometry::Polygon(
                rings
                    .iter()
                    .map(|ring| ring.iter().map(|c| f(*c)).collect())
                    .collect(),
            ),
            Geometry::Collection(parts) => {
                Geometry::Collection(parts.iter().map(|p| p.map_coords(f)).collect())
            }
        }
    }
}

fn ring_contains(ring: &[Coord], c: Coord) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.1 > c.1) != (b.1 > c.1) {
            let x_cross = (b.0 - a.0) * (c.1 - a.1) / (b.1 - a.1) + a.0;
            if c.0 < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn ring_boundary_contains(ring: &[Coord], c: Coord) -> bool {
    ring.windows(2).any(|w| on_segment(w[0], w[1], c))
}

fn orientation(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Coord, b: Coord, c: Coord) -> bool {
    orientation(a, b, c).abs() < f64::EPSILON
        && c.0 >= a.0.min(b.0)
        && c.0 <= a.0.max(b.0)
        && c.1 >= a.1.min(b.1)
        && c.1 <= a.1.max(b.1)
}

/// Proper crossing: the segments pass through each other's interiors
fn properly_cross(a: (Coord, Coord), b: (Coord, Coord)) -> bool {
    let d1 = orientation(b.0, b.1, a.0);
    let d2 = orientation(b.0, b.1, a.1);
    let d3 = orientation(a.0, a.1, b.0);
    let d4 = orientation(a.0, a.1, b.1);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn segments_intersect(a: (Coord, Coord), b: (Coord, Coord)) -> bool {
    properly_cross(a, b)
        || on_segment(b.0, b.1, a.0)
        || on_segment(b.0, b.1, a.1)
        || on_segment(a.0, a.1, b.0)
        || on_segment(a.0, a.1, b.1)
}

fn lerp(a: Coord, b: Coord, t: f64) -> Coord {
    Coord(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Positions along `a` (0 at its start, 1 at its end) where segment `b` touches it
fn cut_parameters(a: (Coord, Coord), b: (Coord, Coord)) -> Vec<f64> {
    let r = (a.1 .0 - a.0 .0, a.1 .1 - a.0 .1);
    let s = (b.1 .0 - b.0 .0, b.1 .1 - b.0 .1);
    let cross = |u: (f64, f64), v: (f64, f64)| u.0 * v.1 - u.1 * v.0;
    let length_sq = r.0 * r.0 + r.1 * r.1;
    if length_sq == 0.0 {
        return Vec::new();
    }
    let denom = cross(r, s);
    if denom.abs() < f64::EPSILON {
        // Parallel: only collinear overlaps cut, at the ends of `b`
        return [b.0, b.1]
            .into_iter()
            .filter(|c| on_segment(a.0, a.1, *c))
            .map(|c| ((c.0 - a.0 .0) * r.0 + (c.1 - a.0 .1) * r.1) / length_sq)
            .collect();
    }
    let qp = (b.0 .0 - a.0 .0, b.0 .1 - a.0 .1);
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        vec![t]
    } else {
        Vec::new()
    }
}

fn segments_cross(a: &[(Coord, Coord)], b: &[(Coord, Coord)]) -> bool {
    a.iter().any(|sa| b.iter().any(|sb| properly_cross(*sa, *sb)))
}

fn segments_intersect_any(a: &[(Coord, Coord)], b: &[(Coord, Coord)]) -> bool {
    a.iter().any(|sa| b.iter().any(|sb| segments_intersect(*sa, *sb)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_contains_point() {
        let rect = Geometry::rectangle(0.0, 0.0, 1.0, 3.0);
        assert!(rect.contains_point(Coord(0.5, 2.0)));
        assert!(rect.contains_point(Coord(1.0, 3.0)));
        assert!(!rect.contains_point(Coord(1.5, 2.0)));
    }

    #[test]
    fn test_union_contains_either_part() {
        let union = Geometry::rectangle(0.0, 0.0, 1.0, 3.0).union(Geometry::rectangle(0.0, 0.0, 2.0, 4.0));
        assert!(union.contains_point(Coord(0.5, 0.5)));
        assert!(union.contains_point(Coord(1.5, 3.5)));
        assert!(!union.contains_point(Coord(2.5, 3.5)));
    }

    #[test]
    fn test_covers_and_intersects() {
        let area = Geometry::rectangle(0.0, 0.0, 10.0, 10.0);
        let inside = Geometry::LineString(vec![Coord(1.0, 1.0), Coord(5.0, 5.0)]);
        let crossing = Geometry::LineString(vec![Coord(5.0, 5.0), Coord(15.0, 5.0)]);
        let outside = Geometry::Point(Coord(20.0, 20.0));

        assert!(area.covers(&inside));
        assert!(!area.covers(&crossing));
        assert!(area.intersects(&crossing));
        assert!(!area.intersects(&outside));
    }

    #[test]
    fn test_union_covers_geometry_spanning_parts() {
        let union = Geometry::rectangle(0.0, 0.0, 10.0, 10.0).union(Geometry::rectangle(5.0, 0.0, 15.0, 10.0));
        assert!(union.covers(&Geometry::rectangle(3.0, 1.0, 12.0, 2.0)));

        // Disjoint parts: the gap between them is not covered
        let apart = Geometry::rectangle(0.0, 0.0, 4.0, 4.0).union(Geometry::rectangle(6.0, 0.0, 10.0, 4.0));
        assert!(!apart.covers(&Geometry::LineString(vec![Coord(1.0, 1.0), Coord(9.0, 1.0)])));
        assert!(apart.covers(&Geometry::LineString(vec![Coord(1.0, 1.0), Coord(3.0, 3.0)])));
    }

    #[test]
    fn test_empty_geometry_denies_everything() {
        let empty = Geometry::empty();
        assert!(empty.is_empty());
        assert!(!empty.contains_point(Coord(0.0, 0.0)));
        assert!(!empty.covers(&Geometry::Point(Coord(0.0, 0.0))));
        assert!(!empty.intersects(&Geometry::rectangle(-1.0, -1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_polygon_hole_excluded() {
        let donut = Geometry::Polygon(vec![
            vec![Coord(0.0, 0.0), Coord(10.0, 0.0), Coord(10.0, 10.0), Coord(0.0, 10.0), Coord(0.0, 0.0)],
            vec![Coord(4.0, 4.0), Coord(6.0, 4.0), Coord(6.0, 6.0), Coord(4.0, 6.0), Coord(4.0, 4.0)],
        ]);
        assert!(donut.contains_point(Coord(2.0, 2.0)));
        assert!(!donut.contains_point(Coord(5.0, 5.0)));
    }

    #[test]
    fn test_geojson_shape() {
        let json = serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]});
        let geometry: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(geometry, Geometry::Point(Coord(1.0, 2.0)));
    }
}

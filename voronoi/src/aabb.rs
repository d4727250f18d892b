use crate::geometry::Point;

/// Padding applied to every extent so that zero-width boxes still carry a
/// nonzero surface area. Must be positive.
const SKIN: f64 = 1e-12;

/// Axis-aligned bounding box. The empty box is `pmin = +inf, pmax = -inf`.
#[derive(Clone, Debug)]
pub struct Aabb {
    pmin: Point,
    pmax: Point,
    surface_area: f64,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            pmin: Point::from_xy(f64::INFINITY, f64::INFINITY),
            pmax: Point::from_xy(f64::NEG_INFINITY, f64::NEG_INFINITY),
            surface_area: 0.0,
        }
    }

    pub fn from_point(point: &Point) -> Self {
        let mut aabb = Self::empty();
        aabb.expand(point);
        aabb
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand(point);
        }
        aabb
    }

    pub fn pmin(&self) -> Point {
        self.pmin
    }

    pub fn pmax(&self) -> Point {
        self.pmax
    }

    /// Grow the box to contain `point`.
    pub fn expand(&mut self, point: &Point) {
        self.pmin.x = self.pmin.x.min(point.x);
        self.pmin.y = self.pmin.y.min(point.y);
        self.pmax.x = self.pmax.x.max(point.x);
        self.pmax.y = self.pmax.y.max(point.y);
        self.update_surface_area();
    }

    /// Grow the box to contain `other`.
    pub fn union(&mut self, other: &Aabb) {
        self.pmin.x = self.pmin.x.min(other.pmin.x);
        self.pmin.y = self.pmin.y.min(other.pmin.y);
        self.pmax.x = self.pmax.x.max(other.pmax.x);
        self.pmax.y = self.pmax.y.max(other.pmax.y);
        self.update_surface_area();
    }

    /// Reset to exactly the union of two other boxes.
    pub fn set_union(&mut self, a: &Aabb, b: &Aabb) {
        *self = Self::empty();
        self.union(a);
        self.union(b);
    }

    pub fn intersect(&self, other: &Aabb) -> bool {
        self.pmin.x <= other.pmax.x
            && self.pmin.y <= other.pmax.y
            && other.pmin.x <= self.pmax.x
            && other.pmin.y <= self.pmax.y
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.pmin.x <= point.x
            && self.pmin.y <= point.y
            && point.x <= self.pmax.x
            && point.y <= self.pmax.y
    }

    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    fn update_surface_area(&mut self) {
        let dx = (self.pmax.x - self.pmin.x).into_inner();
        let dy = (self.pmax.y - self.pmin.y).into_inner();
        debug_assert!(dx >= 0.0 && dy >= 0.0);
        self.surface_area = 2.0 * ((dx + 2.0 * SKIN) + (dy + 2.0 * SKIN));
    }

    /// Surface area the box would have if `point` were added.
    pub fn proposed_surface_area(&self, point: &Point) -> f64 {
        let dx = (self.pmax.x.max(point.x) - self.pmin.x.min(point.x)).into_inner();
        let dy = (self.pmax.y.max(point.y) - self.pmin.y.min(point.y)).into_inner();
        2.0 * ((dx + 2.0 * SKIN) + (dy + 2.0 * SKIN))
    }
}

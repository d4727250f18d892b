use std::{
    fmt,
    ops::{Add, Mul, Sub},
};

use approx::abs_diff_eq;
use ordered_float::OrderedFloat;

/// Absolute tolerance shared by every numerical predicate in the crate.
pub const TOLERANCE: f64 = 1e-8;

pub(crate) fn close(a: f64, b: f64) -> bool {
    abs_diff_eq!(a, b, epsilon = TOLERANCE)
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Point {
    pub x: OrderedFloat<f64>,
    pub y: OrderedFloat<f64>,
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x.into_inner(), self.y.into_inner())
    }
}

impl Point {
    pub fn new(x: OrderedFloat<f64>, y: OrderedFloat<f64>) -> Self {
        Self { x, y }
    }

    pub fn from_xy(x: f64, y: f64) -> Self {
        Self::new(x.into(), y.into())
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<OrderedFloat<f64>> for Point {
    type Output = Self;

    fn mul(self, rhs: OrderedFloat<f64>) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    let d = *a - *b;
    (d.x * d.x + d.y * d.y).sqrt()
}

/// Coefficients `(a, b, c)` of the line `a*x + b*y = c` through `p` and `q`.
pub fn line(p: &Point, q: &Point) -> (f64, f64, f64) {
    let dx = (q.x - p.x).into_inner();
    let dy = (q.y - p.y).into_inner();
    let c = -dy * p.x.into_inner() + dx * p.y.into_inner();
    (-dy, dx, c)
}

/// Coefficients of the line through the midpoint of `pq`, perpendicular to it.
pub fn perpendicular_bisector(p: &Point, q: &Point) -> (f64, f64, f64) {
    let dx = (q.x - p.x).into_inner();
    let dy = (q.y - p.y).into_inner();
    let mid = (*p + *q) * OrderedFloat(0.5);
    let c = -dx * mid.x.into_inner() - dy * mid.y.into_inner();
    (-dx, -dy, c)
}

/// Center and radius of the circle through three points, or `None` when the
/// points are collinear.
pub fn circumcircle(p: &Point, q: &Point, r: &Point) -> Option<(Point, f64)> {
    let (a0, b0, c0) = perpendicular_bisector(p, q);
    let (a1, b1, c1) = perpendicular_bisector(p, r);
    let det = a0 * b1 - a1 * b0;
    if close(det, 0.0) {
        return None;
    }
    let x = (c0 * b1 - c1 * b0) / det;
    let y = (a0 * c1 - a1 * c0) / det;
    let center = Point::from_xy(x, y);
    let radius = distance(p, &center);
    Some((center, radius))
}

/// Height of the parabola with the given focus and horizontal directrix at
/// abscissa `x`. Degenerates to `+inf` when the focus lies on the directrix.
pub fn parabola_y(focus: &Point, directrix: f64, x: f64) -> f64 {
    let fy = focus.y.into_inner();
    if close(fy, directrix) {
        return f64::INFINITY;
    }
    let dx = x - focus.x.into_inner();
    let dy = directrix - fy;
    let b = directrix + fy;
    (b - dx * dx / dy) / 2.0
}

/// Intersection of the parabolas with foci `f0`, `f1` and a shared directrix.
///
/// Of the two candidate roots, the one returned is the breakpoint at which
/// the arc of `f0` lies to the left of the arc of `f1`: the larger root when
/// `f0.y > f1.y`, the smaller otherwise. Returns `(+inf, +inf)` when both
/// foci sit on the directrix.
pub fn parabola_intersection(f0: &Point, f1: &Point, directrix: f64) -> (f64, f64) {
    let (x0, y0) = (f0.x.into_inner(), f0.y.into_inner());
    let (x1, y1) = (f1.x.into_inner(), f1.y.into_inner());

    if close(y0, directrix) && close(y1, directrix) {
        return (f64::INFINITY, f64::INFINITY);
    }

    debug_assert!(y0 <= directrix);
    debug_assert!(y1 <= directrix);

    let y0d = y0 - directrix;
    let y1d = y1 - directrix;

    let a = y1d - y0d;
    let b = 2.0 * (x1 * y0d - x0 * y1d);
    let c = x0 * x0 * y1d - x1 * x1 * y0d - a * y0d * y1d;

    if close(a, 0.0) {
        // equidistant foci leave a linear equation with a single root
        let x = -c / b;
        return (x, parabola_y(f0, directrix, x));
    }

    let mut discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        debug_assert!(close(b * b, 4.0 * a * c));
        discriminant = 0.0;
    }

    let root = discriminant.sqrt();
    let d_minus = (-b - root) / (2.0 * a);
    let d_plus = (-b + root) / (2.0 * a);
    let x = if y0 > y1 {
        d_minus.max(d_plus)
    } else {
        d_minus.min(d_plus)
    };

    let y = if close(y0, directrix) {
        parabola_y(f1, directrix, x)
    } else {
        parabola_y(f0, directrix, x)
    };

    (x, y)
}

fn det(p: &Point, q: &Point, r: &Point) -> f64 {
    let pd = *p - *r;
    let qd = *q - *r;
    (pd.x * qd.y - pd.y * qd.x).into_inner()
}

/// True when `r` lies strictly to the left of the directed line `pq`.
pub fn is_left(p: &Point, q: &Point, r: &Point) -> bool {
    let d = det(p, q, r);
    d > 0.0 && !close(d, 0.0)
}

/// True when `r` lies strictly to the right of the directed line `pq`.
pub fn is_right(p: &Point, q: &Point, r: &Point) -> bool {
    let d = det(p, q, r);
    d < 0.0 && !close(d, 0.0)
}

pub fn is_on_line(p: &Point, q: &Point, r: &Point) -> bool {
    close(det(p, q, r), 0.0)
}

use ordered_float::OrderedFloat;

use crate::geometry::{circumcircle, Point};

/// Predicted cocircularity of three consecutive arcs.
pub struct CircleEvent {
    pub center: Point,
    pub radius: f64,
    /// Cleared instead of removing the entry from the queue; stale events
    /// are discarded when popped.
    pub active: bool,
    /// Leaf of the arc whose disappearance this event predicts.
    pub arc: usize,
}

impl CircleEvent {
    /// The sweepline position at which the middle arc vanishes.
    pub fn key(&self) -> Point {
        Point::new(self.center.x, self.center.y + self.radius)
    }

    pub fn deactivate(&mut self) {
        assert!(self.active);
        self.active = false;
    }
}

/// Circle event through three points, or `None` when they are collinear.
pub fn make_circle_event(p: &Point, q: &Point, r: &Point, arc: usize) -> Option<CircleEvent> {
    let (center, radius) = circumcircle(p, q, r)?;
    Some(CircleEvent {
        center,
        radius,
        active: true,
        arc,
    })
}

/// Queue priority for a point key: ascending `(y, x)` under a max-heap.
pub fn queue_priority(point: &Point) -> std::cmp::Reverse<(OrderedFloat<f64>, OrderedFloat<f64>)> {
    std::cmp::Reverse((point.y, point.x))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::distance;

    #[test]
    fn event_key_tops_the_circle() {
        let p = Point::from_xy(-1.0, 0.0);
        let q = Point::from_xy(0.0, 1.0);
        let r = Point::from_xy(1.0, 0.0);
        let event = make_circle_event(&p, &q, &r, 0).unwrap();
        assert_abs_diff_eq!(event.center.x.into_inner(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(event.center.y.into_inner(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(event.radius, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(event.key().y.into_inner(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn collinear_triples_make_no_event() {
        let p = Point::from_xy(0.0, 0.0);
        let q = Point::from_xy(1.0, 1.0);
        let r = Point::from_xy(2.0, 2.0);
        assert!(make_circle_event(&p, &q, &r, 0).is_none());
    }

    #[test]
    fn queue_priority_orders_by_y_then_x() {
        let low = queue_priority(&Point::from_xy(5.0, 1.0));
        let high = queue_priority(&Point::from_xy(-5.0, 2.0));
        assert!(low > high);

        let left = queue_priority(&Point::from_xy(1.0, 3.0));
        let right = queue_priority(&Point::from_xy(2.0, 3.0));
        assert!(left > right);
    }

    #[test]
    fn vertex_is_equidistant_from_the_triple() {
        let p = Point::from_xy(0.2, 0.4);
        let q = Point::from_xy(1.7, 0.1);
        let r = Point::from_xy(0.9, 1.3);
        let event = make_circle_event(&p, &q, &r, 0).unwrap();
        for site in [p, q, r] {
            assert_abs_diff_eq!(distance(&event.center, &site), event.radius, epsilon = 1e-9);
        }
    }
}

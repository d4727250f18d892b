use std::cmp::Reverse;

use itertools::chain;
use log::{info, warn};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::beachline::Beachline;
use crate::events::{make_circle_event, queue_priority, CircleEvent};
use crate::geometry::{close, is_right, perpendicular_bisector, Point};

mod aabb;
mod avl;
mod beachline;
mod bvh;
mod dcel;
mod events;
pub mod geometry;
#[cfg(test)]
mod test_utils;

pub use crate::dcel::{Dcel, HalfEdge, VertexPoint};

#[derive(Clone, Hash, PartialEq, Eq)]
enum Event {
    /// Index into the site list
    Site(usize),
    /// Index into the circle-event arena
    Circle(usize),
}

type EventQueue = PriorityQueue<Event, Reverse<(OrderedFloat<f64>, OrderedFloat<f64>)>>;

#[derive(Clone, Copy, Debug)]
pub struct VoronoiConfig {
    /// Rebalance the vertex index after every insertion.
    pub balanced_vertex_tree: bool,
    /// Vertices closer than this collapse into one.
    pub merge_radius: f64,
}

impl Default for VoronoiConfig {
    fn default() -> Self {
        Self {
            balanced_vertex_tree: false,
            merge_radius: 1e-8,
        }
    }
}

/// Result of checking Euler's identity `(V+1) - E + F = 2` over the bounded
/// diagram, with the edge-length extremes that help diagnose a failure.
#[derive(Clone, Copy, Debug)]
pub struct EulerCheck {
    pub satisfied: bool,
    pub vertices: usize,
    pub edges: usize,
    pub faces: usize,
    pub shortest_edge_length: f64,
    pub longest_edge_length: f64,
}

/// Fortune's sweepline algorithm over a set of sites, producing a bounded
/// DCEL. Call `preprocess`, `run`, and `postprocess` in that order.
pub struct VoronoiDiagram {
    sites: Vec<Point>,
    dcel: Dcel,
    tree: Beachline,
    queue: EventQueue,
    circles: Vec<CircleEvent>,
    n_sites: usize,
    n_vertices: usize,
    n_edges: usize,
    merge_radius: f64,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl VoronoiDiagram {
    pub fn new(sites: &[Point]) -> Self {
        Self::with_config(sites, VoronoiConfig::default())
    }

    pub fn with_config(sites: &[Point], config: VoronoiConfig) -> Self {
        Self {
            sites: sites.to_vec(),
            dcel: Dcel::new(config.balanced_vertex_tree),
            tree: Beachline::new(),
            queue: EventQueue::new(),
            circles: vec![],
            n_sites: 0,
            n_vertices: 0,
            n_edges: 0,
            merge_radius: config.merge_radius,
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
        }
    }

    /// Number of unique sites handled so far.
    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Number of distinct Voronoi vertices.
    pub fn n_vertices(&self) -> usize {
        self.n_vertices
    }

    /// Number of unordered edges (half the half-edge count).
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    pub fn dcel(&self) -> &Dcel {
        &self.dcel
    }

    /// Snap near-equal coordinates to shared values so that events with
    /// equal keys identify genuinely coincident sites. Each run of close
    /// coordinates takes the value of its first member.
    pub fn preprocess(&mut self) {
        let n = self.sites.len();
        if n == 0 {
            return;
        }

        self.sites.sort_by_key(|site| site.y);
        let mut i = 0;
        let mut j = 0;
        let mut value = self.sites[0].y;
        loop {
            while i < n && close(self.sites[i].y.into_inner(), value.into_inner()) {
                i += 1;
            }
            while j < i {
                self.sites[j].y = value;
                j += 1;
            }
            if i == n {
                break;
            }
            value = self.sites[i].y;
        }

        self.sites.sort_by_key(|site| site.x);
        let mut i = 0;
        let mut j = 0;
        let mut value = self.sites[0].x;
        loop {
            while i < n && close(self.sites[i].x.into_inner(), value.into_inner()) {
                i += 1;
            }
            while j < i {
                self.sites[j].x = value;
                j += 1;
            }
            if i == n {
                break;
            }
            value = self.sites[i].x;
        }
    }

    /// The event loop: pop site and circle events in `(y, x)` order until
    /// the queue drains.
    pub fn run(&mut self) {
        for (i, site) in self.sites.iter().enumerate() {
            self.queue.push(Event::Site(i), queue_priority(site));
        }

        let mut prev_site: Option<Point> = None;
        while let Some((event, _)) = self.queue.pop() {
            match event {
                Event::Circle(circle) => self.handle_circle_event(circle),
                Event::Site(site) => {
                    let site = self.sites[site];
                    if prev_site == Some(site) {
                        warn!("skipping duplicate site {:?}", site);
                    } else {
                        self.handle_site_event(site);
                        prev_site = Some(site);
                        self.n_sites += 1;
                    }
                }
            }
        }
    }

    /// Close every remaining open edge against a scaled bounding rectangle,
    /// optionally check Euler's identity, and finalize the DCEL links.
    pub fn postprocess(&mut self, scale: f64, validate: bool) -> Option<EulerCheck> {
        let mut scale = scale;
        if scale < 1.1 {
            warn!("postprocess: raising bounding scale to the minimum of 1.1");
            scale = 1.1;
        }

        self.bound_diagram(scale);

        // must run after bounding so every edge has been counted, and
        // before the DCEL pass so a defect is reported rather than asserted
        let check = validate.then(|| self.validate());
        if let Some(check) = check {
            if check.satisfied {
                info!("Voronoi diagram satisfies Euler's identity");
            } else {
                warn!(
                    "Euler's identity not satisfied: (V+1) - E + F = {} + 1 - {} + {} != 2",
                    check.vertices, check.edges, check.faces
                );
                warn!(
                    "shortest edge {}, longest edge {}; consider raising the \
                     degenerate-vertex merge radius (currently {})",
                    check.shortest_edge_length, check.longest_edge_length, self.merge_radius
                );
            }
        }

        self.dcel.postprocess();
        check
    }

    /// Check Euler's identity over the bounded diagram. The `+1` accounts
    /// for the outer face.
    pub fn validate(&self) -> EulerCheck {
        let satisfied =
            (self.n_vertices as i64 + 1) - self.n_edges as i64 + self.n_sites as i64 == 2;
        EulerCheck {
            satisfied,
            vertices: self.n_vertices,
            edges: self.n_edges,
            faces: self.n_sites,
            shortest_edge_length: self.dcel.shortest_edge_length(),
            longest_edge_length: self.dcel.longest_edge_length(),
        }
    }

    fn update_min_max(&mut self, point: &Point) {
        self.xmin = self.xmin.min(point.x.into_inner());
        self.xmax = self.xmax.max(point.x.into_inner());
        self.ymin = self.ymin.min(point.y.into_inner());
        self.ymax = self.ymax.max(point.y.into_inner());
    }

    fn handle_site_event(&mut self, site: Point) {
        let insertion = self.tree.insert(site);
        if let Some(circle) = insertion.invalidated {
            self.circles[circle].deactivate();
        }

        let leaf = insertion.leaf;
        let node_l = self.tree.predecessor_arc(leaf);
        let node_r = self.tree.successor_arc(leaf);
        let node_ll = node_l.and_then(|node| self.tree.predecessor_arc(node));
        let node_rr = node_r.and_then(|node| self.tree.successor_arc(node));

        self.add_circle_event(node_ll, node_l, Some(leaf));
        self.add_circle_event(Some(leaf), node_r, node_rr);

        self.update_min_max(&site);
    }

    fn handle_circle_event(&mut self, circle: usize) {
        if !self.circles[circle].active {
            return;
        }

        let leaf = self.circles[circle].arc;
        let node_l = self.tree.predecessor_arc(leaf);
        let node_r = self.tree.successor_arc(leaf);
        let node_ll = node_l.and_then(|node| self.tree.predecessor_arc(node));
        let node_rr = node_r.and_then(|node| self.tree.successor_arc(node));

        let center = self.circles[circle].center;
        let vertex = match self.dcel.closest_vertex(&center, self.merge_radius) {
            Some(vertex) => vertex,
            None => {
                self.n_vertices += 1;
                self.dcel.add_vertex(center, self.merge_radius)
            }
        };

        let removal = self.tree.delete(leaf);
        self.tree.endpoints_mut(removal.left_edge).add(vertex);
        self.tree.endpoints_mut(removal.right_edge).add(vertex);
        self.tree.endpoints_mut(removal.merged_edge).add(vertex);

        for edge in [removal.left_edge, removal.right_edge] {
            if let Some((p0, p1)) = self.tree.endpoints(edge).ends() {
                if self.dcel.create_edge(p0, p1).is_some() {
                    self.n_edges += 1;
                }
            }
        }

        self.add_circle_event(node_ll, node_l, node_r);
        self.add_circle_event(node_l, node_r, node_rr);
    }

    /// Enqueue a circle event predicting the disappearance of `mid`. The
    /// triple must bend rightward for the middle arc to ever vanish; a
    /// pending event on `mid` is replaced only by one with a strictly lower
    /// key.
    fn add_circle_event(&mut self, left: Option<usize>, mid: Option<usize>, right: Option<usize>) {
        let (Some(left), Some(mid), Some(right)) = (left, mid, right) else {
            return;
        };

        let l = self.tree.focus(left);
        let c = self.tree.focus(mid);
        let r = self.tree.focus(right);
        if !is_right(&r, &c, &l) {
            return;
        }

        let Some(event) = make_circle_event(&l, &c, &r, mid) else {
            return;
        };

        if let Some(pending) = self.tree.circle(mid) {
            if event.key().y < self.circles[pending].key().y {
                self.circles[pending].deactivate();
            } else {
                return;
            }
        }

        let index = self.circles.len();
        self.queue.push(Event::Circle(index), queue_priority(&event.key()));
        self.circles.push(event);
        self.tree.set_circle(mid, Some(index));
    }

    /// Close every open edge record against the bounding rectangle of all
    /// sites and vertices, inflated by `scale`.
    fn bound_diagram(&mut self, scale: f64) {
        let (pmin, pmax) = self
            .dcel
            .vertex_bounds()
            .expect("diagram has at least one vertex");

        let mut xmin = pmin.x.into_inner().min(self.xmin);
        let mut xmax = pmax.x.into_inner().max(self.xmax);
        let mut ymin = pmin.y.into_inner().min(self.ymin);
        let mut ymax = pmax.y.into_inner().max(self.ymax);

        let dx = xmax - xmin;
        let xm = (xmin + xmax) / 2.0;
        xmin = xm - scale * dx / 2.0;
        xmax = xm + scale * dx / 2.0;

        let dy = ymax - ymin;
        let ym = (ymin + ymax) / 2.0;
        ymin = ym - scale * dy / 2.0;
        ymax = ym + scale * dy / 2.0;

        let open_edges: Vec<(Point, Point, usize)> =
            chain(self.tree.breakpoints(), self.tree.colinear_breakpoints()).collect();

        for (p0, p1, edge) in open_edges {
            assert!(!self.tree.endpoints(edge).is_closed());
            let center = self
                .tree
                .endpoints(edge)
                .first()
                .expect("open edge has one endpoint");

            let hit = rectangle_intersection(&p0, &p1, xmin, xmax, ymin, ymax);
            debug_assert!(!close(
                crate::geometry::distance(&self.dcel.position(center), &hit),
                0.0
            ));
            let boundary = self.dcel.make_point(hit);
            if self.dcel.create_edge(center, boundary).is_some() {
                self.n_edges += 1;
            }
        }
    }
}

/// Point where the perpendicular bisector of `p0 p1` leaves the rectangle,
/// on the side dictated by the relative position of the two foci.
fn rectangle_intersection(
    p0: &Point,
    p1: &Point,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
) -> Point {
    let xmid = (p0.x.into_inner() + p1.x.into_inner()) / 2.0;
    let ymid = (p0.y.into_inner() + p1.y.into_inner()) / 2.0;

    if close(p0.x.into_inner(), p1.x.into_inner()) {
        let x = if p0.y > p1.y { xmax } else { xmin };
        Point::from_xy(x, ymid)
    } else if close(p0.y.into_inner(), p1.y.into_inner()) {
        let y = if p0.x > p1.x { ymin } else { ymax };
        Point::from_xy(xmid, y)
    } else {
        let (a, b, c) = perpendicular_bisector(p0, p1);
        let mut y = if p0.x < p1.x { ymax } else { ymin };
        let mut x = (c - b * y) / a;
        if x > xmax {
            x = xmax;
            y = (c - a * x) / b;
        } else if x < xmin {
            x = xmin;
            y = (c - a * x) / b;
        }
        Point::from_xy(x, y)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::{distance, is_left};
    use crate::test_utils::{assert_dcel_consistent, assert_vertices_equidistant, sites_on_circle};

    fn diagram(sites: &[Point]) -> VoronoiDiagram {
        let mut vd = VoronoiDiagram::new(sites);
        vd.preprocess();
        vd.run();
        vd
    }

    #[test]
    fn circle_of_sites_collapses_to_one_vertex() {
        for n in [3, 4, 5, 6] {
            let sites = sites_on_circle(n, 1.0, 0.0, 0.0);
            let mut vd = diagram(&sites);

            assert_eq!(vd.dcel().vertices().len(), 1);
            assert_eq!(vd.dcel().edges().len(), 0);
            let vertex = vd.dcel().position(vd.dcel().vertices()[0]);
            assert_abs_diff_eq!(vertex.x.into_inner(), 0.0, epsilon = 1e-15);
            assert_abs_diff_eq!(vertex.y.into_inner(), 0.0, epsilon = 1e-15);

            let check = vd.postprocess(1.1, true).unwrap();
            assert!(check.satisfied);
            assert_eq!(vd.dcel().vertices().len(), 1);
            assert_eq!(vd.dcel().edges().len(), 2 * n);
            assert_dcel_consistent(vd.dcel());
        }
    }

    #[test]
    fn circle_of_sites_rotation_is_counterclockwise() {
        let sites = sites_on_circle(5, 1.0, 0.0, 0.0);
        let mut vd = diagram(&sites);
        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);

        let origin = vd
            .dcel()
            .closest_vertex(&Point::from_xy(0.0, 0.0), 1e-8)
            .unwrap();
        let center = vd.dcel().position(origin);

        let start = vd.dcel().point(origin).edge.unwrap();
        let mut edge = start;
        loop {
            let twin = vd.dcel().edge(edge).twin.unwrap();
            assert_eq!(vd.dcel().edge(edge).next, Some(twin));
            assert_eq!(vd.dcel().edge(twin).twin, Some(edge));

            // prev.prev rotates counterclockwise about the only vertex
            let prev = vd.dcel().edge(edge).prev.unwrap();
            let rotated = vd.dcel().edge(prev).prev.unwrap();
            let dest = vd.dcel().position(vd.dcel().edge(edge).dest);
            let rotated_dest = vd.dcel().position(vd.dcel().edge(rotated).dest);
            assert!(is_left(&center, &dest, &rotated_dest));

            edge = rotated;
            if edge == start {
                break;
            }
        }
    }

    #[test]
    fn circle_of_sites_with_center() {
        for n in [3, 4, 5, 6] {
            let mut sites = sites_on_circle(n, 1.0, 0.0, 0.0);
            sites.push(Point::from_xy(0.0, 0.0));
            let mut vd = diagram(&sites);

            assert_eq!(vd.dcel().vertices().len(), n);
            assert_eq!(vd.dcel().edges().len(), 2 * n);
            assert!(vd
                .dcel()
                .closest_vertex(&Point::from_xy(0.0, 0.0), 1e-8)
                .is_none());

            let check = vd.postprocess(1.1, true).unwrap();
            assert!(check.satisfied);
            assert_eq!(vd.dcel().vertices().len(), n);
            assert_eq!(vd.dcel().edges().len(), 4 * n);
            assert_dcel_consistent(vd.dcel());
            assert_vertices_equidistant(&vd);
        }
    }

    #[test]
    fn horizontal_line_of_sites_with_apex() {
        for n in [2usize, 3, 4, 5, 10, 15] {
            let mut sites = vec![];
            for i in 0..n {
                let x = -1.0 + 2.0 * i as f64 / (n - 1) as f64;
                sites.push(Point::from_xy(x, -1.0));
            }
            sites.push(Point::from_xy(0.0, 0.0));
            let mut vd = diagram(&sites);

            assert_eq!(vd.n_sites(), n + 1);
            assert_eq!(vd.dcel().vertices().len(), n - 1);
            assert_eq!(vd.dcel().edges().len(), 2 * (n - 2));

            let check = vd.postprocess(1.1, true).unwrap();
            assert!(check.satisfied);
            assert_eq!(vd.dcel().vertices().len(), n - 1);
            assert_eq!(vd.dcel().edges().len(), 2 * (2 * n - 1));
            assert_dcel_consistent(vd.dcel());
        }
    }

    #[test]
    fn kite_produces_equidistant_vertices() {
        let sites = vec![
            Point::from_xy(0.0, 0.0),
            Point::from_xy(-1.0, 1.0),
            Point::from_xy(1.0, 1.0),
            Point::from_xy(0.0, 1.1),
        ];
        let mut vd = diagram(&sites);
        assert!(!vd.dcel().vertices().is_empty());

        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);
        assert_dcel_consistent(vd.dcel());
        assert_vertices_equidistant(&vd);
    }

    #[test]
    fn duplicate_sites_are_skipped() {
        let sites = vec![
            Point::from_xy(0.0, 0.0),
            Point::from_xy(4.0, 0.0),
            Point::from_xy(2.0, 3.0),
            Point::from_xy(4.0, 0.0),
        ];
        let mut vd = diagram(&sites);
        assert_eq!(vd.n_sites(), 3);

        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);
        assert_dcel_consistent(vd.dcel());
    }

    #[test]
    fn near_coincident_sites_snap_together() {
        let sites = vec![
            Point::from_xy(0.0, 0.0),
            Point::from_xy(1e-9, 1e-10),
            Point::from_xy(4.0, 0.0),
            Point::from_xy(2.0, 3.0),
        ];
        let mut vd = diagram(&sites);
        assert_eq!(vd.n_sites(), 3);
        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);
    }

    #[test]
    fn degenerate_ring_needs_a_wider_merge_radius() {
        let sites = sites_on_circle(100, 1e5, 0.0, 0.0);

        // at the default radius the near-coincident central vertices stay
        // distinct and the identity breaks
        let mut degenerate = diagram(&sites);
        let check = degenerate.postprocess(1.1, true).unwrap();
        assert!(!check.satisfied);

        let mut vd = VoronoiDiagram::with_config(
            &sites,
            VoronoiConfig {
                balanced_vertex_tree: false,
                merge_radius: 1.9e-8,
            },
        );
        vd.preprocess();
        vd.run();
        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);

        let near_origin = vd
            .dcel()
            .vertices()
            .iter()
            .filter(|&&v| distance(&vd.dcel().position(v), &Point::from_xy(0.0, 0.0)) < 1.0)
            .count();
        assert_eq!(near_origin, 1);
    }

    #[test]
    fn balanced_vertex_tree_gives_the_same_diagram() {
        let mut sites = sites_on_circle(8, 1.0, 0.0, 0.0);
        sites.push(Point::from_xy(0.0, 0.0));

        let mut vd = VoronoiDiagram::with_config(
            &sites,
            VoronoiConfig {
                balanced_vertex_tree: true,
                ..VoronoiConfig::default()
            },
        );
        vd.preprocess();
        vd.run();
        let check = vd.postprocess(1.1, true).unwrap();
        assert!(check.satisfied);
        assert_eq!(vd.dcel().vertices().len(), 8);
        assert_dcel_consistent(vd.dcel());
    }

    #[test]
    fn small_scales_are_clamped() {
        let sites = sites_on_circle(4, 1.0, 0.0, 0.0);
        let mut vd = diagram(&sites);
        let check = vd.postprocess(0.5, true).unwrap();
        assert!(check.satisfied);
        assert_dcel_consistent(vd.dcel());
    }
}

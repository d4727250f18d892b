use std::f64::consts::PI;

use ordered_float::OrderedFloat;

use crate::bvh::Bvh;
use crate::geometry::{close, distance, Point};

/// A DCEL point: a position plus any one outgoing half-edge, enough to start
/// a rotation around the point.
pub struct VertexPoint {
    pub position: Point,
    pub edge: Option<usize>,
}

/// Directed edge. `twin`, `next`, and `prev` are filled in stages: `twin` at
/// creation, `prev` and `next` during postprocessing. Until then `next`
/// doubles as a linked list of all half-edges leaving `src`.
pub struct HalfEdge {
    pub src: usize,
    pub dest: usize,
    pub twin: Option<usize>,
    pub next: Option<usize>,
    pub prev: Option<usize>,
}

/// Doubly-connected edge list. Voronoi vertices are deduplicated through a
/// BVH; boundary points stay outside the index.
pub struct Dcel {
    vertex_tree: Bvh,
    points: Vec<VertexPoint>,
    vertices: Vec<usize>,
    edges: Vec<HalfEdge>,
    shortest_edge_length: f64,
    longest_edge_length: f64,
}

impl Dcel {
    pub fn new(balanced_vertex_tree: bool) -> Self {
        Self {
            vertex_tree: if balanced_vertex_tree {
                Bvh::balanced()
            } else {
                Bvh::new()
            },
            points: vec![],
            vertices: vec![],
            edges: vec![],
            shortest_edge_length: f64::INFINITY,
            longest_edge_length: 0.0,
        }
    }

    pub fn position(&self, point: usize) -> Point {
        self.points[point].position
    }

    pub fn point(&self, point: usize) -> &VertexPoint {
        &self.points[point]
    }

    /// Ids of the BVH-registered Voronoi vertices.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn edges(&self) -> &[HalfEdge] {
        &self.edges
    }

    pub fn edge(&self, edge: usize) -> &HalfEdge {
        &self.edges[edge]
    }

    pub fn shortest_edge_length(&self) -> f64 {
        self.shortest_edge_length
    }

    pub fn longest_edge_length(&self) -> f64 {
        self.longest_edge_length
    }

    /// Bounds of all registered vertices.
    pub fn vertex_bounds(&self) -> Option<(Point, Point)> {
        self.vertex_tree.bounds()
    }

    /// Registered vertex within `radius` of `point`, if any.
    pub fn closest_vertex(&self, point: &Point, radius: f64) -> Option<usize> {
        self.vertex_tree.query(point, radius)
    }

    /// Register a new Voronoi vertex. The caller queries first; inserting a
    /// vertex with a neighbor inside `radius` is a bug.
    pub fn add_vertex(&mut self, point: Point, radius: f64) -> usize {
        debug_assert!(self.closest_vertex(&point, radius).is_none());
        let id = self.points.len();
        self.points.push(VertexPoint {
            position: point,
            edge: None,
        });
        self.vertex_tree.insert(point, id);
        self.vertices.push(id);
        id
    }

    /// Allocate a point that stays outside the vertex index, e.g. a bounding
    /// rectangle intersection closing an unbounded edge.
    pub fn make_point(&mut self, point: Point) -> usize {
        self.points.push(VertexPoint {
            position: point,
            edge: None,
        });
        self.points.len() - 1
    }

    /// Create the half-edge pair between two points. The source must be a
    /// registered vertex. Returns `None` when both ends are the same point,
    /// which happens when more than three sites share a circumcircle.
    pub fn create_edge(&mut self, src: usize, dest: usize) -> Option<usize> {
        debug_assert!(self.vertex_tree.contains_item(&self.position(src), src));

        if src == dest {
            return None;
        }
        debug_assert_ne!(self.position(src), self.position(dest));

        let e01 = self.edges.len();
        let e10 = e01 + 1;
        self.edges.push(HalfEdge {
            src,
            dest,
            twin: Some(e10),
            next: self.points[src].edge,
            prev: None,
        });
        self.edges.push(HalfEdge {
            src: dest,
            dest: src,
            twin: Some(e01),
            next: self.points[dest].edge,
            prev: None,
        });
        self.points[src].edge = Some(e01);
        self.points[dest].edge = Some(e10);

        let length = distance(&self.position(src), &self.position(dest));
        self.shortest_edge_length = self.shortest_edge_length.min(length);
        self.longest_edge_length = self.longest_edge_length.max(length);

        Some(e01)
    }

    /// Counterclockwise angle of `edge` around its source.
    fn theta(&self, edge: usize) -> f64 {
        let center = self.position(self.edges[edge].src);
        let dest = self.position(self.edges[edge].dest);
        let radius = distance(&center, &dest);
        let dx = (dest.x - center.x).into_inner();
        let dy = (dest.y - center.y).into_inner();
        let cosine = dx / radius;
        if dy > 0.0 || close(dy, 0.0) {
            cosine.acos()
        } else {
            2.0 * PI - cosine.acos()
        }
    }

    /// Turn the temporary per-vertex `next` lists into the final cyclic
    /// `prev`/`next` links.
    pub fn postprocess(&mut self) {
        for i in 0..self.vertices.len() {
            let vertex = self.vertices[i];
            let mut edge = self.points[vertex].edge.expect("vertex has an edge");

            let mut outgoing = vec![];
            while let Some(next) = self.edges[edge].next {
                outgoing.push(edge);
                edge = next;
            }
            outgoing.push(edge);

            outgoing.sort_by(|&a, &b| OrderedFloat(self.theta(a)).cmp(&OrderedFloat(self.theta(b))));

            for pair in outgoing.windows(2) {
                self.edges[pair[0]].prev = self.edges[pair[1]].twin;
            }
            let first_twin = self.edges[outgoing[0]].twin;
            self.edges[*outgoing.last().unwrap()].prev = first_twin;
        }

        // an edge leaving a boundary point has no incoming neighbor besides
        // its own twin
        for edge in 0..self.edges.len() {
            if self.edges[edge].prev.is_none() {
                let twin = self.edges[edge].twin.unwrap();
                assert!(self.edges[twin].prev.is_some());
                self.edges[edge].prev = Some(twin);
            }
            let prev = self.edges[edge].prev.unwrap();
            self.edges[prev].next = Some(edge);
        }
    }

    /// Half-edges of the cell reached by walking `next` from `start` until
    /// the walk returns.
    pub fn cell_edges(&self, start: usize) -> Vec<usize> {
        let mut cell = vec![start];
        let mut edge = self.edges[start].next.expect("postprocessed edge");
        while edge != start {
            cell.push(edge);
            edge = self.edges[edge].next.expect("postprocessed edge");
        }
        cell
    }
}

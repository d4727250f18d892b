use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::aabb::Aabb;
use crate::geometry::{distance, Point};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

enum BvhData {
    /// A stored point with its caller-supplied id.
    Leaf { point: Point, item: usize },
    Internal { left: usize, right: usize },
}

struct BvhEntry {
    parent: Option<usize>,
    data: BvhData,
    aabb: Aabb,
    count: usize,
    height: usize,
}

impl BvhEntry {
    fn leaf(point: Point, item: usize) -> Self {
        Self {
            parent: None,
            data: BvhData::Leaf { point, item },
            aabb: Aabb::from_point(&point),
            count: 1,
            height: 0,
        }
    }
}

/// Online bounding-volume hierarchy over 2-D points.
///
/// Siblings for new leaves are chosen with a best-first surface-area search.
/// The balanced variant additionally tries four child swaps on the way back
/// to the root after each insertion.
pub struct Bvh {
    root: Option<usize>,
    nodes: Vec<BvhEntry>,
    balanced: bool,
}

impl Bvh {
    pub fn new() -> Self {
        Self {
            root: None,
            nodes: vec![],
            balanced: false,
        }
    }

    pub fn balanced() -> Self {
        Self {
            balanced: true,
            ..Self::new()
        }
    }

    /// Corners of the box around every stored point.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        self.root
            .map(|root| (self.nodes[root].aabb.pmin(), self.nodes[root].aabb.pmax()))
    }

    fn children(&self, node: usize) -> (usize, usize) {
        match self.nodes[node].data {
            BvhData::Internal { left, right } => (left, right),
            BvhData::Leaf { .. } => panic!("not an internal node"),
        }
    }

    fn child(&self, node: usize, side: Side) -> usize {
        let (left, right) = self.children(node);
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    fn set_child(&mut self, node: usize, side: Side, child: usize) {
        if let BvhData::Internal { left, right } = &mut self.nodes[node].data {
            match side {
                Side::Left => *left = child,
                Side::Right => *right = child,
            }
        } else {
            panic!("not an internal node");
        }
        self.nodes[child].parent = Some(node);
    }

    fn imbalance(&self, node: usize) -> i64 {
        match self.nodes[node].data {
            BvhData::Leaf { .. } => 0,
            BvhData::Internal { left, right } => {
                self.nodes[left].height as i64 - self.nodes[right].height as i64
            }
        }
    }

    /// Recompute box, count, and height of an internal from its children.
    fn refresh(&mut self, node: usize) {
        let (left, right) = self.children(node);
        let mut aabb = Aabb::empty();
        aabb.set_union(&self.nodes[left].aabb, &self.nodes[right].aabb);
        self.nodes[node].aabb = aabb;
        self.nodes[node].count = 1 + self.nodes[left].count + self.nodes[right].count;
        self.nodes[node].height = 1 + self.nodes[left].height.max(self.nodes[right].height);
    }

    pub fn insert(&mut self, point: Point, item: usize) -> usize {
        let Some(root) = self.root else {
            let leaf = self.nodes.len();
            self.nodes.push(BvhEntry::leaf(point, item));
            self.root = Some(leaf);
            return leaf;
        };

        let sibling = self.find_sibling(root, &point);
        let leaf = self.attach(sibling, point, item);
        self.update_ancestors(leaf);
        if self.balanced {
            self.rebalance(leaf);
        }
        leaf
    }

    /// Best-first search for the sibling that minimizes the insertion cost.
    /// The priority queue is keyed by inherited cost; at equal node cost the
    /// node encountered first wins.
    fn find_sibling(&self, root: usize, point: &Point) -> usize {
        let mut queue = BinaryHeap::new();
        queue.push(Reverse((OrderedFloat(0.0), root)));

        let mut best_cost = f64::INFINITY;
        let mut best_node = root;

        while let Some(Reverse((inherited, node))) = queue.pop() {
            let inherited = inherited.into_inner();
            let sa = self.nodes[node].aabb.surface_area();
            let delta_sa = self.nodes[node].aabb.proposed_surface_area(point) - sa;

            let node_cost = sa + inherited;
            if node_cost < best_cost {
                best_cost = node_cost;
                best_node = node;
            }

            // lower bound for anything below this node
            let low_cost = inherited + delta_sa;
            if low_cost < best_cost {
                if let BvhData::Internal { left, right } = self.nodes[node].data {
                    queue.push(Reverse((OrderedFloat(low_cost), left)));
                    queue.push(Reverse((OrderedFloat(low_cost), right)));
                }
            }
        }

        best_node
    }

    /// Install a new internal above `sibling` with the new leaf as its other
    /// child.
    fn attach(&mut self, sibling: usize, point: Point, item: usize) -> usize {
        let leaf = self.nodes.len();
        self.nodes.push(BvhEntry::leaf(point, item));

        let internal = self.nodes.len();
        self.nodes.push(BvhEntry {
            parent: self.nodes[sibling].parent,
            data: BvhData::Internal {
                left: sibling,
                right: leaf,
            },
            aabb: Aabb::empty(),
            count: 0,
            height: 0,
        });

        match self.nodes[internal].parent {
            None => self.root = Some(internal),
            Some(parent) => {
                if self.child(parent, Side::Left) == sibling {
                    self.set_child(parent, Side::Left, internal);
                } else {
                    self.set_child(parent, Side::Right, internal);
                }
            }
        }

        self.nodes[sibling].parent = Some(internal);
        self.nodes[leaf].parent = Some(internal);
        self.refresh(internal);

        leaf
    }

    fn update_ancestors(&mut self, leaf: usize) {
        let mut node = self.nodes[leaf].parent.expect("new leaf has a parent");
        while let Some(parent) = self.nodes[node].parent {
            self.refresh(parent);
            node = parent;
        }
    }

    /// Weighted surface-area cost of an internal, scaled by its imbalance.
    fn rotation_cost(&self, node: usize) -> f64 {
        let (left, right) = self.children(node);
        let total = self.nodes[node].count as f64;
        let mut cost = (self.nodes[left].count as f64 / total) * self.nodes[left].aabb.surface_area();
        cost += (self.nodes[right].count as f64 / total) * self.nodes[right].aabb.surface_area();
        cost * 1.0_f64.max(self.imbalance(node).unsigned_abs() as f64)
    }

    fn is_internal(&self, node: usize) -> bool {
        matches!(self.nodes[node].data, BvhData::Internal { .. })
    }

    /// Exchange a child of `node` with a grandchild under `inner`, refitting
    /// `inner`. Calling it twice with the same arguments restores the tree.
    fn swap(&mut self, node: usize, node_slot: Side, inner: usize, inner_slot: Side) {
        let a = self.child(node, node_slot);
        let b = self.child(inner, inner_slot);
        self.set_child(node, node_slot, b);
        self.set_child(inner, inner_slot, a);
        self.refresh(inner);
    }

    fn rebalance(&mut self, leaf: usize) {
        let Some(mut node) = self.nodes[leaf].parent else {
            return;
        };

        loop {
            // a node already out of AVL range must take whichever swap helps
            let base_cost = if self.imbalance(node).unsigned_abs() >= 2 {
                f64::INFINITY
            } else {
                self.rotation_cost(node)
            };

            let (left, right) = self.children(node);
            let mut candidates: Vec<(f64, Side, usize, Side)> = vec![];

            if self.is_internal(left) {
                for slot in [Side::Left, Side::Right] {
                    self.swap(node, Side::Right, left, slot);
                    candidates.push((self.rotation_cost(node), Side::Right, left, slot));
                    self.swap(node, Side::Right, left, slot);
                }
            }
            if self.is_internal(right) {
                for slot in [Side::Left, Side::Right] {
                    self.swap(node, Side::Left, right, slot);
                    candidates.push((self.rotation_cost(node), Side::Left, right, slot));
                    self.swap(node, Side::Left, right, slot);
                }
            }

            let mut best: Option<(f64, Side, usize, Side)> = None;
            for candidate in candidates {
                if best.map_or(true, |b| candidate.0 < b.0) {
                    best = Some(candidate);
                }
            }
            if let Some((cost, node_slot, inner, inner_slot)) = best {
                if cost < base_cost {
                    self.swap(node, node_slot, inner, inner_slot);
                }
            }
            self.refresh(node);

            match self.nodes[node].parent {
                None => break,
                Some(parent) => node = parent,
            }
        }
    }

    /// First stored point within Euclidean distance `radius` of `point`.
    pub fn query(&self, point: &Point, radius: f64) -> Option<usize> {
        let root = self.root?;

        let query_box = if radius == 0.0 {
            Aabb::from_point(point)
        } else {
            Aabb::from_points(&[
                Point::new(point.x - radius, point.y - radius),
                Point::new(point.x + radius, point.y + radius),
            ])
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match self.nodes[node].data {
                BvhData::Leaf { point: stored, item } => {
                    if distance(point, &stored) <= radius {
                        return Some(item);
                    }
                }
                BvhData::Internal { left, right } => {
                    if query_box.intersect(&self.nodes[node].aabb) {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }

        None
    }

    /// Degenerate containment check: does the tree hold this exact item?
    pub fn contains_item(&self, point: &Point, item: usize) -> bool {
        let Some(root) = self.root else {
            return false;
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match self.nodes[node].data {
                BvhData::Leaf { item: stored, .. } => {
                    if stored == item {
                        return true;
                    }
                }
                BvhData::Internal { left, right } => {
                    if self.nodes[node].aabb.contains(point) {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn build(points: &[Point]) -> Bvh {
        let mut tree = Bvh::new();
        for (i, point) in points.iter().enumerate() {
            tree.insert(*point, i);
        }
        tree
    }

    fn assert_counts(tree: &Bvh) {
        for node in 0..tree.nodes.len() {
            if tree.is_internal(node) {
                let (left, right) = tree.children(node);
                assert_eq!(
                    tree.nodes[node].count,
                    1 + tree.nodes[left].count + tree.nodes[right].count
                );
            }
        }
    }

    fn assert_query_finds(tree: &Bvh, points: &[Point]) {
        for point in points {
            let item = tree.query(point, 1e-13).expect("stored point not found");
            assert_eq!(tree.nodes_point(item), *point);
        }
    }

    impl Bvh {
        fn nodes_point(&self, item: usize) -> Point {
            self.nodes
                .iter()
                .find_map(|n| match n.data {
                    BvhData::Leaf { point, item: stored } if stored == item => Some(point),
                    _ => None,
                })
                .unwrap()
        }
    }

    #[test]
    fn count_invariant() {
        for points in [
            vec![Point::from_xy(1.0, 2.0); 10],
            vec![Point::from_xy(1.0, 2.0), Point::from_xy(3.0, 4.0)],
        ] {
            assert_counts(&build(&points));
        }
    }

    #[test]
    fn query_finds_stored_points() {
        let points = vec![Point::from_xy(1.0, 2.0), Point::from_xy(3.0, 4.0)];
        assert_query_finds(&build(&points), &points);
    }

    #[test]
    fn query_misses_omitted_points() {
        let tree = build(&[Point::from_xy(1.0, 2.0), Point::from_xy(3.0, 4.0)]);
        assert!(tree.query(&Point::from_xy(-100.0, -10.0), 1e-13).is_none());
        assert!(tree.query(&Point::from_xy(10.0, 10.0), 1e-13).is_none());
    }

    #[test]
    fn query_radius_reaches_neighbors() {
        let tree = build(&[Point::from_xy(0.0, 0.0)]);
        assert!(tree.query(&Point::from_xy(0.3, 0.4), 0.5).is_some());
        assert!(tree.query(&Point::from_xy(0.3, 0.4), 0.49).is_none());
    }

    #[test]
    fn contains_item_is_identity_based() {
        let points = vec![Point::from_xy(1.0, 2.0), Point::from_xy(1.0, 2.0)];
        let tree = build(&points);
        assert!(tree.contains_item(&points[0], 0));
        assert!(tree.contains_item(&points[1], 1));
        assert!(!tree.contains_item(&points[0], 7));
    }

    // identical points stress the rebalancer the hardest since every
    // sibling candidate costs the same
    #[test]
    fn balanced_tree_height_with_identical_points() {
        for size in [10, 20, 100] {
            let mut tree = Bvh::balanced();
            for i in 0..size {
                tree.insert(Point::from_xy(1.0, 2.0), i);
            }
            assert_counts(&tree);
            for node in 0..tree.nodes.len() {
                if tree.is_internal(node) {
                    assert!(tree.imbalance(node).unsigned_abs() <= 2);
                }
            }
        }
    }

    #[test]
    fn random_points_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for size in [10, 20, 100] {
            let points: Vec<Point> = (0..size)
                .map(|_| Point::from_xy(rng.gen_range(0..=size) as f64, rng.gen_range(0..=size) as f64))
                .collect();
            let tree = build(&points);
            assert_counts(&tree);
            assert_query_finds(&tree, &points);
        }
    }
}

use crate::avl::AvlTree;
use crate::geometry::{close, parabola_intersection, Point};

/// Parabolic arc of the beachline. `circle` is the index of the pending
/// circle event predicting this arc's disappearance, if any.
pub struct Arc {
    pub focus: Point,
    pub circle: Option<usize>,
}

/// Breakpoint between two adjacent arcs. The foci are ordered: the arc of
/// `pair[0]` lies to the left of the arc of `pair[1]` at this breakpoint.
pub struct Breakpoint {
    pub pair: [Point; 2],
    pub edge: usize,
}

/// Endpoint pair of one Voronoi edge, shared by handle between the two
/// sibling internals a site event creates. Endpoints are DCEL point ids.
pub struct EdgeEndpoints {
    ends: [Option<usize>; 2],
}

impl EdgeEndpoints {
    fn new() -> Self {
        Self { ends: [None, None] }
    }

    pub fn is_closed(&self) -> bool {
        self.ends[0].is_some() && self.ends[1].is_some()
    }

    pub fn add(&mut self, point: usize) {
        assert!(!self.is_closed());
        if self.ends[0].is_none() {
            self.ends[0] = Some(point);
        } else {
            self.ends[1] = Some(point);
        }
    }

    pub fn first(&self) -> Option<usize> {
        self.ends[0]
    }

    pub fn ends(&self) -> Option<(usize, usize)> {
        Some((self.ends[0]?, self.ends[1]?))
    }
}

/// Outcome of a site insertion.
pub struct Insertion {
    pub leaf: usize,
    /// Circle event of the consumed arc, now stale.
    pub invalidated: Option<usize>,
}

/// Outcome of an arc removal: the edge records of the new internal and of
/// the two internals the removal retired. All three take the new Voronoi
/// vertex as an endpoint.
pub struct Removal {
    pub merged_edge: usize,
    pub left_edge: usize,
    pub right_edge: usize,
}

/// The beachline: an AVL tree whose leaves are arcs and whose internals are
/// breakpoints, ordered by breakpoint abscissa under the current sweepline.
pub struct Beachline {
    pub tree: AvlTree<Arc, Breakpoint>,
    edges: Vec<EdgeEndpoints>,
    colinear_prefix: bool,
    /// Right-hand twins of internals created while every site seen so far
    /// shared one y. Their edges still need bounding at postprocess time.
    colinear_nodes: Vec<Breakpoint>,
}

impl Beachline {
    pub fn new() -> Self {
        Self {
            tree: AvlTree::new(),
            edges: vec![],
            colinear_prefix: true,
            colinear_nodes: vec![],
        }
    }

    pub fn focus(&self, leaf: usize) -> Point {
        self.tree.leaf_value(leaf).focus
    }

    pub fn circle(&self, leaf: usize) -> Option<usize> {
        self.tree.leaf_value(leaf).circle
    }

    pub fn set_circle(&mut self, leaf: usize, circle: Option<usize>) {
        self.tree.leaf_value_mut(leaf).circle = circle;
    }

    pub fn predecessor_arc(&self, leaf: usize) -> Option<usize> {
        self.tree.predecessor(leaf)
    }

    pub fn successor_arc(&self, leaf: usize) -> Option<usize> {
        self.tree.successor(leaf)
    }

    pub fn endpoints(&self, edge: usize) -> &EdgeEndpoints {
        &self.edges[edge]
    }

    pub fn endpoints_mut(&mut self, edge: usize) -> &mut EdgeEndpoints {
        &mut self.edges[edge]
    }

    fn new_edge(&mut self) -> usize {
        self.edges.push(EdgeEndpoints::new());
        self.edges.len() - 1
    }

    /// Breakpoint abscissa and ordinate of an internal at the given
    /// sweepline position.
    pub fn breakpoint_at(&self, node: usize, directrix: f64) -> (f64, f64) {
        let pair = &self.tree.internal_value(node).pair;
        parabola_intersection(&pair[0], &pair[1], directrix)
    }

    /// Foci pair and edge handle of every breakpoint still in the tree.
    pub fn breakpoints(&self) -> Vec<(Point, Point, usize)> {
        self.tree
            .internals()
            .into_iter()
            .map(|node| {
                let breakpoint = self.tree.internal_value(node);
                (breakpoint.pair[0], breakpoint.pair[1], breakpoint.edge)
            })
            .collect()
    }

    /// Foci pair and edge handle of every collinear-prefix twin.
    pub fn colinear_breakpoints(&self) -> Vec<(Point, Point, usize)> {
        self.colinear_nodes
            .iter()
            .map(|breakpoint| (breakpoint.pair[0], breakpoint.pair[1], breakpoint.edge))
            .collect()
    }

    pub fn insert(&mut self, site: Point) -> Insertion {
        let Some(root) = self.tree.root() else {
            let leaf = self.tree.push_leaf(Arc {
                focus: site,
                circle: None,
            });
            self.tree.set_root(leaf);
            return Insertion {
                leaf,
                invalidated: None,
            };
        };

        let sibling = self.sibling(root, &site);
        let insertion = self.insert_beside(site, sibling);
        self.tree.rebalance(insertion.leaf);
        insertion
    }

    /// Locate the leaf the new site splits (or, while the collinear prefix
    /// lasts, the rightmost leaf on the shared line).
    fn sibling(&mut self, root: usize, site: &Point) -> usize {
        if self.colinear_prefix {
            let mut node = root;
            loop {
                if self.tree.is_leaf(node) {
                    let focus = self.tree.leaf_value(node).focus;
                    if close(site.y.into_inner(), focus.y.into_inner()) && site.x > focus.x {
                        return node;
                    }
                } else {
                    let right_focus = self.tree.internal_value(node).pair[1];
                    if close(site.y.into_inner(), right_focus.y.into_inner())
                        && site.x > right_focus.x
                    {
                        node = self.tree.right(node);
                        continue;
                    }
                }
                self.colinear_prefix = false;
                break;
            }
        }

        let directrix = site.y.into_inner();
        let mut node = root;
        while !self.tree.is_leaf(node) {
            let (x, _) = self.breakpoint_at(node, directrix);
            // a site right under a breakpoint falls to the left arc
            if close(site.x.into_inner(), x) || site.x.into_inner() < x {
                node = self.tree.left(node);
            } else {
                node = self.tree.right(node);
            }
        }
        node
    }

    fn insert_beside(&mut self, site: Point, sibling: usize) -> Insertion {
        let sibling_arc = self.tree.leaf_value(sibling);
        let pj = sibling_arc.focus;
        let invalidated = sibling_arc.circle;
        let pi = site;

        if self.colinear_prefix && pj.y == pi.y {
            debug_assert!(pj.x < pi.x);
            debug_assert!(!close(pj.x.into_inner(), pi.x.into_inner()));
            let edge = self.new_edge();
            let internal = self.tree.push_internal(Breakpoint {
                pair: [pj, pi],
                edge,
            });
            self.colinear_nodes.push(Breakpoint {
                pair: [pi, pj],
                edge,
            });

            self.tree.replace_in_parent(sibling, internal);
            let left = self.tree.push_leaf(Arc {
                focus: pj,
                circle: None,
            });
            let leaf = self.tree.push_leaf(Arc {
                focus: pi,
                circle: None,
            });
            self.tree.set_left(internal, left);
            self.tree.set_right(internal, leaf);
            return Insertion {
                leaf,
                invalidated: None,
            };
        }

        // five-node replacement: the split arc appears on both sides of the
        // new one, and both internals share a single edge record
        let edge = self.new_edge();
        let internal_left = self.tree.push_internal(Breakpoint {
            pair: [pj, pi],
            edge,
        });
        let internal_right = self.tree.push_internal(Breakpoint {
            pair: [pi, pj],
            edge,
        });

        self.tree.replace_in_parent(sibling, internal_right);

        let node_left = self.tree.push_leaf(Arc {
            focus: pj,
            circle: None,
        });
        let node_center = self.tree.push_leaf(Arc {
            focus: pi,
            circle: None,
        });
        let node_right = self.tree.push_leaf(Arc {
            focus: pj,
            circle: None,
        });

        self.tree.set_left(internal_right, internal_left);
        self.tree.set_right(internal_right, node_right);
        self.tree.set_left(internal_left, node_left);
        self.tree.set_right(internal_left, node_center);

        Insertion {
            leaf: node_center,
            invalidated,
        }
    }

    /// Remove the arc at `leaf` after its circle event fired. Splices out the
    /// leaf and one bracketing internal, replaces the surviving internal with
    /// a fresh breakpoint joining the outer neighbors, and rebalances.
    pub fn delete(&mut self, leaf: usize) -> Removal {
        assert_ne!(Some(leaf), self.tree.root());
        let focus = self.focus(leaf);
        let parent = self.tree.parent(leaf).expect("interior arc has a parent");

        if self.tree.left(parent) == leaf {
            let replacement = self.tree.successor(leaf).expect("interior arc has a successor");
            let internal_right = parent;
            let right = self.tree.right(parent);
            assert_ne!(Some(internal_right), self.tree.root());

            self.tree.replace_in_parent(internal_right, right);

            // lowest ancestor holding the removed focus as its right focus
            let mut current = right;
            while self.tree.left(self.tree.parent(current).expect("splice stays interior"))
                == current
            {
                current = self.tree.parent(current).unwrap();
            }
            let internal_left = self.tree.parent(current).unwrap();
            debug_assert_eq!(self.tree.internal_value(internal_left).pair[1], focus);

            let edge = self.new_edge();
            let pair = [
                self.tree.internal_value(internal_left).pair[0],
                self.focus(replacement),
            ];
            let internal_new = self.tree.push_internal(Breakpoint { pair, edge });

            self.tree
                .set_left(internal_new, self.tree.left(internal_left));
            self.tree
                .set_right(internal_new, self.tree.right(internal_left));
            self.tree.update_height(internal_new);
            self.tree.replace_in_parent(internal_left, internal_new);

            let left_edge = self.tree.internal_value(internal_left).edge;
            let right_edge = self.tree.internal_value(internal_right).edge;
            self.tree.rebalance(replacement);

            Removal {
                merged_edge: edge,
                left_edge,
                right_edge,
            }
        } else {
            let replacement = self
                .tree
                .predecessor(leaf)
                .expect("interior arc has a predecessor");
            let internal_left = parent;
            let left = self.tree.left(parent);
            assert_ne!(Some(internal_left), self.tree.root());

            self.tree.replace_in_parent(internal_left, left);

            // lowest ancestor holding the removed focus as its left focus
            let mut current = left;
            while self.tree.right(self.tree.parent(current).expect("splice stays interior"))
                == current
            {
                current = self.tree.parent(current).unwrap();
            }
            let internal_right = self.tree.parent(current).unwrap();
            debug_assert_eq!(self.tree.internal_value(internal_right).pair[0], focus);

            let edge = self.new_edge();
            let pair = [
                self.focus(replacement),
                self.tree.internal_value(internal_right).pair[1],
            ];
            let internal_new = self.tree.push_internal(Breakpoint { pair, edge });

            self.tree
                .set_left(internal_new, self.tree.left(internal_right));
            self.tree
                .set_right(internal_new, self.tree.right(internal_right));
            self.tree.update_height(internal_new);
            self.tree.replace_in_parent(internal_right, internal_new);

            let left_edge = self.tree.internal_value(internal_left).edge;
            let right_edge = self.tree.internal_value(internal_right).edge;
            self.tree.rebalance(replacement);

            Removal {
                merged_edge: edge,
                left_edge,
                right_edge,
            }
        }
    }
}

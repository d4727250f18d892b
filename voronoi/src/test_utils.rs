use std::f64::consts::PI;

use approx::relative_eq;

use crate::dcel::Dcel;
use crate::geometry::{distance, Point};
use crate::VoronoiDiagram;

pub fn sites_on_circle(n: usize, radius: f64, xc: f64, yc: f64) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            Point::from_xy(xc + radius * theta.cos(), yc + radius * theta.sin())
        })
        .collect()
}

/// Check the half-edge invariants of a postprocessed DCEL.
pub fn assert_dcel_consistent(dcel: &Dcel) {
    for edge in 0..dcel.edges().len() {
        let twin = dcel.edge(edge).twin.expect("twin set");
        assert_eq!(dcel.edge(twin).twin, Some(edge));
        assert_eq!(dcel.edge(twin).src, dcel.edge(edge).dest);
        assert_eq!(dcel.edge(twin).dest, dcel.edge(edge).src);

        let next = dcel.edge(edge).next.expect("next set");
        assert_eq!(dcel.edge(next).src, dcel.edge(edge).dest);

        let prev = dcel.edge(edge).prev.expect("prev set");
        assert_eq!(dcel.edge(prev).dest, dcel.edge(edge).src);
    }
}

/// Every Voronoi vertex must be equidistant from at least three sites, and
/// no site may be closer than those three.
pub fn assert_vertices_equidistant(vd: &VoronoiDiagram) {
    for &vertex in vd.dcel().vertices() {
        let position = vd.dcel().position(vertex);
        let distances: Vec<f64> = vd
            .sites
            .iter()
            .map(|site| distance(&position, site))
            .collect();
        let nearest = distances.iter().cloned().fold(f64::INFINITY, f64::min);
        let tied = distances
            .iter()
            .filter(|&&d| relative_eq!(d, nearest, max_relative = 1e-6))
            .count();
        assert!(
            tied >= 3,
            "vertex {:?} is nearest to only {} site(s)",
            position,
            tied
        );
    }
}

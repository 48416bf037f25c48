//! Concave hull construction by Delaunay edge erosion (chi-shape).
//!
//! The point set is triangulated, then boundary triangles are peeled off
//! longest-edge-first while the exposed edge is longer than the threshold.
//! A triangle is only removed when its inner vertex is not already on the
//! boundary, which keeps the outline a single simple ring and keeps every
//! input point inside or on it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use delaunator::{EMPTY, next_halfedge, prev_halfedge, triangulate};
use geo::{Coord, Distance, Haversine, LineString, Point, Polygon};

/// Vertices closer than this (in degrees, about 1 cm) are treated as the
/// same vertex before triangulating.
const VERTEX_SNAP_DEGREES: f64 = 1e-7;

/// Boundary half-edge waiting in the erosion queue.
#[derive(Debug, Clone, Copy)]
struct BoundaryEdge {
    halfedge: usize,
    length_m: f64,
}

impl PartialEq for BoundaryEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BoundaryEdge {}

impl PartialOrd for BoundaryEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BoundaryEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.length_m
            .total_cmp(&other.length_m)
            .then_with(|| self.halfedge.cmp(&other.halfedge))
    }
}

/// Computes the chi-shape of `points` with boundary edges eroded down to
/// `max_edge_m` metres.
///
/// Returns `None` for fewer than three distinct points, collinear input,
/// or a boundary that fails to close into one ring.
#[must_use]
pub fn concave_hull(points: &[Point<f64>], max_edge_m: f64) -> Option<Polygon<f64>> {
    let vertices = distinct_vertices(points);
    if vertices.len() < 3 {
        return None;
    }

    let triangulation = triangulate(
        &vertices
            .iter()
            .map(|p| delaunator::Point { x: p.x(), y: p.y() })
            .collect::<Vec<_>>(),
    );
    if triangulation.triangles.is_empty() {
        return None;
    }

    let triangles = &triangulation.triangles;
    let halfedges = &triangulation.halfedges;
    let edge_length = |halfedge: usize| {
        Haversine.distance(
            vertices[triangles[halfedge]],
            vertices[triangles[next_halfedge(halfedge)]],
        )
    };

    let mut boundary: HashSet<usize> = HashSet::new();
    let mut boundary_degree = vec![0_usize; vertices.len()];
    let mut queue = BinaryHeap::new();

    let expose = |halfedge: usize,
                      boundary: &mut HashSet<usize>,
                      boundary_degree: &mut Vec<usize>,
                      queue: &mut BinaryHeap<BoundaryEdge>| {
        boundary.insert(halfedge);
        boundary_degree[triangles[halfedge]] += 1;
        boundary_degree[triangles[next_halfedge(halfedge)]] += 1;
        queue.push(BoundaryEdge {
            halfedge,
            length_m: edge_length(halfedge),
        });
    };

    for (halfedge, &twin) in halfedges.iter().enumerate() {
        if twin == EMPTY {
            expose(halfedge, &mut boundary, &mut boundary_degree, &mut queue);
        }
    }

    while let Some(edge) = queue.pop() {
        if edge.length_m <= max_edge_m {
            break;
        }
        if !boundary.contains(&edge.halfedge) {
            continue;
        }

        let inner_vertex = triangles[prev_halfedge(edge.halfedge)];
        if boundary_degree[inner_vertex] > 0 {
            continue;
        }

        boundary.remove(&edge.halfedge);
        boundary_degree[triangles[edge.halfedge]] -= 1;
        boundary_degree[triangles[next_halfedge(edge.halfedge)]] -= 1;

        for side in [next_halfedge(edge.halfedge), prev_halfedge(edge.halfedge)] {
            let twin = halfedges[side];
            if twin != EMPTY {
                expose(twin, &mut boundary, &mut boundary_degree, &mut queue);
            }
        }
    }

    let ring = trace_ring(&boundary, triangles, &vertices)?;
    Some(Polygon::new(LineString::new(ring), vec![]))
}

/// Follows boundary half-edges from vertex to vertex into a closed ring.
fn trace_ring(
    boundary: &HashSet<usize>,
    triangles: &[usize],
    vertices: &[Point<f64>],
) -> Option<Vec<Coord<f64>>> {
    let mut successor: BTreeMap<usize, usize> = BTreeMap::new();
    for &halfedge in boundary {
        let from = triangles[halfedge];
        let to = triangles[next_halfedge(halfedge)];
        if successor.insert(from, to).is_some() {
            log::debug!("Hull boundary pinches at vertex {from}");
            return None;
        }
    }

    let (&start, _) = successor.iter().next()?;
    let mut ring = Vec::with_capacity(successor.len() + 1);
    let mut current = start;

    loop {
        ring.push(vertices[current].0);
        current = *successor.get(&current)?;
        if current == start {
            break;
        }
        if ring.len() > successor.len() {
            return None;
        }
    }

    if ring.len() != successor.len() {
        log::debug!(
            "Hull boundary splits into several rings ({} of {} edges traced)",
            ring.len(),
            successor.len()
        );
        return None;
    }

    ring.push(ring[0]);
    Some(ring)
}

/// Sorts and snaps `points`, dropping copies of the same vertex.
fn distinct_vertices(points: &[Point<f64>]) -> Vec<Point<f64>> {
    let mut vertices: Vec<Point<f64>> = points
        .iter()
        .copied()
        .filter(|p| p.x().is_finite() && p.y().is_finite())
        .collect();
    vertices.sort_by(|a, b| a.x().total_cmp(&b.x()).then_with(|| a.y().total_cmp(&b.y())));
    vertices.dedup_by(|a, b| {
        (a.x() - b.x()).abs() < VERTEX_SNAP_DEGREES && (a.y() - b.y()).abs() < VERTEX_SNAP_DEGREES
    });
    vertices
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial operations used to derive feeder service areas.
//!
//! Line endpoints of a feeder are grouped with a distance-linkage
//! clusterer ([`cluster`]) and then wrapped in a concave hull ([`hull`]).
//! Both operations work on WGS84 longitude/latitude points and measure
//! distances on the sphere, never in raw degrees.
//!
//! The pipeline talks to these algorithms through the [`SpatialOps`]
//! trait so the implementation can be swapped without touching feature
//! generation.

pub mod cluster;
pub mod hull;

pub use cluster::Clusters;
pub use geo::{Point, Polygon};

/// The two spatial primitives the feature pipeline depends on.
pub trait SpatialOps: Send + Sync {
    /// Partitions `points` into clusters where each member is reachable
    /// from another through a chain of hops no longer than
    /// `max_distance_m` metres.
    fn cluster(&self, points: &[Point<f64>], max_distance_m: f64) -> Clusters;

    /// Computes a concave hull whose boundary edges are eroded down to
    /// `max_edge_m` metres where topology allows.
    ///
    /// Returns `None` when the point set is too small or degenerate to
    /// enclose an area.
    fn hull(&self, points: &[Point<f64>], max_edge_m: f64) -> Option<Polygon<f64>>;
}

/// [`SpatialOps`] backed by an R-tree neighbour search and a Delaunay
/// chi-shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoSpatialOps;

impl SpatialOps for GeoSpatialOps {
    fn cluster(&self, points: &[Point<f64>], max_distance_m: f64) -> Clusters {
        cluster::cluster_points(points, max_distance_m)
    }

    fn hull(&self, points: &[Point<f64>], max_edge_m: f64) -> Option<Polygon<f64>> {
        hull::concave_hull(points, max_edge_m)
    }
}

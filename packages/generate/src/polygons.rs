//! Per-feeder service-area polygons.
//!
//! Each feeder's line endpoints are clustered, then wrapped in a concave
//! hull. Feeders are processed in parallel; output stays in feeder id
//! order.

use std::collections::BTreeMap;

use feeder_map_feature_models::MapFeature;
use feeder_map_network_models::{FeederId, GeographicPoint};
use feeder_map_spatial::{Point, SpatialOps};
use geo_types::Geometry;
use rayon::prelude::*;

use crate::properties::feature_properties;

/// Clustering and hull thresholds.
#[derive(Debug, Clone, Copy)]
pub struct HullParams {
    /// Maximum hop between clustered points, in metres.
    pub cluster_max_distance_m: f64,
    /// Longest hull edge left uneroded, in metres.
    pub max_edge_m: f64,
}

/// Builds at most one polygon per feeder.
///
/// Feeders whose points cannot enclose an area contribute nothing.
#[must_use]
pub fn build_polygon_features(
    point_clouds: &BTreeMap<FeederId, Vec<GeographicPoint>>,
    ops: &dyn SpatialOps,
    params: HullParams,
) -> Vec<MapFeature> {
    let clouds: Vec<(FeederId, &Vec<GeographicPoint>)> =
        point_clouds.iter().map(|(id, points)| (*id, points)).collect();

    let features: Vec<MapFeature> = clouds
        .par_iter()
        .filter_map(|(feeder_id, cloud)| feeder_polygon(*feeder_id, cloud, ops, params))
        .collect();

    log::info!(
        "Built {} service-area polygons for {} feeders",
        features.len(),
        clouds.len()
    );

    features
}

/// Hulls every endpoint of one feeder, regrouped by cluster. The grouping
/// does not change the triangulation; near-duplicate vertices are merged by
/// the hull itself.
fn feeder_polygon(
    feeder_id: FeederId,
    cloud: &[GeographicPoint],
    ops: &dyn SpatialOps,
    params: HullParams,
) -> Option<MapFeature> {
    let points: Vec<Point<f64>> = cloud
        .iter()
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect();

    let clusters = ops.cluster(&points, params.cluster_max_distance_m);
    log::debug!(
        "Feeder {feeder_id}: {} endpoints in {} clusters",
        points.len(),
        clusters.count()
    );

    let clustered: Vec<Point<f64>> = clusters.partition(&points).into_iter().flatten().collect();

    let Some(hull) = ops.hull(&clustered, params.max_edge_m) else {
        log::debug!("Feeder {feeder_id}: points do not enclose an area, no polygon");
        return None;
    };

    Some(MapFeature::new(
        Geometry::Polygon(hull),
        feature_properties(None, feeder_id, format!("polygon-{feeder_id}")),
    ))
}

#[cfg(test)]
mod tests {
    use feeder_map_spatial::{Clusters, GeoSpatialOps, Polygon};

    use super::*;

    const PARAMS: HullParams = HullParams {
        cluster_max_distance_m: 100.0,
        max_edge_m: 1_000.0,
    };

    fn square(lon: f64, lat: f64, size: f64) -> Vec<GeographicPoint> {
        vec![
            GeographicPoint::new(lon, lat),
            GeographicPoint::new(lon + size, lat),
            GeographicPoint::new(lon + size, lat + size),
            GeographicPoint::new(lon, lat + size),
            GeographicPoint::new(lon + size / 2.0, lat + size / 2.0),
        ]
    }

    #[test]
    fn one_polygon_per_enclosing_feeder() {
        let mut clouds = BTreeMap::new();
        clouds.insert(9, square(-72.0, -36.0, 0.002));
        clouds.insert(2, square(-72.5, -36.5, 0.002));
        clouds.insert(
            4,
            vec![
                GeographicPoint::new(-73.0, -37.0),
                GeographicPoint::new(-73.001, -37.001),
            ],
        );

        let features = build_polygon_features(&clouds, &GeoSpatialOps, PARAMS);

        let feeders: Vec<_> = features.iter().filter_map(MapFeature::feeder_id).collect();
        assert_eq!(feeders, vec![2, 9]);
        assert!(matches!(features[0].geometry, Geometry::Polygon(_)));
        assert_eq!(features[0].unique_id(), Some("polygon-2"));
        assert_eq!(features[0].properties["color"], "#9FEE6B");
    }

    #[test]
    fn collinear_feeder_yields_nothing() {
        let mut clouds = BTreeMap::new();
        clouds.insert(
            1,
            (0..5)
                .map(|i| GeographicPoint::new(-72.0 + f64::from(i) * 0.001, -36.0))
                .collect(),
        );

        assert!(build_polygon_features(&clouds, &GeoSpatialOps, PARAMS).is_empty());
    }

    struct NoHull;

    impl SpatialOps for NoHull {
        fn cluster(&self, points: &[Point<f64>], max_distance_m: f64) -> Clusters {
            GeoSpatialOps.cluster(points, max_distance_m)
        }

        fn hull(&self, _points: &[Point<f64>], _max_edge_m: f64) -> Option<Polygon<f64>> {
            None
        }
    }

    struct CountingHull(std::sync::Mutex<Vec<usize>>);

    impl SpatialOps for CountingHull {
        fn cluster(&self, points: &[Point<f64>], max_distance_m: f64) -> Clusters {
            GeoSpatialOps.cluster(points, max_distance_m)
        }

        fn hull(&self, points: &[Point<f64>], max_edge_m: f64) -> Option<Polygon<f64>> {
            self.0.lock().unwrap().push(points.len());
            GeoSpatialOps.hull(points, max_edge_m)
        }
    }

    #[test]
    fn hull_receives_every_endpoint_across_clusters() {
        let mut cloud = square(-72.0, -36.0, 0.002);
        cloud.extend(square(-72.1, -36.1, 0.002));
        let mut clouds = BTreeMap::new();
        clouds.insert(3, cloud);
        let ops = CountingHull(std::sync::Mutex::new(Vec::new()));

        build_polygon_features(&clouds, &ops, PARAMS);

        assert_eq!(*ops.0.lock().unwrap(), vec![10]);
    }

    #[test]
    fn hull_failures_are_not_errors() {
        let mut clouds = BTreeMap::new();
        clouds.insert(1, square(-72.0, -36.0, 0.002));
        assert!(build_polygon_features(&clouds, &NoHull, PARAMS).is_empty());
    }
}

//! Distance-linkage clustering of geographic points.
//!
//! Two points share a cluster iff a chain of points connects them with
//! every hop at most the threshold distance apart (DBSCAN with a minimum
//! neighbourhood of one, so there is no noise class). Neighbour candidates
//! come from an R-tree envelope query and are confirmed with the haversine
//! distance.

use geo::{Distance, Haversine, Point};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

/// Mean earth radius used by [`Haversine`], in metres.
const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Slack applied to the degree envelope so rounding never hides a true
/// neighbour.
const ENVELOPE_SLACK: f64 = 1.01;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Cluster assignment for a slice of points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clusters {
    labels: Vec<usize>,
    count: usize,
}

impl Clusters {
    /// Number of clusters found.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Cluster label of each input point, by input index.
    ///
    /// Labels are dense (`0..count`) and numbered in order of each
    /// cluster's first member.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Whether the points at indices `a` and `b` share a cluster.
    #[must_use]
    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        match (self.labels.get(a), self.labels.get(b)) {
            (Some(la), Some(lb)) => la == lb,
            _ => false,
        }
    }

    /// Splits `items` (parallel to the clustered points) by cluster label.
    #[must_use]
    pub fn partition<T: Clone>(&self, items: &[T]) -> Vec<Vec<T>> {
        let mut groups = vec![Vec::new(); self.count];
        for (item, &label) in items.iter().zip(&self.labels) {
            groups[label].push(item.clone());
        }
        groups
    }
}

/// Clusters `points` by chained haversine distance.
///
/// A pair exactly `max_distance_m` apart is linked.
#[must_use]
pub fn cluster_points(points: &[Point<f64>], max_distance_m: f64) -> Clusters {
    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x(), p.y()], i))
            .collect(),
    );

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut count = 0;

    for seed in 0..points.len() {
        if labels[seed].is_some() {
            continue;
        }

        labels[seed] = Some(count);
        let mut frontier = vec![seed];

        while let Some(current) = frontier.pop() {
            let center = points[current];
            for candidate in tree.locate_in_envelope(&search_envelope(center, max_distance_m)) {
                let neighbor = candidate.data;
                if labels[neighbor].is_some() {
                    continue;
                }
                if Haversine.distance(center, points[neighbor]) <= max_distance_m {
                    labels[neighbor] = Some(count);
                    frontier.push(neighbor);
                }
            }
        }

        count += 1;
    }

    log::trace!("Clustered {} points into {count} clusters", points.len());

    Clusters {
        labels: labels.into_iter().map(|l| l.unwrap_or_default()).collect(),
        count,
    }
}

/// Degree-space box guaranteed to contain every point within `radius_m`
/// metres of `center`.
fn search_envelope(center: Point<f64>, radius_m: f64) -> AABB<[f64; 2]> {
    let lat_delta = (radius_m / MEAN_EARTH_RADIUS_M).to_degrees() * ENVELOPE_SLACK;
    let widest_lat = (center.y().abs() + lat_delta).min(90.0);
    let cos_lat = widest_lat.to_radians().cos();
    let lon_delta = if cos_lat > 1e-6 {
        (lat_delta / cos_lat).min(180.0)
    } else {
        180.0
    };

    AABB::from_corners(
        [center.x() - lon_delta, center.y() - lat_delta],
        [center.x() + lon_delta, center.y() + lat_delta],
    )
}

#[cfg(test)]
mod tests {
    use geo::Destination;

    use super::*;

    fn origin() -> Point<f64> {
        Point::new(-72.7776, -36.1241)
    }

    fn offset(from: Point<f64>, bearing: f64, meters: f64) -> Point<f64> {
        Haversine.destination(from, bearing, meters)
    }

    #[test]
    fn empty_input_has_no_clusters() {
        let clusters = cluster_points(&[], 100.0);
        assert_eq!(clusters.count(), 0);
        assert!(clusters.labels().is_empty());
    }

    #[test]
    fn near_pairs_far_apart_form_two_clusters() {
        let a = origin();
        let b = offset(a, 90.0, 5.0);
        let c = offset(a, 0.0, 500.0);
        let d = offset(c, 90.0, 5.0);

        let clusters = cluster_points(&[a, b, c, d], 100.0);

        assert_eq!(clusters.count(), 2);
        assert!(clusters.same_cluster(0, 1));
        assert!(clusters.same_cluster(2, 3));
        assert!(!clusters.same_cluster(0, 2));
    }

    #[test]
    fn links_pairs_within_threshold_only() {
        let a = origin();
        let near = offset(a, 45.0, 99.0);
        let far = offset(a, 225.0, 101.0);

        let clusters = cluster_points(&[a, near, far], 100.0);

        assert!(clusters.same_cluster(0, 1));
        assert!(!clusters.same_cluster(0, 2));
        assert_eq!(clusters.count(), 2);
    }

    #[test]
    fn chains_reach_beyond_the_threshold() {
        let mut points = vec![origin()];
        for _ in 0..10 {
            let last = *points.last().unwrap();
            points.push(offset(last, 0.0, 80.0));
        }

        let clusters = cluster_points(&points, 100.0);

        assert_eq!(clusters.count(), 1);
        assert!(clusters.same_cluster(0, 10));
    }

    #[test]
    fn membership_does_not_depend_on_input_order() {
        let a = origin();
        let b = offset(a, 90.0, 50.0);
        let c = offset(a, 180.0, 1_000.0);
        let d = offset(c, 0.0, 60.0);

        let forward = cluster_points(&[a, b, c, d], 100.0);
        let reversed = cluster_points(&[d, c, b, a], 100.0);

        assert_eq!(forward.count(), reversed.count());
        assert_eq!(forward.same_cluster(0, 1), reversed.same_cluster(3, 2));
        assert_eq!(forward.same_cluster(2, 3), reversed.same_cluster(1, 0));
        assert_eq!(forward.same_cluster(0, 2), reversed.same_cluster(3, 1));
    }

    #[test]
    fn duplicates_share_a_cluster() {
        let a = origin();
        let clusters = cluster_points(&[a, a, a], 100.0);
        assert_eq!(clusters.count(), 1);
    }

    #[test]
    fn partitions_items_by_label() {
        let a = origin();
        let b = offset(a, 0.0, 10_000.0);
        let clusters = cluster_points(&[a, b, a], 100.0);

        let groups = clusters.partition(&["a", "b", "a2"]);

        assert_eq!(groups, vec![vec!["a", "a2"], vec!["b"]]);
    }
}

//! Partitions the raw feed into placed, reprojected artifacts.
//!
//! Classification never fails on an individual record. Records that
//! cannot be placed are logged, counted in [`SkipReport`], and dropped.

use std::collections::BTreeMap;

use feeder_map_network_models::{
    ArtifactKind, ArtifactRecord, FeederId, GeographicPoint, PlanarBounds, PlanarCoord,
};
use feeder_map_projection::CoordinateReprojector;

/// A point-like artifact with its geographic position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedArtifact {
    pub record: ArtifactRecord,
    pub position: GeographicPoint,
}

/// A conductor segment with both endpoints reprojected.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub record: ArtifactRecord,
    pub start: GeographicPoint,
    pub end: GeographicPoint,
}

/// Counts of records dropped on the way to the map, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipReport {
    /// No usable `(x, y)`.
    pub missing_coordinates: usize,
    /// Line without a usable `(x2, y2)`.
    pub missing_line_end: usize,
    /// Coordinates outside the configured planar bounds.
    pub out_of_bounds: usize,
    /// In-bounds coordinates the projection could not invert.
    pub unprojectable: usize,
    /// No description payload (dropped by the feature builders).
    pub missing_description: usize,
    /// A second feeder summary record for an id already seen.
    pub duplicate_feeders: usize,
}

impl SkipReport {
    /// Total number of skipped records.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.missing_coordinates
            + self.missing_line_end
            + self.out_of_bounds
            + self.unprojectable
            + self.missing_description
            + self.duplicate_feeders
    }
}

/// The feed split by artifact kind, with positions resolved.
///
/// Built once per run and passed by value between stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedArtifacts {
    pub transformers: Vec<PlacedArtifact>,
    pub lines: Vec<PlacedLine>,
    pub poles: Vec<PlacedArtifact>,
    pub equipment: Vec<PlacedArtifact>,
    /// Feeder summary records keyed by feeder id.
    pub feeders: BTreeMap<FeederId, ArtifactRecord>,
    /// Line endpoints grouped by owning feeder, in feed order.
    pub point_clouds: BTreeMap<FeederId, Vec<GeographicPoint>>,
    pub skipped: SkipReport,
}

impl ClassifiedArtifacts {
    /// Transformers, poles, then equipment.
    pub fn point_artifacts(&self) -> impl Iterator<Item = &PlacedArtifact> {
        self.transformers
            .iter()
            .chain(self.poles.iter())
            .chain(self.equipment.iter())
    }
}

/// Sorts feed records into [`ClassifiedArtifacts`].
#[derive(Debug)]
pub struct ArtifactClassifier {
    reprojector: CoordinateReprojector,
    bounds: PlanarBounds,
}

impl ArtifactClassifier {
    #[must_use]
    pub const fn new(reprojector: CoordinateReprojector, bounds: PlanarBounds) -> Self {
        Self {
            reprojector,
            bounds,
        }
    }

    /// Classifies `records`.
    #[must_use]
    pub fn classify(&self, records: Vec<ArtifactRecord>) -> ClassifiedArtifacts {
        let mut out = ClassifiedArtifacts::default();

        for record in records {
            if record.artifact_kind == ArtifactKind::Feeder {
                if out.feeders.contains_key(&record.id) {
                    log::warn!("Duplicate feeder record {}, keeping the first", record.id);
                    out.skipped.duplicate_feeders += 1;
                } else {
                    out.feeders.insert(record.id, record);
                }
                continue;
            }

            let Some(origin) = record.origin() else {
                log::warn!(
                    "Skipping {} {}: missing coordinates",
                    record.artifact_kind,
                    record.id
                );
                out.skipped.missing_coordinates += 1;
                continue;
            };
            let Some(start) = self.place(&record, origin, &mut out.skipped) else {
                continue;
            };

            if record.artifact_kind == ArtifactKind::Line {
                let Some(end) = record.end() else {
                    log::warn!("Skipping line {}: missing second endpoint", record.id);
                    out.skipped.missing_line_end += 1;
                    continue;
                };
                let Some(end) = self.place(&record, end, &mut out.skipped) else {
                    continue;
                };

                if record.description.is_some() {
                    out.point_clouds
                        .entry(record.feeder_id_or_default())
                        .or_default()
                        .extend([start, end]);
                }
                out.lines.push(PlacedLine { record, start, end });
                continue;
            }

            let placed = PlacedArtifact {
                record,
                position: start,
            };
            match placed.record.artifact_kind {
                ArtifactKind::Transformer => out.transformers.push(placed),
                ArtifactKind::Pole => out.poles.push(placed),
                ArtifactKind::Equipment => out.equipment.push(placed),
                ArtifactKind::Line | ArtifactKind::Feeder => {}
            }
        }

        log::info!(
            "Classified {} lines, {} transformers, {} poles, {} equipment, {} feeders ({} skipped)",
            out.lines.len(),
            out.transformers.len(),
            out.poles.len(),
            out.equipment.len(),
            out.feeders.len(),
            out.skipped.total()
        );

        out
    }

    /// Reprojects `coord` if it lies inside the network bounds.
    fn place(
        &self,
        record: &ArtifactRecord,
        coord: PlanarCoord,
        skipped: &mut SkipReport,
    ) -> Option<GeographicPoint> {
        if !self.bounds.contains(coord) {
            log::warn!(
                "Skipping {} {}: coordinate (x={}, y={}) outside network bounds",
                record.artifact_kind,
                record.id,
                coord.northing,
                coord.easting
            );
            skipped.out_of_bounds += 1;
            return None;
        }

        match self.reprojector.to_geographic(coord) {
            Ok(point) => Some(point),
            Err(e) => {
                log::warn!("Skipping {} {}: {e}", record.artifact_kind, record.id);
                skipped.unprojectable += 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use feeder_map_network_models::Description;
    use feeder_map_projection::UtmZone;
    use serde_json::json;

    use super::*;

    fn classifier() -> ArtifactClassifier {
        ArtifactClassifier::new(
            CoordinateReprojector::new(UtmZone::default()).unwrap(),
            PlanarBounds::default(),
        )
    }

    fn description(value: serde_json::Value) -> Option<Description> {
        value.as_object().cloned()
    }

    fn point(kind: ArtifactKind, id: i64, feeder: i64) -> ArtifactRecord {
        ArtifactRecord {
            artifact_kind: kind,
            id,
            x: Some(6_000_000.0),
            y: Some(700_000.0),
            x2: None,
            y2: None,
            description: description(json!({ "feederId": feeder })),
        }
    }

    fn line(id: i64, feeder: i64) -> ArtifactRecord {
        ArtifactRecord {
            artifact_kind: ArtifactKind::Line,
            id,
            x: Some(6_000_000.0),
            y: Some(700_000.0),
            x2: Some(6_000_100.0),
            y2: Some(700_100.0),
            description: description(json!({ "feederId": feeder })),
        }
    }

    fn feeder(id: i64) -> ArtifactRecord {
        ArtifactRecord {
            artifact_kind: ArtifactKind::Feeder,
            id,
            x: None,
            y: None,
            x2: None,
            y2: None,
            description: description(json!({ "name": format!("F-{id}") })),
        }
    }

    #[test]
    fn buckets_by_kind() {
        let out = classifier().classify(vec![
            point(ArtifactKind::Transformer, 1, 5),
            line(2, 5),
            point(ArtifactKind::Pole, 3, 5),
            point(ArtifactKind::Equipment, 4, 5),
            feeder(5),
        ]);

        assert_eq!(out.transformers.len(), 1);
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.poles.len(), 1);
        assert_eq!(out.equipment.len(), 1);
        assert_eq!(out.feeders.keys().copied().collect::<Vec<_>>(), vec![5]);
        assert_eq!(out.skipped.total(), 0);
        assert_eq!(out.point_artifacts().count(), 3);
    }

    #[test]
    fn line_endpoints_feed_the_point_cloud() {
        let out = classifier().classify(vec![line(1, 5), line(2, 5), line(3, 8)]);

        assert_eq!(out.point_clouds[&5].len(), 4);
        assert_eq!(out.point_clouds[&8].len(), 2);
        assert_eq!(out.point_clouds[&5][0], out.lines[0].start);
        assert_eq!(out.point_clouds[&5][1], out.lines[0].end);
    }

    #[test]
    fn reprojects_using_x_as_northing() {
        let out = classifier().classify(vec![point(ArtifactKind::Pole, 1, 5)]);
        let position = out.poles[0].position;
        assert!((position.longitude - -72.777_608_6).abs() < 1e-6);
        assert!((position.latitude - -36.124_095_8).abs() < 1e-6);
    }

    #[test]
    fn skips_records_without_coordinates() {
        let mut record = point(ArtifactKind::Pole, 1, 5);
        record.x = None;
        let mut nan = point(ArtifactKind::Pole, 2, 5);
        nan.y = Some(f64::NAN);

        let out = classifier().classify(vec![record, nan]);

        assert!(out.poles.is_empty());
        assert_eq!(out.skipped.missing_coordinates, 2);
    }

    #[test]
    fn skips_lines_without_second_endpoint() {
        let mut record = line(1, 5);
        record.y2 = None;

        let out = classifier().classify(vec![record]);

        assert!(out.lines.is_empty());
        assert!(out.point_clouds.is_empty());
        assert_eq!(out.skipped.missing_line_end, 1);
    }

    #[test]
    fn skips_out_of_bounds_coordinates() {
        let mut pole = point(ArtifactKind::Pole, 1, 5);
        pole.y = Some(100.0);
        let mut far_line = line(2, 5);
        far_line.x2 = Some(1.0);

        let out = classifier().classify(vec![pole, far_line]);

        assert!(out.poles.is_empty());
        assert!(out.lines.is_empty());
        assert_eq!(out.skipped.out_of_bounds, 2);
    }

    #[test]
    fn keeps_first_feeder_record_per_id() {
        let mut second = feeder(5);
        second.description = None;

        let out = classifier().classify(vec![feeder(5), second]);

        assert!(out.feeders[&5].description.is_some());
        assert_eq!(out.skipped.duplicate_feeders, 1);
    }

    #[test]
    fn undescribed_lines_stay_out_of_the_point_cloud() {
        let mut record = line(1, 5);
        record.description = None;

        let out = classifier().classify(vec![record]);

        assert_eq!(out.lines.len(), 1);
        assert!(out.point_clouds.is_empty());
    }
}

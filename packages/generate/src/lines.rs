//! `LineString` features for conductor segments.

use feeder_map_feature_models::MapFeature;
use geo_types::{Geometry, LineString};
use serde_json::Value;

use crate::Built;
use crate::classify::PlacedLine;
use crate::properties::feature_properties;

/// Builds one two-vertex `LineString` per segment.
///
/// Segments without a description are skipped. Ids take the form
/// `line-<feeder>-<segment id>-<bucket index>`.
#[must_use]
pub fn build_line_features(lines: &[PlacedLine]) -> Built {
    let mut built = Built::default();

    for (index, line) in lines.iter().enumerate() {
        let Some(description) = line.record.description.as_ref() else {
            log::warn!("Skipping line {}: no description", line.record.id);
            built.skipped += 1;
            continue;
        };

        let feeder_id = line.record.feeder_id_or_default();
        let mut properties = feature_properties(
            Some(description),
            feeder_id,
            format!("line-{feeder_id}-{}-{index}", line.record.id),
        );
        properties.insert("selected".to_string(), Value::Bool(false));

        let geometry = Geometry::LineString(LineString::from(vec![
            line.start.to_position(),
            line.end.to_position(),
        ]));
        built.features.push(MapFeature::new(geometry, properties));
    }

    built
}

#[cfg(test)]
mod tests {
    use feeder_map_network_models::{ArtifactKind, ArtifactRecord, GeographicPoint};
    use serde_json::json;

    use super::*;

    fn placed(id: i64, description: Option<serde_json::Value>) -> PlacedLine {
        PlacedLine {
            record: ArtifactRecord {
                artifact_kind: ArtifactKind::Line,
                id,
                x: Some(6_000_000.0),
                y: Some(700_000.0),
                x2: Some(6_000_100.0),
                y2: Some(700_100.0),
                description: description.and_then(|d| d.as_object().cloned()),
            },
            start: GeographicPoint::new(-72.0, -36.0),
            end: GeographicPoint::new(-72.001, -36.001),
        }
    }

    #[test]
    fn emits_two_vertex_line_with_merged_properties() {
        let built = build_line_features(&[placed(42, Some(json!({ "feederId": 5, "fases": 3 })))]);

        assert_eq!(built.skipped, 0);
        let feature = &built.features[0];
        let Geometry::LineString(line) = &feature.geometry else {
            panic!("expected a line string");
        };
        assert_eq!(line.0.len(), 2);
        assert_eq!(line.0[0].x, -72.0);
        assert_eq!(line.0[1].y, -36.001);
        assert_eq!(feature.properties["feederId"], json!(5));
        assert_eq!(feature.properties["fases"], json!(3));
        assert_eq!(feature.properties["selected"], json!(false));
        assert_eq!(feature.unique_id(), Some("line-5-42-0"));
    }

    #[test]
    fn skips_undescribed_segments() {
        let built = build_line_features(&[placed(1, None), placed(2, Some(json!({ "feederId": 5 })))]);

        assert_eq!(built.skipped, 1);
        assert_eq!(built.features.len(), 1);
        assert_eq!(built.features[0].unique_id(), Some("line-5-2-1"));
    }

    #[test]
    fn unparseable_feeder_defaults_to_one() {
        let built = build_line_features(&[placed(1, Some(json!({ "feederId": "n/a" })))]);
        assert_eq!(built.features[0].feeder_id(), Some(1));
    }
}

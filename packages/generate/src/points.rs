//! `Point` features for transformers, poles and equipment.

use feeder_map_feature_models::MapFeature;
use geo_types::{Geometry, Point};
use serde_json::Value;

use crate::Built;
use crate::classify::PlacedArtifact;
use crate::properties::feature_properties;

/// Builds one `Point` per artifact, tagged with a kind-specific marker.
///
/// Artifacts without a description are skipped: without it the feeder
/// grouping and marker cannot be recovered. Ids take the form
/// `point-<feeder>-<index>`.
#[must_use]
pub fn build_point_features<'a>(artifacts: impl IntoIterator<Item = &'a PlacedArtifact>) -> Built {
    let mut built = Built::default();

    for (index, artifact) in artifacts.into_iter().enumerate() {
        let record = &artifact.record;
        let Some(description) = record.description.as_ref() else {
            log::warn!(
                "Skipping {} {}: no description",
                record.artifact_kind,
                record.id
            );
            built.skipped += 1;
            continue;
        };

        let feeder_id = record.feeder_id_or_default();
        let mut properties =
            feature_properties(Some(description), feeder_id, format!("point-{feeder_id}-{index}"));
        properties.insert(
            "markerName".to_string(),
            Value::String(format!("marker-{}", record.artifact_kind)),
        );
        properties.insert(
            "artifactKind".to_string(),
            Value::String(record.artifact_kind.to_string()),
        );

        let [longitude, latitude] = artifact.position.to_position();
        built
            .features
            .push(MapFeature::new(Geometry::Point(Point::new(longitude, latitude)), properties));
    }

    built
}

#[cfg(test)]
mod tests {
    use feeder_map_network_models::{ArtifactKind, ArtifactRecord, GeographicPoint};
    use serde_json::json;

    use super::*;

    fn placed(kind: ArtifactKind, id: i64, description: Option<serde_json::Value>) -> PlacedArtifact {
        PlacedArtifact {
            record: ArtifactRecord {
                artifact_kind: kind,
                id,
                x: Some(6_000_000.0),
                y: Some(700_000.0),
                x2: None,
                y2: None,
                description: description.and_then(|d| d.as_object().cloned()),
            },
            position: GeographicPoint::new(-72.7, -36.1),
        }
    }

    #[test]
    fn emits_marker_and_position() {
        let artifacts = [placed(ArtifactKind::Transformer, 9, Some(json!({ "feederId": 3 })))];

        let built = build_point_features(&artifacts);

        let feature = &built.features[0];
        assert_eq!(feature.geometry, Geometry::Point(Point::new(-72.7, -36.1)));
        assert_eq!(feature.properties["markerName"], json!("marker-Transformer"));
        assert_eq!(feature.properties["artifactKind"], json!("Transformer"));
        assert_eq!(feature.feeder_id(), Some(3));
        assert_eq!(feature.unique_id(), Some("point-3-0"));
    }

    #[test]
    fn missing_feeder_id_defaults_to_one() {
        let artifacts = [placed(ArtifactKind::Pole, 1, Some(json!({ "altura": 11 })))];
        let built = build_point_features(&artifacts);
        assert_eq!(built.features[0].feeder_id(), Some(1));
    }

    #[test]
    fn skips_artifacts_without_description() {
        let artifacts = [
            placed(ArtifactKind::Pole, 1, None),
            placed(ArtifactKind::Pole, 2, None),
            placed(ArtifactKind::Equipment, 3, Some(json!({ "feederId": 7 }))),
        ];

        let built = build_point_features(&artifacts);

        assert_eq!(built.skipped, 2);
        assert_eq!(built.features.len(), 1);
        assert_eq!(built.features[0].unique_id(), Some("point-7-2"));
    }
}

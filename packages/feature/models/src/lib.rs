#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map features generated from the network feed.
//!
//! A [`MapFeature`] is a WGS84 geometry plus a flat JSON property bag. It
//! serializes as a `GeoJSON` `Feature`, which is what the map UI consumes.

use feeder_map_network_models::{ArtifactRecord, FeederId, parse_feeder_id};
use geo_types::Geometry;
use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Property bag attached to every feature.
pub type FeatureProperties = serde_json::Map<String, serde_json::Value>;

/// Property holding the owning feeder id.
pub const FEEDER_ID_PROPERTY: &str = "feederId";

/// Property holding the render colour.
pub const COLOR_PROPERTY: &str = "color";

/// Property holding the per-run feature id.
pub const UNIQUE_ID_PROPERTY: &str = "uniqueFeatureId";

/// `details` reported when a regeneration found nothing to store.
pub const NO_FEATURES_DETAILS: &str = "features not found";

/// Colours cycled through by feeder id.
pub const FEEDER_PALETTE: &[&str] = &["#9FEE6B"];

/// Render colour for a feeder, stable for a given id.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn feeder_color(feeder_id: FeederId) -> &'static str {
    let len = FEEDER_PALETTE.len() as i64;
    FEEDER_PALETTE[feeder_id.rem_euclid(len) as usize]
}

/// Stored geometry type of a feature.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// The kind of `geometry`, or `None` for geometry types never stored.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::LineString(_) => Some(Self::LineString),
            Geometry::Polygon(_) => Some(Self::Polygon),
            Geometry::MultiPolygon(_) => Some(Self::MultiPolygon),
            _ => None,
        }
    }
}

/// The three feature classes the map asks for.
///
/// A class covers one or more stored [`GeometryKind`]s.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FeatureClass {
    Point,
    Line,
    Polygon,
}

impl FeatureClass {
    /// Stored geometry kinds that belong to this class.
    #[must_use]
    pub const fn kinds(self) -> &'static [GeometryKind] {
        match self {
            Self::Point => &[GeometryKind::Point],
            Self::Line => &[GeometryKind::LineString],
            Self::Polygon => &[GeometryKind::Polygon, GeometryKind::MultiPolygon],
        }
    }
}

/// One renderable feature.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    /// WGS84 geometry, `[longitude, latitude]` order.
    pub geometry: Geometry<f64>,
    /// Flat property bag.
    pub properties: FeatureProperties,
}

impl MapFeature {
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, properties: FeatureProperties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> Option<GeometryKind> {
        GeometryKind::of(&self.geometry)
    }

    /// The `feederId` property, if numeric.
    #[must_use]
    pub fn feeder_id(&self) -> Option<FeederId> {
        self.properties
            .get(FEEDER_ID_PROPERTY)
            .and_then(parse_feeder_id)
    }

    /// The `uniqueFeatureId` property, if set.
    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.properties
            .get(UNIQUE_ID_PROPERTY)
            .and_then(serde_json::Value::as_str)
    }

    /// Converts to a `GeoJSON` feature.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry {
                bbox: None,
                value: geojson::Value::from(&self.geometry),
                foreign_members: None,
            }),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

impl Serialize for MapFeature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

/// Wraps features in a `GeoJSON` feature collection.
#[must_use]
pub fn feature_collection(features: &[MapFeature]) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: features.iter().map(MapFeature::to_geojson).collect(),
        foreign_members: None,
    }
}

/// Every feature produced by one regeneration run, by class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub lines: Vec<MapFeature>,
    pub points: Vec<MapFeature>,
    pub polygons: Vec<MapFeature>,
}

impl FeatureSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len() + self.points.len() + self.polygons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates polygons, then lines, then points.
    pub fn iter(&self) -> impl Iterator<Item = &MapFeature> {
        self.polygons
            .iter()
            .chain(self.lines.iter())
            .chain(self.points.iter())
    }
}

/// Grouped read result for one map load.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFeatures {
    pub polygon_features: Vec<MapFeature>,
    pub line_features: Vec<MapFeature>,
    pub point_features: Vec<MapFeature>,
    /// Feeder summary records.
    pub feeders: Vec<ArtifactRecord>,
}

/// Result of a regeneration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerateOutcome {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RegenerateOutcome {
    /// The cache was replaced.
    #[must_use]
    pub const fn replaced() -> Self {
        Self {
            done: true,
            details: None,
        }
    }

    /// The run produced no features; the cache was left as it was.
    #[must_use]
    pub fn nothing_to_replace() -> Self {
        Self {
            done: true,
            details: Some(NO_FEATURES_DETAILS.to_string()),
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Electrical network artifact records and planar coordinate types.
//!
//! The raw artifact feed describes feeders, transformers, poles, conductor
//! segments and control equipment of a distribution network. Every
//! placeable artifact carries a planar UTM coordinate pair; the types here
//! model that feed as it arrives, before any reprojection happens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifier of a feeder (distribution circuit), the grouping key for all
/// generated geometry.
pub type FeederId = i64;

/// Feeder id assigned to artifacts whose description carries no usable id.
pub const DEFAULT_FEEDER_ID: FeederId = 1;

/// Description keys that may hold the owning feeder id, in lookup order.
pub const FEEDER_ID_KEYS: &[&str] = &["feederId", "feeder_id", "alimentador_id"];

/// Free-form description payload attached to each artifact.
pub type Description = serde_json::Map<String, Value>;

/// The kind of physical artifact a feed record describes.
///
/// Parsing accepts both the English labels and the labels used by the
/// network operator's relational export.
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
pub enum ArtifactKind {
    /// Distribution transformer
    #[serde(alias = "Transformador de distribucion")]
    #[strum(to_string = "Transformer", serialize = "Transformador de distribucion")]
    Transformer,
    /// Conductor segment between two nodes
    #[serde(alias = "Linea")]
    #[strum(to_string = "Line", serialize = "Linea")]
    Line,
    /// Support pole
    #[serde(alias = "Poste")]
    #[strum(to_string = "Pole", serialize = "Poste")]
    Pole,
    /// Operation and control equipment (switches, reclosers, fuses)
    #[serde(alias = "Equipo de operacion y control")]
    #[strum(to_string = "Equipment", serialize = "Equipo de operacion y control")]
    Equipment,
    /// Feeder summary record (not placeable)
    #[serde(alias = "Alimentador")]
    #[strum(to_string = "Feeder", serialize = "Alimentador")]
    Feeder,
}

impl ArtifactKind {
    /// Every artifact kind, in feed order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Transformer,
            Self::Line,
            Self::Pole,
            Self::Equipment,
            Self::Feeder,
        ]
    }

    /// Whether records of this kind carry coordinates and end up on the map.
    #[must_use]
    pub const fn is_placeable(self) -> bool {
        !matches!(self, Self::Feeder)
    }
}

/// A coordinate pair in the network's UTM projection, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarCoord {
    /// Distance east of the zone's false origin.
    pub easting: f64,
    /// Distance north of the hemisphere's false origin.
    pub northing: f64,
}

impl PlanarCoord {
    /// Creates a planar coordinate from easting and northing.
    #[must_use]
    pub const fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Builds a coordinate from the feed's `(x, y)` column pair.
    ///
    /// The feed stores the northing in `x` and the easting in `y`.
    #[must_use]
    pub fn from_feed(x: Option<f64>, y: Option<f64>) -> Option<Self> {
        let northing = x?;
        let easting = y?;
        if !northing.is_finite() || !easting.is_finite() {
            return None;
        }
        Some(Self { easting, northing })
    }
}

/// Axis-aligned planar box outside of which feed coordinates are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanarBounds {
    /// Smallest accepted northing (feed `x`).
    pub min_northing: f64,
    /// Largest accepted northing (feed `x`).
    pub max_northing: f64,
    /// Smallest accepted easting (feed `y`).
    pub min_easting: f64,
    /// Largest accepted easting (feed `y`).
    pub max_easting: f64,
}

impl Default for PlanarBounds {
    fn default() -> Self {
        Self {
            min_northing: 5_000_000.0,
            max_northing: 10_000_000.0,
            min_easting: 600_000.0,
            max_easting: 1_000_000.0,
        }
    }
}

impl PlanarBounds {
    /// Whether `coord` lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, coord: PlanarCoord) -> bool {
        (self.min_northing..=self.max_northing).contains(&coord.northing)
            && (self.min_easting..=self.max_easting).contains(&coord.easting)
    }
}

/// A WGS84 position derived from a [`PlanarCoord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicPoint {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

impl GeographicPoint {
    /// Creates a geographic point from longitude and latitude.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns `[longitude, latitude]`, the `GeoJSON` position order.
    #[must_use]
    pub const fn to_position(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// One record of the raw artifact feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// What this record describes.
    #[serde(alias = "artefacto")]
    pub artifact_kind: ArtifactKind,
    /// Source-system id of the artifact (feeder id for feeder records).
    pub id: i64,
    /// Northing of the artifact, or of a line's first endpoint.
    #[serde(default)]
    pub x: Option<f64>,
    /// Easting of the artifact, or of a line's first endpoint.
    #[serde(default)]
    pub y: Option<f64>,
    /// Northing of a line's second endpoint.
    #[serde(default)]
    pub x2: Option<f64>,
    /// Easting of a line's second endpoint.
    #[serde(default)]
    pub y2: Option<f64>,
    /// Kind-specific attributes; always expected to carry the feeder id.
    #[serde(
        default,
        alias = "descripcionArtefacto",
        alias = "descripcion_artefacto"
    )]
    pub description: Option<Description>,
}

impl ArtifactRecord {
    /// The artifact's position, or a line's first endpoint.
    #[must_use]
    pub fn origin(&self) -> Option<PlanarCoord> {
        PlanarCoord::from_feed(self.x, self.y)
    }

    /// A line's second endpoint.
    #[must_use]
    pub fn end(&self) -> Option<PlanarCoord> {
        PlanarCoord::from_feed(self.x2, self.y2)
    }

    /// The feeder id from the description payload, if present and numeric.
    #[must_use]
    pub fn feeder_id(&self) -> Option<FeederId> {
        let description = self.description.as_ref()?;
        FEEDER_ID_KEYS
            .iter()
            .find_map(|key| description.get(*key).and_then(parse_feeder_id))
    }

    /// The feeder id, falling back to [`DEFAULT_FEEDER_ID`].
    ///
    /// The fallback silently merges anonymous artifacts into one feeder;
    /// it mirrors what the map UI has always received.
    #[must_use]
    pub fn feeder_id_or_default(&self) -> FeederId {
        self.feeder_id().unwrap_or(DEFAULT_FEEDER_ID)
    }
}

/// Interprets a JSON value as a feeder id.
///
/// Accepts integers, integral floats and numeric strings.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_feeder_id(value: &Value) -> Option<FeederId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A pair of spatially adjacent network nodes with no conductor segment
/// joining them, shaped like the segment row that would close the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingLinePair {
    /// Marker identifying the row as synthetic.
    pub origin_segment_id: String,
    /// Company owning the neighbouring segment.
    pub company_id: Option<i64>,
    /// Node found close to the base node.
    pub near_node_id: i64,
    /// Node the search started from (becomes the segment's second node).
    pub base_node_id: i64,
    /// Conductor catalogue entry copied from the neighbouring segment.
    pub conductor_id: Option<i64>,
    /// Feeder of the neighbouring segment.
    pub feeder_id: Option<FeederId>,
    /// Phase configuration id.
    pub phases_id: Option<i64>,
    /// Zone id.
    pub zone_id: Option<i64>,
    /// Device type id.
    pub device_type_id: Option<i64>,
    /// Distance between the two nodes in metres, at least 1.
    pub length: f64,
    /// Number of phases.
    pub phase_count: Option<i32>,
    /// Nominal voltage in kV.
    pub voltage_kv: Option<f64>,
    /// Geodetic datum label.
    pub datum: Option<String>,
    /// Ownership id.
    pub ownership_id: Option<i64>,
}

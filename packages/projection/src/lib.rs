#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar UTM to geographic WGS84 reprojection.
//!
//! Network artifacts are surveyed in a single UTM zone. The map UI needs
//! longitude/latitude, so every placeable artifact goes through
//! [`CoordinateReprojector::to_geographic`] exactly once per regeneration.
//!
//! Both directions are delegated to `proj4rs` using the zone's proj4
//! definition. The forward direction is provided so callers (and tests)
//! can round-trip.

use feeder_map_network_models::{GeographicPoint, PlanarCoord};
use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// proj4 definition of WGS84 longitude/latitude.
const WGS84_GEOGRAPHIC: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// Errors that can occur when configuring a projection.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// Zone number outside 1..=60.
    #[error("Invalid UTM zone {zone}: expected 1-60")]
    InvalidZone {
        /// The rejected zone number.
        zone: u8,
    },

    /// proj4 rejected a projection definition.
    #[error("Invalid projection definition '{definition}': {source}")]
    Definition {
        /// The rejected proj4 string.
        definition: String,
        /// Underlying error.
        source: proj4rs::errors::Error,
    },

    /// A coordinate could not be transformed.
    #[error("Failed to reproject ({x}, {y}): {source}")]
    Transform {
        /// First input ordinate (easting or longitude).
        x: f64,
        /// Second input ordinate (northing or latitude).
        y: f64,
        /// Underlying error.
        source: proj4rs::errors::Error,
    },
}

/// Which side of the equator a UTM zone's false northing refers to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Hemisphere {
    /// False northing 0 m
    North,
    /// False northing 10 000 000 m
    South,
}

/// A UTM zone: a 6° longitude band plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtmZone {
    number: u8,
    hemisphere: Hemisphere,
}

impl UtmZone {
    /// Creates a zone, validating the zone number.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidZone`] if `number` is not in 1-60.
    pub const fn new(number: u8, hemisphere: Hemisphere) -> Result<Self, ProjectionError> {
        if number == 0 || number > 60 {
            return Err(ProjectionError::InvalidZone { zone: number });
        }
        Ok(Self { number, hemisphere })
    }

    /// Zone number (1-60).
    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    /// Zone hemisphere.
    #[must_use]
    pub const fn hemisphere(self) -> Hemisphere {
        self.hemisphere
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    /// The proj4 definition of this zone on the WGS84 datum.
    #[must_use]
    pub fn proj_string(self) -> String {
        let south = match self.hemisphere {
            Hemisphere::North => "",
            Hemisphere::South => " +south",
        };
        format!(
            "+proj=utm +zone={}{south} +ellps=WGS84 +datum=WGS84 +units=m +no_defs",
            self.number
        )
    }
}

impl Default for UtmZone {
    /// Zone 18 south, the band covering the network's service region.
    fn default() -> Self {
        Self {
            number: 18,
            hemisphere: Hemisphere::South,
        }
    }
}

/// Transform between one UTM zone and WGS84 geographic coordinates.
///
/// Both proj4 definitions are parsed once at construction.
pub struct CoordinateReprojector {
    zone: UtmZone,
    planar: Proj,
    geographic: Proj,
}

impl std::fmt::Debug for CoordinateReprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateReprojector")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

fn parse_definition(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|source| ProjectionError::Definition {
        definition: definition.to_string(),
        source,
    })
}

impl CoordinateReprojector {
    /// Builds a reprojector for `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Definition`] if proj4 rejects either
    /// definition.
    pub fn new(zone: UtmZone) -> Result<Self, ProjectionError> {
        Ok(Self {
            zone,
            planar: parse_definition(&zone.proj_string())?,
            geographic: parse_definition(WGS84_GEOGRAPHIC)?,
        })
    }

    /// The zone this reprojector was built for.
    #[must_use]
    pub const fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Converts a planar UTM coordinate to WGS84 longitude/latitude.
    ///
    /// Callers must not pass non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Transform`] if proj4 cannot invert the
    /// coordinate.
    pub fn to_geographic(&self, coord: PlanarCoord) -> Result<GeographicPoint, ProjectionError> {
        let mut point = (coord.easting, coord.northing, 0.0);
        proj4rs::transform::transform(&self.planar, &self.geographic, &mut point).map_err(
            |source| ProjectionError::Transform {
                x: coord.easting,
                y: coord.northing,
                source,
            },
        )?;
        Ok(GeographicPoint::new(
            point.0.to_degrees(),
            point.1.to_degrees(),
        ))
    }

    /// Converts a WGS84 longitude/latitude to the planar UTM coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Transform`] if proj4 cannot project the
    /// point.
    pub fn to_planar(&self, point: GeographicPoint) -> Result<PlanarCoord, ProjectionError> {
        let mut coord = (
            point.longitude.to_radians(),
            point.latitude.to_radians(),
            0.0,
        );
        proj4rs::transform::transform(&self.geographic, &self.planar, &mut coord).map_err(
            |source| ProjectionError::Transform {
                x: point.longitude,
                y: point.latitude,
                source,
            },
        )?;
        Ok(PlanarCoord::new(coord.0, coord.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn south_18() -> CoordinateReprojector {
        CoordinateReprojector::new(UtmZone::new(18, Hemisphere::South).unwrap()).unwrap()
    }

    fn geographic(easting: f64, northing: f64) -> GeographicPoint {
        south_18()
            .to_geographic(PlanarCoord::new(easting, northing))
            .unwrap()
    }

    #[test]
    fn rejects_out_of_range_zone() {
        assert!(UtmZone::new(0, Hemisphere::North).is_err());
        assert!(UtmZone::new(61, Hemisphere::South).is_err());
        assert!(UtmZone::new(60, Hemisphere::South).is_ok());
    }

    #[test]
    fn central_meridian_of_zone_18() {
        let zone = UtmZone::default();
        assert!((zone.central_meridian() - -75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn false_easting_maps_to_central_meridian() {
        let point = geographic(500_000.0, 6_000_000.0);
        assert!((point.longitude - -75.0).abs() < 1e-9);
        assert!(point.latitude < -35.0 && point.latitude > -37.0);
    }

    #[test]
    fn reprojects_known_network_point() {
        let point = geographic(700_000.0, 6_000_000.0);
        assert!((point.longitude - -72.777_608_6).abs() < 1e-6, "{point:?}");
        assert!((point.latitude - -36.124_095_8).abs() < 1e-6, "{point:?}");
    }

    #[test]
    fn southern_false_northing_is_the_equator() {
        let point = geographic(500_000.0, 10_000_000.0);
        assert!(point.latitude.abs() < 1e-9);
        assert!((point.longitude - -75.0).abs() < 1e-9);
    }

    #[test]
    fn round_trips_across_network_bounds() {
        let reprojector = south_18();
        for easting in [600_000.0, 650_000.0, 700_000.0, 850_000.0, 1_000_000.0] {
            for northing in [5_000_000.0, 6_000_000.0, 7_500_000.0, 9_000_000.0, 9_999_000.0] {
                let original = PlanarCoord::new(easting, northing);
                let back = reprojector
                    .to_planar(reprojector.to_geographic(original).unwrap())
                    .unwrap();
                assert!(
                    (back.easting - easting).abs() < 1e-2,
                    "easting drift at {original:?}: {back:?}"
                );
                assert!(
                    (back.northing - northing).abs() < 1e-2,
                    "northing drift at {original:?}: {back:?}"
                );
            }
        }
    }

    #[test]
    fn nearby_planar_points_stay_nearby() {
        let a = geographic(700_000.0, 6_000_000.0);
        let b = geographic(700_100.0, 6_000_100.0);
        assert!(b.longitude > a.longitude);
        assert!(b.latitude > a.latitude);
        assert!((b.longitude - a.longitude) < 0.01);
        assert!((b.latitude - a.latitude) < 0.01);
    }

    #[test]
    fn builds_zone_definition() {
        assert_eq!(
            UtmZone::default().proj_string(),
            "+proj=utm +zone=18 +south +ellps=WGS84 +datum=WGS84 +units=m +no_defs"
        );
        assert_eq!(
            UtmZone::new(33, Hemisphere::North).unwrap().proj_string(),
            "+proj=utm +zone=33 +ellps=WGS84 +datum=WGS84 +units=m +no_defs"
        );
    }

    #[test]
    fn northern_zone_reprojects_above_the_equator() {
        let reprojector =
            CoordinateReprojector::new(UtmZone::new(33, Hemisphere::North).unwrap()).unwrap();
        let point = reprojector
            .to_geographic(PlanarCoord::new(500_000.0, 5_000_000.0))
            .unwrap();
        assert!((point.longitude - 15.0).abs() < 1e-9);
        assert!(point.latitude > 45.0 && point.latitude < 45.5);
    }

    #[test]
    fn parses_hemisphere_case_insensitively() {
        assert_eq!("SOUTH".parse::<Hemisphere>().unwrap(), Hemisphere::South);
        assert_eq!(Hemisphere::North.to_string(), "north");
    }
}

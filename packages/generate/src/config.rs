//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! utm_zone = 18
//! hemisphere = "south"
//! cluster_max_distance_m = 100.0
//! hull_max_edge_km = 1.0
//! regenerate_timeout_secs = 300
//!
//! [bounds]
//! min_northing = 5000000.0
//! max_northing = 10000000.0
//! min_easting = 600000.0
//! max_easting = 1000000.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use feeder_map_network_models::PlanarBounds;
use feeder_map_projection::{CoordinateReprojector, Hemisphere, ProjectionError, UtmZone};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FEEDER_MAP_CONFIG";

/// Errors that can occur while loading the pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// UTM zone out of range.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A numeric setting is out of range.
    #[error("Invalid config value: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

/// Tunables for one regeneration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// UTM zone number of the feed's planar coordinates.
    pub utm_zone: u8,
    /// Hemisphere of the feed's planar coordinates.
    pub hemisphere: Hemisphere,
    /// Planar box outside of which artifacts are skipped.
    pub bounds: PlanarBounds,
    /// Maximum hop between clustered line endpoints, in metres.
    pub cluster_max_distance_m: f64,
    /// Longest hull edge left uneroded, in kilometres.
    pub hull_max_edge_km: f64,
    /// Budget for fetching and computing one regeneration.
    pub regenerate_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            utm_zone: 18,
            hemisphere: Hemisphere::South,
            bounds: PlanarBounds::default(),
            cluster_max_distance_m: 100.0,
            hull_max_edge_km: 1.0,
            regenerate_timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is out
    /// of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or returns the defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::info!("Loaded pipeline config from {}", path.display());
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the config from `explicit`, else [`CONFIG_ENV`], else
    /// returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be parsed.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        path.map_or_else(|| Ok(Self::default()), |path| Self::load(&path))
    }

    /// The configured UTM zone.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidZone`] if the zone is out of range.
    pub const fn zone(&self) -> Result<UtmZone, ProjectionError> {
        UtmZone::new(self.utm_zone, self.hemisphere)
    }

    /// A reprojector for the configured zone.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if the zone is out of range or its
    /// definition is rejected.
    pub fn reprojector(&self) -> Result<CoordinateReprojector, ProjectionError> {
        CoordinateReprojector::new(self.zone()?)
    }

    #[must_use]
    pub fn hull_max_edge_m(&self) -> f64 {
        self.hull_max_edge_km * 1_000.0
    }

    #[must_use]
    pub const fn regenerate_timeout(&self) -> Duration {
        Duration::from_secs(self.regenerate_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.zone()?;

        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    message: format!("{name} must be a positive number, got {value}"),
                })
            }
        };
        positive("cluster_max_distance_m", self.cluster_max_distance_m)?;
        positive("hull_max_edge_km", self.hull_max_edge_km)?;

        let bounds = &self.bounds;
        if bounds.min_northing > bounds.max_northing || bounds.min_easting > bounds.max_easting {
            return Err(ConfigError::Invalid {
                message: format!("bounds have min greater than max: {bounds:?}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(
            PipelineConfig::from_toml_str("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn overrides_selected_keys() {
        let config = PipelineConfig::from_toml_str(
            r#"
            utm_zone = 19
            hemisphere = "north"
            cluster_max_distance_m = 50.0

            [bounds]
            min_easting = 100000.0
            "#,
        )
        .unwrap();

        assert_eq!(config.utm_zone, 19);
        assert_eq!(config.hemisphere, Hemisphere::North);
        assert!((config.cluster_max_distance_m - 50.0).abs() < f64::EPSILON);
        assert!((config.hull_max_edge_km - 1.0).abs() < f64::EPSILON);
        assert!((config.bounds.min_easting - 100_000.0).abs() < f64::EPSILON);
        assert!((config.bounds.max_easting - 1_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_invalid_zone() {
        assert!(matches!(
            PipelineConfig::from_toml_str("utm_zone = 75"),
            Err(ConfigError::Projection(_))
        ));
    }

    #[test]
    fn rejects_non_positive_thresholds() {
        assert!(matches!(
            PipelineConfig::from_toml_str("hull_max_edge_km = 0.0"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("cluster_max_distance_m = -1.0"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_unknown_hemisphere() {
        assert!(matches!(
            PipelineConfig::from_toml_str(r#"hemisphere = "east""#),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = PipelineConfig::load(Path::new("/nonexistent/feeder_map.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn converts_units() {
        let config = PipelineConfig::default();
        assert!((config.hull_max_edge_m() - 1_000.0).abs() < f64::EPSILON);
        assert_eq!(config.regenerate_timeout(), Duration::from_secs(300));
    }
}

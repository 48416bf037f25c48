#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map feature generation for the feeder map.
//!
//! A regeneration run reads the artifact feed, classifies and reprojects
//! it, builds line and point features directly, derives one service-area
//! polygon per feeder from clustered line endpoints, and swaps the result
//! into the [`FeatureCache`] in a single transaction.
//!
//! [`FeatureService`] is the entry point used by the CLI: it wraps the
//! pipeline with a timeout and exposes the read paths over the cache.

pub mod classify;
pub mod config;
pub mod lines;
pub mod points;
pub mod polygons;
mod properties;

use std::sync::Arc;
use std::time::Duration;

use feeder_map_database::DbError;
use feeder_map_database::feature_cache::{FeatureCache, ReplaceOutcome};
use feeder_map_database::network_db::NetworkDb;
use feeder_map_feature_models::{
    FeatureClass, FeatureSet, GeometryKind, MapFeature, MapFeatures, RegenerateOutcome,
};
use feeder_map_network_models::{ArtifactKind, ArtifactRecord, FeederId, MissingLinePair};
use feeder_map_projection::ProjectionError;
use feeder_map_source::progress::{ProgressCallback, null_progress};
use feeder_map_source::{ArtifactSource, SourceError};
use feeder_map_spatial::{GeoSpatialOps, SpatialOps};

use crate::classify::{ArtifactClassifier, SkipReport};
use crate::config::{ConfigError, PipelineConfig};
use crate::polygons::HullParams;

/// Errors that can occur while generating or reading features.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The feed could not be read or violates its contract.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The feature cache or network tables failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The pipeline configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured projection is invalid.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Fetch and compute did not finish within the budget. The cache was
    /// not touched.
    #[error("Regeneration timed out after {}s", .timeout.as_secs_f64())]
    TimedOut {
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// A blocking worker panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Output of a feature builder: the features plus how many inputs were
/// skipped for lack of a description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Built {
    pub features: Vec<MapFeature>,
    pub skipped: usize,
}

/// Features from one pipeline run with the skip counts behind them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedFeatures {
    pub features: FeatureSet,
    pub skipped: SkipReport,
}

/// Runs the pure part of the pipeline over `records`.
///
/// # Errors
///
/// Returns [`GenerateError::Projection`] if the configured zone is
/// invalid. Malformed individual records never fail the run.
pub fn generate_features(
    records: Vec<ArtifactRecord>,
    config: &PipelineConfig,
    ops: &dyn SpatialOps,
) -> Result<GeneratedFeatures, GenerateError> {
    let classifier = ArtifactClassifier::new(config.reprojector()?, config.bounds);
    let classified = classifier.classify(records);

    let lines = lines::build_line_features(&classified.lines);
    let points = points::build_point_features(classified.point_artifacts());
    let polygons = polygons::build_polygon_features(
        &classified.point_clouds,
        ops,
        HullParams {
            cluster_max_distance_m: config.cluster_max_distance_m,
            max_edge_m: config.hull_max_edge_m(),
        },
    );

    let mut skipped = classified.skipped;
    skipped.missing_description += lines.skipped + points.skipped;

    log::info!(
        "Generated {} line, {} point and {} polygon features",
        lines.features.len(),
        points.features.len(),
        polygons.len()
    );

    Ok(GeneratedFeatures {
        features: FeatureSet {
            lines: lines.features,
            points: points.features,
            polygons,
        },
        skipped,
    })
}

/// Regeneration and read access over the feature cache.
pub struct FeatureService {
    source: Arc<dyn ArtifactSource>,
    cache: Arc<FeatureCache>,
    network: Arc<NetworkDb>,
    config: PipelineConfig,
    ops: Arc<dyn SpatialOps>,
    progress: Arc<dyn ProgressCallback>,
}

impl FeatureService {
    /// Creates a service that reads the feed from `source`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        cache: Arc<FeatureCache>,
        network: Arc<NetworkDb>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            cache,
            network,
            config,
            ops: Arc::new(GeoSpatialOps),
            progress: null_progress(),
        }
    }

    /// Replaces the clustering and hull implementation.
    #[must_use]
    pub fn with_spatial_ops(mut self, ops: Arc<dyn SpatialOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Reports regeneration stages to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Regenerates with the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::regenerate_with_timeout`].
    pub async fn regenerate(&self) -> Result<RegenerateOutcome, GenerateError> {
        self.regenerate_with_timeout(self.config.regenerate_timeout())
            .await
    }

    /// Rebuilds every feature from the feed and replaces the cache.
    ///
    /// Fetching and computing must finish within `timeout`; otherwise the
    /// run is abandoned and the cache is left as it was. A run that yields
    /// no features also leaves the cache as it was.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError`] if the feed is unreadable, the run times
    /// out, or the replace transaction fails. The cache keeps its previous
    /// contents in every error case.
    pub async fn regenerate_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<RegenerateOutcome, GenerateError> {
        let progress = Arc::clone(&self.progress);
        progress.set_total(3);

        let compute = async {
            progress.set_message(format!("Reading feed from {}...", self.source.id()));
            let records = self.source.fetch().await?;
            progress.inc(1);

            progress.set_message(format!("Generating features from {} records...", records.len()));
            let config = self.config.clone();
            let ops = Arc::clone(&self.ops);
            let generated = tokio::task::spawn_blocking(move || {
                generate_features(records, &config, ops.as_ref())
            })
            .await??;
            progress.inc(1);

            Ok::<_, GenerateError>(generated)
        };

        let generated = tokio::time::timeout(timeout, compute)
            .await
            .map_err(|_| {
                log::error!("Regeneration exceeded {timeout:?}, cache left untouched");
                GenerateError::TimedOut { timeout }
            })??;

        if generated.skipped.total() > 0 {
            log::warn!("Skipped records: {:?}", generated.skipped);
        }

        progress.set_message("Replacing feature cache...".to_string());
        let cache = Arc::clone(&self.cache);
        let features = generated.features;
        let outcome = tokio::task::spawn_blocking(move || cache.replace(&features)).await??;
        progress.inc(1);

        Ok(match outcome {
            ReplaceOutcome::Replaced { count } => {
                progress.finish(format!("Stored {count} features"));
                RegenerateOutcome::replaced()
            }
            ReplaceOutcome::NothingToReplace => {
                progress.finish("No features generated, cache unchanged".to_string());
                RegenerateOutcome::nothing_to_replace()
            }
        })
    }

    /// Cached features of the given geometry kinds, optionally for one
    /// feeder.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Database`] if the cache query fails.
    pub async fn query_kinds(
        &self,
        kinds: &[GeometryKind],
        feeder_id: Option<FeederId>,
    ) -> Result<Vec<MapFeature>, GenerateError> {
        let cache = Arc::clone(&self.cache);
        let kinds = kinds.to_vec();
        Ok(tokio::task::spawn_blocking(move || cache.query(&kinds, feeder_id)).await??)
    }

    /// Cached features of the given classes, optionally for one feeder.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Database`] if the cache query fails.
    pub async fn query(
        &self,
        classes: &[FeatureClass],
        feeder_id: Option<FeederId>,
    ) -> Result<Vec<MapFeature>, GenerateError> {
        let mut kinds: Vec<GeometryKind> = classes
            .iter()
            .flat_map(|class| class.kinds().iter().copied())
            .collect();
        kinds.sort_unstable();
        kinds.dedup();
        self.query_kinds(&kinds, feeder_id).await
    }

    /// Feeder summary records from the feed, ordered by feeder id.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Source`] if the feed cannot be read.
    pub async fn feeders(&self) -> Result<Vec<ArtifactRecord>, GenerateError> {
        let mut feeders: Vec<ArtifactRecord> = self
            .source
            .fetch()
            .await?
            .into_iter()
            .filter(|record| record.artifact_kind == ArtifactKind::Feeder)
            .collect();
        feeders.sort_by_key(|record| record.id);
        feeders.dedup_by_key(|record| record.id);
        Ok(feeders)
    }

    /// Polygons, lines, points and the feeder list in one result.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError`] if the cache or the feed cannot be read.
    pub async fn all_features(
        &self,
        feeder_id: Option<FeederId>,
    ) -> Result<MapFeatures, GenerateError> {
        Ok(MapFeatures {
            polygon_features: self.query(&[FeatureClass::Polygon], feeder_id).await?,
            line_features: self.query(&[FeatureClass::Line], feeder_id).await?,
            point_features: self.query(&[FeatureClass::Point], feeder_id).await?,
            feeders: self.feeders().await?,
        })
    }

    /// Node pairs adjacent in space but not joined by a segment.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Database`] if the query fails.
    pub async fn missing_line_pairs(&self) -> Result<Vec<MissingLinePair>, GenerateError> {
        let network = Arc::clone(&self.network);
        Ok(tokio::task::spawn_blocking(move || network.missing_line_pairs()).await??)
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Artifact feed sources.
//!
//! The network feed is produced elsewhere (a relational export, a JSON
//! dump). Each provider implements [`ArtifactSource`] so the feature
//! pipeline can run against any of them.

pub mod json_file;
pub mod progress;

use async_trait::async_trait;
use feeder_map_network_models::ArtifactRecord;
use serde_json::Value;

/// Errors that can occur while reading the artifact feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed is not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The feed is not shaped like an artifact feed.
    #[error("Feed contract violation: {message}")]
    Contract {
        /// Description of what went wrong.
        message: String,
    },

    /// The backing store failed.
    #[error("Source backend error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// A provider of raw artifact records.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Short identifier used in logs (e.g., `"json:data/feed.json"`).
    fn id(&self) -> &str;

    /// Reads the whole feed.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the feed cannot be read or is not an
    /// artifact feed. Individual records with bad coordinates are not
    /// errors; those are filtered downstream.
    async fn fetch(&self) -> Result<Vec<ArtifactRecord>, SourceError>;
}

/// Parses a JSON document into artifact records.
///
/// The document must be an array of record objects. Every record must
/// carry a known `artifactKind`, an integer `id`, and a `description`
/// that is either an object or absent.
///
/// # Errors
///
/// Returns [`SourceError::Contract`] naming the first offending record.
pub fn parse_feed(document: Value) -> Result<Vec<ArtifactRecord>, SourceError> {
    let Value::Array(items) = document else {
        return Err(SourceError::Contract {
            message: "feed must be a JSON array of records".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<ArtifactRecord>(item).map_err(|e| SourceError::Contract {
                message: format!("record {index}: {e}"),
            })
        })
        .collect()
}

/// A feed held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<ArtifactRecord>,
}

impl StaticSource {
    #[must_use]
    pub const fn new(records: Vec<ArtifactRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ArtifactSource for StaticSource {
    fn id(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<ArtifactRecord>, SourceError> {
        Ok(self.records.clone())
    }
}

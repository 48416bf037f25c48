//! Artifact feed read from a JSON file on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use feeder_map_network_models::ArtifactRecord;

use crate::{ArtifactSource, SourceError, parse_feed};

/// Reads the feed from a JSON array file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    id: String,
    path: PathBuf,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: format!("json:{}", path.display()),
            path,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArtifactSource for JsonFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<Vec<ArtifactRecord>, SourceError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)?;
        let records = parse_feed(document)?;
        log::info!("Read {} artifact records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

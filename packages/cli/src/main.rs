#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `feeder_map`: regenerate and query the feeder map feature cache.
//!
//! Every subcommand prints JSON to stdout; logs and progress bars go to
//! stderr through [`feeder_map_cli_utils::init_logger`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use feeder_map_database::feature_cache::FeatureCache;
use feeder_map_database::network_db::NetworkDb;
use feeder_map_database::paths;
use feeder_map_feature_models::{FeatureClass, feature_collection};
use feeder_map_generate::FeatureService;
use feeder_map_generate::config::PipelineConfig;
use feeder_map_network_models::FeederId;
use feeder_map_source::ArtifactSource;
use feeder_map_source::progress::ProgressCallback as _;
use feeder_map_source::json_file::JsonFileSource;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "feeder_map", about = "Electrical distribution feeder map features")]
struct Cli {
    /// `DuckDB` file (defaults to `FEEDER_MAP_DATABASE`, then
    /// `data/feeder_map.duckdb`).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Pipeline config TOML (defaults to `FEEDER_MAP_CONFIG`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read the artifact feed from this JSON file instead of the
    /// `artifact_feed` table.
    #[arg(long, global = true)]
    feed: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild every feature from the feed and replace the cache
    Regenerate {
        /// Override the configured timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Print cached features as a `GeoJSON` `FeatureCollection`
    Query {
        /// Feature class to include (repeatable): point, line, polygon
        #[arg(long = "kind", required = true)]
        kinds: Vec<FeatureClass>,

        /// Only features of this feeder
        #[arg(long)]
        feeder: Option<FeederId>,
    },
    /// Print polygons, lines, points and feeders grouped
    All {
        /// Only features of this feeder
        #[arg(long)]
        feeder: Option<FeederId>,
    },
    /// Print the feeder summary records
    Feeders,
    /// Print node pairs that look like missing line segments
    MissingLines,
    /// Replace the `artifact_feed` table with a JSON feed file
    ImportFeed {
        /// JSON array of artifact records
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = feeder_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let db_path = paths::resolve_db_path(cli.database.as_deref());
    log::info!("Using database {}", db_path.display());
    let conn = feeder_map_database::open(&db_path)?;
    let network = Arc::new(NetworkDb::new(conn.try_clone()?)?);
    let cache = Arc::new(FeatureCache::new(conn)?);

    let config = PipelineConfig::resolve(cli.config.as_deref())?;
    let source: Arc<dyn ArtifactSource> = match &cli.feed {
        Some(path) => Arc::new(JsonFileSource::new(path)),
        None => Arc::clone(&network) as Arc<dyn ArtifactSource>,
    };
    let service = FeatureService::new(source, cache, Arc::clone(&network), config);

    match cli.command {
        Commands::Regenerate { timeout_secs } => {
            let service = service.with_progress(
                feeder_map_cli_utils::IndicatifProgress::stages_bar(&multi, "Regenerating"),
            );
            let outcome = match timeout_secs {
                Some(secs) => {
                    service
                        .regenerate_with_timeout(Duration::from_secs(secs))
                        .await?
                }
                None => service.regenerate().await?,
            };
            print_json(&outcome)?;
        }
        Commands::Query { kinds, feeder } => {
            let features = service.query(&kinds, feeder).await?;
            print_json(&feature_collection(&features))?;
        }
        Commands::All { feeder } => print_json(&service.all_features(feeder).await?)?,
        Commands::Feeders => print_json(&service.feeders().await?)?,
        Commands::MissingLines => print_json(&service.missing_line_pairs().await?)?,
        Commands::ImportFeed { path } => import_feed(&path, &network, &multi).await?,
    }

    Ok(())
}

async fn import_feed(
    path: &Path,
    network: &Arc<NetworkDb>,
    multi: &feeder_map_cli_utils::MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = feeder_map_cli_utils::IndicatifProgress::records_bar(
        multi,
        &format!("Importing {}", path.display()),
    );

    let records = JsonFileSource::new(path).fetch().await?;
    progress.set_total(u64::try_from(records.len()).unwrap_or(u64::MAX));

    let network = Arc::clone(network);
    let count = tokio::task::spawn_blocking(move || network.replace_feed(&records)).await??;
    progress.inc(u64::try_from(count).unwrap_or(u64::MAX));
    progress.finish(format!("Imported {count} artifact records"));

    print_json(&serde_json::json!({ "imported": count }))
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Canonical file paths for the `DuckDB` data directory.

use std::path::{Path, PathBuf};

/// Environment variable overriding the database location.
pub const DATABASE_ENV: &str = "FEEDER_MAP_DATABASE";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// working directory if the crate is not two levels below the root.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the default database file path.
#[must_use]
pub fn default_db_path() -> PathBuf {
    data_dir().join("feeder_map.duckdb")
}

/// Picks the database path: `explicit` if given, else [`DATABASE_ENV`],
/// else [`default_db_path`].
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(
        || {
            std::env::var_os(DATABASE_ENV)
                .filter(|v| !v.is_empty())
                .map_or_else(default_db_path, PathBuf::from)
        },
        Path::to_path_buf,
    )
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

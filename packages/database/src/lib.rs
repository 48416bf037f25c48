#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the feeder map.
//!
//! One database file holds the generated feature cache
//! ([`feature_cache`]) and the raw network tables the pipeline reads
//! from ([`network_db`]).

pub mod feature_cache;
pub mod network_db;
pub mod paths;

use std::path::Path;

use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WKB encode/decode error.
    #[error("Geometry codec error: {0}")]
    Geometry(#[from] geozero::error::GeozeroError),

    /// Stored JSON could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A thread panicked while holding a connection lock.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the feeder map database and ensures every table
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection, or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens an in-memory database with every table created.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    feature_cache::create_schema(conn)?;
    network_db::create_schema(conn)?;
    Ok(())
}

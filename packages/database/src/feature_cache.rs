//! Generated map features stored in `DuckDB`.
//!
//! Geometry is kept as WKB next to its kind and owning feeder, with the
//! property bag serialized as JSON text. The whole table is swapped in one
//! transaction on every regeneration; there is no partial update path.

use std::sync::Mutex;

use duckdb::Connection;
use feeder_map_feature_models::{FeatureProperties, FeatureSet, GeometryKind, MapFeature};
use feeder_map_network_models::FeederId;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToGeo, ToWkb};

use crate::DbError;

pub(crate) fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS features (
            id BIGINT NOT NULL,
            feeder_id BIGINT,
            geometry_kind TEXT NOT NULL,
            geometry BLOB NOT NULL,
            properties TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// What [`FeatureCache::replace`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The previous contents were swapped for `count` new features.
    Replaced {
        /// Number of stored features.
        count: usize,
    },
    /// The incoming set was empty; existing rows were kept.
    NothingToReplace,
}

/// The persisted feature set.
///
/// Writers are serialized by an internal lock and each write is one
/// transaction. Reads open their own connection to the same database, so
/// they observe either the previous or the new set in full.
pub struct FeatureCache {
    conn: Mutex<Connection>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for FeatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureCache").finish_non_exhaustive()
    }
}

impl FeatureCache {
    /// Wraps an open connection, creating the `features` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if schema creation fails.
    pub fn new(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            write_lock: Mutex::new(()),
        })
    }

    /// A fresh connection to the cache's database.
    fn connection(&self) -> Result<Connection, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        Ok(conn.try_clone()?)
    }

    /// Atomically replaces every stored feature with `features`.
    ///
    /// An empty set leaves the table untouched. On any error the
    /// transaction is rolled back and the previous set stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if encoding or any statement fails.
    pub fn replace(&self, features: &FeatureSet) -> Result<ReplaceOutcome, DbError> {
        if features.is_empty() {
            log::info!("No features to store, keeping the existing cache");
            return Ok(ReplaceOutcome::NothingToReplace);
        }

        let rows = features
            .iter()
            .map(encode_feature)
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock().map_err(|_| DbError::LockPoisoned)?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM features", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO features (id, feeder_id, geometry_kind, geometry, properties)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for (i, row) in rows.iter().enumerate() {
                let id = i64::try_from(i).map_err(|e| DbError::Conversion {
                    message: format!("feature index {i} out of range: {e}"),
                })?;
                stmt.execute(duckdb::params![
                    id,
                    row.feeder_id,
                    row.kind.as_ref(),
                    row.wkb,
                    row.properties,
                ])?;
            }
        }

        tx.commit()?;

        log::info!(
            "Replaced {removed} cached features with {} new features",
            rows.len()
        );

        Ok(ReplaceOutcome::Replaced { count: rows.len() })
    }

    /// Returns stored features whose kind is in `kinds`, optionally only
    /// those owned by `feeder_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored row cannot be
    /// decoded.
    pub fn query(
        &self,
        kinds: &[GeometryKind],
        feeder_id: Option<FeederId>,
    ) -> Result<Vec<MapFeature>, DbError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = kinds.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let mut sql = format!(
            "SELECT geometry, properties FROM features WHERE geometry_kind IN ({placeholders})"
        );
        if feeder_id.is_some() {
            sql.push_str(" AND feeder_id = ?");
        }
        sql.push_str(" ORDER BY id");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        for (i, kind) in kinds.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, kind.as_ref())?;
        }
        if let Some(feeder_id) = feeder_id {
            stmt.raw_bind_parameter(kinds.len() + 1, feeder_id)?;
        }

        stmt.raw_execute()?;
        let mut rows = stmt.raw_query();
        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            let wkb: Vec<u8> = row.get(0)?;
            let properties: String = row.get(1)?;
            features.push(MapFeature::new(
                Wkb(wkb).to_geo()?,
                serde_json::from_str::<FeatureProperties>(&properties)?,
            ));
        }

        Ok(features)
    }

    /// Number of stored features.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn count(&self) -> Result<u64, DbError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM features", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative feature count {count}: {e}"),
        })
    }
}

struct EncodedFeature {
    feeder_id: Option<FeederId>,
    kind: GeometryKind,
    wkb: Vec<u8>,
    properties: String,
}

fn encode_feature(feature: &MapFeature) -> Result<EncodedFeature, DbError> {
    let kind = feature.kind().ok_or_else(|| DbError::Conversion {
        message: format!(
            "unsupported geometry for feature {:?}",
            feature.unique_id().unwrap_or("<unnamed>")
        ),
    })?;

    Ok(EncodedFeature {
        feeder_id: feature.feeder_id(),
        kind,
        wkb: feature.geometry.to_wkb(CoordDimensions::xy())?,
        properties: serde_json::to_string(&feature.properties)?,
    })
}

//! Raw network tables: the artifact feed and the segment topology used by
//! the missing-line diagnostic.
//!
//! `artifact_feed` holds the feed in the shape the pipeline consumes.
//! `line_segments` and `nearby_nodes` mirror the operator's segment table
//! and its precomputed node proximity ranking.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duckdb::Connection;
use feeder_map_network_models::{ArtifactKind, ArtifactRecord, Description, MissingLinePair};
use feeder_map_source::{ArtifactSource, SourceError};

use crate::DbError;

/// `originSegmentId` of every synthetic missing-line row.
pub const MISSING_LINE_MARKER: &str = "DUMMY segment";

pub(crate) fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS artifact_feed (
            seq BIGINT NOT NULL,
            artifact_kind TEXT NOT NULL,
            id BIGINT NOT NULL,
            x DOUBLE,
            y DOUBLE,
            x2 DOUBLE,
            y2 DOUBLE,
            description TEXT
        );
        CREATE TABLE IF NOT EXISTS line_segments (
            segment_id BIGINT NOT NULL,
            company_id BIGINT,
            node_one_id BIGINT NOT NULL,
            node_two_id BIGINT NOT NULL,
            conductor_id BIGINT,
            feeder_id BIGINT,
            phases_id BIGINT,
            zone_id BIGINT,
            device_type_id BIGINT,
            phase_count INTEGER,
            voltage_kv DOUBLE,
            datum TEXT,
            ownership_id BIGINT
        );
        CREATE TABLE IF NOT EXISTS nearby_nodes (
            base_node_id BIGINT NOT NULL,
            near_node_id BIGINT NOT NULL,
            proximity_rank INTEGER NOT NULL,
            distance DOUBLE
        );",
    )?;
    Ok(())
}

/// Replaces the stored artifact feed with `records`, preserving order.
///
/// # Errors
///
/// Returns [`DbError`] if serialization or any statement fails; the
/// previous feed is kept in that case.
pub fn replace_feed(conn: &mut Connection, records: &[ArtifactRecord]) -> Result<usize, DbError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM artifact_feed", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO artifact_feed (seq, artifact_kind, id, x, y, x2, y2, description)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (seq, record) in (0_i64..).zip(records) {
            let description = record
                .description
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            stmt.execute(duckdb::params![
                seq,
                record.artifact_kind.as_ref(),
                record.id,
                record.x,
                record.y,
                record.x2,
                record.y2,
                description,
            ])?;
        }
    }

    tx.commit()?;
    log::info!("Stored {} artifact records", records.len());
    Ok(records.len())
}

/// Loads the stored artifact feed in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] for rows with an unknown kind or a
/// description that is not a JSON object, or [`DbError`] if the query
/// fails.
pub fn load_feed(conn: &Connection) -> Result<Vec<ArtifactRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT artifact_kind, id, x, y, x2, y2, description
         FROM artifact_feed
         ORDER BY seq",
    )?;

    stmt.raw_execute()?;
    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let id: i64 = row.get(1)?;
        let description: Option<String> = row.get(6)?;

        let artifact_kind = ArtifactKind::from_str(&kind).map_err(|_| DbError::Conversion {
            message: format!("artifact {id} has unknown kind {kind:?}"),
        })?;
        let description = description
            .map(|text| {
                serde_json::from_str::<Description>(&text).map_err(|e| DbError::Conversion {
                    message: format!("artifact {id} has malformed description: {e}"),
                })
            })
            .transpose()?;

        records.push(ArtifactRecord {
            artifact_kind,
            id,
            x: row.get(2)?,
            y: row.get(3)?,
            x2: row.get(4)?,
            y2: row.get(5)?,
            description,
        });
    }

    Ok(records)
}

/// Finds node pairs that are each other's nearest neighbour but have no
/// segment running from the near node back to the base node.
///
/// Each row is shaped as the segment that would close the gap, copying
/// the attributes of the segment leaving the base node. Distances of zero
/// or less are reported as length 1.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn missing_line_pairs(conn: &Connection) -> Result<Vec<MissingLinePair>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT
            segment.company_id,
            nearby.near_node_id,
            nearby.base_node_id,
            segment.conductor_id,
            segment.feeder_id,
            segment.phases_id,
            segment.zone_id,
            segment.device_type_id,
            CASE WHEN nearby.distance <= 0 THEN 1 ELSE nearby.distance END AS length,
            segment.phase_count,
            segment.voltage_kv,
            segment.datum,
            segment.ownership_id
        FROM line_segments AS segment
        JOIN nearby_nodes AS nearby
            ON segment.node_one_id = nearby.base_node_id
            AND nearby.proximity_rank = 1
        LEFT JOIN line_segments AS existing
            ON existing.node_one_id = nearby.near_node_id
            AND existing.node_two_id = nearby.base_node_id
        WHERE existing.segment_id IS NULL
        ORDER BY segment.segment_id, nearby.near_node_id",
    )?;

    stmt.raw_execute()?;
    let mut rows = stmt.raw_query();
    let mut pairs = Vec::new();
    while let Some(row) = rows.next()? {
        let length: Option<f64> = row.get(8)?;
        pairs.push(MissingLinePair {
            origin_segment_id: MISSING_LINE_MARKER.to_string(),
            company_id: row.get(0)?,
            near_node_id: row.get(1)?,
            base_node_id: row.get(2)?,
            conductor_id: row.get(3)?,
            feeder_id: row.get(4)?,
            phases_id: row.get(5)?,
            zone_id: row.get(6)?,
            device_type_id: row.get(7)?,
            length: length.unwrap_or(1.0),
            phase_count: row.get(9)?,
            voltage_kv: row.get(10)?,
            datum: row.get(11)?,
            ownership_id: row.get(12)?,
        });
    }

    log::debug!("Found {} missing line pairs", pairs.len());
    Ok(pairs)
}

/// Shared handle on the network tables.
///
/// Implements [`ArtifactSource`] over `artifact_feed`; blocking queries
/// run on the tokio blocking pool.
pub struct NetworkDb {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for NetworkDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkDb").finish_non_exhaustive()
    }
}

impl NetworkDb {
    /// Wraps `conn`, creating the network tables if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if schema creation fails.
    pub fn new(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&mut conn)
    }

    /// See [`replace_feed`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub fn replace_feed(&self, records: &[ArtifactRecord]) -> Result<usize, DbError> {
        self.with_conn(|conn| replace_feed(conn, records))
    }

    /// See [`load_feed`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails or a row is malformed.
    pub fn load_feed(&self) -> Result<Vec<ArtifactRecord>, DbError> {
        self.with_conn(|conn| load_feed(conn))
    }

    /// See [`missing_line_pairs`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn missing_line_pairs(&self) -> Result<Vec<MissingLinePair>, DbError> {
        self.with_conn(|conn| missing_line_pairs(conn))
    }
}

impl From<DbError> for SourceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conversion { message } => Self::Contract { message },
            other => Self::Backend {
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl ArtifactSource for NetworkDb {
    fn id(&self) -> &str {
        "duckdb:artifact_feed"
    }

    async fn fetch(&self) -> Result<Vec<ArtifactRecord>, SourceError> {
        let conn = Arc::clone(&self.conn);
        let records = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| DbError::LockPoisoned)?;
            load_feed(&conn)
        })
        .await
        .map_err(|e| SourceError::Backend {
            message: format!("feed reader task failed: {e}"),
        })??;

        log::info!("Read {} artifact records from {}", records.len(), self.id());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn db() -> Connection {
        crate::open_in_memory().unwrap()
    }

    fn record(kind: ArtifactKind, id: i64, description: Option<serde_json::Value>) -> ArtifactRecord {
        ArtifactRecord {
            artifact_kind: kind,
            id,
            x: Some(6_000_000.0),
            y: Some(700_000.0),
            x2: (kind == ArtifactKind::Line).then_some(6_000_100.0),
            y2: (kind == ArtifactKind::Line).then_some(700_100.0),
            description: description.and_then(|d| d.as_object().cloned()),
        }
    }

    #[test]
    fn feed_round_trips_in_order() {
        let mut conn = db();
        let records = vec![
            record(ArtifactKind::Line, 10, Some(json!({ "feederId": 5 }))),
            record(ArtifactKind::Pole, 3, None),
            record(ArtifactKind::Transformer, 7, Some(json!({ "feederId": 5, "kva": 75 }))),
        ];

        assert_eq!(replace_feed(&mut conn, &records).unwrap(), 3);
        assert_eq!(load_feed(&conn).unwrap(), records);
    }

    #[test]
    fn replacing_feed_drops_previous_rows() {
        let mut conn = db();
        replace_feed(&mut conn, &[record(ArtifactKind::Pole, 1, None)]).unwrap();
        replace_feed(&mut conn, &[record(ArtifactKind::Pole, 2, None)]).unwrap();

        let loaded = load_feed(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 2);
    }

    #[test]
    fn accepts_operator_kind_labels() {
        let conn = db();
        conn.execute_batch(
            "INSERT INTO artifact_feed VALUES (0, 'Poste', 4, 6000000, 700000, NULL, NULL, '{\"alimentador_id\": 9}');",
        )
        .unwrap();

        let loaded = load_feed(&conn).unwrap();
        assert_eq!(loaded[0].artifact_kind, ArtifactKind::Pole);
        assert_eq!(loaded[0].feeder_id(), Some(9));
    }

    #[test]
    fn unknown_kind_is_a_conversion_error() {
        let conn = db();
        conn.execute_batch(
            "INSERT INTO artifact_feed VALUES (0, 'Substation', 4, NULL, NULL, NULL, NULL, NULL);",
        )
        .unwrap();

        assert!(matches!(load_feed(&conn), Err(DbError::Conversion { .. })));
    }

    #[tokio::test]
    async fn network_db_serves_stored_feed() {
        let network = NetworkDb::new(Connection::open_in_memory().unwrap()).unwrap();
        let records = vec![record(ArtifactKind::Line, 1, Some(json!({ "feederId": 5 })))];
        network.replace_feed(&records).unwrap();

        assert_eq!(network.fetch().await.unwrap(), records);
    }

    #[tokio::test]
    async fn network_db_reports_contract_violations() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artifact_feed VALUES (0, 'Substation', 4, NULL, NULL, NULL, NULL, NULL);",
        )
        .unwrap();

        let network = NetworkDb::new(conn).unwrap();
        assert!(matches!(
            network.fetch().await,
            Err(SourceError::Contract { .. })
        ));
    }

    fn seed_topology(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO line_segments VALUES
                (1, 10, 100, 101, 7, 5, 3, 2, 1, 3, 13.2, 'WGS84', 4),
                (2, 10, 200, 201, 7, 5, 3, 2, 1, 3, 13.2, 'WGS84', 4),
                (3, 10, 301, 200, 7, 5, 3, 2, 1, 3, 13.2, 'WGS84', 4);
             INSERT INTO nearby_nodes VALUES
                (100, 150, 1, 12.5),
                (100, 151, 2, 30.0),
                (200, 301, 1, 8.0),
                (201, 250, 1, 0.0);",
        )
        .unwrap();
    }

    #[test]
    fn reports_nearest_nodes_without_a_return_segment() {
        let conn = db();
        seed_topology(&conn);

        let pairs = missing_line_pairs(&conn).unwrap();

        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.origin_segment_id, MISSING_LINE_MARKER);
        assert_eq!(pair.base_node_id, 100);
        assert_eq!(pair.near_node_id, 150);
        assert_eq!(pair.feeder_id, Some(5));
        assert_eq!(pair.phase_count, Some(3));
        assert!((pair.length - 12.5).abs() < f64::EPSILON);
        assert_eq!(pair.datum.as_deref(), Some("WGS84"));
    }

    #[test]
    fn clamps_non_positive_distance_to_one() {
        let conn = db();
        conn.execute_batch(
            "INSERT INTO line_segments VALUES
                (1, 10, 500, 501, NULL, 8, NULL, NULL, NULL, NULL, NULL, NULL, NULL);
             INSERT INTO nearby_nodes VALUES (500, 550, 1, 0.0);",
        )
        .unwrap();

        let pairs = missing_line_pairs(&conn).unwrap();

        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].length - 1.0).abs() < f64::EPSILON);
        assert_eq!(pairs[0].conductor_id, None);
    }
}

//! # Traffic Logs
//!
//! Click and data-transfer events, optionally tied to a port reservation.
//!
//! Clicks carry an amount of `1`; transfers carry their size in MiB rounded
//! to two decimals. Metadata is an arbitrary JSON object stored as text.

use crate::clock;
use crate::{Result, Store};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

const COLUMNS: &str = "id, port_id, event_type, amount, metadata, created_at";

/// Aggregates shared by the per-port and grouped statistics queries.
const AGGREGATES: &str = "
    COALESCE(SUM(CASE WHEN event_type = 'click' THEN amount ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN event_type = 'data_transfer' THEN amount ELSE 0 END), 0),
    COUNT(CASE WHEN event_type = 'click' THEN 1 END),
    COUNT(CASE WHEN event_type = 'data_transfer' THEN 1 END),
    MAX(created_at)";

const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Convert a byte count to MiB rounded to two decimals.
#[must_use]
#[allow(clippy::float_arithmetic, clippy::cast_precision_loss)]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
}

// =============================================================================
// EVENT TYPE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Click,
    DataTransfer,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DataTransfer => "data_transfer",
        }
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "click" => Ok(Self::Click),
            "data_transfer" => Ok(Self::DataTransfer),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A stored traffic event. `metadata` is the parsed JSON, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLog {
    pub id: String,
    pub port_id: Option<String>,
    pub event_type: EventType,
    pub amount: f64,
    pub metadata: Json,
    pub created_at: String,
}

impl TrafficLog {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            port_id: row.get(1)?,
            event_type: row.get(2)?,
            amount: row.get(3)?,
            metadata: metadata
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or(Json::Null),
            created_at: row.get(5)?,
        })
    }
}

/// A traffic event to record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrafficLog {
    pub port_id: Option<String>,
    pub event_type: EventType,
    pub amount: f64,
    pub metadata: Option<Map<String, Json>>,
}

/// Aggregated traffic for one port, or for events without a port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStats {
    pub port_id: Option<String>,
    pub port_name: Option<String>,
    pub total_clicks: f64,
    #[serde(rename = "totalDataTransferMB")]
    pub total_data_transfer_mb: f64,
    pub click_count: i64,
    pub data_transfer_count: i64,
    pub last_activity: Option<String>,
}

impl TrafficStats {
    /// Read the five aggregate columns starting at `offset`.
    fn from_aggregates(
        row: &Row<'_>,
        offset: usize,
        port_id: Option<String>,
    ) -> rusqlite::Result<Self> {
        Ok(Self {
            port_id,
            port_name: None,
            total_clicks: row.get(offset)?,
            total_data_transfer_mb: row.get(offset + 1)?,
            click_count: row.get(offset + 2)?,
            data_transfer_count: row.get(offset + 3)?,
            last_activity: row.get(offset + 4)?,
        })
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Traffic queries, obtained from [`Store::traffic`].
#[derive(Debug, Clone, Copy)]
pub struct Traffic<'a> {
    store: &'a Store,
}

impl Store {
    /// Access traffic log queries.
    #[must_use]
    pub fn traffic(&self) -> Traffic<'_> {
        Traffic { store: self }
    }
}

fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<TrafficLog>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM traffic_logs WHERE id = ?1"),
        params![id],
        TrafficLog::from_row,
    )
    .optional()
}

fn port_name(conn: &Connection, port_id: &str) -> rusqlite::Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT name FROM ports WHERE id = ?1",
            params![port_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten())
}

fn with_timestamp(metadata: Option<Map<String, Json>>) -> Map<String, Json> {
    let mut metadata = metadata.unwrap_or_default();
    metadata.insert("timestamp".into(), Json::String(clock::now()));
    metadata
}

impl Traffic<'_> {
    /// Store an event under a freshly generated `traffic-…` id.
    pub fn record(&self, new: &NewTrafficLog) -> Result<TrafficLog> {
        let id = clock::generate_id("traffic");
        let metadata = new
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO traffic_logs (id, port_id, event_type, amount, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    new.port_id.as_deref().filter(|p| !p.is_empty()),
                    new.event_type,
                    new.amount,
                    metadata,
                    clock::now(),
                ],
            )?;
            Ok(find(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    /// Record a single click; `timestamp` is added to the metadata.
    pub fn record_click(
        &self,
        port_id: Option<&str>,
        metadata: Option<Map<String, Json>>,
    ) -> Result<TrafficLog> {
        self.record(&NewTrafficLog {
            port_id: port_id.map(str::to_string),
            event_type: EventType::Click,
            amount: 1.0,
            metadata: Some(with_timestamp(metadata)),
        })
    }

    /// Record a response of `size_in_bytes`; `sizeInBytes` and `timestamp`
    /// are added to the metadata.
    pub fn record_transfer(
        &self,
        port_id: Option<&str>,
        size_in_bytes: u64,
        metadata: Option<Map<String, Json>>,
    ) -> Result<TrafficLog> {
        let mut metadata = metadata.unwrap_or_default();
        metadata.insert("sizeInBytes".into(), Json::from(size_in_bytes));
        self.record(&NewTrafficLog {
            port_id: port_id.map(str::to_string),
            event_type: EventType::DataTransfer,
            amount: bytes_to_mb(size_in_bytes),
            metadata: Some(with_timestamp(Some(metadata))),
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<TrafficLog>> {
        self.store.with_conn(|conn| Ok(find(conn, id)?))
    }

    /// Newest events first, optionally capped at `limit`.
    pub fn list(&self, limit: Option<u32>) -> Result<Vec<TrafficLog>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM traffic_logs ORDER BY created_at DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![sql_limit(limit)], TrafficLog::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Newest events for one port first, optionally capped at `limit`.
    pub fn by_port(&self, port_id: &str, limit: Option<u32>) -> Result<Vec<TrafficLog>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM traffic_logs WHERE port_id = ?1
                 ORDER BY created_at DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![port_id, sql_limit(limit)], TrafficLog::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Totals for one port, or for port-less events when `port_id` is `None`.
    pub fn stats_for(&self, port_id: Option<&str>) -> Result<TrafficStats> {
        self.store.with_conn(|conn| {
            let stats = match port_id {
                Some(port_id) => {
                    let mut stats = conn.query_row(
                        &format!("SELECT {AGGREGATES} FROM traffic_logs WHERE port_id = ?1"),
                        params![port_id],
                        |row| TrafficStats::from_aggregates(row, 0, Some(port_id.to_string())),
                    )?;
                    stats.port_name = port_name(conn, port_id)?;
                    stats
                }
                None => conn.query_row(
                    &format!("SELECT {AGGREGATES} FROM traffic_logs WHERE port_id IS NULL"),
                    [],
                    |row| TrafficStats::from_aggregates(row, 0, None),
                )?,
            };
            Ok(stats)
        })
    }

    /// Totals grouped by port, most recently active first.
    pub fn all_stats(&self) -> Result<Vec<TrafficStats>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT port_id, {AGGREGATES} AS last_activity FROM traffic_logs
                 GROUP BY port_id ORDER BY last_activity DESC"
            ))?;
            let mut rows = stmt
                .query_map([], |row| {
                    let port_id: Option<String> = row.get(0)?;
                    TrafficStats::from_aggregates(row, 1, port_id)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for stats in &mut rows {
                if let Some(port_id) = &stats.port_id {
                    stats.port_name = port_name(conn, port_id)?;
                }
            }
            Ok(rows)
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM traffic_logs WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }

    /// Remove every event of a port. Returns whether any existed.
    pub fn delete_by_port(&self, port_id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM traffic_logs WHERE port_id = ?1",
                params![port_id],
            )?;
            Ok(changed > 0)
        })
    }
}

/// SQLite treats a negative `LIMIT` as unbounded.
fn sql_limit(limit: Option<u32>) -> i64 {
    limit.map_or(-1, i64::from)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{NewPort, ServerType};
    use serde_json::json;

    fn store_with_port() -> Store {
        let store = Store::in_memory().unwrap();
        store
            .ports()
            .create(&NewPort {
                id: "web".into(),
                port_number: 5145,
                server_type: ServerType::Frontend,
                name: Some("portfolio".into()),
                description: None,
            })
            .unwrap();
        store
    }

    fn set_created_at(store: &Store, id: &str, created_at: &str) {
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE traffic_logs SET created_at = ?1 WHERE id = ?2",
                    params![created_at, id],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn megabytes_round_to_two_decimals() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1_048_576), 1.0);
        assert_eq!(bytes_to_mb(1_572_864), 1.5);
        assert_eq!(bytes_to_mb(1024), 0.0);
        assert_eq!(bytes_to_mb(10_486), 0.01);
    }

    #[test]
    fn click_gets_id_amount_and_timestamp() {
        let store = store_with_port();
        let mut metadata = Map::new();
        metadata.insert("url".into(), json!("/projects/x"));

        let log = store.traffic().record_click(Some("web"), Some(metadata)).unwrap();
        assert!(log.id.starts_with("traffic-"));
        assert_eq!(log.event_type, EventType::Click);
        assert_eq!(log.amount, 1.0);
        assert_eq!(log.port_id.as_deref(), Some("web"));
        assert_eq!(log.metadata["url"], "/projects/x");
        assert!(log.metadata["timestamp"].is_string());
    }

    #[test]
    fn transfer_records_size() {
        let store = Store::in_memory().unwrap();
        let log = store.traffic().record_transfer(None, 2_097_152, None).unwrap();
        assert_eq!(log.event_type, EventType::DataTransfer);
        assert_eq!(log.amount, 2.0);
        assert_eq!(log.port_id, None);
        assert_eq!(log.metadata["sizeInBytes"], 2_097_152);
    }

    #[test]
    fn unknown_port_violates_foreign_key() {
        let store = Store::in_memory().unwrap();
        let err = store.traffic().record_click(Some("ghost"), None).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn invalid_stored_metadata_reads_as_null() {
        let store = Store::in_memory().unwrap();
        let log = store.traffic().record_click(None, None).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE traffic_logs SET metadata = '{not json' WHERE id = ?1",
                    params![log.id],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.traffic().get(&log.id).unwrap().unwrap().metadata, Json::Null);
    }

    #[test]
    fn lists_are_newest_first_and_limited() {
        let store = store_with_port();
        let a = store.traffic().record_click(Some("web"), None).unwrap();
        let b = store.traffic().record_click(Some("web"), None).unwrap();
        let c = store.traffic().record_click(None, None).unwrap();
        set_created_at(&store, &a.id, "2024-01-01T00:00:00.000Z");
        set_created_at(&store, &b.id, "2024-01-03T00:00:00.000Z");
        set_created_at(&store, &c.id, "2024-01-02T00:00:00.000Z");

        let ids: Vec<String> = store
            .traffic()
            .list(None)
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![b.id.clone(), c.id.clone(), a.id.clone()]);

        assert_eq!(store.traffic().list(Some(1)).unwrap().len(), 1);
        let by_port = store.traffic().by_port("web", None).unwrap();
        assert_eq!(by_port.len(), 2);
        assert_eq!(by_port[0].id, b.id);
    }

    #[test]
    fn stats_for_a_port_include_its_name() {
        let store = store_with_port();
        store.traffic().record_click(Some("web"), None).unwrap();
        store.traffic().record_click(Some("web"), None).unwrap();
        store
            .traffic()
            .record_transfer(Some("web"), 1_048_576, None)
            .unwrap();

        let stats = store.traffic().stats_for(Some("web")).unwrap();
        assert_eq!(stats.port_name.as_deref(), Some("portfolio"));
        assert_eq!(stats.total_clicks, 2.0);
        assert_eq!(stats.total_data_transfer_mb, 1.0);
        assert_eq!(stats.click_count, 2);
        assert_eq!(stats.data_transfer_count, 1);
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn stats_for_unused_port_are_zero() {
        let store = store_with_port();
        let stats = store.traffic().stats_for(None).unwrap();
        assert_eq!(stats.click_count, 0);
        assert_eq!(stats.total_clicks, 0.0);
        assert_eq!(stats.last_activity, None);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalDataTransferMB"], 0.0);
        assert_eq!(json["portId"], Json::Null);
    }

    #[test]
    fn grouped_stats_are_most_recent_first() {
        let store = store_with_port();
        let web = store.traffic().record_click(Some("web"), None).unwrap();
        let none = store.traffic().record_click(None, None).unwrap();
        set_created_at(&store, &web.id, "2024-01-01T00:00:00.000Z");
        set_created_at(&store, &none.id, "2024-02-01T00:00:00.000Z");

        let stats = store.traffic().all_stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].port_id, None);
        assert_eq!(stats[1].port_id.as_deref(), Some("web"));
        assert_eq!(stats[1].port_name.as_deref(), Some("portfolio"));
    }

    #[test]
    fn delete_single_and_by_port() {
        let store = store_with_port();
        let log = store.traffic().record_click(Some("web"), None).unwrap();
        store.traffic().record_click(Some("web"), None).unwrap();

        assert!(store.traffic().delete(&log.id).unwrap());
        assert!(!store.traffic().delete(&log.id).unwrap());
        assert!(store.traffic().delete_by_port("web").unwrap());
        assert_eq!(store.counts().unwrap().traffic_logs, 0);
    }
}

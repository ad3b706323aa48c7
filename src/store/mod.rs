//! SQLite snapshot storage.
//!
//! Persists measurements to a local SQLite database with two tables:
//! - database_size_logs: one row per monitoring run and database
//! - database_table_size_logs: one row per table, cascading from its parent
//!
//! Timestamps are unix milliseconds. Ordering within a database is
//! `(created_at, id)`, so two runs in the same millisecond still have a
//! well-defined predecessor.

pub mod model;
mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::collect::measurement::Driver;
use crate::error::{Error, Result};
use crate::growth::{SizeGrowth, TableGrowth};
use crate::predict::Prediction;
use crate::util::clamp_to_i64;
use model::{DatabaseSizeSnapshot, LargestTable, TableHistoryEntry, TableSizeSnapshot};

/// Temporal lookups the ingestion pipeline depends on.
pub trait SnapshotRepository {
    /// Most recent snapshot of `database` created strictly before `before`.
    fn find_latest_before(&self, database: &str, before: DateTime<Utc>) -> Result<Option<DatabaseSizeSnapshot>>;

    /// Up to `limit` most recent snapshots of `database`, newest first.
    fn find_window(&self, database: &str, limit: usize) -> Result<Vec<DatabaseSizeSnapshot>>;

    fn table_snapshots(&self, snapshot_id: i64) -> Result<Vec<TableSizeSnapshot>>;

    /// Insert a parent snapshot, ignoring `snapshot.id`. Returns the new id.
    fn insert_snapshot(&mut self, snapshot: &DatabaseSizeSnapshot) -> Result<i64>;

    /// Insert all table snapshots of one parent atomically.
    fn insert_table_snapshots(&mut self, snapshot_id: i64, tables: &[TableSizeSnapshot]) -> Result<()>;

    /// Whether another snapshot of `database` created after `since` reached
    /// `threshold` percent usage.
    fn usage_reached_since(&self, database: &str, threshold: f64, since: DateTime<Utc>, exclude_id: i64) -> Result<bool>;

    /// Whether another snapshot of `database` created after `since` was
    /// predicted to be full within `days`.
    fn full_within_since(&self, database: &str, days: u32, since: DateTime<Utc>, exclude_id: i64) -> Result<bool>;

    fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Delete snapshots created before `cutoff`; table snapshots cascade.
    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Get the default store path (~/.local/share/sizelog/sizelog.db or platform equivalent)
pub fn default_path() -> Result<PathBuf> {
    let data_dir = directories::ProjectDirs::from("", "", "sizelog")
        .ok_or(Error::NoProjectDir("data"))?
        .data_dir()
        .to_path_buf();

    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join("sizelog.db"))
}

/// Filters for listing snapshots. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery<'a> {
    pub database: Option<&'a str>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

const SNAPSHOT_COLUMNS: &str = "id, database_name, driver, total_size_bytes, total_size_mb, total_size_gb,
     max_size_bytes, max_size_mb, max_size_gb, usage_percentage, table_count, total_rows,
     growth_bytes, growth_mb, growth_percentage, days_until_full, estimated_full_date,
     largest_tables, notes, created_at, updated_at";

const TABLE_COLUMNS: &str = "t.id, t.database_size_log_id, t.table_name, t.size_bytes, t.size_mb,
     t.data_size_mb, t.index_size_mb, t.row_count, t.growth_bytes, t.growth_mb,
     t.growth_percentage, t.row_growth, t.row_growth_percentage, t.created_at, t.updated_at";

/// Database handle. Open once per command, reuse across all operations.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_default() -> Result<Self> {
        Self::open(&default_path()?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;
        Ok(Store { conn })
    }

    /// List snapshots, newest first
    pub fn list_snapshots(&self, query: &SnapshotQuery<'_>) -> Result<Vec<DatabaseSizeSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM database_size_logs
             WHERE (?1 IS NULL OR database_name = ?1)
               AND (?2 IS NULL OR created_at >= ?2)
               AND (?3 IS NULL OR created_at <= ?3)
             ORDER BY created_at DESC, id DESC
             LIMIT ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let limit = query.limit.map(|l| clamp_to_i64(l as u64)).unwrap_or(-1);
        let snapshots = stmt
            .query_map(
                params![
                    query.database,
                    query.since.map(|t| t.timestamp_millis()),
                    query.until.map(|t| t.timestamp_millis()),
                    limit
                ],
                snapshot_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(snapshots)
    }

    /// Get a specific snapshot by ID
    pub fn get_snapshot(&self, id: i64) -> Result<Option<DatabaseSizeSnapshot>> {
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM database_size_logs WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], snapshot_from_row).optional()?)
    }

    /// Most recent snapshot, of one database or of any
    pub fn latest_snapshot(&self, database: Option<&str>) -> Result<Option<DatabaseSizeSnapshot>> {
        let query = SnapshotQuery {
            database,
            limit: Some(1),
            ..SnapshotQuery::default()
        };
        Ok(self.list_snapshots(&query)?.into_iter().next())
    }

    /// Tables of a snapshot with known growth, fastest growing first
    pub fn fastest_growing_tables(&self, snapshot_id: i64, limit: usize) -> Result<Vec<TableSizeSnapshot>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM database_table_size_logs t
             WHERE t.database_size_log_id = ?1 AND t.growth_percentage IS NOT NULL
             ORDER BY t.growth_percentage DESC, t.table_name
             LIMIT ?2"
        );
        self.query_tables(&sql, snapshot_id, limit)
    }

    /// Tables of a snapshot, largest first
    pub fn largest_tables(&self, snapshot_id: i64, limit: usize) -> Result<Vec<TableSizeSnapshot>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM database_table_size_logs t
             WHERE t.database_size_log_id = ?1
             ORDER BY t.size_bytes DESC, t.row_count DESC, t.table_name
             LIMIT ?2"
        );
        self.query_tables(&sql, snapshot_id, limit)
    }

    fn query_tables(&self, sql: &str, snapshot_id: i64, limit: usize) -> Result<Vec<TableSizeSnapshot>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tables = stmt
            .query_map(params![snapshot_id, clamp_to_i64(limit as u64)], table_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    /// Snapshots of one table across runs of a database, newest first
    pub fn table_history(&self, database: &str, table_name: &str, limit: usize) -> Result<Vec<TableHistoryEntry>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS}, p.database_name
             FROM database_table_size_logs t
             JOIN database_size_logs p ON p.id = t.database_size_log_id
             WHERE t.table_name = ?1 AND p.database_name = ?2
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![table_name, database, clamp_to_i64(limit as u64)], |row| {
                Ok(TableHistoryEntry {
                    table: table_from_row(row)?,
                    database_name: row.get(15)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Delete one snapshot and its tables. Returns whether it existed.
    pub fn delete_snapshot(&mut self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM database_size_logs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl SnapshotRepository for Store {
    fn find_latest_before(&self, database: &str, before: DateTime<Utc>) -> Result<Option<DatabaseSizeSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM database_size_logs
             WHERE database_name = ?1 AND created_at < ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![database, before.timestamp_millis()], snapshot_from_row)
            .optional()?)
    }

    fn find_window(&self, database: &str, limit: usize) -> Result<Vec<DatabaseSizeSnapshot>> {
        self.list_snapshots(&SnapshotQuery {
            database: Some(database),
            limit: Some(limit),
            ..SnapshotQuery::default()
        })
    }

    fn table_snapshots(&self, snapshot_id: i64) -> Result<Vec<TableSizeSnapshot>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM database_table_size_logs t
             WHERE t.database_size_log_id = ?1
             ORDER BY t.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tables = stmt
            .query_map(params![snapshot_id], table_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    fn insert_snapshot(&mut self, s: &DatabaseSizeSnapshot) -> Result<i64> {
        let largest_tables = serde_json::to_string(&s.largest_tables)?;

        self.conn.execute(
            "INSERT INTO database_size_logs (
                database_name, driver, total_size_bytes, total_size_mb, total_size_gb,
                max_size_bytes, max_size_mb, max_size_gb, usage_percentage, table_count, total_rows,
                growth_bytes, growth_mb, growth_percentage, days_until_full, estimated_full_date,
                largest_tables, notes, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                s.database_name,
                s.driver.as_str(),
                clamp_to_i64(s.total_size_bytes),
                s.total_size_mb,
                s.total_size_gb,
                s.max_size_bytes.map(clamp_to_i64),
                s.max_size_mb,
                s.max_size_gb,
                s.usage_percentage,
                s.table_count,
                clamp_to_i64(s.total_rows),
                s.growth.map(|g| g.bytes),
                s.growth.map(|g| g.mb),
                s.growth.and_then(|g| g.percentage),
                s.prediction.map(|p| p.days_until_full),
                s.prediction.map(|p| p.estimated_full_date.timestamp_millis()),
                largest_tables,
                s.notes.as_deref(),
                s.created_at.timestamp_millis(),
                s.updated_at.timestamp_millis(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn insert_table_snapshots(&mut self, snapshot_id: i64, tables: &[TableSizeSnapshot]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let mut stmt = tx.prepare_cached(
            "INSERT INTO database_table_size_logs (
                database_size_log_id, table_name, size_bytes, size_mb, data_size_mb, index_size_mb,
                row_count, growth_bytes, growth_mb, growth_percentage, row_growth, row_growth_percentage,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?;

        for t in tables {
            stmt.execute(params![
                snapshot_id,
                t.table_name,
                clamp_to_i64(t.size_bytes),
                t.size_mb,
                t.data_size_mb,
                t.index_size_mb,
                clamp_to_i64(t.row_count),
                t.growth.map(|g| g.size.bytes),
                t.growth.map(|g| g.size.mb),
                t.growth.and_then(|g| g.size.percentage),
                t.growth.map(|g| g.rows),
                t.growth.and_then(|g| g.rows_percentage),
                t.created_at.timestamp_millis(),
                t.updated_at.timestamp_millis(),
            ])?;
        }

        drop(stmt);
        tx.commit()?;

        Ok(())
    }

    fn usage_reached_since(&self, database: &str, threshold: f64, since: DateTime<Utc>, exclude_id: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM database_size_logs
                WHERE database_name = ?1 AND usage_percentage >= ?2 AND created_at > ?3 AND id != ?4
             )",
            params![database, threshold, since.timestamp_millis(), exclude_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn full_within_since(&self, database: &str, days: u32, since: DateTime<Utc>, exclude_id: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM database_size_logs
                WHERE database_name = ?1 AND days_until_full IS NOT NULL AND days_until_full <= ?2
                  AND created_at > ?3 AND id != ?4
             )",
            params![database, days, since.timestamp_millis(), exclude_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM database_size_logs WHERE created_at < ?1",
            params![cutoff.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM database_size_logs WHERE created_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp out of range: {millis}")))
}

fn unsigned_at(row: &Row, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn snapshot_from_row(row: &Row) -> rusqlite::Result<DatabaseSizeSnapshot> {
    let driver: String = row.get(2)?;

    let growth = row.get::<_, Option<i64>>(12)?.map(|bytes| -> rusqlite::Result<SizeGrowth> {
        Ok(SizeGrowth {
            bytes,
            mb: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
            percentage: row.get(14)?,
        })
    });

    let days_until_full: Option<i64> = row.get(15)?;
    let full_date: Option<i64> = row.get(16)?;
    let prediction = match (days_until_full, full_date) {
        (Some(days), Some(millis)) => Some(Prediction {
            days_until_full: u32::try_from(days.max(0)).unwrap_or(u32::MAX),
            estimated_full_date: DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| conversion_error(16, Type::Integer, format!("timestamp out of range: {millis}")))?,
        }),
        _ => None,
    };

    let largest_tables = match row.get::<_, Option<String>>(17)? {
        Some(json) => serde_json::from_str::<Vec<LargestTable>>(&json)
            .map_err(|e| conversion_error(17, Type::Text, e.to_string()))?,
        None => Vec::new(),
    };

    Ok(DatabaseSizeSnapshot {
        id: row.get(0)?,
        database_name: row.get(1)?,
        driver: Driver::parse(&driver),
        total_size_bytes: unsigned_at(row, 3)?,
        total_size_mb: row.get(4)?,
        total_size_gb: row.get(5)?,
        max_size_bytes: row.get::<_, Option<i64>>(6)?.map(|m| m.max(0) as u64),
        max_size_mb: row.get(7)?,
        max_size_gb: row.get(8)?,
        usage_percentage: row.get(9)?,
        table_count: row.get::<_, i64>(10)?.clamp(0, u32::MAX as i64) as u32,
        total_rows: unsigned_at(row, 11)?,
        growth: growth.transpose()?,
        prediction,
        largest_tables,
        notes: row.get(18)?,
        created_at: timestamp_at(row, 19)?,
        updated_at: timestamp_at(row, 20)?,
    })
}

fn table_from_row(row: &Row) -> rusqlite::Result<TableSizeSnapshot> {
    let growth = match row.get::<_, Option<i64>>(8)? {
        Some(bytes) => Some(TableGrowth {
            size: SizeGrowth {
                bytes,
                mb: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
                percentage: row.get(10)?,
            },
            rows: row.get::<_, Option<i64>>(11)?.unwrap_or(0),
            rows_percentage: row.get(12)?,
        }),
        None => None,
    };

    Ok(TableSizeSnapshot {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        table_name: row.get(2)?,
        size_bytes: unsigned_at(row, 3)?,
        size_mb: row.get(4)?,
        data_size_mb: row.get(5)?,
        index_size_mb: row.get(6)?,
        row_count: unsigned_at(row, 7)?,
        growth,
        created_at: timestamp_at(row, 13)?,
        updated_at: timestamp_at(row, 14)?,
    })
}

//! Measures a SQLite database file directly.
//!
//! SQLite has no per-table byte accounting without the dbstat extension,
//! so tables only carry row counts. Capacity is the filesystem holding the
//! file unless a fixed maximum is configured.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use super::measurement::{Driver, Measurement, TableMeasurement};
use super::Collector;
use crate::error::{Error, Result};
use crate::util::round_to;

pub struct SqliteCollector {
    path: PathBuf,
    max_size_bytes: Option<u64>,
}

impl SqliteCollector {
    pub fn new(path: impl Into<PathBuf>, max_size_bytes: Option<u64>) -> Self {
        SqliteCollector {
            path: path.into(),
            max_size_bytes,
        }
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Collect {
            driver: self.name().to_string(),
            message: message.into(),
        }
    }

    fn table_rows(&self, conn: &Connection) -> Result<Vec<TableMeasurement>> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| self.fail(format!("cannot list tables: {e}")))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| self.fail(format!("cannot list tables: {e}")))?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let sql = format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\""));
            let rows: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| self.fail(format!("cannot count rows of {name}: {e}")))?;
            tables.push(TableMeasurement::rows_only(name, rows.max(0) as u64));
        }

        Ok(tables)
    }
}

impl Collector for SqliteCollector {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn collect(&self) -> Result<Measurement> {
        let metadata = std::fs::metadata(&self.path)
            .map_err(|e| self.fail(format!("cannot stat {}: {e}", self.path.display())))?;

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| self.fail(format!("cannot open {}: {e}", self.path.display())))?;

        let tables = self.table_rows(&conn)?;
        let size_bytes = metadata.len();

        let database = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string());

        let mut measurement = Measurement::new(Driver::Sqlite, database, size_bytes).with_tables(tables);

        if let Some(max) = self.max_size_bytes {
            // usage is derived from the database size during normalization
            measurement.max_size_bytes = Some(max);
        } else if let Some(disk) = disk_capacity(
            self.path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new(".")),
        ) {
            measurement = measurement.with_capacity(disk.total_bytes, Some(disk.usage_percentage()));
        }

        Ok(measurement)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiskCapacity {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskCapacity {
    pub fn usage_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        round_to(used as f64 / self.total_bytes as f64 * 100.0, 2)
    }
}

// NB: allow() because the block count type is u32 on macOS.
#[cfg(unix)]
#[allow(clippy::useless_conversion, clippy::unnecessary_cast)]
pub fn disk_capacity(dir: &Path) -> Option<DiskCapacity> {
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let stat = nix::sys::statvfs::statvfs(dir).ok()?;
    let fragment = stat.fragment_size() as u64;
    Some(DiskCapacity {
        total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
        available_bytes: u64::from(stat.blocks_available()).saturating_mul(fragment),
    })
}

#[cfg(not(unix))]
pub fn disk_capacity(_dir: &Path) -> Option<DiskCapacity> {
    None
}

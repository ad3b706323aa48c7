use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::model::LargestTable;
use crate::util::{bytes_to_gb, bytes_to_mb, round_to};

/// Number of tables denormalized onto each snapshot.
pub const LARGEST_TABLES: usize = 5;

/// Engine that produced a measurement. Unknown or missing drivers are `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Mariadb,
    Pgsql,
    Sqlite,
    #[default]
    #[serde(other)]
    Other,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Mariadb => "mariadb",
            Driver::Pgsql => "pgsql",
            Driver::Sqlite => "sqlite",
            Driver::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "mysql" => Driver::Mysql,
            "mariadb" => Driver::Mariadb,
            "pgsql" | "postgres" | "postgresql" => Driver::Pgsql,
            "sqlite" => Driver::Sqlite,
            _ => Driver::Other,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement of a database as produced by a collector.
///
/// This is the wire contract shared with external measuring tools: engines
/// without per-table byte metrics (SQLite, generic) only fill `name` and
/// `rows` for their tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub total_size_mb: f64,
    #[serde(default)]
    pub total_size_gb: f64,
    #[serde(default)]
    pub max_size_bytes: Option<u64>,
    #[serde(default)]
    pub max_size_mb: Option<f64>,
    #[serde(default)]
    pub max_size_gb: Option<f64>,
    #[serde(default)]
    pub usage_percentage: Option<f64>,
    #[serde(default)]
    pub tables: Vec<TableMeasurement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeasurement {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub size_mb: f64,
    #[serde(default)]
    pub rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_size_mb: Option<f64>,
}

impl TableMeasurement {
    pub fn new(name: impl Into<String>, size_bytes: u64, rows: u64) -> Self {
        TableMeasurement {
            name: name.into(),
            size_bytes,
            size_mb: bytes_to_mb(size_bytes),
            rows,
            data_size_mb: None,
            index_size_mb: None,
        }
    }

    pub fn rows_only(name: impl Into<String>, rows: u64) -> Self {
        TableMeasurement::new(name, 0, rows)
    }

    fn has_size(&self) -> bool {
        self.size_bytes > 0 || self.size_mb > 0.0
    }
}

impl Measurement {
    pub fn new(driver: Driver, database: impl Into<String>, total_size_bytes: u64) -> Self {
        Measurement {
            driver,
            database: database.into(),
            total_size_bytes,
            total_size_mb: bytes_to_mb(total_size_bytes),
            total_size_gb: bytes_to_gb(total_size_bytes),
            max_size_bytes: None,
            max_size_mb: None,
            max_size_gb: None,
            usage_percentage: None,
            tables: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, max_size_bytes: u64, usage_percentage: Option<f64>) -> Self {
        self.max_size_bytes = Some(max_size_bytes);
        self.max_size_mb = Some(bytes_to_mb(max_size_bytes));
        self.max_size_gb = Some(bytes_to_gb(max_size_bytes));
        self.usage_percentage = usage_percentage;
        self
    }

    pub fn with_tables(mut self, tables: Vec<TableMeasurement>) -> Self {
        self.tables = tables;
        self
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().fold(0u64, |sum, t| sum.saturating_add(t.rows))
    }

    /// Up to five tables by size, then row count, for quick display.
    pub fn largest_tables(&self) -> Vec<LargestTable> {
        let mut tables: Vec<&TableMeasurement> = self.tables.iter().collect();
        tables.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(b.rows.cmp(&a.rows)));

        tables
            .into_iter()
            .take(LARGEST_TABLES)
            .map(|t| LargestTable {
                name: t.name.clone(),
                size_mb: t.has_size().then_some(t.size_mb),
                rows: t.rows,
            })
            .collect()
    }

    /// Fill derived units the collector left out and drop meaningless
    /// capacity. A zero capacity is treated as unknown.
    pub fn normalize(mut self) -> Self {
        if self.total_size_bytes > 0 && self.total_size_mb == 0.0 {
            self.total_size_mb = bytes_to_mb(self.total_size_bytes);
        }
        if self.total_size_bytes > 0 && self.total_size_gb == 0.0 {
            self.total_size_gb = bytes_to_gb(self.total_size_bytes);
        }

        match self.max_size_bytes {
            Some(0) | None => {
                self.max_size_bytes = None;
                self.max_size_mb = None;
                self.max_size_gb = None;
                self.usage_percentage = None;
            }
            Some(max) => {
                self.max_size_mb.get_or_insert_with(|| bytes_to_mb(max));
                self.max_size_gb.get_or_insert_with(|| bytes_to_gb(max));
                if self.usage_percentage.is_none() {
                    let usage = self.total_size_bytes as f64 / max as f64 * 100.0;
                    self.usage_percentage = Some(round_to(usage, 2));
                }
            }
        }

        for table in &mut self.tables {
            if table.size_bytes > 0 && table.size_mb == 0.0 {
                table.size_mb = bytes_to_mb(table.size_bytes);
            }
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::Measurement("database name is empty".to_string()));
        }

        for (field, value) in [
            ("total_size_mb", Some(self.total_size_mb)),
            ("total_size_gb", Some(self.total_size_gb)),
            ("usage_percentage", self.usage_percentage),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::Measurement(format!("{field} must be a non-negative number, got {v}")));
                }
            }
        }

        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err(Error::Measurement("table with empty name".to_string()));
            }
            if !table.size_mb.is_finite() || table.size_mb < 0.0 {
                return Err(Error::Measurement(format!(
                    "table {} has invalid size_mb {}",
                    table.name, table.size_mb
                )));
            }
        }

        Ok(())
    }
}

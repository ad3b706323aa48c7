//! Persisted snapshot records.
//!
//! One `DatabaseSizeSnapshot` per monitoring run and database, with one
//! `TableSizeSnapshot` per table observed in that run. Growth and prediction
//! are grouped into optional sub-records: `None` means "not computable yet",
//! never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collect::measurement::Driver;
use crate::growth::{SizeGrowth, TableGrowth};
use crate::predict::Prediction;

/// Denormalized copy of one of the largest tables at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargestTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSizeSnapshot {
    pub id: i64,
    pub database_name: String,
    pub driver: Driver,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub total_size_gb: f64,
    pub max_size_bytes: Option<u64>,
    pub max_size_mb: Option<f64>,
    pub max_size_gb: Option<f64>,
    pub usage_percentage: Option<f64>,
    pub table_count: u32,
    pub total_rows: u64,
    pub growth: Option<SizeGrowth>,
    pub prediction: Option<Prediction>,
    pub largest_tables: Vec<LargestTable>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSizeSnapshot {
    pub id: i64,
    pub snapshot_id: i64,
    pub table_name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub data_size_mb: Option<f64>,
    pub index_size_mb: Option<f64>,
    pub row_count: u64,
    pub growth: Option<TableGrowth>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A table snapshot joined with its parent, for per-table history.
#[derive(Debug, Clone, Serialize)]
pub struct TableHistoryEntry {
    pub database_name: String,
    #[serde(flatten)]
    pub table: TableSizeSnapshot,
}

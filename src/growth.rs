//! Growth between consecutive snapshots of the same entity.
//!
//! An entity is either a database (by name) or a table within it. Growth is
//! only defined against the immediately preceding snapshot; the first
//! snapshot of an entity has none. Percentages are undefined when the
//! previous value was zero and stay `None` in that case.

use serde::{Deserialize, Serialize};

use crate::collect::measurement::TableMeasurement;
use crate::store::model::{DatabaseSizeSnapshot, TableSizeSnapshot};
use crate::util::{clamp_to_i64, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeGrowth {
    pub bytes: i64,
    pub mb: f64,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableGrowth {
    #[serde(flatten)]
    pub size: SizeGrowth,
    pub rows: i64,
    pub rows_percentage: Option<f64>,
}

pub fn size_growth(current_bytes: u64, current_mb: f64, previous_bytes: u64, previous_mb: f64) -> SizeGrowth {
    SizeGrowth {
        bytes: signed_delta(current_bytes, previous_bytes),
        mb: round_to(current_mb - previous_mb, 2),
        percentage: percentage_change(current_bytes, previous_bytes),
    }
}

/// Database-level growth of `current` relative to `previous`.
pub fn compute_growth(
    current: &DatabaseSizeSnapshot,
    previous: Option<&DatabaseSizeSnapshot>,
) -> Option<SizeGrowth> {
    let previous = previous?;
    Some(size_growth(
        current.total_size_bytes,
        current.total_size_mb,
        previous.total_size_bytes,
        previous.total_size_mb,
    ))
}

/// Table-level growth of a fresh measurement relative to the same table in
/// the previous parent snapshot.
pub fn compute_table_growth(
    current: &TableMeasurement,
    previous: Option<&TableSizeSnapshot>,
) -> Option<TableGrowth> {
    let previous = previous?;
    Some(TableGrowth {
        size: size_growth(current.size_bytes, current.size_mb, previous.size_bytes, previous.size_mb),
        rows: signed_delta(current.rows, previous.row_count),
        rows_percentage: percentage_change(current.rows, previous.row_count),
    })
}

fn signed_delta(current: u64, previous: u64) -> i64 {
    clamp_to_i64(current).saturating_sub(clamp_to_i64(previous))
}

fn percentage_change(current: u64, previous: u64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let delta = signed_delta(current, previous) as f64;
    Some(round_to(delta / previous as f64 * 100.0, 4))
}

//! Days-until-full projection.
//!
//! Linear extrapolation of the average daily growth between the current
//! snapshot and the oldest snapshot inside the lookback window. The window
//! is the most recent `lookback` snapshots of the database, not its whole
//! history, so old growth spurts age out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::model::DatabaseSizeSnapshot;

/// Fewer data points than this can never produce a daily rate.
pub const MIN_DATA_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub days_until_full: u32,
    pub estimated_full_date: DateTime<Utc>,
}

/// Project when `current` fills `max_size_bytes`.
///
/// `history` holds earlier snapshots of the same database, newest first,
/// already capped so that `history.len() + 1` is within the lookback count.
/// Returns `None` when there are fewer than `min_data_points` snapshots
/// (never fewer than two), no known capacity, less than one whole day
/// between the current and oldest snapshot, or no positive growth.
pub fn compute_prediction(
    current: &DatabaseSizeSnapshot,
    history: &[DatabaseSizeSnapshot],
    max_size_bytes: Option<u64>,
    min_data_points: usize,
    now: DateTime<Utc>,
) -> Option<Prediction> {
    let max_size_bytes = max_size_bytes.filter(|&max| max > 0)?;
    if history.len() + 1 < min_data_points.max(MIN_DATA_POINTS) {
        return None;
    }

    let oldest = history.last()?;
    let days = (current.created_at - oldest.created_at).num_days().abs();
    if days == 0 {
        return None;
    }

    let total_growth = current.total_size_bytes as f64 - oldest.total_size_bytes as f64;
    let avg_daily_growth = total_growth / days as f64;

    project(current.total_size_bytes, max_size_bytes, avg_daily_growth, now)
}

/// Days until `max_size_bytes` is reached at a constant daily growth rate.
///
/// A database already at or over capacity is full today.
pub fn project(
    current_bytes: u64,
    max_size_bytes: u64,
    avg_daily_growth: f64,
    now: DateTime<Utc>,
) -> Option<Prediction> {
    if avg_daily_growth.is_nan() || avg_daily_growth <= 0.0 {
        return None;
    }

    if current_bytes >= max_size_bytes {
        return Some(Prediction {
            days_until_full: 0,
            estimated_full_date: now,
        });
    }

    let remaining = (max_size_bytes - current_bytes) as f64;
    let days = (remaining / avg_daily_growth).ceil().min(u32::MAX as f64) as u32;
    let estimated_full_date = now
        .checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    Some(Prediction {
        days_until_full: days,
        estimated_full_date,
    })
}

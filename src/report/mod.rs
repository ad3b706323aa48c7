pub mod json;
pub mod table;

use chrono::{DateTime, Utc};

use crate::config::Frequency;
use crate::store::model::DatabaseSizeSnapshot;

/// True when the newest snapshot is older than two monitoring intervals,
/// which usually means the scheduler stopped running `monitor`.
pub fn is_stale(latest: &DatabaseSizeSnapshot, frequency: Frequency, now: DateTime<Utc>) -> bool {
    let Ok(interval) = chrono::Duration::from_std(frequency.interval()) else {
        return false;
    };
    now - latest.created_at > interval * 2
}

pub fn stale_warning(latest: &DatabaseSizeSnapshot) -> String {
    format!(
        "warning: latest snapshot of {} was taken {}, monitoring may not be running",
        latest.database_name,
        crate::util::format_timestamp(latest.created_at)
    )
}

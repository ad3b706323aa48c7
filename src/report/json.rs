//! JSON output for scripting and piping.

use serde::Serialize;

use crate::error::Result;
use crate::store::model::{DatabaseSizeSnapshot, TableSizeSnapshot};

pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// A snapshot together with its fastest growing tables.
#[derive(Serialize)]
pub struct SnapshotReport<'a> {
    #[serde(flatten)]
    pub snapshot: &'a DatabaseSizeSnapshot,
    pub fastest_growing_tables: &'a [TableSizeSnapshot],
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::measurement::Driver;
    use chrono::{TimeZone, Utc};

    #[test]
    fn snapshot_report_flattens_snapshot_fields() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let s = DatabaseSizeSnapshot {
            id: 9,
            database_name: "app".into(),
            driver: Driver::Mariadb,
            total_size_bytes: 1024,
            total_size_mb: 0.0,
            total_size_gb: 0.0,
            max_size_bytes: None,
            max_size_mb: None,
            max_size_gb: None,
            usage_percentage: None,
            table_count: 0,
            total_rows: 0,
            growth: None,
            prediction: None,
            largest_tables: Vec::new(),
            notes: None,
            created_at: at,
            updated_at: at,
        };
        let report = SnapshotReport { snapshot: &s, fastest_growing_tables: &[], stale: true };

        let v: serde_json::Value = serde_json::from_str(&render(&report).unwrap()).unwrap();
        assert_eq!(v["id"], 9);
        assert_eq!(v["driver"], "mariadb");
        assert_eq!(v["stale"], true);
        assert!(v["growth"].is_null());
        assert_eq!(v["fastest_growing_tables"].as_array().unwrap().len(), 0);
    }
}

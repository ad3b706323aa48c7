//! Retention pruning.
//!
//! Deletes snapshots older than the retention window in one statement;
//! table snapshots go with their parent. Rows newer than the cutoff are
//! never touched, so pruning can run next to a monitoring run.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::Result;
use crate::store::SnapshotRepository;

pub fn cutoff(retention_days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Number of snapshots `prune` would delete.
pub fn pending<R: SnapshotRepository>(repo: &R, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
    repo.count_older_than(cutoff(retention_days, now))
}

pub fn prune<R: SnapshotRepository>(repo: &mut R, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = cutoff(retention_days, now);
    let deleted = repo.delete_older_than(cutoff)?;

    if deleted > 0 {
        info!(deleted, retention_days, cutoff = %cutoff, "pruned old snapshots");
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::measurement::Driver;
    use crate::store::model::{DatabaseSizeSnapshot, TableSizeSnapshot};
    use crate::store::{SnapshotQuery, Store};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap()
    }

    fn insert(store: &mut Store, days_ago: i64) -> i64 {
        let at = now() - Duration::days(days_ago);
        let s = DatabaseSizeSnapshot {
            id: 0,
            database_name: "app".into(),
            driver: Driver::Pgsql,
            total_size_bytes: 1,
            total_size_mb: 0.0,
            total_size_gb: 0.0,
            max_size_bytes: None,
            max_size_mb: None,
            max_size_gb: None,
            usage_percentage: None,
            table_count: 1,
            total_rows: 0,
            growth: None,
            prediction: None,
            largest_tables: Vec::new(),
            notes: None,
            created_at: at,
            updated_at: at,
        };
        let id = store.insert_snapshot(&s).unwrap();
        let table = TableSizeSnapshot {
            id: 0,
            snapshot_id: id,
            table_name: "users".into(),
            size_bytes: 1,
            size_mb: 0.0,
            data_size_mb: None,
            index_size_mb: None,
            row_count: 1,
            growth: None,
            created_at: at,
            updated_at: at,
        };
        store.insert_table_snapshots(id, &[table]).unwrap();
        id
    }

    #[test]
    fn deletes_only_rows_past_retention_and_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let old = [insert(&mut store, 120), insert(&mut store, 91)];
        let kept = [insert(&mut store, 89), insert(&mut store, 0)];

        assert_eq!(pending(&store, 90, now()).unwrap(), 2);
        assert_eq!(prune(&mut store, 90, now()).unwrap(), 2);
        assert_eq!(prune(&mut store, 90, now()).unwrap(), 0);

        for id in old {
            assert!(store.get_snapshot(id).unwrap().is_none());
            assert!(store.table_snapshots(id).unwrap().is_empty());
        }
        for id in kept {
            assert!(store.get_snapshot(id).unwrap().is_some());
            assert_eq!(store.table_snapshots(id).unwrap().len(), 1);
        }
        assert_eq!(store.list_snapshots(&SnapshotQuery::default()).unwrap().len(), 2);
    }

    #[test]
    fn empty_store_prunes_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        assert_eq!(prune(&mut store, 1, now()).unwrap(), 0);
    }
}

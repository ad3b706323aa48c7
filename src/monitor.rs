//! One monitoring run: measurement in, stored snapshot out.
//!
//! Only a malformed measurement or a failure to store the parent snapshot
//! aborts the run. Everything after that (table rows, notifications,
//! pruning) degrades to a logged warning and is listed in
//! [`RunReport::degraded`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collect::measurement::Measurement;
use crate::config::Config;
use crate::error::Result;
use crate::growth::{compute_growth, compute_table_growth};
use crate::notify::{DispatchReport, Mailer, Notifier};
use crate::predict::compute_prediction;
use crate::prune;
use crate::store::model::{DatabaseSizeSnapshot, TableSizeSnapshot};
use crate::store::SnapshotRepository;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub snapshot: DatabaseSizeSnapshot,
    pub tables_recorded: usize,
    pub notifications: DispatchReport,
    pub pruned: Option<usize>,
    /// Steps that failed without losing the measurement.
    pub degraded: Vec<String>,
}

pub struct Monitor<'a, R: SnapshotRepository> {
    repo: &'a mut R,
    config: &'a Config,
    mailer: &'a dyn Mailer,
}

impl<'a, R: SnapshotRepository> Monitor<'a, R> {
    pub fn new(repo: &'a mut R, config: &'a Config, mailer: &'a dyn Mailer) -> Self {
        Monitor { repo, config, mailer }
    }

    pub fn record_snapshot(&mut self, measurement: Measurement, now: DateTime<Utc>) -> Result<RunReport> {
        let measurement = measurement.normalize();
        measurement.validate()?;

        let mut degraded = Vec::new();
        let mut snapshot = draft(&measurement, now);

        let previous = match self.repo.find_latest_before(&snapshot.database_name, now) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "previous snapshot lookup failed, growth skipped");
                degraded.push(format!("growth: {e}"));
                None
            }
        };
        snapshot.growth = compute_growth(&snapshot, previous.as_ref());

        let lookback = self.config.prediction.lookback.saturating_sub(1);
        match self.repo.find_window(&snapshot.database_name, lookback) {
            Ok(history) => {
                snapshot.prediction = compute_prediction(
                    &snapshot,
                    &history,
                    snapshot.max_size_bytes,
                    self.config.prediction.min_data_points,
                    now,
                );
            }
            Err(e) => {
                warn!(error = %e, "history lookup failed, prediction skipped");
                degraded.push(format!("prediction: {e}"));
            }
        }

        snapshot.id = self.repo.insert_snapshot(&snapshot)?;
        info!(
            id = snapshot.id,
            database = %snapshot.database_name,
            size_mb = snapshot.total_size_mb,
            "database size logged"
        );

        let tables_recorded = match self.record_tables(&snapshot, previous.as_ref(), &measurement) {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "table sizes not recorded");
                degraded.push(format!("tables: {e}"));
                0
            }
        };

        let notifications = match Notifier::new(self.config).notify(&snapshot, &*self.repo, self.mailer, now) {
            Ok(report) => {
                for (delivery, error) in &report.failed {
                    degraded.push(format!("notification to {}: {error}", delivery.recipient));
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "threshold evaluation failed");
                degraded.push(format!("notifications: {e}"));
                DispatchReport::default()
            }
        };

        let pruned = match prune::prune(&mut *self.repo, self.config.monitoring.retention_days, now) {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "pruning failed, will retry next run");
                degraded.push(format!("prune: {e}"));
                None
            }
        };

        Ok(RunReport {
            snapshot,
            tables_recorded,
            notifications,
            pruned,
            degraded,
        })
    }

    /// Store one row per measured table, with growth against the same table
    /// in the previous snapshot of this database.
    fn record_tables(
        &mut self,
        snapshot: &DatabaseSizeSnapshot,
        previous: Option<&DatabaseSizeSnapshot>,
        measurement: &Measurement,
    ) -> Result<usize> {
        let previous_tables: HashMap<String, TableSizeSnapshot> = match previous {
            Some(prev) => self
                .repo
                .table_snapshots(prev.id)?
                .into_iter()
                .map(|t| (t.table_name.clone(), t))
                .collect(),
            None => HashMap::new(),
        };
        debug!(previous = previous_tables.len(), current = measurement.tables.len(), "table growth");

        let tables: Vec<TableSizeSnapshot> = measurement
            .tables
            .iter()
            .map(|t| TableSizeSnapshot {
                id: 0,
                snapshot_id: snapshot.id,
                table_name: t.name.clone(),
                size_bytes: t.size_bytes,
                size_mb: t.size_mb,
                data_size_mb: t.data_size_mb,
                index_size_mb: t.index_size_mb,
                row_count: t.rows,
                growth: compute_table_growth(t, previous_tables.get(&t.name)),
                created_at: snapshot.created_at,
                updated_at: snapshot.created_at,
            })
            .collect();

        self.repo.insert_table_snapshots(snapshot.id, &tables)?;
        Ok(tables.len())
    }
}

fn draft(m: &Measurement, now: DateTime<Utc>) -> DatabaseSizeSnapshot {
    DatabaseSizeSnapshot {
        id: 0,
        database_name: m.database.clone(),
        driver: m.driver,
        total_size_bytes: m.total_size_bytes,
        total_size_mb: m.total_size_mb,
        total_size_gb: m.total_size_gb,
        max_size_bytes: m.max_size_bytes,
        max_size_mb: m.max_size_mb,
        max_size_gb: m.max_size_gb,
        usage_percentage: m.usage_percentage,
        table_count: u32::try_from(m.tables.len()).unwrap_or(u32::MAX),
        total_rows: m.total_rows(),
        growth: None,
        prediction: None,
        largest_tables: m.largest_tables(),
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::measurement::{Driver, TableMeasurement};
    use crate::error::Error;
    use crate::notify::Notification;
    use crate::store::Store;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    const MB: u64 = 1024 * 1024;

    struct CountingMailer(Cell<usize>);

    impl Mailer for CountingMailer {
        fn deliver(&self, _: &Notification) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 2, 0, 0).unwrap() + Duration::days(n)
    }

    fn measurement(total_mb: u64, tables: Vec<TableMeasurement>) -> Measurement {
        Measurement::new(Driver::Mysql, "shop", total_mb * MB)
            .with_capacity(2000 * MB, None)
            .with_tables(tables)
    }

    #[test]
    fn first_run_has_no_growth_or_prediction() {
        let mut store = Store::open_in_memory().unwrap();
        let config = Config::default();
        let mailer = CountingMailer(Cell::new(0));

        let report = Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(measurement(1000, vec![TableMeasurement::new("orders", 10 * MB, 5)]), day(0))
            .unwrap();

        assert!(report.snapshot.growth.is_none());
        assert!(report.snapshot.prediction.is_none());
        assert_eq!(report.tables_recorded, 1);
        assert!(report.degraded.is_empty());

        let tables = store.table_snapshots(report.snapshot.id).unwrap();
        assert!(tables[0].growth.is_none());
    }

    #[test]
    fn second_run_computes_growth_prediction_and_table_growth() {
        let mut store = Store::open_in_memory().unwrap();
        let config = Config::default();
        let mailer = CountingMailer(Cell::new(0));

        Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(
                measurement(1000, vec![TableMeasurement::new("orders", 10 * MB, 100), TableMeasurement::rows_only("logs", 0)]),
                day(0),
            )
            .unwrap();

        let report = Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(
                measurement(
                    1100,
                    vec![
                        TableMeasurement::new("orders", 15 * MB, 150),
                        TableMeasurement::rows_only("logs", 500),
                        TableMeasurement::new("carts", MB, 1),
                    ],
                ),
                day(10),
            )
            .unwrap();

        let s = store.get_snapshot(report.snapshot.id).unwrap().unwrap();
        let growth = s.growth.unwrap();
        assert_eq!(growth.bytes, (100 * MB) as i64);
        assert_eq!(growth.percentage, Some(10.0));

        let prediction = s.prediction.unwrap();
        assert_eq!(prediction.days_until_full, 90);
        assert_eq!(prediction.estimated_full_date, day(100));

        let tables: HashMap<String, TableSizeSnapshot> = store
            .table_snapshots(s.id)
            .unwrap()
            .into_iter()
            .map(|t| (t.table_name.clone(), t))
            .collect();

        let orders = tables["orders"].growth.unwrap();
        assert_eq!(orders.size.percentage, Some(50.0));
        assert_eq!(orders.rows, 50);

        let logs = tables["logs"].growth.unwrap();
        assert_eq!(logs.rows, 500);
        assert_eq!(logs.rows_percentage, None);

        assert!(tables["carts"].growth.is_none());
    }

    #[test]
    fn table_growth_compares_within_the_same_database() {
        let mut store = Store::open_in_memory().unwrap();
        let config = Config::default();
        let mailer = CountingMailer(Cell::new(0));

        Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(measurement(10, vec![TableMeasurement::new("users", MB, 10)]), day(0))
            .unwrap();

        let mut other = measurement(10, vec![TableMeasurement::new("users", 8 * MB, 80)]);
        other.database = "crm".into();
        Monitor::new(&mut store, &config, &mailer).record_snapshot(other, day(1)).unwrap();

        let report = Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(measurement(10, vec![TableMeasurement::new("users", 2 * MB, 20)]), day(2))
            .unwrap();

        let tables = store.table_snapshots(report.snapshot.id).unwrap();
        let growth = tables[0].growth.unwrap();
        assert_eq!(growth.rows, 10);
        assert_eq!(growth.size.percentage, Some(100.0));
    }

    #[test]
    fn critical_usage_sends_once_then_suppresses() {
        let mut store = Store::open_in_memory().unwrap();
        let mut config = Config::default();
        config.notifications.recipients = vec!["ops@example.com".into()];
        config.prediction.notify_days_before_full.clear();
        let mailer = CountingMailer(Cell::new(0));

        let full = |mb| Measurement::new(Driver::Pgsql, "app", mb * MB).with_capacity(2000 * MB, Some(95.0));

        Monitor::new(&mut store, &config, &mailer).record_snapshot(full(1900), day(0)).unwrap();
        assert_eq!(mailer.0.get(), 1);

        Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(full(1901), day(0) + Duration::hours(6))
            .unwrap();
        assert_eq!(mailer.0.get(), 1);
    }

    #[test]
    fn malformed_measurement_records_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        let config = Config::default();
        let mailer = CountingMailer(Cell::new(0));

        let err = Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(Measurement::new(Driver::Mysql, "", 10), day(0))
            .unwrap_err();

        assert!(matches!(err, Error::Measurement(_)));
        assert!(store.latest_snapshot(None).unwrap().is_none());
    }

    #[test]
    fn run_prunes_expired_snapshots() {
        let mut store = Store::open_in_memory().unwrap();
        let mut config = Config::default();
        config.monitoring.retention_days = 30;
        let mailer = CountingMailer(Cell::new(0));

        Monitor::new(&mut store, &config, &mailer).record_snapshot(measurement(1, vec![]), day(0)).unwrap();
        let report = Monitor::new(&mut store, &config, &mailer)
            .record_snapshot(measurement(2, vec![]), day(45))
            .unwrap();

        assert_eq!(report.pruned, Some(1));
        // growth was computed before the old snapshot expired
        assert!(report.snapshot.growth.is_some());
    }

    /// Store wrapper whose writes after the parent insert and whose
    /// suppression lookup fail.
    struct FailingAfterInsert {
        inner: Store,
    }

    fn unavailable(what: &str) -> Error {
        Error::Io(std::io::Error::other(format!("{what} unavailable")))
    }

    impl SnapshotRepository for FailingAfterInsert {
        fn find_latest_before(&self, database: &str, before: DateTime<Utc>) -> Result<Option<DatabaseSizeSnapshot>> {
            self.inner.find_latest_before(database, before)
        }

        fn find_window(&self, database: &str, limit: usize) -> Result<Vec<DatabaseSizeSnapshot>> {
            self.inner.find_window(database, limit)
        }

        fn table_snapshots(&self, snapshot_id: i64) -> Result<Vec<TableSizeSnapshot>> {
            self.inner.table_snapshots(snapshot_id)
        }

        fn insert_snapshot(&mut self, snapshot: &DatabaseSizeSnapshot) -> Result<i64> {
            self.inner.insert_snapshot(snapshot)
        }

        fn insert_table_snapshots(&mut self, _: i64, _: &[TableSizeSnapshot]) -> Result<()> {
            Err(unavailable("table log"))
        }

        fn usage_reached_since(&self, _: &str, _: f64, _: DateTime<Utc>, _: i64) -> Result<bool> {
            Err(unavailable("usage lookup"))
        }

        fn full_within_since(&self, database: &str, days: u32, since: DateTime<Utc>, exclude_id: i64) -> Result<bool> {
            self.inner.full_within_since(database, days, since, exclude_id)
        }

        fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
            self.inner.count_older_than(cutoff)
        }

        fn delete_older_than(&mut self, _: DateTime<Utc>) -> Result<usize> {
            Err(unavailable("retention delete"))
        }
    }

    #[test]
    fn failures_after_insert_keep_the_snapshot() {
        let mut repo = FailingAfterInsert { inner: Store::open_in_memory().unwrap() };
        let mut config = Config::default();
        config.notifications.recipients = vec!["ops@example.com".into()];
        let mailer = CountingMailer(Cell::new(0));

        let full = Measurement::new(Driver::Mysql, "shop", 1900 * MB)
            .with_capacity(2000 * MB, Some(95.0))
            .with_tables(vec![TableMeasurement::new("orders", MB, 10)]);

        let report = Monitor::new(&mut repo, &config, &mailer).record_snapshot(full, day(0)).unwrap();

        let stored = repo.inner.get_snapshot(report.snapshot.id).unwrap().unwrap();
        assert_eq!(stored.database_name, "shop");
        assert!(repo.inner.table_snapshots(stored.id).unwrap().is_empty());

        assert_eq!(report.tables_recorded, 0);
        assert_eq!(report.pruned, None);
        assert_eq!(mailer.0.get(), 0);

        let steps: Vec<&str> = report
            .degraded
            .iter()
            .map(|d| d.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(steps, vec!["tables", "notifications", "prune"]);
        assert!(report.degraded[0].contains("table log unavailable"));
    }
}

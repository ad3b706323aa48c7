use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use sizelog::collect::json::parse_measurement;
use sizelog::collect::sqlite::SqliteCollector;
use sizelog::collect::{measure, Measurement};
use sizelog::config::Config;
use sizelog::monitor::Monitor;
use sizelog::notify::{LogMailer, SpoolMailer};
use sizelog::report;
use sizelog::store::{SnapshotQuery, Store};

const MB: u64 = 1024 * 1024;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap() + Duration::days(n)
}

fn mysql_measurement(total_mb: u64, orders_rows: u64) -> Measurement {
    parse_measurement(&format!(
        r#"{{
            "driver": "mysql",
            "database": "shop",
            "total_size_bytes": {},
            "max_size_bytes": {},
            "tables": [
                {{"name": "orders", "size_bytes": {}, "rows": {orders_rows}, "data_size_mb": 1.0, "index_size_mb": 0.5}},
                {{"name": "sessions", "size_bytes": {}, "rows": 10}}
            ]
        }}"#,
        total_mb * MB,
        2000 * MB,
        total_mb * MB / 2,
        MB
    ))
    .unwrap()
}

fn config() -> Config {
    let mut config = Config::from_toml(
        r#"
        [monitoring]
        enabled = true
        warning_threshold = 80
        critical_threshold = 90

        [notifications]
        recipients = ["dba@example.com", "oncall@example.com"]
        suppression_window = "24h"

        [prediction]
        notify_days_before_full = []
        "#,
    )
    .unwrap();
    config.validate().unwrap();
    config.monitoring.retention_days = 90;
    config
}

#[test]
fn daily_runs_build_history_with_growth_and_prediction() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store/sizelog.db");
    let config = config();

    {
        let mut store = Store::open(&path).unwrap();
        for (n, mb) in [(0, 1000), (5, 1050), (10, 1100)] {
            Monitor::new(&mut store, &config, &LogMailer)
                .record_snapshot(mysql_measurement(mb, 100 + n as u64), day(n))
                .unwrap();
        }
    }

    // reopen to make sure everything was persisted
    let store = Store::open(&path).unwrap();
    let history = store.list_snapshots(&SnapshotQuery::default()).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].created_at, day(10));

    let latest = &history[0];
    assert_eq!(latest.table_count, 2);
    assert_eq!(latest.largest_tables[0].name, "orders");
    assert_eq!(latest.usage_percentage, Some(55.0));

    let growth = latest.growth.unwrap();
    assert_eq!(growth.mb, 50.0);

    let prediction = latest.prediction.unwrap();
    assert_eq!(prediction.days_until_full, 90);
    assert_eq!(prediction.estimated_full_date, day(100));

    assert!(history[2].growth.is_none());
    assert!(history[2].prediction.is_none());

    let orders = store.table_history("shop", "orders", 10).unwrap();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].table.row_count, 110);
    assert_eq!(orders[0].table.growth.unwrap().rows, 5);
    assert_eq!(orders[0].table.data_size_mb, Some(1.0));

    let rendered = report::table::render_history(&history);
    assert!(rendered.contains("shop"));
}

#[test]
fn alerts_are_spooled_once_per_level_within_window() {
    let dir = TempDir::new().unwrap();
    let spool = SpoolMailer::new(dir.path().join("outbox"));
    let mut store = Store::open(&dir.path().join("sizelog.db")).unwrap();
    let config = config();

    let spooled = || std::fs::read_dir(spool.dir()).unwrap().count();

    // 85%: warning to both recipients
    Monitor::new(&mut store, &config, &spool)
        .record_snapshot(mysql_measurement(1700, 1), day(0))
        .unwrap();
    assert_eq!(spooled(), 2);

    // still 85% a few hours later: suppressed
    let run = Monitor::new(&mut store, &config, &spool)
        .record_snapshot(mysql_measurement(1700, 1), day(0) + Duration::hours(4))
        .unwrap();
    assert!(run.notifications.sent.is_empty());
    assert_eq!(spooled(), 2);

    // 95%: critical is a new level
    Monitor::new(&mut store, &config, &spool)
        .record_snapshot(mysql_measurement(1900, 1), day(0) + Duration::hours(8))
        .unwrap();
    assert_eq!(spooled(), 4);

    // two days later the window has passed
    Monitor::new(&mut store, &config, &spool)
        .record_snapshot(mysql_measurement(1900, 1), day(2))
        .unwrap();
    assert_eq!(spooled(), 6);
}

#[test]
fn retention_prunes_during_monitoring() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(&dir.path().join("sizelog.db")).unwrap();
    let mut config = config();
    config.monitoring.retention_days = 7;

    for n in [0, 3, 6, 9, 12] {
        Monitor::new(&mut store, &config, &LogMailer)
            .record_snapshot(mysql_measurement(100, 1), day(n))
            .unwrap();
    }

    let remaining = store.list_snapshots(&SnapshotQuery::default()).unwrap();
    let days: Vec<DateTime<Utc>> = remaining.iter().map(|s| s.created_at).collect();
    assert_eq!(days, vec![day(12), day(9), day(6)]);
}

#[test]
fn sqlite_database_can_monitor_itself() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app.db");
    {
        let conn = rusqlite::Connection::open(&target).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO users (name) VALUES ('a'), ('b'), ('c');
             CREATE TABLE events (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
    }

    let measurement = measure(&SqliteCollector::new(&target, Some(100 * MB))).unwrap();
    assert_eq!(measurement.database, "app.db");
    assert_eq!(measurement.max_size_bytes, Some(100 * MB));

    let mut store = Store::open(&dir.path().join("sizelog.db")).unwrap();
    let run = Monitor::new(&mut store, &config(), &LogMailer)
        .record_snapshot(measurement, day(0))
        .unwrap();

    assert_eq!(run.tables_recorded, 2);
    assert_eq!(run.snapshot.total_rows, 3);
    assert_eq!(run.snapshot.largest_tables[0].name, "users");
}

#[test]
fn broken_spool_dir_still_records_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    let spool = SpoolMailer::new(blocker.join("outbox"));
    let mut store = Store::open(&dir.path().join("sizelog.db")).unwrap();

    let run = Monitor::new(&mut store, &config(), &spool)
        .record_snapshot(mysql_measurement(1900, 1), day(0))
        .unwrap();

    assert!(store.get_snapshot(run.snapshot.id).unwrap().is_some());
    assert!(run.notifications.sent.is_empty());
    assert_eq!(run.notifications.failed.len(), 2);
    assert_eq!(run.degraded.len(), 2);
    assert!(run.degraded.iter().any(|d| d.starts_with("notification to dba@example.com")));
    assert!(run.degraded.iter().any(|d| d.starts_with("notification to oncall@example.com")));
}

//! Terminal rendering for snapshots and table snapshots.
//!
//! Every function returns a `String` so callers decide where it goes.

use crate::collect::measurement::Measurement;
use crate::growth::SizeGrowth;
use crate::monitor::RunReport;
use crate::store::model::{DatabaseSizeSnapshot, TableHistoryEntry, TableSizeSnapshot};
use crate::util::{format_bytes, format_count, format_signed_bytes, format_timestamp, truncate};

pub fn render_history(snapshots: &[DatabaseSizeSnapshot]) -> String {
    if snapshots.is_empty() {
        return String::from("No snapshots found. Run 'sizelog monitor' to record one.\n");
    }

    let mut output = format!(
        "{:<6} {:<20} {:<20} {:>12} {:>8} {:>14} {:>10}\n",
        "ID", "Date", "Database", "Size (MB)", "Usage", "Growth (MB)", "Full in"
    );
    output.push_str(&"-".repeat(96));
    output.push('\n');

    for s in snapshots {
        output.push_str(&format!(
            "{:<6} {:<20} {:<20} {:>12.2} {:>8} {:>14} {:>10}\n",
            s.id,
            format_timestamp(s.created_at),
            truncate(&s.database_name, 20),
            s.total_size_mb,
            usage(s.usage_percentage),
            s.growth.map(|g| signed_mb(g.mb)).unwrap_or_else(|| "-".into()),
            s.prediction
                .map(|p| format!("{}d", p.days_until_full))
                .unwrap_or_else(|| "-".into()),
        ));
    }

    output
}

/// Full report for one snapshot.
pub fn render_snapshot(snapshot: &DatabaseSizeSnapshot, fastest: &[TableSizeSnapshot]) -> String {
    let s = snapshot;
    let mut output = format!("\nDatabase: {} ({})\n", s.database_name, s.driver);
    output.push_str(&"-".repeat(40));
    output.push('\n');

    output.push_str(&format!("  snapshot:    #{} ({})\n", s.id, format_timestamp(s.created_at)));
    output.push_str(&format!("  size:        {:.2} MB ({:.2} GB)\n", s.total_size_mb, s.total_size_gb));
    if let (Some(max_mb), Some(max_gb)) = (s.max_size_mb, s.max_size_gb) {
        output.push_str(&format!("  capacity:    {max_mb:.2} MB ({max_gb:.2} GB)\n"));
    }
    if let Some(max) = s.max_size_bytes {
        output.push_str(&format!("  free:        {}\n", format_bytes(max.saturating_sub(s.total_size_bytes))));
    }
    output.push_str(&format!("  usage:       {}\n", usage(s.usage_percentage)));
    output.push_str(&format!("  tables:      {}\n", s.table_count));
    output.push_str(&format!("  rows:        {}\n", format_count(s.total_rows)));

    match s.growth {
        Some(growth) => output.push_str(&format!("  growth:      {}\n", describe_growth(&growth))),
        None => output.push_str("  growth:      no previous snapshot\n"),
    }

    match s.prediction {
        Some(p) => output.push_str(&format!(
            "  full in:     {} days (around {})\n",
            p.days_until_full,
            p.estimated_full_date.format("%Y-%m-%d")
        )),
        None => output.push_str("  full in:     not enough data\n"),
    }

    if !s.largest_tables.is_empty() {
        output.push_str("\nLargest tables\n");
        for t in &s.largest_tables {
            let size = t.size_mb.map(|mb| format!("{mb:.2} MB")).unwrap_or_else(|| "N/A".into());
            output.push_str(&format!(
                "  {:30} {:>12} {:>14} rows\n",
                truncate(&t.name, 30),
                size,
                format_count(t.rows)
            ));
        }
    }

    if !fastest.is_empty() {
        output.push_str("\nFastest growing tables\n");
        output.push_str(&render_table_rows(fastest));
    }

    if let Some(notes) = &s.notes {
        output.push_str(&format!("\nnotes: {notes}\n"));
    }

    output
}

pub fn render_tables(tables: &[TableSizeSnapshot]) -> String {
    if tables.is_empty() {
        return String::from("No table sizes recorded for this snapshot.\n");
    }

    let mut output = format!(
        "  {:30} {:>12} {:>14} {:>14} {:>10}\n",
        "Table", "Size (MB)", "Rows", "Growth (MB)", "Growth %"
    );
    output.push_str(&format!("  {}\n", "-".repeat(84)));
    output.push_str(&render_table_rows(tables));
    output
}

fn render_table_rows(tables: &[TableSizeSnapshot]) -> String {
    let mut output = String::new();
    for t in tables {
        let (mb, pct) = match t.growth {
            Some(g) => (
                signed_mb(g.size.mb),
                g.size.percentage.map(|p| format!("{p:+.2}%")).unwrap_or_else(|| "new".into()),
            ),
            None => ("-".into(), "-".into()),
        };
        output.push_str(&format!(
            "  {:30} {:>12.2} {:>14} {:>14} {:>10}\n",
            truncate(&t.table_name, 30),
            t.size_mb,
            format_count(t.row_count),
            mb,
            pct
        ));
    }
    output
}

pub fn render_table_history(table_name: &str, entries: &[TableHistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("No history for table '{table_name}'.\n");
    }

    let mut output = format!("\nHistory of {table_name}\n");
    output.push_str(&format!(
        "  {:<20} {:<20} {:>12} {:>14} {:>14} {:>14}\n",
        "Date", "Database", "Size (MB)", "Rows", "Size +/-", "Rows +/-"
    ));
    output.push_str(&format!("  {}\n", "-".repeat(100)));

    for e in entries {
        let (size, rows) = match e.table.growth {
            Some(g) => (format_signed_bytes(g.size.bytes), format!("{:+}", g.rows)),
            None => ("-".into(), "-".into()),
        };
        output.push_str(&format!(
            "  {:<20} {:<20} {:>12.2} {:>14} {:>14} {:>14}\n",
            format_timestamp(e.table.created_at),
            truncate(&e.database_name, 20),
            e.table.size_mb,
            format_count(e.table.row_count),
            size,
            rows
        ));
    }

    output
}

/// Summary of a measurement that has not been stored.
pub fn render_measurement(m: &Measurement) -> String {
    let mut output = format!("\nDatabase: {} ({})\n", m.database, m.driver);
    output.push_str(&"-".repeat(40));
    output.push('\n');
    output.push_str(&format!("  size:        {:.2} MB ({:.2} GB)\n", m.total_size_mb, m.total_size_gb));
    if let Some(max_mb) = m.max_size_mb {
        output.push_str(&format!("  capacity:    {max_mb:.2} MB\n"));
    }
    output.push_str(&format!("  usage:       {}\n", usage(m.usage_percentage)));
    output.push_str(&format!("  tables:      {}\n", m.tables.len()));
    output.push_str(&format!("  rows:        {}\n", format_count(m.total_rows())));

    let largest = m.largest_tables();
    if !largest.is_empty() {
        output.push_str("\nLargest tables\n");
        for t in largest {
            let size = t.size_mb.map(|mb| format!("{mb:.2} MB")).unwrap_or_else(|| "N/A".into());
            output.push_str(&format!("  {:30} {:>12} {:>14} rows\n", truncate(&t.name, 30), size, format_count(t.rows)));
        }
    }

    output
}

pub fn render_run(report: &RunReport) -> String {
    let mut output = render_snapshot(&report.snapshot, &[]);
    output.push_str(&format!("\nrecorded {} table sizes\n", report.tables_recorded));

    for d in &report.notifications.sent {
        output.push_str(&format!("notified {} ({})\n", d.recipient, d.alert));
    }
    if let Some(pruned) = report.pruned.filter(|&n| n > 0) {
        output.push_str(&format!("pruned {pruned} old snapshots\n"));
    }
    for step in &report.degraded {
        output.push_str(&format!("[degraded] {step}\n"));
    }

    output
}

fn usage(pct: Option<f64>) -> String {
    pct.map(|u| format!("{u:.2}%")).unwrap_or_else(|| "unknown".into())
}

fn signed_mb(mb: f64) -> String {
    format!("{mb:+.2}")
}

fn describe_growth(g: &SizeGrowth) -> String {
    match g.percentage {
        Some(p) => format!("{} MB ({p:+.4}%)", signed_mb(g.mb)),
        None => format!("{} MB", signed_mb(g.mb)),
    }
}

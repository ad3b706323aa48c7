//! Rendering of one alert into a mail-style message.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Alert, AlertLevel};
use crate::store::model::DatabaseSizeSnapshot;
use crate::util::{format_count, format_timestamp};

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub alert: Alert,
    pub database: String,
    pub snapshot_id: i64,
    pub subject: String,
    pub greeting: String,
    pub intro: String,
    pub sections: Vec<Section>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn build(snapshot: &DatabaseSizeSnapshot, alert: Alert, recipient: &str) -> Self {
        let usage = snapshot
            .usage_percentage
            .map(|u| format!("{u:.2}%"))
            .unwrap_or_else(|| "unknown".to_string());

        let (subject, greeting, intro) = match alert {
            Alert::Threshold { level: AlertLevel::Critical, threshold } => (
                format!("CRITICAL: Database {} at {usage}", snapshot.database_name),
                "Critical Alert!".to_string(),
                format!(
                    "Your database {} has reached {usage} of available disk space, exceeding the critical \
                     threshold of {threshold}%. Immediate action is required to prevent database failure.",
                    snapshot.database_name
                ),
            ),
            Alert::Threshold { level: AlertLevel::Warning, threshold } => (
                format!("WARNING: Database {} at {usage}", snapshot.database_name),
                "Warning Alert".to_string(),
                format!(
                    "Your database {} has reached {usage} of available disk space, exceeding the warning \
                     threshold of {threshold}%. Please review and take action soon.",
                    snapshot.database_name
                ),
            ),
            Alert::Forecast { days } => (
                format!("FORECAST: Database {} may be full within {days} days", snapshot.database_name),
                "Capacity Forecast".to_string(),
                format!(
                    "At its current growth rate your database {} is predicted to run out of space within \
                     {days} days.",
                    snapshot.database_name
                ),
            ),
        };

        Notification {
            recipient: recipient.to_string(),
            alert,
            database: snapshot.database_name.clone(),
            snapshot_id: snapshot.id,
            subject,
            greeting,
            intro,
            sections: sections(snapshot, &usage),
            recommendations: recommendations(snapshot, alert),
            created_at: snapshot.created_at,
        }
    }

    /// Plain-text body.
    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n\n{}\n", self.greeting, self.intro);

        for section in &self.sections {
            out.push_str(&format!("\n{}:\n", section.title));
            for line in &section.lines {
                out.push_str(&format!("- {line}\n"));
            }
        }

        out.push_str("\nRecommended Actions:\n");
        for (i, action) in self.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. {action}\n", i + 1));
        }

        out
    }
}

fn sections(snapshot: &DatabaseSizeSnapshot, usage: &str) -> Vec<Section> {
    let mut sections = vec![Section {
        title: "Database Information".to_string(),
        lines: vec![
            format!("Database: {}", snapshot.database_name),
            format!("Driver: {}", snapshot.driver),
            format!("Current Size: {:.2} GB ({:.2} MB)", snapshot.total_size_gb, snapshot.total_size_mb),
            format!("Usage: {usage} of available disk space"),
            format!("Table Count: {}", snapshot.table_count),
            format!("Total Rows: {}", format_count(snapshot.total_rows)),
        ],
    }];

    if let Some(growth) = snapshot.growth {
        let sign = if growth.mb >= 0.0 { "+" } else { "" };
        let pct = growth
            .percentage
            .map(|p| format!(" ({sign}{p:.4}%)"))
            .unwrap_or_default();
        sections.push(Section {
            title: "Growth Information".to_string(),
            lines: vec![format!("Size Change: {sign}{:.2} MB{pct}", growth.mb)],
        });
    }

    if let Some(prediction) = snapshot.prediction {
        let urgency = match prediction.days_until_full {
            0..=7 => "urgent",
            8..=30 => "soon",
            _ => "info",
        };
        sections.push(Section {
            title: "Prediction".to_string(),
            lines: vec![
                format!("[{urgency}] Database may be full in {} days", prediction.days_until_full),
                format!("Estimated: {}", format_timestamp(prediction.estimated_full_date)),
            ],
        });
    }

    if !snapshot.largest_tables.is_empty() {
        sections.push(Section {
            title: "Largest Tables".to_string(),
            lines: snapshot
                .largest_tables
                .iter()
                .map(|t| {
                    let size = t.size_mb.map(|mb| format!("{mb:.2}")).unwrap_or_else(|| "N/A".to_string());
                    format!("{}: {size} MB ({} rows)", t.name, format_count(t.rows))
                })
                .collect(),
        });
    }

    sections
}

fn recommendations(snapshot: &DatabaseSizeSnapshot, alert: Alert) -> Vec<String> {
    let mut actions: Vec<String> = match alert {
        Alert::Threshold { level: AlertLevel::Critical, .. } => vec![
            "URGENT: Review and delete unnecessary data immediately".into(),
            "Consider archiving old records to external storage".into(),
            "Increase disk space allocation".into(),
            "Check for table bloat and reclaim space (OPTIMIZE TABLE, VACUUM)".into(),
        ],
        Alert::Threshold { level: AlertLevel::Warning, .. } => vec![
            "Review largest tables and consider data retention policies".into(),
            "Prune old logs and unnecessary data".into(),
            "Archive historical records if applicable".into(),
            "Monitor growth trend and plan for capacity increase".into(),
        ],
        Alert::Forecast { .. } => vec![
            "Plan a capacity increase before the estimated full date".into(),
            "Review the fastest growing tables for runaway inserts".into(),
            "Introduce retention or archiving for append-only tables".into(),
        ],
    };

    if let Some(largest) = snapshot.largest_tables.first() {
        actions.push(format!("Focus on {} - it's your largest table", largest.name));
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::measurement::Driver;
    use crate::growth::SizeGrowth;
    use crate::predict::Prediction;
    use crate::store::model::LargestTable;
    use chrono::TimeZone;

    fn snapshot() -> DatabaseSizeSnapshot {
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        DatabaseSizeSnapshot {
            id: 7,
            database_name: "shop".into(),
            driver: Driver::Mysql,
            total_size_bytes: 0,
            total_size_mb: 1100.0,
            total_size_gb: 1.07,
            max_size_bytes: Some(1),
            max_size_mb: None,
            max_size_gb: None,
            usage_percentage: Some(95.0),
            table_count: 12,
            total_rows: 1_234_567,
            growth: Some(SizeGrowth { bytes: 1, mb: 100.0, percentage: Some(10.0) }),
            prediction: Some(Prediction { days_until_full: 5, estimated_full_date: at }),
            largest_tables: vec![LargestTable { name: "orders".into(), size_mb: Some(800.0), rows: 900_000 }],
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn critical_message_has_all_sections() {
        let alert = Alert::Threshold { level: AlertLevel::Critical, threshold: 90.0 };
        let n = Notification::build(&snapshot(), alert, "ops@example.com");

        assert_eq!(n.subject, "CRITICAL: Database shop at 95.00%");
        let titles: Vec<&str> = n.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Database Information", "Growth Information", "Prediction", "Largest Tables"]);
        assert!(n.recommendations[0].starts_with("URGENT"));
        assert_eq!(n.recommendations.last().unwrap(), "Focus on orders - it's your largest table");

        let body = n.render_text();
        assert!(body.contains("- Total Rows: 1,234,567"));
        assert!(body.contains("- Size Change: +100.00 MB (+10.0000%)"));
        assert!(body.contains("[urgent] Database may be full in 5 days"));
    }

    #[test]
    fn warning_message_omits_missing_sections() {
        let mut s = snapshot();
        s.growth = None;
        s.prediction = None;
        s.largest_tables.clear();

        let alert = Alert::Threshold { level: AlertLevel::Warning, threshold: 80.0 };
        let n = Notification::build(&s, alert, "ops@example.com");

        assert!(n.subject.starts_with("WARNING"));
        assert_eq!(n.sections.len(), 1);
        assert_eq!(n.recommendations.len(), 4);
    }
}

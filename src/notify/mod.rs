//! Threshold notifications.
//!
//! After a snapshot is stored its usage percentage is compared against the
//! critical threshold first, then the warning threshold; only the stronger
//! level applies. With `notify_once_per_level`, a level is suppressed when
//! another snapshot of the same database reached that threshold inside the
//! suppression window. Independently, a forecast alert fires when the
//! predicted days until full drop to one of `notify_days_before_full`.
//!
//! Each alert fans out into one message per recipient; a failed delivery is
//! logged and never stops the others.

pub mod mailer;
pub mod message;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::store::model::DatabaseSizeSnapshot;
use crate::store::SnapshotRepository;
pub use mailer::{LogMailer, Mailer, SpoolMailer};
pub use message::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Alert {
    /// Usage reached a percentage threshold.
    Threshold { level: AlertLevel, threshold: f64 },
    /// Predicted to be full within `days` days.
    Forecast { days: u32 },
}

impl Alert {
    pub fn label(&self) -> &'static str {
        match self {
            Alert::Threshold { level, .. } => level.as_str(),
            Alert::Forecast { .. } => "forecast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Send(Alert),
    Suppressed(Alert),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationDecision {
    pub threshold: Option<Outcome>,
    pub forecast: Option<Outcome>,
}

impl NotificationDecision {
    pub fn to_send(&self) -> impl Iterator<Item = Alert> + '_ {
        [self.threshold, self.forecast].into_iter().flatten().filter_map(|o| match o {
            Outcome::Send(alert) => Some(alert),
            Outcome::Suppressed(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.threshold.is_none() && self.forecast.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delivery {
    pub alert: &'static str,
    pub recipient: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub decision: NotificationDecision,
    pub sent: Vec<Delivery>,
    pub failed: Vec<(Delivery, String)>,
}

pub struct Notifier<'a> {
    config: &'a Config,
}

impl<'a> Notifier<'a> {
    pub fn new(config: &'a Config) -> Self {
        Notifier { config }
    }

    /// Decide which alerts a stored snapshot triggers.
    pub fn evaluate<R: SnapshotRepository>(
        &self,
        snapshot: &DatabaseSizeSnapshot,
        repo: &R,
        now: DateTime<Utc>,
    ) -> Result<NotificationDecision> {
        Ok(NotificationDecision {
            threshold: self.evaluate_threshold(snapshot, repo, now)?,
            forecast: self.evaluate_forecast(snapshot, repo, now)?,
        })
    }

    fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = chrono::Duration::from_std(self.config.notifications.suppression_window)
            .unwrap_or(chrono::Duration::MAX);
        now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn evaluate_threshold<R: SnapshotRepository>(
        &self,
        snapshot: &DatabaseSizeSnapshot,
        repo: &R,
        now: DateTime<Utc>,
    ) -> Result<Option<Outcome>> {
        let Some(usage) = snapshot.usage_percentage else {
            return Ok(None);
        };

        let m = &self.config.monitoring;
        let n = &self.config.notifications;

        let levels = [
            (AlertLevel::Critical, m.critical_threshold, n.notify_on_critical),
            (AlertLevel::Warning, m.warning_threshold, n.notify_on_warning),
        ];

        for (level, threshold, wanted) in levels {
            if !wanted || usage < threshold {
                continue;
            }

            let alert = Alert::Threshold { level, threshold };
            if n.notify_once_per_level
                && repo.usage_reached_since(&snapshot.database_name, threshold, self.since(now), snapshot.id)?
            {
                debug!(database = %snapshot.database_name, %level, "already notified at this level");
                return Ok(Some(Outcome::Suppressed(alert)));
            }
            return Ok(Some(Outcome::Send(alert)));
        }

        Ok(None)
    }

    fn evaluate_forecast<R: SnapshotRepository>(
        &self,
        snapshot: &DatabaseSizeSnapshot,
        repo: &R,
        now: DateTime<Utc>,
    ) -> Result<Option<Outcome>> {
        let Some(prediction) = snapshot.prediction else {
            return Ok(None);
        };

        // tightest configured horizon the prediction falls into
        let Some(days) = self
            .config
            .prediction
            .notify_days_before_full
            .iter()
            .copied()
            .filter(|&d| prediction.days_until_full <= d)
            .min()
        else {
            return Ok(None);
        };

        let alert = Alert::Forecast { days };
        if self.config.notifications.notify_once_per_level
            && repo.full_within_since(&snapshot.database_name, days, self.since(now), snapshot.id)?
        {
            debug!(database = %snapshot.database_name, days, "already notified for this horizon");
            return Ok(Some(Outcome::Suppressed(alert)));
        }
        Ok(Some(Outcome::Send(alert)))
    }

    /// Evaluate and deliver. Does nothing when notifications are disabled or
    /// nobody is listening.
    pub fn notify<R: SnapshotRepository>(
        &self,
        snapshot: &DatabaseSizeSnapshot,
        repo: &R,
        mailer: &dyn Mailer,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        let n = &self.config.notifications;
        if !n.enabled || n.recipients.is_empty() {
            return Ok(DispatchReport::default());
        }

        let decision = self.evaluate(snapshot, repo, now)?;
        Ok(self.dispatch(snapshot, decision, mailer))
    }

    /// One message per alert and recipient.
    pub fn dispatch(
        &self,
        snapshot: &DatabaseSizeSnapshot,
        decision: NotificationDecision,
        mailer: &dyn Mailer,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for alert in decision.to_send() {
            warn!(
                database = %snapshot.database_name,
                alert = alert.label(),
                usage = ?snapshot.usage_percentage,
                "alert raised, sending notifications"
            );

            for recipient in &self.config.notifications.recipients {
                let notification = Notification::build(snapshot, alert, recipient);
                let delivery = Delivery {
                    alert: alert.label(),
                    recipient: recipient.clone(),
                };

                match mailer.deliver(&notification) {
                    Ok(()) => report.sent.push(delivery),
                    Err(e) => {
                        warn!(recipient = %recipient, error = %e, "notification delivery failed");
                        report.failed.push((delivery, e.to_string()));
                    }
                }
            }
        }

        if !report.sent.is_empty() {
            let recipients: Vec<&str> = report.sent.iter().map(|d| d.recipient.as_str()).collect();
            info!(recipients = %recipients.join(", "), "notifications sent");
        }

        report.decision = decision;
        report
    }
}

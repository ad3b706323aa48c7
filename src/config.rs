//! Monitoring configuration.
//!
//! Loaded from `config.toml` (every field optional), then overridden by
//! `SIZELOG_*` environment variables, then validated. Components receive the
//! parts they need explicitly; nothing reads configuration globally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: MonitoringConfig,
    pub notifications: NotificationConfig,
    pub prediction: PredictionConfig,
    pub collector: CollectorConfig,
    pub store: StoreConfig,
}

/// How often the external scheduler runs `sizelog monitor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    TwiceDaily,
    Weekly,
}

impl Frequency {
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Hourly => Duration::from_secs(60 * 60),
            Frequency::Daily => Duration::from_secs(24 * 60 * 60),
            Frequency::TwiceDaily => Duration::from_secs(12 * 60 * 60),
            Frequency::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "hourly" => Some(Frequency::Hourly),
            "daily" => Some(Frequency::Daily),
            "twiceDaily" => Some(Frequency::TwiceDaily),
            "weekly" => Some(Frequency::Weekly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub frequency: Frequency,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub retention_days: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            enabled: false,
            frequency: Frequency::Daily,
            warning_threshold: 80.0,
            critical_threshold: 90.0,
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub recipients: Vec<String>,
    pub notify_on_warning: bool,
    pub notify_on_critical: bool,
    /// Skip a level already reached by another snapshot inside
    /// `suppression_window`.
    pub notify_once_per_level: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub suppression_window: Duration,
    /// Write messages here as json instead of logging them.
    pub spool_dir: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            enabled: true,
            recipients: Vec::new(),
            notify_on_warning: true,
            notify_on_critical: true,
            notify_once_per_level: true,
            suppression_window: Duration::from_secs(24 * 60 * 60),
            spool_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub min_data_points: usize,
    /// Number of most recent snapshots used for the growth rate.
    #[serde(alias = "lookback_days")]
    pub lookback: usize,
    pub notify_days_before_full: Vec<u32>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            min_data_points: 2,
            lookback: 30,
            notify_days_before_full: vec![30, 14, 7, 3, 1],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Fixed capacity for databases whose engine or filesystem cannot
    /// report one.
    pub max_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Default config path (~/.config/sizelog/config.toml or platform equivalent)
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sizelog").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load `path`, or the default location when it exists, then apply the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Config::default(),
            },
        };

        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `SIZELOG_DB_*` overrides from the given variables.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let value = value.trim();
            match key.as_str() {
                "SIZELOG_DB_MONITORING" => self.monitoring.enabled = parse_bool(&key, value)?,
                "SIZELOG_DB_MONITORING_FREQUENCY" => {
                    self.monitoring.frequency = Frequency::parse(value)
                        .ok_or_else(|| invalid_env(&key, value, "hourly, daily, twiceDaily or weekly"))?;
                }
                "SIZELOG_DB_WARNING_THRESHOLD" => {
                    self.monitoring.warning_threshold =
                        value.parse().map_err(|_| invalid_env(&key, value, "a percentage"))?;
                }
                "SIZELOG_DB_CRITICAL_THRESHOLD" => {
                    self.monitoring.critical_threshold =
                        value.parse().map_err(|_| invalid_env(&key, value, "a percentage"))?;
                }
                "SIZELOG_DB_RETENTION_DAYS" => {
                    self.monitoring.retention_days =
                        value.parse().map_err(|_| invalid_env(&key, value, "a number of days"))?;
                }
                "SIZELOG_DB_NOTIFICATIONS" => self.notifications.enabled = parse_bool(&key, value)?,
                "SIZELOG_DB_NOTIFICATION_EMAILS" => {
                    self.notifications.recipients = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.monitoring;
        for (name, value) in [("warning_threshold", m.warning_threshold), ("critical_threshold", m.critical_threshold)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("{name} must be between 0 and 100, got {value}")));
            }
        }
        if m.retention_days == 0 {
            return Err(Error::InvalidConfig("retention_days must be at least 1".to_string()));
        }
        if self.prediction.lookback < crate::predict::MIN_DATA_POINTS {
            return Err(Error::InvalidConfig(format!(
                "prediction.lookback must be at least {}, got {}",
                crate::predict::MIN_DATA_POINTS,
                self.prediction.lookback
            )));
        }
        if let Some(empty) = self.notifications.recipients.iter().find(|r| r.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("empty notification recipient {empty:?}")));
        }
        if m.critical_threshold < m.warning_threshold {
            tracing::warn!(
                warning = m.warning_threshold,
                critical = m.critical_threshold,
                "critical threshold is below warning threshold"
            );
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid_env(key, value, "a boolean")),
    }
}

fn invalid_env(key: &str, value: &str, expected: &str) -> Error {
    Error::InvalidConfig(format!("{key}={value:?}: expected {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_file_gives_package_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(!config.monitoring.enabled);
        assert_eq!(config.monitoring.warning_threshold, 80.0);
        assert_eq!(config.monitoring.critical_threshold, 90.0);
        assert_eq!(config.monitoring.retention_days, 90);
        assert!(config.notifications.notify_once_per_level);
        assert_eq!(config.notifications.suppression_window, Duration::from_secs(86_400));
        assert_eq!(config.prediction.lookback, 30);
        assert_eq!(config.prediction.notify_days_before_full, vec![30, 14, 7, 3, 1]);
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let config = Config::from_toml(
            r#"
            [monitoring]
            enabled = true
            frequency = "twiceDaily"
            warning_threshold = 70
            critical_threshold = 85.5
            retention_days = 30

            [notifications]
            recipients = ["ops@example.com", "dba@example.com"]
            notify_on_warning = false
            suppression_window = "6h"
            spool_dir = "/var/spool/sizelog"

            [prediction]
            lookback_days = 14
            notify_days_before_full = [7, 1]

            [collector]
            max_size_bytes = 10737418240
            "#,
        )
        .unwrap();

        assert_eq!(config.monitoring.frequency, Frequency::TwiceDaily);
        assert_eq!(config.monitoring.critical_threshold, 85.5);
        assert_eq!(config.notifications.recipients.len(), 2);
        assert!(!config.notifications.notify_on_warning);
        assert_eq!(config.notifications.suppression_window, Duration::from_secs(6 * 3600));
        assert_eq!(config.prediction.lookback, 14);
        assert_eq!(config.collector.max_size_bytes, Some(10 * 1024 * 1024 * 1024));
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        assert!(Config::from_toml("[notifications]\nsuppression_window = \"soon\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_env(vars(&[
                ("SIZELOG_DB_MONITORING", "true"),
                ("SIZELOG_DB_MONITORING_FREQUENCY", "hourly"),
                ("SIZELOG_DB_CRITICAL_THRESHOLD", "95"),
                ("SIZELOG_DB_NOTIFICATION_EMAILS", "a@example.com, ,b@example.com"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert!(config.monitoring.enabled);
        assert_eq!(config.monitoring.frequency, Frequency::Hourly);
        assert_eq!(config.monitoring.critical_threshold, 95.0);
        assert_eq!(config.notifications.recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn env_rejects_garbage() {
        let mut config = Config::default();
        let err = config.apply_env(vars(&[("SIZELOG_DB_RETENTION_DAYS", "forever")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.monitoring.warning_threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitoring.retention_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.prediction.lookback = 1;
        assert!(config.validate().is_err());
    }
}

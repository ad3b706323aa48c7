//! Measurements handed over as JSON by an external measuring tool.
//!
//! MySQL and Postgres sizes come from `information_schema` and
//! `pg_database_size`, which a deployment usually queries with its own
//! credentials; the result is piped in here.

use std::io::Read;
use std::path::PathBuf;

use serde_json::Value;

use super::measurement::Measurement;
use super::Collector;
use crate::error::{Error, Result};

pub enum JsonSource {
    File(PathBuf),
    Stdin,
}

pub struct JsonCollector {
    source: JsonSource,
}

impl JsonCollector {
    pub fn new(source: JsonSource) -> Self {
        JsonCollector { source }
    }

    /// `-` reads from stdin.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            JsonCollector::new(JsonSource::Stdin)
        } else {
            JsonCollector::new(JsonSource::File(PathBuf::from(arg)))
        }
    }

    fn read(&self) -> Result<String> {
        match &self.source {
            JsonSource::File(path) => std::fs::read_to_string(path).map_err(|e| Error::Collect {
                driver: self.name().to_string(),
                message: format!("cannot read {}: {e}", path.display()),
            }),
            JsonSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl Collector for JsonCollector {
    fn name(&self) -> &'static str {
        "json"
    }

    fn collect(&self) -> Result<Measurement> {
        parse_measurement(&self.read()?)
    }
}

/// Parse the measurement contract. A payload of the form
/// `{"error": true, "message": ...}` is a collection failure.
pub fn parse_measurement(text: &str) -> Result<Measurement> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Measurement(format!("not valid json: {e}")))?;

    if value.get("error").and_then(Value::as_bool).unwrap_or(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("collector reported an error")
            .to_string();
        let driver = value
            .get("driver")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(Error::Collect { driver, message });
    }

    serde_json::from_value(value).map_err(|e| Error::Measurement(e.to_string()))
}

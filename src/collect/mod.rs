//! Collection drivers.
//!
//! A collector measures one database and returns a [`Measurement`]. A
//! collector error is the only failure that aborts a monitoring run: without
//! a measurement there is nothing to record.

pub mod json;
pub mod measurement;
pub mod sqlite;

use crate::error::Result;
pub use measurement::{Driver, Measurement, TableMeasurement};

pub trait Collector {
    fn name(&self) -> &'static str;
    fn collect(&self) -> Result<Measurement>;
}

/// Run a collector and return a normalized, validated measurement.
pub fn measure(collector: &dyn Collector) -> Result<Measurement> {
    let start = std::time::Instant::now();
    let measurement = collector.collect()?.normalize();
    measurement.validate()?;

    tracing::debug!(
        collector = collector.name(),
        database = %measurement.database,
        tables = measurement.tables.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "measurement collected"
    );

    Ok(measurement)
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single pipe or tank reading, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Both sensor series of one calendar day, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySamples {
    pub pipe: Vec<TemperatureSample>,
    pub tank: Vec<TemperatureSample>,
}

/// Read access to the recorded telemetry. Implementations own their own
/// timeouts and retries.
pub trait TemperatureStore {
    fn query_day(&self, day: NaiveDate) -> Result<DaySamples>;
    fn query_latest(&self) -> Result<TemperatureSample>;
    fn query_first(&self) -> Result<TemperatureSample>;
}

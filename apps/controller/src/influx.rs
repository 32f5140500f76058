use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use smart_boiler::{DaySamples, Error, Result, TemperatureSample, TemperatureStore};
use std::time::Duration as StdDuration;

use crate::config::InfluxConfig;

/// Body of an InfluxDB 1.x `/query` response.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub series: Vec<Series>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub values: Vec<(DateTime<Utc>, Option<f64>)>,
}

impl QueryResponse {
    /// Points of the first statement converted to local time, nulls skipped.
    pub fn into_samples(self) -> Result<Vec<TemperatureSample>> {
        if let Some(e) = self.error {
            return Err(Error::SensorReadFailure(e));
        }
        let Some(statement) = self.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(e) = statement.error {
            return Err(Error::SensorReadFailure(e));
        }
        Ok(statement
            .series
            .into_iter()
            .flat_map(|s| s.values)
            .filter_map(|(time, value)| {
                Some(TemperatureSample {
                    timestamp: time.with_timezone(&Local).naive_local(),
                    value: value?,
                })
            })
            .collect())
    }
}

fn read_failure(e: impl std::fmt::Display) -> Error {
    Error::SensorReadFailure(e.to_string())
}

/// UTC bounds of a local calendar day, formatted for a query parameter.
fn day_bounds(day: NaiveDate) -> Result<(String, String)> {
    let start = |d: NaiveDate| {
        Local
            .from_local_datetime(&d.and_time(NaiveTime::MIN))
            .earliest()
            .map(|t| t.with_timezone(&Utc).to_rfc3339())
            .ok_or_else(|| read_failure(format!("no local midnight on {d}")))
    };
    Ok((start(day)?, start(day + Duration::days(1))?))
}

/// Temperature history kept in InfluxDB by the telemetry pipeline.
pub struct InfluxStore {
    client: reqwest::blocking::Client,
    config: InfluxConfig,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_sec))
            .build()?;
        Ok(InfluxStore { client, config })
    }

    fn query(&self, q: &str, params: Option<serde_json::Value>) -> Result<Vec<TemperatureSample>> {
        let mut query = vec![
            ("db", self.config.database.clone()),
            ("q", q.to_string()),
        ];
        if let Some(params) = params {
            query.push(("params", params.to_string()));
        }
        if let (Some(u), Some(p)) = (&self.config.username, &self.config.password) {
            query.push(("u", u.clone()));
            query.push(("p", p.clone()));
        }

        tracing::debug!(q, "influx query");
        let response: QueryResponse = self
            .client
            .get(format!("{}/query", self.config.url.trim_end_matches('/')))
            .query(&query)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(read_failure)?;
        response.into_samples()
    }

    fn day_series(&self, measurement: &str, start: &str, end: &str) -> Result<Vec<TemperatureSample>> {
        self.query(
            &format!(
                r#"SELECT "value" FROM "{measurement}" WHERE time >= $start_time AND time < $end_time"#
            ),
            Some(json!({"start_time": start, "end_time": end})),
        )
    }

    fn single(&self, selector: &str) -> Result<TemperatureSample> {
        let q = format!(
            r#"SELECT {selector}("value") FROM "{}""#,
            self.config.tank_measurement
        );
        self.query(&q, None)?
            .into_iter()
            .next()
            .ok_or_else(|| read_failure(format!("no {selector} tank sample")))
    }
}

impl TemperatureStore for InfluxStore {
    fn query_day(&self, day: NaiveDate) -> Result<DaySamples> {
        let (start, end) = day_bounds(day)?;
        let pipe = self.day_series(&self.config.pipe_measurement, &start, &end)?;
        let tank = self.day_series(&self.config.tank_measurement, &start, &end)?;
        if tank.is_empty() {
            return Err(read_failure(format!("no tank samples on {day}")));
        }
        Ok(DaySamples { pipe, tank })
    }

    fn query_latest(&self) -> Result<TemperatureSample> {
        self.single("last")
    }

    fn query_first(&self) -> Result<TemperatureSample> {
        self.single("first")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_series() -> anyhow::Result<()> {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"temp_tank","columns":["time","value"],
            "values":[["2024-03-04T06:00:00Z",45.5],["2024-03-04T06:05:00Z",null],["2024-03-04T06:10:00Z",44.0]]}]}]}"#;
        let samples = serde_json::from_str::<QueryResponse>(body)?.into_samples()?;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 45.5);
        assert_eq!(samples[1].value, 44.0);
        assert_eq!(samples[1].timestamp - samples[0].timestamp, Duration::minutes(10));
        Ok(())
    }

    #[test]
    fn parses_selector() -> anyhow::Result<()> {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"temp_tank","columns":["time","last"],
            "values":[["2024-03-04T12:00:00.123Z",41.2]]}]}]}"#;
        let samples = serde_json::from_str::<QueryResponse>(body)?.into_samples()?;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 41.2);
        Ok(())
    }

    #[test]
    fn empty_result() -> anyhow::Result<()> {
        let body = r#"{"results":[{"statement_id":0}]}"#;
        assert!(serde_json::from_str::<QueryResponse>(body)?.into_samples()?.is_empty());
        Ok(())
    }

    #[test]
    fn statement_error() -> anyhow::Result<()> {
        let body = r#"{"results":[{"statement_id":0,"error":"database not found: sensors"}]}"#;
        assert!(matches!(
            serde_json::from_str::<QueryResponse>(body)?.into_samples(),
            Err(Error::SensorReadFailure(_))
        ));
        Ok(())
    }

    #[test]
    fn day_bounds_span_one_day() -> anyhow::Result<()> {
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())?;
        let start = DateTime::parse_from_rfc3339(&start)?;
        let end = DateTime::parse_from_rfc3339(&end)?;
        assert!(end - start >= Duration::hours(23) && end - start <= Duration::hours(25));
        Ok(())
    }
}

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::calibration::Calibration;
use crate::draws::{detect_draws, Draw};
use crate::error::{Error, Result};
use crate::store::TemperatureSample;

pub const HOURS_PER_DAY: usize = 24;
pub const QUARTERS_PER_HOUR: usize = 4;
pub const QUARTERS_PER_DAY: usize = HOURS_PER_DAY * QUARTERS_PER_HOUR;

/// Normalized liters drawn in each hour of one complete day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageProfile([f64; HOURS_PER_DAY]);

impl UsageProfile {
    pub fn new(hours: [f64; HOURS_PER_DAY]) -> Self {
        UsageProfile(hours)
    }

    pub fn flat(value: f64) -> Self {
        UsageProfile([value; HOURS_PER_DAY])
    }

    pub fn hours(&self) -> &[f64; HOURS_PER_DAY] {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Folds quarter-hour slots into hours.
    pub fn from_quarters(quarters: &[f64; QUARTERS_PER_DAY]) -> Self {
        let mut hours = [0.0; HOURS_PER_DAY];
        for (hour, chunk) in hours.iter_mut().zip(quarters.chunks_exact(QUARTERS_PER_HOUR)) {
            *hour = chunk.iter().sum();
        }
        UsageProfile(hours)
    }
}

impl Index<usize> for UsageProfile {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

/// Quarter-hour slot of the day a timestamp falls into.
pub fn quarter_of_day(t: NaiveDateTime) -> usize {
    t.hour() as usize * QUARTERS_PER_HOUR + t.minute() as usize / 15
}

/// Spreads draws over the 96 quarter-hour slots of the day. Each draw lands
/// in the slot of its first sample; draws sharing a slot are summed.
/// A draw whose formulas degenerate counts as zero.
pub fn quarter_hour_usage(
    draws: &[Draw],
    tank: &[TemperatureSample],
    calibration: &Calibration,
) -> [f64; QUARTERS_PER_DAY] {
    let mut quarters = [0.0; QUARTERS_PER_DAY];
    for draw in draws {
        let (Some(before), Some(after)) = (tank.get(draw.start), tank.get(draw.end)) else {
            tracing::warn!(?draw, samples = tank.len(), "draw outside of sample range");
            continue;
        };
        let liters = match calibration.draw_liters(before.value, after.value) {
            Ok(liters) => liters,
            Err(e) => {
                tracing::debug!(at = %before.timestamp, "draw counted as zero: {e}");
                0.0
            }
        };
        quarters[quarter_of_day(before.timestamp)] += liters;
    }
    quarters
}

/// Hourly usage profile from detected draws. A day without draws, or whose
/// draws all degenerated, is missing data, not a day without demand.
pub fn hourly_profile(
    draws: &[Draw],
    tank: &[TemperatureSample],
    calibration: &Calibration,
) -> Result<UsageProfile> {
    if draws.is_empty() {
        return Err(Error::InsufficientHistory("no draws detected".to_string()));
    }
    let quarters = quarter_hour_usage(draws, tank, calibration);
    if quarters.iter().all(|&q| q == 0.0) {
        return Err(Error::InsufficientHistory(format!(
            "none of {} draws gave a usable volume",
            draws.len()
        )));
    }
    Ok(UsageProfile::from_quarters(&quarters))
}

/// Detects draws in a day's tank series and aggregates them per hour.
pub fn usage_profile(tank: &[TemperatureSample], calibration: &Calibration) -> Result<UsageProfile> {
    let values: Vec<f64> = tank.iter().map(|s| s.value).collect();
    let draws = detect_draws(&values, calibration.draw_noise_threshold_c);
    tracing::debug!(samples = tank.len(), draws = draws.len(), "detected draws");
    hourly_profile(&draws, tank, calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(start: NaiveDateTime, step_min: i64, values: &[f64]) -> Vec<TemperatureSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| TemperatureSample {
                timestamp: start + Duration::minutes(step_min * i as i64),
                value,
            })
            .collect()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn quarter_index() {
        assert_eq!(quarter_of_day(at(0, 0)), 0);
        assert_eq!(quarter_of_day(at(0, 14)), 0);
        assert_eq!(quarter_of_day(at(7, 15)), 29);
        assert_eq!(quarter_of_day(at(23, 59)), 95);
    }

    #[test]
    fn morning_draw_lands_in_hour_seven() -> anyhow::Result<()> {
        let c = Calibration::default();
        let tank = series(at(7, 0), 5, &[40.0, 40.0, 37.0, 35.0, 41.0, 41.0]);
        let profile = usage_profile(&tank, &c)?;

        for (hour, &liters) in profile.hours().iter().enumerate() {
            if hour == 7 {
                assert!(liters > 0.0);
            } else {
                assert_eq!(liters, 0.0, "hour {hour}");
            }
        }

        let quarters = quarter_hour_usage(&[Draw { start: 0, end: 4 }], &tank, &c);
        assert!(quarters[28] > 0.0);
        assert_eq!(quarters.iter().filter(|&&q| q != 0.0).count(), 1);
        Ok(())
    }

    #[test]
    fn draws_in_same_quarter_are_summed() {
        let c = Calibration::default();
        let tank = series(at(18, 0), 1, &[50.0, 49.0, 48.0, 49.0, 50.0, 49.0, 48.0, 49.0]);
        let first = Draw { start: 0, end: 3 };
        let second = Draw { start: 4, end: 7 };
        let both = quarter_hour_usage(&[first, second], &tank, &c);
        let one = quarter_hour_usage(&[first], &tank, &c);
        let other = quarter_hour_usage(&[second], &tank, &c);
        assert!((both[72] - one[72] - other[72]).abs() < 1e-9);
        assert_eq!(both.iter().filter(|&&q| q != 0.0).count(), 1);
    }

    #[test]
    fn gaps_between_draws_stay_zero() -> anyhow::Result<()> {
        let c = Calibration::default();
        let mut tank = series(at(6, 0), 1, &[55.0, 54.0, 53.0, 54.0]);
        tank.extend(series(at(20, 30), 1, &[55.0, 54.0, 53.0, 54.0]));
        let draws = [Draw { start: 0, end: 3 }, Draw { start: 4, end: 7 }];
        let profile = hourly_profile(&draws, &tank, &c)?;
        let nonzero: Vec<usize> = (0..HOURS_PER_DAY).filter(|&h| profile[h] > 0.0).collect();
        assert_eq!(nonzero, vec![6, 20]);
        Ok(())
    }

    #[test]
    fn constant_day_is_insufficient() {
        let c = Calibration::default();
        let tank = series(at(0, 0), 5, &[48.0; 288]);
        assert!(matches!(
            usage_profile(&tank, &c),
            Err(Error::InsufficientHistory(_))
        ));
    }

    #[test]
    fn folding_keeps_total() {
        let mut quarters = [0.0; QUARTERS_PER_DAY];
        for (i, q) in quarters.iter_mut().enumerate() {
            *q = i as f64;
        }
        let profile = UsageProfile::from_quarters(&quarters);
        assert_eq!(profile[0], 0.0 + 1.0 + 2.0 + 3.0);
        assert_eq!(profile[23], 92.0 + 93.0 + 94.0 + 95.0);
        assert_eq!(profile.total(), (0..96).sum::<usize>() as f64);
    }

    #[test]
    fn degenerate_draws_are_insufficient() {
        let c = Calibration::default();
        // starts at the inflow temperature, so the volume is undefined
        let tank = series(at(6, 0), 5, &[8.7, 8.7, 8.2, 8.0, 8.5, 8.5]);
        assert_eq!(detect_draws(&[8.7, 8.7, 8.2, 8.0, 8.5, 8.5], 0.2).len(), 1);
        assert!(matches!(
            usage_profile(&tank, &c),
            Err(Error::InsufficientHistory(_))
        ));
    }
}

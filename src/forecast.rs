use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::{Error, Result};
use crate::profile::{UsageProfile, HOURS_PER_DAY};

/// Predicted hourly usage for the coming day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastProfile([f64; HOURS_PER_DAY]);

impl ForecastProfile {
    pub fn new(hours: [f64; HOURS_PER_DAY]) -> Self {
        ForecastProfile(hours)
    }

    pub fn hours(&self) -> &[f64; HOURS_PER_DAY] {
        &self.0
    }

    /// Predicted usage over a range of hours.
    pub fn sum(&self, hours: std::ops::Range<usize>) -> f64 {
        self.0[hours].iter().sum()
    }

    /// First hour with any predicted usage.
    pub fn first_use(&self) -> Option<usize> {
        self.0.iter().position(|&v| v != 0.0)
    }
}

impl Index<usize> for ForecastProfile {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

/// Exponential moving average of `values` (oldest first), seeded with their
/// simple average.
pub fn ema(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let alpha = 2.0 / (n + 1.0);
    let mut avg = values.iter().sum::<f64>() / n;
    for &v in values {
        avg += alpha * (v - avg);
    }
    Some(avg)
}

/// Blends 2 to 4 same-weekday profiles, oldest first, into a forecast.
pub fn forecast(history: &[UsageProfile]) -> Result<ForecastProfile> {
    if !(2..=4).contains(&history.len()) {
        return Err(Error::UnsupportedHistoryLength(history.len()));
    }
    let mut hours = [0.0; HOURS_PER_DAY];
    let mut column = Vec::with_capacity(history.len());
    for (hour, predicted) in hours.iter_mut().enumerate() {
        column.clear();
        column.extend(history.iter().map(|p| p[hour]));
        *predicted = ema(&column).unwrap_or_default();
    }
    Ok(ForecastProfile(hours))
}

/// Mean absolute percentage error of `predicted` against `actual`, over the
/// hours that had actual usage. `None` when no hour had any.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &p)| ((a - p) / a).abs())
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some(errors.iter().sum::<f64>() / errors.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_history_forecasts_the_constant() -> anyhow::Result<()> {
        for v in [0.0, 3.3, 12.75] {
            let history = [UsageProfile::flat(v), UsageProfile::flat(v)];
            let f = forecast(&history)?;
            assert!(f.hours().iter().all(|&h| h == v), "{v}: {f:?}");
        }
        Ok(())
    }

    #[test]
    fn unsupported_lengths() {
        let p = UsageProfile::flat(1.0);
        for n in [0, 1, 5, 6] {
            let history = vec![p; n];
            assert!(matches!(
                forecast(&history),
                Err(Error::UnsupportedHistoryLength(len)) if len == n
            ));
        }
    }

    #[test]
    fn recent_days_weigh_more() -> anyhow::Result<()> {
        let old = UsageProfile::flat(0.0);
        let new = UsageProfile::flat(10.0);
        let f = forecast(&[old, old, old, new])?;
        let g = forecast(&[new, old, old, old])?;
        assert!(f[8] > g[8]);
        assert!(f[8] > 2.5, "{}", f[8]);
        Ok(())
    }

    #[test]
    fn ema_of_two() {
        // avg 3, alpha 2/3: 3 + 2/3 (2 - 3) = 7/3, then 7/3 + 2/3 (4 - 7/3) = 31/9
        let v = ema(&[2.0, 4.0]).unwrap();
        assert!((v - 31.0 / 9.0).abs() < 1e-12, "{v}");
        assert_eq!(ema(&[]), None);
    }

    #[test]
    fn hours_are_independent() -> anyhow::Result<()> {
        let mut a = [0.0; HOURS_PER_DAY];
        let mut b = [0.0; HOURS_PER_DAY];
        a[7] = 20.0;
        b[7] = 30.0;
        b[19] = 5.0;
        let f = forecast(&[UsageProfile::new(a), UsageProfile::new(b)])?;
        assert!(f[7] > 25.0 && f[7] < 30.0);
        assert!(f[19] > 0.0);
        assert_eq!(f.first_use(), Some(7));
        assert_eq!(f[0], 0.0);
        Ok(())
    }

    #[test]
    fn mape_skips_idle_hours() {
        assert_eq!(mape(&[10.0, 0.0, 20.0], &[10.0, 5.0, 20.0]), Some(0.0));
        // |10-5|/10 and |20-30|/20 are both 50 %
        let e = mape(&[10.0, 0.0, 20.0], &[5.0, 0.0, 30.0]).unwrap();
        assert!((e - 50.0).abs() < 1e-12, "{e}");
        assert_eq!(mape(&[0.0; 3], &[1.0; 3]), None);
    }
}

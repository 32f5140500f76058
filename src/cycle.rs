use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::calibration::Calibration;
use crate::error::{Error, Result};
use crate::forecast::{forecast, mape, ForecastProfile};
use crate::planner::{plan_morning, MorningPlan};
use crate::profile::{usage_profile, UsageProfile};
use crate::schedule::{static_schedule, ScheduleSettings, SwitchSchedule};
use crate::store::TemperatureStore;

const DAYS_PER_WEEK: i64 = 7;
const MIN_LOOKBACK_WEEKS: i64 = 2;
const MAX_LOOKBACK_WEEKS: i64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlanMode {
    Forecast {
        forecast: ForecastProfile,
        morning: MorningPlan,
        weeks: usize,
        /// Error of the same method predicting the latest week from the
        /// older ones, in percent.
        backtest_mape: Option<f64>,
    },
    Static {
        reason: String,
    },
}

/// Result of one daily planning cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlan {
    pub day: NaiveDate,
    pub mode: PlanMode,
    pub schedule: SwitchSchedule,
}

impl DayPlan {
    pub fn fallback(day: NaiveDate, settings: &ScheduleSettings, reason: String) -> Self {
        tracing::info!(%day, %reason, "using static schedule");
        DayPlan {
            day,
            mode: PlanMode::Static { reason },
            schedule: static_schedule(day, settings),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.mode, PlanMode::Static { .. })
    }
}

/// How many same-weekday profiles to blend after `days` of recording, or
/// `None` while the history is too short.
pub fn lookback_weeks(days: i64, settings: &ScheduleSettings) -> Option<usize> {
    if days <= settings.min_history_days {
        return None;
    }
    Some(((days - 1) / DAYS_PER_WEEK).clamp(MIN_LOOKBACK_WEEKS, MAX_LOOKBACK_WEEKS) as usize)
}

/// Usage profiles of the same weekday 1..=`weeks` weeks before `today`,
/// oldest first. Any day without a complete profile fails the whole history.
pub fn weekday_history<S: TemperatureStore + ?Sized>(
    store: &S,
    today: NaiveDate,
    weeks: usize,
    calibration: &Calibration,
) -> Result<Vec<UsageProfile>> {
    let mut history = Vec::with_capacity(weeks);
    for week in (1..=weeks as i64).rev() {
        let day = today - Duration::days(week * DAYS_PER_WEEK);
        let samples = store.query_day(day).map_err(|e| match e {
            Error::SensorReadFailure(msg) => Error::InsufficientHistory(format!("{day}: {msg}")),
            other => other,
        })?;
        let profile = usage_profile(&samples.tank, calibration).map_err(|e| match e {
            Error::InsufficientHistory(msg) => Error::InsufficientHistory(format!("{day}: {msg}")),
            other => other,
        })?;
        tracing::debug!(%day, total = profile.total(), "usage profile");
        history.push(profile);
    }
    Ok(history)
}

/// Plans `today`: forecast-driven when enough same-weekday history exists,
/// the static schedule otherwise. Store failures other than missing days are
/// returned to the caller.
pub fn plan_day<S: TemperatureStore + ?Sized>(
    store: &S,
    today: NaiveDate,
    calibration: &Calibration,
    settings: &ScheduleSettings,
) -> Result<DayPlan> {
    let first = store.query_first()?;
    let days = (today - first.timestamp.date()).num_days();

    let Some(weeks) = lookback_weeks(days, settings) else {
        return Ok(DayPlan::fallback(
            today,
            settings,
            format!("only {days} days recorded"),
        ));
    };

    let history = match weekday_history(store, today, weeks, calibration) {
        Ok(history) => history,
        Err(Error::InsufficientHistory(reason)) => {
            return Ok(DayPlan::fallback(today, settings, reason));
        }
        Err(e) => return Err(e),
    };

    let forecast = forecast(&history)?;
    let backtest_mape = backtest(&history)?;
    tracing::info!(weeks, ?backtest_mape, "forecast ready");
    let morning = match plan_morning(&forecast, today, calibration, settings) {
        Ok(morning) => morning,
        Err(e @ (Error::DegenerateUsage(_) | Error::InsufficientHistory(_))) => {
            return Ok(DayPlan::fallback(today, settings, e.to_string()));
        }
        Err(e) => return Err(e),
    };

    Ok(DayPlan {
        day: today,
        schedule: morning.schedule(&forecast),
        mode: PlanMode::Forecast {
            forecast,
            morning,
            weeks,
            backtest_mape,
        },
    })
}

/// Forecasts the newest profile from the ones before it and scores the
/// result. Needs at least two older profiles.
pub fn backtest(history: &[UsageProfile]) -> Result<Option<f64>> {
    let Some((latest, older)) = history.split_last() else {
        return Ok(None);
    };
    if older.len() < 2 {
        return Ok(None);
    }
    let predicted = forecast(older)?;
    Ok(mape(latest.hours(), predicted.hours()))
}

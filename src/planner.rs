use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::ops::RangeInclusive;

use crate::calibration::Calibration;
use crate::error::{Error, Result};
use crate::forecast::ForecastProfile;
use crate::profile::HOURS_PER_DAY;
use crate::schedule::{Job, ScheduleSettings, SwitchSchedule};

/// Hours searched for the low point that splits morning and afternoon plans.
pub const AFTERNOON_HOURS: RangeInclusive<usize> = 13..=15;

/// Hour among [`AFTERNOON_HOURS`] with the lowest predicted usage. The
/// earliest hour wins a tie.
pub fn afternoon_minimum(forecast: &ForecastProfile) -> usize {
    let mut index = *AFTERNOON_HOURS.start();
    for hour in AFTERNOON_HOURS {
        if forecast[hour] < forecast[index] {
            index = hour;
        }
    }
    index
}

impl Calibration {
    /// Lowest starting tank temperature that still leaves the tank at the
    /// safety floor after `usage` liters are replaced by cold water.
    pub fn min_tank_temperature(&self, usage: f64) -> Result<f64> {
        let volume = self.tank_volume_l;
        if usage >= volume {
            return Err(Error::DegenerateUsage(format!(
                "predicted usage {usage:.2} l exceeds tank volume {volume} l"
            )));
        }
        Ok((self.min_tank_c * volume - self.cold_water_c * usage) / (volume - usage))
    }

    /// Heat needed to bring the tank from `current` to `target` degrees.
    pub fn heat_energy(&self, target: f64, current: f64) -> f64 {
        self.tank_volume_l * self.specific_heat * (target - current)
    }

    /// Whole minutes of heating from `current` to `target`, zero when the
    /// tank is already warm enough.
    pub fn heating_minutes(&self, target: f64, current: f64) -> i64 {
        let seconds = self.heat_energy(target, current) / (self.heater_power_w * self.heater_efficiency);
        (seconds / 60.0).ceil().max(0.0) as i64
    }
}

/// Heating plan for the first part of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorningPlan {
    pub heat_on: NaiveDateTime,
    pub heat_off: NaiveDateTime,
    /// When the afternoon top-up gets evaluated.
    pub afternoon_checkpoint: NaiveDateTime,
    pub heating_minutes: i64,
    pub min_tank_c: f64,
}

impl MorningPlan {
    pub fn schedule(&self, forecast: &ForecastProfile) -> SwitchSchedule {
        let mut schedule = SwitchSchedule::new();
        schedule.push(self.heat_on, Job::TurnOn);
        schedule.push(self.heat_off, Job::TurnOff);
        schedule.push(
            self.afternoon_checkpoint,
            Job::PlanAfternoon {
                forecast: *forecast,
                checkpoint: self.afternoon_checkpoint,
            },
        );
        schedule
    }
}

/// Plans heating from the safety floor so the tank covers the predicted
/// morning demand, finishing a margin before the first predicted use.
pub fn plan_morning(
    forecast: &ForecastProfile,
    day: NaiveDate,
    calibration: &Calibration,
    settings: &ScheduleSettings,
) -> Result<MorningPlan> {
    let checkpoint_hour = afternoon_minimum(forecast);
    let usage = forecast.sum(0..checkpoint_hour);
    let min_tank_c = calibration.min_tank_temperature(usage)?;
    let heating_minutes = calibration.heating_minutes(min_tank_c, calibration.min_tank_c);

    let first_use = forecast
        .first_use()
        .ok_or_else(|| Error::InsufficientHistory("forecast predicts no usage".to_string()))?;

    // Nothing can switch before the planning cycle that produced the plan.
    let midnight = day.and_time(NaiveTime::MIN);
    let planned_at = day.and_time(settings.forecast_at);
    let first_use_at = midnight + Duration::hours(first_use as i64);
    let heat_on = (first_use_at - Duration::minutes(heating_minutes) - settings.heat_margin()).max(planned_at);
    let heat_off = if first_use_at > heat_on {
        first_use_at
    } else {
        heat_on + Duration::minutes(heating_minutes.max(1))
    };

    tracing::info!(
        usage,
        min_tank_c,
        heating_minutes,
        first_use,
        checkpoint_hour,
        "morning plan"
    );

    Ok(MorningPlan {
        heat_on,
        heat_off,
        afternoon_checkpoint: midnight + Duration::hours(checkpoint_hour as i64),
        heating_minutes,
        min_tank_c,
    })
}

/// Re-plans the rest of the day at the checkpoint from the live wrap reading.
/// Returns when to switch off if any heating is needed; heating starts
/// immediately.
pub fn plan_afternoon(
    forecast: &ForecastProfile,
    checkpoint: NaiveDateTime,
    sensor_c: f64,
    calibration: &Calibration,
    settings: &ScheduleSettings,
) -> Result<Option<NaiveDateTime>> {
    let hour = checkpoint.hour() as usize;
    let usage = forecast.sum(hour..HOURS_PER_DAY);
    let min_tank_c = calibration.min_tank_temperature(usage)?;
    let current_c = calibration.sensor.water_temperature(sensor_c);
    let minutes = calibration.heating_minutes(min_tank_c, current_c);

    tracing::info!(
        usage,
        min_tank_c,
        current_c,
        minutes,
        "afternoon plan"
    );

    if minutes <= 0 {
        return Ok(None);
    }
    Ok(Some(checkpoint + Duration::minutes(minutes) + settings.heat_margin()))
}

/// Afternoon plan as switch directives: on at `now`, off when heated.
pub fn afternoon_schedule(
    forecast: &ForecastProfile,
    checkpoint: NaiveDateTime,
    sensor_c: f64,
    now: NaiveDateTime,
    calibration: &Calibration,
    settings: &ScheduleSettings,
) -> Result<SwitchSchedule> {
    let mut schedule = SwitchSchedule::new();
    if let Some(off) = plan_afternoon(forecast, checkpoint, sensor_c, calibration, settings)? {
        schedule.push(now, Job::TurnOn);
        schedule.push(off, Job::TurnOff);
    }
    Ok(schedule)
}

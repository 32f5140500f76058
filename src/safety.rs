use chrono::NaiveDateTime;
use serde::Serialize;

use crate::calibration::Calibration;
use crate::schedule::{Job, ScheduleSettings, SwitchSchedule};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SafetyState {
    Idle,
    ForcedHeating { until: NaiveDateTime },
}

/// Keeps the water above the safety floor regardless of the forecast plan.
/// Its directives are not reconciled with the planner's.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    state: SafetyState,
    calibration: Calibration,
    settings: ScheduleSettings,
}

impl SafetyMonitor {
    pub fn new(calibration: Calibration, settings: ScheduleSettings) -> Self {
        SafetyMonitor {
            state: SafetyState::Idle,
            calibration,
            settings,
        }
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Evaluates one wrap reading taken at `now`. Returns the burst to
    /// schedule when the water is at or below the floor.
    pub fn check(&mut self, sensor_c: f64, now: NaiveDateTime) -> Option<SwitchSchedule> {
        if let SafetyState::ForcedHeating { until } = self.state {
            if now < until {
                return None;
            }
            self.state = SafetyState::Idle;
        }

        let water_c = self.calibration.sensor.water_temperature(sensor_c);
        if water_c > self.calibration.min_tank_c {
            tracing::debug!(sensor_c, water_c, "tank above floor");
            return None;
        }

        let until = now + self.settings.safety_burst();
        tracing::warn!(sensor_c, water_c, %until, "tank below floor, forcing heating");
        self.state = SafetyState::ForcedHeating { until };

        let mut burst = SwitchSchedule::new();
        burst.push(now, Job::TurnOn);
        burst.push(until, Job::TurnOff);
        Some(burst)
    }
}

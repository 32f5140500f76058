use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::forecast::ForecastProfile;

// --- Timing defaults ---
const FORECAST_HOUR: u32 = 0;
const FORECAST_MINUTE: u32 = 15;
const HEAT_MARGIN_MIN: i64 = 5;
const MIN_HISTORY_DAYS: i64 = 14;
const SAFETY_INTERVAL_MIN: i64 = 5;
const SAFETY_BURST_MIN: i64 = 4;

// Static heating used until enough history exists: (on hour, off hour).
const FALLBACK_WINDOWS: &[(u32, u32)] = &[(1, 6), (13, 14)];

/// One fixed on/off pair of the static schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatingWindow {
    pub on: NaiveTime,
    pub off: NaiveTime,
}

/// Timing rules for planning and for the safety monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Local time of the daily planning cycle.
    pub forecast_at: NaiveTime,
    /// Heating finishes this long before predicted use.
    pub heat_margin_min: i64,
    /// Below this many days of history only the static schedule runs.
    pub min_history_days: i64,
    pub fallback_windows: Vec<HeatingWindow>,
    pub safety_interval_min: i64,
    pub safety_burst_min: i64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            forecast_at: NaiveTime::from_hms_opt(FORECAST_HOUR, FORECAST_MINUTE, 0)
                .unwrap_or(NaiveTime::MIN),
            heat_margin_min: HEAT_MARGIN_MIN,
            min_history_days: MIN_HISTORY_DAYS,
            fallback_windows: FALLBACK_WINDOWS
                .iter()
                .filter_map(|&(on, off)| {
                    Some(HeatingWindow {
                        on: NaiveTime::from_hms_opt(on, 0, 0)?,
                        off: NaiveTime::from_hms_opt(off, 0, 0)?,
                    })
                })
                .collect(),
            safety_interval_min: SAFETY_INTERVAL_MIN,
            safety_burst_min: SAFETY_BURST_MIN,
        }
    }
}

impl ScheduleSettings {
    pub fn heat_margin(&self) -> Duration {
        Duration::minutes(self.heat_margin_min)
    }

    pub fn safety_interval(&self) -> Duration {
        Duration::minutes(self.safety_interval_min)
    }

    pub fn safety_burst(&self) -> Duration {
        Duration::minutes(self.safety_burst_min)
    }
}

/// What a timer does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    TurnOn,
    TurnOff,
    /// Re-plan the rest of the day from the live tank temperature.
    PlanAfternoon {
        forecast: ForecastProfile,
        checkpoint: NaiveDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub at: NaiveDateTime,
    #[serde(flatten)]
    pub job: Job,
}

/// Timestamped directives for the plug, in firing order. Each planning cycle
/// produces a fresh one; nothing is merged with earlier schedules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchSchedule {
    jobs: Vec<ScheduledJob>,
}

impl SwitchSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: NaiveDateTime, job: Job) {
        let pos = self.jobs.partition_point(|j| j.at <= at);
        self.jobs.insert(pos, ScheduledJob { at, job });
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl IntoIterator for SwitchSchedule {
    type Item = ScheduledJob;
    type IntoIter = std::vec::IntoIter<ScheduledJob>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

/// The fixed heating plan used without a usable forecast.
pub fn static_schedule(day: NaiveDate, settings: &ScheduleSettings) -> SwitchSchedule {
    let mut schedule = SwitchSchedule::new();
    for window in &settings.fallback_windows {
        schedule.push(day.and_time(window.on), Job::TurnOn);
        schedule.push(day.and_time(window.off), Job::TurnOff);
    }
    schedule
}

//! Hot-water usage forecasting and heating schedules for a smart-plug driven
//! water heater.
//!
//! Tank temperature history is turned into draws, draws into hourly usage,
//! same-weekday usage into a forecast, and the forecast into plug on/off times.

pub mod calibration;
pub mod correction;
pub mod cycle;
pub mod draws;
pub mod error;
pub mod forecast;
pub mod planner;
pub mod profile;
pub mod safety;
pub mod schedule;
pub mod store;
pub mod switch;
pub mod usage;

pub use calibration::{Calibration, SensorCorrection};
pub use cycle::{plan_day, DayPlan, PlanMode};
pub use error::{Error, Result};
pub use forecast::{forecast, ForecastProfile};
pub use profile::UsageProfile;
pub use safety::{SafetyMonitor, SafetyState};
pub use schedule::{Job, ScheduleSettings, ScheduledJob, SwitchSchedule};
pub use store::{DaySamples, TemperatureSample, TemperatureStore};
pub use switch::PowerSwitch;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use smart_boiler::planner::afternoon_schedule;
use smart_boiler::{
    plan_day, Calibration, DayPlan, ForecastProfile, Job, PowerSwitch, SafetyMonitor, SafetyState,
    ScheduleSettings, ScheduledJob, SwitchSchedule, TemperatureSample, TemperatureStore,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Jobs this late are still run; older ones are dropped.
const LATE_GRACE_SEC: i64 = 60;

pub type SharedStore = Arc<dyn TemperatureStore + Send + Sync>;
pub type SharedSwitch = Arc<dyn PowerSwitch + Send + Sync>;

/// Snapshot served by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerState {
    pub plan: Option<DayPlan>,
    pub pending: Vec<ScheduledJob>,
    pub safety: SafetyState,
    pub last_tank: Option<TemperatureSample>,
    pub plug_on: Option<bool>,
    pub last_error: Option<String>,
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState {
            plan: None,
            pending: Vec::new(),
            safety: SafetyState::Idle,
            last_tank: None,
            plug_on: None,
            last_error: None,
        }
    }
}

pub type SharedState = Arc<RwLock<ControllerState>>;

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Next time of day `at` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Owns the timers: every scheduled job becomes a task that sleeps until its
/// time. Pending jobs are never cancelled; plug commands are idempotent.
#[derive(Clone)]
pub struct JobRunner {
    store: SharedStore,
    switch: SharedSwitch,
    calibration: Arc<Calibration>,
    settings: Arc<ScheduleSettings>,
    state: SharedState,
}

impl JobRunner {
    pub fn new(
        store: SharedStore,
        switch: SharedSwitch,
        calibration: Calibration,
        settings: ScheduleSettings,
        state: SharedState,
    ) -> Self {
        JobRunner {
            store,
            switch,
            calibration: Arc::new(calibration),
            settings: Arc::new(settings),
            state,
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub async fn enqueue(&self, schedule: SwitchSchedule) {
        let now = now();
        let mut state = self.state.write().await;
        for job in schedule {
            if job.at < now - Duration::seconds(LATE_GRACE_SEC) {
                tracing::debug!(at = %job.at, job = ?job.job, "skipping past job");
                continue;
            }
            state.pending.push(job.clone());
            let runner = self.clone();
            tokio::spawn(async move {
                let wait = (job.at - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                runner.fire(job).await;
            });
        }
        state.pending.sort_by_key(|j| j.at);
    }

    async fn fire(&self, job: ScheduledJob) {
        {
            let mut state = self.state.write().await;
            if let Some(pos) = state.pending.iter().position(|p| *p == job) {
                state.pending.remove(pos);
            }
        }
        match job.job {
            // failures are logged and kept in the status
            Job::TurnOn => {
                let _ = self.switch(true).await;
            }
            Job::TurnOff => {
                let _ = self.switch(false).await;
            }
            Job::PlanAfternoon {
                forecast,
                checkpoint,
            } => self.plan_afternoon(forecast, checkpoint).await,
        }
    }

    /// Commands the plug off the async threads and records the outcome.
    pub async fn switch(&self, on: bool) -> anyhow::Result<()> {
        let switch = self.switch.clone();
        let result = tokio::task::spawn_blocking(move || switch.set(on))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);
        let mut state = self.state.write().await;
        match &result {
            Ok(()) => {
                tracing::info!(on, "plug switched");
                state.plug_on = Some(on);
            }
            Err(e) => {
                tracing::error!(on, "plug command failed: {e:#}");
                state.last_error = Some(format!("plug: {e:#}"));
            }
        }
        result
    }

    async fn latest_tank(&self) -> anyhow::Result<TemperatureSample> {
        let store = self.store.clone();
        let sample = tokio::task::spawn_blocking(move || store.query_latest()).await??;
        self.state.write().await.last_tank = Some(sample);
        Ok(sample)
    }

    fn plan_afternoon(
        &self,
        forecast: ForecastProfile,
        checkpoint: NaiveDateTime,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        async move {
            let result = async {
                let sample = self.latest_tank().await?;
                Ok::<_, anyhow::Error>(afternoon_schedule(
                    &forecast,
                    checkpoint,
                    sample.value,
                    now(),
                    &self.calibration,
                    &self.settings,
                )?)
            }
            .await;

            match result {
                Ok(schedule) => self.enqueue(schedule).await,
                Err(e) => {
                    tracing::error!("afternoon planning failed: {e:#}");
                    self.state.write().await.last_error = Some(format!("afternoon: {e:#}"));
                }
            }
        }
    }

    /// Runs the planning cycle for `day` and schedules its directives. Store
    /// failures fall back to the static schedule.
    pub async fn plan(&self, day: NaiveDate) -> DayPlan {
        let store = self.store.clone();
        let calibration = self.calibration.clone();
        let settings = self.settings.clone();
        let result = tokio::task::spawn_blocking(move || {
            plan_day(store.as_ref(), day, &calibration, &settings)
        })
        .await;

        let plan = match result {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                tracing::error!(%day, "planning failed: {e}");
                self.state.write().await.last_error = Some(format!("planning: {e}"));
                DayPlan::fallback(day, &self.settings, e.to_string())
            }
            Err(e) => {
                tracing::error!(%day, "planning task failed: {e}");
                DayPlan::fallback(day, &self.settings, e.to_string())
            }
        };

        tracing::info!(%day, jobs = plan.schedule.len(), static_plan = plan.is_static(), "day planned");
        self.enqueue(plan.schedule.clone()).await;
        self.state.write().await.plan = Some(plan.clone());
        plan
    }

    /// Plans every day at the configured time of day.
    pub async fn run_daily(self) {
        loop {
            let now = now();
            let next = next_occurrence(now, self.settings.forecast_at);
            tracing::debug!(%next, "next planning cycle");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
            self.plan(next.date()).await;
        }
    }

    /// Checks the tank against the safety floor on a fixed interval.
    pub async fn run_safety(self) {
        let mut monitor = SafetyMonitor::new((*self.calibration).clone(), (*self.settings).clone());
        let period = self
            .settings
            .safety_interval()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match self.latest_tank().await {
                Ok(sample) => {
                    if let Some(burst) = monitor.check(sample.value, now()) {
                        self.enqueue(burst).await;
                    }
                    self.state.write().await.safety = monitor.state();
                }
                Err(e) => tracing::warn!("safety check skipped: {e:#}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_boiler::{DaySamples, Error};
    use std::sync::Mutex;

    struct RecordingSwitch {
        calls: Mutex<Vec<bool>>,
    }

    impl PowerSwitch for RecordingSwitch {
        fn turn_on(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(true);
            Ok(())
        }
        fn turn_off(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(false);
            Ok(())
        }
    }

    struct ColdTank;

    impl TemperatureStore for ColdTank {
        fn query_day(&self, day: NaiveDate) -> smart_boiler::Result<DaySamples> {
            Err(Error::SensorReadFailure(format!("nothing on {day}")))
        }
        fn query_latest(&self) -> smart_boiler::Result<TemperatureSample> {
            Ok(TemperatureSample {
                timestamp: now(),
                value: 36.0,
            })
        }
        fn query_first(&self) -> smart_boiler::Result<TemperatureSample> {
            Ok(TemperatureSample {
                timestamp: now() - Duration::days(3),
                value: 36.0,
            })
        }
    }

    fn runner() -> (JobRunner, Arc<RecordingSwitch>) {
        let switch = Arc::new(RecordingSwitch {
            calls: Mutex::new(Vec::new()),
        });
        let runner = JobRunner::new(
            Arc::new(ColdTank),
            switch.clone(),
            Calibration::default(),
            ScheduleSettings::default(),
            SharedState::default(),
        );
        (runner, switch)
    }

    async fn wait_for_calls(switch: &RecordingSwitch, n: usize) -> Vec<bool> {
        for _ in 0..200 {
            let calls = switch.calls.lock().unwrap().clone();
            if calls.len() >= n {
                // let the runner record the outcome
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                return calls;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        switch.calls.lock().unwrap().clone()
    }

    #[test]
    fn next_occurrence_rolls_over() {
        let at = NaiveTime::from_hms_opt(0, 15, 0).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            next_occurrence(day.and_hms_opt(0, 10, 0).unwrap(), at),
            day.and_time(at)
        );
        assert_eq!(
            next_occurrence(day.and_hms_opt(0, 15, 0).unwrap(), at),
            day.succ_opt().unwrap().and_time(at)
        );
    }

    #[tokio::test]
    async fn due_jobs_switch_the_plug() {
        let (runner, switch) = runner();
        let mut schedule = SwitchSchedule::new();
        schedule.push(now() - Duration::seconds(5), Job::TurnOn);
        schedule.push(now() + Duration::milliseconds(50), Job::TurnOff);
        runner.enqueue(schedule).await;

        assert_eq!(wait_for_calls(&switch, 2).await, vec![true, false]);
        let state = runner.state();
        assert_eq!(state.read().await.plug_on, Some(false));
        assert!(state.read().await.pending.is_empty());
    }

    #[tokio::test]
    async fn stale_jobs_are_dropped() {
        let (runner, switch) = runner();
        let mut schedule = SwitchSchedule::new();
        schedule.push(now() - Duration::hours(2), Job::TurnOn);
        runner.enqueue(schedule).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(switch.calls.lock().unwrap().is_empty());
        assert!(runner.state().read().await.pending.is_empty());
    }

    #[tokio::test]
    async fn young_installation_gets_static_plan() {
        let (runner, _switch) = runner();
        let today = now().date();
        let plan = runner.plan(today).await;
        assert!(plan.is_static());
        let state = runner.state();
        assert!(state.read().await.plan.is_some());
    }

    #[tokio::test]
    async fn afternoon_job_heats_a_cold_tank() {
        let (runner, switch) = runner();
        let mut hours = [0.0; 24];
        hours[19] = 20.0;
        let checkpoint = now();
        let mut schedule = SwitchSchedule::new();
        schedule.push(
            checkpoint,
            Job::PlanAfternoon {
                forecast: ForecastProfile::new(hours),
                checkpoint,
            },
        );
        runner.enqueue(schedule).await;

        assert_eq!(wait_for_calls(&switch, 1).await, vec![true]);
        let state = runner.state();
        let pending = state.read().await.pending.clone();
        assert!(pending.iter().any(|j| j.job == Job::TurnOff));
    }
}

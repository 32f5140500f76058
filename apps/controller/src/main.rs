pub mod config;
pub mod influx;
pub mod plug;
pub mod runner;
pub mod web;

use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::influx::InfluxStore;
use crate::plug::PlugSwitch;
use crate::runner::{JobRunner, SharedState};
use crate::web::{create_web_server, WebState};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        influx = %config.influx.url,
        plug = %config.plug.host,
        forecast_at = %config.schedule.forecast_at,
        "starting boiler controller"
    );

    // Blocking HTTP clients must be built outside the async runtime.
    let store = InfluxStore::new(config.influx.clone()).context("creating influx client")?;
    let switch = PlugSwitch::new(&config.plug);
    let plug = switch.plug().clone();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(switch),
            config.calibration,
            config.schedule,
            SharedState::default(),
        );

        runner.plan(Local::now().date_naive()).await;

        tokio::spawn(runner.clone().run_daily());
        tokio::spawn(runner.clone().run_safety());

        create_web_server(&config.web.bind, WebState { runner, plug }).await
    })
}

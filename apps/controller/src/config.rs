use anyhow::{Context, Result};
use serde::Deserialize;
use smart_boiler::{Calibration, ScheduleSettings};
use std::path::Path;

pub const CONFIG_ENV: &str = "SMART_BOILER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "boiler.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration: Calibration,
    pub schedule: ScheduleSettings,
    pub influx: InfluxConfig,
    pub plug: PlugConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub pipe_measurement: String,
    pub tank_measurement: String,
    pub timeout_sec: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        InfluxConfig {
            url: "http://localhost:8086".to_string(),
            database: "sensors".to_string(),
            username: Some("telegraf".to_string()),
            password: Some("telegraf".to_string()),
            pipe_measurement: "temp_pipe".to_string(),
            tank_measurement: "temp_tank".to_string(),
            timeout_sec: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlugConfig {
    pub host: String,
    pub port: u16,
    pub timeout_sec: u64,
}

impl Default for PlugConfig {
    fn default() -> Self {
        PlugConfig {
            host: "192.168.1.100".to_string(),
            port: boiler_protocol::kasa::KASA_PORT,
            timeout_sec: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    /// Reads the TOML file at `path`; a missing file means all defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_env() -> Result<Config> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Config::load(Path::new(&path))
    }
}

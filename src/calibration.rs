use serde::{Deserialize, Serialize};

// --- Installation constants ---
const TANK_VOLUME_L: f64 = 80.0;
const HEATER_POWER_W: f64 = 2400.0;
const HEATER_EFFICIENCY: f64 = 0.98;
const SPECIFIC_HEAT_WATER: f64 = 4175.0; // J/(kg*K) at 40 degrees
const COLD_WATER_C: f64 = 8.7;
const NORMAL_WATER_C: f64 = 37.0;
const MIN_TANK_C: f64 = 40.0;

// Wrap sensor vs. water temperature, measured around 42 degrees on the wrap.
const SENSOR_REFERENCE_C: f64 = 42.0;
const SENSOR_OFFSET_C: f64 = 13.5;
const SENSOR_OFFSET_SLOPE: f64 = 0.525; // per 0.1 degree on the sensor
const SENSOR_WATER_SLOPE: f64 = 0.625; // per 0.1 degree on the sensor
const SENSOR_AMBIENT_CUTOFF_C: f64 = 38.0;

const DRAW_NOISE_THRESHOLD_C: f64 = 0.2;

/// Physical parameters of the tank, heater and sensor. Loaded once and passed
/// by reference into every calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub tank_volume_l: f64,
    pub heater_power_w: f64,
    pub heater_efficiency: f64,
    pub specific_heat: f64,
    pub cold_water_c: f64,
    pub normal_water_c: f64,
    /// Safety floor for the water inside the tank.
    pub min_tank_c: f64,
    /// Minimum drop across the detector window that counts as a draw.
    pub draw_noise_threshold_c: f64,
    pub sensor: SensorCorrection,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            tank_volume_l: TANK_VOLUME_L,
            heater_power_w: HEATER_POWER_W,
            heater_efficiency: HEATER_EFFICIENCY,
            specific_heat: SPECIFIC_HEAT_WATER,
            cold_water_c: COLD_WATER_C,
            normal_water_c: NORMAL_WATER_C,
            min_tank_c: MIN_TANK_C,
            draw_noise_threshold_c: DRAW_NOISE_THRESHOLD_C,
            sensor: SensorCorrection::default(),
        }
    }
}

/// Piecewise-linear mapping from the tank wrap sensor to water temperature.
/// Empirical, only valid for the installation it was measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorCorrection {
    pub reference_c: f64,
    /// Water minus wrap temperature when the wrap reads `reference_c`.
    pub offset_c: f64,
    /// Offset change per 0.1 degree of sensor distance from the reference.
    pub offset_slope: f64,
    /// Water temperature change per 0.1 degree change on the sensor.
    pub water_change_slope: f64,
    /// Below this the sensor mostly follows room air and is used raw.
    pub ambient_cutoff_c: f64,
}

impl Default for SensorCorrection {
    fn default() -> Self {
        SensorCorrection {
            reference_c: SENSOR_REFERENCE_C,
            offset_c: SENSOR_OFFSET_C,
            offset_slope: SENSOR_OFFSET_SLOPE,
            water_change_slope: SENSOR_WATER_SLOPE,
            ambient_cutoff_c: SENSOR_AMBIENT_CUTOFF_C,
        }
    }
}

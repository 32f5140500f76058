use crate::calibration::Calibration;
use crate::error::{Error, Result};

const EPSILON: f64 = 1e-9;

fn checked_div(numerator: f64, denominator: f64, what: &str) -> Result<f64> {
    if denominator.abs() < EPSILON {
        return Err(Error::DegenerateUsage(format!("{what}: zero denominator")));
    }
    Ok(numerator / denominator)
}

impl Calibration {
    /// Liters drawn from the tank while water temperature moved from `before`
    /// to `after`, with cold water refilling the drawn volume.
    pub fn liters_used(&self, before: f64, after: f64) -> Result<f64> {
        checked_div(
            self.tank_volume_l * (after - before),
            self.cold_water_c - before,
            "liters used",
        )
    }

    /// Rescales `liters` drawn at `before` degrees to the equivalent volume
    /// at normal temperature.
    pub fn normalize(&self, before: f64, liters: f64) -> Result<f64> {
        let ratio = checked_div(
            before - self.normal_water_c,
            self.normal_water_c - self.cold_water_c,
            "normalize",
        )?;
        Ok(liters + liters * ratio)
    }

    /// Inverse of [`Calibration::normalize`].
    pub fn denormalize(&self, before: f64, normalized: f64) -> Result<f64> {
        let span = self.normal_water_c - self.cold_water_c;
        checked_div(normalized * span, before - self.cold_water_c, "denormalize")
    }

    /// Hot water volume available at normal temperature when the whole tank
    /// is at `tank_c`.
    pub fn max_production(&self, tank_c: f64) -> Result<f64> {
        self.normalize(tank_c, self.tank_volume_l)
    }

    /// Normalized liters of one draw, given raw wrap readings.
    pub fn draw_liters(&self, sensor_before: f64, sensor_after: f64) -> Result<f64> {
        let (before, after) = self.sensor.correct_temperatures(sensor_before, sensor_after);
        let liters = self.liters_used(before, after)?;
        Ok(self.normalize(before, liters)?.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_from_hot_tank() -> anyhow::Result<()> {
        let c = Calibration::default();
        // 60 -> 50 degrees in an 80 l tank with 8.7 degree inflow
        let liters = c.liters_used(60.0, 50.0)?;
        assert!((liters - 800.0 / 51.3).abs() < 1e-9, "{liters}");
        Ok(())
    }

    #[test]
    fn normalized_volume_is_larger_for_hotter_water() -> anyhow::Result<()> {
        let c = Calibration::default();
        let liters = 10.0;
        assert!(c.normalize(60.0, liters)? > liters);
        assert!((c.normalize(37.0, liters)? - liters).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn denormalize_recovers_liters() -> anyhow::Result<()> {
        let c = Calibration::default();
        for before in [39.0, 45.5, 52.0, 68.25] {
            let liters = c.liters_used(before, before - 3.0)?;
            let back = c.denormalize(before, c.normalize(before, liters)?)?;
            assert!((back - liters).abs() < 1e-9, "{before}: {back} vs {liters}");
        }
        Ok(())
    }

    #[test]
    fn cold_tank_is_degenerate() {
        let c = Calibration::default();
        assert!(matches!(
            c.liters_used(8.7, 8.0),
            Err(Error::DegenerateUsage(_))
        ));
    }

    #[test]
    fn max_production() -> anyhow::Result<()> {
        let c = Calibration::default();
        assert!((c.max_production(37.0)? - 80.0).abs() < 1e-9);
        assert!(c.max_production(60.0)? > 80.0);
        Ok(())
    }
}

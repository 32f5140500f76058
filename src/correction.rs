use crate::calibration::SensorCorrection;

impl SensorCorrection {
    /// Water temperature for a single wrap reading.
    pub fn water_temperature(&self, sensor: f64) -> f64 {
        if sensor < self.ambient_cutoff_c {
            return sensor;
        }
        sensor + self.offset_c + (sensor - self.reference_c) * 10.0 * self.offset_slope
    }

    /// Maps a (before, after) pair of wrap readings to water temperatures. The
    /// change between the two is projected with its own slope.
    pub fn correct_temperatures(&self, before: f64, after: f64) -> (f64, f64) {
        let real_before = self.water_temperature(before);
        let real_after = real_before + (after - before) * 10.0 * self.water_change_slope;
        (real_before, real_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reference_point_adds_plain_offset() {
        let c = SensorCorrection::default();
        let (before, after) = c.correct_temperatures(42.0, 42.0);
        assert!(close(before, 55.5), "{before}");
        assert!(close(after, 55.5), "{after}");
    }

    #[test]
    fn offset_grows_above_reference_and_shrinks_below() {
        let c = SensorCorrection::default();
        assert!(close(c.water_temperature(44.0), 44.0 + 13.5 + 10.5));
        assert!(close(c.water_temperature(40.0), 40.0 + 13.5 - 10.5));
    }

    #[test]
    fn ambient_readings_are_used_raw() {
        let c = SensorCorrection::default();
        assert!(close(c.water_temperature(37.9), 37.9));
        let (before, after) = c.correct_temperatures(30.0, 29.0);
        assert!(close(before, 30.0));
        assert!(close(after, 30.0 - 6.25));
    }

    #[test]
    fn change_is_scaled_separately() {
        let c = SensorCorrection::default();
        let (before, after) = c.correct_temperatures(45.0, 44.0);
        assert!(close(after - before, -6.25));
    }
}

//! Battery charge estimate from the raw divider reading.
//!
//! The divider is calibrated with two raw ADC readings: the count seen with an
//! empty cell and the count seen with a full one. The charge is linear between
//! them and clamped outside.

use core::ops::Range;

use crate::config::BatteryCalibration;

pub struct ChargeEstimator {
    raw_range: Range<f32>,
}

impl ChargeEstimator {
    /// Creates an estimator for the given calibration bounds in raw ADC counts.
    #[inline]
    pub const fn new(min_raw: u16, max_raw: u16) -> Self {
        Self {
            raw_range: min_raw as f32..max_raw as f32,
        }
    }

    #[inline]
    pub const fn from_calibration(calibration: &BatteryCalibration) -> Self {
        Self::new(calibration.min_raw, calibration.max_raw)
    }

    /// Charge in percent, clamped to `0.0..=100.0`.
    ///
    /// ```
    /// use station_core::ChargeEstimator;
    ///
    /// let estimator = ChargeEstimator::new(600, 800);
    ///
    /// assert_eq!(estimator.charge_percent(700.0), 50.0);
    /// assert_eq!(estimator.charge_percent(900.0), 100.0);
    /// ```
    pub fn charge_percent(&self, raw: f32) -> f32 {
        let span = self.raw_range.end - self.raw_range.start;
        let percent = ((raw - self.raw_range.start) / span) * 100.0;

        // A degenerate calibration yields NaN or infinity, `clamp` would keep NaN.
        if percent.is_nan() {
            return 0.0;
        }

        percent.clamp(0.0, 100.0)
    }

    /// Whether the supply is high enough for the sensor readings to be trusted.
    /// Readings at or below the lower bound are unreliable.
    #[inline]
    pub fn is_sufficient(&self, raw: f32) -> bool {
        raw > self.raw_range.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_is_zero_at_or_below_lower_bound() {
        let estimator = ChargeEstimator::new(605, 814);

        for raw in [0.0, 300.0, 604.0, 605.0] {
            assert_eq!(estimator.charge_percent(raw), 0.0);
            assert!(!estimator.is_sufficient(raw));
        }
        assert!(estimator.is_sufficient(606.0));
    }

    #[test]
    fn charge_is_full_at_or_above_upper_bound() {
        let estimator = ChargeEstimator::new(605, 814);

        for raw in [814.0, 815.0, 1023.0, 4095.0] {
            assert_eq!(estimator.charge_percent(raw), 100.0);
        }
    }

    #[test]
    fn charge_is_half_at_midpoint() {
        let estimator = ChargeEstimator::new(605, 814);
        let midpoint = 605.0 + (814.0 - 605.0) / 2.0;

        assert!((estimator.charge_percent(midpoint) - 50.0).abs() < 1e-3);
        assert_eq!(ChargeEstimator::new(600, 800).charge_percent(700.0), 50.0);
    }

    #[test]
    fn charge_is_monotonic_within_calibration() {
        let estimator = ChargeEstimator::new(605, 814);

        let mut previous = estimator.charge_percent(605.0);
        for raw in 606..=814 {
            let charge = estimator.charge_percent(raw as f32);
            assert!(charge >= previous, "{} dropped below {}", charge, previous);
            previous = charge;
        }
    }

    #[test]
    fn degenerate_calibration_does_not_produce_nan() {
        let estimator = ChargeEstimator::new(700, 700);

        assert_eq!(estimator.charge_percent(700.0), 0.0);
        assert_eq!(estimator.charge_percent(800.0), 100.0);
        assert_eq!(estimator.charge_percent(600.0), 0.0);
    }

    #[test]
    fn from_calibration_uses_bounds() {
        let estimator = ChargeEstimator::from_calibration(&BatteryCalibration {
            min_raw: 600,
            max_raw: 800,
        });

        assert_eq!(estimator.charge_percent(650.0), 25.0);
    }
}

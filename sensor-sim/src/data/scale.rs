//! Affine reading-to-temperature conversion.

use crate::config::{ScaleConfig, WaveformConfig};
use crate::data::sample::{MilliCelsius, Millivolts};

/// Maps `[lower, upper]` mV linearly onto `[t_lower, t_upper]` m°C.
///
/// Computed in `f64` as `offset / reading_range * temperature_range` and
/// truncated toward zero. The boundaries map exactly and the map is strictly
/// increasing whenever the temperature range is at least as wide as the
/// reading range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    lower: u32,
    reading_range: f64,
    t_lower: i32,
    temperature_range: f64,
}

impl Scale {
    #[must_use]
    pub fn new(waveform: &WaveformConfig, scale: &ScaleConfig) -> Self {
        Self {
            lower: waveform.lower,
            reading_range: f64::from(waveform.upper - waveform.lower),
            t_lower: scale.t_lower,
            temperature_range: f64::from(scale.t_upper) - f64::from(scale.t_lower),
        }
    }

    /// Converts a raw reading. Readings outside the bounds extrapolate.
    #[must_use]
    pub fn convert(&self, reading: Millivolts) -> MilliCelsius {
        let offset = f64::from(reading.0) - f64::from(self.lower);
        // Divide first: the reference output truncates this exact expression.
        let value =
            offset / self.reading_range * self.temperature_range + f64::from(self.t_lower);
        // `as` saturates at the i32 limits and truncates toward zero.
        MilliCelsius(value as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scale() -> Scale {
        Scale::new(&WaveformConfig::default(), &ScaleConfig::default())
    }

    #[test]
    fn bounds_map_exactly() {
        let scale = default_scale();
        assert_eq!(scale.convert(Millivolts(0)), MilliCelsius(-25_000));
        assert_eq!(scale.convert(Millivolts(10_000)), MilliCelsius(85_000));
    }

    #[test]
    fn midpoint_maps_to_midpoint() {
        assert_eq!(default_scale().convert(Millivolts(5_000)), MilliCelsius(30_000));
    }

    #[test]
    fn strictly_increasing_over_whole_range() {
        let scale = default_scale();
        let mut previous = scale.convert(Millivolts(0));
        for mv in 1..=10_000 {
            let current = scale.convert(Millivolts(mv));
            assert!(current > previous, "{mv} mV: {current:?} <= {previous:?}");
            previous = current;
        }
    }

    #[test]
    fn truncation_follows_divide_then_multiply() {
        // 1254 / 10000 * 110000 lands just below 13794 before the offset.
        assert_eq!(default_scale().convert(Millivolts(1_254)), MilliCelsius(-11_205));
        assert_eq!(default_scale().convert(Millivolts(1_259)), MilliCelsius(-11_150));
    }

    #[test]
    fn offset_bounds_are_respected() {
        let waveform = WaveformConfig {
            lower: 1_000,
            upper: 3_000,
            steps: 20,
        };
        let scale = Scale::new(&waveform, &ScaleConfig::default());

        assert_eq!(scale.convert(Millivolts(1_000)), MilliCelsius(-25_000));
        assert_eq!(scale.convert(Millivolts(2_000)), MilliCelsius(30_000));
        assert_eq!(scale.convert(Millivolts(3_000)), MilliCelsius(85_000));
    }
}

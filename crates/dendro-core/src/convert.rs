//! Voltage to displacement conversion.
//!
//! Dendrometers output a voltage linear in displacement, with full-scale
//! voltage equal to the sensor's micron range.

use serde::Serialize;

/// Supply/full-scale voltage of the sensor divider.
pub const DEFAULT_REFERENCE_VOLTAGE: f64 = 3.3;

/// How negative displacements are treated.
///
/// A negative reading is physically impossible and comes from sensor or ADC
/// offset noise near zero. Whether to keep it is a logging decision, so it is
/// applied the same way to every output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clamp {
    /// Record the value as computed.
    #[default]
    None,
    /// Floor the value at 0.0.
    Negative,
}

impl std::fmt::Display for Clamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Convert an averaged voltage to microns.
pub fn to_microns(average_voltage: f64, micron_scale: u32, reference_voltage: f64, clamp: Clamp) -> f64 {
    let microns = average_voltage / reference_voltage * f64::from(micron_scale);
    match clamp {
        Clamp::None => microns,
        Clamp::Negative => microns.max(0.0),
    }
}

/// Convert a possibly-missing average. `None` stays `None`.
pub fn convert_reading(
    average_voltage: Option<f64>,
    micron_scale: u32,
    reference_voltage: f64,
    clamp: Clamp,
) -> Option<f64> {
    average_voltage.map(|v| to_microns(v, micron_scale, reference_voltage, clamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_round_trips() {
        for scale in [1, 15000, 25400, 100_000, u32::MAX] {
            assert_eq!(
                to_microns(3.3, scale, DEFAULT_REFERENCE_VOLTAGE, Clamp::None),
                f64::from(scale)
            );
        }
    }

    #[test]
    fn test_half_scale() {
        let m = to_microns(1.65, 15000, 3.3, Clamp::None);
        assert!((m - 7500.0).abs() < 1e-9);
        let m = to_microns(1.65, 25400, 3.3, Clamp::None);
        assert!((m - 12700.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_unclamped() {
        assert!(to_microns(-0.1, 15000, 3.3, Clamp::None) < 0.0);
    }

    #[test]
    fn test_negative_clamped_to_zero() {
        assert_eq!(to_microns(-0.1, 15000, 3.3, Clamp::Negative), 0.0);
    }

    #[test]
    fn test_clamp_leaves_positive_values() {
        assert_eq!(
            to_microns(1.0, 3300, 3.3, Clamp::Negative),
            to_microns(1.0, 3300, 3.3, Clamp::None)
        );
    }

    #[test]
    fn test_sentinel_passes_through() {
        assert_eq!(convert_reading(None, 15000, 3.3, Clamp::None), None);
        assert_eq!(convert_reading(None, 15000, 3.3, Clamp::Negative), None);
    }

    #[test]
    fn test_custom_reference_voltage() {
        assert_eq!(to_microns(5.0, 25400, 5.0, Clamp::None), 25400.0);
    }
}

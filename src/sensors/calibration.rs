/// Linear calibration of the anemometer ADC channel
use thiserror::Error;

/// ADC reading at which the factory mapping tops out.
const ADC_DOMAIN_MAX: f64 = 328.0;
/// Wind speed in m/s corresponding to the top of the ADC domain.
const SPEED_RANGE_MAX: f64 = 32.0;
/// 1 m/s = 3.6 km/h.
const MS_TO_KPH: f64 = 3.6;

/// Malformed calibration constants. A configuration defect: fatal at
/// construction time, never produced mid-cycle.
#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("degenerate ADC domain [{min}, {max}]: mapping is undefined")]
    DegenerateDomain { min: f64, max: f64 },
}

/// Two-point linear mapping from raw anemometer ADC words to wind speed.
///
/// A still anemometer does not read zero: the channel idles at a
/// per-install DC offset and wanders a little around it, so readings below
/// the offset are clamped to it instead of going negative. Parameters are
/// fixed at construction and never mutated during operation.
#[derive(Debug, Clone, Copy)]
pub struct WindCalibration {
    offset: u16,
    domain_min: f64,
    domain_max: f64,
    range_min: f64,
    range_max: f64,
}

impl WindCalibration {
    /// Calibration with the factory domain `[0, 328]` ADC -> `[0, 32]` m/s
    /// and a per-install zero-wind offset.
    pub fn new(offset: u16) -> Result<Self, CalibrationError> {
        Self::with_mapping(offset, 0.0, ADC_DOMAIN_MAX, 0.0, SPEED_RANGE_MAX)
    }

    /// Calibration with an explicit mapping, for non-factory hardware.
    pub fn with_mapping(
        offset: u16,
        domain_min: f64,
        domain_max: f64,
        range_min: f64,
        range_max: f64,
    ) -> Result<Self, CalibrationError> {
        if domain_max == domain_min {
            return Err(CalibrationError::DegenerateDomain {
                min: domain_min,
                max: domain_max,
            });
        }
        Ok(WindCalibration {
            offset,
            domain_min,
            domain_max,
            range_min,
            range_max,
        })
    }

    /// Proportionally scale a value from the ADC domain onto the speed
    /// range, the classic map() idiom.
    fn map_to_speed(&self, value: f64) -> f64 {
        (value - self.domain_min) * (self.range_max - self.range_min)
            / (self.domain_max - self.domain_min)
            + self.range_min
    }

    /// Convert a raw anemometer word to km/h. Returns the unrounded value;
    /// rounding for reporting happens at the caller, after conversion.
    pub fn raw_to_speed_kph(&self, raw: u16) -> f64 {
        // Floor at the offset so ADC jitter around the calibrated zero
        // point cannot produce a negative speed.
        let floored = raw.max(self.offset);
        let adjusted = f64::from(floored - self.offset);

        self.map_to_speed(adjusted) * MS_TO_KPH
    }
}

/// Board temperature from the kernel's thermal zone interface
use std::fs;
use std::path::PathBuf;

use crate::sensors::SensorError;
use crate::utils::round1;

/// Thermal zone exposing the SoC temperature on the station's board.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

pub struct SysThermometer {
    path: PathBuf,
}

impl SysThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SysThermometer { path: path.into() }
    }

    /// Board temperature in degrees Celsius, rounded to one decimal. The
    /// kernel reports millidegrees.
    pub fn read_celsius(&self) -> Result<f64, SensorError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            SensorError::SysTemp(format!("{}: {}", self.path.display(), e))
        })?;

        let millidegrees: i64 = raw.trim().parse().map_err(|_| {
            SensorError::SysTemp(format!(
                "unparseable reading {:?} from {}",
                raw.trim(),
                self.path.display()
            ))
        })?;

        Ok(round1(millidegrees as f64 / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn zone_with_contents(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn converts_millidegrees_to_celsius() {
        let path = zone_with_contents("weatherstn_zone_ok", "48765\n");
        let thermometer = SysThermometer::new(&path);

        assert_eq!(thermometer.read_celsius().unwrap(), 48.8);
    }

    #[test]
    fn garbage_reading_is_an_error_not_a_zero() {
        let path = zone_with_contents("weatherstn_zone_bad", "not-a-number\n");
        let thermometer = SysThermometer::new(&path);

        assert!(matches!(
            thermometer.read_celsius(),
            Err(SensorError::SysTemp(_))
        ));
    }

    #[test]
    fn missing_zone_is_an_error() {
        let thermometer = SysThermometer::new("/nonexistent/thermal/zone");

        assert!(thermometer.read_celsius().is_err());
    }
}

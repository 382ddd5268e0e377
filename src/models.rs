use std::fmt;

use time::OffsetDateTime;

/// One sensor quantity for one poll cycle: either a measured value or no
/// usable data. Absence covers both "module not installed" and "read failed
/// after retries"; a zero value never stands in for either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading<T> {
    Present(T),
    Absent,
}

impl<T> Reading<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Reading::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Reading::Present(value) => Some(value),
            Reading::Absent => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Present(value) => Reading::Present(f(value)),
            Reading::Absent => Reading::Absent,
        }
    }
}

impl<T: fmt::Display> Reading<T> {
    /// Render the value, or `fallback` when no data is available. Used for
    /// the per-cycle summary log.
    pub fn display_or(&self, fallback: &str) -> String {
        match self {
            Reading::Present(value) => value.to_string(),
            Reading::Absent => fallback.to_string(),
        }
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Reading::Present(value),
            None => Reading::Absent,
        }
    }
}

/// One fully-assembled set of readings across all sensor sources.
///
/// Built exactly once per poll cycle, after every source has resolved; the
/// capture timestamp is taken at assembly so the readings are simultaneous
/// with the recorded time, never earlier. Never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub captured_at: OffsetDateTime,
    pub temperature: Reading<f64>,
    pub humidity: Reading<f64>,
    pub pressure: Reading<f64>,
    pub rain_count: Reading<u32>,
    pub wind_heading: Reading<f64>,
    pub wind_avg_kph: Reading<f64>,
    pub wind_max_kph: Reading<f64>,
    pub ambient_light: Reading<u8>,
    pub system_temp: Reading<f64>,
}

impl Snapshot {
    /// True when not a single source produced data this cycle.
    pub fn is_empty(&self) -> bool {
        !(self.temperature.is_present()
            || self.humidity.is_present()
            || self.pressure.is_present()
            || self.rain_count.is_present()
            || self.wind_heading.is_present()
            || self.wind_avg_kph.is_present()
            || self.wind_max_kph.is_present()
            || self.ambient_light.is_present()
            || self.system_temp.is_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> Snapshot {
        Snapshot {
            captured_at: OffsetDateTime::UNIX_EPOCH,
            temperature: Reading::Absent,
            humidity: Reading::Absent,
            pressure: Reading::Absent,
            rain_count: Reading::Absent,
            wind_heading: Reading::Absent,
            wind_avg_kph: Reading::Absent,
            wind_max_kph: Reading::Absent,
            ambient_light: Reading::Absent,
            system_temp: Reading::Absent,
        }
    }

    #[test]
    fn reading_maps_present_and_absent() {
        assert_eq!(Reading::Present(21u8).map(u32::from), Reading::Present(21u32));
        assert_eq!(Reading::<u8>::Absent.map(u32::from), Reading::Absent);
    }

    #[test]
    fn reading_display_uses_fallback_when_absent() {
        assert_eq!(Reading::Present(3.51).display_or("n/a"), "3.51");
        assert_eq!(Reading::<f64>::Absent.display_or("n/a"), "n/a");
    }

    #[test]
    fn snapshot_empty_detection() {
        let mut snapshot = empty_snapshot();
        assert!(snapshot.is_empty());

        snapshot.rain_count = Reading::Present(510);
        assert!(!snapshot.is_empty());
    }
}

/// Sensor orchestration: per-source bounded retry and snapshot assembly
use log::{debug, warn};
use time::OffsetDateTime;

use crate::bus::BusTransport;
use crate::config::ScannerConfig;
use crate::models::{Reading, Snapshot};
use crate::sensors::calibration::{CalibrationError, WindCalibration};
use crate::sensors::compound::{CompoundQuantities, CompoundSensor};
use crate::sensors::heading::{HeadingSensor, HEADING_ADDR};
use crate::sensors::sys_temp::SysThermometer;
use crate::sensors::temp_humid::{TempHumidSensor, TEMP_HUMID_ADDR};
use crate::sensors::SensorError;

/// Per-source resolution state. Each source steps through `Attempting`
/// until it produces a value or exhausts its attempt budget; the terminal
/// states are the only ones callers observe.
enum PollState<T> {
    Attempting(u32),
    Succeeded(T),
    Absent,
}

/// Outcome of one poll attempt against a source.
enum Attempt<T> {
    /// The source produced a value.
    Value(T),
    /// The hardware is permanently missing. Resolves absent at once,
    /// without consuming a retry attempt; this is "not installed", not a
    /// failed read.
    NotFitted,
}

/// Drive one source to a terminal state. Errors are counted locally and
/// never escalate: a source that keeps failing degrades to absent after
/// `max_attempts` tries, leaving every other source untouched.
fn resolve_source<T>(
    name: &str,
    max_attempts: u32,
    mut poll: impl FnMut() -> Result<Attempt<T>, SensorError>,
) -> Reading<T> {
    let mut state = PollState::Attempting(0);

    loop {
        state = match state {
            PollState::Attempting(attempts) => match poll() {
                Ok(Attempt::Value(value)) => PollState::Succeeded(value),
                Ok(Attempt::NotFitted) => {
                    debug!("{} not fitted, resolving absent", name);
                    PollState::Absent
                }
                Err(e) => {
                    let attempts = attempts + 1;
                    if attempts >= max_attempts {
                        warn!("{} absent after {} attempts: {}", name, attempts, e);
                        PollState::Absent
                    } else {
                        debug!("{} attempt {} failed, retrying: {}", name, attempts, e);
                        PollState::Attempting(attempts)
                    }
                }
            },
            PollState::Succeeded(value) => return Reading::Present(value),
            PollState::Absent => return Reading::Absent,
        };
    }
}

/// Polls every sensor source once per cycle and assembles the snapshot.
///
/// Owns the single bus handle; all bus transactions of a cycle are
/// serialized through it. Calibration and addresses are fixed at
/// construction, but module status is re-read every cycle so a freshly
/// failed read is never masked by stale "not installed" state.
pub struct WeatherScanner<B: BusTransport> {
    bus: B,
    compound: CompoundSensor,
    heading: HeadingSensor,
    temp_humid: TempHumidSensor,
    sys_temp: SysThermometer,
    max_attempts: u32,
}

impl<B: BusTransport> WeatherScanner<B> {
    pub fn new(bus: B, config: &ScannerConfig) -> Result<Self, CalibrationError> {
        let calibration = WindCalibration::new(config.wind_offset)?;

        Ok(WeatherScanner {
            bus,
            compound: CompoundSensor::new(config.compound_addr, calibration),
            heading: HeadingSensor::new(HEADING_ADDR, config.mag_offset),
            temp_humid: TempHumidSensor::new(TEMP_HUMID_ADDR),
            sys_temp: SysThermometer::new(&config.thermal_zone),
            max_attempts: config.max_attempts,
        })
    }

    /// Run one full poll cycle.
    ///
    /// Every source resolves independently; a fatal failure in one never
    /// blocks the others. Never fails as a whole: sources that could not
    /// be read come back absent, and a snapshot with absent fields is a
    /// valid outcome the sink must expect.
    pub fn scan_cycle(&mut self) -> Snapshot {
        let max_attempts = self.max_attempts;
        let bus = &mut self.bus;
        let compound = &self.compound;
        let heading = &self.heading;
        let temp_humid = &self.temp_humid;
        let sys_temp = &self.sys_temp;

        // The compound module resolves to one decoded frame; its four
        // quantities are then gated on the capability bits without going
        // back to the bus.
        let frame = resolve_source("compound module", max_attempts, || {
            compound.poll(bus).map(Attempt::Value)
        });
        let quantities = match frame {
            Reading::Present(frame) => {
                let (major, minor) = frame.version();
                debug!(
                    "compound module firmware {}.{}, status {:#04x}",
                    major,
                    minor,
                    frame.status().as_byte()
                );
                compound.quantities(&frame)
            }
            Reading::Absent => CompoundQuantities::absent(),
        };

        let wind_heading = resolve_source("heading sensor", max_attempts, || {
            heading.read_heading(bus).map(Attempt::Value)
        });

        let temp_humid_fix = resolve_source("temperature/humidity sensor", max_attempts, || {
            temp_humid.read(bus).map(Attempt::Value)
        });

        // No barometer module is fitted on this station; the slot stays
        // in the data model and resolves absent every cycle.
        let pressure = resolve_source("barometer", max_attempts, || {
            Ok(Attempt::<f64>::NotFitted)
        });

        let system_temp = resolve_source("system thermometer", max_attempts, || {
            sys_temp.read_celsius().map(Attempt::Value)
        });

        // Timestamp is taken once, after every source has resolved, so
        // the readings are simultaneous with the recorded time.
        let captured_at = OffsetDateTime::now_utc();

        Snapshot {
            captured_at,
            temperature: temp_humid_fix.map(|fix| fix.temperature_c),
            humidity: temp_humid_fix.map(|fix| fix.humidity_pct),
            pressure,
            rain_count: quantities.rain_count,
            wind_heading,
            wind_avg_kph: quantities.wind_avg_kph,
            wind_max_kph: quantities.wind_max_kph,
            ambient_light: quantities.ambient_light,
            system_temp,
        }
    }
}

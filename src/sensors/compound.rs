/// Compound weather-sensor module: register protocol and driver
use std::thread;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::bus::BusTransport;
use crate::models::Reading;
use crate::sensors::calibration::WindCalibration;
use crate::sensors::SensorError;
use crate::utils::round2;

/// Default bus address of the compound module.
pub const COMPOUND_ADDR: u8 = 0x64;

/// Actual number of one-byte registers.
pub const REG_COUNT: usize = 12;

// Register name -> location
const REG_FW_MAJOR: u8 = 0;
const REG_FW_MINOR: u8 = 1;
const REG_STATUS: u8 = 2;
const REG_RAIN_MSB: u8 = 3;
const REG_RAIN_2SB: u8 = 4;
const REG_RAIN_3SB: u8 = 5;
const REG_RAIN_LSB: u8 = 6;
const REG_WIND_AVG_MSB: u8 = 7;
const REG_WIND_AVG_LSB: u8 = 8;
const REG_WIND_MAX_MSB: u8 = 9;
const REG_WIND_MAX_LSB: u8 = 10;
const REG_LIGHT_AVG: u8 = 11;

/// How long the module gets to settle before the single re-poll when it
/// reports stale data.
const DATA_SETTLE: Duration = Duration::from_millis(100);

/// Status register bitmask. Bits beyond the five defined ones are reserved
/// and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags(u8);

impl StatusFlags {
    /// Module has completed its first internal poll since power-up.
    pub const INIT_POLL: u8 = 0x01;
    /// Fresh data is ready to be read.
    pub const DATA_READY: u8 = 0x02;
    /// Anemometer module populated.
    pub const WIND: u8 = 0x04;
    /// Rain gauge module populated.
    pub const RAIN: u8 = 0x08;
    /// Ambient light module populated.
    pub const LIGHT: u8 = 0x10;

    pub fn from_byte(byte: u8) -> Self {
        StatusFlags(byte)
    }

    /// True iff every bit in `mask` is set. Composite masks (for example
    /// `DATA_READY | WIND`) require all their bits.
    pub fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }
}

/// Raw register read came back with the wrong length. Treated exactly like
/// a bus error by the orchestrator: the attempt produced unusable data.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("register frame must be exactly {REG_COUNT} bytes, got {0}")]
pub struct FrameLengthError(pub usize);

/// One full read of the module's registers, immutable once constructed.
///
/// Layout: firmware major/minor (0-1), status bitmask (2), rain counter
/// as a big-endian u32 (3-6), wind average and wind max as big-endian u16
/// ADC words (7-8, 9-10), ambient light (11). Decoding is pure: the same
/// frame always yields the same fields, and every byte value is
/// within-domain by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFrame([u8; REG_COUNT]);

impl TryFrom<&[u8]> for RegisterFrame {
    type Error = FrameLengthError;

    fn try_from(bytes: &[u8]) -> Result<Self, FrameLengthError> {
        let regs: [u8; REG_COUNT] = bytes
            .try_into()
            .map_err(|_| FrameLengthError(bytes.len()))?;
        Ok(RegisterFrame(regs))
    }
}

impl RegisterFrame {
    /// Firmware version as (major, tenths); rendered as `major.tenths`.
    pub fn version(&self) -> (u8, u8) {
        (
            self.0[REG_FW_MAJOR as usize],
            self.0[REG_FW_MINOR as usize],
        )
    }

    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_byte(self.0[REG_STATUS as usize])
    }

    /// Rain tip counter. Wraps mod 2^32 in the field; a wrap is a valid
    /// event, not a fault.
    pub fn rain_count(&self) -> u32 {
        u32::from_be_bytes([
            self.0[REG_RAIN_MSB as usize],
            self.0[REG_RAIN_2SB as usize],
            self.0[REG_RAIN_3SB as usize],
            self.0[REG_RAIN_LSB as usize],
        ])
    }

    /// Average wind as a raw ADC magnitude, pre-calibration.
    pub fn wind_avg_raw(&self) -> u16 {
        u16::from_be_bytes([
            self.0[REG_WIND_AVG_MSB as usize],
            self.0[REG_WIND_AVG_LSB as usize],
        ])
    }

    /// Peak wind as a raw ADC magnitude, pre-calibration.
    pub fn wind_max_raw(&self) -> u16 {
        u16::from_be_bytes([
            self.0[REG_WIND_MAX_MSB as usize],
            self.0[REG_WIND_MAX_LSB as usize],
        ])
    }

    /// Ambient light average; the full byte domain is valid, no scaling.
    pub fn light_avg(&self) -> u8 {
        self.0[REG_LIGHT_AVG as usize]
    }
}

/// Capability-gated quantities extracted from one register frame.
#[derive(Debug, Clone, Copy)]
pub struct CompoundQuantities {
    pub rain_count: Reading<u32>,
    pub wind_avg_kph: Reading<f64>,
    pub wind_max_kph: Reading<f64>,
    pub ambient_light: Reading<u8>,
}

impl CompoundQuantities {
    /// Every slot absent; used when the module itself could not be read.
    pub fn absent() -> Self {
        CompoundQuantities {
            rain_count: Reading::Absent,
            wind_avg_kph: Reading::Absent,
            wind_max_kph: Reading::Absent,
            ambient_light: Reading::Absent,
        }
    }
}

/// Driver for the compound module over the shared bus.
pub struct CompoundSensor {
    addr: u8,
    calibration: WindCalibration,
}

impl CompoundSensor {
    pub fn new(addr: u8, calibration: WindCalibration) -> Self {
        CompoundSensor { addr, calibration }
    }

    /// Read all registers into one frame. If the module reports stale
    /// data, give it a moment to settle and poll once more.
    pub fn poll<B: BusTransport>(&self, bus: &mut B) -> Result<RegisterFrame, SensorError> {
        let frame = self.read_frame(bus)?;

        if !frame.status().contains(StatusFlags::DATA_READY) {
            debug!("compound module data not ready, re-polling");
            thread::sleep(DATA_SETTLE);
            return self.read_frame(bus);
        }

        Ok(frame)
    }

    fn read_frame<B: BusTransport>(&self, bus: &mut B) -> Result<RegisterFrame, SensorError> {
        let bytes = bus.read_range(self.addr, REG_FW_MAJOR, REG_LIGHT_AVG)?;
        Ok(RegisterFrame::try_from(bytes.as_slice())?)
    }

    /// Extract the module's quantities from a freshly polled frame, gated
    /// on the capability bits. A quantity whose hardware is not populated
    /// comes back absent without touching the bus again; "not installed"
    /// is a permanent condition, not a failed read.
    pub fn quantities(&self, frame: &RegisterFrame) -> CompoundQuantities {
        let status = frame.status();

        let rain_count = if status.contains(StatusFlags::RAIN) {
            Reading::Present(frame.rain_count())
        } else {
            Reading::Absent
        };

        let wind_avg_kph = if status.contains(StatusFlags::WIND) {
            Reading::Present(round2(self.calibration.raw_to_speed_kph(frame.wind_avg_raw())))
        } else {
            Reading::Absent
        };

        let wind_max_kph = if status.contains(StatusFlags::WIND) {
            Reading::Present(round2(self.calibration.raw_to_speed_kph(frame.wind_max_raw())))
        } else {
            Reading::Absent
        };

        let ambient_light = if status.contains(StatusFlags::LIGHT) {
            Reading::Present(frame.light_avg())
        } else {
            Reading::Absent
        };

        CompoundQuantities {
            rain_count,
            wind_avg_kph,
            wind_max_kph,
            ambient_light,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::ScriptedBus;

    /// Rain 510, wind average raw 77, wind max raw 85, light 21; status
    /// reports data ready plus wind and rain modules populated.
    const REFERENCE_FRAME: [u8; REG_COUNT] = [
        0x00, 0x01, 0x0E, 0x00, 0x00, 0x01, 0xFE, 0x00, 0x4D, 0x00, 0x55, 0x15,
    ];

    fn frame(bytes: &[u8]) -> RegisterFrame {
        RegisterFrame::try_from(bytes).unwrap()
    }

    #[test]
    fn reference_frame_decodes_every_field() {
        let frame = frame(&REFERENCE_FRAME);

        assert_eq!(frame.version(), (0, 1));
        assert_eq!(frame.rain_count(), 510);
        assert_eq!(frame.wind_avg_raw(), 77);
        assert_eq!(frame.wind_max_raw(), 85);
        assert_eq!(frame.light_avg(), 21);
    }

    #[test]
    fn rain_counter_reassembles_big_endian_and_wraps() {
        let mut bytes = REFERENCE_FRAME;
        bytes[3..7].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

        assert_eq!(frame(&bytes).rain_count(), u32::MAX);
    }

    #[test]
    fn decoding_is_idempotent() {
        let first = frame(&REFERENCE_FRAME);
        let second = frame(&REFERENCE_FRAME);

        assert_eq!(first.version(), second.version());
        assert_eq!(first.rain_count(), second.rain_count());
        assert_eq!(first.wind_avg_raw(), second.wind_avg_raw());
        assert_eq!(first.wind_max_raw(), second.wind_max_raw());
        assert_eq!(first.light_avg(), second.light_avg());
    }

    #[test]
    fn short_frame_is_a_length_error_not_a_partial_frame() {
        let result = RegisterFrame::try_from(&REFERENCE_FRAME[..11]);

        assert_eq!(result.unwrap_err(), FrameLengthError(11));
    }

    #[test]
    fn status_bits_gate_individually_and_composite() {
        // 0x0E = data ready + wind + rain; light not populated.
        let status = StatusFlags::from_byte(0x0E);

        assert!(status.contains(StatusFlags::DATA_READY));
        assert!(status.contains(StatusFlags::WIND));
        assert!(status.contains(StatusFlags::RAIN));
        assert!(!status.contains(StatusFlags::LIGHT));
        assert!(!status.contains(StatusFlags::INIT_POLL));
        assert!(status.contains(StatusFlags::DATA_READY | StatusFlags::WIND));
        assert!(!status.contains(StatusFlags::DATA_READY | StatusFlags::LIGHT));
    }

    #[test]
    fn quantities_follow_capability_bits() {
        let sensor = CompoundSensor::new(COMPOUND_ADDR, WindCalibration::new(67).unwrap());
        let quantities = sensor.quantities(&frame(&REFERENCE_FRAME));

        assert_eq!(quantities.rain_count, Reading::Present(510));
        assert_eq!(quantities.wind_avg_kph, Reading::Present(3.51));
        assert_eq!(quantities.wind_max_kph, Reading::Present(6.32));
        // Light register holds 0x15 but the module is not populated.
        assert_eq!(quantities.ambient_light, Reading::Absent);
    }

    #[test]
    fn poll_reads_all_twelve_registers_in_order() {
        let replies = REFERENCE_FRAME.iter().map(|&b| Ok(vec![b])).collect();
        let mut bus = ScriptedBus::new(replies);
        let sensor = CompoundSensor::new(COMPOUND_ADDR, WindCalibration::new(67).unwrap());

        let frame = sensor.poll(&mut bus).unwrap();

        assert_eq!(frame.rain_count(), 510);
        assert_eq!(bus.transactions.len(), REG_COUNT);
        for (reg, transaction) in bus.transactions.iter().enumerate() {
            assert_eq!(transaction, &(COMPOUND_ADDR, vec![reg as u8], 1));
        }
    }

    #[test]
    fn poll_retries_once_when_data_not_ready() {
        let mut stale = REFERENCE_FRAME;
        stale[2] = 0x0C; // wind + rain, data not ready
        let replies = stale
            .iter()
            .chain(REFERENCE_FRAME.iter())
            .map(|&b| Ok(vec![b]))
            .collect();
        let mut bus = ScriptedBus::new(replies);
        let sensor = CompoundSensor::new(COMPOUND_ADDR, WindCalibration::new(67).unwrap());

        let frame = sensor.poll(&mut bus).unwrap();

        assert!(frame.status().contains(StatusFlags::DATA_READY));
        assert_eq!(bus.transactions.len(), 2 * REG_COUNT);
    }
}

/// Wind-vane heading via the station's 3-axis magnetometer
use crate::bus::BusTransport;
use crate::sensors::SensorError;
use crate::utils::round1;

/// Bus address of the magnetometer.
pub const HEADING_ADDR: u8 = 0x1E;

// Register map
const REG_CFG_A: u8 = 0x00;
const REG_CFG_B: u8 = 0x01;
const REG_MODE: u8 = 0x02;
const REG_DATA_START: u8 = 0x03;

/// Config A: no sample averaging, 15 updates per second, no bias.
const CFG_A_AVG1_15HZ: u8 = 0x10;
/// Config B: lowest supported gain, keeps the channels from saturating.
const CFG_B_GAIN_LOW: u8 = 0xE0;
/// Continuous measurement mode.
const MODE_CONTINUOUS: u8 = 0x00;

/// Length of the axis data block: X, Z, Y as big-endian 16-bit pairs.
const AXIS_BLOCK_LEN: usize = 6;

pub struct HeadingSensor {
    addr: u8,
    /// Mount orientation of the station relative to true north, degrees.
    mag_offset: f64,
}

impl HeadingSensor {
    pub fn new(addr: u8, mag_offset: f64) -> Self {
        HeadingSensor { addr, mag_offset }
    }

    /// Configure the magnetometer and take one heading fix.
    ///
    /// Returns degrees in `0.0..360.0`, adjusted for the station's mount
    /// orientation and rounded to one decimal.
    pub fn read_heading<B: BusTransport>(&self, bus: &mut B) -> Result<f64, SensorError> {
        bus.write_register(self.addr, REG_CFG_A, CFG_A_AVG1_15HZ)?;
        bus.write_register(self.addr, REG_CFG_B, CFG_B_GAIN_LOW)?;
        bus.write_register(self.addr, REG_MODE, MODE_CONTINUOUS)?;

        let block = bus.transfer(self.addr, &[REG_DATA_START], AXIS_BLOCK_LEN)?;
        if block.len() != AXIS_BLOCK_LEN {
            return Err(SensorError::MalformedReply(format!(
                "axis block of {} bytes",
                block.len()
            )));
        }

        // Wire order is X, Z, Y; the heading lies in the X/Y plane.
        let x = i16::from_be_bytes([block[0], block[1]]);
        let y = i16::from_be_bytes([block[4], block[5]]);

        // Heading relative to the sensor itself, -180..180 from atan2;
        // fold negatives onto the 0..360 circle.
        let mut heading = f64::from(x).atan2(f64::from(y)).to_degrees();
        if heading < 0.0 {
            heading = 360.0 - heading.abs();
        }

        // Orient relative to north given how the station is mounted,
        // wrapping around the top of the circle.
        let mut oriented = heading + self.mag_offset;
        if oriented > 360.0 {
            oriented -= 360.0;
        }

        Ok(round1(oriented))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::ScriptedBus;

    fn axis_block(x: i16, z: i16, y: i16) -> Vec<u8> {
        let mut block = Vec::with_capacity(AXIS_BLOCK_LEN);
        block.extend_from_slice(&x.to_be_bytes());
        block.extend_from_slice(&z.to_be_bytes());
        block.extend_from_slice(&y.to_be_bytes());
        block
    }

    fn scripted_fix(x: i16, z: i16, y: i16) -> ScriptedBus {
        ScriptedBus::new(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![]),
            Ok(axis_block(x, z, y)),
        ])
    }

    #[test]
    fn due_north_field_reads_zero_degrees() {
        let sensor = HeadingSensor::new(HEADING_ADDR, 0.0);
        let mut bus = scripted_fix(0, 0, 200);

        assert_eq!(sensor.read_heading(&mut bus).unwrap(), 0.0);
    }

    #[test]
    fn negative_atan2_folds_onto_the_circle() {
        // atan2(-100, 100) = -45 degrees -> 315.
        let sensor = HeadingSensor::new(HEADING_ADDR, 0.0);
        let mut bus = scripted_fix(-100, 0, 100);

        assert_eq!(sensor.read_heading(&mut bus).unwrap(), 315.0);
    }

    #[test]
    fn mount_offset_wraps_past_the_top_of_the_circle() {
        // 315 from the field plus a 90 degree mount offset -> 45.
        let sensor = HeadingSensor::new(HEADING_ADDR, 90.0);
        let mut bus = scripted_fix(-100, 0, 100);

        assert_eq!(sensor.read_heading(&mut bus).unwrap(), 45.0);
    }

    #[test]
    fn configures_before_reading_axes() {
        let sensor = HeadingSensor::new(HEADING_ADDR, 0.0);
        let mut bus = scripted_fix(0, 0, 200);

        sensor.read_heading(&mut bus).unwrap();

        assert_eq!(
            bus.transactions,
            vec![
                (HEADING_ADDR, vec![REG_CFG_A, CFG_A_AVG1_15HZ], 0),
                (HEADING_ADDR, vec![REG_CFG_B, CFG_B_GAIN_LOW], 0),
                (HEADING_ADDR, vec![REG_MODE, MODE_CONTINUOUS], 0),
                (HEADING_ADDR, vec![REG_DATA_START], AXIS_BLOCK_LEN),
            ]
        );
    }

    #[test]
    fn bus_failure_propagates_as_transient_error() {
        let sensor = HeadingSensor::new(HEADING_ADDR, 0.0);
        let mut bus = ScriptedBus::new(vec![Err(ScriptedBus::failure(HEADING_ADDR))]);

        assert!(sensor.read_heading(&mut bus).is_err());
    }
}

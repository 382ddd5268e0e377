pub mod calibration;
pub mod compound;
pub mod heading;
pub mod sys_temp;
pub mod temp_humid;

use thiserror::Error;

use crate::bus::BusError;
use self::compound::FrameLengthError;

/// One failed poll attempt against a sensor source.
///
/// Every variant is transient from the orchestrator's point of view: the
/// attempt produced unusable data, so it consumes one retry attempt and is
/// never surfaced past the orchestrator.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    FrameLength(#[from] FrameLengthError),
    #[error("temperature/humidity payload failed CRC check (computed {computed:#06x}, reported {reported:#06x})")]
    Checksum { computed: u16, reported: u16 },
    #[error("temperature/humidity sensor returned malformed reply: {0}")]
    MalformedReply(String),
    #[error("system thermometer: {0}")]
    SysTemp(String),
}

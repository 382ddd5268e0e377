/// Shared I2C bus access for all station sensors
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use thiserror::Error;

/// Transient bus communication failure. Every variant represents one
/// unusable attempt; the orchestrator retries up to its bound and then
/// degrades the affected quantity to absent.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to open bus device {path}: {detail}")]
    Open { path: String, detail: String },
    #[error("bus transfer with device 0x{addr:02x} failed: {detail}")]
    Transfer { addr: u8, detail: String },
    #[error("short read from device 0x{addr:02x}: wanted {wanted} bytes, got {got}")]
    ShortRead { addr: u8, wanted: usize, got: usize },
}

/// One addressed write-then-read exchange against a bus device.
///
/// The bus is a shared, exclusive resource: a scanner owns exactly one
/// transport handle and serializes every transaction of a poll cycle
/// through it. Implementations must return exactly `read_len` bytes on
/// success.
pub trait BusTransport {
    /// Perform one transaction: write `write` to `addr`, then read
    /// `read_len` bytes. `write` may be empty (address-only probe, or plain
    /// read) and `read_len` may be zero (plain write).
    fn transfer(&mut self, addr: u8, write: &[u8], read_len: usize) -> Result<Vec<u8>, BusError>;

    /// Read one register via the register-pointer protocol: write the
    /// register index, read one byte back.
    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8, BusError> {
        let bytes = self.transfer(addr, &[reg], 1)?;
        bytes.first().copied().ok_or(BusError::ShortRead {
            addr,
            wanted: 1,
            got: 0,
        })
    }

    /// Read registers `first..=last`, one transaction per register,
    /// mirroring the register-pointer protocol of the station's modules.
    /// Callers are responsible for passing a valid low-to-high range.
    fn read_range(&mut self, addr: u8, first: u8, last: u8) -> Result<Vec<u8>, BusError> {
        let mut data = Vec::with_capacity(usize::from(last - first) + 1);
        for reg in first..=last {
            data.push(self.read_register(addr, reg)?);
        }
        Ok(data)
    }

    /// Write one byte into a register.
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.transfer(addr, &[reg, value], 0).map(|_| ())
    }
}

/// Production transport over a Linux I2C character device.
pub struct I2cBus {
    dev: I2cdev,
}

impl I2cBus {
    /// Open a bus device node, e.g. `/dev/i2c-1`.
    pub fn open(path: &str) -> Result<Self, BusError> {
        let dev = I2cdev::new(path).map_err(|e| BusError::Open {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        Ok(I2cBus { dev })
    }
}

impl BusTransport for I2cBus {
    fn transfer(&mut self, addr: u8, write: &[u8], read_len: usize) -> Result<Vec<u8>, BusError> {
        let mut read = vec![0u8; read_len];

        let result = if read_len == 0 {
            self.dev.write(addr, write)
        } else if write.is_empty() {
            self.dev.read(addr, &mut read)
        } else {
            self.dev.write_read(addr, write, &mut read)
        };

        result.map_err(|e| BusError::Transfer {
            addr,
            detail: e.to_string(),
        })?;

        Ok(read)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Transport that replays a scripted sequence of transaction results
    /// and records every transaction it served.
    pub struct ScriptedBus {
        pub replies: VecDeque<Result<Vec<u8>, BusError>>,
        /// (addr, written bytes, read_len) per transaction, in order.
        pub transactions: Vec<(u8, Vec<u8>, usize)>,
    }

    impl ScriptedBus {
        pub fn new(replies: Vec<Result<Vec<u8>, BusError>>) -> Self {
            ScriptedBus {
                replies: replies.into(),
                transactions: Vec::new(),
            }
        }

        pub fn failure(addr: u8) -> BusError {
            BusError::Transfer {
                addr,
                detail: "device did not respond".to_string(),
            }
        }
    }

    impl BusTransport for ScriptedBus {
        fn transfer(&mut self, addr: u8, write: &[u8], read_len: usize) -> Result<Vec<u8>, BusError> {
            self.transactions.push((addr, write.to_vec(), read_len));
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(Self::failure(addr)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBus;
    use super::*;

    #[test]
    fn read_range_issues_one_transaction_per_register() {
        let mut bus = ScriptedBus::new(vec![Ok(vec![0xAA]), Ok(vec![0xBB]), Ok(vec![0xCC])]);

        let data = bus.read_range(0x64, 3, 5).unwrap();

        assert_eq!(data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(
            bus.transactions,
            vec![
                (0x64, vec![3], 1),
                (0x64, vec![4], 1),
                (0x64, vec![5], 1),
            ]
        );
    }

    #[test]
    fn read_range_stops_on_first_failure() {
        let mut bus = ScriptedBus::new(vec![Ok(vec![0x01]), Err(ScriptedBus::failure(0x64))]);

        assert!(bus.read_range(0x64, 0, 11).is_err());
        assert_eq!(bus.transactions.len(), 2);
    }

    #[test]
    fn read_register_flags_empty_reply_as_short_read() {
        let mut bus = ScriptedBus::new(vec![Ok(vec![])]);

        match bus.read_register(0x1E, 0x03) {
            Err(BusError::ShortRead { addr, wanted, got }) => {
                assert_eq!((addr, wanted, got), (0x1E, 1, 0));
            }
            other => panic!("expected short read, got {:?}", other.map(|_| ())),
        }
    }
}

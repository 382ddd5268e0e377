use std::env;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::sensors::compound::COMPOUND_ADDR;
use crate::sensors::sys_temp::DEFAULT_THERMAL_ZONE;

/// Default bus device node on the station's board.
const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
/// Anemometer ADC reading when the vane is standing still.
const DEFAULT_WIND_OFFSET: u16 = 75;
/// Per-source retry bound for one poll cycle.
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
/// Seconds between poll cycles.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub database_url: String,
    pub i2c_bus: String,
    pub compound_addr: u8,
    pub wind_offset: u16,
    /// Bearing of the station relative to true north, degrees.
    pub mag_offset: f64,
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub thermal_zone: String,
}

impl ScannerConfig {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;

        let i2c_bus = env::var("I2C_BUS").unwrap_or_else(|_| DEFAULT_I2C_BUS.to_string());
        let thermal_zone =
            env::var("THERMAL_ZONE").unwrap_or_else(|_| DEFAULT_THERMAL_ZONE.to_string());

        let compound_addr = match env::var("COMPOUND_ADDR") {
            Ok(raw) => parse_addr(&raw)?,
            Err(_) => COMPOUND_ADDR,
        };

        let wind_offset = parse_var("WIND_OFFSET", DEFAULT_WIND_OFFSET)?;
        let mag_offset: f64 = parse_var("MAG_OFFSET", 0.0)?;
        let max_attempts = parse_var("MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let poll_interval_secs = parse_var("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;

        if max_attempts == 0 {
            return Err("MAX_ATTEMPTS must be at least 1".into());
        }
        if !(0.0..360.0).contains(&mag_offset) {
            return Err("MAG_OFFSET must be a bearing in 0..360 degrees".into());
        }

        Ok(ScannerConfig {
            database_url,
            i2c_bus,
            compound_addr,
            wind_offset,
            mag_offset,
            max_attempts,
            poll_interval_secs,
            thermal_zone,
        })
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, Box<dyn Error>>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("invalid {}: {}", name, e).into()),
        Err(_) => Ok(default),
    }
}

/// Bus addresses are conventionally written in hex; accept both `0x64`
/// and plain decimal.
fn parse_addr(raw: &str) -> Result<u8, Box<dyn Error>> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid COMPOUND_ADDR {:?}: {}", raw, e).into())
}

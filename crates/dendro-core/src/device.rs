//! Channel readers: where single voltage samples come from.
//!
//! Every reader implements [`ChannelReader`]. The production reader is
//! [`Ads1115`], talking to the converter through Linux i2c-dev. A
//! [`SimulatedReader`] stands in for bench runs without hardware.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

use crate::config::MAX_CHANNELS;
use crate::error::{Error, ReadError, Result};

/// Source of instantaneous channel voltages.
pub trait ChannelReader {
    /// Read one voltage sample from `channel` (0-based). A transient bus
    /// fault is an `Err`; the next call may succeed.
    fn read_voltage(&mut self, channel: usize) -> std::result::Result<f64, ReadError>;

    /// Short human-readable description for banners.
    fn describe(&self) -> String;
}

impl<R: ChannelReader + ?Sized> ChannelReader for Box<R> {
    fn read_voltage(&mut self, channel: usize) -> std::result::Result<f64, ReadError> {
        (**self).read_voltage(channel)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ---------------------------------------------------------------------------
// ADS1115
// ---------------------------------------------------------------------------

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// Start a single conversion (write) / conversion idle (read).
const CFG_OS: u16 = 0x8000;
/// AINx vs GND; add `channel << 12`.
const CFG_MUX_SINGLE_BASE: u16 = 0x4000;
/// ±4.096 V full-scale range (gain 1), covers 3.3 V signals.
const CFG_PGA_4_096V: u16 = 0x0200;
const CFG_MODE_SINGLE: u16 = 0x0100;
const CFG_DR_128SPS: u16 = 0x0080;
const CFG_COMP_DISABLE: u16 = 0x0003;

const FULL_SCALE_VOLTS: f64 = 4.096;

/// One conversion at 128 SPS takes ~7.8 ms.
const CONVERSION_POLL_INTERVAL: Duration = Duration::from_millis(2);
const CONVERSION_MAX_POLLS: usize = 25;

#[cfg(target_os = "linux")]
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// ADS1115 16-bit ADC on a Linux i2c-dev bus, single-shot mode.
pub struct Ads1115 {
    bus: File,
    path: PathBuf,
    address: u16,
}

impl Ads1115 {
    /// Open `bus` (e.g. `/dev/i2c-1`) and address the converter.
    pub fn open(bus: &Path, address: u16) -> Result<Self> {
        let device_err = |source: io::Error| Error::Device {
            path: bus.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(bus)
            .map_err(device_err)?;
        set_slave_address(&file, address).map_err(device_err)?;
        log::debug!("opened ADS1115 at {:#04x} on {}", address, bus.display());
        Ok(Self {
            bus: file,
            path: bus.to_path_buf(),
            address,
        })
    }

    fn write_register(&mut self, register: u8, value: u16) -> io::Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.bus.write_all(&[register, hi, lo])
    }

    fn read_register(&mut self, register: u8) -> io::Result<u16> {
        self.bus.write_all(&[register])?;
        let mut buf = [0u8; 2];
        self.bus.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl ChannelReader for Ads1115 {
    fn read_voltage(&mut self, channel: usize) -> std::result::Result<f64, ReadError> {
        let config = single_shot_config(channel).ok_or(ReadError::ChannelOutOfRange(channel))?;
        self.write_register(REG_CONFIG, config)?;

        for _ in 0..CONVERSION_MAX_POLLS {
            std::thread::sleep(CONVERSION_POLL_INTERVAL);
            if self.read_register(REG_CONFIG)? & CFG_OS != 0 {
                let raw = self.read_register(REG_CONVERSION)? as i16;
                return Ok(raw_to_volts(raw));
            }
        }
        Err(ReadError::ConversionTimeout)
    }

    fn describe(&self) -> String {
        format!("ADS1115 @ {:#04x} on {}", self.address, self.path.display())
    }
}

#[cfg(target_os = "linux")]
fn set_slave_address(file: &File, address: u16) -> io::Result<()> {
    use std::os::fd::AsRawFd;
    // SAFETY: I2C_SLAVE takes the address by value and touches no memory.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, libc::c_ulong::from(address)) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_slave_address(_file: &File, _address: u16) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "i2c-dev is only available on Linux",
    ))
}

/// Config register word for a single-shot conversion on `channel`.
fn single_shot_config(channel: usize) -> Option<u16> {
    if channel >= MAX_CHANNELS {
        return None;
    }
    Some(
        CFG_OS
            | (CFG_MUX_SINGLE_BASE + ((channel as u16) << 12))
            | CFG_PGA_4_096V
            | CFG_MODE_SINGLE
            | CFG_DR_128SPS
            | CFG_COMP_DISABLE,
    )
}

fn raw_to_volts(raw: i16) -> f64 {
    f64::from(raw) * FULL_SCALE_VOLTS / 32768.0
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Fixed per-channel voltages with optional uniform noise and random faults.
#[derive(Debug, Clone)]
pub struct SimulatedReader {
    voltages: Vec<f64>,
    noise: f64,
    failure_rate: f64,
}

impl SimulatedReader {
    /// Every channel reads `volts`.
    pub fn constant(volts: f64) -> Self {
        Self::new(vec![volts; MAX_CHANNELS])
    }

    /// Channel `i` reads `voltages[i]`; higher channels are out of range.
    pub fn new(voltages: Vec<f64>) -> Self {
        Self {
            voltages,
            noise: 0.0,
            failure_rate: 0.0,
        }
    }

    /// Add uniform noise in `±amplitude` volts.
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude.abs();
        self
    }

    /// Fail each read with probability `rate` (clamped to 0..=1).
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl ChannelReader for SimulatedReader {
    fn read_voltage(&mut self, channel: usize) -> std::result::Result<f64, ReadError> {
        let base = *self
            .voltages
            .get(channel)
            .ok_or(ReadError::ChannelOutOfRange(channel))?;
        let mut rng = rand::rng();
        if self.failure_rate > 0.0 && rng.random_bool(self.failure_rate) {
            return Err(io::Error::other("simulated bus fault").into());
        }
        if self.noise > 0.0 {
            return Ok(base + rng.random_range(-self.noise..=self.noise));
        }
        Ok(base)
    }

    fn describe(&self) -> String {
        format!("simulated ({} channels)", self.voltages.len())
    }
}

//! One acquisition pass over every configured channel.
//!
//! A [`Station`] is the device context: it owns the reader (and with it the
//! bus handle) plus the calibrated channel table. Both the one-shot logger
//! and the live monitor drive the same [`Station::acquire`]; they only
//! differ in what they do with the resulting [`Cycle`].

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::config::{ChannelConfig, Settings};
use crate::convert::Clamp;
use crate::device::ChannelReader;
use crate::sampling::{ChannelReading, sample_channel};

/// Timestamp format used in every record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Date format used in file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Acquisition parameters, split out of [`Settings`] so the CLI can
/// override them per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acquisition {
    pub samples: usize,
    pub sample_delay: Duration,
    pub reference_voltage: f64,
    pub clamp: Clamp,
}

impl From<&Settings> for Acquisition {
    fn from(s: &Settings) -> Self {
        Self {
            samples: s.samples,
            sample_delay: s.sample_delay,
            reference_voltage: s.reference_voltage,
            clamp: s.clamp,
        }
    }
}

/// Device context: reader plus channel calibration.
pub struct Station<R> {
    reader: R,
    channels: Vec<ChannelConfig>,
    acquisition: Acquisition,
}

impl<R: ChannelReader> Station<R> {
    pub fn new(reader: R, channels: Vec<ChannelConfig>, acquisition: Acquisition) -> Self {
        Self {
            reader,
            channels,
            acquisition,
        }
    }

    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Sample every channel now.
    pub fn acquire(&mut self) -> Cycle {
        self.acquire_at(Local::now().naive_local())
    }

    /// Sample every channel, stamping the cycle with `timestamp`.
    ///
    /// Channels are sampled in index order, one after another.
    pub fn acquire_at(&mut self, timestamp: NaiveDateTime) -> Cycle {
        let Acquisition {
            samples,
            sample_delay,
            reference_voltage,
            clamp,
        } = self.acquisition;

        let readings = self
            .channels
            .iter()
            .map(|ch| {
                sample_channel(&mut self.reader, ch.index, samples, sample_delay)
                    .convert(ch, reference_voltage, clamp)
            })
            .collect();

        Cycle {
            timestamp,
            channels: self.channels.clone(),
            readings,
        }
    }
}

/// Readings for all channels from one acquisition pass.
#[derive(Debug, Clone, Serialize)]
pub struct Cycle {
    pub timestamp: NaiveDateTime,
    pub channels: Vec<ChannelConfig>,
    pub readings: Vec<ChannelReading>,
}

impl Cycle {
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `YYYY-MM-DD`, taken from the same instant as the timestamp.
    pub fn date_string(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }

    /// Channel config paired with its reading, in channel order.
    pub fn entries(&self) -> impl Iterator<Item = (&ChannelConfig, &ChannelReading)> {
        self.channels.iter().zip(self.readings.iter())
    }

    /// Number of channels with at least one good sample.
    pub fn valid_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_valid()).count()
    }

    /// Console status line per channel.
    pub fn status_lines(&self) -> Vec<String> {
        self.entries().map(|(ch, r)| status_line(ch, r)).collect()
    }
}

/// Human-readable one-line summary of a channel reading.
pub fn status_line(channel: &ChannelConfig, reading: &ChannelReading) -> String {
    match (reading.microns, reading.average_voltage) {
        (Some(microns), Some(volts)) => format!(
            "Tree {} Ch{}: {:.2} µm, {:.4} V (avg of {} samples)",
            channel.tree_id,
            channel.hardware_channel(),
            microns,
            volts,
            reading.sample_count
        ),
        _ => format!(
            "Tree {} Ch{}: no valid samples ({} read errors)",
            channel.tree_id,
            channel.hardware_channel(),
            reading.failures.len()
        ),
    }
}

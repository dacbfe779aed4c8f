//! Multi-sample acquisition with failure-tolerant averaging.
//!
//! Transient I2C glitches are expected on long sensor cables. A channel is
//! sampled `N` times; failed reads are dropped and the successful ones are
//! averaged. Only when every attempt fails is the channel reported as having
//! no valid samples, and even then the rest of the cycle carries on.

use std::time::Duration;

use serde::Serialize;

use crate::config::ChannelConfig;
use crate::convert::{Clamp, convert_reading};
use crate::device::ChannelReader;

/// Result of sampling one channel for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReading {
    /// Software channel index (0-based).
    pub channel: usize,
    /// Mean of the successful samples; `None` when there were none.
    pub average_voltage: Option<f64>,
    /// Number of successful samples behind the average.
    pub sample_count: usize,
    /// Displacement, set by [`ChannelReading::convert`]; `None` mirrors an
    /// invalid average.
    pub microns: Option<f64>,
    /// One message per failed attempt, in order.
    pub failures: Vec<String>,
}

impl ChannelReading {
    /// Whether at least one sample succeeded.
    pub fn is_valid(&self) -> bool {
        self.average_voltage.is_some()
    }

    /// 1-based hardware channel number.
    pub fn hardware_channel(&self) -> usize {
        self.channel + 1
    }

    /// Fill in `microns` from the channel's calibration.
    pub fn convert(mut self, channel: &ChannelConfig, reference_voltage: f64, clamp: Clamp) -> Self {
        self.microns = convert_reading(
            self.average_voltage,
            channel.micron_scale,
            reference_voltage,
            clamp,
        );
        self
    }
}

/// Draw `sample_count` readings from `channel`, sleeping
/// `inter_sample_delay` between attempts.
pub fn sample_channel<R: ChannelReader + ?Sized>(
    reader: &mut R,
    channel: usize,
    sample_count: usize,
    inter_sample_delay: Duration,
) -> ChannelReading {
    let mut samples = Vec::new();
    let mut failures = Vec::new();

    for attempt in 0..sample_count {
        if attempt > 0 && !inter_sample_delay.is_zero() {
            std::thread::sleep(inter_sample_delay);
        }
        match reader.read_voltage(channel) {
            Ok(v) => samples.push(v),
            Err(e) => {
                log::warn!("Ch{} read error: {e}", channel + 1);
                failures.push(format!("Ch{} read error: {e}", channel + 1));
            }
        }
    }

    let average_voltage = mean(&samples);
    if average_voltage.is_none() {
        log::warn!(
            "Ch{} failed to collect valid samples ({} attempts)",
            channel + 1,
            sample_count
        );
    }

    ChannelReading {
        channel,
        average_voltage,
        sample_count: samples.len(),
        microns: None,
        failures,
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

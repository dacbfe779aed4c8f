//! Error types for the dendrometer pipeline.
//!
//! [`Error`] covers everything that stops a command: bad configuration,
//! an unopenable ADC device, or a failed write to a log file. A single
//! failed sample is a [`ReadError`]; the sampling engine absorbs those and
//! never lets one escape as an [`Error`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file could not be read at all.
    #[error("cannot read config file {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    /// A configuration key is missing or holds an invalid value.
    #[error("invalid configuration for {key}: {message}")]
    Config { key: String, message: String },

    /// The ADC device could not be opened or addressed.
    #[error("cannot open ADC device {}: {source}", path.display())]
    Device { path: PathBuf, source: io::Error },

    /// Appending to a log file failed.
    #[error("cannot write {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },

    /// Appending a CSV row failed.
    #[error("cannot write CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

impl Error {
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A single failed voltage read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Transient bus fault (NACK, arbitration loss, EIO).
    #[error("i2c transfer failed: {0}")]
    Io(#[from] io::Error),

    /// The channel index is not wired on this converter.
    #[error("channel index {0} out of range")]
    ChannelOutOfRange(usize),

    /// The converter never reported a finished conversion.
    #[error("conversion did not complete")]
    ConversionTimeout,
}

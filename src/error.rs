//! Error types for reading and writing recordings

use rgbd_core::CalibrationError;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors surfaced by the multiplexer, demultiplexer and container layer
#[derive(Error, Debug)]
pub enum RecordError {
    /// Writer inputs are missing or inconsistent; raised before any I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Calibration tag outside the known device set
    #[error("Unsupported camera device type: {0}")]
    UnsupportedDeviceType(String),

    /// Container open, parse or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Forwarded decoder failure
    #[error("Decode error: {0}")]
    Decode(CodecError),

    /// Forwarded encoder failure
    #[error("Encode error: {0}")]
    Encode(CodecError),

    /// Malformed calibration or frame geometry
    #[error("Calibration error: {0}")]
    Calibration(CalibrationError),

    /// Track metadata could not be serialized or parsed as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CalibrationError> for RecordError {
    fn from(e: CalibrationError) -> Self {
        match e {
            CalibrationError::UnsupportedDeviceType(tag) => RecordError::UnsupportedDeviceType(tag),
            other => RecordError::Calibration(other),
        }
    }
}

impl RecordError {
    /// Container-level corruption, reported as an I/O failure
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        RecordError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;

//! Error types for calibration parsing and frame remapping

use thiserror::Error;

/// Errors raised by the pure calibration and remapping layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Calibration tag outside the known device set
    #[error("Unsupported camera device type: {0}")]
    UnsupportedDeviceType(String),

    /// Calibration JSON could not be interpreted
    #[error("Invalid calibration JSON: {0}")]
    InvalidJson(String),

    /// Stored device tag and JSON calibration type disagree
    #[error("Device type mismatch: tag says {tag}, JSON says {json}")]
    DeviceTypeMismatch { tag: String, json: String },

    /// Decoded frame does not match the calibration it is remapped from
    #[error("Frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSizeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    /// Plane buffers do not fit the declared frame size
    #[error("Invalid plane size: {0}")]
    InvalidPlane(String),
}

impl From<serde_json::Error> for CalibrationError {
    fn from(e: serde_json::Error) -> Self {
        CalibrationError::InvalidJson(e.to_string())
    }
}

//! Writer configuration

use rgbd_core::constants::{AUDIO_SAMPLE_RATE, DEFAULT_DEPTH_UNIT, VIDEO_FRAME_RATE};
use rgbd_core::DepthCodecType;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};

/// Codec and timing settings for a recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriterConfig {
    /// Video frames per second, sets the color/depth default duration
    pub framerate: u32,
    /// Audio samples per second
    pub samplerate: u32,
    pub depth_codec_type: DepthCodecType,
    /// Meters per stored depth step
    pub depth_unit: f32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            framerate: VIDEO_FRAME_RATE,
            samplerate: AUDIO_SAMPLE_RATE,
            depth_codec_type: DepthCodecType::default(),
            depth_unit: DEFAULT_DEPTH_UNIT,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.framerate == 0 {
            return Err(RecordError::Configuration(
                "framerate must be positive".to_string(),
            ));
        }
        if self.samplerate == 0 {
            return Err(RecordError::Configuration(
                "samplerate must be positive".to_string(),
            ));
        }
        if !(self.depth_unit.is_finite() && self.depth_unit > 0.0) {
            return Err(RecordError::Configuration(format!(
                "depth unit must be positive, got {}",
                self.depth_unit
            )));
        }
        Ok(())
    }

    /// Nanoseconds between two video frames
    pub fn frame_duration_ns(&self) -> u64 {
        1_000_000_000 / self.framerate.max(1) as u64
    }
}

//! Recording-wide constants and codec tags

use serde::{Deserialize, Serialize};

pub const VIDEO_FRAME_RATE: u32 = 30;
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
pub const AUDIO_INPUT_CHANNEL_COUNT: u32 = 1;
pub const DEFAULT_DEPTH_UNIT: f32 = 0.001;

/// Timestamps are stored in microseconds
pub const TIMECODE_SCALE_NS: u64 = 1_000;

/// Color video codec tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorCodecType {
    Vp8 = 0,
}

impl ColorCodecType {
    pub fn codec_id(&self) -> &'static str {
        match self {
            ColorCodecType::Vp8 => "V_VP8",
        }
    }
}

impl TryFrom<&str> for ColorCodecType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "V_VP8" => Ok(ColorCodecType::Vp8),
            _ => Err(format!("Unknown color codec: {}", s)),
        }
    }
}

/// Depth video codec tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthCodecType {
    Rvl = 0,
    Tdc1 = 1,
}

impl DepthCodecType {
    pub fn codec_id(&self) -> &'static str {
        match self {
            DepthCodecType::Rvl => "V_RVL",
            DepthCodecType::Tdc1 => "V_TDC1",
        }
    }
}

impl Default for DepthCodecType {
    fn default() -> Self {
        DepthCodecType::Tdc1
    }
}

impl TryFrom<&str> for DepthCodecType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "V_RVL" => Ok(DepthCodecType::Rvl),
            "V_TDC1" => Ok(DepthCodecType::Tdc1),
            _ => Err(format!("Unknown depth codec: {}", s)),
        }
    }
}

impl std::fmt::Display for DepthCodecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.codec_id())
    }
}

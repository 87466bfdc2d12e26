//! Recording data model.
//!
//! Frame payloads for color, depth and audio are opaque encoded buffers;
//! IMU and TRS samples are plain vectors. A [`File`] is the whole parsed
//! recording.

use nalgebra::{UnitQuaternion, Vector3};

use crate::calibration::CameraCalibration;
use crate::constants::{ColorCodecType, DepthCodecType};
use crate::direction_table::DirectionTable;

/// Frames carrying a microsecond timestamp
pub trait Timestamped {
    fn time_point_us(&self) -> i64;

    /// Same frame at a different time
    fn with_time_point_us(self, time_point_us: i64) -> Self;
}

macro_rules! impl_timestamped {
    ($($frame:ty),* $(,)?) => {
        $(
            impl Timestamped for $frame {
                fn time_point_us(&self) -> i64 {
                    self.time_point_us
                }

                fn with_time_point_us(mut self, time_point_us: i64) -> Self {
                    self.time_point_us = time_point_us;
                    self
                }
            }
        )*
    };
}

impl_timestamped!(
    VideoFrame,
    ColorByteFrame,
    DepthByteFrame,
    AudioFrame,
    ImuFrame,
    TrsFrame,
);

/// Paired color and depth payloads sharing a timestamp
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub time_point_us: i64,
    pub keyframe: bool,
    pub color_bytes: Vec<u8>,
    pub depth_bytes: Vec<u8>,
}

impl VideoFrame {
    pub fn new(
        time_point_us: i64,
        keyframe: bool,
        color_bytes: Vec<u8>,
        depth_bytes: Vec<u8>,
    ) -> Self {
        Self {
            time_point_us,
            keyframe,
            color_bytes,
            depth_bytes,
        }
    }
}

/// Encoded color frame supplied separately from its depth counterpart
#[derive(Clone, Debug, PartialEq)]
pub struct ColorByteFrame {
    pub time_point_us: i64,
    pub keyframe: bool,
    pub bytes: Vec<u8>,
}

/// Encoded depth frame supplied separately from its color counterpart
#[derive(Clone, Debug, PartialEq)]
pub struct DepthByteFrame {
    pub time_point_us: i64,
    pub keyframe: bool,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    pub time_point_us: i64,
    pub bytes: Vec<u8>,
}

impl AudioFrame {
    pub fn new(time_point_us: i64, bytes: Vec<u8>) -> Self {
        Self {
            time_point_us,
            bytes,
        }
    }
}

/// Inertial sample
#[derive(Clone, Debug, PartialEq)]
pub struct ImuFrame {
    pub time_point_us: i64,
    pub acceleration: Vector3<f32>,
    pub rotation_rate: Vector3<f32>,
    pub magnetic_field: Vector3<f32>,
    pub gravity: Vector3<f32>,
}

/// Pose sample: translation, rotation, scale
#[derive(Clone, Debug, PartialEq)]
pub struct TrsFrame {
    pub time_point_us: i64,
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub timecode_scale_ns: u64,
    pub duration_us: i64,
    pub writing_app: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorTrack {
    pub track_number: u32,
    pub width: usize,
    pub height: usize,
    pub codec: ColorCodecType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepthTrack {
    pub track_number: u32,
    pub width: usize,
    pub height: usize,
    pub codec: DepthCodecType,
    /// Physical length of one stored depth step
    pub depth_unit: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    pub track_number: u32,
    pub sampling_frequency: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileTracks {
    pub color_track: ColorTrack,
    pub depth_track: DepthTrack,
    pub audio_track: Option<AudioTrack>,
    pub acceleration_track_number: Option<u32>,
    pub rotation_rate_track_number: Option<u32>,
    pub magnetic_field_track_number: Option<u32>,
    pub gravity_track_number: Option<u32>,
    pub translation_track_number: Option<u32>,
    pub rotation_track_number: Option<u32>,
    pub scale_track_number: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileAttachments {
    pub camera_calibration: CameraCalibration,
    pub cover_png_bytes: Option<Vec<u8>>,
}

/// A fully parsed recording
#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub info: FileInfo,
    pub tracks: FileTracks,
    pub attachments: FileAttachments,
    pub video_frames: Vec<VideoFrame>,
    pub audio_frames: Vec<AudioFrame>,
    pub imu_frames: Vec<ImuFrame>,
    pub trs_frames: Vec<TrsFrame>,
    pub direction_table: Option<DirectionTable>,
}

impl File {
    pub fn calibration(&self) -> &CameraCalibration {
        &self.attachments.camera_calibration
    }

    /// Whether the recording carries any IMU track
    pub fn has_imu(&self) -> bool {
        self.tracks.acceleration_track_number.is_some()
            || self.tracks.rotation_rate_track_number.is_some()
            || self.tracks.magnetic_field_track_number.is_some()
            || self.tracks.gravity_track_number.is_some()
    }
}

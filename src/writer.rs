//! Low-level recording writer.
//!
//! Lays out the fixed track set of a recording on top of the container
//! and writes frames in the order they are given. Ordering and time
//! rebasing are the multiplexer's job.

use std::io::{Seek, Write};

use log::{debug, info};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rgbd_core::constants::{AUDIO_INPUT_CHANNEL_COUNT, TIMECODE_SCALE_NS};
use rgbd_core::{AudioFrame, CameraCalibration, ColorCodecType, ImuFrame, TrsFrame, VideoFrame};
use serde::{Deserialize, Serialize};

use crate::config::WriterConfig;
use crate::container::{
    Attachment, ContainerFrame, ContainerInfo, ContainerWriter, TrackEntry, TrackKind,
};
use crate::error::Result;

pub const COLOR_TRACK_NUMBER: u32 = 1;
pub const DEPTH_TRACK_NUMBER: u32 = 2;
pub const AUDIO_TRACK_NUMBER: u32 = 3;
pub const ACCELERATION_TRACK_NUMBER: u32 = 4;
pub const ROTATION_RATE_TRACK_NUMBER: u32 = 5;
pub const MAGNETIC_FIELD_TRACK_NUMBER: u32 = 6;
pub const GRAVITY_TRACK_NUMBER: u32 = 7;
pub const TRANSLATION_TRACK_NUMBER: u32 = 8;
pub const ROTATION_TRACK_NUMBER: u32 = 9;
pub const SCALE_TRACK_NUMBER: u32 = 10;

pub const COLOR_TRACK_NAME: &str = "COLOR";
pub const DEPTH_TRACK_NAME: &str = "DEPTH";
pub const AUDIO_TRACK_NAME: &str = "AUDIO";
pub const ACCELERATION_TRACK_NAME: &str = "ACCELERATION";
pub const ROTATION_RATE_TRACK_NAME: &str = "ROTATION_RATE";
pub const MAGNETIC_FIELD_TRACK_NAME: &str = "MAGNETIC_FIELD";
pub const GRAVITY_TRACK_NAME: &str = "GRAVITY";
pub const TRANSLATION_TRACK_NAME: &str = "TRANSLATION";
pub const ROTATION_TRACK_NAME: &str = "ROTATION";
pub const SCALE_TRACK_NAME: &str = "SCALE";

pub const AUDIO_CODEC_ID: &str = "A_OPUS";

pub const CALIBRATION_FILE_NAME: &str = "calibration.json";
pub const COVER_FILE_NAME: &str = "cover.png";

const ONE_SECOND_NS: u64 = 1_000_000_000;

/// Private data of the depth track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DepthCodecPrivate {
    pub depth_unit: f32,
}

pub(crate) fn vec3_to_bytes(v: &Vector3<f32>) -> Vec<u8> {
    v.iter().flat_map(|c| c.to_le_bytes()).collect()
}

pub(crate) fn bytes_to_vec3(bytes: &[u8]) -> Option<Vector3<f32>> {
    let [x, y, z] = read_f32s::<3>(bytes)?;
    Some(Vector3::new(x, y, z))
}

/// Quaternions are stored as w, x, y, z
pub(crate) fn quat_to_bytes(q: &UnitQuaternion<f32>) -> Vec<u8> {
    [q.w, q.i, q.j, q.k]
        .iter()
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

pub(crate) fn bytes_to_quat(bytes: &[u8]) -> Option<UnitQuaternion<f32>> {
    let [w, x, y, z] = read_f32s::<4>(bytes)?;
    Some(UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
}

fn read_f32s<const N: usize>(bytes: &[u8]) -> Option<[f32; N]> {
    if bytes.len() != N * 4 {
        return None;
    }
    let mut values = [0f32; N];
    for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(values)
}

fn data_track(number: u32, name: &str) -> TrackEntry {
    TrackEntry {
        number,
        name: name.to_string(),
        codec_id: format!("S_{}", name),
        kind: TrackKind::Data,
        default_duration_ns: 0,
        codec_private: None,
    }
}

fn track_entries(
    calibration: &CameraCalibration,
    config: &WriterConfig,
) -> Result<Vec<TrackEntry>> {
    let frame_duration_ns = config.frame_duration_ns();
    let depth_private = serde_json::to_vec(&DepthCodecPrivate {
        depth_unit: config.depth_unit,
    })?;

    Ok(vec![
        TrackEntry {
            number: COLOR_TRACK_NUMBER,
            name: COLOR_TRACK_NAME.to_string(),
            codec_id: ColorCodecType::Vp8.codec_id().to_string(),
            kind: TrackKind::Video {
                width: calibration.color_width() as u32,
                height: calibration.color_height() as u32,
            },
            default_duration_ns: frame_duration_ns,
            codec_private: None,
        },
        TrackEntry {
            number: DEPTH_TRACK_NUMBER,
            name: DEPTH_TRACK_NAME.to_string(),
            codec_id: config.depth_codec_type.codec_id().to_string(),
            kind: TrackKind::Video {
                width: calibration.depth_width() as u32,
                height: calibration.depth_height() as u32,
            },
            default_duration_ns: frame_duration_ns,
            codec_private: Some(depth_private),
        },
        TrackEntry {
            number: AUDIO_TRACK_NUMBER,
            name: AUDIO_TRACK_NAME.to_string(),
            codec_id: AUDIO_CODEC_ID.to_string(),
            kind: TrackKind::Audio {
                sampling_frequency: config.samplerate as f64,
                channels: AUDIO_INPUT_CHANNEL_COUNT,
            },
            default_duration_ns: ONE_SECOND_NS / config.samplerate.max(1) as u64,
            codec_private: None,
        },
        data_track(ACCELERATION_TRACK_NUMBER, ACCELERATION_TRACK_NAME),
        data_track(ROTATION_RATE_TRACK_NUMBER, ROTATION_RATE_TRACK_NAME),
        data_track(MAGNETIC_FIELD_TRACK_NUMBER, MAGNETIC_FIELD_TRACK_NAME),
        data_track(GRAVITY_TRACK_NUMBER, GRAVITY_TRACK_NAME),
        data_track(TRANSLATION_TRACK_NUMBER, TRANSLATION_TRACK_NAME),
        data_track(ROTATION_TRACK_NUMBER, ROTATION_TRACK_NAME),
        data_track(SCALE_TRACK_NUMBER, SCALE_TRACK_NAME),
    ])
}

/// Writes recording frames into a container
pub struct RecordWriter<W: Write + Seek> {
    container: ContainerWriter<W>,
}

impl<W: Write + Seek> RecordWriter<W> {
    /// Write the track layout and attachments; frames follow
    pub fn new(
        writer: W,
        calibration: &CameraCalibration,
        config: &WriterConfig,
        cover_png_bytes: Option<&[u8]>,
    ) -> Result<Self> {
        config.validate()?;

        let info = ContainerInfo {
            writing_app: format!("librgbd-{}", env!("CARGO_PKG_VERSION")),
            camera_device_type: calibration.device_type() as i32,
            tracks: track_entries(calibration, config)?,
        };

        let mut attachments = vec![Attachment {
            file_name: CALIBRATION_FILE_NAME.to_string(),
            mime_type: "application/json".to_string(),
            data: calibration.to_json_string()?.into_bytes(),
        }];
        if let Some(cover) = cover_png_bytes {
            attachments.push(Attachment {
                file_name: COVER_FILE_NAME.to_string(),
                mime_type: "image/png".to_string(),
                data: cover.to_vec(),
            });
        }

        let container = ContainerWriter::new(writer, TIMECODE_SCALE_NS, &info, &attachments)?;

        info!(
            "Opened recording: {} calibration, {} depth, {} attachment(s)",
            calibration.device_type(),
            config.depth_codec_type,
            attachments.len()
        );

        Ok(Self { container })
    }

    pub fn write_video_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        self.container.write_frame(&ContainerFrame::new(
            COLOR_TRACK_NUMBER,
            frame.time_point_us,
            frame.keyframe,
            frame.color_bytes.clone(),
        ))?;
        self.container.write_frame(&ContainerFrame::new(
            DEPTH_TRACK_NUMBER,
            frame.time_point_us,
            frame.keyframe,
            frame.depth_bytes.clone(),
        ))?;
        Ok(())
    }

    pub fn write_audio_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        self.container.write_frame(&ContainerFrame::new(
            AUDIO_TRACK_NUMBER,
            frame.time_point_us,
            true,
            frame.bytes.clone(),
        ))?;
        Ok(())
    }

    pub fn write_imu_frame(&mut self, frame: &ImuFrame) -> Result<()> {
        for (track_number, value) in [
            (ACCELERATION_TRACK_NUMBER, &frame.acceleration),
            (ROTATION_RATE_TRACK_NUMBER, &frame.rotation_rate),
            (MAGNETIC_FIELD_TRACK_NUMBER, &frame.magnetic_field),
            (GRAVITY_TRACK_NUMBER, &frame.gravity),
        ] {
            self.container.write_frame(&ContainerFrame::new(
                track_number,
                frame.time_point_us,
                true,
                vec3_to_bytes(value),
            ))?;
        }
        Ok(())
    }

    pub fn write_trs_frame(&mut self, frame: &TrsFrame) -> Result<()> {
        let payloads = [
            (TRANSLATION_TRACK_NUMBER, vec3_to_bytes(&frame.translation)),
            (ROTATION_TRACK_NUMBER, quat_to_bytes(&frame.rotation)),
            (SCALE_TRACK_NUMBER, vec3_to_bytes(&frame.scale)),
        ];
        for (track_number, data) in payloads {
            self.container.write_frame(&ContainerFrame::new(
                track_number,
                frame.time_point_us,
                true,
                data,
            ))?;
        }
        Ok(())
    }

    /// Write the index and footer and hand back the sink
    pub fn finish(self) -> Result<W> {
        let frame_count = self.container.frame_count();
        let writer = self.container.finish()?;
        debug!("Wrote {} container frames", frame_count);
        info!("Finished recording");
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerReader;
    use rgbd_core::{CameraDeviceType, DepthCodecType, UndistortedCalibration};
    use std::io::Cursor;

    fn calibration() -> CameraCalibration {
        CameraCalibration::Undistorted(UndistortedCalibration {
            color_width: 1024,
            color_height: 1024,
            depth_width: 512,
            depth_height: 512,
            fx: 0.5,
            fy: 0.5,
            cx: 0.5,
            cy: 0.5,
        })
    }

    #[test]
    fn test_track_layout() {
        let config = WriterConfig {
            depth_codec_type: DepthCodecType::Rvl,
            depth_unit: 0.0005,
            ..WriterConfig::default()
        };
        let cover = Some(&b"png"[..]);
        let writer =
            RecordWriter::new(Cursor::new(Vec::new()), &calibration(), &config, cover).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let reader = ContainerReader::open(Cursor::new(bytes)).unwrap();
        let info = reader.info();
        assert!(info.writing_app.starts_with("librgbd-"));
        assert_eq!(info.camera_device_type, CameraDeviceType::Undistorted as i32);
        assert_eq!(info.tracks.len(), 10);

        let depth = info.track(DEPTH_TRACK_NUMBER).unwrap();
        assert_eq!(depth.codec_id, "V_RVL");
        assert_eq!(
            depth.kind,
            TrackKind::Video {
                width: 512,
                height: 512
            }
        );
        let private: DepthCodecPrivate =
            serde_json::from_slice(depth.codec_private.as_ref().unwrap()).unwrap();
        assert!((private.depth_unit - 0.0005).abs() < 1e-9);

        assert_eq!(info.track(SCALE_TRACK_NUMBER).unwrap().name, SCALE_TRACK_NAME);
        assert_eq!(info.track(COLOR_TRACK_NUMBER).unwrap().default_duration_ns, 33_333_333);
        assert_eq!(reader.attachment(COVER_FILE_NAME).unwrap().data, b"png".to_vec());
        assert!(reader.attachment(CALIBRATION_FILE_NAME).is_some());
    }

    #[test]
    fn test_payload_encoding() {
        let v = Vector3::new(1.5f32, -2.0, 0.25);
        let bytes = vec3_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &1.5f32.to_le_bytes());
        assert_eq!(bytes_to_vec3(&bytes), Some(v));
        assert_eq!(bytes_to_vec3(&bytes[..8]), None);

        let q = UnitQuaternion::from_euler_angles(0.1f32, 0.2, 0.3);
        let bytes = quat_to_bytes(&q);
        assert_eq!(&bytes[0..4], &q.w.to_le_bytes());
        let back = bytes_to_quat(&bytes).unwrap();
        assert!((back.coords - q.coords).norm() < 1e-6);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_writing() {
        let config = WriterConfig {
            depth_unit: -1.0,
            ..WriterConfig::default()
        };
        let result = RecordWriter::new(Cursor::new(Vec::new()), &calibration(), &config, None);
        assert!(result.is_err());
    }
}

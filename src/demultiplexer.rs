//! Recording parser.
//!
//! Reads a whole recording in one pass and rebuilds the [`File`] model:
//! track descriptions, calibration and cover attachments, and optionally
//! every frame plus the per-pixel direction table.

use std::collections::HashSet;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use log::{debug, info, warn};
use nalgebra::{UnitQuaternion, Vector3};
use rgbd_core::constants::DEFAULT_DEPTH_UNIT;
use rgbd_core::{
    AudioFrame, AudioTrack, CameraCalibration, ColorCodecType, ColorTrack, DepthCodecType,
    DepthTrack, DirectionTable, File, FileAttachments, FileInfo, FileTracks, ImuFrame, TrsFrame,
    VideoFrame,
};

use crate::container::{ContainerFrame, ContainerInfo, ContainerReader, TrackEntry, TrackKind};
use crate::error::{RecordError, Result};
use crate::writer::{
    bytes_to_quat, bytes_to_vec3, DepthCodecPrivate, ACCELERATION_TRACK_NAME, AUDIO_TRACK_NAME,
    CALIBRATION_FILE_NAME, COLOR_TRACK_NAME, COVER_FILE_NAME, DEPTH_TRACK_NAME,
    GRAVITY_TRACK_NAME, MAGNETIC_FIELD_TRACK_NAME, ROTATION_RATE_TRACK_NAME,
    ROTATION_TRACK_NAME, SCALE_TRACK_NAME, TRANSLATION_TRACK_NAME,
};

/// Where a recording is read from
#[derive(Debug, Clone, Copy)]
pub enum RecordSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Path> for RecordSource<'a> {
    fn from(path: &'a Path) -> Self {
        RecordSource::Path(path)
    }
}

impl<'a> From<&'a [u8]> for RecordSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        RecordSource::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for RecordSource<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        RecordSource::Bytes(bytes.as_slice())
    }
}

pub fn parse<'a>(
    source: impl Into<RecordSource<'a>>,
    with_frames: bool,
    with_direction_table: bool,
) -> Result<File> {
    match source.into() {
        RecordSource::Path(path) => {
            let file = std::fs::File::open(path)?;
            debug!("Parsing recording {}", path.display());
            parse_reader(BufReader::new(file), with_frames, with_direction_table)
        }
        RecordSource::Bytes(bytes) => {
            parse_reader(Cursor::new(bytes), with_frames, with_direction_table)
        }
    }
}

pub fn parse_path(
    path: impl AsRef<Path>,
    with_frames: bool,
    with_direction_table: bool,
) -> Result<File> {
    parse(path.as_ref(), with_frames, with_direction_table)
}

pub fn parse_bytes(bytes: &[u8], with_frames: bool, with_direction_table: bool) -> Result<File> {
    parse(bytes, with_frames, with_direction_table)
}

fn video_size(entry: &TrackEntry) -> Result<(usize, usize)> {
    match entry.kind {
        TrackKind::Video { width, height } => Ok((width as usize, height as usize)),
        _ => Err(RecordError::corrupt(format!(
            "track {} is not a video track",
            entry.name
        ))),
    }
}

fn parse_tracks(info: &ContainerInfo) -> Result<FileTracks> {
    let color = info
        .track_by_name(COLOR_TRACK_NAME)
        .ok_or_else(|| RecordError::corrupt("corrupt container: no color track"))?;
    let depth = info
        .track_by_name(DEPTH_TRACK_NAME)
        .ok_or_else(|| RecordError::corrupt("corrupt container: no depth track"))?;

    let (color_width, color_height) = video_size(color)?;
    let color_track = ColorTrack {
        track_number: color.number,
        width: color_width,
        height: color_height,
        codec: ColorCodecType::try_from(color.codec_id.as_str()).map_err(RecordError::corrupt)?,
    };

    let depth_unit = match &depth.codec_private {
        Some(bytes) => {
            serde_json::from_slice::<DepthCodecPrivate>(bytes)
                .map_err(|e| RecordError::corrupt(format!("invalid depth codec private: {}", e)))?
                .depth_unit
        }
        None => DEFAULT_DEPTH_UNIT,
    };
    let (depth_width, depth_height) = video_size(depth)?;
    let depth_track = DepthTrack {
        track_number: depth.number,
        width: depth_width,
        height: depth_height,
        codec: DepthCodecType::try_from(depth.codec_id.as_str()).map_err(RecordError::corrupt)?,
        depth_unit,
    };

    let audio_track = info
        .track_by_name(AUDIO_TRACK_NAME)
        .map(|audio| match audio.kind {
            TrackKind::Audio {
                sampling_frequency, ..
            } => Ok(AudioTrack {
                track_number: audio.number,
                sampling_frequency,
            }),
            _ => Err(RecordError::corrupt("audio track has no audio settings")),
        })
        .transpose()?;

    let number = |name: &str| info.track_by_name(name).map(|t| t.number);

    Ok(FileTracks {
        color_track,
        depth_track,
        audio_track,
        acceleration_track_number: number(ACCELERATION_TRACK_NAME),
        rotation_rate_track_number: number(ROTATION_RATE_TRACK_NAME),
        magnetic_field_track_number: number(MAGNETIC_FIELD_TRACK_NAME),
        gravity_track_number: number(GRAVITY_TRACK_NAME),
        translation_track_number: number(TRANSLATION_TRACK_NAME),
        rotation_track_number: number(ROTATION_TRACK_NAME),
        scale_track_number: number(SCALE_TRACK_NAME),
    })
}

fn parse_attachments<R: Read + Seek>(reader: &ContainerReader<R>) -> Result<FileAttachments> {
    let calibration = reader
        .attachment(CALIBRATION_FILE_NAME)
        .ok_or_else(|| RecordError::corrupt("corrupt container: no calibration attachment"))?;
    let json = std::str::from_utf8(&calibration.data)
        .map_err(|e| RecordError::corrupt(format!("calibration is not UTF-8: {}", e)))?;
    let device_type = reader.info().camera_device_type;

    Ok(FileAttachments {
        camera_calibration: CameraCalibration::from_device_type_and_json(device_type, json)?,
        cover_png_bytes: reader.attachment(COVER_FILE_NAME).map(|a| a.data.clone()),
    })
}

/// Frames of one sensor track, in file order
struct SampleTrack<T> {
    samples: Vec<(i64, T)>,
}

impl<T> Default for SampleTrack<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T> SampleTrack<T> {
    fn push(&mut self, time_point_us: i64, value: T) {
        self.samples.push((time_point_us, value));
    }

    fn time_points(&self) -> Vec<i64> {
        self.samples.iter().map(|(t, _)| *t).collect()
    }
}

fn decode_sample<T>(
    frame: &ContainerFrame,
    name: &str,
    decode: impl Fn(&[u8]) -> Option<T>,
) -> Result<T> {
    decode(&frame.data).ok_or_else(|| {
        RecordError::corrupt(format!(
            "malformed {} sample at {} us ({} bytes)",
            name,
            frame.timestamp,
            frame.data.len()
        ))
    })
}

/// Check that sibling sensor tracks carry one sample per timestamp
fn check_aligned(name: &str, time_points: &[Vec<i64>]) -> Result<()> {
    if time_points.windows(2).all(|pair| pair[0] == pair[1]) {
        Ok(())
    } else {
        Err(RecordError::corrupt(format!("{} tracks are not aligned", name)))
    }
}

#[derive(Default)]
struct FrameCollector {
    color: Vec<ContainerFrame>,
    depth: Vec<ContainerFrame>,
    audio_frames: Vec<AudioFrame>,
    acceleration: SampleTrack<Vector3<f32>>,
    rotation_rate: SampleTrack<Vector3<f32>>,
    magnetic_field: SampleTrack<Vector3<f32>>,
    gravity: SampleTrack<Vector3<f32>>,
    translation: SampleTrack<Vector3<f32>>,
    rotation: SampleTrack<UnitQuaternion<f32>>,
    scale: SampleTrack<Vector3<f32>>,
    skipped_tracks: HashSet<u32>,
}

impl FrameCollector {
    fn push(&mut self, tracks: &FileTracks, frame: ContainerFrame) -> Result<()> {
        let n = Some(frame.track_number);
        let t = frame.timestamp;

        if frame.track_number == tracks.color_track.track_number {
            self.color.push(frame);
        } else if frame.track_number == tracks.depth_track.track_number {
            self.depth.push(frame);
        } else if n == tracks.audio_track.as_ref().map(|a| a.track_number) {
            self.audio_frames.push(AudioFrame::new(t, frame.data));
        } else if n == tracks.acceleration_track_number {
            let v = decode_sample(&frame, ACCELERATION_TRACK_NAME, bytes_to_vec3)?;
            self.acceleration.push(t, v);
        } else if n == tracks.rotation_rate_track_number {
            let v = decode_sample(&frame, ROTATION_RATE_TRACK_NAME, bytes_to_vec3)?;
            self.rotation_rate.push(t, v);
        } else if n == tracks.magnetic_field_track_number {
            let v = decode_sample(&frame, MAGNETIC_FIELD_TRACK_NAME, bytes_to_vec3)?;
            self.magnetic_field.push(t, v);
        } else if n == tracks.gravity_track_number {
            let v = decode_sample(&frame, GRAVITY_TRACK_NAME, bytes_to_vec3)?;
            self.gravity.push(t, v);
        } else if n == tracks.translation_track_number {
            let v = decode_sample(&frame, TRANSLATION_TRACK_NAME, bytes_to_vec3)?;
            self.translation.push(t, v);
        } else if n == tracks.rotation_track_number {
            let q = decode_sample(&frame, ROTATION_TRACK_NAME, bytes_to_quat)?;
            self.rotation.push(t, q);
        } else if n == tracks.scale_track_number {
            let v = decode_sample(&frame, SCALE_TRACK_NAME, bytes_to_vec3)?;
            self.scale.push(t, v);
        } else if self.skipped_tracks.insert(frame.track_number) {
            warn!(
                "Skipping frames of unknown track {}",
                frame.track_number
            );
        }
        Ok(())
    }

    fn video_frames(
        color: Vec<ContainerFrame>,
        depth: Vec<ContainerFrame>,
    ) -> Result<Vec<VideoFrame>> {
        if color.len() != depth.len() {
            return Err(RecordError::corrupt(format!(
                "{} color frames but {} depth frames",
                color.len(),
                depth.len()
            )));
        }
        color
            .into_iter()
            .zip(depth)
            .map(|(color, depth)| {
                if color.timestamp != depth.timestamp {
                    return Err(RecordError::corrupt(format!(
                        "color frame at {} us has depth frame at {} us",
                        color.timestamp, depth.timestamp
                    )));
                }
                Ok(VideoFrame::new(
                    color.timestamp,
                    color.is_keyframe(),
                    color.data,
                    depth.data,
                ))
            })
            .collect()
    }

    fn imu_frames(&self) -> Result<Vec<ImuFrame>> {
        check_aligned(
            "IMU",
            &[
                self.acceleration.time_points(),
                self.rotation_rate.time_points(),
                self.magnetic_field.time_points(),
                self.gravity.time_points(),
            ],
        )?;
        Ok(self
            .acceleration
            .samples
            .iter()
            .zip(&self.rotation_rate.samples)
            .zip(&self.magnetic_field.samples)
            .zip(&self.gravity.samples)
            .map(|((((t, acceleration), (_, rotation_rate)), (_, magnetic_field)), (_, gravity))| {
                ImuFrame {
                    time_point_us: *t,
                    acceleration: *acceleration,
                    rotation_rate: *rotation_rate,
                    magnetic_field: *magnetic_field,
                    gravity: *gravity,
                }
            })
            .collect())
    }

    fn trs_frames(&self) -> Result<Vec<TrsFrame>> {
        check_aligned(
            "TRS",
            &[
                self.translation.time_points(),
                self.rotation.time_points(),
                self.scale.time_points(),
            ],
        )?;
        Ok(self
            .translation
            .samples
            .iter()
            .zip(&self.rotation.samples)
            .zip(&self.scale.samples)
            .map(|(((t, translation), (_, rotation)), (_, scale))| TrsFrame {
                time_point_us: *t,
                translation: *translation,
                rotation: *rotation,
                scale: *scale,
            })
            .collect())
    }
}

fn parse_reader<R: Read + Seek>(
    reader: R,
    with_frames: bool,
    with_direction_table: bool,
) -> Result<File> {
    let mut reader = ContainerReader::open(reader)?;

    let info = FileInfo {
        timecode_scale_ns: reader.header().timecode_scale_ns,
        duration_us: reader.footer().duration,
        writing_app: reader.info().writing_app.clone(),
    };
    let tracks = parse_tracks(reader.info())?;
    let attachments = parse_attachments(&reader)?;

    let mut collector = FrameCollector::default();
    if with_frames {
        while let Some(frame) = reader.read_frame()? {
            collector.push(&tracks, frame)?;
        }
    }

    let imu_frames = collector.imu_frames()?;
    let trs_frames = collector.trs_frames()?;
    let video_frames = FrameCollector::video_frames(
        std::mem::take(&mut collector.color),
        std::mem::take(&mut collector.depth),
    )?;

    let direction_table = if with_direction_table {
        Some(DirectionTable::build(&attachments.camera_calibration))
    } else {
        None
    };

    info!(
        "Parsed recording from {}: {} video, {} audio, {} imu, {} trs frames",
        info.writing_app,
        video_frames.len(),
        collector.audio_frames.len(),
        imu_frames.len(),
        trs_frames.len()
    );

    Ok(File {
        info,
        tracks,
        attachments,
        video_frames,
        audio_frames: collector.audio_frames,
        imu_frames,
        trs_frames,
        direction_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Attachment, ContainerWriter};
    use crate::multiplexer::Multiplexer;
    use rgbd_core::{CalibrationError, CameraDeviceType, IosCalibration, UndistortedCalibration};
    use std::io::{ErrorKind, Write};

    fn undistorted() -> CameraCalibration {
        CameraCalibration::Undistorted(UndistortedCalibration {
            color_width: 8,
            color_height: 8,
            depth_width: 4,
            depth_height: 4,
            fx: 0.5,
            fy: 0.5,
            cx: 0.5,
            cy: 0.5,
        })
    }

    fn video_tracks() -> Vec<TrackEntry> {
        vec![
            TrackEntry {
                number: 1,
                name: COLOR_TRACK_NAME.to_string(),
                codec_id: "V_VP8".to_string(),
                kind: TrackKind::Video {
                    width: 8,
                    height: 8,
                },
                default_duration_ns: 0,
                codec_private: None,
            },
            TrackEntry {
                number: 2,
                name: DEPTH_TRACK_NAME.to_string(),
                codec_id: "V_RVL".to_string(),
                kind: TrackKind::Video {
                    width: 4,
                    height: 4,
                },
                default_duration_ns: 0,
                codec_private: None,
            },
        ]
    }

    fn container(
        tracks: Vec<TrackEntry>,
        calibration_json: Option<&str>,
        frames: &[ContainerFrame],
    ) -> Vec<u8> {
        let device_type = CameraDeviceType::Undistorted as i32;
        tagged_container(device_type, tracks, calibration_json, frames)
    }

    fn tagged_container(
        camera_device_type: i32,
        tracks: Vec<TrackEntry>,
        calibration_json: Option<&str>,
        frames: &[ContainerFrame],
    ) -> Vec<u8> {
        let info = ContainerInfo {
            writing_app: "handmade".to_string(),
            camera_device_type,
            tracks,
        };
        let attachments: Vec<Attachment> = calibration_json
            .map(|json| Attachment {
                file_name: CALIBRATION_FILE_NAME.to_string(),
                mime_type: "application/json".to_string(),
                data: json.as_bytes().to_vec(),
            })
            .into_iter()
            .collect();
        let mut writer =
            ContainerWriter::new(Cursor::new(Vec::new()), 1000, &info, &attachments).unwrap();
        for frame in frames {
            writer.write_frame(frame).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_path(dir.path().join("missing.rgbd"), true, false).unwrap_err();
        match err {
            RecordError::Io(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_io_error() {
        let err = parse_bytes(&[0u8; 200], true, false).unwrap_err();
        assert!(matches!(err, RecordError::Io(_)));
    }

    #[test]
    fn test_unknown_calibration_tag() {
        let bytes = container(
            video_tracks(),
            Some(r#"{"calibrationType":"lidar","colorWidth":8}"#),
            &[],
        );
        let err = parse_bytes(&bytes, true, false).unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedDeviceType(tag) if tag == "lidar"));
    }

    #[test]
    fn test_device_tag_must_match_calibration() {
        let json = undistorted().to_json_string().unwrap();

        let ios = CameraDeviceType::Ios as i32;
        let bytes = tagged_container(ios, video_tracks(), Some(&json), &[]);
        assert!(matches!(
            parse_bytes(&bytes, true, false),
            Err(RecordError::Calibration(CalibrationError::DeviceTypeMismatch { .. }))
        ));

        let bytes = tagged_container(9, video_tracks(), Some(&json), &[]);
        let err = parse_bytes(&bytes, true, false).unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedDeviceType(tag) if tag == "9"));
    }

    #[test]
    fn test_missing_calibration_is_corrupt() {
        let bytes = container(video_tracks(), None, &[]);
        match parse_bytes(&bytes, true, false).unwrap_err() {
            RecordError::Io(e) => assert_eq!(e.kind(), ErrorKind::InvalidData),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_depth_track_is_corrupt() {
        let json = undistorted().to_json_string().unwrap();
        let mut tracks = video_tracks();
        tracks.pop();
        let bytes = container(tracks, Some(&json), &[]);
        assert!(matches!(
            parse_bytes(&bytes, true, false),
            Err(RecordError::Io(_))
        ));
    }

    #[test]
    fn test_unknown_track_frames_are_skipped() {
        let json = undistorted().to_json_string().unwrap();
        let mut tracks = video_tracks();
        tracks.push(TrackEntry {
            number: 42,
            name: "SUBTITLES".to_string(),
            codec_id: "S_TEXT".to_string(),
            kind: TrackKind::Data,
            default_duration_ns: 0,
            codec_private: None,
        });
        let frames = [
            ContainerFrame::new(1, 0, true, vec![1]),
            ContainerFrame::new(2, 0, true, vec![2]),
            ContainerFrame::new(42, 5, true, b"hello".to_vec()),
            ContainerFrame::new(77, 6, true, vec![0]),
        ];
        let bytes = container(tracks, Some(&json), &frames);

        let file = parse_bytes(&bytes, true, false).unwrap();
        assert_eq!(file.video_frames.len(), 1);
        assert!(file.audio_frames.is_empty());
        assert!(file.imu_frames.is_empty());
        assert!(file.tracks.audio_track.is_none());
        assert!(!file.has_imu());
        // No codec private falls back to the default unit.
        assert!((file.tracks.depth_track.depth_unit - DEFAULT_DEPTH_UNIT).abs() < 1e-9);
    }

    #[test]
    fn test_without_frames_keeps_metadata() {
        let mut mux = Multiplexer::new();
        mux.set_calibration(undistorted());
        mux.set_samplerate(44_100);
        mux.add_video_frame(VideoFrame::new(0, true, vec![1], vec![2]));
        mux.add_audio_frame(AudioFrame::new(0, vec![3]));
        let bytes = mux.build().unwrap();

        let file = parse(&bytes, false, false).unwrap();
        assert!(file.video_frames.is_empty());
        assert!(file.audio_frames.is_empty());
        assert!(file.direction_table.is_none());
        assert!(file.has_imu());
        assert_eq!(file.tracks.audio_track.as_ref().unwrap().sampling_frequency, 44_100.0);
        assert_eq!(file.tracks.scale_track_number, Some(10));
        assert!(file.info.writing_app.starts_with("librgbd-"));
        assert_eq!(file.info.timecode_scale_ns, 1000);
    }

    #[test]
    fn test_imu_and_trs_roundtrip() {
        let mut mux = Multiplexer::new();
        mux.set_calibration(undistorted());
        let imu_frames: Vec<ImuFrame> = (0..3)
            .map(|i| ImuFrame {
                time_point_us: i * 10,
                acceleration: Vector3::new(i as f32, 0.0, 0.0),
                rotation_rate: Vector3::new(0.0, i as f32, 0.0),
                magnetic_field: Vector3::new(0.0, 0.0, i as f32),
                gravity: Vector3::new(0.0, -1.0, 0.0),
            })
            .collect();
        for frame in &imu_frames {
            mux.add_imu_frame(frame.clone());
        }
        let rotation = UnitQuaternion::from_euler_angles(0.3f32, -0.2, 0.1);
        mux.add_trs_frame(TrsFrame {
            time_point_us: 15,
            translation: Vector3::new(0.5, 0.25, -1.0),
            rotation,
            scale: Vector3::new(2.0, 2.0, 2.0),
        });
        mux.add_video_frame(VideoFrame::new(20, true, vec![1], vec![2]));
        let bytes = mux.build().unwrap();

        let file = parse_bytes(&bytes, true, false).unwrap();
        assert_eq!(file.imu_frames, imu_frames);
        assert_eq!(file.trs_frames.len(), 1);
        let trs = &file.trs_frames[0];
        assert_eq!(trs.time_point_us, 15);
        assert_eq!(trs.scale, Vector3::new(2.0, 2.0, 2.0));
        assert!((trs.rotation.coords - rotation.coords).norm() < 1e-6);
    }

    #[test]
    fn test_parse_path_builds_direction_table() {
        let calibration = CameraCalibration::Ios(IosCalibration {
            color_width: 8,
            color_height: 8,
            depth_width: 4,
            depth_height: 4,
            fx: 6.0,
            fy: 6.0,
            ox: 4.0,
            oy: 4.0,
            reference_dimension_width: 8.0,
            reference_dimension_height: 8.0,
            lens_distortion_center_x: 4.0,
            lens_distortion_center_y: 4.0,
            lens_distortion_lookup_table: vec![0.0; 4],
            inverse_lens_distortion_lookup_table: vec![0.0; 4],
        });
        let mut mux = Multiplexer::new();
        mux.set_calibration(calibration.clone());
        mux.add_video_frame(VideoFrame::new(0, true, vec![1], vec![2]));
        let bytes = mux.build().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let parsed = parse(file.path(), true, true).unwrap();
        assert_eq!(parsed.calibration().device_type(), CameraDeviceType::Ios);
        assert_eq!(parsed.calibration(), &calibration);
        let table = parsed.direction_table.unwrap();
        assert_eq!(table.len(), 16);
        assert_eq!(table, DirectionTable::build(&calibration));
    }
}

//! Recording assembly.
//!
//! Collects frames from independent producers, orders them, rebases their
//! timestamps so the earliest frame of any stream lands at zero, and writes
//! them through a [`RecordWriter`]:
//!
//! ```text
//!  video ─┐
//!  audio ─┤ sort ─► minimum t ─► for each video frame:
//!  imu   ─┤                        drain audio ≤ t, imu ≤ t, trs ≤ t
//!  trs   ─┘                        write video
//! ```
//!
//! Non-video frames later than the last video frame are not written.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use log::{debug, warn};
use rgbd_core::{
    AudioFrame, CameraCalibration, ColorByteFrame, DepthByteFrame, DepthCodecType, ImuFrame,
    Timestamped, TrsFrame, VideoFrame, YuvFrame,
};

use crate::config::WriterConfig;
use crate::cover::create_cover_png_bytes;
use crate::error::{RecordError, Result};
use crate::writer::RecordWriter;

fn sort_by_time<T: Timestamped>(frames: &mut [T]) {
    // Stable, so equal timestamps keep insertion order.
    frames.sort_by_key(|f| f.time_point_us());
}

fn rebased<T: Timestamped + Clone>(frame: &T, minimum_time_point_us: i64) -> T {
    frame
        .clone()
        .with_time_point_us(frame.time_point_us() - minimum_time_point_us)
}

/// In-memory recording builder
#[derive(Default)]
pub struct Multiplexer {
    calibration: Option<CameraCalibration>,
    config: WriterConfig,
    cover_png_bytes: Option<Vec<u8>>,
    video_frames: Vec<VideoFrame>,
    color_byte_frames: Vec<ColorByteFrame>,
    depth_byte_frames: Vec<DepthByteFrame>,
    audio_frames: Vec<AudioFrame>,
    imu_frames: Vec<ImuFrame>,
    trs_frames: Vec<TrsFrame>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_calibration(&mut self, calibration: CameraCalibration) {
        self.calibration = Some(calibration);
    }

    pub fn set_config(&mut self, config: WriterConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn set_depth_codec_type(&mut self, depth_codec_type: DepthCodecType) {
        self.config.depth_codec_type = depth_codec_type;
    }

    pub fn set_depth_unit(&mut self, depth_unit: f32) {
        self.config.depth_unit = depth_unit;
    }

    pub fn set_framerate(&mut self, framerate: u32) {
        self.config.framerate = framerate;
    }

    pub fn set_samplerate(&mut self, samplerate: u32) {
        self.config.samplerate = samplerate;
    }

    pub fn set_cover_png_bytes(&mut self, cover_png_bytes: Vec<u8>) {
        self.cover_png_bytes = Some(cover_png_bytes);
    }

    /// Build the cover PNG from a decoded color frame
    pub fn set_cover(&mut self, frame: &YuvFrame) -> Result<()> {
        self.cover_png_bytes = Some(create_cover_png_bytes(frame)?);
        Ok(())
    }

    pub fn add_video_frame(&mut self, frame: VideoFrame) {
        self.video_frames.push(frame);
    }

    /// Color half of a video frame, paired with depth at write time
    pub fn add_color_byte_frame(&mut self, frame: ColorByteFrame) {
        self.color_byte_frames.push(frame);
    }

    /// Depth half of a video frame, paired with color at write time
    pub fn add_depth_byte_frame(&mut self, frame: DepthByteFrame) {
        self.depth_byte_frames.push(frame);
    }

    pub fn add_audio_frame(&mut self, frame: AudioFrame) {
        self.audio_frames.push(frame);
    }

    pub fn add_imu_frame(&mut self, frame: ImuFrame) {
        self.imu_frames.push(frame);
    }

    pub fn add_trs_frame(&mut self, frame: TrsFrame) {
        self.trs_frames.push(frame);
    }

    /// Pair the parallel color and depth collections into video frames
    fn merge_parallel_frames(&mut self) -> Result<()> {
        if self.color_byte_frames.is_empty() && self.depth_byte_frames.is_empty() {
            return Ok(());
        }

        sort_by_time(&mut self.color_byte_frames);
        sort_by_time(&mut self.depth_byte_frames);

        if self.color_byte_frames.len() != self.depth_byte_frames.len() {
            return Err(RecordError::Configuration(format!(
                "{} color frames but {} depth frames",
                self.color_byte_frames.len(),
                self.depth_byte_frames.len()
            )));
        }
        for (color, depth) in self.color_byte_frames.iter().zip(&self.depth_byte_frames) {
            if color.time_point_us != depth.time_point_us {
                return Err(RecordError::Configuration(format!(
                    "color frame at {} us paired with depth frame at {} us",
                    color.time_point_us, depth.time_point_us
                )));
            }
            if color.keyframe != depth.keyframe {
                return Err(RecordError::Configuration(format!(
                    "keyframe flags differ at {} us",
                    color.time_point_us
                )));
            }
        }

        let colors = std::mem::take(&mut self.color_byte_frames);
        let depths = std::mem::take(&mut self.depth_byte_frames);
        debug!("Paired {} parallel color/depth frames", colors.len());
        self.video_frames
            .extend(colors.into_iter().zip(depths).map(|(color, depth)| {
                VideoFrame::new(color.time_point_us, color.keyframe, color.bytes, depth.bytes)
            }));
        Ok(())
    }

    /// Sort and validate; returns the time every stream is rebased by
    fn prepare(&mut self) -> Result<i64> {
        self.merge_parallel_frames()?;

        sort_by_time(&mut self.video_frames);
        sort_by_time(&mut self.audio_frames);
        sort_by_time(&mut self.imu_frames);
        sort_by_time(&mut self.trs_frames);

        let minimum_time_point_us = [
            self.video_frames.first().map(|f| f.time_point_us),
            self.audio_frames.first().map(|f| f.time_point_us),
            self.imu_frames.first().map(|f| f.time_point_us),
            self.trs_frames.first().map(|f| f.time_point_us),
        ]
        .into_iter()
        .flatten()
        .min()
        .ok_or_else(|| RecordError::Configuration("no frames to write".to_string()))?;

        if self.calibration.is_none() {
            return Err(RecordError::Configuration(
                "no camera calibration set".to_string(),
            ));
        }
        self.config.validate()?;

        Ok(minimum_time_point_us)
    }

    /// Write the recording into `output` and hand it back
    pub fn write<W: Write + Seek>(&mut self, output: W) -> Result<W> {
        let minimum_time_point_us = self.prepare()?;
        self.write_prepared(output, minimum_time_point_us)
    }

    fn write_prepared<W: Write + Seek>(&self, output: W, minimum_time_point_us: i64) -> Result<W> {
        let calibration = self
            .calibration
            .as_ref()
            .ok_or_else(|| RecordError::Configuration("no camera calibration set".to_string()))?;
        let mut writer = RecordWriter::new(
            output,
            calibration,
            &self.config,
            self.cover_png_bytes.as_deref(),
        )?;

        let mut audio_frames = self.audio_frames.iter().peekable();
        let mut imu_frames = self.imu_frames.iter().peekable();
        let mut trs_frames = self.trs_frames.iter().peekable();

        for video_frame in &self.video_frames {
            let t = video_frame.time_point_us;
            while let Some(frame) = audio_frames.next_if(|f| f.time_point_us <= t) {
                writer.write_audio_frame(&rebased(frame, minimum_time_point_us))?;
            }
            while let Some(frame) = imu_frames.next_if(|f| f.time_point_us <= t) {
                writer.write_imu_frame(&rebased(frame, minimum_time_point_us))?;
            }
            while let Some(frame) = trs_frames.next_if(|f| f.time_point_us <= t) {
                writer.write_trs_frame(&rebased(frame, minimum_time_point_us))?;
            }
            writer.write_video_frame(&rebased(video_frame, minimum_time_point_us))?;
        }

        let dropped_audio = audio_frames.count();
        let dropped_imu = imu_frames.count();
        let dropped_trs = trs_frames.count();
        if dropped_audio + dropped_imu + dropped_trs > 0 {
            warn!(
                "Dropped frames after the last video frame: {} audio, {} imu, {} trs",
                dropped_audio, dropped_imu, dropped_trs
            );
        }

        writer.finish()
    }

    /// Write the recording into memory
    pub fn build(&mut self) -> Result<Vec<u8>> {
        Ok(self.write(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write the recording to `path`; nothing is created when validation fails
    pub fn build_to_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let minimum_time_point_us = self.prepare()?;
        let file = File::create(path.as_ref())?;
        let mut writer = self.write_prepared(BufWriter::new(file), minimum_time_point_us)?;
        writer.flush()?;
        Ok(())
    }
}

//! # rgbd
//!
//! Reading and writing multi-track RGBD recordings.
//!
//! Geometry and the data model live in [`rgbd_core`] and are re-exported
//! here. This crate adds the file layer:
//!
//! ```text
//!                 ┌───────────────┐      ┌───────────────┐
//!  frames ──────► │  Multiplexer  │ ───► │ RecordWriter  │ ──┐
//!                 └───────────────┘      └───────────────┘   │
//!                                                            ▼
//!                                                   ┌─────────────────┐
//!                                                   │ container (.rgbd│
//!                                                   │ header, frames, │
//!                                                   │ index, footer)  │
//!                                                   └─────────────────┘
//!                                                            │
//!  File ◄──────── demultiplexer::parse ◄─────────────────────┘
//! ```
//!
//! Color payloads (VP8) and audio payloads (Opus) pass through untouched;
//! callers plug their own codecs in through [`codec`]. Depth codecs (RVL,
//! TDC1) are built in.
//!
//! ## Example
//!
//! ```rust
//! use rgbd::{parse_bytes, CameraCalibration, Multiplexer, UndistortedCalibration, VideoFrame};
//!
//! let calibration = CameraCalibration::Undistorted(UndistortedCalibration {
//!     color_width: 64,
//!     color_height: 64,
//!     depth_width: 32,
//!     depth_height: 32,
//!     fx: 0.5,
//!     fy: 0.5,
//!     cx: 0.5,
//!     cy: 0.5,
//! });
//!
//! let mut mux = Multiplexer::new();
//! mux.set_calibration(calibration);
//! mux.add_video_frame(VideoFrame::new(1_000, true, vec![1, 2, 3], vec![4, 5]));
//! let bytes = mux.build().unwrap();
//!
//! let file = parse_bytes(&bytes, true, false).unwrap();
//! assert_eq!(file.video_frames[0].time_point_us, 0);
//! ```

pub mod codec;
pub mod config;
pub mod container;
pub mod cover;
pub mod demultiplexer;
pub mod error;
pub mod multiplexer;
pub mod writer;

pub use rgbd_core;
pub use rgbd_core::{
    apply_rotation_rate_and_gravity_to_rotation, derive_trs_frames, integrate_imu_rotations,
    is_valid_direction, AudioFrame, CalibrationError, CameraCalibration, CameraDeviceType,
    ColorByteFrame, ColorCodecType, DepthByteFrame, DepthCodecType, DirectionTable, File,
    FrameRemapper, ImuFrame, Int32Frame, IosCalibration, KinectCalibration, PlaneMap, Timestamped,
    TrsFrame, UndistortedCalibration, VideoFrame, YuvFrame,
};

pub use codec::{
    create_depth_decoder, create_depth_encoder, CodecError, ColorDecoder, ColorEncoder,
    DepthDecoder, DepthEncoder,
};
pub use config::WriterConfig;
pub use cover::create_cover_png_bytes;
pub use demultiplexer::{parse, parse_bytes, parse_path, RecordSource};
pub use error::{RecordError, Result};
pub use multiplexer::Multiplexer;
pub use writer::RecordWriter;

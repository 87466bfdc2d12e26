//! # RGBD Core
//!
//! Platform-independent geometry and data model for RGBD recordings.
//!
//! This crate contains pure calibration, ray and remapping logic with
//! **zero I/O dependencies**. Reading and writing recordings lives in the
//! `rgbd` crate, which builds on the types defined here.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  rgbd-core (pure, no I/O)                                   │
//! │  ├── calibration/     (Kinect, iOS, undistorted models)     │
//! │  ├── direction_table  (one unit ray per pixel)              │
//! │  ├── frame_remapper   (nearest-ray resampling)              │
//! │  ├── orientation      (gyro + gravity integration)          │
//! │  └── record           (frames, tracks, File)                │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!               ┌────────────┴────────────┐
//!               │  rgbd                   │
//!               │  (container, mux/demux, │
//!               │   codecs, cover PNG)    │
//!               └─────────────────────────┘
//! ```
//!
//! ## Example: Remapping depth between calibrations
//!
//! ```rust
//! use rgbd_core::{CameraCalibration, FrameRemapper, Int32Frame, UndistortedCalibration};
//!
//! let calibration = CameraCalibration::Undistorted(UndistortedCalibration {
//!     color_width: 8,
//!     color_height: 8,
//!     depth_width: 4,
//!     depth_height: 4,
//!     fx: 0.5,
//!     fy: 0.5,
//!     cx: 0.5,
//!     cy: 0.5,
//! });
//! let remapper = FrameRemapper::new(&calibration, &calibration);
//! let depth = Int32Frame::new(4, 4, (0..16).collect()).unwrap();
//! let mapped = remapper.map_depth_frame(&depth).unwrap();
//! assert_eq!(mapped.values(), depth.values());
//! ```

pub mod calibration;
pub mod constants;
pub mod direction_table;
pub mod error;
pub mod frame;
pub mod frame_remapper;
pub mod orientation;
pub mod record;

// Re-export commonly used types
pub use calibration::{
    is_valid_direction, CameraCalibration, CameraDeviceType, IosCalibration, KinectCalibration,
    UndistortedCalibration,
};
pub use constants::{ColorCodecType, DepthCodecType};
pub use direction_table::DirectionTable;
pub use error::CalibrationError;
pub use frame::{Int32Frame, YuvFrame};
pub use frame_remapper::{FrameRemapper, PlaneMap};
pub use orientation::{
    apply_rotation_rate_and_gravity_to_rotation, derive_trs_frames, integrate_imu_rotations,
};
pub use record::{
    AudioFrame, AudioTrack, ColorByteFrame, ColorTrack, DepthByteFrame, DepthTrack, File,
    FileAttachments, FileInfo, FileTracks, ImuFrame, Timestamped, TrsFrame, VideoFrame,
};

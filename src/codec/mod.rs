//! Frame codec seams.
//!
//! Color (VP8) and audio codecs are supplied by the caller through the
//! encoder/decoder traits; the recording layer only forwards their
//! failures. Depth codecs (RVL, TDC1) ship natively.

pub mod rvl;
pub mod tdc1;

use rgbd_core::{ColorCodecType, DepthCodecType, Int32Frame, VideoFrame, YuvFrame};
use thiserror::Error;

use crate::error::{RecordError, Result};

pub use rvl::{RvlDecoder, RvlEncoder};
pub use tdc1::{Tdc1Decoder, Tdc1Encoder, DEFAULT_DIFF_MULTIPLIER};

/// Codec failure, opaque to the recording layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Truncated stream: {0}")]
    Truncated(String),

    /// Failure reported by an external codec implementation
    #[error("Codec backend error: {0}")]
    Backend(String),
}

pub trait ColorEncoder {
    fn codec_type(&self) -> ColorCodecType;
    fn encode(
        &mut self,
        frame: &YuvFrame,
        keyframe: bool,
    ) -> std::result::Result<Vec<u8>, CodecError>;
}

pub trait ColorDecoder {
    fn decode(&mut self, bytes: &[u8]) -> std::result::Result<YuvFrame, CodecError>;
}

pub trait DepthEncoder {
    fn codec_type(&self) -> DepthCodecType;
    fn encode(&mut self, depth_values: &[i32], keyframe: bool)
        -> std::result::Result<Vec<u8>, CodecError>;
}

pub trait DepthDecoder {
    fn decode(&mut self, bytes: &[u8]) -> std::result::Result<Int32Frame, CodecError>;
}

pub fn create_depth_encoder(
    codec_type: DepthCodecType,
    width: usize,
    height: usize,
) -> Box<dyn DepthEncoder> {
    match codec_type {
        DepthCodecType::Rvl => Box::new(RvlEncoder::new(width, height)),
        DepthCodecType::Tdc1 => Box::new(Tdc1Encoder::new(width, height, DEFAULT_DIFF_MULTIPLIER)),
    }
}

pub fn create_depth_decoder(codec_type: DepthCodecType) -> Box<dyn DepthDecoder> {
    match codec_type {
        DepthCodecType::Rvl => Box::new(RvlDecoder),
        DepthCodecType::Tdc1 => Box::new(Tdc1Decoder::new()),
    }
}

/// Decode both halves of a video frame
pub fn decode_video_frame(
    color_decoder: &mut dyn ColorDecoder,
    depth_decoder: &mut dyn DepthDecoder,
    frame: &VideoFrame,
) -> Result<(YuvFrame, Int32Frame)> {
    let color = color_decoder
        .decode(&frame.color_bytes)
        .map_err(RecordError::Decode)?;
    let depth = depth_decoder
        .decode(&frame.depth_bytes)
        .map_err(RecordError::Decode)?;
    Ok((color, depth))
}

/// Encode decoded planes back into a video frame
pub fn encode_video_frame(
    color_encoder: &mut dyn ColorEncoder,
    depth_encoder: &mut dyn DepthEncoder,
    time_point_us: i64,
    keyframe: bool,
    color: &YuvFrame,
    depth: &Int32Frame,
) -> Result<VideoFrame> {
    let color_bytes = color_encoder
        .encode(color, keyframe)
        .map_err(RecordError::Encode)?;
    let depth_bytes = depth_encoder
        .encode(depth.values(), keyframe)
        .map_err(RecordError::Encode)?;
    Ok(VideoFrame::new(time_point_us, keyframe, color_bytes, depth_bytes))
}

pub(crate) fn check_pixel_count(
    values: &[i32],
    width: usize,
    height: usize,
) -> std::result::Result<(), CodecError> {
    if values.len() != width * height {
        return Err(CodecError::InvalidInput(format!(
            "expected {}x{} = {} depth values, got {}",
            width,
            height,
            width * height,
            values.len()
        )));
    }
    Ok(())
}

/// Largest depth frame a decoder will allocate for
pub const MAX_DEPTH_PIXELS: usize = 16384 * 16384;

/// Validate a decoded header's frame size before anything is allocated for it
pub(crate) fn frame_size(
    width: i32,
    height: i32,
) -> std::result::Result<(usize, usize), CodecError> {
    if width <= 0 || height <= 0 {
        return Err(CodecError::InvalidInput(format!(
            "non-positive frame size {}x{}",
            width, height
        )));
    }
    let (width, height) = (width as usize, height as usize);
    match width.checked_mul(height) {
        Some(pixel_count) if pixel_count <= MAX_DEPTH_PIXELS => Ok((width, height)),
        _ => Err(CodecError::InvalidInput(format!(
            "frame size {}x{} exceeds {} pixels",
            width, height, MAX_DEPTH_PIXELS
        ))),
    }
}

/// Split `N` little-endian i32 header fields from the payload
pub(crate) fn read_i32_header<const N: usize>(
    bytes: &[u8],
) -> std::result::Result<([i32; N], &[u8]), CodecError> {
    if bytes.len() < N * 4 {
        return Err(CodecError::Truncated(format!(
            "{} header bytes needed, got {}",
            N * 4,
            bytes.len()
        )));
    }
    let mut header = [0i32; N];
    for (i, field) in header.iter_mut().enumerate() {
        let at = i * 4;
        *field = i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    }
    Ok((header, &bytes[N * 4..]))
}

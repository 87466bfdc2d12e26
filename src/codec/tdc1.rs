//! TDC1 temporal depth codec.
//!
//! Keyframes are plain RVL. Other frames carry RVL-coded differences
//! against the decoder's running depth image, and only for pixels whose
//! change is large relative to their current depth; small changes are
//! suppressed to zero.

use rgbd_core::{DepthCodecType, Int32Frame};

use super::rvl;
use super::{read_i32_header, CodecError, DepthDecoder, DepthEncoder};

/// Change threshold: a pixel updates when `|diff| * multiplier > previous`
pub const DEFAULT_DIFF_MULTIPLIER: i64 = 500;

pub struct Tdc1Encoder {
    width: usize,
    height: usize,
    diff_multiplier: i64,
    previous_depth_values: Vec<i32>,
}

impl Tdc1Encoder {
    pub fn new(width: usize, height: usize, diff_multiplier: i64) -> Self {
        Self {
            width,
            height,
            diff_multiplier,
            previous_depth_values: vec![0; width * height],
        }
    }
}

impl DepthEncoder for Tdc1Encoder {
    fn codec_type(&self) -> DepthCodecType {
        DepthCodecType::Tdc1
    }

    fn encode(&mut self, depth_values: &[i32], keyframe: bool) -> Result<Vec<u8>, CodecError> {
        super::check_pixel_count(depth_values, self.width, self.height)?;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.width as i32).to_le_bytes());
        bytes.extend_from_slice(&(self.height as i32).to_le_bytes());
        bytes.extend_from_slice(&(keyframe as i32).to_le_bytes());

        if keyframe {
            self.previous_depth_values.copy_from_slice(depth_values);
            bytes.extend_from_slice(&rvl::compress(depth_values));
            return Ok(bytes);
        }

        let multiplier = self.diff_multiplier;
        let diffs: Vec<i32> = depth_values
            .iter()
            .zip(self.previous_depth_values.iter_mut())
            .map(|(&current, previous)| {
                let diff = current as i64 - *previous as i64;
                if diff.abs() * multiplier > *previous as i64 {
                    *previous = current;
                    diff as i32
                } else {
                    0
                }
            })
            .collect();
        bytes.extend_from_slice(&rvl::compress(&diffs));
        Ok(bytes)
    }
}

#[derive(Default)]
pub struct Tdc1Decoder {
    previous_depth_values: Vec<i32>,
}

impl Tdc1Decoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepthDecoder for Tdc1Decoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<Int32Frame, CodecError> {
        let (header, payload) = read_i32_header::<3>(bytes)?;
        let (width, height) = super::frame_size(header[0], header[1])?;
        let keyframe = header[2] > 0;
        let pixel_count = width * height;
        let values = rvl::decompress(payload, pixel_count)?;

        if keyframe {
            self.previous_depth_values = values;
        } else {
            if self.previous_depth_values.len() != pixel_count {
                self.previous_depth_values = vec![0; pixel_count];
            }
            for (previous, diff) in self.previous_depth_values.iter_mut().zip(values) {
                *previous = previous.wrapping_add(diff);
            }
        }

        Int32Frame::new(width, height, self.previous_depth_values.clone())
            .map_err(|e| CodecError::InvalidInput(e.to_string()))
    }
}

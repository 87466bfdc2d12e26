//! Decoded image planes

use crate::error::CalibrationError;

/// I420 color frame: full-size Y plane, half-size U and V planes
#[derive(Clone, Debug, PartialEq)]
pub struct YuvFrame {
    width: usize,
    height: usize,
    y_channel: Vec<u8>,
    u_channel: Vec<u8>,
    v_channel: Vec<u8>,
}

impl YuvFrame {
    pub fn new(
        width: usize,
        height: usize,
        y_channel: Vec<u8>,
        u_channel: Vec<u8>,
        v_channel: Vec<u8>,
    ) -> Result<Self, CalibrationError> {
        let y_size = width * height;
        let uv_size = (width / 2) * (height / 2);
        if y_channel.len() != y_size {
            return Err(CalibrationError::InvalidPlane(format!(
                "Y plane has {} bytes, expected {}",
                y_channel.len(),
                y_size
            )));
        }
        if u_channel.len() != uv_size || v_channel.len() != uv_size {
            return Err(CalibrationError::InvalidPlane(format!(
                "U/V planes have {}/{} bytes, expected {}",
                u_channel.len(),
                v_channel.len(),
                uv_size
            )));
        }
        Ok(Self {
            width,
            height,
            y_channel,
            u_channel,
            v_channel,
        })
    }

    /// Uniformly black frame
    pub fn black(width: usize, height: usize) -> Self {
        let uv_size = (width / 2) * (height / 2);
        Self {
            width,
            height,
            y_channel: vec![0; width * height],
            u_channel: vec![128; uv_size],
            v_channel: vec![128; uv_size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn y_channel(&self) -> &[u8] {
        &self.y_channel
    }

    pub fn u_channel(&self) -> &[u8] {
        &self.u_channel
    }

    pub fn v_channel(&self) -> &[u8] {
        &self.v_channel
    }
}

/// Single-channel integer frame (depth samples in `depth_unit`s)
#[derive(Clone, Debug, PartialEq)]
pub struct Int32Frame {
    width: usize,
    height: usize,
    values: Vec<i32>,
}

impl Int32Frame {
    pub fn new(width: usize, height: usize, values: Vec<i32>) -> Result<Self, CalibrationError> {
        if values.len() != width * height {
            return Err(CalibrationError::InvalidPlane(format!(
                "depth plane has {} values, expected {}",
                values.len(),
                width * height
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<i32> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_plane_sizes_are_checked() {
        assert!(YuvFrame::new(4, 2, vec![0; 8], vec![0; 2], vec![0; 2]).is_ok());
        assert!(YuvFrame::new(4, 2, vec![0; 7], vec![0; 2], vec![0; 2]).is_err());
        assert!(YuvFrame::new(4, 2, vec![0; 8], vec![0; 2], vec![0; 3]).is_err());
    }

    #[test]
    fn test_int32_frame_size_is_checked() {
        assert!(Int32Frame::new(2, 2, vec![1, 2, 3, 4]).is_ok());
        assert!(Int32Frame::new(2, 2, vec![1, 2, 3]).is_err());
    }
}

//! Per-pixel ray table for a calibration

use log::debug;
use nalgebra::Vector3;

use crate::calibration::CameraCalibration;

/// One ray per pixel, row-major. Invalid pixels hold the zero vector.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionTable {
    pub width: usize,
    pub height: usize,
    pub directions: Vec<Vector3<f32>>,
}

impl DirectionTable {
    /// Build the table over the calibration's depth image
    pub fn build(calibration: &CameraCalibration) -> Self {
        Self::build_with_size(
            calibration,
            calibration.depth_width(),
            calibration.depth_height(),
        )
    }

    /// Build the table over an arbitrary pixel grid covering the same
    /// field of view
    pub fn build_with_size(calibration: &CameraCalibration, width: usize, height: usize) -> Self {
        let mut directions = Vec::with_capacity(width * height);
        for row in 0..height {
            let v = row as f32 / height as f32;
            for col in 0..width {
                let u = col as f32 / width as f32;
                directions.push(calibration.get_direction(u, v));
            }
        }
        debug!(
            "Built {}x{} direction table for {} calibration",
            width,
            height,
            calibration.device_type()
        );

        Self {
            width,
            height,
            directions,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Vector3<f32>> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.directions.get(row * self.width + col)
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}

//! Ideal pinhole calibration

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::normalize_or_sentinel;

/// Pinhole model with intrinsics in normalized image coordinates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndistortedCalibration {
    pub color_width: u32,
    pub color_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl UndistortedCalibration {
    pub fn get_direction(&self, u: f32, v: f32) -> Vector3<f32> {
        let x = (u as f64 - self.cx as f64) / self.fx as f64;
        let y = (v as f64 - self.cy as f64) / self.fy as f64;
        normalize_or_sentinel(x, y, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> UndistortedCalibration {
        UndistortedCalibration {
            color_width: 1024,
            color_height: 1024,
            depth_width: 512,
            depth_height: 512,
            fx: 0.5,
            fy: 0.5,
            cx: 0.5,
            cy: 0.5,
        }
    }

    #[test]
    fn test_center_looks_forward() {
        let d = calibration().get_direction(0.5, 0.5);
        assert!((d.x).abs() < 1e-6);
        assert!((d.y).abs() < 1e-6);
        assert!((d.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_directions_are_unit_length() {
        let c = calibration();
        for i in 0..10 {
            for j in 0..10 {
                let d = c.get_direction(i as f32 / 10.0, j as f32 / 10.0);
                assert!((d.norm() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_zero_focal_length_is_sentinel() {
        let mut c = calibration();
        c.fx = 0.0;
        assert_eq!(c.get_direction(0.2, 0.2), Vector3::zeros());
    }
}

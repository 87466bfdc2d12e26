//! iOS (AVCameraCalibrationData) calibration.
//!
//! Intrinsics are given in the reference dimension. Lens distortion is a
//! radial magnification table sampled at evenly spaced radii from the
//! distortion center (index 0) to the farthest image corner (last index).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::normalize_or_sentinel;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosCalibration {
    pub color_width: u32,
    pub color_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub fx: f32,
    pub fy: f32,
    pub ox: f32,
    pub oy: f32,
    pub reference_dimension_width: f32,
    pub reference_dimension_height: f32,
    pub lens_distortion_center_x: f32,
    pub lens_distortion_center_y: f32,
    #[serde(default)]
    pub lens_distortion_lookup_table: Vec<f32>,
    #[serde(default)]
    pub inverse_lens_distortion_lookup_table: Vec<f32>,
}

impl IosCalibration {
    pub fn get_direction(&self, u: f32, v: f32) -> Vector3<f32> {
        let ref_w = self.reference_dimension_width as f64;
        let ref_h = self.reference_dimension_height as f64;
        let center_x = self.lens_distortion_center_x as f64;
        let center_y = self.lens_distortion_center_y as f64;

        // Image rows grow downward, the reference frame grows upward.
        let uu = u as f64 * ref_w;
        let vv = (1.0 - v as f64) * ref_h;
        let delta_uu = uu - center_x;
        let delta_vv = vv - center_y;
        let r = delta_uu.hypot(delta_vv);

        let delta_uu_max = center_x.max(ref_w - center_x);
        let delta_vv_max = center_y.max(ref_h - center_y);
        let r_max = delta_uu_max.hypot(delta_vv_max);

        let magnification =
            get_magnification(r, &self.inverse_lens_distortion_lookup_table, r_max);

        let calibrated_uu = center_x + delta_uu * (1.0 + magnification);
        let calibrated_vv = center_y + delta_vv * (1.0 + magnification);

        normalize_or_sentinel(
            (calibrated_uu - self.ox as f64) / self.fx as f64,
            (calibrated_vv - self.oy as f64) / self.fy as f64,
            -1.0,
        )
    }
}

/// Linearly interpolated magnification at radius `r`
fn get_magnification(r: f64, table: &[f32], r_max: f64) -> f64 {
    let last = match table.last() {
        Some(last) => *last as f64,
        None => return 0.0,
    };
    if table.len() == 1 || r >= r_max || r_max <= 0.0 {
        return last;
    }
    let val = r * (table.len() - 1) as f64 / r_max;
    let idx = val as usize;
    if idx + 1 >= table.len() {
        return last;
    }
    let frac = val - idx as f64;
    (1.0 - frac) * table[idx] as f64 + frac * table[idx + 1] as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration(table: Vec<f32>) -> IosCalibration {
        IosCalibration {
            color_width: 1920,
            color_height: 1440,
            depth_width: 640,
            depth_height: 480,
            fx: 1600.0,
            fy: 1600.0,
            ox: 960.0,
            oy: 720.0,
            reference_dimension_width: 1920.0,
            reference_dimension_height: 1440.0,
            lens_distortion_center_x: 960.0,
            lens_distortion_center_y: 720.0,
            lens_distortion_lookup_table: table.iter().map(|m| -m).collect(),
            inverse_lens_distortion_lookup_table: table,
        }
    }

    #[test]
    fn test_magnification_interpolates() {
        let table = [0.0, 0.1, 0.2];
        assert!((get_magnification(0.0, &table, 10.0)).abs() < 1e-9);
        assert!((get_magnification(2.5, &table, 10.0) - 0.05).abs() < 1e-6);
        assert!((get_magnification(7.5, &table, 10.0) - 0.15).abs() < 1e-6);
        assert!((get_magnification(12.0, &table, 10.0) - 0.2).abs() < 1e-6);
        assert_eq!(get_magnification(3.0, &[], 10.0), 0.0);
    }

    #[test]
    fn test_center_looks_forward() {
        let d = calibration(vec![0.0, 0.01, 0.02]).get_direction(0.5, 0.5);
        assert!(d.x.abs() < 1e-6);
        assert!(d.y.abs() < 1e-6);
        assert!((d.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_magnification_pushes_rays_outward() {
        let plain = calibration(vec![0.0; 4]).get_direction(0.9, 0.1);
        let magnified = calibration(vec![0.0, 0.05, 0.1, 0.15]).get_direction(0.9, 0.1);
        let plain_angle = (-plain.z).acos();
        let magnified_angle = (-magnified.z).acos();
        assert!(magnified_angle > plain_angle);
        // Upper right of the image: x right, y up.
        assert!(magnified.x > 0.0 && magnified.y > 0.0);
    }

    #[test]
    fn test_directions_are_unit_length() {
        let c = calibration(vec![0.0, 0.01, 0.03, 0.06]);
        for i in 0..10 {
            for j in 0..10 {
                let d = c.get_direction(i as f32 / 10.0, j as f32 / 10.0);
                assert!((d.norm() - 1.0).abs() < 1e-5);
            }
        }
    }
}

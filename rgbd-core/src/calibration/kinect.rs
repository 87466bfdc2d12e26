//! Azure Kinect calibration (Brown–Conrady with rational radial terms).
//!
//! Unprojection has no closed form, so a pixel is first inverted
//! approximately and then refined with Newton steps on the forward
//! projection. Intrinsics are in pixels of the `resolution_width` x
//! `resolution_height` sensor mode.

use nalgebra::{Matrix2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use super::normalize_or_sentinel;

const MAX_NEWTON_PASSES: usize = 20;
const CONVERGED_ERROR: f64 = 1e-22;
const MAX_ACCEPTED_ERROR: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinectCalibration {
    pub color_width: u32,
    pub color_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub cx: f32,
    pub cy: f32,
    pub fx: f32,
    pub fy: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    pub codx: f32,
    pub cody: f32,
    pub p1: f32,
    pub p2: f32,
    pub max_radius_for_projection: f32,
}

impl KinectCalibration {
    pub fn get_direction(&self, u: f32, v: f32) -> Vector3<f32> {
        let pixel = Vector2::new(
            u as f64 * (self.resolution_width as f64 - 1.0),
            v as f64 * (self.resolution_height as f64 - 1.0),
        );
        match self.unproject(&pixel) {
            // Kinect is y down, z forward.
            Some(xy) => normalize_or_sentinel(xy.x, -xy.y, -1.0),
            None => Vector3::zeros(),
        }
    }

    /// Forward projection of a normalized point to pixels, with the
    /// Jacobian d(pixel)/d(xy). `None` outside the projection radius.
    pub fn project(&self, xy: &Vector2<f64>) -> Option<(Vector2<f64>, Matrix2<f64>)> {
        let (cx, cy) = (self.cx as f64, self.cy as f64);
        let (fx, fy) = (self.fx as f64, self.fy as f64);
        let (k1, k2, k3) = (self.k1 as f64, self.k2 as f64, self.k3 as f64);
        let (k4, k5, k6) = (self.k4 as f64, self.k5 as f64, self.k6 as f64);
        let (p1, p2) = (self.p1 as f64, self.p2 as f64);
        let max_radius = self.max_radius_for_projection as f64;

        if fx <= 0.0 || fy <= 0.0 {
            return None;
        }

        let xp = xy.x - self.codx as f64;
        let yp = xy.y - self.cody as f64;
        let xp2 = xp * xp;
        let yp2 = yp * yp;
        let xyp = xp * yp;
        let rs = xp2 + yp2;
        if rs > max_radius * max_radius {
            return None;
        }
        let rss = rs * rs;
        let rsc = rss * rs;
        let a = 1.0 + k1 * rs + k2 * rss + k3 * rsc;
        let b = 1.0 + k4 * rs + k5 * rss + k6 * rsc;
        let bi = if b != 0.0 { 1.0 / b } else { 1.0 };
        let d = a * bi;

        let xp_d = xp * d + (rs + 2.0 * xp2) * p2 + 2.0 * xyp * p1;
        let yp_d = yp * d + (rs + 2.0 * yp2) * p1 + 2.0 * xyp * p2;

        let uv = Vector2::new(
            (xp_d + self.codx as f64) * fx + cx,
            (yp_d + self.cody as f64) * fy + cy,
        );

        let dudrs = k1 + 2.0 * k2 * rs + 3.0 * k3 * rss;
        let dvdrs = k4 + 2.0 * k5 * rs + 3.0 * k6 * rss;
        let dddrs_2 = (dudrs * b - a * dvdrs) * bi * bi * 2.0;
        let cross = yp * xp * dddrs_2;

        let jacobian = Matrix2::new(
            fx * (d + xp * xp * dddrs_2 + 6.0 * xp * p2 + 2.0 * yp * p1),
            fx * (cross + 2.0 * yp * p2 + 2.0 * xp * p1),
            fy * (cross + 2.0 * xp * p1 + 2.0 * yp * p2),
            fy * (d + yp * yp * dddrs_2 + 6.0 * yp * p1 + 2.0 * xp * p2),
        );

        Some((uv, jacobian))
    }

    /// Pixel to normalized point on the z = 1 plane, `None` when the pixel
    /// cannot be inverted within tolerance.
    pub fn unproject(&self, pixel: &Vector2<f64>) -> Option<Vector2<f64>> {
        let (fx, fy) = (self.fx as f64, self.fy as f64);
        if fx <= 0.0 || fy <= 0.0 {
            return None;
        }
        let (k1, k2, k3) = (self.k1 as f64, self.k2 as f64, self.k3 as f64);
        let (k4, k5, k6) = (self.k4 as f64, self.k5 as f64, self.k6 as f64);
        let (p1, p2) = (self.p1 as f64, self.p2 as f64);
        let (codx, cody) = (self.codx as f64, self.cody as f64);

        // Radial correction
        let xp_d = (pixel.x - self.cx as f64) / fx - codx;
        let yp_d = (pixel.y - self.cy as f64) / fy - cody;
        let rs = xp_d * xp_d + yp_d * yp_d;
        let rss = rs * rs;
        let rsc = rss * rs;
        let a = 1.0 + k1 * rs + k2 * rss + k3 * rsc;
        let b = 1.0 + k4 * rs + k5 * rss + k6 * rsc;
        let ai = if a != 0.0 { 1.0 / a } else { 1.0 };
        let di = ai * b;
        let mut xy = Vector2::new(xp_d * di, yp_d * di);

        // Approximate tangential correction
        let two_xy = 2.0 * xy.x * xy.y;
        let xx = xy.x * xy.x;
        let yy = xy.y * xy.y;
        xy.x -= (yy + 3.0 * xx) * p2 + two_xy * p1;
        xy.y -= (xx + 3.0 * yy) * p1 + two_xy * p2;
        xy.x += codx;
        xy.y += cody;

        self.refine(pixel, xy)
    }

    fn refine(&self, pixel: &Vector2<f64>, mut xy: Vector2<f64>) -> Option<Vector2<f64>> {
        let mut best_xy = xy;
        let mut best_err = f64::MAX;

        for pass in 0..MAX_NEWTON_PASSES {
            let (projected, jacobian) = self.project(&xy)?;
            let err = pixel - projected;
            let err_sq = err.norm_squared();
            if err_sq >= best_err {
                break;
            }
            best_err = err_sq;
            best_xy = xy;

            if pass + 1 == MAX_NEWTON_PASSES || best_err < CONVERGED_ERROR {
                break;
            }
            let inverse = jacobian.try_inverse()?;
            xy += inverse * err;
        }

        if best_err > MAX_ACCEPTED_ERROR {
            return None;
        }
        Some(best_xy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> KinectCalibration {
        KinectCalibration {
            color_width: 1280,
            color_height: 720,
            depth_width: 640,
            depth_height: 576,
            resolution_width: 640,
            resolution_height: 576,
            cx: 319.5,
            cy: 287.5,
            fx: 504.0,
            fy: 504.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            k4: 0.0,
            k5: 0.0,
            k6: 0.0,
            codx: 0.0,
            cody: 0.0,
            p1: 0.0,
            p2: 0.0,
            max_radius_for_projection: 1.7,
        }
    }

    fn distorted() -> KinectCalibration {
        KinectCalibration {
            k1: 0.55,
            k2: -0.02,
            k3: -0.003,
            k4: 0.88,
            k5: 0.12,
            k6: -0.01,
            p1: 0.0001,
            p2: -0.00005,
            ..calibration()
        }
    }

    #[test]
    fn test_center_pixel_looks_forward() {
        let d = calibration().get_direction(0.5, 0.5);
        assert!(d.x.abs() < 1e-4);
        assert!(d.y.abs() < 1e-4);
        assert!((d.z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_y_axis_is_flipped() {
        // Top rows of a Kinect image look upward (positive y).
        let d = calibration().get_direction(0.5, 0.1);
        assert!(d.y > 0.0);
        let d = calibration().get_direction(0.9, 0.5);
        assert!(d.x > 0.0);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let c = distorted();
        for &(px, py) in &[(100.0, 80.0), (320.0, 288.0), (600.0, 500.0), (20.0, 560.0)] {
            let pixel = Vector2::new(px, py);
            let xy = c.unproject(&pixel).unwrap();
            let (back, _) = c.project(&xy).unwrap();
            assert!((back - pixel).norm() < 1e-3);
        }
    }

    #[test]
    fn test_directions_are_unit_length() {
        let c = distorted();
        for i in 0..8 {
            for j in 0..8 {
                let d = c.get_direction(i as f32 / 8.0, j as f32 / 8.0);
                if d != Vector3::zeros() {
                    assert!((d.norm() - 1.0).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_outside_projection_radius_is_sentinel() {
        let c = KinectCalibration {
            max_radius_for_projection: 0.1,
            ..calibration()
        };
        assert_eq!(c.get_direction(0.0, 0.0), Vector3::zeros());
        assert_ne!(c.get_direction(0.5, 0.5), Vector3::zeros());
    }

    #[test]
    fn test_invalid_focal_length_is_sentinel() {
        let c = KinectCalibration {
            fx: 0.0,
            ..calibration()
        };
        assert_eq!(c.get_direction(0.5, 0.5), Vector3::zeros());
    }
}

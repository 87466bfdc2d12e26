//! Camera calibration models.
//!
//! Three device projection models share a single ray-generation contract:
//! [`CameraCalibration::get_direction`] maps normalized depth-image
//! coordinates `(u, v)` in `[0, 1)` to a unit camera-space ray.
//!
//! ```text
//!            (u, v)
//!              │
//!   ┌──────────┼───────────────┬──────────────────┐
//!   ▼          ▼               ▼                  │
//! Kinect     Ios          Undistorted             │
//! Brown–     radial LUT    pinhole                │
//! Conrady    magnification inverse                │
//! (Newton)                                        │
//!   └──────────┴───────────────┴──► normalize ──► ray (x right, y up, z back)
//! ```
//!
//! Rays that cannot be computed (outside the calibrated radius, failed
//! convergence) are returned as the zero vector. This is a per-pixel
//! condition, never an error.

pub mod ios;
pub mod kinect;
pub mod undistorted;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CalibrationError;

pub use ios::IosCalibration;
pub use kinect::KinectCalibration;
pub use undistorted::UndistortedCalibration;

/// JSON key carrying the variant tag
const CALIBRATION_TYPE_KEY: &str = "calibrationType";

/// Integer-coded device tag, stable across serialized data
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraDeviceType {
    AzureKinect = 0,
    Ios = 1,
    Undistorted = 2,
}

impl CameraDeviceType {
    /// Tag used in the `calibrationType` JSON field
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraDeviceType::AzureKinect => "azureKinect",
            CameraDeviceType::Ios => "ios",
            CameraDeviceType::Undistorted => "undistorted",
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, CalibrationError> {
        match value {
            0 => Ok(CameraDeviceType::AzureKinect),
            1 => Ok(CameraDeviceType::Ios),
            2 => Ok(CameraDeviceType::Undistorted),
            _ => Err(CalibrationError::UnsupportedDeviceType(value.to_string())),
        }
    }
}

impl std::fmt::Display for CameraDeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CameraDeviceType {
    type Error = CalibrationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "azureKinect" => Ok(CameraDeviceType::AzureKinect),
            "ios" => Ok(CameraDeviceType::Ios),
            "undistorted" => Ok(CameraDeviceType::Undistorted),
            _ => Err(CalibrationError::UnsupportedDeviceType(s.to_string())),
        }
    }
}

/// Closed set of calibration variants
#[derive(Clone, Debug, PartialEq)]
pub enum CameraCalibration {
    Kinect(KinectCalibration),
    Ios(IosCalibration),
    Undistorted(UndistortedCalibration),
}

impl CameraCalibration {
    pub fn device_type(&self) -> CameraDeviceType {
        match self {
            CameraCalibration::Kinect(_) => CameraDeviceType::AzureKinect,
            CameraCalibration::Ios(_) => CameraDeviceType::Ios,
            CameraCalibration::Undistorted(_) => CameraDeviceType::Undistorted,
        }
    }

    pub fn color_width(&self) -> usize {
        match self {
            CameraCalibration::Kinect(c) => c.color_width as usize,
            CameraCalibration::Ios(c) => c.color_width as usize,
            CameraCalibration::Undistorted(c) => c.color_width as usize,
        }
    }

    pub fn color_height(&self) -> usize {
        match self {
            CameraCalibration::Kinect(c) => c.color_height as usize,
            CameraCalibration::Ios(c) => c.color_height as usize,
            CameraCalibration::Undistorted(c) => c.color_height as usize,
        }
    }

    pub fn depth_width(&self) -> usize {
        match self {
            CameraCalibration::Kinect(c) => c.depth_width as usize,
            CameraCalibration::Ios(c) => c.depth_width as usize,
            CameraCalibration::Undistorted(c) => c.depth_width as usize,
        }
    }

    pub fn depth_height(&self) -> usize {
        match self {
            CameraCalibration::Kinect(c) => c.depth_height as usize,
            CameraCalibration::Ios(c) => c.depth_height as usize,
            CameraCalibration::Undistorted(c) => c.depth_height as usize,
        }
    }

    /// Unit camera-space ray for normalized depth coordinates, or the zero
    /// vector when the pixel lies outside the calibrated region.
    pub fn get_direction(&self, u: f32, v: f32) -> Vector3<f32> {
        match self {
            CameraCalibration::Kinect(c) => c.get_direction(u, v),
            CameraCalibration::Ios(c) => c.get_direction(u, v),
            CameraCalibration::Undistorted(c) => c.get_direction(u, v),
        }
    }

    /// Serialize to the tagged JSON object stored in recordings
    pub fn to_json(&self) -> Result<Value, CalibrationError> {
        let mut value = match self {
            CameraCalibration::Kinect(c) => serde_json::to_value(c)?,
            CameraCalibration::Ios(c) => serde_json::to_value(c)?,
            CameraCalibration::Undistorted(c) => serde_json::to_value(c)?,
        };
        match value.as_object_mut() {
            Some(object) => {
                object.insert(
                    CALIBRATION_TYPE_KEY.to_string(),
                    Value::String(self.device_type().as_str().to_string()),
                );
            }
            None => {
                return Err(CalibrationError::InvalidJson(
                    "calibration did not serialize to an object".to_string(),
                ))
            }
        }
        Ok(value)
    }

    pub fn to_json_string(&self) -> Result<String, CalibrationError> {
        Ok(serde_json::to_string(&self.to_json()?)?)
    }

    /// Rebuild a calibration from its tagged JSON object
    pub fn from_json(value: &Value) -> Result<Self, CalibrationError> {
        let tag = value
            .get(CALIBRATION_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CalibrationError::InvalidJson(format!("missing {}", CALIBRATION_TYPE_KEY))
            })?;

        match CameraDeviceType::try_from(tag)? {
            CameraDeviceType::AzureKinect => Ok(CameraCalibration::Kinect(
                serde_json::from_value(value.clone())?,
            )),
            CameraDeviceType::Ios => Ok(CameraCalibration::Ios(serde_json::from_value(
                value.clone(),
            )?)),
            CameraDeviceType::Undistorted => Ok(CameraCalibration::Undistorted(
                serde_json::from_value(value.clone())?,
            )),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, CalibrationError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }

    /// Rebuild a calibration whose device tag was stored separately from
    /// the JSON body. Both must agree.
    pub fn from_device_type_and_json(device_type: i32, s: &str) -> Result<Self, CalibrationError> {
        let device_type = CameraDeviceType::from_i32(device_type)?;
        let calibration = Self::from_json_str(s)?;
        if calibration.device_type() != device_type {
            return Err(CalibrationError::DeviceTypeMismatch {
                tag: device_type.to_string(),
                json: calibration.device_type().to_string(),
            });
        }
        Ok(calibration)
    }
}

/// Whether a ray is a real direction rather than the invalid sentinel
pub fn is_valid_direction(direction: &Vector3<f32>) -> bool {
    direction.norm_squared() > 0.0
}

/// Normalize a ray, collapsing degenerate or non-finite input to the sentinel
pub(crate) fn normalize_or_sentinel(x: f64, y: f64, z: f64) -> Vector3<f32> {
    let norm = (x * x + y * y + z * z).sqrt();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return Vector3::zeros();
    }
    Vector3::new((x / norm) as f32, (y / norm) as f32, (z / norm) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undistorted() -> CameraCalibration {
        CameraCalibration::Undistorted(UndistortedCalibration {
            color_width: 1024,
            color_height: 1024,
            depth_width: 512,
            depth_height: 512,
            fx: 0.5,
            fy: 0.5,
            cx: 0.5,
            cy: 0.5,
        })
    }

    #[test]
    fn test_device_type_codes() {
        assert_eq!(CameraDeviceType::from_i32(0), Ok(CameraDeviceType::AzureKinect));
        assert_eq!(CameraDeviceType::from_i32(1), Ok(CameraDeviceType::Ios));
        assert_eq!(CameraDeviceType::from_i32(2), Ok(CameraDeviceType::Undistorted));
        assert_eq!(
            CameraDeviceType::from_i32(7),
            Err(CalibrationError::UnsupportedDeviceType("7".to_string()))
        );
        assert_eq!(CameraDeviceType::Ios as i32, 1);
    }

    #[test]
    fn test_json_roundtrip_keeps_tag() {
        let calibration = undistorted();
        let json = calibration.to_json().unwrap();
        assert_eq!(json["calibrationType"], "undistorted");
        assert_eq!(json["colorWidth"], 1024);
        assert_eq!(json["depthHeight"], 512);

        let parsed = CameraCalibration::from_json(&json).unwrap();
        assert_eq!(parsed, calibration);
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        let json = r#"{"calibrationType":"realsense","colorWidth":1}"#;
        assert_eq!(
            CameraCalibration::from_json_str(json),
            Err(CalibrationError::UnsupportedDeviceType("realsense".to_string()))
        );
    }

    #[test]
    fn test_missing_tag_is_invalid_json() {
        let json = r#"{"colorWidth":1}"#;
        assert!(matches!(
            CameraCalibration::from_json_str(json),
            Err(CalibrationError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_device_type_must_match_json() {
        let json = undistorted().to_json_string().unwrap();
        assert!(CameraCalibration::from_device_type_and_json(2, &json).is_ok());
        assert!(matches!(
            CameraCalibration::from_device_type_and_json(0, &json),
            Err(CalibrationError::DeviceTypeMismatch { .. })
        ));
        assert!(matches!(
            CameraCalibration::from_device_type_and_json(9, &json),
            Err(CalibrationError::UnsupportedDeviceType(_))
        ));
    }

    #[test]
    fn test_sentinel_for_degenerate_ray() {
        assert_eq!(normalize_or_sentinel(0.0, 0.0, 0.0), Vector3::zeros());
        assert_eq!(normalize_or_sentinel(f64::NAN, 0.0, -1.0), Vector3::zeros());
        assert!(!is_valid_direction(&Vector3::zeros()));
        assert!(is_valid_direction(&normalize_or_sentinel(1.0, 2.0, -3.0)));
    }
}

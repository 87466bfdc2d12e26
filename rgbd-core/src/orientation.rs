//! Orientation from gyroscope and gravity samples.
//!
//! The gyroscope rate is integrated for yaw. Pitch and roll are taken from
//! the gravity direction, which keeps them from drifting over long
//! recordings. Axes: x right, y up, z back.

use nalgebra::{UnitQuaternion, Vector3};

use crate::record::{ImuFrame, TrsFrame};

/// Below this, the gravity y component is treated as zero when deriving roll
const ROLL_EPSILON: f32 = 1e-4;

/// Quaternion from (pitch about X, yaw about Y, roll about Z), composed as
/// `yaw * pitch * roll`
pub fn euler_to_quat(euler: &Vector3<f32>) -> UnitQuaternion<f32> {
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), euler.y);
    let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), euler.x);
    let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), euler.z);
    yaw * pitch * roll
}

/// Heading of the camera's forward (-z) axis around the up axis
pub fn extract_yaw(rotation: &UnitQuaternion<f32>) -> f32 {
    let front = rotation * Vector3::new(0.0, 0.0, -1.0);
    (-front.x).atan2(-front.z)
}

/// Pitch and roll implied by a gravity sample, `None` for an unusable one
pub fn pitch_and_roll_from_gravity(gravity: &Vector3<f32>) -> Option<(f32, f32)> {
    let norm = gravity.norm();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return None;
    }
    let g = gravity / norm;
    let pitch = g.z.clamp(-1.0, 1.0).asin();
    let roll = if g.y.abs() > ROLL_EPSILON {
        (-g.x).atan2(-g.y)
    } else {
        0.0
    };
    Some((pitch, roll))
}

/// Advance `previous_rotation` by `rotation_rate` (rad/s, per axis) over
/// `delta_time_sec`, then replace pitch and roll with the gravity estimate.
///
/// With an unusable gravity sample the integrated rotation is returned as is.
pub fn apply_rotation_rate_and_gravity_to_rotation(
    previous_rotation: &UnitQuaternion<f32>,
    delta_time_sec: f32,
    rotation_rate: &Vector3<f32>,
    gravity: &Vector3<f32>,
) -> UnitQuaternion<f32> {
    let delta = euler_to_quat(&(rotation_rate * delta_time_sec));
    let integrated = previous_rotation * delta;

    match pitch_and_roll_from_gravity(gravity) {
        Some((pitch, roll)) => {
            let yaw = extract_yaw(&integrated);
            euler_to_quat(&Vector3::new(pitch, yaw, roll))
        }
        None => integrated,
    }
}

/// Fold IMU samples into an orientation per sample. Starts from identity,
/// with the first sample's own timestamp as the previous time point.
pub fn integrate_imu_rotations(frames: &[ImuFrame]) -> Vec<(i64, UnitQuaternion<f32>)> {
    let Some(first) = frames.first() else {
        return Vec::new();
    };
    let mut previous_rotation = UnitQuaternion::identity();
    let mut previous_time_point_us = first.time_point_us;

    frames
        .iter()
        .map(|frame| {
            let delta_time_sec =
                (frame.time_point_us - previous_time_point_us) as f32 / 1_000_000.0;
            let rotation = apply_rotation_rate_and_gravity_to_rotation(
                &previous_rotation,
                delta_time_sec,
                &frame.rotation_rate,
                &frame.gravity,
            );
            previous_rotation = rotation;
            previous_time_point_us = frame.time_point_us;
            (frame.time_point_us, rotation)
        })
        .collect()
}

/// TRS frames carrying the integrated IMU orientation, with no translation
/// and unit scale
pub fn derive_trs_frames(frames: &[ImuFrame]) -> Vec<TrsFrame> {
    integrate_imu_rotations(frames)
        .into_iter()
        .map(|(time_point_us, rotation)| TrsFrame {
            time_point_us,
            translation: Vector3::zeros(),
            rotation,
            scale: Vector3::new(1.0, 1.0, 1.0),
        })
        .collect()
}

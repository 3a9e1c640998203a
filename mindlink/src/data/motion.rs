//! Motion decoding
//!
//! Motion frames carry a fixed-order array:
//! `[counter, interpolated, q0, q1, q2, q3, accX, accY, accZ, magX, magY, magZ]`.
//! Fields are unpacked by position. Orientation is converted from the unit
//! quaternion to Euler angles in degrees; no calibration happens here.

use super::event::MotionEvent;
use serde_json::Value;

/// Field names, in wire order.
pub const MOTION_COLUMNS: [&str; 12] = [
    "COUNTER_MEMS",
    "INTERPOLATED_MEMS",
    "Q0",
    "Q1",
    "Q2",
    "Q3",
    "ACCX",
    "ACCY",
    "ACCZ",
    "MAGX",
    "MAGY",
    "MAGZ",
];

/// Up to and including the accelerometer.
pub const MIN_MOTION_FIELDS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub pitch: f64,
    pub roll: f64,
    pub rotation: f64,
}

/// Standard quaternion to Euler decomposition. `q` is `[q0, q1, q2, q3]`
/// with `q0` the scalar part.
pub fn quaternion_to_euler(q: [f64; 4]) -> EulerAngles {
    let [q0, q1, q2, q3] = q;
    let pitch = (2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0).asin();
    let rotation = (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));
    let roll = (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2));
    EulerAngles {
        pitch: pitch.to_degrees(),
        roll: roll.to_degrees(),
        rotation: rotation.to_degrees(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionSample {
    pub counter: u64,
    pub interpolated: bool,
    pub quaternion: [f64; 4],
    pub acceleration: [f64; 3],
    pub magnetometer: [f64; 3],
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

impl MotionSample {
    /// Unpacks a raw motion array. Returns None if it is too short or a
    /// required field is not numeric. Missing magnetometer fields read as 0.
    pub fn from_values(values: &[Value]) -> Option<MotionSample> {
        if values.len() < MIN_MOTION_FIELDS {
            return None;
        }
        let mut nums = [0.0f64; MOTION_COLUMNS.len()];
        for (i, slot) in nums.iter_mut().enumerate() {
            match values.get(i) {
                Some(v) => *slot = number(v)?,
                None => break,
            }
        }
        Some(MotionSample {
            counter: nums[0].max(0.0) as u64,
            interpolated: nums[1] != 0.0,
            quaternion: [nums[2], nums[3], nums[4], nums[5]],
            acceleration: [nums[6], nums[7], nums[8]],
            magnetometer: [nums[9], nums[10], nums[11]],
        })
    }

    pub fn decode(&self, device: &str, time: f64) -> MotionEvent {
        let angles = quaternion_to_euler(self.quaternion);
        MotionEvent {
            device: device.to_string(),
            pitch: angles.pitch,
            roll: angles.roll,
            rotation: angles.rotation,
            acceleration: self.acceleration,
            magnetometer: self.magnetometer,
            quaternion: self.quaternion,
            counter: self.counter,
            interpolated: self.interpolated,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identity_quaternion_is_level() {
        let a = quaternion_to_euler([1.0, 0.0, 0.0, 0.0]);
        assert!(close(a.pitch, 0.0));
        assert!(close(a.roll, 0.0));
        assert!(close(a.rotation, 0.0));
    }

    #[test]
    fn single_axis_rotations() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        // 90 degrees about y
        let a = quaternion_to_euler([h, 0.0, h, 0.0]);
        assert!(close(a.pitch, 90.0));
        // 90 degrees about x
        let a = quaternion_to_euler([h, h, 0.0, 0.0]);
        assert!(close(a.roll, 90.0));
        assert!(close(a.pitch, 0.0));
        // 90 degrees about z
        let a = quaternion_to_euler([h, 0.0, 0.0, h]);
        assert!(close(a.rotation, 90.0));
    }

    #[test]
    fn pitch_is_clamped_for_slightly_denormalized_input() {
        let a = quaternion_to_euler([0.7072, 0.0, 0.7072, 0.0]);
        assert!(close(a.pitch, 90.0));
        assert!(!a.pitch.is_nan());
    }

    #[test]
    fn unpacks_by_position() {
        let raw = json!([42, 0, 1.0, 0.0, 0.0, 0.0, 0.1, 0.2, 9.8, 30.0, -5.0, 12.0]);
        let s = MotionSample::from_values(raw.as_array().unwrap()).unwrap();
        assert_eq!(s.counter, 42);
        assert!(!s.interpolated);
        assert_eq!(s.quaternion, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.acceleration, [0.1, 0.2, 9.8]);
        assert_eq!(s.magnetometer, [30.0, -5.0, 12.0]);
        let ev = s.decode("dev", 3.5);
        assert_eq!(ev.device, "dev");
        assert_eq!(ev.time, 3.5);
        assert!(close(ev.pitch, 0.0));
    }

    #[test]
    fn short_or_non_numeric_arrays_are_rejected() {
        let raw = json!([1, 0, 1.0, 0.0]);
        assert!(MotionSample::from_values(raw.as_array().unwrap()).is_none());
        let raw = json!([1, 0, "x", 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(MotionSample::from_values(raw.as_array().unwrap()).is_none());
        // without magnetometer is fine
        let raw = json!([1, true, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let s = MotionSample::from_values(raw.as_array().unwrap()).unwrap();
        assert!(s.interpolated);
        assert_eq!(s.magnetometer, [0.0; 3]);
    }
}

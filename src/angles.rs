//! Angle representations and conversions.
//!
//! The simulator stores joint orientation as a rotating-frame x-y-z Euler
//! triple, `R = Rx(a) · Ry(b) · Rz(c)`. Mocap clips instead author three
//! sequential rotations about the static x, y and z axes, so root and joint
//! angles from a clip go through [`sequential_to_rotating`] before they can be
//! written into the skeleton.
//!
//! Quaternion and axis-angle conversions work on `(z, y, x)` triples; the
//! public Euler helpers reverse the simulator's `[x, y, z]` layout on the way
//! in and out. Observations, actions and the pose reward all depend on that
//! exact ordering.

use nalgebra::{Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::error::{MimicError, Result};

/// Below this `|cos b|` a matrix is treated as gimbal locked.
pub const GIMBAL_EPS: f64 = 1e-6;

const NORM_EPS: f64 = 1e-12;

/// A principal rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Slot of this axis inside an `[x, y, z]` vector.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Unit<Vector3<f64>> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }

    /// Lower-case axis letter, as used in DOF names.
    pub const fn letter(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }
}

/// Place `values` on the axes named by `axes`, leaving the other slots at zero.
///
/// `expand_angle(&[90.0], &[Axis::X])` is `[90, 0, 0]`; the values are not
/// converted, so degrees stay degrees.
pub fn expand_angle(values: &[f64], axes: &[Axis]) -> Result<Vector3<f64>> {
    if values.len() != axes.len() {
        return Err(MimicError::dimension_mismatch(
            "expand_angle",
            axes.len(),
            values.len(),
        ));
    }

    let mut euler = Vector3::zeros();
    for (&value, axis) in values.iter().zip(axes) {
        euler[axis.index()] = value;
    }
    Ok(euler)
}

/// Degrees to radians, element-wise.
pub fn to_radians(degrees: &[f64]) -> Vec<f64> {
    degrees.iter().map(|d| d.to_radians()).collect()
}

/// Rotation matrix of a rotating-frame `[x, y, z]` Euler triple.
pub fn euler_to_rotation(euler: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), euler.x)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), euler.y)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), euler.z)
}

/// Decompose `R = Rx(a) · Ry(b) · Rz(c)` into `[a, b, c]`.
///
/// At gimbal lock (`|cos b| < GIMBAL_EPS`) only `a + c` (or `a - c`) is
/// observable; `c` is pinned to zero and `a` takes the whole rotation.
pub fn rotation_to_euler(rotation: &Rotation3<f64>) -> Vector3<f64> {
    let m = rotation.matrix();
    let cos_b = m[(0, 0)].hypot(m[(0, 1)]);
    let b = m[(0, 2)].atan2(cos_b);

    if cos_b > GIMBAL_EPS {
        let a = (-m[(1, 2)]).atan2(m[(2, 2)]);
        let c = (-m[(0, 1)]).atan2(m[(0, 0)]);
        Vector3::new(a, b, c)
    } else {
        let a = m[(2, 1)].atan2(m[(1, 1)]);
        Vector3::new(a, b, 0.0)
    }
}

/// Convert three sequential static-axis rotations (x, then y, then z) into the
/// simulator's rotating-frame triple describing the same orientation.
pub fn sequential_to_rotating(angles: &Vector3<f64>) -> Vector3<f64> {
    // from_euler_angles builds Rz(z) · Ry(y) · Rx(x)
    let combined = Rotation3::from_euler_angles(angles.x, angles.y, angles.z);
    rotation_to_euler(&combined)
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// The other `[a, b, c]` triple describing the same rotation as `euler`:
/// `(a + pi, pi - b, c + pi)`, each wrapped into `(-pi, pi]`.
pub fn flipped_euler(euler: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(
        wrap_angle(euler.x + PI),
        wrap_angle(PI - euler.y),
        wrap_angle(euler.z + PI),
    )
}

#[inline]
fn reversed(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.z, v.y, v.x)
}

fn zyx_to_quaternion(zyx: &Vector3<f64>) -> UnitQuaternion<f64> {
    let (z, y, x) = (zyx[0], zyx[1], zyx[2]);
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z)
}

fn quaternion_to_zyx(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    reversed(&rotation_to_euler(&q.to_rotation_matrix()))
}

/// Euler `[x, y, z]` to a unit quaternion.
pub fn euler_to_quaternion(euler: &Vector3<f64>) -> UnitQuaternion<f64> {
    zyx_to_quaternion(&reversed(euler))
}

/// Unit quaternion to Euler `[x, y, z]`.
pub fn quaternion_to_euler(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    reversed(&quaternion_to_zyx(q))
}

/// Euler `[x, y, z]` to `(theta, axis)`. The identity maps to `(0, +x)`.
pub fn euler_to_axis_angle(euler: &Vector3<f64>) -> (f64, Vector3<f64>) {
    match zyx_to_quaternion(&reversed(euler)).axis_angle() {
        Some((axis, theta)) => (theta, axis.into_inner()),
        None => (0.0, Vector3::x()),
    }
}

/// `(theta, axis)` to Euler `[x, y, z]`. A zero axis is read as no rotation.
pub fn axis_angle_to_euler(theta: f64, axis: &Vector3<f64>) -> Vector3<f64> {
    match Unit::try_new(*axis, NORM_EPS) {
        Some(axis) => reversed(&quaternion_to_zyx(&UnitQuaternion::from_axis_angle(
            &axis, theta,
        ))),
        None => Vector3::zeros(),
    }
}

/// Read a `[w, x, y, z]` quaternion, normalising it; a zero quaternion is the identity.
pub fn quaternion_from_slots(slots: &[f64]) -> UnitQuaternion<f64> {
    let q = Quaternion::new(slots[0], slots[1], slots[2], slots[3]);
    UnitQuaternion::try_new(q, NORM_EPS).unwrap_or_else(UnitQuaternion::identity)
}

/// Angle layout used in observation and action vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleRepresentation {
    /// Rotating-frame `[x, y, z]`, passed through.
    #[default]
    Euler,
    /// `[w, x, y, z]`.
    Quaternion,
    /// `[theta, ax, ay, az]`.
    AxisAngle,
}

impl AngleRepresentation {
    /// Number of slots one multi-DOF angle occupies.
    pub const fn width(self) -> usize {
        match self {
            AngleRepresentation::Euler => 3,
            AngleRepresentation::Quaternion | AngleRepresentation::AxisAngle => 4,
        }
    }

    /// Resolve the conversion pair once so hot paths don't branch on the mode.
    pub fn codec(self) -> AngleCodec {
        let (encode, decode): (EncodeFn, DecodeFn) = match self {
            AngleRepresentation::Euler => (encode_euler, decode_euler),
            AngleRepresentation::Quaternion => (encode_quaternion, decode_quaternion),
            AngleRepresentation::AxisAngle => (encode_axis_angle, decode_axis_angle),
        };
        AngleCodec {
            representation: self,
            width: self.width(),
            encode,
            decode,
        }
    }
}

type EncodeFn = fn(&Vector3<f64>, &mut Vec<f64>);
type DecodeFn = fn(&[f64]) -> Vector3<f64>;

/// A resolved pair of conversion functions for one [`AngleRepresentation`].
#[derive(Clone, Copy)]
pub struct AngleCodec {
    pub representation: AngleRepresentation,
    pub width: usize,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl AngleCodec {
    /// Append the encoded form of `euler` to `out` (`width` values).
    #[inline]
    pub fn encode(&self, euler: &Vector3<f64>, out: &mut Vec<f64>) {
        (self.encode)(euler, out)
    }

    /// Decode exactly `width` slots back into Euler `[x, y, z]`.
    #[inline]
    pub fn decode(&self, slots: &[f64]) -> Vector3<f64> {
        debug_assert_eq!(slots.len(), self.width);
        (self.decode)(slots)
    }
}

impl std::fmt::Debug for AngleCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AngleCodec")
            .field("representation", &self.representation)
            .field("width", &self.width)
            .finish()
    }
}

fn encode_euler(euler: &Vector3<f64>, out: &mut Vec<f64>) {
    out.extend_from_slice(euler.as_slice());
}

fn decode_euler(slots: &[f64]) -> Vector3<f64> {
    Vector3::new(slots[0], slots[1], slots[2])
}

fn encode_quaternion(euler: &Vector3<f64>, out: &mut Vec<f64>) {
    let q = euler_to_quaternion(euler);
    out.extend_from_slice(&[q.w, q.i, q.j, q.k]);
}

fn decode_quaternion(slots: &[f64]) -> Vector3<f64> {
    quaternion_to_euler(&quaternion_from_slots(slots))
}

fn encode_axis_angle(euler: &Vector3<f64>, out: &mut Vec<f64>) {
    let (theta, axis) = euler_to_axis_angle(euler);
    out.extend_from_slice(&[theta, axis.x, axis.y, axis.z]);
}

fn decode_axis_angle(slots: &[f64]) -> Vector3<f64> {
    axis_angle_to_euler(slots[0], &Vector3::new(slots[1], slots[2], slots[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    fn axis_orders() -> Vec<Vec<Axis>> {
        let mut orders = Vec::new();
        for &a in &AXES {
            orders.push(vec![a]);
            for &b in AXES.iter().filter(|&&b| b != a) {
                orders.push(vec![a, b]);
                for &c in AXES.iter().filter(|&&c| c != a && c != b) {
                    orders.push(vec![a, b, c]);
                }
            }
        }
        orders
    }

    fn sample_angles() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.3, -0.7, 1.1),
            Vector3::new(-1.2, 0.4, -2.5),
            Vector3::new(2.9, 1.3, 0.05),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-0.01, -1.5, 3.0),
        ]
    }

    #[test]
    fn test_expand_angle_places_values_on_declared_axes() {
        for order in axis_orders() {
            let values: Vec<f64> = (1..=order.len()).map(|i| i as f64 * 10.0).collect();
            let expanded = expand_angle(&values, &order).unwrap();

            for (slot, axis) in AXES.iter().enumerate() {
                match order.iter().position(|a| a == axis) {
                    Some(k) => assert_eq!(expanded[slot], values[k]),
                    None => assert_eq!(expanded[slot], 0.0),
                }
            }
        }
    }

    #[test]
    fn test_expand_angle_rejects_length_mismatch() {
        let err = expand_angle(&[1.0, 2.0], &[Axis::X]).unwrap_err();
        assert!(matches!(
            err,
            MimicError::DimensionMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_single_axis_clip_angle_recovers_quarter_turn() {
        let expanded = expand_angle(&[90.0], &[Axis::X]).unwrap();
        assert_eq!(expanded, Vector3::new(90.0, 0.0, 0.0));

        let radians = Vector3::from_column_slice(&to_radians(expanded.as_slice()));
        let euler = sequential_to_rotating(&radians);
        assert_relative_eq!(euler, Vector3::new(FRAC_PI_2, 0.0, 0.0), epsilon = 1e-12);

        let expected = Rotation3::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
        assert_relative_eq!(euler_to_rotation(&euler), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sequential_and_rotating_describe_same_orientation() {
        for angles in sample_angles() {
            let rotating = sequential_to_rotating(&angles);
            let sequential = Rotation3::from_axis_angle(&Vector3::z_axis(), angles.z)
                * Rotation3::from_axis_angle(&Vector3::y_axis(), angles.y)
                * Rotation3::from_axis_angle(&Vector3::x_axis(), angles.x);
            assert_relative_eq!(euler_to_rotation(&rotating), sequential, epsilon = 1e-9);
        }

        // Not the same numbers in general
        let angles = Vector3::new(0.3, -0.7, 1.1);
        assert!((sequential_to_rotating(&angles) - angles).norm() > 1e-3);
    }

    #[test]
    fn test_rotation_to_euler_handles_gimbal_lock() {
        let euler = Vector3::new(0.4, FRAC_PI_2, 0.3);
        let rotation = euler_to_rotation(&euler);
        let recovered = rotation_to_euler(&rotation);

        assert_eq!(recovered.z, 0.0);
        assert_relative_eq!(recovered.y, FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(euler_to_rotation(&recovered), rotation, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_quaternion_round_trip() {
        for euler in sample_angles() {
            let q = euler_to_quaternion(&euler);
            assert_relative_eq!(quaternion_to_euler(&q), euler, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_euler_axis_angle_round_trip() {
        for euler in sample_angles() {
            let (theta, axis) = euler_to_axis_angle(&euler);
            assert_relative_eq!(axis_angle_to_euler(theta, &axis), euler, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_quaternion_matches_rotating_matrix() {
        let euler = Vector3::new(0.2, -0.5, 0.9);
        let q = euler_to_quaternion(&euler);
        assert_relative_eq!(q.to_rotation_matrix(), euler_to_rotation(&euler), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_axis_angle_defaults_to_x_axis() {
        let (theta, axis) = euler_to_axis_angle(&Vector3::zeros());
        assert_eq!(theta, 0.0);
        assert_eq!(axis, Vector3::x());
        assert_eq!(axis_angle_to_euler(1.0, &Vector3::zeros()), Vector3::zeros());
    }

    #[test]
    fn test_codec_round_trip_and_width() {
        for repr in [
            AngleRepresentation::Euler,
            AngleRepresentation::Quaternion,
            AngleRepresentation::AxisAngle,
        ] {
            let codec = repr.codec();
            for euler in sample_angles() {
                let mut slots = Vec::new();
                codec.encode(&euler, &mut slots);
                assert_eq!(slots.len(), codec.width);
                assert_relative_eq!(codec.decode(&slots), euler, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_quaternion_decodes_to_identity() {
        let codec = AngleRepresentation::Quaternion.codec();
        assert_eq!(codec.decode(&[0.0; 4]), Vector3::zeros());
    }

    #[test]
    fn test_flipped_euler_is_same_rotation() {
        let euler = Vector3::new(0.4, -0.3, 2.9);
        let flipped = flipped_euler(&euler);
        assert_relative_eq!(
            euler_to_rotation(&flipped),
            euler_to_rotation(&euler),
            epsilon = 1e-12
        );
        assert_relative_eq!(flipped.y, PI + 0.3 - TAU, epsilon = 1e-12);
    }

    #[test]
    fn test_wrap_angle_range() {
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(-0.5), -0.5);
    }
}

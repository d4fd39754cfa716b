//! Small numeric helpers shared by the views and geometries.

use nalgebra::{Matrix4, Vector4};
use std::f64::consts::PI;

/// Wrap an angle into `[-π, π)`. Non-finite input stays non-finite.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Clamp without panicking on NaN or inverted bounds.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Returns `true` when the value is a finite real number.
pub fn is_real(value: f64) -> bool {
    value.is_finite()
}

/// Extract the left, right, bottom and top clip planes of a projection matrix
/// plus the plane facing the camera. The distance term is dropped so every
/// plane passes through the origin.
pub fn frustum_planes(m: &Matrix4<f64>) -> [Vector4<f64>; 5] {
    let row = |i: usize| -> Vector4<f64> { m.row(i).transpose() };
    let strip = |v: Vector4<f64>| Vector4::new(v.x, v.y, v.z, 0.0);
    [
        strip(row(3) + row(0)),
        strip(row(3) - row(0)),
        strip(row(3) + row(1)),
        strip(row(3) - row(1)),
        strip(row(3) + row(2)),
    ]
}

/// Invert a matrix, falling back to the identity for singular input.
pub fn invert_or_identity(m: &Matrix4<f64>) -> Matrix4<f64> {
    m.try_inverse().unwrap_or_else(Matrix4::identity)
}

/// Integer ceiling division on `u64`.
pub fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

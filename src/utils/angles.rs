//! Angle canonicalization used by flip correction.

use std::f32::consts::PI;

/// Adds `offset` to `angle` and wraps the result into `[-pi, pi)`.
///
/// Flip correction composes the mirrored roll angle with -pi, negates it,
/// then composes with +pi again; the wrap keeps each intermediate angle in
/// the working range so the cos/sin reassignment stays well defined.
pub fn wrap_angle(angle: f32, offset: f32) -> f32 {
    let shifted = angle + offset;
    shifted - 2.0 * PI * ((shifted + PI) / (2.0 * PI)).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_wrap_angle_stays_in_range() {
        for i in -20..20 {
            let angle = i as f32 * 0.7;
            let wrapped = wrap_angle(angle, 0.0);
            assert!((-PI..PI).contains(&wrapped), "angle {angle} -> {wrapped}");
        }
    }

    #[test]
    fn test_wrap_angle_identity_inside_range() {
        assert_abs_diff_eq!(wrap_angle(0.5, 0.0), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(wrap_angle(-2.0, 0.0), -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wrap_angle_composes_offset() {
        // pi/2 + pi wraps around to -pi/2.
        assert_abs_diff_eq!(wrap_angle(PI / 2.0, PI), -PI / 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(wrap_angle(-PI / 2.0, -PI), PI / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_wrap_angle_preserves_trig_values() {
        let angle = 2.9_f32;
        let wrapped = wrap_angle(angle, PI);
        assert_abs_diff_eq!(wrapped.cos(), (angle + PI).cos(), epsilon = 1e-5);
        assert_abs_diff_eq!(wrapped.sin(), (angle + PI).sin(), epsilon = 1e-5);
    }
}

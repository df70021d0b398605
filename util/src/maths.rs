//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Limit a value to the range `[min, max]`.
///
/// The upper limit is checked first, so the lower limit wins if the range is
/// inverted.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret >= max {
        ret = max
    }
    if ret <= min {
        ret = min
    }

    ret
}

/// Three-way sign of a value.
///
/// Unlike `Float::signum` zero (of either sign) maps to zero, as does NaN.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

/// Floored modulo, `lhs - floor(lhs/rhs) * rhs`.
///
/// The result takes the sign of `rhs`, so `floor_mod(a, -TAU)` lies in
/// `(-TAU, 0]`.
pub fn floor_mod<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    lhs - (lhs / rhs).floor() * rhs
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range `(-pi, pi]`.
pub fn wrap_angle<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    if wrapped == -pi_t {
        pi_t
    }
    else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_sign() {
        assert_eq!(sign(3.2f64), 1.0);
        assert_eq!(sign(-0.001f64), -1.0);
        assert_eq!(sign(0f64), 0.0);
        assert_eq!(sign(-0f64), 0.0);
        assert_eq!(sign(f64::NAN), 0.0);
        assert_eq!(sign(f64::INFINITY), 1.0);
    }

    #[test]
    fn test_wrap_angle_range() {
        let mut a = -50.0f64;
        while a < 50.0 {
            let w = wrap_angle(a);
            assert!(w > -PI && w <= PI, "wrap({}) = {} out of range", a, w);
            a += 0.0137;
        }

        // Boundaries
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert_eq!(wrap_angle(0f64), 0.0);
    }

    #[test]
    fn test_wrap_angle_periodic() {
        for &a in &[0.3f64, -2.9, 1.0, 3.1, -0.7] {
            for k in -5..=5 {
                let shifted = wrap_angle(a + TAU * k as f64);
                assert!(
                    (shifted - wrap_angle(a)).abs() < 1e-12,
                    "wrap({} + 2pi*{}) = {}, expected {}", a, k, shifted, wrap_angle(a)
                );
            }
        }
    }

    #[test]
    fn test_floor_mod() {
        assert!((floor_mod(1.5 * PI, -TAU) - (-0.5 * PI)).abs() < 1e-15);
        assert!((floor_mod(-1.5 * PI, TAU) - 0.5 * PI).abs() < 1e-15);
        assert!((floor_mod(3.5 * PI, -TAU) - (-0.5 * PI)).abs() < 1e-14);
        assert_eq!(floor_mod(PI, -TAU), -PI);
        assert_eq!(floor_mod(-PI, TAU), PI);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0f64, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0f64, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25f64, -1.0, 1.0), 0.25);
    }
}

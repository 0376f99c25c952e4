//! Precision policies.
//!
//! Small helpers that keep float-derived results deterministic:
//! - A total ordering for floats (`stable_total_cmp_f64`).
//! - Tolerance comparison for ties (`approx_eq`).
//! - Fixed-decimal rounding for persisted coordinates (`round_to`).

use core::cmp::Ordering;

/// Tolerance used when two ray distances are considered the same hit.
pub const DISTANCE_EPSILON: f64 = 1e-9;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        // Handles +0.0 and -0.0.
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// Prefer this any time you sort floats or use them in ordered keys.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// `true` when `a` and `b` differ by at most `eps` (relative for large magnitudes).
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= eps * scale
}

/// Round half away from zero to `decimals` places.
///
/// The result is canonicalized, so `-0.0` never leaks into persisted data.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    canonical_f64((v * factor).round() / factor)
}

#[cfg(test)]
mod tests {
    use super::{approx_eq, canonical_f64, round_to, stable_total_cmp_f64};
    use core::cmp::Ordering;

    #[test]
    fn canonicalizes_negative_zero() {
        assert_eq!(canonical_f64(-0.0), 0.0);
        assert_eq!(canonical_f64(0.0), 0.0);
    }

    #[test]
    fn stable_cmp_is_total_and_deterministic() {
        assert_eq!(stable_total_cmp_f64(1.0, 2.0), Ordering::Less);
        assert_eq!(stable_total_cmp_f64(f64::NAN, f64::NAN), Ordering::Equal);
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
    }

    #[test]
    fn approx_eq_scales_with_magnitude() {
        assert!(approx_eq(1.0, 1.0 + 1e-12, 1e-9));
        assert!(!approx_eq(1.0, 1.001, 1e-9));
        assert!(approx_eq(1.0e6, 1.0e6 + 1e-4, 1e-9));
    }

    #[test]
    fn round_to_two_decimals() {
        assert_eq!(round_to(33.333_333, 2), 33.33);
        assert_eq!(round_to(66.666_666, 2), 66.67);
        assert_eq!(round_to(-0.001, 2), 0.0);
        assert!(round_to(-0.001, 2).is_sign_positive());
    }
}

//! Closed-form semi-major-axis roots of the visibility quartic.
//!
//! At phase angle β a planet on an orbit of semi-major axis `z` has
//! normalised brightness `k = C / (p R²) = cos⁴(β/2) / z²` and projected
//! separation `b = z sin β`.  Eliminating β (`2 z sqrt(k) = 1 + cos β`)
//! gives, for fixed `(k, b)`,
//!
//! ```text
//! z⁴ - z³ / sqrt(k) + b² / (4k) = 0
//! ```
//!
//! Substituting `w = z sqrt(k)` removes the scale:
//!
//! ```text
//! w⁴ - w³ + c = 0,        c = b² k / 4
//! ```
//!
//! Two of the four roots are real and positive when `c <= 27/256` (that is
//! `k <= 27 / (64 b²)`), merging at `w = 3/4`; the other two form a complex
//! pair.  Ferrari's method on the depressed quartic (`w = y + 1/4`,
//! `y⁴ - 3/8 y² - 1/8 y + (c - 3/256) = 0`) with the Cardano resolvent
//! gives
//!
//! ```text
//! T  = cbrt(c/16 + sqrt(c²/256 - c³/27))
//! W  = 2c / (3T) + 2T + 1/4
//! V  = 1/2 - 2c / (3T) - 2T + 1 / (4 sqrt(W))
//! w± = 1/4 + sqrt(W)/2 ± sqrt(V)/2
//! ```
//!
//! `w-` is the inner (smaller) orbit and `w+` the outer orbit that reach
//! brightness `k` at separation `b`.  Both radicands are clamped at zero so
//! that evaluations at the double root do not produce NaN from rounding.

/// Largest `c = b² k / 4` for which real roots exist.
pub const CRITICAL_C: f64 = 27.0 / 256.0;

/// Largest normalised brightness `k` reachable at separation `b` (AU):
/// `27 / (64 b²)`.
#[inline]
pub fn max_brightness_at(b: f64) -> f64 {
    27.0 / 64.0 * b.powi(-2)
}

/// The two positive roots `(inner, outer)` of `z⁴ - z³/sqrt(k) + b²/(4k)`
/// for `k > 0` and `b > 0`.
///
/// For `k` beyond [`max_brightness_at`]`(b)` no orbit reaches brightness
/// `k` at separation `b`; the roots are then clamped to the double root at
/// the critical value.
pub fn orbit_roots(k: f64, b: f64) -> (f64, f64) {
    let c = (0.25 * b * b * k).min(CRITICAL_C);

    let disc = (c * c / 256.0 - c * c * c / 27.0).max(0.0);
    let t = (c / 16.0 + disc.sqrt()).cbrt();
    let w = 2.0 * c / (3.0 * t) + 2.0 * t + 0.25;
    let sw = w.sqrt();
    let v = (0.5 - 2.0 * c / (3.0 * t) - 2.0 * t + 0.25 / sw).max(0.0);
    let sv = v.sqrt();

    let rk = k.sqrt();
    ((0.25 + 0.5 * sw - 0.5 * sv) / rk, (0.25 + 0.5 * sw + 0.5 * sv) / rk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn residual(z: f64, k: f64, b: f64) -> f64 {
        z.powi(4) - z.powi(3) / k.sqrt() + b * b / (4.0 * k)
    }

    #[test]
    fn matches_symbolic_roots() {
        // Reference values from the symbolic Ferrari solution.
        let cases = [
            (0.05, 1.0, 1.145_479_586_488_887_1, 4.413_996_068_679_008),
            (0.2, 1.0, 1.005_137_563_495_648_8, 2.101_354_118_749_343_4),
            (0.4, 1.0, 1.067_816_442_229_907_5, 1.289_977_672_973_513_7),
            (0.1, 0.5, 0.627_027_202_748_495_3, 3.142_130_806_349_781_5),
            (3.0, 0.3, 0.300_241_078_173_960_3, 0.525_737_965_694_952_9),
        ];
        for (k, b, inner, outer) in cases {
            let (lo, hi) = orbit_roots(k, b);
            assert_relative_eq!(lo, inner, max_relative = 1e-12);
            assert_relative_eq!(hi, outer, max_relative = 1e-12);
        }
    }

    #[test]
    fn roots_solve_the_quartic() {
        for &(k, b) in &[(1e-6, 2.0), (0.01, 3.0), (0.2, 1.2), (2.0, 0.4)] {
            let (lo, hi) = orbit_roots(k, b);
            assert!(lo <= hi);
            // scale of the individual terms is z⁴
            assert!(residual(lo, k, b).abs() < 1e-9 * lo.powi(4));
            assert!(residual(hi, k, b).abs() < 1e-9 * hi.powi(4));
        }
    }

    #[test]
    fn roots_merge_at_critical_brightness() {
        let b = 1.5;
        let k = max_brightness_at(b);
        let (lo, hi) = orbit_roots(k, b);
        let expected = 0.75 / k.sqrt();
        assert_relative_eq!(lo, expected, max_relative = 1e-4);
        assert_relative_eq!(hi, expected, max_relative = 1e-4);
        assert!(lo.is_finite() && hi.is_finite());

        // Past the critical value the roots stay finite and merged.
        let (lo, hi) = orbit_roots(1.01 * k, b);
        assert!(lo.is_finite() && hi.is_finite());
    }
}

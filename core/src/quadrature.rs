//! Adaptive one-dimensional quadrature.
//!
//! Both the expected-contrast integral and the ck metric need definite
//! integrals of smooth (but, near the breakpoints, steep) functions to a
//! relative tolerance.  This module implements globally adaptive
//! Gauss–Kronrod quadrature:
//!
//! 1. Evaluate the 15-point Kronrod rule and its embedded 7-point Gauss rule
//!    on the whole interval.  `|K15 - G7|` is the error estimate.
//! 2. While the summed error exceeds `rel_tol × |summed value|`, bisect the
//!    sub-interval with the largest error estimate.
//! 3. Stop when converged or when the number of sub-intervals reaches
//!    `limit`; in the latter case the best estimate is still returned with
//!    `converged = false`.
//!
//! The absolute tolerance is always zero, so an identically zero integrand
//! converges immediately with a zero error estimate.

use log::debug;

/// Kronrod abscissae on [-1, 1] (positive half, descending; last is the
/// centre).  Odd indices are shared with the 7-point Gauss rule.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

/// Kronrod weights matching [`XGK`].
const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

/// Gauss weights for abscissae `XGK[1]`, `XGK[3]`, `XGK[5]` and the centre.
const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// Outcome of an adaptive integration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrature {
    /// Best estimate of the integral.
    pub value: f64,
    /// Summed `|K15 - G7|` error estimate over all sub-intervals.
    pub abs_error: f64,
    /// Number of sub-intervals in the final partition.
    pub intervals: usize,
    /// Whether `abs_error <= rel_tol * |value|` was reached within `limit`.
    pub converged: bool,
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    lo: f64,
    hi: f64,
    value: f64,
    error: f64,
}

/// Apply the 15-point Kronrod rule on `[lo, hi]`, returning the estimate and
/// its error relative to the embedded 7-point Gauss rule.
fn gauss_kronrod_15<F>(f: &F, lo: f64, hi: f64) -> (f64, f64)
where
    F: Fn(f64) -> f64,
{
    let centre = 0.5 * (lo + hi);
    let half = 0.5 * (hi - lo);

    let fc = f(centre);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;

    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = f(centre - dx) + f(centre + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }

    (kronrod * half, ((kronrod - gauss) * half).abs())
}

/// Integrate `f` over `[lo, hi]` to relative tolerance `rel_tol` using at
/// most `limit` sub-intervals.
///
/// A reversed interval (`hi < lo`) yields the negated integral, matching the
/// usual orientation convention.  A zero-width interval integrates to zero.
pub fn integrate<F>(f: F, lo: f64, hi: f64, rel_tol: f64, limit: usize) -> Quadrature
where
    F: Fn(f64) -> f64,
{
    if lo == hi {
        return Quadrature {
            value: 0.0,
            abs_error: 0.0,
            intervals: 0,
            converged: true,
        };
    }
    if hi < lo {
        let q = integrate(f, hi, lo, rel_tol, limit);
        return Quadrature {
            value: -q.value,
            ..q
        };
    }

    let limit = limit.max(1);
    let (value, error) = gauss_kronrod_15(&f, lo, hi);
    let mut segments = vec![Segment { lo, hi, value, error }];

    loop {
        let total: f64 = segments.iter().map(|s| s.value).sum();
        let total_error: f64 = segments.iter().map(|s| s.error).sum();

        if total_error <= rel_tol * total.abs() {
            return Quadrature {
                value: total,
                abs_error: total_error,
                intervals: segments.len(),
                converged: true,
            };
        }
        if segments.len() >= limit || !total.is_finite() {
            debug!(
                "quadrature on [{:.6e}, {:.6e}] stopped at {} intervals (err={:.3e}, value={:.6e})",
                lo,
                hi,
                segments.len(),
                total_error,
                total
            );
            return Quadrature {
                value: total,
                abs_error: total_error,
                intervals: segments.len(),
                converged: false,
            };
        }

        // Bisect the worst sub-interval.
        let worst = segments
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.error.total_cmp(&b.error))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let seg = segments.swap_remove(worst);
        let mid = 0.5 * (seg.lo + seg.hi);
        if mid <= seg.lo || mid >= seg.hi {
            // Interval can no longer be split in floating point.
            segments.push(Segment { error: 0.0, ..seg });
            continue;
        }

        let (left, left_err) = gauss_kronrod_15(&f, seg.lo, mid);
        let (right, right_err) = gauss_kronrod_15(&f, mid, seg.hi);
        segments.push(Segment {
            lo: seg.lo,
            hi: mid,
            value: left,
            error: left_err,
        });
        segments.push(Segment {
            lo: mid,
            hi: seg.hi,
            value: right,
            error: right_err,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn polynomial_is_exact_on_first_pass() {
        // K15 integrates polynomials up to degree 22 exactly.
        let q = integrate(|x| 3.0 * x * x - 2.0 * x + 1.0, 0.0, 2.0, 1e-10, 50);
        assert_relative_eq!(q.value, 8.0 - 4.0 + 2.0, max_relative = 1e-13);
        assert!(q.converged);
        assert_eq!(q.intervals, 1);
    }

    #[test]
    fn quarter_circle_area() {
        // sqrt(1 - x^2) has an infinite derivative at x = 1.
        let q = integrate(|x: f64| (1.0 - x * x).max(0.0).sqrt(), 0.0, 1.0, 1e-6, 100);
        assert!(q.converged);
        assert_relative_eq!(q.value, PI / 4.0, max_relative = 1e-6);
    }

    #[test]
    fn zero_integrand_converges_immediately() {
        let q = integrate(|_| 0.0, 1.0, 5.0, 1e-4, 50);
        assert_eq!(q.value, 0.0);
        assert!(q.converged);
    }

    #[test]
    fn reversed_and_empty_intervals() {
        let q = integrate(|x: f64| x.exp(), 1.0, 0.0, 1e-8, 50);
        assert_relative_eq!(q.value, -(1.0f64.exp() - 1.0), max_relative = 1e-10);

        let q = integrate(|x: f64| x.exp(), 2.0, 2.0, 1e-8, 50);
        assert_eq!(q.value, 0.0);
        assert_eq!(q.intervals, 0);
    }

    #[test]
    fn limit_reached_reports_not_converged() {
        let q = integrate(|x: f64| (1.0 / x).sin(), 1e-6, 1.0, 1e-14, 3);
        assert!(!q.converged);
        assert!(q.intervals <= 3);
        assert!(q.value.is_finite());
    }
}

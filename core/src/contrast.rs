//! Instrument contrast curves and the per-star expected-contrast integrator.
//!
//! A coronagraph's sensitivity is characterised by a *contrast curve*: the
//! faintest planet/star flux ratio detectable at each working angle (the
//! apparent angular separation).  For a planet on a circular orbit of
//! semi-major axis `a`, the apparent separation depends on the unknown
//! orbital inclination and phase, so the contrast floor a planet at that
//! `a` actually faces is an *expectation* over the projected separations it
//! can be seen at.
//!
//! With `t = cos(β)` for phase angle β, the projected separation is
//! `s = a·sqrt(1 - t²)` and the working angle in arcseconds is `s / d` for a
//! star at `d` parsecs.  The expected floor over the observable band
//! `[smin, min(a, smax)]` is
//!
//! ```text
//!            1        ∫ t_up
//! E[C] = ----------   |       C(a·sqrt(1 - t²) / d) dt
//!        t_up - t_lo  ∫ t_lo
//! ```
//!
//! with `t_up = sqrt(1 - (smin/a)²)` and `t_lo = sqrt(1 - (su/a)²)`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::quadrature;

/// Relative tolerance of the expected-contrast integral.
const EXPECTED_CONTRAST_RTOL: f64 = 1e-3;

/// Sub-interval limit of the expected-contrast integral.
const EXPECTED_CONTRAST_LIMIT: usize = 100;

/// Contrast assigned to semi-major axes inside the inner working angle: no
/// planet there can be detected.
pub const BLOCKED_CONTRAST: f64 = 1.0;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while building a [`ContrastCurve`].
#[derive(Debug, thiserror::Error)]
pub enum ContrastCurveError {
    #[error("contrast curve needs at least 2 samples, got {0}")]
    InsufficientData(usize),

    #[error("working-angle and contrast arrays differ in length ({0} vs {1})")]
    MismatchedLengths(usize, usize),

    #[error("working angles must be strictly increasing (sample {0})")]
    UnsortedData(usize),

    #[error("non-finite value in contrast curve at sample {0}")]
    NonFinite(usize),
}

// ---------------------------------------------------------------------------
// ContrastCurve
// ---------------------------------------------------------------------------

/// Piecewise-linear contrast curve over working angle (arcseconds).
///
/// Outside the sampled range the curve is clamped to its boundary values;
/// it never extrapolates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCurve", into = "RawCurve")]
pub struct ContrastCurve {
    working_angles: Vec<f64>,
    contrast: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawCurve {
    working_angles: Vec<f64>,
    contrast: Vec<f64>,
}

impl TryFrom<RawCurve> for ContrastCurve {
    type Error = ContrastCurveError;

    fn try_from(raw: RawCurve) -> Result<Self, Self::Error> {
        ContrastCurve::new(raw.working_angles, raw.contrast)
    }
}

impl From<ContrastCurve> for RawCurve {
    fn from(curve: ContrastCurve) -> Self {
        RawCurve {
            working_angles: curve.working_angles,
            contrast: curve.contrast,
        }
    }
}

impl ContrastCurve {
    /// Build a curve from `(working angle [arcsec], contrast)` samples.
    pub fn new(working_angles: Vec<f64>, contrast: Vec<f64>) -> Result<Self, ContrastCurveError> {
        if working_angles.len() != contrast.len() {
            return Err(ContrastCurveError::MismatchedLengths(
                working_angles.len(),
                contrast.len(),
            ));
        }
        if working_angles.len() < 2 {
            return Err(ContrastCurveError::InsufficientData(working_angles.len()));
        }
        if let Some(i) = working_angles
            .iter()
            .zip(&contrast)
            .position(|(w, c)| !w.is_finite() || !c.is_finite())
        {
            return Err(ContrastCurveError::NonFinite(i));
        }
        if let Some(i) = (1..working_angles.len()).find(|&i| working_angles[i] <= working_angles[i - 1]) {
            return Err(ContrastCurveError::UnsortedData(i));
        }

        Ok(Self {
            working_angles,
            contrast,
        })
    }

    /// A curve with the same contrast at every working angle.
    pub fn flat(inner: f64, outer: f64, contrast: f64) -> Result<Self, ContrastCurveError> {
        Self::new(vec![inner, outer], vec![contrast, contrast])
    }

    pub fn working_angles(&self) -> &[f64] {
        &self.working_angles
    }

    pub fn contrast(&self) -> &[f64] {
        &self.contrast
    }

    /// Smallest contrast anywhere on the curve.  For a piecewise-linear
    /// curve the minimum is always attained at a sample.
    pub fn min_contrast(&self) -> f64 {
        self.contrast.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Evaluate the curve at working angle `wa` (arcsec), clamping outside
    /// the sampled range.
    pub fn eval(&self, wa: f64) -> f64 {
        let n = self.working_angles.len();
        if wa <= self.working_angles[0] {
            return self.contrast[0];
        }
        if wa >= self.working_angles[n - 1] {
            return self.contrast[n - 1];
        }

        // Index of the first sample strictly above wa; 1 <= idx <= n-1 here.
        let idx = self.working_angles.partition_point(|&w| w <= wa);
        let (x1, x2) = (self.working_angles[idx - 1], self.working_angles[idx]);
        let (y1, y2) = (self.contrast[idx - 1], self.contrast[idx]);
        let t = (wa - x1) / (x2 - x1);
        y1 + t * (y2 - y1)
    }

    /// Expected minimum detectable contrast for each semi-major axis in
    /// `a` (AU), for a star at `dist` parsecs whose observable separations
    /// span `[smin, smax]` AU.
    ///
    /// Axes inside `smin` get [`BLOCKED_CONTRAST`].  When the integration
    /// band has zero width (`min(a, smax) == smin`) the expectation is the
    /// curve evaluated at the single reachable separation `smin`.
    pub fn expected_min_contrast(&self, a: &[f64], smin: f64, smax: f64, dist: f64) -> Array1<f64> {
        a.iter()
            .map(|&aj| {
                if aj < smin {
                    return BLOCKED_CONTRAST;
                }
                let su = if aj > smax { smax } else { aj };

                let t_up = (1.0 - (smin / aj).powi(2)).sqrt();
                let t_lo = (1.0 - (su / aj).powi(2)).sqrt();
                if t_up - t_lo <= 0.0 {
                    return self.eval(smin / dist);
                }

                let integrand = |t: f64| self.eval(aj * (1.0 - t * t).max(0.0).sqrt() / dist);
                let q = quadrature::integrate(
                    integrand,
                    t_lo,
                    t_up,
                    EXPECTED_CONTRAST_RTOL,
                    EXPECTED_CONTRAST_LIMIT,
                );
                q.value / (t_up - t_lo)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> ContrastCurve {
        // contrast = 1e-9 * wa between 0.05 and 2 arcsec
        ContrastCurve::new(vec![0.05, 1.0, 2.0], vec![5e-11, 1e-9, 2e-9]).unwrap()
    }

    #[test]
    fn rejects_malformed_samples() {
        assert!(matches!(
            ContrastCurve::new(vec![0.1], vec![1e-9]),
            Err(ContrastCurveError::InsufficientData(1))
        ));
        assert!(matches!(
            ContrastCurve::new(vec![0.1, 0.2], vec![1e-9]),
            Err(ContrastCurveError::MismatchedLengths(2, 1))
        ));
        assert!(matches!(
            ContrastCurve::new(vec![0.1, 0.3, 0.3], vec![1e-9; 3]),
            Err(ContrastCurveError::UnsortedData(2))
        ));
        assert!(matches!(
            ContrastCurve::new(vec![0.1, f64::NAN], vec![1e-9; 2]),
            Err(ContrastCurveError::NonFinite(1))
        ));
    }

    #[test]
    fn interpolates_and_clamps() {
        let c = ramp();
        assert_relative_eq!(c.eval(1.5), 1.5e-9, max_relative = 1e-12);
        assert_eq!(c.eval(1.0), 1e-9);
        assert_eq!(c.eval(0.001), 5e-11);
        assert_eq!(c.eval(50.0), 2e-9);
        assert_eq!(c.min_contrast(), 5e-11);
    }

    #[test]
    fn deserialization_validates() {
        let ok: ContrastCurve =
            serde_json::from_str(r#"{"working_angles":[0.1,0.5],"contrast":[1e-9,1e-10]}"#).unwrap();
        assert_eq!(ok.min_contrast(), 1e-10);

        let bad = serde_json::from_str::<ContrastCurve>(r#"{"working_angles":[0.5,0.1],"contrast":[1e-9,1e-10]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn blocked_inside_inner_separation() {
        let c = ramp();
        let e = c.expected_min_contrast(&[0.5, 0.99], 1.0, 3.0, 10.0);
        assert_eq!(e.to_vec(), vec![BLOCKED_CONTRAST, BLOCKED_CONTRAST]);
    }

    #[test]
    fn flat_curve_expectation_is_the_flat_value() {
        let c = ContrastCurve::flat(0.01, 1.0, 3e-10).unwrap();
        let e = c.expected_min_contrast(&[1.5, 2.0, 8.0], 1.0, 4.0, 10.0);
        for v in e.iter() {
            assert_relative_eq!(*v, 3e-10, max_relative = 1e-9);
        }
    }

    #[test]
    fn linear_curve_matches_closed_form() {
        // C(wa) = 1e-9 * wa on the sampled range, and every separation
        // visited below maps into it (s/d between 0.1 and 0.3 arcsec).
        let c = ramp();
        let (a, smin, smax, d) = (3.0, 1.0, 5.0, 10.0);

        // ∫ sqrt(1 - t²) dt = (t sqrt(1 - t²) + asin t) / 2
        let antiderivative = |t: f64| 0.5 * (t * (1.0 - t * t).sqrt() + t.asin());
        let t_up = (1.0f64 - (smin / a) * (smin / a)).sqrt();
        let t_lo = 0.0;
        let expected =
            1e-9 * a / d * (antiderivative(t_up) - antiderivative(t_lo)) / (t_up - t_lo);

        let e = c.expected_min_contrast(&[a], smin, smax, d);
        assert_relative_eq!(e[0], expected, max_relative = 1e-3);
    }

    #[test]
    fn zero_width_band_uses_point_value() {
        let c = ramp();
        // a == smin: only the separation smin is reachable.
        let e = c.expected_min_contrast(&[2.0], 2.0, 5.0, 10.0);
        assert_relative_eq!(e[0], c.eval(0.2), max_relative = 1e-12);
        assert!(e[0].is_finite());

        // smin == smax < a
        let e = c.expected_min_contrast(&[4.0], 2.0, 2.0, 10.0);
        assert_relative_eq!(e[0], c.eval(0.2), max_relative = 1e-12);
    }
}

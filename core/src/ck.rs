//! The ck observation-value metric.
//!
//! ck is the probability that a planet drawn from a log-uniform
//! semi-major-axis distribution on `[amin, amax]`, conditioned on falling
//! in a star's observable separation band `[smin, smax]`, is bright enough
//! to beat the instrument floor.  It is used only as the objective weight
//! of target selection.
//!
//! # Formulation
//!
//! Working in normalised brightness `k = C / (p R²)`, the density of `k`
//! is `anp / (2 sqrt(k))` times the width in semi-major axis of the orbits
//! that reach brightness `k` inside the band.  Those widths are built from
//! the roots of the visibility quartic (see [`crate::quartic`]) at the two
//! band edges, and change form at six breakpoints:
//!
//! | k  | value                                   |
//! |----|-----------------------------------------|
//! | k1 | `cos⁴((π - asin(smin/amax)) / 2) / amax²` |
//! | k2 | `cos⁴((π - asin(smax/amax)) / 2) / amax²` |
//! | k3 | `cos⁴(asin(smax/amax) / 2) / amax²`       |
//! | k4 | `27 / (64 smax²)`                       |
//! | k5 | `cos⁴(asin(smin/amax) / 2) / amax²`       |
//! | k6 | `27 / (64 smin²)`                       |
//!
//! `k1 <= k2 <= k3` and `k6` is always last, but `k4` and `k5` can come in
//! either order, giving two piece layouts.  ck integrates the density from
//! `kmin = Cmin / (p R²)` to `k6`.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::quadrature;
use crate::quartic::{max_brightness_at, orbit_roots};

/// Relative tolerance of each piecewise integral.
const CK_RTOL: f64 = 1e-4;

/// Sub-interval limit of each piecewise integral.
const CK_LIMIT: usize = 50;

/// Relative slack allowed between consecutive breakpoints before they are
/// reported out of order.
const ORDER_RTOL: f64 = 1e-12;

/// Fraction of the smallest positive ck added to every star.
pub const CK_OFFSET_FRACTION: f64 = 1e-2;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while computing ck.
#[derive(Debug, thiserror::Error)]
pub enum CkError {
    #[error("semi-major axis range [{0}, {1}] AU is invalid")]
    InvalidAxisRange(f64, f64),

    #[error("star {index}: separation band [{smin}, {smax}] AU is invalid for amax={amax}")]
    InvalidBand {
        index: usize,
        smin: f64,
        smax: f64,
        amax: f64,
    },

    #[error("smin and smax arrays differ in length ({0} vs {1})")]
    MismatchedLengths(usize, usize),

    #[error("detection floor kmin={0} is not a non-negative number")]
    InvalidFloor(f64),

    #[error("star {index}: breakpoints out of order {values:?}")]
    BreakpointOrder { index: usize, values: [f64; 6] },

    #[error("star {index}: ck evaluated to {value}")]
    InvalidValue { index: usize, value: f64 },
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

/// Which of k4 (peak brightness at `smax`) and k5 (full-phase brightness
/// at `amax` seen at `smin`) comes first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceLayout {
    /// `k4 < k5`: pieces 1-2, 2-3, 3-4, 4-5, 5-6.
    SmaxPeakFirst,
    /// `k4 >= k5`: pieces 1-2, 2-3, 3-5, 5-4, 4-6.
    AmaxBoundFirst,
}

/// Semi-major-axis width that the density is proportional to on one piece.
///
/// `smin_in`/`smin_out` are the inner/outer quartic roots at `smin`;
/// `smax_in`/`smax_out` the same at `smax`.  Widths are not clipped; near
/// `smax == amax` the outer-arc terms dip below zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Span {
    /// `amax - smin_in`
    SminInnerToAmax,
    /// `smax_in - smin_in`
    InnerArc,
    /// `amax - smax_out + smax_in - smin_in`
    InnerArcAndOuterToAmax,
    /// `smin_out - smax_out + smax_in - smin_in`
    InnerArcAndOuterArc,
    /// `smin_out - smin_in`
    SminOrbits,
}

impl Span {
    fn width(self, k: f64, smin: f64, smax: f64, amax: f64) -> f64 {
        let (smin_in, smin_out) = orbit_roots(k, smin);
        match self {
            Span::SminInnerToAmax => amax - smin_in,
            Span::SminOrbits => smin_out - smin_in,
            Span::InnerArc => orbit_roots(k, smax).0 - smin_in,
            Span::InnerArcAndOuterToAmax => {
                let (smax_in, smax_out) = orbit_roots(k, smax);
                amax - smax_out + smax_in - smin_in
            }
            Span::InnerArcAndOuterArc => {
                let (smax_in, smax_out) = orbit_roots(k, smax);
                smin_out - smax_out + smax_in - smin_in
            }
        }
    }
}

/// Ordered breakpoints of one star's brightness density.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakpoints {
    /// Breakpoint values in integration order.
    pub k: [f64; 6],
    pub layout: PieceLayout,
    spans: [Span; 5],
}

impl Breakpoints {
    /// Compute the six breakpoints for a separation band inside `amax`.
    pub fn new(amax: f64, smin: f64, smax: f64) -> Self {
        let quarter = |angle: f64| (0.5 * angle).cos().powi(4) / (amax * amax);
        let theta_min = (smin / amax).asin();
        let theta_max = (smax / amax).asin();

        // k2 <= k3, k3 <= k4 and k5 <= k6 hold with equality at
        // smax = amax, smax = amax·√3/2 and smin = amax·√3/2; rounding must
        // not flip them.
        let k4 = max_brightness_at(smax);
        let k6 = max_brightness_at(smin);
        let k3 = quarter(theta_max).min(k4);
        let k2 = quarter(PI - theta_max).min(k3);
        let k1 = quarter(PI - theta_min);
        let k5 = quarter(theta_min).min(k6);

        if k4 < k5 {
            Self {
                k: [k1, k2, k3, k4, k5, k6],
                layout: PieceLayout::SmaxPeakFirst,
                spans: [
                    Span::SminInnerToAmax,
                    Span::InnerArc,
                    Span::InnerArcAndOuterToAmax,
                    Span::SminInnerToAmax,
                    Span::SminOrbits,
                ],
            }
        } else {
            Self {
                k: [k1, k2, k3, k5, k4, k6],
                layout: PieceLayout::AmaxBoundFirst,
                spans: [
                    Span::SminInnerToAmax,
                    Span::InnerArc,
                    Span::InnerArcAndOuterToAmax,
                    Span::InnerArcAndOuterArc,
                    Span::SminOrbits,
                ],
            }
        }
    }

    /// Whether the breakpoints are non-decreasing, up to rounding.
    pub fn is_ordered(&self) -> bool {
        self.k.windows(2).all(|w| w[0] <= w[1] * (1.0 + ORDER_RTOL))
    }

    /// The `(lo, hi, span)` intervals that lie above `kmin`, clipping the
    /// first one at `kmin`.  Empty when `kmin` is at or beyond the last
    /// breakpoint.
    fn intervals_above(&self, kmin: f64) -> Vec<(f64, f64, Span)> {
        let first = match self.k.iter().position(|&k| k >= kmin) {
            Some(i) => i,
            None => return Vec::new(),
        };

        let mut out = Vec::with_capacity(5);
        if first > 0 {
            out.push((kmin, self.k[first], self.spans[first - 1]));
        }
        for piece in first..5 {
            out.push((self.k[piece], self.k[piece + 1], self.spans[piece]));
        }
        out.retain(|&(lo, hi, _)| hi > lo);
        out
    }
}

// ---------------------------------------------------------------------------
// ck
// ---------------------------------------------------------------------------

/// Normalisation `anp = an / cg` of the brightness density: the inverse of
/// the log-uniform probability that a planet falls in `[smin, smax]`.
fn band_normalisation(amin: f64, amax: f64, smin: f64, smax: f64) -> f64 {
    let an = 1.0 / (amax / amin).ln();
    let edge = |s: f64| {
        let q = (1.0 - (s / amax).powi(2)).sqrt();
        q + (s / (q + 1.0)).ln()
    };
    let cg = an * (edge(smax) - edge(smin));
    an / cg
}

/// ck for a single star, given the normalised floor `kmin`.
///
/// `index` only labels errors.  A zero-width band (`smin == smax`) has
/// ck = 0 without integrating.
pub fn star_ck(index: usize, amin: f64, amax: f64, smin: f64, smax: f64, kmin: f64) -> Result<f64, CkError> {
    if !(smin > 0.0 && smin <= smax && smax <= amax) {
        return Err(CkError::InvalidBand {
            index,
            smin,
            smax,
            amax,
        });
    }
    if smin == smax {
        return Ok(0.0);
    }

    let bp = Breakpoints::new(amax, smin, smax);
    if !bp.is_ordered() {
        return Err(CkError::BreakpointOrder {
            index,
            values: bp.k,
        });
    }

    let anp = band_normalisation(amin, amax, smin, smax);
    let mut ck = 0.0;
    for (lo, hi, span) in bp.intervals_above(kmin) {
        let density = |k: f64| anp / (2.0 * k.sqrt()) * span.width(k, smin, smax, amax);
        let q = quadrature::integrate(density, lo, hi, CK_RTOL, CK_LIMIT);
        if !q.converged {
            warn!(
                "star {}: ck piece [{:.4e}, {:.4e}] did not converge (err={:.2e})",
                index, lo, hi, q.abs_error
            );
        }
        ck += q.value;
    }

    if !(ck.is_finite() && ck >= 0.0) {
        return Err(CkError::InvalidValue { index, value: ck });
    }
    debug!("star {}: ck={:.6e} ({:?})", index, ck, bp.layout);
    Ok(ck)
}

/// Compute ck for every star.
///
/// `cmin` is the instrument's minimum contrast, `pexp` the expected
/// geometric albedo and `rexp` the expected planetary radius in AU.  Stars
/// are processed in parallel.
pub fn find_ck(
    amin: f64,
    amax: f64,
    smin: &[f64],
    smax: &[f64],
    cmin: f64,
    pexp: f64,
    rexp: f64,
) -> Result<Vec<f64>, CkError> {
    if !(amin > 0.0 && amax > amin) {
        return Err(CkError::InvalidAxisRange(amin, amax));
    }
    if smin.len() != smax.len() {
        return Err(CkError::MismatchedLengths(smin.len(), smax.len()));
    }
    let kmin = cmin / (pexp * rexp * rexp);
    if !(kmin >= 0.0) {
        return Err(CkError::InvalidFloor(kmin));
    }

    info!("Beginning ck calculations for {} stars (kmin={:.4e})", smin.len(), kmin);
    let ck = smin
        .par_iter()
        .zip(smax.par_iter())
        .enumerate()
        .map(|(i, (&lo, &hi))| star_ck(i, amin, amax, lo, hi, kmin))
        .collect::<Result<Vec<f64>, CkError>>()?;
    info!("Finished ck calculations");

    Ok(ck)
}

/// Add [`CK_OFFSET_FRACTION`] of the smallest strictly positive ck to every
/// entry, so that stars with zero ck still carry a little weight.  Leaves
/// the values untouched when none is positive.
pub fn apply_offset(ck: &mut [f64]) {
    let smallest = ck
        .iter()
        .copied()
        .filter(|&v| v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if smallest.is_finite() {
        let offset = smallest * CK_OFFSET_FRACTION;
        ck.iter_mut().for_each(|v| *v += offset);
    }
}

//! Closed-form geometric visibility model and bin integration.
//!
//! # Model
//!
//! A planet of radius `R` on a circular orbit of semi-major axis `a`, with
//! geometric albedo `p`, seen at phase angle β has planet/star flux ratio
//!
//! ```text
//! C(β) = p · (R / a)² · cos⁴(β / 2)
//! ```
//!
//! and projected separation `s = a · sin β`.  The instrument sees the planet
//! only while `smin <= s <= smax` and `C(β) >= Cmin`.  Because
//! `sqrt(C) ∝ cos²(β/2) = (1 + cos β) / 2`, the fraction of `cos β` space
//! that satisfies both conditions is a signed sum of square-rooted contrasts
//! at the phase angles bounding the observable annulus, scaled by
//! `a / sqrt(p R²)`.
//!
//! Two regimes exist per grid point:
//!
//! * **contained** (`smax < a`): the orbit leaves the outer working angle,
//!   so four phase angles bound two observable arcs: `asin(smin/a)`,
//!   `π - asin(smin/a)`, `asin(smax/a)`, `π - asin(smax/a)`.
//! * **extended** (`smax >= a`): only the inner working angle cuts the
//!   orbit, giving two bounding phases.
//!
//! In both regimes the interior contrasts are raised to `Cmin` *before* a
//! pair whose inner bound exceeds its outer bound is zeroed.  Grid points
//! with `smin > a` are never observable and are set to zero.

use ndarray::{s, Array2, ArrayView1};
use std::f64::consts::PI;

/// Depth-of-search density at a single `(a, R)` point.
///
/// `a` and `r` are in AU, `p` is the geometric albedo, `smin`/`smax` are
/// the star's separation bounds in AU, and `cmin` is the contrast floor.
pub fn visibility_at(a: f64, r: f64, p: f64, smin: f64, smax: f64, cmin: f64) -> f64 {
    if smin > a {
        return 0.0;
    }

    let scale = a / (p * r * r).sqrt();
    let flux = p * (r / a).powi(2);
    let contrast_at = |beta: f64| flux * (0.5 * beta).cos().powi(4);

    if smax < a {
        let b1 = (smin / a).asin();
        let b2 = PI - b1;
        let b3 = (smax / a).asin();
        let b4 = PI - b3;

        let mut c1 = contrast_at(b1);
        let mut c2 = contrast_at(b2);
        let mut c3 = contrast_at(b3);
        let mut c4 = contrast_at(b4);

        if c2 < cmin {
            c2 = cmin;
        }
        if c3 < cmin {
            c3 = cmin;
        }
        if c3 > c1 {
            c3 = 0.0;
            c1 = 0.0;
        }
        if c2 > c4 {
            c2 = 0.0;
            c4 = 0.0;
        }

        scale * (c4.sqrt() - c2.sqrt() + c1.sqrt() - c3.sqrt())
    } else {
        let ratio = smin / a;
        let (mut c1, mut c2) = if ratio < 1.0 {
            let b1 = ratio.asin();
            (contrast_at(b1), contrast_at(PI - b1))
        } else {
            (1.0, 1.0)
        };

        if c2 < cmin {
            c2 = cmin;
        }
        if c2 > c1 {
            c1 = 0.0;
            c2 = 0.0;
        }

        scale * (c1.sqrt() - c2.sqrt())
    }
}

/// Evaluate [`visibility_at`] on the corner grid spanned by semi-major axis
/// edges `a` and radius edges `r` (both AU).
///
/// The result has shape `(r.len(), a.len())`: rows follow radius, columns
/// follow semi-major axis.  `cmin` holds one contrast floor per `a` entry.
pub fn visibility_grid(
    a: ArrayView1<f64>,
    r: ArrayView1<f64>,
    p: f64,
    smin: f64,
    smax: f64,
    cmin: ArrayView1<f64>,
) -> Array2<f64> {
    debug_assert_eq!(a.len(), cmin.len());
    Array2::from_shape_fn((r.len(), a.len()), |(i, j)| {
        visibility_at(a[j], r[i], p, smin, smax, cmin[j])
    })
}

/// Average the four corner values of every bin.
///
/// An `(N+1, M+1)` corner grid becomes an `(N, M)` bin grid.  Inputs with
/// fewer than two rows or columns have no bins.
pub fn bin_average(corners: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = corners.dim();
    if rows < 2 || cols < 2 {
        return Array2::zeros((rows.saturating_sub(1), cols.saturating_sub(1)));
    }

    let sum = &corners.slice(s![..-1, ..-1])
        + &corners.slice(s![1.., ..-1])
        + &corners.slice(s![..-1, 1..])
        + &corners.slice(s![1.., 1..]);
    sum * 0.25
}

/// Bin-integrated depth of search for one star: [`visibility_grid`]
/// followed by [`bin_average`].
pub fn visibility_bins(
    a: ArrayView1<f64>,
    r: ArrayView1<f64>,
    p: f64,
    smin: f64,
    smax: f64,
    cmin: ArrayView1<f64>,
) -> Array2<f64> {
    bin_average(&visibility_grid(a, r, p, smin, smax, cmin))
}

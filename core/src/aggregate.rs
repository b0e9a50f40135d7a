//! Depth-of-search aggregation over the observed stars.
//!
//! Each star contributes the bin-averaged visibility of its own grid, built
//! from the expected contrast floor it faces at every semi-major-axis edge.
//! Stars are independent, so their grids are computed in parallel and then
//! added in catalog order; the sum does not depend on thread scheduling.

use log::{debug, info, warn};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::types::StarRecord;
use crate::visibility::visibility_bins;

/// Bin-integrated depth of search of a single star.
///
/// `aedges` and `redges` are in AU; `albedo` is the expected geometric
/// albedo.  Returns `None` when the star's scalars are unusable or its grid
/// is not finite.
pub fn star_dos(
    aedges: ArrayView1<f64>,
    redges: ArrayView1<f64>,
    albedo: f64,
    star: &StarRecord,
) -> Option<Array2<f64>> {
    if !star.is_well_formed() {
        return None;
    }

    let cmin = star
        .contrast
        .expected_min_contrast(&aedges.to_vec(), star.smin, star.smax, star.dist);
    let bins = visibility_bins(aedges, redges, albedo, star.smin, star.smax, cmin.view());

    bins.iter().all(|v| v.is_finite()).then_some(bins)
}

/// Sum of [`star_dos`] over `stars`, shape `(redges.len() - 1,
/// aedges.len() - 1)`.
///
/// A star that cannot be evaluated is logged and contributes nothing; an
/// empty star list gives an all-zero grid.
pub fn dos_sum(
    aedges: ArrayView1<f64>,
    redges: ArrayView1<f64>,
    albedo: f64,
    stars: &[StarRecord],
) -> Array2<f64> {
    let shape = (redges.len().saturating_sub(1), aedges.len().saturating_sub(1));
    info!("Beginning depth of search calculations for {} stars", stars.len());

    let grids: Vec<Option<Array2<f64>>> = stars
        .par_iter()
        .map(|star| star_dos(aedges, redges, albedo, star))
        .collect();

    let mut dos = Array2::zeros(shape);
    let mut skipped = 0usize;
    for (star, grid) in stars.iter().zip(grids) {
        match grid {
            Some(g) => {
                debug!("{}: peak depth of search {:.4}", star.name, g.fold(0.0f64, |m, &v| m.max(v)));
                dos += &g;
            }
            None => {
                warn!(
                    "Star '{}' (dist={}, smin={}, smax={}) skipped: unusable inputs",
                    star.name, star.dist, star.smin, star.smax
                );
                skipped += 1;
            }
        }
    }

    info!("Finished depth of search calculations ({} stars skipped)", skipped);
    dos
}

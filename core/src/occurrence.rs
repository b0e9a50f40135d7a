//! Planet occurrence rates over the bin grid and the yield grid.
//!
//! A population is described by a joint density `f(a, R)` over semi-major
//! axis (AU) and planetary radius (Earth radii), normalised to one planet
//! per star, and an overall occurrence rate `eta`.  The expected number of
//! planets per star in a bin is approximated from the four bin corners,
//! like the depth-of-search bin integrator:
//!
//! ```text
//! etas[i, j] = mean(f at the four corners) · Δa_j · ΔR_i · eta
//! ```

use ndarray::{Array1, Array2, ArrayView1};

use crate::types::Population;
use crate::visibility::bin_average;

/// Joint probability density of planets over `(a [AU], R [R⊕])`.
pub trait PlanetDensity: Sync {
    fn density(&self, a: f64, r: f64) -> f64;
}

/// Separable density, log-uniform in both semi-major axis and radius over
/// the population ranges and zero outside them.
#[derive(Clone, Debug, PartialEq)]
pub struct LogUniformPopulation {
    amin: f64,
    amax: f64,
    rmin: f64,
    rmax: f64,
}

impl LogUniformPopulation {
    pub fn new(amin: f64, amax: f64, rmin: f64, rmax: f64) -> Self {
        Self { amin, amax, rmin, rmax }
    }

    pub fn from_population(pop: &Population) -> Self {
        Self::new(pop.amin, pop.amax, pop.rmin, pop.rmax)
    }
}

impl PlanetDensity for LogUniformPopulation {
    fn density(&self, a: f64, r: f64) -> f64 {
        if a < self.amin || a > self.amax || r < self.rmin || r > self.rmax {
            return 0.0;
        }
        1.0 / (a * (self.amax / self.amin).ln()) / (r * (self.rmax / self.rmin).ln())
    }
}

impl<F> PlanetDensity for F
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    fn density(&self, a: f64, r: f64) -> f64 {
        self(a, r)
    }
}

fn widths(edges: ArrayView1<f64>) -> Array1<f64> {
    &edges.slice(ndarray::s![1..]) - &edges.slice(ndarray::s![..-1])
}

/// Occurrence rate of every bin, shape `(redges.len() - 1, aedges.len() - 1)`.
///
/// `aedges` are in AU and `redges` in Earth radii.
pub fn occurrence_grid(
    aedges: ArrayView1<f64>,
    redges: ArrayView1<f64>,
    density: &dyn PlanetDensity,
    eta: f64,
) -> Array2<f64> {
    let corners = Array2::from_shape_fn((redges.len(), aedges.len()), |(i, j)| {
        density.density(aedges[j], redges[i])
    });
    let mut etas = bin_average(&corners);
    if etas.is_empty() {
        return etas;
    }

    let da = widths(aedges);
    let dr = widths(redges);
    for ((i, j), v) in etas.indexed_iter_mut() {
        *v *= da[j] * dr[i] * eta;
    }
    etas
}

/// Depth of search weighted by occurrence rate, bin by bin.
pub fn dos_occ(dos: &Array2<f64>, etas: &Array2<f64>) -> Array2<f64> {
    dos * etas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::log_edges;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn log_uniform_grid_sums_to_eta() {
        let pop = LogUniformPopulation::new(0.1, 100.0, 0.35, 45.0);
        let a = log_edges(0.1, 100.0, 100);
        let r = log_edges(0.35, 45.0, 30);
        let etas = occurrence_grid(a.view(), r.view(), &pop, 0.8);

        assert_eq!(etas.dim(), (30, 100));
        assert!(etas.iter().all(|&v| v > 0.0));
        // corner averaging of 1/x over log bins overestimates slightly
        assert_relative_eq!(etas.sum(), 0.8, max_relative = 1e-2);
    }

    #[test]
    fn density_vanishes_outside_population() {
        let pop = LogUniformPopulation::new(1.0, 10.0, 1.0, 4.0);
        assert_eq!(pop.density(0.5, 2.0), 0.0);
        assert_eq!(pop.density(2.0, 5.0), 0.0);
        assert!(pop.density(1.0, 1.0) > 0.0);
    }

    #[test]
    fn closures_are_densities() {
        let uniform = |_a: f64, _r: f64| 0.5;
        let etas = occurrence_grid(array![1.0, 2.0, 4.0].view(), array![1.0, 3.0].view(), &uniform, 2.0);
        assert_eq!(etas, array![[2.0, 4.0]]);
    }

    #[test]
    fn yield_grid_is_elementwise_product() {
        let dos = array![[1.0, 2.0], [0.0, 3.0]];
        let etas = array![[0.5, 0.25], [4.0, 2.0]];
        assert_eq!(dos_occ(&dos, &etas), array![[0.5, 0.5], [0.0, 6.0]]);
    }
}

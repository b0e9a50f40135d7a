//! End-to-end depth-of-search run.
//!
//! # Steps
//!
//! 1. Validate the configuration and population; clamp the radius range.
//! 2. Clip each star's `smax` to `amax` and keep stars with
//!    `amin < smin < amax` and `t_int < int_cutoff`.
//! 3. Compute ck for the kept stars and apply the regularisation offset.
//! 4. Select the stars to observe under the time budget.
//! 5. Sum the depth of search of the selected stars over a log-spaced grid.
//! 6. Weight it by the population's occurrence rates.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::aggregate::dos_sum;
use crate::ck::{apply_offset, find_ck, CkError};
use crate::constants::earth_radii_to_au;
use crate::occurrence::{dos_occ, occurrence_grid, LogUniformPopulation, PlanetDensity};
use crate::selection::{SelectionError, StarSelector};
use crate::types::{log_edges, BinGrid, DosParams, DosResult, GridError, StarRecord, Survey, SurveyError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Any failure of a depth-of-search run.
#[derive(Debug, thiserror::Error)]
pub enum DosError {
    #[error(transparent)]
    Survey(#[from] SurveyError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Ck(#[from] CkError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

// ---------------------------------------------------------------------------
// DepthOfSearch
// ---------------------------------------------------------------------------

/// Depth-of-search engine.
#[derive(Clone, Debug, Default)]
pub struct DepthOfSearch {
    params: DosParams,
}

impl DepthOfSearch {
    pub fn new(params: DosParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DosParams {
        &self.params
    }

    /// Run with the survey population's log-uniform density.
    pub fn run(&self, survey: &Survey) -> Result<DosResult, DosError> {
        let population = survey.population.validated()?;
        self.run_with_density(survey, &LogUniformPopulation::from_population(&population))
    }

    /// Run with a custom planet density over `(a [AU], R [R⊕])`.
    pub fn run_with_density(&self, survey: &Survey, density: &dyn PlanetDensity) -> Result<DosResult, DosError> {
        let start = Instant::now();
        self.params.validate()?;
        let pop = survey.population.validated()?;
        let cmin = survey.cmin()?;
        let rexp = earth_radii_to_au(pop.radius);

        info!(
            "Starting depth of search: {} stars, a=[{}, {}] AU, R=[{}, {}] R_earth, Cmin={:.3e}",
            survey.stars.len(),
            pop.amin,
            pop.amax,
            pop.rmin,
            pop.rmax,
            cmin,
        );
        debug!("Expected geometric albedo: {}", pop.albedo);

        // -- configure rayon thread pool -----------------------------------
        if self.params.n_workers > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.params.n_workers)
                .build_global()
                .ok(); // ignore if already initialised
        }

        // ------------------------------------------------------------------
        // Step 1: Target filtering
        // ------------------------------------------------------------------
        let (catalog, targets): (Vec<usize>, Vec<StarRecord>) = survey
            .stars
            .iter()
            .enumerate()
            .filter_map(|(i, star)| {
                if !star.is_well_formed() {
                    warn!("Star {} '{}' dropped: unusable catalog values", i, star.name);
                    return None;
                }
                let mut star = star.clone();
                star.smax = star.smax.min(pop.amax);
                let keep = star.smin > pop.amin && star.smin < pop.amax && star.t_int < self.params.int_cutoff;
                keep.then_some((i, star))
            })
            .unzip();
        info!("{} of {} stars pass the target filters", targets.len(), survey.stars.len());

        // ------------------------------------------------------------------
        // Step 2: Observation value
        // ------------------------------------------------------------------
        let smin: Vec<f64> = targets.iter().map(|s| s.smin).collect();
        let smax: Vec<f64> = targets.iter().map(|s| s.smax).collect();
        let mut ck = find_ck(pop.amin, pop.amax, &smin, &smax, cmin, pop.albedo, rexp)?;
        apply_offset(&mut ck);

        // ------------------------------------------------------------------
        // Step 3: Star selection
        // ------------------------------------------------------------------
        let mut selector = StarSelector::new();
        if let Some(secs) = self.params.time_limit_secs {
            let limit = Duration::try_from_secs_f64(secs)
                .map_err(|_| SurveyError::InvalidParameter { name: "time_limit_secs", value: secs })?;
            selector = selector.with_time_limit(limit);
        }
        let t_int: Vec<f64> = targets.iter().map(|s| s.t_int).collect();
        let selection = selector.solve(&t_int, self.params.max_time, &ck)?;

        let observed: Vec<StarRecord> = selection.indices.iter().map(|&i| targets[i].clone()).collect();
        info!("Number of observed targets: {}", observed.len());

        // ------------------------------------------------------------------
        // Step 4: Depth of search
        // ------------------------------------------------------------------
        let grid = BinGrid::logspace(
            pop.amin,
            pop.amax,
            self.params.abins,
            earth_radii_to_au(pop.rmin),
            earth_radii_to_au(pop.rmax),
            self.params.rbins,
        )?;
        let dos = dos_sum(grid.aedges(), grid.redges(), pop.albedo, &observed);

        // ------------------------------------------------------------------
        // Step 5: Occurrence rates
        // ------------------------------------------------------------------
        let aedges = grid.aedges().to_owned();
        let redges = log_edges(pop.rmin, pop.rmax, self.params.rbins);
        let occ_rates = occurrence_grid(aedges.view(), redges.view(), density, pop.eta);
        let dos_occ = dos_occ(&dos, &occ_rates);

        let elapsed = start.elapsed().as_millis() as u64;
        info!(
            "Depth of search complete in {} ms: {} stars observed, expected yield {:.4}",
            elapsed,
            observed.len(),
            dos_occ.sum(),
        );

        Ok(DosResult {
            num_obs: observed.len(),
            selected: selection.indices.iter().map(|&i| catalog[i]).collect(),
            names: observed.iter().map(|s| s.name.clone()).collect(),
            ck: selection.indices.iter().map(|&i| ck[i]).collect(),
            objective: selection.objective,
            total_time: selection.total_time,
            aedges,
            redges,
            dos,
            occ_rates,
            dos_occ,
            processing_time_ms: elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::ContrastCurve;
    use crate::types::Population;

    fn survey(stars: Vec<StarRecord>) -> Survey {
        Survey {
            population: Population {
                amin: 0.1,
                amax: 30.0,
                rmin: 1.0,
                rmax: 20.0,
                albedo: 0.367,
                radius: 4.0,
                eta: 1.0,
            },
            cmin: Some(1e-10),
            reference_contrast: None,
            stars,
        }
    }

    fn star(name: &str, dist: f64, t_int: f64) -> StarRecord {
        let curve = ContrastCurve::flat(0.05, 1.0, 1e-10).unwrap();
        StarRecord::from_working_angles(name, dist, 0.05, 1.0, t_int, curve)
    }

    fn small_params() -> DosParams {
        DosParams {
            abins: 20,
            rbins: 6,
            ..DosParams::default()
        }
    }

    #[test]
    fn filters_before_selecting() {
        let stars = vec![
            star("too close", 1.0, 1.0), // smin = 0.05 AU < amin
            star("ok", 10.0, 1.0),
            star("too slow", 10.0, 45.0), // t_int above cutoff
            star("too far", 700.0, 1.0),  // smin = 35 AU > amax
            star("no distance", f64::NAN, 1.0),
        ];
        let result = DepthOfSearch::new(small_params()).run(&survey(stars)).unwrap();
        assert_eq!(result.selected, vec![1]);
        assert_eq!(result.names, vec!["ok".to_string()]);
        assert_eq!(result.num_obs, 1);
    }

    #[test]
    fn empty_survey_gives_zero_grids() {
        let result = DepthOfSearch::new(small_params()).run(&survey(vec![])).unwrap();
        assert_eq!(result.num_obs, 0);
        assert_eq!(result.dos.dim(), (6, 20));
        assert!(result.dos.iter().all(|&v| v == 0.0));
        assert!(result.dos_occ.iter().all(|&v| v == 0.0));
        assert_eq!(result.redges[0], 1.0);
        assert_eq!(result.redges[6], 20.0);
    }

    #[test]
    fn invalid_population_is_reported() {
        let mut s = survey(vec![]);
        s.population.rmin = 50.0;
        let err = DepthOfSearch::default().run(&s).unwrap_err();
        assert!(matches!(err, DosError::Survey(SurveyError::RadiusAboveRange(_))));
    }

    #[test]
    fn time_budget_limits_selection() {
        let stars = (0..6).map(|i| star(&format!("s{i}"), 5.0 + 3.0 * i as f64, 10.0)).collect();
        let params = DosParams { max_time: 25.0, ..small_params() };
        let result = DepthOfSearch::new(params).run(&survey(stars)).unwrap();
        assert_eq!(result.num_obs, 2);
        assert!(result.total_time <= 25.0);
    }
}

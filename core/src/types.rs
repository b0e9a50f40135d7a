//! Common types shared across the depth-of-search pipeline.
//!
//! These structures describe the inputs of a run (bin grid, target stars,
//! planet population, run configuration) and its aggregated output.  All
//! of them are plain data: they are built once from external inputs and
//! never mutated by the numerical modules.

use log::warn;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::constants::{ARCSEC_TO_RAD, AU_PER_PARSEC, MAX_EXTRAPOLATION_RADIUS, MIN_EXTRAPOLATION_RADIUS};
use crate::contrast::ContrastCurve;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building a [`BinGrid`].
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("{axis} axis needs at least 2 edges, got {len}")]
    TooFewEdges { axis: &'static str, len: usize },

    #[error("{axis} axis: first edge {value} must be positive and finite")]
    NonPositive { axis: &'static str, value: f64 },

    #[error("{axis} axis: edges must be strictly increasing (edge {index})")]
    NotIncreasing { axis: &'static str, index: usize },
}

/// Errors raised while loading or validating a [`Survey`].
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("invalid survey document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("semi-major axis range [{0}, {1}] AU must satisfy 0 < amin < amax")]
    InvalidAxisRange(f64, f64),

    #[error("minimum planetary radius {0} R⊕ is above extrapolation range")]
    RadiusAboveRange(f64),

    #[error("maximum planetary radius {0} R⊕ is below extrapolation range")]
    RadiusBelowRange(f64),

    #[error("maximum planetary radius {rmax} R⊕ is not above minimum planetary radius {rmin} R⊕")]
    InvalidRadiusRange { rmin: f64, rmax: f64 },

    #[error("{name} = {value} is out of range")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("survey gives neither a contrast floor nor a reference contrast curve")]
    MissingContrastFloor,
}

// ---------------------------------------------------------------------------
// BinGrid
// ---------------------------------------------------------------------------

/// Semi-major-axis and planetary-radius bin edges, both in AU.
///
/// A grid with `abins + 1` axis edges and `rbins + 1` radius edges has
/// `(rbins, abins)` bins: rows follow radius, columns semi-major axis.
#[derive(Clone, Debug, PartialEq)]
pub struct BinGrid {
    aedges: Array1<f64>,
    redges: Array1<f64>,
}

fn check_edges(axis: &'static str, edges: &Array1<f64>) -> Result<(), GridError> {
    if edges.len() < 2 {
        return Err(GridError::TooFewEdges { axis, len: edges.len() });
    }
    if !(edges[0] > 0.0 && edges[0].is_finite()) {
        return Err(GridError::NonPositive { axis, value: edges[0] });
    }
    match (1..edges.len()).find(|&i| !(edges[i] > edges[i - 1] && edges[i].is_finite())) {
        Some(index) => Err(GridError::NotIncreasing { axis, index }),
        None => Ok(()),
    }
}

/// `n + 1` log-spaced edges from `lo` to `hi`, with both ends exact.
pub(crate) fn log_edges(lo: f64, hi: f64, n: usize) -> Array1<f64> {
    let mut edges = Array1::logspace(10.0, lo.log10(), hi.log10(), n + 1);
    edges[0] = lo;
    edges[n] = hi;
    edges
}

impl BinGrid {
    pub fn new(aedges: Array1<f64>, redges: Array1<f64>) -> Result<Self, GridError> {
        check_edges("semi-major axis", &aedges)?;
        check_edges("radius", &redges)?;
        Ok(Self { aedges, redges })
    }

    /// Log-spaced grid with `abins` axis bins over `[amin, amax]` and
    /// `rbins` radius bins over `[rmin, rmax]` (all AU).
    pub fn logspace(amin: f64, amax: f64, abins: usize, rmin: f64, rmax: f64, rbins: usize) -> Result<Self, GridError> {
        if abins == 0 {
            return Err(GridError::TooFewEdges { axis: "semi-major axis", len: 1 });
        }
        if rbins == 0 {
            return Err(GridError::TooFewEdges { axis: "radius", len: 1 });
        }
        for (axis, lo) in [("semi-major axis", amin), ("radius", rmin)] {
            if !(lo > 0.0 && lo.is_finite()) {
                return Err(GridError::NonPositive { axis, value: lo });
            }
        }
        Self::new(log_edges(amin, amax, abins), log_edges(rmin, rmax, rbins))
    }

    pub fn aedges(&self) -> ArrayView1<'_, f64> {
        self.aedges.view()
    }

    pub fn redges(&self) -> ArrayView1<'_, f64> {
        self.redges.view()
    }

    pub fn abins(&self) -> usize {
        self.aedges.len() - 1
    }

    pub fn rbins(&self) -> usize {
        self.redges.len() - 1
    }

    /// Shape of a bin grid: `(rbins, abins)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rbins(), self.abins())
    }
}

// ---------------------------------------------------------------------------
// StarRecord
// ---------------------------------------------------------------------------

/// One target star as delivered by the catalog and instrument providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    /// Catalog name, informational only.
    #[serde(default)]
    pub name: String,

    /// Distance in parsecs.
    pub dist: f64,

    /// Smallest observable projected separation, in AU.
    pub smin: f64,

    /// Largest observable projected separation, in AU.
    pub smax: f64,

    /// Integration time allotted to the star, in days.
    pub t_int: f64,

    /// Instrument contrast over working angle for this star's integration
    /// time.
    pub contrast: ContrastCurve,
}

impl StarRecord {
    /// Build a record from the instrument's inner and outer working angles
    /// (arcsec): `smin = tan(IWA)·dist`, `smax = tan(OWA)·dist`.
    pub fn from_working_angles(
        name: impl Into<String>,
        dist: f64,
        iwa: f64,
        owa: f64,
        t_int: f64,
        contrast: ContrastCurve,
    ) -> Self {
        let to_au = |wa: f64| (wa * ARCSEC_TO_RAD).tan() * dist * AU_PER_PARSEC;
        Self {
            name: name.into(),
            dist,
            smin: to_au(iwa),
            smax: to_au(owa),
            t_int,
            contrast,
        }
    }

    /// Whether the scalar fields describe a physically usable star.
    pub fn is_well_formed(&self) -> bool {
        self.dist.is_finite()
            && self.dist > 0.0
            && self.smin.is_finite()
            && self.smin > 0.0
            && self.smax.is_finite()
            && self.smax >= self.smin
            && self.t_int.is_finite()
            && self.t_int >= 0.0
    }
}

// ---------------------------------------------------------------------------
// DosParams
// ---------------------------------------------------------------------------

/// Configuration of a depth-of-search run.
#[cfg_attr(feature = "python", pyo3::pyclass(get_all, set_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DosParams {
    /// Number of semi-major axis bins.
    pub abins: usize,

    /// Number of planetary radius bins.
    pub rbins: usize,

    /// Total integration-time budget of the observing program, in days.
    pub max_time: f64,

    /// Stars needing at least this many days of integration are dropped.
    pub int_cutoff: f64,

    /// Number of rayon worker threads.  Set to 0 to use all available CPU
    /// cores.
    pub n_workers: usize,

    /// Wall-clock limit of the star selection search, in seconds.  `None`
    /// searches until optimality is proven.
    pub time_limit_secs: Option<f64>,
}

impl Default for DosParams {
    fn default() -> Self {
        Self {
            abins: 100,
            rbins: 30,
            max_time: 365.0,
            int_cutoff: 30.0,
            n_workers: 0,
            time_limit_secs: None,
        }
    }
}

impl DosParams {
    pub fn validate(&self) -> Result<(), SurveyError> {
        if self.abins == 0 {
            return Err(SurveyError::InvalidParameter { name: "abins", value: 0.0 });
        }
        if self.rbins == 0 {
            return Err(SurveyError::InvalidParameter { name: "rbins", value: 0.0 });
        }
        if !(self.max_time >= 0.0 && self.max_time.is_finite()) {
            return Err(SurveyError::InvalidParameter { name: "max_time", value: self.max_time });
        }
        if !(self.int_cutoff > 0.0) {
            return Err(SurveyError::InvalidParameter { name: "int_cutoff", value: self.int_cutoff });
        }
        if let Some(limit) = self.time_limit_secs {
            if !(limit >= 0.0 && limit.is_finite()) {
                return Err(SurveyError::InvalidParameter { name: "time_limit_secs", value: limit });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// Planet population parameters supplied by the population provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Semi-major axis range, in AU.
    pub amin: f64,
    pub amax: f64,

    /// Planetary radius range, in Earth radii.
    pub rmin: f64,
    pub rmax: f64,

    /// Expected geometric albedo.
    pub albedo: f64,

    /// Expected planetary radius, in Earth radii.
    pub radius: f64,

    /// Overall occurrence rate (planets per star).
    #[serde(default = "default_eta")]
    pub eta: f64,
}

fn default_eta() -> f64 {
    1.0
}

impl Population {
    /// Check the ranges and clamp the radius range to the supported
    /// extrapolation bounds.
    pub fn validated(&self) -> Result<Population, SurveyError> {
        if !(self.amin > 0.0 && self.amax > self.amin && self.amax.is_finite()) {
            return Err(SurveyError::InvalidAxisRange(self.amin, self.amax));
        }
        if !(self.rmin < MAX_EXTRAPOLATION_RADIUS) {
            return Err(SurveyError::RadiusAboveRange(self.rmin));
        }
        if !(self.rmax > MIN_EXTRAPOLATION_RADIUS) {
            return Err(SurveyError::RadiusBelowRange(self.rmax));
        }

        let mut out = self.clone();
        if out.rmin < MIN_EXTRAPOLATION_RADIUS {
            warn!("Rmin reset to {} R_earth (was {})", MIN_EXTRAPOLATION_RADIUS, out.rmin);
            out.rmin = MIN_EXTRAPOLATION_RADIUS;
        }
        if out.rmax > MAX_EXTRAPOLATION_RADIUS {
            warn!("Rmax reset to {} R_earth (was {})", MAX_EXTRAPOLATION_RADIUS, out.rmax);
            out.rmax = MAX_EXTRAPOLATION_RADIUS;
        }
        if !(out.rmax > out.rmin) {
            return Err(SurveyError::InvalidRadiusRange {
                rmin: out.rmin,
                rmax: out.rmax,
            });
        }

        for (name, value) in [("albedo", out.albedo), ("radius", out.radius)] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SurveyError::InvalidParameter { name, value });
            }
        }
        if !(out.eta >= 0.0 && out.eta.is_finite()) {
            return Err(SurveyError::InvalidParameter { name: "eta", value: out.eta });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Survey
// ---------------------------------------------------------------------------

/// Everything a run consumes from the external providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub population: Population,

    /// Instrument's minimum achievable contrast.  Takes precedence over
    /// `reference_contrast`.
    #[serde(default)]
    pub cmin: Option<f64>,

    /// Detection-mode contrast curve whose minimum is the contrast floor.
    #[serde(default)]
    pub reference_contrast: Option<ContrastCurve>,

    pub stars: Vec<StarRecord>,
}

impl Survey {
    pub fn from_json(s: &str) -> Result<Self, SurveyError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Global contrast floor of the survey.
    pub fn cmin(&self) -> Result<f64, SurveyError> {
        let cmin = match (self.cmin, &self.reference_contrast) {
            (Some(c), _) => c,
            (None, Some(curve)) => curve.min_contrast(),
            (None, None) => return Err(SurveyError::MissingContrastFloor),
        };
        if !(cmin >= 0.0 && cmin.is_finite()) {
            return Err(SurveyError::InvalidParameter { name: "cmin", value: cmin });
        }
        Ok(cmin)
    }
}

// ---------------------------------------------------------------------------
// DosResult
// ---------------------------------------------------------------------------

/// Aggregated output of a depth-of-search run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DosResult {
    /// Number of stars chosen for observation.
    pub num_obs: usize,

    /// Catalog indices (into `Survey::stars`) of the chosen stars.
    pub selected: Vec<usize>,

    /// Names of the chosen stars.
    pub names: Vec<String>,

    /// ck of each chosen star, offset included.
    pub ck: Vec<f64>,

    /// Selection objective `Σ ck`.
    pub objective: f64,

    /// Integration time used by the chosen stars, in days.
    pub total_time: f64,

    /// Semi-major axis bin edges, in AU.
    pub aedges: Array1<f64>,

    /// Planetary radius bin edges, in Earth radii.
    pub redges: Array1<f64>,

    /// Summed depth of search, shape `(rbins, abins)`.
    #[serde(rename = "DoS")]
    pub dos: Array2<f64>,

    /// Expected planets per star in each bin.
    pub occ_rates: Array2<f64>,

    /// Depth of search weighted by occurrence rate.
    #[serde(rename = "DoS_occ")]
    pub dos_occ: Array2<f64>,

    /// Wall-clock processing time, in milliseconds.
    pub processing_time_ms: u64,
}

impl DosResult {
    /// Serialise the result to a JSON string for interoperability.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Expected number of detectable planets: the sum of `DoS_occ`.
    pub fn expected_yield(&self) -> f64 {
        self.dos_occ.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EARTH_RADIUS_AU;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn population() -> Population {
        Population {
            amin: 0.1,
            amax: 30.0,
            rmin: 1.0,
            rmax: 20.0,
            albedo: 0.367,
            radius: 4.0,
            eta: 1.0,
        }
    }

    #[test]
    fn logspace_grid_has_exact_ends() {
        let g = BinGrid::logspace(0.1, 30.0, 100, 0.35 * EARTH_RADIUS_AU, 45.0 * EARTH_RADIUS_AU, 30).unwrap();
        assert_eq!(g.shape(), (30, 100));
        assert_eq!(g.aedges()[0], 0.1);
        assert_eq!(g.aedges()[100], 30.0);
        assert_relative_eq!(g.aedges()[50], (0.1f64 * 30.0).sqrt(), max_relative = 1e-12);
        assert!(g.redges().to_vec().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn grid_rejects_bad_edges() {
        assert!(matches!(
            BinGrid::new(array![1.0], array![1.0, 2.0]),
            Err(GridError::TooFewEdges { len: 1, .. })
        ));
        assert!(matches!(
            BinGrid::new(array![0.0, 1.0], array![1.0, 2.0]),
            Err(GridError::NonPositive { .. })
        ));
        assert!(matches!(
            BinGrid::new(array![1.0, 2.0], array![1.0, 3.0, 3.0]),
            Err(GridError::NotIncreasing { index: 2, .. })
        ));
        assert!(BinGrid::logspace(0.1, 1.0, 0, 1.0, 2.0, 3).is_err());
    }

    #[test]
    fn separations_from_working_angles() {
        let curve = ContrastCurve::flat(0.05, 1.0, 1e-10).unwrap();
        let star = StarRecord::from_working_angles("HIP 1", 10.0, 0.1, 1.0, 2.0, curve);
        // small-angle: 1 arcsec at 1 pc is 1 AU
        assert_relative_eq!(star.smin, 1.0, max_relative = 1e-9);
        assert_relative_eq!(star.smax, 10.0, max_relative = 1e-9);
        assert!(star.is_well_formed());
    }

    #[test]
    fn radius_range_is_clamped() {
        let mut pop = population();
        pop.rmin = 0.1;
        pop.rmax = 60.0;
        let v = pop.validated().unwrap();
        assert_eq!(v.rmin, MIN_EXTRAPOLATION_RADIUS);
        assert_eq!(v.rmax, MAX_EXTRAPOLATION_RADIUS);
    }

    #[test]
    fn population_errors() {
        let mut pop = population();
        pop.rmin = 50.0;
        assert!(matches!(pop.validated(), Err(SurveyError::RadiusAboveRange(_))));

        let mut pop = population();
        pop.rmax = 0.3;
        assert!(matches!(pop.validated(), Err(SurveyError::RadiusBelowRange(_))));

        let mut pop = population();
        pop.rmin = 10.0;
        pop.rmax = 5.0;
        assert!(matches!(pop.validated(), Err(SurveyError::InvalidRadiusRange { .. })));

        let mut pop = population();
        pop.amax = 0.05;
        assert!(matches!(pop.validated(), Err(SurveyError::InvalidAxisRange(..))));
    }

    #[test]
    fn contrast_floor_sources() {
        let curve = ContrastCurve::new(vec![0.1, 0.5, 1.0], vec![1e-9, 2e-10, 5e-10]).unwrap();
        let mut survey = Survey {
            population: population(),
            cmin: None,
            reference_contrast: Some(curve),
            stars: vec![],
        };
        assert_eq!(survey.cmin().unwrap(), 2e-10);

        survey.cmin = Some(1e-10);
        assert_eq!(survey.cmin().unwrap(), 1e-10);

        survey.cmin = None;
        survey.reference_contrast = None;
        assert!(matches!(survey.cmin(), Err(SurveyError::MissingContrastFloor)));
    }

    #[test]
    fn survey_from_json() {
        let doc = r#"{
            "population": {"amin": 0.1, "amax": 30.0, "rmin": 1.0, "rmax": 20.0,
                           "albedo": 0.367, "radius": 4.0},
            "cmin": 1e-10,
            "stars": [{"dist": 10.0, "smin": 1.0, "smax": 10.0, "t_int": 2.0,
                       "contrast": {"working_angles": [0.05, 1.0], "contrast": [1e-10, 1e-10]}}]
        }"#;
        let survey = Survey::from_json(doc).unwrap();
        assert_eq!(survey.population.eta, 1.0);
        assert_eq!(survey.stars.len(), 1);
        assert_eq!(survey.stars[0].name, "");

        assert!(matches!(Survey::from_json("{"), Err(SurveyError::Json(_))));
    }

    #[test]
    fn params_defaults_and_validation() {
        let p: DosParams = serde_json::from_str(r#"{"abins": 10}"#).unwrap();
        assert_eq!(p.abins, 10);
        assert_eq!(p.rbins, 30);
        assert_eq!(p.max_time, 365.0);
        assert!(p.validate().is_ok());

        let bad = DosParams { int_cutoff: 0.0, ..DosParams::default() };
        assert!(matches!(bad.validate(), Err(SurveyError::InvalidParameter { name: "int_cutoff", .. })));
    }
}

//! # depthsearch-core
//!
//! Depth-of-search engine for direct-imaging exoplanet surveys, with
//! optional Python bindings via [PyO3](https://pyo3.rs).
//!
//! ## Overview
//!
//! Given a target catalog and an instrument's contrast performance, the
//! crate estimates over a semi-major-axis × planetary-radius grid how much
//! of the planet population the selected observing program could detect:
//!
//! | Module         | Purpose                                                     |
//! |----------------|-------------------------------------------------------------|
//! | [`visibility`] | Closed-form geometric visibility model and bin averaging    |
//! | [`contrast`]   | Contrast curves and per-star expected contrast floors       |
//! | [`aggregate`]  | Depth of search summed over the observed stars              |
//! | [`quartic`]    | Closed-form roots of the brightness/separation quartic      |
//! | [`ck`]         | Per-star observation value used to rank targets             |
//! | [`selection`]  | Exact time-budgeted star selection (0/1 knapsack)           |
//! | [`occurrence`] | Occurrence-rate grid and occurrence-weighted depth of search |
//! | [`pipeline`]   | End-to-end run from survey to [`DosResult`]                 |
//! | [`quadrature`] | Adaptive Gauss–Kronrod integration                          |
//! | [`types`]      | Shared data structures (grid, stars, population, params)    |
//! | [`constants`]  | Unit conversions and extrapolation bounds                   |
//!
//! ## Rust usage
//!
//! ```no_run
//! use depthsearch_core::{DepthOfSearch, DosParams, Survey};
//!
//! let survey = Survey::from_json(&std::fs::read_to_string("survey.json")?)?;
//! let result = DepthOfSearch::new(DosParams::default()).run(&survey)?;
//! println!("{} stars observed, expected yield {:.3}", result.num_obs, result.expected_yield());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Python usage
//!
//! Built with the `extension-module` feature, the library exposes a Python
//! module called `depthsearch_core`:
//!
//! ```python
//! import depthsearch_core
//!
//! params = depthsearch_core.DosParams(abins=100, rbins=30, max_time=365.0)
//! engine = depthsearch_core.DepthOfSearch(params)
//! result = engine.run(open("survey.json").read())
//!
//! print(result.num_obs, result.objective)
//! ```

pub mod aggregate;
pub mod ck;
pub mod constants;
pub mod contrast;
pub mod occurrence;
pub mod pipeline;
pub mod quadrature;
pub mod quartic;
pub mod selection;
pub mod types;
pub mod visibility;

#[cfg(feature = "python")]
mod python;

// Re-export the most commonly used items at crate root for convenience.
pub use aggregate::dos_sum;
pub use ck::{find_ck, CkError};
pub use contrast::{ContrastCurve, ContrastCurveError};
pub use occurrence::{LogUniformPopulation, PlanetDensity};
pub use pipeline::{DepthOfSearch, DosError};
pub use selection::{select_obs, Selection, SelectionError, StarSelector};
pub use types::{BinGrid, DosParams, DosResult, GridError, Population, StarRecord, Survey, SurveyError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The top-level Python module exposed by this crate.
///
/// Registered classes:
/// - `DepthOfSearch`: the depth-of-search engine
/// - `DosParams`: run configuration
/// - `DosResult`: aggregated run output
///
/// Registered functions: `find_ck`, `select_obs`.
#[cfg(feature = "python")]
#[pymodule]
fn depthsearch_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyDepthOfSearch>()?;
    m.add_class::<DosParams>()?;
    m.add_class::<python::PyDosResult>()?;
    m.add_function(wrap_pyfunction!(python::py_find_ck, m)?)?;
    m.add_function(wrap_pyfunction!(python::py_select_obs, m)?)?;

    // Module-level metadata
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "Depth-of-search engine for direct-imaging exoplanet surveys.")?;

    Ok(())
}

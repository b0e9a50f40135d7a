//! Python bindings, compiled with the `python` feature.
//!
//! Grids cross the boundary as nested lists (row-major, rows follow
//! radius); surveys are passed as JSON documents.

use ndarray::Array2;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::ck;
use crate::pipeline::{DepthOfSearch, DosError};
use crate::selection;
use crate::types::{DosParams, DosResult, Survey};

fn to_py_err(e: DosError) -> PyErr {
    match e {
        DosError::Survey(_) | DosError::Grid(_) => PyValueError::new_err(e.to_string()),
        DosError::Ck(_) | DosError::Selection(_) => PyRuntimeError::new_err(e.to_string()),
    }
}

fn rows(grid: &Array2<f64>) -> Vec<Vec<f64>> {
    grid.outer_iter().map(|row| row.to_vec()).collect()
}

// ---------------------------------------------------------------------------
// DosParams
// ---------------------------------------------------------------------------

#[pymethods]
impl DosParams {
    #[new]
    #[pyo3(signature = (abins=100, rbins=30, max_time=365.0, int_cutoff=30.0, n_workers=0, time_limit_secs=None))]
    pub fn py_new(
        abins: usize,
        rbins: usize,
        max_time: f64,
        int_cutoff: f64,
        n_workers: usize,
        time_limit_secs: Option<f64>,
    ) -> Self {
        Self {
            abins,
            rbins,
            max_time,
            int_cutoff,
            n_workers,
            time_limit_secs,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "DosParams(abins={}, rbins={}, max_time={:.1} d, int_cutoff={:.1} d, workers={})",
            self.abins, self.rbins, self.max_time, self.int_cutoff, self.n_workers,
        )
    }
}

// ---------------------------------------------------------------------------
// DosResult
// ---------------------------------------------------------------------------

/// Result of a depth-of-search run, as seen from Python.
#[pyclass(name = "DosResult")]
pub struct PyDosResult {
    inner: DosResult,
}

#[pymethods]
impl PyDosResult {
    #[getter]
    fn num_obs(&self) -> usize {
        self.inner.num_obs
    }

    #[getter]
    fn selected(&self) -> Vec<usize> {
        self.inner.selected.clone()
    }

    #[getter]
    fn names(&self) -> Vec<String> {
        self.inner.names.clone()
    }

    #[getter]
    fn ck(&self) -> Vec<f64> {
        self.inner.ck.clone()
    }

    #[getter]
    fn objective(&self) -> f64 {
        self.inner.objective
    }

    #[getter]
    fn aedges(&self) -> Vec<f64> {
        self.inner.aedges.to_vec()
    }

    #[getter]
    fn redges(&self) -> Vec<f64> {
        self.inner.redges.to_vec()
    }

    #[getter]
    fn dos(&self) -> Vec<Vec<f64>> {
        rows(&self.inner.dos)
    }

    #[getter]
    fn occ_rates(&self) -> Vec<Vec<f64>> {
        rows(&self.inner.occ_rates)
    }

    #[getter]
    fn dos_occ(&self) -> Vec<Vec<f64>> {
        rows(&self.inner.dos_occ)
    }

    #[getter]
    fn processing_time_ms(&self) -> u64 {
        self.inner.processing_time_ms
    }

    /// Serialise the result to a JSON string for interoperability.
    pub fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "DosResult(num_obs={}, objective={:.4}, grid={:?}, time={}ms)",
            self.inner.num_obs,
            self.inner.objective,
            self.inner.dos.dim(),
            self.inner.processing_time_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// DepthOfSearch
// ---------------------------------------------------------------------------

/// The depth-of-search engine, exposed to Python as `DepthOfSearch`.
#[pyclass(name = "DepthOfSearch")]
pub struct PyDepthOfSearch {
    engine: DepthOfSearch,
}

#[pymethods]
impl PyDepthOfSearch {
    #[new]
    #[pyo3(signature = (params=None))]
    pub fn new(params: Option<DosParams>) -> Self {
        Self {
            engine: DepthOfSearch::new(params.unwrap_or_default()),
        }
    }

    /// Run on a survey given as a JSON document.
    pub fn run(&self, py: Python<'_>, survey_json: &str) -> PyResult<PyDosResult> {
        let survey = Survey::from_json(survey_json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let inner = py
            .allow_threads(|| self.engine.run(&survey))
            .map_err(to_py_err)?;
        Ok(PyDosResult { inner })
    }

    fn __repr__(&self) -> String {
        format!("DepthOfSearch({:?})", self.engine.params())
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// ck of every star; see `ck::find_ck`.  `rexp` is in AU.
#[pyfunction]
#[pyo3(name = "find_ck", signature = (amin, amax, smin, smax, cmin, pexp, rexp, offset=true))]
#[allow(clippy::too_many_arguments)]
pub fn py_find_ck(
    amin: f64,
    amax: f64,
    smin: Vec<f64>,
    smax: Vec<f64>,
    cmin: f64,
    pexp: f64,
    rexp: f64,
    offset: bool,
) -> PyResult<Vec<f64>> {
    let mut values = ck::find_ck(amin, amax, &smin, &smax, cmin, pexp, rexp)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    if offset {
        ck::apply_offset(&mut values);
    }
    Ok(values)
}

/// Optimal star selection: returns `(indices, objective)`.
#[pyfunction]
#[pyo3(name = "select_obs", signature = (t0, max_time, ck, time_limit_secs=None))]
pub fn py_select_obs(
    t0: Vec<f64>,
    max_time: f64,
    ck: Vec<f64>,
    time_limit_secs: Option<f64>,
) -> PyResult<(Vec<usize>, f64)> {
    let mut selector = selection::StarSelector::new();
    if let Some(secs) = time_limit_secs {
        let limit = std::time::Duration::try_from_secs_f64(secs).map_err(|e| PyValueError::new_err(e.to_string()))?;
        selector = selector.with_time_limit(limit);
    }
    let sel = selector.solve(&t0, max_time, &ck).map_err(|e| match e {
        selection::SelectionError::TimeLimitReached { .. } => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    })?;
    Ok((sel.indices, sel.objective))
}

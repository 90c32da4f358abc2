use std::collections::HashMap;
use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use tracing::warn;

use crate::error::ForecastError;
use crate::history::{current_year, EnrollmentHistory};
use crate::planner::{self, HorizonBounds, ProjectionRequest};
use crate::predictor::{PredictionRequest, Predictor};

/// The dashboard-facing model: one process-wide predictor plus one
/// session-scoped set of uploaded enrollment records.
///
/// The predictor is configured once (model artifact or explicit lookup
/// table) and is read-only afterwards. Uploads replace the record set
/// atomically; a rejected upload leaves the previous one active.
#[pyclass]
pub struct ForecastModel {
    base_path: PathBuf,
    predictor: Option<Predictor>,
    history: Option<EnrollmentHistory>,
    default_anchor_year: i32,
    horizon: HorizonBounds,
}

#[pymethods]
impl ForecastModel {
    #[new]
    #[pyo3(signature = (base_path, default_anchor_year=None, min_horizon=1, max_horizon=5))]
    fn new(
        base_path: String,
        default_anchor_year: Option<i32>,
        min_horizon: u32,
        max_horizon: u32,
    ) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
            predictor: None,
            history: None,
            default_anchor_year: default_anchor_year.unwrap_or_else(current_year),
            horizon: HorizonBounds {
                min: min_horizon,
                max: max_horizon,
            },
        }
    }

    // ── Predictor configuration ─────────────────────────────────────────────

    /// Load the serialized model bundle (regressor + fitted encoder state).
    ///
    /// On failure nothing is served: the caller must either retry with a
    /// good artifact or call `use_lookup_table` to degrade explicitly.
    #[pyo3(signature = (filename=None))]
    fn load_artifact(&mut self, filename: Option<&str>) -> PyResult<()> {
        let fname = filename.unwrap_or("enrollment_tree.json");
        let predictor = Predictor::from_artifact(&self.base_path.join(fname))?;
        self.predictor = Some(predictor);
        Ok(())
    }

    /// Serve predictions from a constant strand → count table.
    ///
    /// This is the named degraded mode for deployments without a trained
    /// artifact; switching to it is always an explicit call, never an
    /// automatic fallback.
    fn use_lookup_table(&mut self, table: HashMap<String, f64>) -> PyResult<()> {
        warn!("predictor running in table-backed mode");
        let predictor = Predictor::from_table(table.into_iter().collect())?;
        self.predictor = Some(predictor);
        Ok(())
    }

    // ── Historical records ──────────────────────────────────────────────────

    /// Load enrollment records from a CSV file under the base path.
    ///
    /// Required columns: Strand, YearLevel, and DateEnrolled or Year.
    #[pyo3(signature = (filename=None))]
    fn load_records(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or("enrollment_records.csv");
        let history = EnrollmentHistory::from_csv(&self.base_path.join(fname))?;
        let df = history.records().clone();
        self.history = Some(history);
        Ok(PyDataFrame(df))
    }

    /// Replace the session records with an uploaded, already-parsed table.
    fn set_records(&mut self, records: PyDataFrame) -> PyResult<PyDataFrame> {
        let history = EnrollmentHistory::from_dataframe(records.0)?;
        let df = history.records().clone();
        self.history = Some(history);
        Ok(PyDataFrame(df))
    }

    /// Count records per group-key tuple.
    ///
    /// `group_by`: one or more of Year, Strand, YearLevel, Gender.
    fn aggregate(&self, group_by: Vec<String>) -> PyResult<PyDataFrame> {
        let history = self.history()?;
        Ok(PyDataFrame(history.aggregate(&group_by)?))
    }

    // ── Forecasting ─────────────────────────────────────────────────────────

    /// Point estimate for one (strand, year level) query.
    #[pyo3(signature = (strand, year_level=None))]
    fn predict(&self, strand: String, year_level: Option<String>) -> PyResult<f64> {
        let predictor = self.predictor()?;
        Ok(predictor.predict(&PredictionRequest::new(strand, year_level))?)
    }

    /// Multi-year projection series as a chart-ready DataFrame with
    /// columns year / predicted_total / predicted_male / predicted_female.
    #[pyo3(signature = (strand, year_level=None, horizon_years=3, male_ratio_percent=None))]
    fn project(
        &self,
        strand: String,
        year_level: Option<String>,
        horizon_years: u32,
        male_ratio_percent: Option<i64>,
    ) -> PyResult<PyDataFrame> {
        let predictor = self.predictor()?;
        let anchor = self.anchor(&strand, year_level.as_deref())?;
        let request = ProjectionRequest {
            strand,
            year_level,
            horizon_years,
            male_ratio_percent: male_ratio_percent.map(|r| r.clamp(0, 100) as u8),
        };
        let series = planner::project(&request, anchor, predictor, self.horizon)?;
        Ok(PyDataFrame(planner::series_to_dataframe(&series)?))
    }

    /// First forecast year for a request: latest matching historical year
    /// plus one, or the configured default year without matching history.
    #[pyo3(signature = (strand, year_level=None))]
    fn anchor_year(&self, strand: String, year_level: Option<String>) -> PyResult<i32> {
        Ok(self.anchor(&strand, year_level.as_deref())?)
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn records_df(&self) -> Option<PyDataFrame> {
        self.history
            .as_ref()
            .map(|h| PyDataFrame(h.records().clone()))
    }

    /// "model", "table", or None before configuration.
    #[getter]
    fn predictor_mode(&self) -> Option<&'static str> {
        self.predictor.as_ref().map(Predictor::mode)
    }

    /// Strand codes the active predictor accepts, for UI dropdowns.
    #[getter]
    fn known_strands(&self) -> PyResult<Vec<String>> {
        Ok(self.predictor()?.known_strands())
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl ForecastModel {
    fn predictor(&self) -> Result<&Predictor, ForecastError> {
        self.predictor.as_ref().ok_or_else(|| {
            ForecastError::NotLoaded(
                "predictor (call load_artifact or use_lookup_table first)".into(),
            )
        })
    }

    fn history(&self) -> Result<&EnrollmentHistory, ForecastError> {
        self.history
            .as_ref()
            .ok_or_else(|| ForecastError::NotLoaded("records".into()))
    }

    fn anchor(&self, strand: &str, year_level: Option<&str>) -> Result<i32, ForecastError> {
        match &self.history {
            Some(history) => history.anchor_year(strand, year_level, self.default_anchor_year),
            None => Ok(self.default_anchor_year),
        }
    }
}

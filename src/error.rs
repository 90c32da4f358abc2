use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Artifact load failed: {0}")]
    ArtifactLoad(String),

    #[error("Out of range: {0}")]
    InvalidRange(String),

    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
mod python {
    use super::ForecastError;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::PyErr;

    impl From<ForecastError> for PyErr {
        fn from(err: ForecastError) -> PyErr {
            match &err {
                // Request-shaped errors: bad user input, not a broken process.
                ForecastError::UnknownCategory(_)
                | ForecastError::InvalidRange(_)
                | ForecastError::MissingColumn(_) => PyValueError::new_err(err.to_string()),
                _ => PyRuntimeError::new_err(err.to_string()),
            }
        }
    }

    impl From<PyErr> for ForecastError {
        fn from(err: PyErr) -> Self {
            ForecastError::General(err.to_string())
        }
    }
}

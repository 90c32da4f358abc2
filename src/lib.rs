pub mod error;
pub mod history;
pub mod planner;
pub mod predictor;
pub mod schema;
pub mod split;
pub mod tree;

pub use error::ForecastError;
pub use history::EnrollmentHistory;
pub use planner::{project, HorizonBounds, ProjectionPoint, ProjectionRequest};
pub use predictor::{PredictionRequest, Predictor};

#[cfg(feature = "python")]
mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Record columns
    let records = PyModule::new(m.py(), "records")?;
    records.add("STRAND", schema::records::STRAND)?;
    records.add("YEAR_LEVEL", schema::records::YEAR_LEVEL)?;
    records.add("DATE_ENROLLED", schema::records::DATE_ENROLLED)?;
    records.add("YEAR", schema::records::YEAR)?;
    records.add("GENDER", schema::records::GENDER)?;
    records.add("BIRTHDATE", schema::records::BIRTHDATE)?;
    m.add_submodule(&records)?;

    // Gender values
    let gender = PyModule::new(m.py(), "gender")?;
    gender.add("MALE", schema::gender::MALE)?;
    gender.add("FEMALE", schema::gender::FEMALE)?;
    m.add_submodule(&gender)?;

    // Aggregation
    let aggregate = PyModule::new(m.py(), "aggregate")?;
    aggregate.add("COUNT", schema::aggregate::COUNT)?;
    aggregate.add("DIMENSIONS", schema::aggregate::DIMENSIONS.to_vec())?;
    m.add_submodule(&aggregate)?;

    // Projection series columns
    let projection = PyModule::new(m.py(), "projection")?;
    projection.add("YEAR", schema::projection::YEAR)?;
    projection.add("PREDICTED_TOTAL", schema::projection::PREDICTED_TOTAL)?;
    projection.add("PREDICTED_MALE", schema::projection::PREDICTED_MALE)?;
    projection.add(
        "PREDICTED_FEMALE",
        schema::projection::PREDICTED_FEMALE,
    )?;
    m.add_submodule(&projection)?;

    // Predictor modes
    let predictor_mode = PyModule::new(m.py(), "predictor_mode")?;
    predictor_mode.add("MODEL", schema::predictor_mode::MODEL)?;
    predictor_mode.add("TABLE", schema::predictor_mode::TABLE)?;
    m.add_submodule(&predictor_mode)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::ForecastModel>()?;
    add_schema_exports(m)?;
    Ok(())
}

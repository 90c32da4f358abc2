use polars::prelude::*;

use crate::error::ForecastError;
use crate::predictor::{PredictionRequest, Predictor};
use crate::schema::projection;
use crate::split::{split, DEFAULT_MALE_RATIO};

/// Allowed projection horizon, in years.
///
/// The 1-5 default is a classroom-planning window, a product decision
/// rather than a technical limit, so deployments can widen it.
#[derive(Debug, Clone, Copy)]
pub struct HorizonBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for HorizonBounds {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

impl HorizonBounds {
    pub fn check(&self, horizon_years: u32) -> Result<(), ForecastError> {
        if horizon_years < self.min || horizon_years > self.max {
            return Err(ForecastError::InvalidRange(format!(
                "projection horizon {horizon_years} outside [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// One forecast query, as it arrives from the dashboard.
#[derive(Debug, Clone)]
pub struct ProjectionRequest {
    pub strand: String,
    pub year_level: Option<String>,
    pub horizon_years: u32,
    /// Clamped to [0, 100] by the caller; even split when absent.
    pub male_ratio_percent: Option<u8>,
}

/// One forecast year. Read-only once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionPoint {
    pub year: i32,
    pub predicted_total: f64,
    pub predicted_male: f64,
    pub predicted_female: f64,
}

/// Forecast `horizon_years` consecutive years starting at `anchor_year`.
///
/// The predictor is called once per target year. A predictor that does not
/// condition on the year yields a flat series; that flatness is a property
/// of the underlying model and is passed through untouched, never dressed
/// up with artificial growth.
pub fn project(
    request: &ProjectionRequest,
    anchor_year: i32,
    predictor: &Predictor,
    bounds: HorizonBounds,
) -> Result<Vec<ProjectionPoint>, ForecastError> {
    bounds.check(request.horizon_years)?;

    let ratio = request.male_ratio_percent.unwrap_or(DEFAULT_MALE_RATIO);
    let prediction = PredictionRequest::new(request.strand.clone(), request.year_level.clone());

    let mut series = Vec::with_capacity(request.horizon_years as usize);
    for i in 0..request.horizon_years {
        let year = anchor_year + i as i32;
        let total = predictor.predict(&prediction)?;
        let (male, female) = split(total, ratio);
        series.push(ProjectionPoint {
            year,
            predicted_total: total,
            predicted_male: male,
            predicted_female: female,
        });
    }

    Ok(series)
}

/// Shape a projection series into a chart-ready frame for the dashboard.
pub fn series_to_dataframe(series: &[ProjectionPoint]) -> Result<DataFrame, ForecastError> {
    let years: Vec<i32> = series.iter().map(|p| p.year).collect();
    let totals: Vec<f64> = series.iter().map(|p| p.predicted_total).collect();
    let males: Vec<f64> = series.iter().map(|p| p.predicted_male).collect();
    let females: Vec<f64> = series.iter().map(|p| p.predicted_female).collect();

    let df = DataFrame::new(vec![
        Column::new(projection::YEAR.into(), years),
        Column::new(projection::PREDICTED_TOTAL.into(), totals),
        Column::new(projection::PREDICTED_MALE.into(), males),
        Column::new(projection::PREDICTED_FEMALE.into(), females),
    ])?;

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stem_table() -> Predictor {
        Predictor::from_table(BTreeMap::from([("SHS-STEM".to_string(), 922.0)])).unwrap()
    }

    fn request(horizon: u32) -> ProjectionRequest {
        ProjectionRequest {
            strand: "SHS-STEM".to_string(),
            year_level: None,
            horizon_years: horizon,
            male_ratio_percent: None,
        }
    }

    #[test]
    fn table_backed_series_is_flat_and_contiguous() {
        let series = project(&request(3), 2025, &stem_table(), HorizonBounds::default()).unwrap();
        let flat: Vec<(i32, f64)> = series.iter().map(|p| (p.year, p.predicted_total)).collect();
        assert_eq!(flat, vec![(2025, 922.0), (2026, 922.0), (2027, 922.0)]);
    }

    #[test]
    fn series_length_matches_horizon() {
        for horizon in 1..=5 {
            let series =
                project(&request(horizon), 2025, &stem_table(), HorizonBounds::default()).unwrap();
            assert_eq!(series.len(), horizon as usize);
            for (i, point) in series.iter().enumerate() {
                assert_eq!(point.year, 2025 + i as i32);
            }
        }
    }

    #[test]
    fn horizon_outside_bounds_is_rejected() {
        for horizon in [0, 6] {
            let err = project(&request(horizon), 2025, &stem_table(), HorizonBounds::default())
                .unwrap_err();
            assert!(matches!(err, ForecastError::InvalidRange(_)));
        }
    }

    #[test]
    fn bounds_are_configurable() {
        let wide = HorizonBounds { min: 1, max: 10 };
        let series = project(&request(10), 2025, &stem_table(), wide).unwrap();
        assert_eq!(series.len(), 10);
    }

    #[test]
    fn gender_split_does_not_alter_total() {
        let req = ProjectionRequest {
            male_ratio_percent: Some(65),
            ..request(2)
        };
        let series = project(&req, 2025, &stem_table(), HorizonBounds::default()).unwrap();
        for point in &series {
            assert_eq!(point.predicted_total, 922.0);
            assert_eq!(point.predicted_male + point.predicted_female, 922.0);
            assert_eq!(point.predicted_male, 922.0 * 65.0 / 100.0);
        }
    }

    #[test]
    fn default_ratio_is_an_even_split() {
        let series = project(&request(1), 2025, &stem_table(), HorizonBounds::default()).unwrap();
        assert_eq!(series[0].predicted_male, 461.0);
        assert_eq!(series[0].predicted_female, 461.0);
    }

    #[test]
    fn unknown_strand_yields_no_partial_series() {
        let req = ProjectionRequest {
            strand: "UNKNOWN".to_string(),
            ..request(3)
        };
        let result = project(&req, 2025, &stem_table(), HorizonBounds::default());
        assert!(matches!(result, Err(ForecastError::UnknownCategory(_))));
    }

    #[test]
    fn series_frame_is_chart_ready() {
        use crate::schema::projection;

        let series = project(&request(3), 2025, &stem_table(), HorizonBounds::default()).unwrap();
        let df = series_to_dataframe(&series).unwrap();
        assert_eq!(df.height(), 3);
        let years = df.column(projection::YEAR).unwrap().i32().unwrap();
        assert_eq!(years.get(0), Some(2025));
        let totals = df.column(projection::PREDICTED_TOTAL).unwrap().f64().unwrap();
        assert_eq!(totals.get(2), Some(922.0));
    }
}

use std::path::Path;

use chrono::Datelike;
use polars::datatypes::TimeUnit;
use polars::prelude::StrptimeOptions;
use polars::prelude::*;
use tracing::info;

use crate::error::ForecastError;
use crate::schema::{aggregate, records};

/// Date format expected in the `DateEnrolled` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fallback anchor when no historical data matches a request: the current
/// calendar year (several deployments pin this to a constant instead).
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// One session's uploaded enrollment records.
///
/// Records are immutable once loaded; a new upload builds a fresh
/// `EnrollmentHistory` and replaces the old one wholesale.
#[derive(Debug, Clone)]
pub struct EnrollmentHistory {
    records: DataFrame,
}

impl EnrollmentHistory {
    /// Load records from a CSV file (all columns read as strings, column
    /// names trimmed).
    ///
    /// Required columns: `Strand`, `YearLevel`, and one of `DateEnrolled`
    /// (dates formatted `%Y-%m-%d`) or `Year`. Optional columns `Gender`
    /// and `Birthdate` are kept; a missing `Gender` column is materialized
    /// as nulls.
    pub fn from_csv(path: &Path) -> Result<Self, ForecastError> {
        let raw = read_csv_as_strings(path)?;
        let history = Self::from_dataframe(raw)?;
        info!(path = %path.display(), rows = history.len(), "loaded enrollment records");
        Ok(history)
    }

    /// Ingest an already-parsed record table (e.g. a dashboard upload).
    ///
    /// Applies the same schema checks as `from_csv` and derives `Year`
    /// from `DateEnrolled` when no explicit `Year` column is present.
    pub fn from_dataframe(mut df: DataFrame) -> Result<Self, ForecastError> {
        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;

        require_columns(&df, &[records::STRAND, records::YEAR_LEVEL])?;

        let schema = df.schema();
        let has_year = schema.contains(records::YEAR);
        let has_date = schema.contains(records::DATE_ENROLLED);
        if !has_year && !has_date {
            return Err(ForecastError::MissingColumn(format!(
                "{} or {}",
                records::DATE_ENROLLED,
                records::YEAR
            )));
        }
        let year_is_string = schema
            .get(records::YEAR)
            .map(|dtype| dtype == &DataType::String)
            .unwrap_or(false);
        let date_is_string = schema
            .get(records::DATE_ENROLLED)
            .map(|dtype| dtype == &DataType::String)
            .unwrap_or(false);
        let has_gender = schema.contains(records::GENDER);
        let raw_year_nulls = if has_year {
            df.column(records::YEAR)?.null_count()
        } else {
            0
        };

        let mut lazy = df.lazy();

        if has_year {
            let year = if year_is_string {
                col(records::YEAR).str().strip_chars(lit(" \t\r\n"))
            } else {
                col(records::YEAR)
            };
            lazy = lazy.with_columns([year.cast(DataType::Int32)]);
        } else {
            if date_is_string {
                lazy = lazy.with_columns([parse_date_expr(records::DATE_ENROLLED, DATE_FORMAT)]);
            }
            lazy = lazy.with_columns([col(records::DATE_ENROLLED)
                .dt()
                .year()
                .alias(records::YEAR)]);
        }

        if !has_gender {
            lazy = lazy.with_columns([lit(NULL).cast(DataType::String).alias(records::GENDER)]);
        }

        let records = lazy.collect()?;

        // The cast to Int32 nulls out values it cannot parse; a corrupt
        // year must reject the upload, not quietly drop the row from
        // anchor-year computation.
        if has_year {
            let year_nulls = records.column(records::YEAR)?.null_count();
            if year_nulls > raw_year_nulls {
                return Err(ForecastError::InvalidData(format!(
                    "{} non-numeric value(s) in '{}' column",
                    year_nulls - raw_year_nulls,
                    records::YEAR
                )));
            }
        }

        Ok(Self { records })
    }

    /// Count records per group-key tuple.
    ///
    /// `group_by` is one or more of {Year, Strand, YearLevel, Gender}.
    /// The output is sorted by the group columns, so the same record set
    /// yields an identical frame regardless of input row order. Group keys
    /// with no matching records are simply absent; a lookup must treat
    /// absence as zero.
    pub fn aggregate(&self, group_by: &[String]) -> Result<DataFrame, ForecastError> {
        if group_by.is_empty() {
            return Err(ForecastError::InvalidData(
                "aggregate requires at least one group dimension".into(),
            ));
        }
        for dim in group_by {
            if !aggregate::DIMENSIONS.contains(&dim.as_str()) {
                return Err(ForecastError::InvalidData(format!(
                    "unsupported group dimension '{dim}'; expected one of {:?}",
                    aggregate::DIMENSIONS
                )));
            }
        }

        let group_cols: Vec<Expr> = group_by.iter().map(|c| col(c.as_str())).collect();
        let df = self
            .records
            .clone()
            .lazy()
            .group_by(group_cols)
            .agg([len().cast(DataType::Int64).alias(aggregate::COUNT)])
            .sort(
                group_by.iter().map(String::as_str).collect::<Vec<_>>(),
                SortMultipleOptions::default(),
            )
            .collect()?;

        Ok(df)
    }

    /// Latest enrollment year on record for a strand (optionally narrowed
    /// to one year level). `None` when no rows match.
    pub fn latest_year(
        &self,
        strand: &str,
        year_level: Option<&str>,
    ) -> Result<Option<i32>, ForecastError> {
        let mut lazy = self
            .records
            .clone()
            .lazy()
            .filter(col(records::STRAND).eq(lit(strand)));
        if let Some(level) = year_level {
            lazy = lazy.filter(col(records::YEAR_LEVEL).eq(lit(level)));
        }

        let df = lazy.select([col(records::YEAR).max()]).collect()?;
        let years = df.column(records::YEAR)?.i32()?;
        Ok(years.get(0))
    }

    /// First forecast year: latest matching historical year + 1, or the
    /// supplied default when the history has nothing for this request.
    pub fn anchor_year(
        &self,
        strand: &str,
        year_level: Option<&str>,
        default_year: i32,
    ) -> Result<i32, ForecastError> {
        Ok(self
            .latest_year(strand, year_level)?
            .map(|latest| latest + 1)
            .unwrap_or(default_year))
    }

    pub fn len(&self) -> usize {
        self.records.height()
    }

    pub fn is_empty(&self) -> bool {
        self.records.height() == 0
    }

    pub fn records(&self) -> &DataFrame {
        &self.records
    }
}

/// Read a CSV file with all columns as String dtype.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame, ForecastError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), ForecastError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(ForecastError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Parse a string column to Datetime using the given format string.
fn parse_date_expr(column: &str, format: &str) -> Expr {
    col(column)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .str()
        .to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            StrptimeOptions {
                format: Some(format.into()),
                strict: true,
                ..Default::default()
            },
            lit("raise"),
        )
}

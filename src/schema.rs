/// Column-name and category constants for the enrollment schema.
/// Single source of truth - exported to Python via PyO3.

// ── Enrollment record columns ───────────────────────────────────────────────
pub mod records {
    pub const STRAND: &str = "Strand";
    pub const YEAR_LEVEL: &str = "YearLevel";
    pub const DATE_ENROLLED: &str = "DateEnrolled";
    pub const YEAR: &str = "Year";
    pub const GENDER: &str = "Gender";
    pub const BIRTHDATE: &str = "Birthdate";
}

// ── Gender values ───────────────────────────────────────────────────────────
pub mod gender {
    pub const MALE: &str = "Male";
    pub const FEMALE: &str = "Female";
}

// ── Aggregation dimensions and output ───────────────────────────────────────
pub mod aggregate {
    use super::records;

    pub const COUNT: &str = "count";

    /// Dimensions accepted as group-by keys.
    pub const DIMENSIONS: [&str; 4] = [
        records::YEAR,
        records::STRAND,
        records::YEAR_LEVEL,
        records::GENDER,
    ];
}

// ── Projection series columns ───────────────────────────────────────────────
pub mod projection {
    pub const YEAR: &str = "year";
    pub const PREDICTED_TOTAL: &str = "predicted_total";
    pub const PREDICTED_MALE: &str = "predicted_male";
    pub const PREDICTED_FEMALE: &str = "predicted_female";
}

// ── Predictor modes ─────────────────────────────────────────────────────────
pub mod predictor_mode {
    pub const MODEL: &str = "model";
    pub const TABLE: &str = "table";
}

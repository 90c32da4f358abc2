use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ForecastError;
use crate::schema::predictor_mode;
use crate::tree::{RegressionTree, TreeSpec};

/// How the model encodes the year-level feature.
///
/// This is a configuration-time contract pinned inside the artifact: the
/// deployed variants disagree on whether year level is one-hot labels, a
/// numeric ordinal, or dropped entirely, and the encoding used at predict
/// time must be the one the regressor was fit with.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum YearLevelEncoding {
    /// One-hot over string labels, e.g. ["Grade 11", "Grade 12"].
    Label { categories: Vec<String> },
    /// Single numeric feature (1 / 2).
    Ordinal,
    /// The model was fit without a year-level feature.
    Unused,
}

/// Fitted one-hot encoder state, persisted together with the regressor.
///
/// Feature layout: year-level features first (if any), then one column per
/// strand category, in the stored order.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEncoder {
    pub year_level: YearLevelEncoding,
    pub strand_categories: Vec<String>,
}

impl CategoryEncoder {
    pub fn n_features(&self) -> usize {
        let year_level_width = match &self.year_level {
            YearLevelEncoding::Label { categories } => categories.len(),
            YearLevelEncoding::Ordinal => 1,
            YearLevelEncoding::Unused => 0,
        };
        year_level_width + self.strand_categories.len()
    }

    /// Encode a request into the model's feature vector.
    pub fn encode(&self, request: &PredictionRequest) -> Result<Vec<f64>, ForecastError> {
        let mut features = Vec::with_capacity(self.n_features());

        match &self.year_level {
            YearLevelEncoding::Label { categories } => {
                let level = request.year_level.as_deref().ok_or_else(|| {
                    ForecastError::UnknownCategory("year level is required".into())
                })?;
                let hit = categories.iter().position(|c| c == level).ok_or_else(|| {
                    ForecastError::UnknownCategory(format!("year level '{level}'"))
                })?;
                for i in 0..categories.len() {
                    features.push(if i == hit { 1.0 } else { 0.0 });
                }
            }
            YearLevelEncoding::Ordinal => {
                let level = request.year_level.as_deref().ok_or_else(|| {
                    ForecastError::UnknownCategory("year level is required".into())
                })?;
                let ordinal: f64 = level.trim().parse().map_err(|_| {
                    ForecastError::UnknownCategory(format!("year level '{level}' is not numeric"))
                })?;
                features.push(ordinal);
            }
            YearLevelEncoding::Unused => {}
        }

        let hit = self
            .strand_categories
            .iter()
            .position(|c| c == &request.strand)
            .ok_or_else(|| {
                ForecastError::UnknownCategory(format!("strand '{}'", request.strand))
            })?;
        for i in 0..self.strand_categories.len() {
            features.push(if i == hit { 1.0 } else { 0.0 });
        }

        Ok(features)
    }

    /// One request that must succeed against a well-formed model, built
    /// from the encoder's own categories.
    fn sample_request(&self) -> Result<PredictionRequest, ForecastError> {
        let strand = self
            .strand_categories
            .first()
            .cloned()
            .ok_or_else(|| ForecastError::InvalidData("encoder has no strand categories".into()))?;
        let year_level = match &self.year_level {
            YearLevelEncoding::Label { categories } => Some(
                categories
                    .first()
                    .cloned()
                    .ok_or_else(|| {
                        ForecastError::InvalidData("encoder has no year-level categories".into())
                    })?,
            ),
            YearLevelEncoding::Ordinal => Some("1".to_string()),
            YearLevelEncoding::Unused => None,
        };
        Ok(PredictionRequest { strand, year_level })
    }
}

/// One prediction query: a strand and, when the model consumes it, a
/// year level in whatever encoding the model expects.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub strand: String,
    pub year_level: Option<String>,
}

impl PredictionRequest {
    pub fn new(strand: impl Into<String>, year_level: Option<String>) -> Self {
        Self {
            strand: strand.into(),
            year_level,
        }
    }
}

/// On-disk model bundle: encoder state and tree arrays together, so the
/// predict-time feature layout can never drift from the fit-time one.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactBundle {
    pub encoder: CategoryEncoder,
    pub tree: TreeSpec,
}

/// The process-wide prediction resource.
///
/// Loaded once, read-only thereafter. The two modes are explicit: running
/// from a constant table is a visible, deliberate configuration, not a
/// silent code-path swap after a failed model load.
#[derive(Debug, Clone)]
pub enum Predictor {
    ModelBacked {
        encoder: CategoryEncoder,
        tree: RegressionTree,
    },
    TableBacked {
        table: BTreeMap<String, f64>,
    },
}

impl Predictor {
    /// Load a model bundle from a JSON artifact file.
    ///
    /// Any failure — missing file, malformed JSON, inconsistent tree,
    /// encoder/tree feature-count mismatch, failing self-check — is an
    /// `ArtifactLoad` error. The caller decides whether to fall back to
    /// `from_table` or refuse to serve predictions.
    pub fn from_artifact(path: &Path) -> Result<Self, ForecastError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "model artifact unreadable");
            ForecastError::ArtifactLoad(format!("{}: {e}", path.display()))
        })?;
        let bundle: ArtifactBundle = serde_json::from_str(&raw).map_err(|e| {
            warn!(path = %path.display(), error = %e, "model artifact malformed");
            ForecastError::ArtifactLoad(format!("{}: {e}", path.display()))
        })?;
        let predictor = Self::from_bundle(bundle)?;
        info!(path = %path.display(), "loaded model artifact");
        Ok(predictor)
    }

    /// Build a model-backed predictor from a parsed bundle and self-check it.
    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self, ForecastError> {
        let tree = RegressionTree::from_spec(bundle.tree)
            .map_err(|e| ForecastError::ArtifactLoad(e.to_string()))?;

        if bundle.encoder.n_features() != tree.n_features() {
            return Err(ForecastError::ArtifactLoad(format!(
                "encoder produces {} features but tree expects {}",
                bundle.encoder.n_features(),
                tree.n_features()
            )));
        }

        // Startup self-check: an encoding mismatch is a configuration
        // defect and must surface here, not at request time.
        let sample = bundle.encoder.sample_request()?;
        let predictor = Self::ModelBacked {
            encoder: bundle.encoder,
            tree,
        };
        let value = predictor
            .predict(&sample)
            .map_err(|e| ForecastError::ArtifactLoad(format!("self-check failed: {e}")))?;
        if !value.is_finite() {
            return Err(ForecastError::ArtifactLoad(format!(
                "self-check produced non-finite prediction {value}"
            )));
        }

        Ok(predictor)
    }

    /// Build a table-backed predictor from a constant strand → count map.
    pub fn from_table(table: BTreeMap<String, f64>) -> Result<Self, ForecastError> {
        if table.is_empty() {
            return Err(ForecastError::InvalidData("empty lookup table".into()));
        }
        for (strand, value) in &table {
            if !value.is_finite() || *value < 0.0 {
                return Err(ForecastError::InvalidData(format!(
                    "lookup value for '{strand}' must be a non-negative number, got {value}"
                )));
            }
        }
        info!(strands = table.len(), "table-backed predictor configured");
        Ok(Self::TableBacked { table })
    }

    /// Estimated enrollment for one (strand, year level) query.
    ///
    /// The result is a non-negative expected value; fractional counts are
    /// valid and truncation is left to the display layer.
    pub fn predict(&self, request: &PredictionRequest) -> Result<f64, ForecastError> {
        match self {
            Self::TableBacked { table } => table
                .get(&request.strand)
                .copied()
                .ok_or_else(|| {
                    ForecastError::UnknownCategory(format!("strand '{}'", request.strand))
                }),
            Self::ModelBacked { encoder, tree } => {
                let features = encoder.encode(request)?;
                Ok(tree.predict(&features).max(0.0))
            }
        }
    }

    /// The closed set of strand codes this predictor accepts.
    pub fn known_strands(&self) -> Vec<String> {
        match self {
            Self::ModelBacked { encoder, .. } => encoder.strand_categories.clone(),
            Self::TableBacked { table } => table.keys().cloned().collect(),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::ModelBacked { .. } => predictor_mode::MODEL,
            Self::TableBacked { .. } => predictor_mode::TABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_predictor() -> Predictor {
        let table = BTreeMap::from([
            ("STEM".to_string(), 922.0),
            ("ABM".to_string(), 73.0),
            ("HUMSS".to_string(), 210.0),
            ("TVL".to_string(), 145.0),
        ]);
        Predictor::from_table(table).unwrap()
    }

    #[test]
    fn table_lookup_ignores_year_level() {
        let predictor = table_predictor();
        let grade11 = PredictionRequest::new("STEM", Some("Grade 11".into()));
        let grade12 = PredictionRequest::new("STEM", Some("Grade 12".into()));
        let none = PredictionRequest::new("STEM", None);
        assert_eq!(predictor.predict(&grade11).unwrap(), 922.0);
        assert_eq!(predictor.predict(&grade12).unwrap(), 922.0);
        assert_eq!(predictor.predict(&none).unwrap(), 922.0);
    }

    #[test]
    fn unknown_strand_is_rejected() {
        let predictor = table_predictor();
        let request = PredictionRequest::new("UNKNOWN", None);
        let err = predictor.predict(&request).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownCategory(_)));
    }

    #[test]
    fn negative_table_value_rejected() {
        let table = BTreeMap::from([("STEM".to_string(), -1.0)]);
        assert!(Predictor::from_table(table).is_err());
    }

    #[test]
    fn empty_table_rejected() {
        assert!(Predictor::from_table(BTreeMap::new()).is_err());
    }

    fn bundle_json() -> &'static str {
        // Strand one-hot after the two year-level label columns; splits on
        // the STEM indicator (feature 3).
        r#"{
            "encoder": {
                "year_level": {"mode": "label", "categories": ["Grade 11", "Grade 12"]},
                "strand_categories": ["ABM", "STEM"]
            },
            "tree": {
                "feature": [3, -2, -2],
                "threshold": [0.5, -2.0, -2.0],
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "value": [497.5, 73.0, 922.0],
                "n_features": 4
            }
        }"#
    }

    #[test]
    fn model_backed_predicts_per_strand() {
        let bundle: ArtifactBundle = serde_json::from_str(bundle_json()).unwrap();
        let predictor = Predictor::from_bundle(bundle).unwrap();
        assert_eq!(predictor.mode(), "model");

        let stem = PredictionRequest::new("STEM", Some("Grade 11".into()));
        let abm = PredictionRequest::new("ABM", Some("Grade 12".into()));
        assert_eq!(predictor.predict(&stem).unwrap(), 922.0);
        assert_eq!(predictor.predict(&abm).unwrap(), 73.0);
    }

    #[test]
    fn model_backed_requires_year_level() {
        let bundle: ArtifactBundle = serde_json::from_str(bundle_json()).unwrap();
        let predictor = Predictor::from_bundle(bundle).unwrap();
        let request = PredictionRequest::new("STEM", None);
        assert!(matches!(
            predictor.predict(&request),
            Err(ForecastError::UnknownCategory(_))
        ));
    }

    #[test]
    fn ordinal_year_level_must_be_numeric() {
        let json = r#"{
            "encoder": {
                "year_level": {"mode": "ordinal"},
                "strand_categories": ["STEM"]
            },
            "tree": {
                "feature": [0, -2, -2],
                "threshold": [1.5, -2.0, -2.0],
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "value": [500.0, 450.0, 550.0],
                "n_features": 2
            }
        }"#;
        let bundle: ArtifactBundle = serde_json::from_str(json).unwrap();
        let predictor = Predictor::from_bundle(bundle).unwrap();

        let grade11 = PredictionRequest::new("STEM", Some("1".into()));
        let grade12 = PredictionRequest::new("STEM", Some("2".into()));
        assert_eq!(predictor.predict(&grade11).unwrap(), 450.0);
        assert_eq!(predictor.predict(&grade12).unwrap(), 550.0);

        let label = PredictionRequest::new("STEM", Some("Grade 11".into()));
        assert!(matches!(
            predictor.predict(&label),
            Err(ForecastError::UnknownCategory(_))
        ));
    }

    #[test]
    fn feature_count_mismatch_fails_load() {
        let json = r#"{
            "encoder": {
                "year_level": {"mode": "unused"},
                "strand_categories": ["STEM", "ABM"]
            },
            "tree": {
                "feature": [-2],
                "threshold": [-2.0],
                "children_left": [-1],
                "children_right": [-1],
                "value": [100.0],
                "n_features": 5
            }
        }"#;
        let bundle: ArtifactBundle = serde_json::from_str(json).unwrap();
        let err = Predictor::from_bundle(bundle).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactLoad(_)));
    }

    #[test]
    fn missing_artifact_file_is_artifact_load() {
        let err = Predictor::from_artifact(Path::new("/nonexistent/bundle.json")).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactLoad(_)));
    }

    #[test]
    fn artifact_roundtrip_from_disk() {
        let path = std::env::temp_dir().join("shs-forecast-test-bundle.json");
        std::fs::write(&path, bundle_json()).unwrap();
        let predictor = Predictor::from_artifact(&path).unwrap();
        let request = PredictionRequest::new("STEM", Some("Grade 12".into()));
        assert_eq!(predictor.predict(&request).unwrap(), 922.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn known_strands_is_the_closed_set() {
        let predictor = table_predictor();
        assert_eq!(predictor.known_strands(), vec!["ABM", "HUMSS", "STEM", "TVL"]);
        assert_eq!(predictor.mode(), "table");
    }
}

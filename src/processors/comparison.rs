//! Comparison of lidar-derived slopes with an external shoreline model.
//!
//! Model runs are exported as a flat map from string key to numeric
//! sequence. Only two keys are read: per-transect model slopes and the
//! whitewater cross-shore distance for each model transect.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::regression::TransectFit;

/// Key holding the model's slope for each transect.
pub const MODEL_SLOPES_KEY: &str = "slopes_by70thTransect";
/// Key holding the model's whitewater cross-shore distances per transect.
pub const WHITEWATER_KEY: &str = "whitewater_crossshore_distances_byTransect";

/// Errors raised while reading or comparing a model bundle.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("failed to read model bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model bundle {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model bundle has no '{0}' entry")]
    MissingKey(String),

    #[error("no usable slopes on the {0} side")]
    NoSlopes(&'static str),
}

/// Numeric result bundle from one model run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelBundle {
    entries: BTreeMap<String, Vec<f64>>,
}

impl ModelBundle {
    pub fn from_entries(entries: BTreeMap<String, Vec<f64>>) -> Self {
        Self { entries }
    }

    /// Load a bundle exported as a JSON object of numeric arrays.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, ComparisonError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ComparisonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ComparisonError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Result<&[f64], ComparisonError> {
        self.entries
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| ComparisonError::MissingKey(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn model_slopes(&self) -> Result<&[f64], ComparisonError> {
        self.get(MODEL_SLOPES_KEY)
    }

    pub fn whitewater_distances(&self) -> Result<&[f64], ComparisonError> {
        self.get(WHITEWATER_KEY)
    }

    /// Number of model transects, taken from the whitewater distances.
    pub fn transect_count(&self) -> Option<usize> {
        self.whitewater_distances().ok().map(<[f64]>::len)
    }
}

/// Arithmetic mean of the finite values, if any.
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Summary of lidar versus model slopes.
///
/// Means are taken over slope magnitudes: the survey frame and the model may
/// use opposite cross-shore sign conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlopeComparison {
    pub lidar_mean: f64,
    pub model_mean: f64,
    /// `lidar_mean - model_mean`.
    pub difference: f64,
    pub lidar_count: usize,
    pub model_count: usize,
    pub model_transect_count: Option<usize>,
}

/// Compare successful per-transect lidar fits with the model's slopes.
pub fn compare_slopes(
    lidar_fits: &[TransectFit],
    bundle: &ModelBundle,
) -> Result<SlopeComparison, ComparisonError> {
    let lidar: Vec<f64> = lidar_fits.iter().filter_map(TransectFit::slope).map(f64::abs).collect();
    let model: Vec<f64> = bundle.model_slopes()?.iter().map(|s| s.abs()).collect();

    let lidar_mean = finite_mean(&lidar).ok_or(ComparisonError::NoSlopes("lidar"))?;
    let model_mean = finite_mean(&model).ok_or(ComparisonError::NoSlopes("model"))?;

    Ok(SlopeComparison {
        lidar_mean,
        model_mean,
        difference: lidar_mean - model_mean,
        lidar_count: lidar.iter().filter(|v| v.is_finite()).count(),
        model_count: model.iter().filter(|v| v.is_finite()).count(),
        model_transect_count: bundle.transect_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::regression::{linregress, DegenerateTransectError, RegressionError};
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn bundle_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_bundle() {
        let file = bundle_file(
            r#"{"slopes_by70thTransect": [0.02, 0.03, 0.025],
                "whitewater_crossshore_distances_byTransect": [120.0, 135.5]}"#,
        );
        let bundle = ModelBundle::from_json(file.path()).unwrap();

        assert_eq!(bundle.model_slopes().unwrap(), &[0.02, 0.03, 0.025]);
        assert_eq!(bundle.transect_count(), Some(2));
        assert_eq!(bundle.keys().count(), 2);
    }

    #[test]
    fn test_missing_key() {
        let bundle = ModelBundle::default();
        assert!(matches!(
            bundle.model_slopes(),
            Err(ComparisonError::MissingKey(key)) if key == MODEL_SLOPES_KEY
        ));
        assert_eq!(bundle.transect_count(), None);
    }

    #[test]
    fn test_malformed_bundle() {
        let file = bundle_file("{\"slopes_by70thTransect\": \"nope\"}");
        assert!(matches!(
            ModelBundle::from_json(file.path()),
            Err(ComparisonError::Parse { .. })
        ));
    }

    #[test]
    fn test_compare_uses_magnitudes_and_skips_failed_fits() {
        let mut entries = BTreeMap::new();
        entries.insert(MODEL_SLOPES_KEY.to_string(), vec![0.02, 0.04, f64::NAN]);
        let bundle = ModelBundle::from_entries(entries);

        let fits = vec![
            TransectFit {
                transect_id: 0,
                point_count: 3,
                result: Ok(linregress(&[0.0, 10.0, 20.0], &[0.0, -0.5, -1.0]).unwrap()),
            },
            TransectFit {
                transect_id: 1,
                point_count: 0,
                result: Err(DegenerateTransectError {
                    transect_id: 1,
                    source: RegressionError::TooFewPoints(0),
                }),
            },
        ];

        let cmp = compare_slopes(&fits, &bundle).unwrap();
        assert_relative_eq!(cmp.lidar_mean, 0.05, epsilon = 1e-12);
        assert_relative_eq!(cmp.model_mean, 0.03, epsilon = 1e-12);
        assert_relative_eq!(cmp.difference, 0.02, epsilon = 1e-12);
        assert_eq!(cmp.lidar_count, 1);
        assert_eq!(cmp.model_count, 2);
    }

    #[test]
    fn test_compare_without_lidar_slopes() {
        let mut entries = BTreeMap::new();
        entries.insert(MODEL_SLOPES_KEY.to_string(), vec![0.02]);
        let bundle = ModelBundle::from_entries(entries);

        assert!(matches!(
            compare_slopes(&[], &bundle),
            Err(ComparisonError::NoSlopes("lidar"))
        ));
    }
}

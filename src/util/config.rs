// External imports
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// Internal imports
use crate::constants;
use crate::error::ConfigError;
use crate::gesture::step_6_train_model::TrainingConfig;

/// Pipeline configuration
///
/// Holds every tunable of the pipeline:
/// data location, class list, sample geometry and output paths. Any field
/// missing from a TOML file falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub class_names: Vec<String>,
    pub axis_columns: Vec<String>,
    pub sample_length: usize,
    pub num_features: usize,
    pub epsilon: f64,
    pub test_split: f64,
    pub seed: u64,
    pub allow_empty_classes: bool,
    pub model_path: PathBuf,
    pub confusion_matrix_path: PathBuf,
    pub experiment_dir: PathBuf,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(constants::DATA_PATH),
            class_names: constants::CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            axis_columns: constants::AXIS_COLUMNS.iter().map(|s| s.to_string()).collect(),
            sample_length: constants::SAMPLE_LENGTH,
            num_features: constants::NUM_FEATURES,
            epsilon: constants::NORMALIZATION_EPSILON,
            test_split: constants::TEST_SPLIT_RATIO,
            seed: constants::RANDOM_SEED,
            allow_empty_classes: false,
            model_path: PathBuf::from(constants::MODEL_FILE_NAME),
            confusion_matrix_path: PathBuf::from(constants::CONFUSION_MATRIX_FILE_NAME),
            experiment_dir: PathBuf::from(constants::EXPERIMENT_DIR),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class_names.is_empty() {
            return Err(invalid("class_names", "at least one class is required"));
        }
        let mut seen = HashSet::new();
        for name in &self.class_names {
            if !seen.insert(name.as_str()) {
                return Err(invalid("class_names", format!("duplicate class '{}'", name)));
            }
        }
        if self.sample_length == 0 {
            return Err(invalid("sample_length", "must be positive"));
        }
        if self.num_features != self.axis_columns.len() {
            return Err(invalid(
                "num_features",
                format!(
                    "{} features but {} axis columns",
                    self.num_features,
                    self.axis_columns.len()
                ),
            ));
        }
        if !(self.epsilon > 0.0) {
            return Err(invalid("epsilon", "must be positive"));
        }
        check_fraction("test_split", self.test_split)?;
        check_fraction("training.validation_split", self.training.validation_split)?;
        if self.training.epochs == 0 {
            return Err(invalid("training.epochs", "must be positive"));
        }
        if self.training.batch_size == 0 {
            return Err(invalid("training.batch_size", "must be positive"));
        }
        if !(self.training.learning_rate > 0.0) {
            return Err(invalid("training.learning_rate", "must be positive"));
        }
        Ok(())
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside (0, 1)", value)))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

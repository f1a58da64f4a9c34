// External imports
use anyhow::{Context, Result};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal imports
use super::step_5_model_arch::{GestureClassifier, ModelTopology};
use crate::built_info;
use crate::util::config::PipelineConfig;

/// Everything needed to rebuild and use a saved classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub timestamp: i64,
    pub topology: ModelTopology,
    pub class_names: Vec<String>,
    pub axis_columns: Vec<String>,
    pub epsilon: f64,
}

impl ModelMetadata {
    pub fn new(
        topology: ModelTopology,
        class_names: Vec<String>,
        axis_columns: Vec<String>,
        epsilon: f64,
    ) -> Self {
        Self {
            version: built_info::PKG_VERSION.to_string(),
            timestamp: Utc::now().timestamp(),
            topology,
            class_names,
            axis_columns,
            epsilon,
        }
    }

    /// Metadata for a model trained under `config`
    pub fn from_config(topology: ModelTopology, config: &PipelineConfig) -> Self {
        Self::new(
            topology,
            config.class_names.clone(),
            config.axis_columns.clone(),
            config.epsilon,
        )
    }

    pub fn sample_length(&self) -> usize {
        self.topology.sample_length
    }
}

/// Weights file for a model base path
pub fn weights_path(path: impl AsRef<Path>) -> PathBuf {
    with_suffix(path.as_ref(), ".bin")
}

/// Metadata file for a model base path
pub fn metadata_path(path: impl AsRef<Path>) -> PathBuf {
    with_suffix(path.as_ref(), ".meta.json")
}

// Dots already in the base name stay part of it
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Save the model weights and metadata, overwriting existing files
///
/// Writes `<path>.bin` (burn binary record, full precision) and
/// `<path>.meta.json`.
pub fn save_model_with_metadata<B: Backend>(
    model: &GestureClassifier<B>,
    metadata: &ModelMetadata,
    path: impl AsRef<Path>,
) -> Result<PathBuf> {
    // Ensure parent directory exists
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create model parent directory")?;
        }
    }
    // Save model artifact
    let model_path = weights_path(&path);
    model
        .clone()
        .save_file::<BinFileRecorder<FullPrecisionSettings>, _>(&model_path, &Default::default())
        .context("Failed to save model")?;
    // Save metadata
    let metadata_json =
        serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    std::fs::write(metadata_path(&path), metadata_json).context("Failed to write metadata file")?;

    info!("Model saved to: {}", model_path.display());
    Ok(model_path)
}

/// Load the model and its metadata from a base path
pub fn load_model_with_metadata<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(GestureClassifier<B>, ModelMetadata)> {
    // Load metadata first
    let metadata_json = std::fs::read_to_string(metadata_path(&path))
        .context("Failed to read metadata file")?;
    let metadata: ModelMetadata =
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")?;

    // Rebuild the architecture from metadata, then fill in the weights
    let model_path = weights_path(&path);
    let model = metadata
        .topology
        .init::<B>(device)
        .load_file::<BinFileRecorder<FullPrecisionSettings>, _>(
            &model_path,
            &Default::default(),
            device,
        )
        .context("Failed to load model")?;

    info!("Model loaded from: {}", model_path.display());
    Ok((model, metadata))
}

/// Check if a saved model exists and its metadata parses
pub fn verify_model(path: impl AsRef<Path>) -> Result<bool> {
    let model_path = weights_path(&path);
    let meta_path = metadata_path(&path);

    // Check if both files exist
    if !model_path.exists() || !meta_path.exists() {
        return Ok(false);
    }

    let metadata_json = std::fs::read_to_string(&meta_path).context("Failed to read metadata file")?;
    let _: ModelMetadata =
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")?;

    Ok(true)
}

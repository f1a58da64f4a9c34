// External imports
use anyhow::Result;
use ndarray::{Array2, Array3, Axis};
use std::path::{Path, PathBuf};

// Internal imports
use crate::gesture::step_1_dataset_loader::GestureDataset;
use crate::gesture::step_5_model_arch::ModelTopology;
use crate::gesture::step_6_train_model::{TrainingConfig, TrainingHistory};
use crate::gesture::step_8_model_serialization::ModelMetadata;

/// The numeric engine behind the pipeline
///
/// Loading, normalization, splitting and reporting only talk to the model
/// through this trait, so the tensor library stays swappable.
pub trait ClassifierEngine {
    type Model;

    /// Build an untrained model for `topology`
    fn compile(&self, topology: &ModelTopology) -> Self::Model;

    /// Train `model` on `train`, holding out the configured validation share
    fn fit(
        &self,
        model: Self::Model,
        train: &GestureDataset,
        config: &TrainingConfig,
    ) -> Result<(Self::Model, TrainingHistory)>;

    /// Class probabilities for `[samples, sample_length, num_features]` input
    fn predict_proba(&self, model: &Self::Model, features: &Array3<f32>) -> Result<Array2<f32>>;

    /// Most probable class per sample
    fn predict(&self, model: &Self::Model, features: &Array3<f32>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(model, features)?;
        Ok(argmax_rows(&probs))
    }

    /// Persist weights and metadata under `path`, returning the weights file
    fn save(&self, model: &Self::Model, metadata: &ModelMetadata, path: &Path) -> Result<PathBuf>;

    /// Rebuild a model saved by `save`
    fn load(&self, path: &Path) -> Result<(Self::Model, ModelMetadata)>;
}

/// Column index of the largest value in each row; first index wins on ties
pub fn argmax_rows(probs: &Array2<f32>) -> Vec<usize> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, &p)| {
                    if p > best.1 {
                        (idx, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

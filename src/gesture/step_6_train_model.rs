// External imports
use anyhow::{anyhow, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::cast::ToElement;
use burn::tensor::{Int, Tensor, TensorData};
use log::info;
use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal imports
use super::step_1_dataset_loader::GestureDataset;
use super::step_5_model_arch::{GestureClassifier, ModelTopology};
use super::step_8_model_serialization::{load_model_with_metadata, save_model_with_metadata, ModelMetadata};
use crate::constants;
use crate::engine::ClassifierEngine;

// Upper bound on samples per forward pass outside of training
const INFERENCE_CHUNK: usize = 256;

/// Configuration for training the gesture classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub validation_split: f64,
    pub patience: usize,
    pub min_delta: f64,
    pub restore_best_weights: bool,
    pub display_metrics: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: constants::DEFAULT_LEARNING_RATE,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            epochs: constants::DEFAULT_EPOCHS,
            validation_split: constants::VALIDATION_SPLIT_RATIO,
            patience: constants::EARLY_STOPPING_PATIENCE, // Early stopping patience
            min_delta: 0.0,                               // Any decrease in val loss counts
            restore_best_weights: true,
            display_metrics: true,
        }
    }
}

/// Metrics of one training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Everything recorded while fitting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    pub train_samples: usize,
    pub val_samples: usize,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.epochs.len()
    }
}

/// Early-stopping bookkeeping on the validation loss
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    best_epoch: usize,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
        }
    }

    /// Record the validation loss of `epoch`; returns true if it is a new best
    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> bool {
        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.best_epoch = epoch;
            self.wait = 0;
            true
        } else {
            self.wait += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.wait >= self.patience
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

/// Index at which the trailing validation share of `n_samples` begins
pub fn validation_split_index(n_samples: usize, validation_split: f64) -> usize {
    (n_samples as f64 * (1.0 - validation_split)).floor() as usize
}

/// Gather the samples at `indices` into a feature tensor and a label tensor
pub fn batch_tensors<B: Backend>(
    features: &Array3<f32>,
    labels: &[usize],
    indices: &[usize],
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 1, Int>) {
    let (_, sample_length, num_features) = features.dim();
    let mut values = Vec::with_capacity(indices.len() * sample_length * num_features);
    for &idx in indices {
        values.extend(features.index_axis(Axis(0), idx).iter().copied());
    }
    let targets: Vec<i64> = indices.iter().map(|&idx| labels[idx] as i64).collect();

    let x = Tensor::<B, 3>::from_data(
        TensorData::new(values, [indices.len(), sample_length, num_features]),
        device,
    );
    let y = Tensor::<B, 1, Int>::from_data(TensorData::new(targets, [indices.len()]), device);
    (x, y)
}

/// Feature tensor for a contiguous run of samples
pub fn features_tensor<B: Backend>(
    features: &Array3<f32>,
    start: usize,
    len: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let (_, sample_length, num_features) = features.dim();
    let values: Vec<f32> = features
        .slice(ndarray::s![start..start + len, .., ..])
        .iter()
        .copied()
        .collect();
    Tensor::from_data(TensorData::new(values, [len, sample_length, num_features]), device)
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: &[usize]) -> usize {
    let batch_size = targets.len();
    logits
        .argmax(1)
        .reshape([batch_size])
        .into_data()
        .iter::<i64>()
        .zip(targets)
        .filter(|(pred, target)| *pred as usize == **target)
        .count()
}

/// Mean loss and accuracy of `model` over a whole dataset, without dropout
pub fn evaluate_loss<B: Backend>(
    model: &GestureClassifier<B>,
    dataset: &GestureDataset,
    batch_size: usize,
    device: &B::Device,
) -> (f64, f64) {
    let n = dataset.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let indices: Vec<usize> = (0..n).collect();
    let mut loss_sum = 0.0;
    let mut correct = 0;
    for chunk in indices.chunks(batch_size.max(1)) {
        let (x, y) = batch_tensors::<B>(&dataset.features, &dataset.labels, chunk, device);
        let logits = model.forward(x);
        let targets: Vec<usize> = chunk.iter().map(|&i| dataset.labels[i]).collect();
        correct += count_correct(logits.clone(), &targets);
        loss_sum += model.loss(logits, y).into_scalar().to_f64() * chunk.len() as f64;
    }
    (loss_sum / n as f64, correct as f64 / n as f64)
}

/// Train the gesture classifier
///
/// The last `validation_split` share of `train` is held out for validation.
/// The remaining samples are reshuffled every epoch and fed in mini-batches
/// to Adam. Training stops once the validation loss has not improved for
/// `patience` epochs; with `restore_best_weights` the weights of the best
/// epoch are then returned. A run that uses up all its epochs keeps the
/// weights of the last epoch.
///
/// # Arguments
///
/// * `model` - Freshly compiled model
/// * `train` - Training split (already normalized)
/// * `config` - Training hyperparameters
/// * `device` - Device to place tensors on
/// * `seed` - Seed for per-epoch batch shuffling
///
/// # Returns
///
/// Returns the trained model and its training history
pub fn train_model<B: AutodiffBackend>(
    mut model: GestureClassifier<B>,
    train: &GestureDataset,
    config: &TrainingConfig,
    device: &B::Device,
    seed: u64,
) -> Result<(GestureClassifier<B>, TrainingHistory)> {
    let n_samples = train.len();
    let split_at = validation_split_index(n_samples, config.validation_split);
    if split_at == 0 || split_at == n_samples {
        return Err(anyhow!(
            "validation split {} of {} samples leaves an empty side",
            config.validation_split,
            n_samples
        ));
    }
    if config.batch_size == 0 {
        return Err(anyhow!("batch size must be positive"));
    }

    let fit_part = train.select(&(0..split_at).collect::<Vec<_>>());
    let val_part = train.select(&(split_at..n_samples).collect::<Vec<_>>());
    info!(
        "Training on {} samples, validating on {} samples",
        fit_part.len(),
        val_part.len()
    );

    let mut optimizer = AdamConfig::new().init();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..fit_part.len()).collect();

    let mut early_stopping = EarlyStopping::new(config.patience, config.min_delta);
    let mut best_model: Option<GestureClassifier<B>> = None;
    let mut history = TrainingHistory {
        train_samples: fit_part.len(),
        val_samples: val_part.len(),
        ..TrainingHistory::default()
    };

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut correct = 0;
        for batch in order.chunks(config.batch_size) {
            let (x, y) = batch_tensors::<B>(&fit_part.features, &fit_part.labels, batch, device);
            let targets: Vec<usize> = batch.iter().map(|&i| fit_part.labels[i]).collect();

            let logits = model.forward(x);
            correct += count_correct(logits.clone(), &targets);
            let loss = model.loss(logits, y);
            epoch_loss += loss.clone().into_scalar().to_f64() * batch.len() as f64;

            // Backward pass and optimizer step
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let train_loss = epoch_loss / fit_part.len() as f64;
        let train_accuracy = correct as f64 / fit_part.len() as f64;

        // Validation pass, dropout disabled
        let (val_loss, val_accuracy) =
            evaluate_loss(&model.valid(), &val_part, config.batch_size, device);

        if config.display_metrics {
            info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
                epoch, config.epochs, train_loss, train_accuracy, val_loss, val_accuracy
            );
        }
        history.epochs.push(EpochMetrics {
            epoch,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
        });

        if early_stopping.observe(epoch, val_loss) {
            if config.restore_best_weights {
                best_model = Some(model.clone());
            }
        } else if early_stopping.should_stop() {
            info!(
                "Early stopping triggered at epoch {} (best val_loss = {:.4} at epoch {})",
                epoch,
                early_stopping.best(),
                early_stopping.best_epoch()
            );
            history.stopped_early = true;
            if let Some(best) = best_model.take() {
                info!("Restoring weights from epoch {}", early_stopping.best_epoch());
                model = best;
            }
            break;
        }
    }

    history.best_epoch = early_stopping.best_epoch();
    history.best_val_loss = early_stopping.best();

    info!(
        "Training completed after {} epochs. Best val_loss: {:.4}",
        history.epochs_run(),
        history.best_val_loss
    );
    Ok((model, history))
}

/// Class probabilities for every sample, computed without dropout
pub fn predict_proba<B: Backend>(
    model: &GestureClassifier<B>,
    features: &Array3<f32>,
    device: &B::Device,
) -> Result<Array2<f32>> {
    let n = features.dim().0;
    let num_classes = model.num_classes();
    let mut values = Vec::with_capacity(n * num_classes);

    let mut start = 0;
    while start < n {
        let len = usize::min(INFERENCE_CHUNK, n - start);
        let x = features_tensor::<B>(features, start, len, device);
        let probs = model.predict_proba(x).into_data();
        let chunk = probs
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read probabilities: {:?}", e))?;
        values.extend(chunk);
        start += len;
    }

    Ok(Array2::from_shape_vec((n, num_classes), values)?)
}

/// `ClassifierEngine` backed by burn on an autodiff backend
#[derive(Debug, Clone)]
pub struct BurnEngine<B: AutodiffBackend> {
    device: B::Device,
    seed: u64,
}

impl<B: AutodiffBackend> BurnEngine<B> {
    pub fn new(device: B::Device, seed: u64) -> Self {
        Self { device, seed }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: AutodiffBackend> ClassifierEngine for BurnEngine<B> {
    type Model = GestureClassifier<B>;

    fn compile(&self, topology: &ModelTopology) -> Self::Model {
        B::seed(self.seed);
        info!(
            "Creating CNN-LSTM classifier: conv={}x{}, pool={}, dropout={}, lstm={}, dense={}, classes={}",
            topology.conv_filters,
            topology.kernel_size,
            topology.pool_size,
            topology.dropout,
            topology.lstm_hidden,
            topology.dense_units,
            topology.num_classes
        );
        topology.init(&self.device)
    }

    fn fit(
        &self,
        model: Self::Model,
        train: &GestureDataset,
        config: &TrainingConfig,
    ) -> Result<(Self::Model, TrainingHistory)> {
        train_model(model, train, config, &self.device, self.seed)
    }

    fn predict_proba(&self, model: &Self::Model, features: &Array3<f32>) -> Result<Array2<f32>> {
        predict_proba(&model.valid(), features, &self.device)
    }

    fn save(&self, model: &Self::Model, metadata: &ModelMetadata, path: &Path) -> Result<PathBuf> {
        save_model_with_metadata(model, metadata, path)
    }

    fn load(&self, path: &Path) -> Result<(Self::Model, ModelMetadata)> {
        load_model_with_metadata(path, &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::test_utils::synthetic_dataset;
    use burn_autodiff::Autodiff;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_early_stopping_counts_non_improving_epochs() {
        let mut stopper = EarlyStopping::new(2, 0.0);
        assert!(stopper.observe(1, 1.0));
        assert!(stopper.observe(2, 0.8));
        assert!(!stopper.observe(3, 0.8)); // equal is not an improvement
        assert!(!stopper.should_stop());
        assert!(!stopper.observe(4, 0.9));
        assert!(stopper.should_stop());
        assert_eq!(stopper.best_epoch(), 2);
        assert!((stopper.best() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_early_stopping_min_delta() {
        let mut stopper = EarlyStopping::new(5, 0.1);
        assert!(stopper.observe(1, 1.0));
        assert!(!stopper.observe(2, 0.95));
        assert!(stopper.observe(3, 0.85));
        assert_eq!(stopper.best_epoch(), 3);
    }

    #[test]
    fn test_validation_split_index() {
        assert_eq!(validation_split_index(48, 0.2), 38);
        assert_eq!(validation_split_index(10, 0.2), 8);
        assert_eq!(validation_split_index(1, 0.2), 0);
    }

    #[test]
    fn test_batch_tensors_gather_in_order() {
        let device = NdArrayDevice::Cpu;
        let dataset = synthetic_dataset(2, 7);
        let (x, y) = batch_tensors::<NdArray<f32>>(&dataset.features, &dataset.labels, &[3, 0], &device);
        assert_eq!(x.dims(), [2, 101, 3]);

        let xs = x.into_data().to_vec::<f32>().unwrap();
        assert_eq!(xs[0], dataset.features[[3, 0, 0]]);
        assert_eq!(xs[101 * 3 + 5], dataset.features[[0, 1, 2]]);
        let ys: Vec<i64> = y.into_data().iter::<i64>().collect();
        assert_eq!(ys, vec![dataset.labels[3] as i64, dataset.labels[0] as i64]);
    }

    #[test]
    fn test_fit_records_history_and_respects_epoch_budget() {
        let device = NdArrayDevice::Cpu;
        let engine = BurnEngine::<TestBackend>::new(device, 42);
        let dataset = synthetic_dataset(8, 42);
        let config = TrainingConfig {
            epochs: 2,
            batch_size: 8,
            display_metrics: false,
            ..TrainingConfig::default()
        };

        let model = engine.compile(&ModelTopology::default());
        let (model, history) = engine.fit(model, &dataset, &config).unwrap();

        assert!(history.epochs_run() >= 1 && history.epochs_run() <= 2);
        assert_eq!(history.train_samples + history.val_samples, dataset.len());
        assert_eq!(history.val_samples, 5);
        assert!(history.best_epoch >= 1);
        assert!(history.epochs.iter().all(|e| e.train_loss.is_finite() && e.val_loss.is_finite()));

        let probs = engine.predict_proba(&model, &dataset.features).unwrap();
        assert_eq!(probs.dim(), (dataset.len(), 3));
        let labels = engine.predict(&model, &dataset.features).unwrap();
        assert!(labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn test_zero_patience_stops_after_first_non_improvement() {
        let device = NdArrayDevice::Cpu;
        let engine = BurnEngine::<TestBackend>::new(device, 1);
        let dataset = synthetic_dataset(6, 3);
        let config = TrainingConfig {
            epochs: 30,
            batch_size: 6,
            patience: 0,
            min_delta: 1e9,
            display_metrics: false,
            ..TrainingConfig::default()
        };

        let model = engine.compile(&ModelTopology::default());
        let (_, history) = engine.fit(model, &dataset, &config).unwrap();

        // With an impossible min_delta only the first epoch improves
        assert_eq!(history.epochs_run(), 2);
        assert!(history.stopped_early);
        assert_eq!(history.best_epoch, 1);
    }

    // Without dropout, two fits from the same weights and seed follow the same path
    fn no_dropout_topology() -> ModelTopology {
        ModelTopology {
            dropout: 0.0,
            ..ModelTopology::default()
        }
    }

    fn fit_and_predict(
        engine: &BurnEngine<TestBackend>,
        model: GestureClassifier<TestBackend>,
        dataset: &GestureDataset,
        config: &TrainingConfig,
    ) -> (Array2<f32>, TrainingHistory) {
        let (trained, history) = engine.fit(model, dataset, config).unwrap();
        let probs = engine.predict_proba(&trained, &dataset.features).unwrap();
        (probs, history)
    }

    fn max_abs_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    fn base_config() -> TrainingConfig {
        TrainingConfig {
            batch_size: 6,
            display_metrics: false,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_early_stop_returns_best_epoch_weights() {
        let engine = BurnEngine::<TestBackend>::new(NdArrayDevice::Cpu, 5);
        let dataset = synthetic_dataset(6, 5);
        let model = engine.compile(&no_dropout_topology());

        let one_epoch = TrainingConfig {
            epochs: 1,
            ..base_config()
        };
        let (epoch_one, _) = fit_and_predict(&engine, model.clone(), &dataset, &one_epoch);

        // Only epoch 1 can improve, so zero patience stops at epoch 2
        let stopping = TrainingConfig {
            epochs: 30,
            patience: 0,
            min_delta: 1e9,
            ..base_config()
        };
        let (stopped, history) = fit_and_predict(&engine, model, &dataset, &stopping);

        assert!(history.stopped_early);
        assert_eq!(history.epochs_run(), 2);
        assert_eq!(history.best_epoch, 1);
        assert!(max_abs_diff(&epoch_one, &stopped) < 1e-6);
    }

    #[test]
    fn test_full_run_keeps_last_epoch_weights() {
        let engine = BurnEngine::<TestBackend>::new(NdArrayDevice::Cpu, 9);
        let dataset = synthetic_dataset(6, 9);
        let model = engine.compile(&no_dropout_topology());

        let one_epoch = TrainingConfig {
            epochs: 1,
            ..base_config()
        };
        let (epoch_one, _) = fit_and_predict(&engine, model.clone(), &dataset, &one_epoch);

        // Epoch 2 never counts as an improvement, but patience is not exhausted
        let two_epochs = TrainingConfig {
            epochs: 2,
            patience: 5,
            min_delta: 1e9,
            ..base_config()
        };
        let (restoring, history) = fit_and_predict(&engine, model.clone(), &dataset, &two_epochs);
        let (plain, _) = fit_and_predict(
            &engine,
            model,
            &dataset,
            &TrainingConfig {
                restore_best_weights: false,
                ..two_epochs
            },
        );

        assert!(!history.stopped_early);
        assert_eq!(history.epochs_run(), 2);
        assert_eq!(history.best_epoch, 1);
        assert!(max_abs_diff(&restoring, &plain) < 1e-6);
        assert!(max_abs_diff(&restoring, &epoch_one) > 1e-6);
    }

    #[test]
    fn test_fit_rejects_degenerate_validation_split() {
        let device = NdArrayDevice::Cpu;
        let engine = BurnEngine::<TestBackend>::new(device, 1);
        let dataset = synthetic_dataset(1, 3);
        let tiny = dataset.select(&[0]);
        let model = engine.compile(&ModelTopology::default());
        assert!(engine.fit(model, &tiny, &TrainingConfig::default()).is_err());
    }
}

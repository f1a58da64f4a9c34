// External imports
use anyhow::{anyhow, Context, Result};
use log::info;
use ndarray::{Array3, Axis};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Internal imports
use super::step_1_dataset_loader::load_dataset;
use super::step_2_sample_normalizer::normalize_samples;
use super::step_3_stratified_split::stratified_split;
use super::step_5_model_arch::ModelTopology;
use super::step_6_train_model::TrainingHistory;
use super::step_7_evaluation::{evaluate_predictions, Evaluation};
use super::step_8_model_serialization::ModelMetadata;
use crate::engine::{argmax_rows, ClassifierEngine};
use crate::util::config::PipelineConfig;
use crate::util::file_utils::{extract_axis_columns, read_csv_file};
use crate::util::heatmap::save_confusion_heatmap;
use crate::util::model_logger::TrainingRun;
use crate::util::motion_intensity::{classify_intensity, MotionIntensity};

/// Result of a full training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub history: TrainingHistory,
    pub evaluation: Evaluation,
    pub model_path: PathBuf,
    pub run_record_path: PathBuf,
}

/// Load, normalize, split, train, evaluate and save
///
/// Every stage failure is fatal; nothing is retried or partially kept.
pub fn run_training<E: ClassifierEngine>(engine: &E, config: &PipelineConfig) -> Result<TrainingOutcome> {
    config.validate().context("Invalid pipeline configuration")?;

    let mut dataset = load_dataset(config).context("Failed to load dataset")?;
    println!(
        "Loaded {} samples with shape {:?}.",
        dataset.len(),
        &dataset.features.shape()[1..]
    );

    info!("Normalizing samples");
    dataset.features = normalize_samples(&dataset.features, config.epsilon);

    let split = stratified_split(&dataset, config.test_split, config.seed)
        .context("Failed to split dataset")?;

    let topology = ModelTopology::new(
        config.sample_length,
        config.num_features,
        config.num_classes(),
    );
    let model = engine.compile(&topology);

    let started = Instant::now();
    let (model, history) = engine
        .fit(model, &split.train, &config.training)
        .context("Training failed")?;
    let training_seconds = started.elapsed().as_secs_f64();

    info!("Evaluating model on {} test samples", split.test.len());
    let predictions = engine.predict(&model, &split.test.features)?;
    let evaluation = evaluate_predictions(&split.test.labels, &predictions, &config.class_names);

    println!("\nClassification Report:");
    println!("{}", evaluation.report);
    println!("Confusion Matrix:");
    println!("{}", evaluation.confusion);
    save_confusion_heatmap(&evaluation.confusion, &config.confusion_matrix_path)?;

    let metadata = ModelMetadata::from_config(topology, config);
    let model_path = engine.save(&model, &metadata, &config.model_path)?;
    println!("Model saved as {}", model_path.display());

    let mut run = TrainingRun::new(
        &config.data_path,
        &config.class_names,
        dataset.class_counts(),
        split.train.len(),
        split.test.len(),
        config.seed,
        config.training.clone(),
    );
    run.set_history(&history);
    run.set_report(&evaluation.report);
    run.set_training_time(training_seconds);
    run.set_model_path(&model_path);
    if history.stopped_early {
        run.add_note(&format!(
            "early stopping restored epoch {}",
            history.best_epoch
        ));
    }
    let run_record_path = run
        .save(&config.experiment_dir)
        .context("Failed to save training run record")?;
    info!("Training run recorded at {}", run_record_path.display());

    Ok(TrainingOutcome {
        history,
        evaluation,
        model_path,
        run_record_path,
    })
}

/// Classification of one recorded window
#[derive(Debug, Clone)]
pub struct WindowPrediction {
    pub probabilities: Vec<(String, f32)>,
    pub label: usize,
    pub class_name: String,
    pub planar_speed: f64,
    pub intensity: MotionIntensity,
}

/// Classify a single sample CSV with a saved model
///
/// The window must have exactly the sample length the model was trained
/// on. It is normalized the same way as the training samples.
pub fn predict_window_file<E: ClassifierEngine>(
    engine: &E,
    model_path: &Path,
    csv_path: &Path,
) -> Result<WindowPrediction> {
    let (model, metadata) = engine.load(model_path)?;

    let df = read_csv_file(csv_path)?;
    let sample_length = metadata.sample_length();
    if df.height() != sample_length {
        return Err(anyhow!(
            "{} has {} rows, the model expects {}",
            csv_path.display(),
            df.height(),
            sample_length
        ));
    }
    let values = extract_axis_columns(&df, csv_path, &metadata.axis_columns)?;
    let raw = Array3::from_shape_vec((1, sample_length, metadata.axis_columns.len()), values)?;

    let (planar_speed, intensity) = classify_intensity(raw.index_axis(Axis(0), 0));
    let normalized = normalize_samples(&raw, metadata.epsilon);

    let probs = engine.predict_proba(&model, &normalized)?;
    let row = probs.index_axis(Axis(0), 0);
    let label = argmax_rows(&probs)[0];
    let class_name = metadata
        .class_names
        .get(label)
        .cloned()
        .ok_or_else(|| anyhow!("Model predicted unknown class index {}", label))?;

    Ok(WindowPrediction {
        probabilities: metadata
            .class_names
            .iter()
            .cloned()
            .zip(row.iter().copied())
            .collect(),
        label,
        class_name,
        planar_speed,
        intensity,
    })
}

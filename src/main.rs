// External crates
use anyhow::{anyhow, Result};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use log::info;
use std::env;
use std::path::{Path, PathBuf};

// Local modules
use motion_gesture::gesture::pipeline::{predict_window_file, run_training};
use motion_gesture::gesture::step_6_train_model::BurnEngine;
use motion_gesture::util::config::PipelineConfig;
use motion_gesture::util::logger::init_logger;

type BurnBackend = Autodiff<NdArray<f32>>;

const USAGE: &str = "usage:
  motion_gesture [train] [DATA_PATH] [CONFIG.toml]
  motion_gesture predict <MODEL_BASE_PATH> <CSV_FILE>";

fn main() -> Result<()> {
    init_logger();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(|s| s.as_str()) {
        Some("predict") => predict(&args[1..]),
        Some("train") => train(&args[1..]),
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => train(&args),
    }
}

fn train(args: &[String]) -> Result<()> {
    let mut config = match args.get(1) {
        Some(config_path) => PipelineConfig::from_file(config_path)?,
        None => PipelineConfig::default(),
    };
    if let Some(data_path) = args.first() {
        config.data_path = PathBuf::from(data_path);
    }
    info!(
        "Using data path: {} | classes: {:?}",
        config.data_path.display(),
        config.class_names
    );

    let engine = BurnEngine::<BurnBackend>::new(NdArrayDevice::Cpu, config.seed);
    let outcome = run_training(&engine, &config)?;

    println!(
        "Training finished after {} epochs (best epoch {}), test accuracy {:.4}",
        outcome.history.epochs_run(),
        outcome.history.best_epoch,
        outcome.evaluation.report.accuracy
    );
    Ok(())
}

fn predict(args: &[String]) -> Result<()> {
    let (model_path, csv_path) = match (args.first(), args.get(1)) {
        (Some(model), Some(csv)) => (Path::new(model), Path::new(csv)),
        _ => return Err(anyhow!("missing arguments\n{}", USAGE)),
    };

    let engine = BurnEngine::<BurnBackend>::new(NdArrayDevice::Cpu, 0);
    let prediction = predict_window_file(&engine, model_path, csv_path)?;

    println!("Window: {}", csv_path.display());
    for (class_name, probability) in &prediction.probabilities {
        println!("  {:<6} {:.4}", class_name, probability);
    }
    println!("Predicted gesture: {}", prediction.class_name);
    println!(
        "Motion intensity: {} (mean planar speed {:.3})",
        prediction.intensity, prediction.planar_speed
    );
    Ok(())
}

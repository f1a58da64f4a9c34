use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::gesture::step_6_train_model::{TrainingConfig, TrainingHistory};
use crate::gesture::step_7_evaluation::ClassificationReport;

/// Record of one training run, written as JSON next to earlier runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub timestamp: String,
    pub data_path: String,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub seed: u64,
    pub training: TrainingConfig,
    pub epochs_run: Option<usize>,
    pub best_epoch: Option<usize>,
    pub best_val_loss: Option<f64>,
    pub stopped_early: Option<bool>,
    pub test_accuracy: Option<f64>,
    pub macro_f1: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub model_path: Option<String>,
    pub notes: String,
}

impl TrainingRun {
    pub fn new(
        data_path: &Path,
        class_names: &[String],
        class_counts: Vec<usize>,
        train_samples: usize,
        test_samples: usize,
        seed: u64,
        training: TrainingConfig,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            data_path: data_path.display().to_string(),
            class_names: class_names.to_vec(),
            class_counts,
            train_samples,
            test_samples,
            seed,
            training,
            epochs_run: None,
            best_epoch: None,
            best_val_loss: None,
            stopped_early: None,
            test_accuracy: None,
            macro_f1: None,
            training_time_seconds: None,
            model_path: None,
            notes: String::new(),
        }
    }

    pub fn set_history(&mut self, history: &TrainingHistory) {
        self.epochs_run = Some(history.epochs_run());
        self.best_epoch = Some(history.best_epoch);
        self.best_val_loss = Some(history.best_val_loss);
        self.stopped_early = Some(history.stopped_early);
    }

    pub fn set_report(&mut self, report: &ClassificationReport) {
        self.test_accuracy = Some(report.accuracy);
        self.macro_f1 = Some(report.macro_avg.f1);
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    pub fn set_model_path(&mut self, path: &Path) {
        self.model_path = Some(path.display().to_string());
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// Write the record as a new JSON file; earlier records are never overwritten
    pub fn save(&self, experiment_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(experiment_dir)?;

        let stem = format!(
            "run_{}_seed{}_bs{}",
            Local::now().format("%Y%m%d_%H%M%S_%3f"),
            self.seed,
            self.training.batch_size,
        );
        let json = serde_json::to_string_pretty(&self)?;

        let mut attempt = 0;
        loop {
            let filename = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, attempt)
            };
            let file_path = experiment_dir.join(filename);

            match OpenOptions::new().write(true).create_new(true).open(&file_path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    return Ok(file_path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_record_round_trips_through_json() -> Result<()> {
        let dir = tempdir()?;
        let names = vec!["C".to_string(), "N".to_string(), "S".to_string()];
        let mut run = TrainingRun::new(
            Path::new("data"),
            &names,
            vec![20, 20, 20],
            48,
            12,
            42,
            TrainingConfig::default(),
        );
        run.set_training_time(1.5);
        run.add_note("first");
        run.add_note("second");

        let path = run.save(dir.path())?;
        let text = fs::read_to_string(&path)?;
        let loaded: TrainingRun = serde_json::from_str(&text)?;
        assert_eq!(loaded.class_counts, vec![20, 20, 20]);
        assert_eq!(loaded.training_time_seconds, Some(1.5));
        assert_eq!(loaded.notes, "first\nsecond");
        assert_eq!(loaded.training.patience, 5);
        assert!(loaded.test_accuracy.is_none());
        Ok(())
    }

    #[test]
    fn test_back_to_back_runs_get_separate_records() -> Result<()> {
        let dir = tempdir()?;
        let names = vec!["C".to_string(), "N".to_string(), "S".to_string()];
        let mut first = TrainingRun::new(
            Path::new("data"),
            &names,
            vec![4, 4, 4],
            9,
            3,
            42,
            TrainingConfig::default(),
        );
        first.add_note("first");
        let mut second = first.clone();
        second.notes = "second".to_string();

        let paths: Vec<PathBuf> = (0..3)
            .map(|i| if i == 1 { second.save(dir.path()) } else { first.save(dir.path()) })
            .collect::<Result<_>>()?;

        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
        let reloaded: TrainingRun = serde_json::from_str(&fs::read_to_string(&paths[1])?)?;
        assert_eq!(reloaded.notes, "second");
        assert_eq!(fs::read_dir(dir.path())?.count(), 3);
        Ok(())
    }
}

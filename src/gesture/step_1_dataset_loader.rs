// External imports
use log::{debug, info, warn};
use ndarray::{Array3, Axis};
use rayon::prelude::*;
use std::path::Path;

// Internal imports
use crate::error::DatasetError;
use crate::util::config::PipelineConfig;
use crate::util::file_utils::{extract_axis_columns, list_sample_files, read_csv_file};

/// Labeled gesture windows flattened into parallel arrays
///
/// `features` has shape `[samples, sample_length, num_features]` and
/// `labels[i]` is the class index of `features[i]`.
#[derive(Debug, Clone)]
pub struct GestureDataset {
    pub features: Array3<f32>,
    pub labels: Vec<usize>,
    pub class_names: Vec<String>,
}

impl GestureDataset {
    /// Build a dataset from a row-major buffer of `labels.len()` windows
    pub fn from_flat(
        values: Vec<f32>,
        labels: Vec<usize>,
        sample_length: usize,
        num_features: usize,
        class_names: Vec<String>,
    ) -> Result<Self, DatasetError> {
        let shape = [labels.len(), sample_length, num_features];
        let features = Array3::from_shape_vec((shape[0], shape[1], shape[2]), values)
            .map_err(|_| DatasetError::Shape { shape })?;
        Ok(Self {
            features,
            labels,
            class_names,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn sample_length(&self) -> usize {
        self.features.dim().1
    }

    pub fn num_features(&self) -> usize {
        self.features.dim().2
    }

    /// Number of samples per class, indexed by label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// New dataset holding the samples at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            class_names: self.class_names.clone(),
        }
    }
}

/// Load every labeled sample under `config.data_path`
///
/// Each class reads `<data_path>/<class_name>/*.csv`. A file is kept if and
/// only if its row count equals `config.sample_length`; any other row count
/// is skipped. A missing class folder, an unreadable file or a file without
/// the axis columns fails the whole load.
///
/// # Arguments
///
/// * `config` - Pipeline configuration (data path, class list, geometry)
///
/// # Returns
///
/// Returns the assembled dataset with labels following `config.class_names`
pub fn load_dataset(config: &PipelineConfig) -> Result<GestureDataset, DatasetError> {
    info!("Loading data from {}", config.data_path.display());

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (label, class_name) in config.class_names.iter().enumerate() {
        let folder = config.data_path.join(class_name);
        if !folder.is_dir() {
            return Err(DatasetError::MissingClassDir {
                class: class_name.clone(),
                path: folder,
            });
        }

        let class_samples = load_class_folder(&folder, config)?;
        if class_samples.is_empty() {
            if config.allow_empty_classes {
                warn!(
                    "Class '{}' has no {}-row samples in {}; continuing without it",
                    class_name,
                    config.sample_length,
                    folder.display()
                );
                continue;
            }
            return Err(DatasetError::EmptyClass {
                class: class_name.clone(),
                path: folder,
                sample_length: config.sample_length,
            });
        }

        info!("Class '{}': {} samples", class_name, class_samples.len());
        for sample in class_samples {
            values.extend(sample);
            labels.push(label);
        }
    }

    let dataset = GestureDataset::from_flat(
        values,
        labels,
        config.sample_length,
        config.num_features,
        config.class_names.clone(),
    )?;
    info!(
        "Loaded {} samples with shape {:?}",
        dataset.len(),
        &dataset.features.shape()[1..]
    );
    Ok(dataset)
}

/// Parse all sample files of one class folder, keeping only full-length windows
fn load_class_folder(folder: &Path, config: &PipelineConfig) -> Result<Vec<Vec<f32>>, DatasetError> {
    let files = list_sample_files(folder)?;

    let parsed: Vec<Option<Vec<f32>>> = files
        .par_iter()
        .map(|path| load_sample_file(path, config))
        .collect::<Result<_, _>>()?;

    Ok(parsed.into_iter().flatten().collect())
}

/// Parse one sample file; `None` if its row count is not the sample length
pub fn load_sample_file(
    path: &Path,
    config: &PipelineConfig,
) -> Result<Option<Vec<f32>>, DatasetError> {
    let df = read_csv_file(path)?;
    if df.height() != config.sample_length {
        debug!(
            "Skipping {}: {} rows, expected {}",
            path.display(),
            df.height(),
            config.sample_length
        );
        return Ok(None);
    }
    extract_axis_columns(&df, path, &config.axis_columns).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::test_utils::{write_sample_csv, write_wave_csv};
    use tempfile::tempdir;

    fn config_for(root: &Path) -> PipelineConfig {
        PipelineConfig {
            data_path: root.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_row_count_filter_is_exact() {
        let dir = tempdir().unwrap();
        for class in ["C", "N", "S"] {
            let folder = dir.path().join(class);
            std::fs::create_dir_all(&folder).unwrap();
            write_wave_csv(&folder.join("keep.csv"), 101, 1.0);
        }
        let folder = dir.path().join("N");
        write_wave_csv(&folder.join("short.csv"), 100, 1.0);
        write_wave_csv(&folder.join("long.csv"), 102, 1.0);

        let dataset = load_dataset(&config_for(dir.path())).unwrap();
        assert_eq!(dataset.features.dim(), (3, 101, 3));
        assert_eq!(dataset.labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_trailing_blank_lines_keep_full_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank_tail.csv");
        let rows: Vec<[f64; 3]> = (0..101).map(|i| [i as f64 * 0.1, 1.0, 9.81]).collect();
        write_sample_csv(&path, &rows);
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("\n\n");
        std::fs::write(&path, text).unwrap();

        let values = load_sample_file(&path, &PipelineConfig::default()).unwrap();
        assert_eq!(values.map(|v| v.len()), Some(101 * 3));
    }

    #[test]
    fn test_integer_prefix_with_late_decimal_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late_decimal.csv");
        let mut rows = vec![[0.0, 1.0, 9.0]; 100];
        rows.push([0.5, 1.25, 9.75]);
        write_sample_csv(&path, &rows);

        let values = load_sample_file(&path, &PipelineConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(values[300], 0.5);
        assert_eq!(values[302], 9.75);
    }

    #[test]
    fn test_missing_class_folder_is_fatal() {
        let dir = tempdir().unwrap();
        for class in ["C", "N"] {
            let folder = dir.path().join(class);
            std::fs::create_dir_all(&folder).unwrap();
            write_wave_csv(&folder.join("a.csv"), 101, 1.0);
        }

        let err = load_dataset(&config_for(dir.path())).unwrap_err();
        assert!(matches!(err, DatasetError::MissingClassDir { ref class, .. } if class == "S"));
    }

    #[test]
    fn test_empty_class_folder_policy() {
        let dir = tempdir().unwrap();
        for class in ["C", "N", "S"] {
            std::fs::create_dir_all(dir.path().join(class)).unwrap();
        }
        write_wave_csv(&dir.path().join("C").join("a.csv"), 101, 1.0);
        write_wave_csv(&dir.path().join("N").join("a.csv"), 101, 1.0);
        write_wave_csv(&dir.path().join("S").join("short.csv"), 50, 1.0);

        let err = load_dataset(&config_for(dir.path())).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyClass { ref class, .. } if class == "S"));

        let config = PipelineConfig {
            allow_empty_classes: true,
            ..config_for(dir.path())
        };
        let dataset = load_dataset(&config).unwrap();
        assert_eq!(dataset.labels, vec![0, 1]);
        assert_eq!(dataset.class_counts(), vec![1, 1, 0]);
    }

    #[test]
    fn test_values_keep_axis_order() {
        let dir = tempdir().unwrap();
        for class in ["C", "N", "S"] {
            std::fs::create_dir_all(dir.path().join(class)).unwrap();
        }
        let rows: Vec<[f64; 3]> = (0..101).map(|i| [i as f64, 10.0 * i as f64, -1.0]).collect();
        for class in ["C", "N", "S"] {
            write_sample_csv(&dir.path().join(class).join("a.csv"), &rows);
        }

        let dataset = load_dataset(&config_for(dir.path())).unwrap();
        assert_eq!(dataset.features[[0, 7, 0]], 7.0);
        assert_eq!(dataset.features[[0, 7, 1]], 70.0);
        assert_eq!(dataset.features[[2, 100, 2]], -1.0);
    }

    #[test]
    fn test_select_reorders_samples() {
        let dataset = GestureDataset::from_flat(
            (0..6).map(|v| v as f32).collect(),
            vec![0, 1, 2],
            1,
            2,
            vec!["C".into(), "N".into(), "S".into()],
        )
        .unwrap();

        let picked = dataset.select(&[2, 0]);
        assert_eq!(picked.labels, vec![2, 0]);
        assert_eq!(picked.features[[0, 0, 0]], 4.0);
        assert_eq!(picked.features[[1, 0, 1]], 1.0);
    }

    #[test]
    fn test_from_flat_rejects_bad_shape() {
        let err = GestureDataset::from_flat(vec![0.0; 5], vec![0], 2, 3, vec!["C".into()]).unwrap_err();
        assert!(matches!(err, DatasetError::Shape { .. }));
    }
}

// External imports
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// Internal imports
use super::step_1_dataset_loader::GestureDataset;
use crate::error::SplitError;

/// Train and test partitions of a dataset
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub train: GestureDataset,
    pub test: GestureDataset,
}

/// Number of test samples for a dataset of `n_samples`
pub fn test_size_for(n_samples: usize, test_split: f64) -> usize {
    (test_split * n_samples as f64).ceil() as usize
}

/// Share `total` slots across classes in proportion to `class_counts`
///
/// Each class first receives the floor of its exact share; the slots left
/// over go to the classes with the largest fractional remainder (lower
/// class index first on ties), never exceeding a class's own count.
pub fn allocate_per_class(class_counts: &[usize], total: usize) -> Vec<usize> {
    let n_samples: usize = class_counts.iter().sum();
    if n_samples == 0 {
        return vec![0; class_counts.len()];
    }

    let exact: Vec<f64> = class_counts
        .iter()
        .map(|&count| count as f64 * total as f64 / n_samples as f64)
        .collect();
    let mut allocation: Vec<usize> = exact.iter().map(|v| v.floor() as usize).collect();

    let mut remaining = total.saturating_sub(allocation.iter().sum());
    let mut order: Vec<usize> = (0..class_counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    while remaining > 0 {
        let mut placed = false;
        for &class in &order {
            if remaining == 0 {
                break;
            }
            if allocation[class] < class_counts[class] {
                allocation[class] += 1;
                remaining -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }

    allocation
}

/// Stratified train/test split with a fixed seed
///
/// The test side holds `ceil(test_split * n)` samples, spread across classes
/// in proportion to their frequency. Each class is shuffled on its own, then
/// both sides are shuffled again so that classes are interleaved. The same
/// dataset, fraction and seed always produce the same partition.
///
/// # Arguments
///
/// * `dataset` - Dataset to partition
/// * `test_split` - Fraction of samples for the test side, in (0, 1)
/// * `seed` - RNG seed
///
/// # Returns
///
/// Returns the train and test datasets, or a `SplitError` when some class is
/// too small or either side would hold fewer samples than there are classes
pub fn stratified_split(
    dataset: &GestureDataset,
    test_split: f64,
    seed: u64,
) -> Result<SplitDataset, SplitError> {
    let (train_idx, test_idx) = stratified_indices(
        &dataset.labels,
        &dataset.class_names,
        test_split,
        seed,
    )?;

    info!(
        "Data split: train samples: {}, test samples: {}",
        train_idx.len(),
        test_idx.len()
    );

    Ok(SplitDataset {
        train: dataset.select(&train_idx),
        test: dataset.select(&test_idx),
    })
}

/// Index-level stratified split; classes with no samples are ignored
pub fn stratified_indices(
    labels: &[usize],
    class_names: &[String],
    test_split: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), SplitError> {
    if !(test_split > 0.0 && test_split < 1.0) {
        return Err(SplitError::InvalidFraction(test_split));
    }
    let n_samples = labels.len();
    if n_samples == 0 {
        return Err(SplitError::Empty);
    }

    let num_classes = class_names.len().max(labels.iter().max().map_or(0, |&m| m + 1));
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); num_classes];
    for (idx, &label) in labels.iter().enumerate() {
        by_class[label].push(idx);
    }

    let present: Vec<usize> = (0..num_classes).filter(|&c| !by_class[c].is_empty()).collect();
    for &class in &present {
        let count = by_class[class].len();
        if count < 2 {
            return Err(SplitError::ClassTooSmall {
                class: class_names
                    .get(class)
                    .cloned()
                    .unwrap_or_else(|| class.to_string()),
                count,
            });
        }
    }

    let n_test = test_size_for(n_samples, test_split);
    let n_train = n_samples - n_test;
    if n_test < present.len() {
        return Err(SplitError::TooFewForClasses {
            side: "test",
            size: n_test,
            classes: present.len(),
        });
    }
    if n_train < present.len() {
        return Err(SplitError::TooFewForClasses {
            side: "train",
            size: n_train,
            classes: present.len(),
        });
    }

    let counts: Vec<usize> = present.iter().map(|&c| by_class[c].len()).collect();
    let test_counts = allocate_per_class(&counts, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (slot, &class) in present.iter().enumerate() {
        let mut members = by_class[class].clone();
        members.shuffle(&mut rng);
        let (class_test, class_train) = members.split_at(test_counts[slot]);
        test.extend_from_slice(class_test);
        train.extend_from_slice(class_train);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}

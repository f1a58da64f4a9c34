// External imports
use ndarray::parallel::prelude::*;
use ndarray::{Array3, ArrayViewMut2, Axis};
use num_traits::Float;

/// Z-score each feature channel of one window over the time axis
///
/// `window` has shape `[sample_length, num_features]`. Every channel becomes
/// `(value - mean) / (std + epsilon)` using the population standard
/// deviation of that channel within this window only.
pub fn normalize_window<F: Float>(mut window: ArrayViewMut2<F>, epsilon: F) {
    let length = window.len_of(Axis(0));
    if length == 0 {
        return;
    }
    let n = F::from(length).unwrap_or_else(F::one);

    for mut channel in window.axis_iter_mut(Axis(1)) {
        let mean = channel.iter().fold(F::zero(), |acc, &v| acc + v) / n;
        let variance = channel
            .iter()
            .fold(F::zero(), |acc, &v| acc + (v - mean) * (v - mean))
            / n;
        let denom = variance.sqrt() + epsilon;
        channel.mapv_inplace(|v| (v - mean) / denom);
    }
}

/// Normalize every sample of a `[samples, sample_length, num_features]` tensor
///
/// Samples are independent, so they are processed in parallel; no statistic
/// is shared across samples.
pub fn normalize_samples(features: &Array3<f32>, epsilon: f64) -> Array3<f32> {
    let mut normalized = features.clone();
    let epsilon = epsilon as f32;
    normalized
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|window| normalize_window(window, epsilon));
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayView1};

    const EPS: f64 = 1e-6;

    fn mean_std(channel: ArrayView1<f32>) -> (f64, f64) {
        let n = channel.len() as f64;
        let mean = channel.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = channel.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    fn wave_samples() -> Array3<f32> {
        Array3::from_shape_fn((4, 101, 3), |(s, t, f)| {
            let phase = t as f32 * 0.1 * (f + 1) as f32;
            (s as f32 + 1.0) * 5.0 * phase.sin() + 20.0 * f as f32 - 3.0 * s as f32
        })
    }

    #[test]
    fn test_each_channel_has_zero_mean_unit_std() {
        let normalized = normalize_samples(&wave_samples(), EPS);
        for sample in normalized.axis_iter(Axis(0)) {
            for channel in sample.axis_iter(Axis(1)) {
                let (mean, std) = mean_std(channel);
                assert!(mean.abs() < 1e-4, "mean {} not ~0", mean);
                assert!((std - 1.0).abs() < 1e-3, "std {} not ~1", std);
            }
        }
    }

    #[test]
    fn test_samples_are_normalized_independently() {
        let features = wave_samples();
        let normalized = normalize_samples(&features, EPS);

        // Normalizing one sample alone gives the same result as inside the batch
        let mut single = features.index_axis(Axis(0), 2).to_owned();
        normalize_window(single.view_mut(), EPS as f32);
        let from_batch = normalized.index_axis(Axis(0), 2);
        for (a, b) in single.iter().zip(from_batch.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_constant_channel_maps_to_zero() {
        let mut window = Array2::<f64>::from_elem((101, 3), 9.81);
        normalize_window(window.view_mut(), EPS);
        assert!(window.iter().all(|v| v.abs() < 1e-6));
        assert!(window.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_normalizing_twice_keeps_profile() {
        let once = normalize_samples(&wave_samples(), EPS);
        let twice = normalize_samples(&once, EPS);
        for sample in twice.axis_iter(Axis(0)) {
            for channel in sample.axis_iter(Axis(1)) {
                let (mean, std) = mean_std(channel);
                assert!(mean.abs() < 1e-4);
                assert!((std - 1.0).abs() < 1e-3);
            }
        }
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_shape_is_preserved() {
        let features = wave_samples();
        let normalized = normalize_samples(&features, EPS);
        assert_eq!(normalized.dim(), features.dim());
    }
}

// External imports
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal imports
use crate::constants::{MODERATE_SPEED_THRESHOLD, VIGOROUS_SPEED_THRESHOLD};

/// Coarse movement level of a window, from its planar (x, y) speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionIntensity {
    Calm,
    Moderate,
    Vigorous,
}

impl MotionIntensity {
    /// Band for a planar speed; the band edges belong to the lower band
    pub fn from_speed(speed: f64) -> Self {
        if speed > VIGOROUS_SPEED_THRESHOLD {
            MotionIntensity::Vigorous
        } else if speed > MODERATE_SPEED_THRESHOLD {
            MotionIntensity::Moderate
        } else {
            MotionIntensity::Calm
        }
    }
}

impl fmt::Display for MotionIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionIntensity::Calm => "calm",
            MotionIntensity::Moderate => "moderate",
            MotionIntensity::Vigorous => "vigorous",
        };
        f.write_str(name)
    }
}

/// Mean of `sqrt(x^2 + y^2)` over the rows of a raw `[time, features]` window
///
/// The z axis is left out so gravity does not dominate the reading.
/// Returns 0 for an empty window or one with fewer than two features.
pub fn mean_planar_speed(window: ArrayView2<f32>) -> f64 {
    let rows = window.len_of(Axis(0));
    if rows == 0 || window.len_of(Axis(1)) < 2 {
        return 0.0;
    }
    let total: f64 = window
        .axis_iter(Axis(0))
        .map(|row| {
            let (x, y) = (row[0] as f64, row[1] as f64);
            (x * x + y * y).sqrt()
        })
        .sum();
    total / rows as f64
}

/// Intensity band of a raw window
pub fn classify_intensity(window: ArrayView2<f32>) -> (f64, MotionIntensity) {
    let speed = mean_planar_speed(window);
    (speed, MotionIntensity::from_speed(speed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_band_edges() {
        assert_eq!(MotionIntensity::from_speed(0.0), MotionIntensity::Calm);
        assert_eq!(MotionIntensity::from_speed(1.5), MotionIntensity::Calm);
        assert_eq!(MotionIntensity::from_speed(1.6), MotionIntensity::Moderate);
        assert_eq!(MotionIntensity::from_speed(4.0), MotionIntensity::Moderate);
        assert_eq!(MotionIntensity::from_speed(4.01), MotionIntensity::Vigorous);
    }

    #[test]
    fn test_planar_speed_ignores_z() {
        let window = array![[3.0f32, 4.0, 9.81], [0.0, 0.0, 9.81]];
        assert!((mean_planar_speed(window.view()) - 2.5).abs() < 1e-9);

        let (speed, band) = classify_intensity(window.view());
        assert!((speed - 2.5).abs() < 1e-9);
        assert_eq!(band, MotionIntensity::Moderate);
    }

    #[test]
    fn test_degenerate_windows() {
        let empty = Array2::<f32>::zeros((0, 3));
        assert_eq!(mean_planar_speed(empty.view()), 0.0);
        let single_axis = Array2::<f32>::ones((5, 1));
        assert_eq!(mean_planar_speed(single_axis.view()), 0.0);
    }
}

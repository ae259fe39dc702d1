//! Rolling-average smoothing of cross-shore profiles.

use super::transects::Transect;

/// Trailing moving average over `window` samples.
///
/// Only complete windows are emitted, so the output has
/// `values.len() - window + 1` entries (or none when the input is shorter
/// than the window). A zero window yields nothing.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);

    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Smoothed `(rotated_x, elevation_m)` profile of one transect.
///
/// Both coordinates are averaged over the same trailing window of the
/// cross-shore-sorted members.
pub fn smooth_profile(transect: &Transect, window: usize) -> Vec<(f64, f64)> {
    let (xs, zs) = transect.profile();
    rolling_mean(&xs, window)
        .into_iter()
        .zip(rolling_mean(&zs, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::TransformedPoint;
    use approx::assert_relative_eq;

    #[test]
    fn test_rolling_mean() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(out, vec![1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_rolling_mean_short_input() {
        assert!(rolling_mean(&[1.0, 2.0], 3).is_empty());
        assert!(rolling_mean(&[1.0, 2.0], 0).is_empty());
        assert_eq!(rolling_mean(&[4.0, 8.0], 2), vec![6.0]);
    }

    #[test]
    fn test_smooth_profile() {
        let points: Vec<TransformedPoint> = (0..6)
            .map(|i| TransformedPoint {
                easting: 0.0,
                northing: 0.0,
                elevation_m: if i % 2 == 0 { 1.0 } else { -1.0 },
                rotated_x: i as f64 * 10.0,
                rotated_y: 0.0,
            })
            .collect();
        let transect = Transect {
            transect_id: 0,
            y_start: 0.0,
            y_end: 1.0,
            points,
        };

        let smoothed = smooth_profile(&transect, 2);
        assert_eq!(smoothed.len(), 5);
        for (i, (x, z)) in smoothed.iter().enumerate() {
            assert_relative_eq!(*x, i as f64 * 10.0 + 5.0);
            assert_relative_eq!(*z, 0.0);
        }
    }
}

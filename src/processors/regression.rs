//! Ordinary least squares slope fits over cross-shore profiles.
//!
//! [`linregress`] reproduces the usual two-sample linear regression summary
//! (slope, intercept, correlation, two-sided p-value, standard errors).
//! Transect-level wrappers turn degenerate bins into per-transect errors so
//! one empty or vertical bin never aborts a whole section.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

use super::transects::{Transect, TransectSet};
use crate::core::transforms::TransformedPoint;

/// Guards the t statistic when |r| is 1.
const TINY: f64 = 1.0e-20;

/// Why a regression could not be computed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegressionError {
    #[error("x has {x_len} samples but y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("need at least 2 samples, got {0}")]
    TooFewPoints(usize),

    #[error("all x values are identical")]
    ZeroXVariance,

    #[error("samples contain non-finite values")]
    NonFinite,
}

/// A transect whose profile cannot support a line fit.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("transect {transect_id} is degenerate: {source}")]
pub struct DegenerateTransectError {
    pub transect_id: usize,
    #[source]
    pub source: RegressionError,
}

/// Linear fit of elevation against cross-shore distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlopeFit {
    /// Elevation change per metre cross-shore.
    pub slope: f64,
    /// Elevation at `rotated_x = 0`.
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub correlation: f64,
    /// Two-sided p-value for a null slope.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub intercept_stderr: f64,
    pub sample_count: usize,
}

impl SlopeFit {
    /// Fitted elevation at cross-shore distance `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Least squares regression of `y` on `x`.
///
/// # Errors
///
/// Fails when the inputs differ in length, hold fewer than two samples,
/// contain non-finite values, or every `x` is the same.
pub fn linregress(x: &[f64], y: &[f64]) -> Result<SlopeFit, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(RegressionError::TooFewPoints(n));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFinite);
    }

    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let (mut ssxm, mut ssym, mut ssxym) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;

    if ssxm == 0.0 {
        return Err(RegressionError::ZeroXVariance);
    }

    let r_den = (ssxm * ssym).sqrt();
    let correlation = if r_den == 0.0 {
        0.0
    } else {
        (ssxym / r_den).clamp(-1.0, 1.0)
    };

    let slope = ssxym / ssxm;
    let intercept = y_mean - slope * x_mean;

    let (p_value, std_err, intercept_stderr) = if n == 2 {
        let p = if y[0] == y[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let df = (n - 2) as f64;
        let t = correlation * (df / ((1.0 - correlation) * (1.0 + correlation) + TINY)).sqrt();
        let p = StudentsT::new(0.0, 1.0, df)
            .map(|dist| 2.0 * dist.sf(t.abs()))
            .unwrap_or(f64::NAN);
        let std_err = ((1.0 - correlation * correlation) * ssym / ssxm / df).sqrt();
        let x_sq_mean = x.iter().map(|v| v * v).sum::<f64>() / nf;
        let intercept_stderr = std_err * x_sq_mean.sqrt();
        (p, std_err, intercept_stderr)
    };

    Ok(SlopeFit {
        slope,
        intercept,
        correlation,
        p_value,
        std_err,
        intercept_stderr,
        sample_count: n,
    })
}

/// Fit `elevation_m` against `rotated_x` over arbitrary points.
pub fn fit_points(points: &[TransformedPoint]) -> Result<SlopeFit, RegressionError> {
    let (x, y): (Vec<f64>, Vec<f64>) = points.iter().map(|p| (p.rotated_x, p.elevation_m)).unzip();
    linregress(&x, &y)
}

/// Fit one transect's profile.
pub fn fit_transect(transect: &Transect) -> Result<SlopeFit, DegenerateTransectError> {
    fit_points(&transect.points).map_err(|source| DegenerateTransectError {
        transect_id: transect.transect_id,
        source,
    })
}

/// Outcome of fitting one transect.
#[derive(Debug, Clone, PartialEq)]
pub struct TransectFit {
    pub transect_id: usize,
    pub point_count: usize,
    pub result: Result<SlopeFit, DegenerateTransectError>,
}

impl TransectFit {
    pub fn slope(&self) -> Option<f64> {
        self.result.as_ref().ok().map(|fit| fit.slope)
    }
}

/// Fit every transect independently, in transect order.
pub fn fit_each_transect(set: &TransectSet) -> Vec<TransectFit> {
    set.transects
        .par_iter()
        .map(|t| TransectFit {
            transect_id: t.transect_id,
            point_count: t.len(),
            result: fit_transect(t),
        })
        .collect()
}

/// Slope of the chord between two profile points.
pub fn two_point_slope(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (y2 - y1) / (x2 - x1)
}

/// A hand-picked chord across a profile, drawn as an annotated slope.
///
/// Endpoints are `(cross-shore distance, elevation)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeChord {
    pub label: String,
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl SlopeChord {
    pub fn new(label: &str, start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            label: label.to_string(),
            start,
            end,
        }
    }

    pub fn slope(&self) -> f64 {
        two_point_slope(self.start.0, self.start.1, self.end.0, self.end.1)
    }

    /// Legend text: slope magnitude to three decimals, then the label.
    pub fn legend(&self) -> String {
        format!("{:.3} {}", self.slope().abs(), self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::transects::build_transects;
    use approx::assert_relative_eq;

    fn point(rotated_x: f64, rotated_y: f64, elevation_m: f64) -> TransformedPoint {
        TransformedPoint {
            easting: 0.0,
            northing: 0.0,
            elevation_m,
            rotated_x,
            rotated_y,
        }
    }

    #[test]
    fn test_slope_sanity() {
        let fit = linregress(&[-10.0, 0.0, 10.0], &[-1.0, 0.0, 1.0]).unwrap();
        assert_relative_eq!(fit.slope, 0.1, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-12);
        assert_relative_eq!(fit.correlation, 1.0, epsilon = 1e-12);
        assert!(fit.p_value < 1e-6);
        assert_relative_eq!(fit.std_err, 0.0, epsilon = 1e-6);
        assert_eq!(fit.sample_count, 3);
    }

    #[test]
    fn test_noisy_fit_statistics() {
        // Reference values from a standard least squares summary.
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let fit = linregress(&x, &y).unwrap();

        assert_relative_eq!(fit.slope, 0.8, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.4, epsilon = 1e-12);
        assert_relative_eq!(fit.correlation, 0.8, epsilon = 1e-12);
        assert_relative_eq!(fit.std_err, 0.34641016151377546, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept_stderr, 0.848528137423857, epsilon = 1e-12);
        assert_relative_eq!(fit.p_value, 0.10408803866182788, epsilon = 1e-6);
    }

    #[test]
    fn test_two_samples() {
        let fit = linregress(&[0.0, 2.0], &[1.0, 2.0]).unwrap();
        assert_relative_eq!(fit.slope, 0.5);
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.std_err, 0.0);

        let flat = linregress(&[0.0, 2.0], &[1.0, 1.0]).unwrap();
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.correlation, 0.0);
        assert_eq!(flat.p_value, 1.0);
    }

    #[test]
    fn test_regression_errors() {
        assert_eq!(linregress(&[], &[]), Err(RegressionError::TooFewPoints(0)));
        assert_eq!(linregress(&[1.0], &[1.0]), Err(RegressionError::TooFewPoints(1)));
        assert_eq!(
            linregress(&[1.0, 2.0], &[1.0]),
            Err(RegressionError::LengthMismatch { x_len: 2, y_len: 1 })
        );
        assert_eq!(
            linregress(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]),
            Err(RegressionError::ZeroXVariance)
        );
        assert_eq!(
            linregress(&[1.0, f64::NAN], &[1.0, 2.0]),
            Err(RegressionError::NonFinite)
        );
    }

    #[test]
    fn test_degenerate_transects_do_not_abort_others() {
        let points = vec![
            // transect 0: good profile
            point(-10.0, 0.5, -1.0),
            point(0.0, 0.5, 0.0),
            point(10.0, 0.5, 1.0),
            // transect 1: constant cross-shore position
            point(4.0, 10.5, 0.0),
            point(4.0, 10.7, 2.0),
            // transect 2: empty
        ];
        let set = build_transects(&points, 0.0, 30.0, 1.0, 10.0).unwrap();
        let fits = fit_each_transect(&set);

        assert_eq!(fits.len(), 3);
        assert_relative_eq!(fits[0].slope().unwrap(), 0.1, epsilon = 1e-12);
        assert_eq!(
            fits[1].result,
            Err(DegenerateTransectError {
                transect_id: 1,
                source: RegressionError::ZeroXVariance,
            })
        );
        assert_eq!(fits[2].point_count, 0);
        assert_eq!(
            fits[2].result,
            Err(DegenerateTransectError {
                transect_id: 2,
                source: RegressionError::TooFewPoints(0),
            })
        );
    }

    #[test]
    fn test_fit_points_pools_transects() {
        let points = vec![
            point(0.0, 0.0, 2.0),
            point(20.0, 0.0, 0.0),
            point(0.0, 50.0, 2.2),
            point(20.0, 50.0, 0.2),
        ];
        let set = build_transects(&points, 0.0, 100.0, 1.0, 50.0).unwrap();
        let fit = fit_points(&set.pooled()).unwrap();
        assert_relative_eq!(fit.slope, -0.1, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 2.1, epsilon = 1e-12);
        assert_relative_eq!(fit.predict(10.0), 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_two_point_slope() {
        assert_relative_eq!(two_point_slope(0.0, 0.0, 340.0, -4.0), -4.0 / 340.0);
        assert_relative_eq!(two_point_slope(71.0, -1.0, -43.0, 1.0), 2.0 / -114.0);
    }

    #[test]
    fn test_slope_chord_legend() {
        let surf = SlopeChord::new("surf zone slope", (0.0, 0.0), (340.0, -4.0));
        assert_relative_eq!(surf.slope(), -4.0 / 340.0);
        assert_eq!(surf.legend(), "0.012 surf zone slope");

        let beach = SlopeChord::new("beach slope", (71.0, -1.0), (-43.0, 1.0));
        assert_eq!(beach.legend(), "0.018 beach slope");
    }
}

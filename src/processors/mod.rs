//! Point filtering, transect binning and slope estimation.

pub mod comparison;
pub mod filtering;
pub mod regression;
pub mod smoothing;
pub mod transects;

// Re-export key types for convenience
pub use comparison::{compare_slopes, ComparisonError, ModelBundle, SlopeComparison};
pub use filtering::{filter_points, Band, PointField, RegionFilter};
pub use regression::{
    fit_each_transect, fit_points, fit_transect, linregress, two_point_slope,
    DegenerateTransectError, RegressionError, SlopeChord, SlopeFit, TransectFit,
};
pub use smoothing::{rolling_mean, smooth_profile};
pub use transects::{
    build_transects, build_transects_with, Transect, TransectError, TransectSet, TransectSpec,
};

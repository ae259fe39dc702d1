//! Shore-normal local frame transformation.
//!
//! Raw survey coordinates are shifted to a caller-chosen origin near the
//! shoreline and rotated so that `rotated_x` runs cross-shore and
//! `rotated_y` runs along-shore. The rotation is applied to the
//! (northing, easting) vector in that operand order:
//!
//! ```text
//! rotated_x = dn * sin(theta) + de * cos(theta)
//! rotated_y = dn * cos(theta) - de * sin(theta)
//! ```
//!
//! Swapping the operand order flips the axis orientation and breaks the
//! cross-shore convention used by the transect builder.
//! The per-point work is parallelised using Rayon; output order always
//! matches input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::loaders::{PointCloud, PointRecord};

/// Errors raised while validating frame parameters or input records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("frame parameter {name} is not finite ({value})")]
    NonFiniteParameter { name: &'static str, value: f64 },

    #[error("record {index} has a non-finite {field}")]
    NonFiniteRecord { index: usize, field: &'static str },
}

/// Origin and rotation of a shore-normal frame.
///
/// Chosen empirically per beach and survey, typically by checking that the
/// near-zero elevation contour runs parallel to the `rotated_y` axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFrameParameters {
    /// Northing of the new origin, ideally on the shoreline.
    pub origin_northing: f64,
    /// Easting of the new origin, ideally on the shoreline.
    pub origin_easting: f64,
    /// Angle of the shoreline in degrees from true north.
    pub rotation_deg: f64,
}

impl LocalFrameParameters {
    pub fn new(origin_northing: f64, origin_easting: f64, rotation_deg: f64) -> Self {
        Self {
            origin_northing,
            origin_easting,
            rotation_deg,
        }
    }
}

/// A survey record with its shore-normal coordinates attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedPoint {
    pub easting: f64,
    pub northing: f64,
    pub elevation_m: f64,
    /// Cross-shore coordinate.
    pub rotated_x: f64,
    /// Along-shore coordinate.
    pub rotated_y: f64,
}

impl TransformedPoint {
    pub fn record(&self) -> PointRecord {
        PointRecord::new(self.easting, self.northing, self.elevation_m)
    }
}

/// Sign convention for the cross-shore axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossShoreOrientation {
    /// Keep `rotated_x` as produced by the rotation.
    #[default]
    AsRotated,
    /// Negate `rotated_x` so distance increases offshore.
    Mirrored,
}

/// Precomputed frame ready to transform points.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    params: LocalFrameParameters,
    sin_theta: f64,
    cos_theta: f64,
}

impl LocalFrame {
    /// Build a frame, rejecting non-finite parameters.
    pub fn new(params: LocalFrameParameters) -> Result<Self, TransformError> {
        for (name, value) in [
            ("origin_northing", params.origin_northing),
            ("origin_easting", params.origin_easting),
            ("rotation_deg", params.rotation_deg),
        ] {
            if !value.is_finite() {
                return Err(TransformError::NonFiniteParameter { name, value });
            }
        }
        Ok(Self::unchecked(params))
    }

    fn unchecked(params: LocalFrameParameters) -> Self {
        let theta = params.rotation_deg.to_radians();
        Self {
            params,
            sin_theta: theta.sin(),
            cos_theta: theta.cos(),
        }
    }

    pub fn params(&self) -> &LocalFrameParameters {
        &self.params
    }

    /// Rotated (cross-shore, along-shore) coordinates of a world position.
    #[inline]
    pub fn rotate(&self, northing: f64, easting: f64) -> (f64, f64) {
        let shifted_northing = northing - self.params.origin_northing;
        let shifted_easting = easting - self.params.origin_easting;
        let rotated_x = shifted_northing * self.sin_theta + shifted_easting * self.cos_theta;
        let rotated_y = shifted_northing * self.cos_theta - shifted_easting * self.sin_theta;
        (rotated_x, rotated_y)
    }

    #[inline]
    pub fn apply(&self, record: &PointRecord) -> TransformedPoint {
        let (rotated_x, rotated_y) = self.rotate(record.northing, record.easting);
        TransformedPoint {
            easting: record.easting,
            northing: record.northing,
            elevation_m: record.elevation_m,
            rotated_x,
            rotated_y,
        }
    }

    /// Inverse of [`LocalFrame::rotate`]: returns `(northing, easting)`.
    pub fn to_world(&self, rotated_x: f64, rotated_y: f64) -> (f64, f64) {
        let shifted_northing = rotated_x * self.sin_theta + rotated_y * self.cos_theta;
        let shifted_easting = rotated_x * self.cos_theta - rotated_y * self.sin_theta;
        (
            shifted_northing + self.params.origin_northing,
            shifted_easting + self.params.origin_easting,
        )
    }
}

fn transform_indexed(cloud: &PointCloud, frame: &LocalFrame) -> Vec<TransformedPoint> {
    (0..cloud.len())
        .into_par_iter()
        .map(|i| {
            frame.apply(&PointRecord::new(
                cloud.easting[i],
                cloud.northing[i],
                cloud.elevation_m[i],
            ))
        })
        .collect()
}

/// Transform every record of `cloud` into the shore-normal frame.
///
/// No validation is performed: non-finite inputs or parameters propagate to
/// non-finite outputs. Use [`transform_validated`] to drop bad records.
pub fn transform(cloud: &PointCloud, params: &LocalFrameParameters) -> Vec<TransformedPoint> {
    transform_indexed(cloud, &LocalFrame::unchecked(*params))
}

/// A record dropped by [`transform_validated`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPoint {
    pub index: usize,
    pub error: TransformError,
}

/// Output of the validated transform.
#[derive(Debug, Clone, Default)]
pub struct ValidatedPoints {
    pub points: Vec<TransformedPoint>,
    pub rejected: Vec<RejectedPoint>,
}

fn check_record(index: usize, record: &PointRecord) -> Result<(), TransformError> {
    for (field, value) in [
        ("easting", record.easting),
        ("northing", record.northing),
        ("elevation_m", record.elevation_m),
    ] {
        if !value.is_finite() {
            return Err(TransformError::NonFiniteRecord { index, field });
        }
    }
    Ok(())
}

/// Transform `cloud`, dropping records with any non-finite coordinate.
///
/// Each bad record is reported individually so one corrupt return does not
/// discard the survey.
pub fn transform_validated(cloud: &PointCloud, frame: &LocalFrame) -> ValidatedPoints {
    let results: Vec<Result<TransformedPoint, TransformError>> = (0..cloud.len())
        .into_par_iter()
        .map(|i| {
            let record =
                PointRecord::new(cloud.easting[i], cloud.northing[i], cloud.elevation_m[i]);
            check_record(i, &record).map(|_| frame.apply(&record))
        })
        .collect();

    let mut out = ValidatedPoints {
        points: Vec::with_capacity(results.len()),
        rejected: Vec::new(),
    };
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(point) => out.points.push(point),
            Err(error) => out.rejected.push(RejectedPoint { index, error }),
        }
    }
    out
}

/// Apply a cross-shore sign convention in place.
pub fn orient_cross_shore(points: &mut [TransformedPoint], orientation: CrossShoreOrientation) {
    if orientation == CrossShoreOrientation::Mirrored {
        points.par_iter_mut().for_each(|p| p.rotated_x = -p.rotated_x);
    }
}

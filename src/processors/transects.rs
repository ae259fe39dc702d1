//! Along-shore binning of transformed points into cross-shore transects.
//!
//! Bins start at `y_min + k * gap` for `k = 0, 1, 2, ...` while the start is
//! strictly below `y_max`. A point belongs to bin `k` when
//! `start <= rotated_y <= start + width`, inclusive on both ends, so the last
//! bin may extend past `y_max` and, when `gap == width`, a point exactly on a
//! shared edge lands in both neighbouring bins. `gap < width` gives
//! overlapping transects and `gap > width` leaves unsampled strips; both are
//! valid sampling policies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transforms::TransformedPoint;

/// Errors for invalid binning parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransectError {
    #[error("transect width must be positive, got {0}")]
    NonPositiveWidth(f64),

    #[error("transect gap must be positive, got {0}")]
    NonPositiveGap(f64),

    #[error("along-shore range is empty: y_min {y_min} >= y_max {y_max}")]
    EmptyRange { y_min: f64, y_max: f64 },

    #[error("transect parameter {0} is not finite")]
    NonFinite(&'static str),
}

/// Along-shore sampling policy for one beach section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransectSpec {
    pub y_min: f64,
    pub y_max: f64,
    /// Along-shore thickness of each transect in metres.
    pub width: f64,
    /// Along-shore stride between transect starts in metres.
    pub gap: f64,
}

impl TransectSpec {
    pub fn new(y_min: f64, y_max: f64, width: f64, gap: f64) -> Self {
        Self {
            y_min,
            y_max,
            width,
            gap,
        }
    }

    pub fn validate(&self) -> Result<(), TransectError> {
        for (name, value) in [
            ("y_min", self.y_min),
            ("y_max", self.y_max),
            ("width", self.width),
            ("gap", self.gap),
        ] {
            if !value.is_finite() {
                return Err(TransectError::NonFinite(name));
            }
        }
        if self.width <= 0.0 {
            return Err(TransectError::NonPositiveWidth(self.width));
        }
        if self.gap <= 0.0 {
            return Err(TransectError::NonPositiveGap(self.gap));
        }
        if self.y_min >= self.y_max {
            return Err(TransectError::EmptyRange {
                y_min: self.y_min,
                y_max: self.y_max,
            });
        }
        Ok(())
    }

    /// Start of every bin, in emission order.
    pub fn bin_starts(&self) -> impl Iterator<Item = f64> + '_ {
        (0u64..)
            .map(move |k| self.y_min + k as f64 * self.gap)
            .take_while(move |&start| start < self.y_max)
    }

    /// Number of bins this spec emits.
    pub fn bin_count(&self) -> usize {
        self.bin_starts().count()
    }
}

/// One cross-shore profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Transect {
    pub transect_id: usize,
    /// Inclusive along-shore lower edge.
    pub y_start: f64,
    /// Inclusive along-shore upper edge.
    pub y_end: f64,
    /// Members sorted by ascending `rotated_x`.
    pub points: Vec<TransformedPoint>,
}

impl Transect {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(rotated_x, elevation_m)` pairs in cross-shore order.
    pub fn profile(&self) -> (Vec<f64>, Vec<f64>) {
        self.points
            .iter()
            .map(|p| (p.rotated_x, p.elevation_m))
            .unzip()
    }
}

/// All transects of one section, in along-shore scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransectSet {
    pub transects: Vec<Transect>,
}

impl TransectSet {
    pub fn len(&self) -> usize {
        self.transects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transects.is_empty()
    }

    pub fn get(&self, transect_id: usize) -> Option<&Transect> {
        self.transects.get(transect_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transect> {
        self.transects.iter()
    }

    /// Transects holding at least one point.
    pub fn non_empty(&self) -> impl Iterator<Item = &Transect> {
        self.transects.iter().filter(|t| !t.is_empty())
    }

    /// Member count summed over transects; overlapping bins count twice.
    pub fn total_points(&self) -> usize {
        self.transects.iter().map(Transect::len).sum()
    }

    /// Flattened `(transect_id, point)` rows in `(transect_id, rotated_x)` order.
    pub fn iter_points(&self) -> impl Iterator<Item = (usize, &TransformedPoint)> {
        self.transects
            .iter()
            .flat_map(|t| t.points.iter().map(move |p| (t.transect_id, p)))
    }

    /// Every member point, for a pooled regression.
    pub fn pooled(&self) -> Vec<TransformedPoint> {
        self.iter_points().map(|(_, p)| *p).collect()
    }

    /// Restrict every transect to the points matching `predicate`.
    ///
    /// Ids and bin edges are kept, so ids stay contiguous even when a
    /// transect ends up empty.
    pub fn retain_points<F>(&self, predicate: F) -> TransectSet
    where
        F: Fn(&TransformedPoint) -> bool,
    {
        TransectSet {
            transects: self
                .transects
                .iter()
                .map(|t| Transect {
                    transect_id: t.transect_id,
                    y_start: t.y_start,
                    y_end: t.y_end,
                    points: t.points.iter().filter(|p| predicate(p)).copied().collect(),
                })
                .collect(),
        }
    }
}

/// Bin points into transects according to `spec`.
///
/// # Errors
///
/// Returns a [`TransectError`] when the spec is invalid; empty bins are not
/// an error.
pub fn build_transects_with(
    points: &[TransformedPoint],
    spec: &TransectSpec,
) -> Result<TransectSet, TransectError> {
    spec.validate()?;

    let transects = spec
        .bin_starts()
        .enumerate()
        .map(|(transect_id, y_start)| {
            let y_end = y_start + spec.width;
            let mut members: Vec<TransformedPoint> = points
                .iter()
                .filter(|p| p.rotated_y >= y_start && p.rotated_y <= y_end)
                .copied()
                .collect();
            members.sort_by(|a, b| a.rotated_x.total_cmp(&b.rotated_x));
            Transect {
                transect_id,
                y_start,
                y_end,
                points: members,
            }
        })
        .collect();

    Ok(TransectSet { transects })
}

/// Bin points into transects of `width` metres every `gap` metres between
/// `y_min` and `y_max`.
pub fn build_transects(
    points: &[TransformedPoint],
    y_min: f64,
    y_max: f64,
    width: f64,
    gap: f64,
) -> Result<TransectSet, TransectError> {
    build_transects_with(points, &TransectSpec::new(y_min, y_max, width, gap))
}

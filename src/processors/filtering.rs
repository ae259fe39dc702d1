//! Predicate filtering of transformed survey points.
//!
//! Regions of interest (a beach face, the surf zone, an along-shore stretch,
//! everything below the topographic cut) are expressed as [`Band`]s over a
//! single [`PointField`] and combined by conjunction in a [`RegionFilter`].
//! Arbitrary closures go through [`filter_points`].

use serde::{Deserialize, Serialize};

use crate::core::transforms::TransformedPoint;

/// A numeric column of a [`TransformedPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointField {
    Easting,
    Northing,
    ElevationM,
    RotatedX,
    RotatedY,
}

impl PointField {
    #[inline]
    pub fn value(&self, point: &TransformedPoint) -> f64 {
        match self {
            PointField::Easting => point.easting,
            PointField::Northing => point.northing,
            PointField::ElevationM => point.elevation_m,
            PointField::RotatedX => point.rotated_x,
            PointField::RotatedY => point.rotated_y,
        }
    }
}

/// Open interval `min < value < max` on one field.
///
/// A missing bound is unbounded on that side. NaN never matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub field: PointField,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Band {
    pub fn between(field: PointField, min: f64, max: f64) -> Self {
        Self {
            field,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn above(field: PointField, min: f64) -> Self {
        Self {
            field,
            min: Some(min),
            max: None,
        }
    }

    pub fn below(field: PointField, max: f64) -> Self {
        Self {
            field,
            min: None,
            max: Some(max),
        }
    }

    #[inline]
    pub fn contains(&self, point: &TransformedPoint) -> bool {
        let v = self.field.value(point);
        if v.is_nan() {
            return false;
        }
        self.min.map_or(true, |min| v > min) && self.max.map_or(true, |max| v < max)
    }
}

/// Conjunction of bands. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionFilter {
    bands: Vec<Band>,
}

impl RegionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bands(bands: Vec<Band>) -> Self {
        Self { bands }
    }

    /// Add another band that must also hold.
    pub fn with(mut self, band: Band) -> Self {
        self.bands.push(band);
        self
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    #[inline]
    pub fn matches(&self, point: &TransformedPoint) -> bool {
        self.bands.iter().all(|band| band.contains(point))
    }

    pub fn apply(&self, points: &[TransformedPoint]) -> Vec<TransformedPoint> {
        filter_points(points, |p| self.matches(p))
    }
}

/// Return the points satisfying `predicate`, preserving order.
pub fn filter_points<F>(points: &[TransformedPoint], predicate: F) -> Vec<TransformedPoint>
where
    F: Fn(&TransformedPoint) -> bool,
{
    points.iter().filter(|p| predicate(p)).copied().collect()
}

/// Drop topographic returns at or above `threshold` metres.
pub fn below_elevation(threshold: f64) -> RegionFilter {
    RegionFilter::new().with(Band::below(PointField::ElevationM, threshold))
}

/// Points within `tolerance` of zero elevation, i.e. the waterline.
///
/// Plotting these in the rotated frame is the usual check that the frame's
/// along-shore axis follows the shoreline.
pub fn near_zero_elevation(tolerance: f64) -> RegionFilter {
    RegionFilter::new().with(Band::between(PointField::ElevationM, -tolerance, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(rotated_x: f64, rotated_y: f64, elevation_m: f64) -> TransformedPoint {
        TransformedPoint {
            easting: 460_000.0 + rotated_x,
            northing: 3_678_000.0 + rotated_y,
            elevation_m,
            rotated_x,
            rotated_y,
        }
    }

    fn sample() -> Vec<TransformedPoint> {
        vec![
            point(-150.0, 10.0, -4.0),
            point(-100.0, 20.0, -2.0),
            point(-20.0, 30.0, -0.1),
            point(40.0, 40.0, 0.15),
            point(65.0, 50.0, 3.0),
            point(90.0, 60.0, 7.5),
        ]
    }

    #[test]
    fn test_band_bounds_are_exclusive() {
        let beach = Band::between(PointField::RotatedX, -100.0, 65.0);
        let kept = filter_points(&sample(), |p| beach.contains(p));
        let xs: Vec<f64> = kept.iter().map(|p| p.rotated_x).collect();
        assert_eq!(xs, vec![-20.0, 40.0]);
    }

    #[test]
    fn test_half_open_bands() {
        let pts = sample();
        let offshore = RegionFilter::new().with(Band::above(PointField::RotatedY, 45.0));
        assert_eq!(offshore.apply(&pts).len(), 2);
        let south = RegionFilter::new().with(Band::below(PointField::Northing, 3_678_025.0));
        assert_eq!(south.apply(&pts).len(), 2);
    }

    #[test]
    fn test_filter_conjunction() {
        let filter = RegionFilter::new()
            .with(Band::between(PointField::RotatedX, -800.0, 10.0))
            .with(Band::below(PointField::ElevationM, -1.0));
        let kept = filter.apply(&sample());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.rotated_x < 10.0 && p.elevation_m < -1.0));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let pts = sample();
        assert_eq!(RegionFilter::new().apply(&pts), pts);
    }

    #[test]
    fn test_below_elevation_drops_topography() {
        let kept = below_elevation(5.0).apply(&sample());
        assert_eq!(kept.len(), 5);
        assert!(kept.iter().all(|p| p.elevation_m < 5.0));
    }

    #[test]
    fn test_near_zero_elevation() {
        let kept = near_zero_elevation(0.2).apply(&sample());
        let zs: Vec<f64> = kept.iter().map(|p| p.elevation_m).collect();
        assert_eq!(zs, vec![-0.1, 0.15]);
    }

    #[test]
    fn test_nan_never_matches() {
        let pts = vec![point(f64::NAN, 0.0, 0.0)];
        let filter = RegionFilter::new().with(Band {
            field: PointField::RotatedX,
            min: None,
            max: None,
        });
        assert!(filter.apply(&pts).is_empty());
    }

    #[test]
    fn test_band_yaml_shape() {
        let yaml = "\
- field: rotated_x
  min: -100.0
  max: 65.0
- field: elevation_m
  max: 5.0
";
        let filter: RegionFilter = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            filter.bands(),
            &[
                Band::between(PointField::RotatedX, -100.0, 65.0),
                Band::below(PointField::ElevationM, 5.0),
            ]
        );
    }
}

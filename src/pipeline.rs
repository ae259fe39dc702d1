//! End-to-end survey analysis: transform, orient, pre-filter, then bin and
//! fit each configured section.
//!
//! Numeric results never depend on rendering; figures are produced from a
//! finished [`SectionReport`] by [`render_section`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::{SectionConfig, SurveyConfig};
use crate::core::loaders::PointCloud;
use crate::core::transforms::{
    orient_cross_shore, transform_validated, LocalFrame, TransformedPoint,
};
use crate::processors::filtering::RegionFilter;
use crate::processors::regression::{
    fit_each_transect, fit_points, RegressionError, SlopeFit, TransectFit,
};
use crate::processors::transects::{build_transects_with, TransectError, TransectSet};
use crate::visualization::{plot_transects, RenderError, RenderSettings};

/// Pooled fit over one cross-shore zone of a section.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFit {
    pub name: String,
    pub point_count: usize,
    pub result: std::result::Result<SlopeFit, RegressionError>,
}

/// Transects and fits for one section.
#[derive(Debug, Clone)]
pub struct SectionReport {
    pub name: String,
    pub transects: TransectSet,
    pub fits: Vec<TransectFit>,
    pub zones: Vec<ZoneFit>,
    /// Fit over every point handed to the section, when configured.
    pub pooled: Option<std::result::Result<SlopeFit, RegressionError>>,
}

impl SectionReport {
    /// Slopes of the transects that could be fitted.
    pub fn transect_slopes(&self) -> Vec<f64> {
        self.fits.iter().filter_map(TransectFit::slope).collect()
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneFit> {
        self.zones.iter().find(|z| z.name == name)
    }
}

/// Result of [`run_survey`].
#[derive(Debug, Clone)]
pub struct SurveyReport {
    pub name: String,
    pub input_points: usize,
    /// Records dropped for non-finite coordinates.
    pub rejected_points: usize,
    /// Transformed, oriented points that passed the region filter.
    pub points: Vec<TransformedPoint>,
    pub sections: Vec<SectionReport>,
}

impl SurveyReport {
    /// Per-transect fits of every section, in section order.
    pub fn all_fits(&self) -> Vec<TransectFit> {
        self.sections
            .iter()
            .flat_map(|s| s.fits.iter().cloned())
            .collect()
    }
}

/// Bin a section's points and fit each transect, each zone and, optionally,
/// the whole point set.
///
/// # Errors
///
/// Only an invalid transect spec is an error. Degenerate transects and zones
/// are logged and kept as `Err` values.
pub fn analyze_section(
    points: &[TransformedPoint],
    section: &SectionConfig,
) -> std::result::Result<SectionReport, TransectError> {
    let transects = build_transects_with(points, &section.transects)?;
    debug!(
        "section '{}': {} transects, {} member points",
        section.name,
        transects.len(),
        transects.total_points()
    );

    let fits = fit_each_transect(&transects);
    for fit in &fits {
        if let Err(e) = &fit.result {
            warn!("section '{}': {}", section.name, e);
        }
    }

    let zones = section
        .zones
        .iter()
        .map(|zone| {
            let filter = zone.filter();
            let members: Vec<TransformedPoint> = transects
                .iter_points()
                .map(|(_, p)| *p)
                .filter(|p| filter.matches(p))
                .collect();
            let result = fit_points(&members);
            match &result {
                Ok(fit) => info!(
                    "section '{}' zone '{}': slope {:.4} over {} points",
                    section.name,
                    zone.name,
                    fit.slope,
                    members.len()
                ),
                Err(e) => warn!("section '{}' zone '{}': {}", section.name, zone.name, e),
            }
            ZoneFit {
                name: zone.name.clone(),
                point_count: members.len(),
                result,
            }
        })
        .collect();

    let pooled = section.pooled.map(|_| {
        let result = fit_points(points);
        if let Err(e) = &result {
            warn!("section '{}' pooled fit: {}", section.name, e);
        }
        result
    });

    Ok(SectionReport {
        name: section.name.clone(),
        transects,
        fits,
        zones,
        pooled,
    })
}

/// Run the whole analysis for one survey.
pub fn run_survey(cloud: &PointCloud, config: &SurveyConfig) -> Result<SurveyReport> {
    let frame = LocalFrame::new(config.frame).context("invalid local frame")?;

    let validated = transform_validated(cloud, &frame);
    if !validated.rejected.is_empty() {
        warn!(
            "dropped {} of {} records with non-finite coordinates",
            validated.rejected.len(),
            cloud.len()
        );
    }
    let mut points = validated.points;
    orient_cross_shore(&mut points, config.orientation);

    let region = config.region_filter();
    if !region.is_empty() {
        points = region.apply(&points);
        info!("{} points inside the survey region", points.len());
    }

    let sections = config
        .sections
        .iter()
        .map(|section| {
            analyze_section(&points, section)
                .with_context(|| format!("failed to analyze section '{}'", section.name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SurveyReport {
        name: config.name.clone(),
        input_points: cloud.len(),
        rejected_points: validated.rejected.len(),
        points,
        sections,
    })
}

/// Draw one figure per zone (and one for the pooled fit) of a section.
///
/// Files are named `{survey}_{section}_{zone}.png` inside `output_dir`.
/// Zones whose fit failed are drawn without an overlay.
pub fn render_section(
    output_dir: &Path,
    survey_name: &str,
    report: &SectionReport,
    section: &SectionConfig,
    settings: &RenderSettings,
) -> std::result::Result<Vec<PathBuf>, RenderError> {
    let mut written = Vec::new();

    for (zone, config) in report.zones.iter().zip(&section.zones) {
        let path = output_dir.join(format!("{}_{}_{}.png", survey_name, report.name, zone.name));
        let title = format!("{} {} {} transects", survey_name, report.name, zone.name);
        let opts = config.profile_plot(title);
        plot_transects(&path, &report.transects, zone.result.as_ref().ok(), &opts, settings)?;
        written.push(path);
    }

    if let (Some(limits), Some(pooled)) = (section.pooled, &report.pooled) {
        let path = output_dir.join(format!("{}_{}_pooled.png", survey_name, report.name));
        let opts = limits.profile_plot(format!("{} {} transects", survey_name, report.name), None);
        plot_transects(&path, &report.transects, pooled.as_ref().ok(), &opts, settings)?;
        written.push(path);
    }

    Ok(written)
}

/// Restrict points to a region.
pub fn select_region(points: &[TransformedPoint], region: &RegionFilter) -> Vec<TransformedPoint> {
    region.apply(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlotLimits, ZoneConfig};
    use crate::core::transforms::{CrossShoreOrientation, LocalFrameParameters};
    use crate::processors::filtering::{Band, PointField};
    use crate::processors::regression::SlopeChord;
    use crate::processors::transects::TransectSpec;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    const ORIGIN_N: f64 = 3_678_000.0;
    const ORIGIN_E: f64 = 460_500.0;

    /// Planar beach along the northing axis: with a zero rotation the
    /// cross-shore axis is easting and elevation drops 5 cm per metre.
    fn planar_beach() -> PointCloud {
        let mut cloud = PointCloud::new();
        for along in 0..30 {
            for across in -20..=20 {
                let x = across as f64 * 5.0;
                let y = along as f64;
                cloud.push(ORIGIN_E + x, ORIGIN_N + y, 1.0 - 0.05 * x);
            }
        }
        cloud
    }

    fn section() -> SectionConfig {
        SectionConfig {
            name: "test".to_string(),
            transects: TransectSpec::new(0.0, 30.0, 1.0, 10.0),
            zones: vec![ZoneConfig::new(
                "beach",
                vec![Band::between(PointField::RotatedX, -50.0, 50.0)],
                PlotLimits::new((-100.0, 100.0), (-5.0, 6.0)),
            )],
            pooled: Some(PlotLimits::new((-100.0, 100.0), (-5.0, 6.0))),
        }
    }

    fn config() -> SurveyConfig {
        SurveyConfig {
            name: "synthetic".to_string(),
            frame: LocalFrameParameters::new(ORIGIN_N, ORIGIN_E, 0.0),
            orientation: CrossShoreOrientation::AsRotated,
            region: Vec::new(),
            sections: vec![section()],
            render: RenderSettings {
                width_in: 2.0,
                height_in: 2.0,
                dpi: 50,
                draw_labels: false,
            },
        }
    }

    #[test]
    fn test_run_survey_recovers_plane_slope() {
        let report = run_survey(&planar_beach(), &config()).unwrap();

        assert_eq!(report.input_points, 30 * 41);
        assert_eq!(report.rejected_points, 0);
        assert_eq!(report.sections.len(), 1);

        let section = &report.sections[0];
        assert_eq!(section.transects.len(), 3);
        // rows y = 0, 1 / 10, 11 / 20, 21
        assert!(section.fits.iter().all(|f| f.point_count == 82));
        for slope in section.transect_slopes() {
            assert_relative_eq!(slope, -0.05, epsilon = 1e-9);
        }

        let beach = section.zone("beach").unwrap();
        assert_eq!(beach.point_count, 3 * 2 * 19);
        assert_relative_eq!(beach.result.as_ref().unwrap().slope, -0.05, epsilon = 1e-9);

        let pooled = section.pooled.as_ref().unwrap().as_ref().unwrap();
        assert_relative_eq!(pooled.intercept, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_orientation_flips_slope() {
        let mut config = config();
        config.orientation = CrossShoreOrientation::Mirrored;
        let report = run_survey(&planar_beach(), &config).unwrap();

        for slope in report.sections[0].transect_slopes() {
            assert_relative_eq!(slope, 0.05, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bad_records_and_region() {
        let mut cloud = planar_beach();
        cloud.push(f64::NAN, ORIGIN_N, 0.0);

        let mut config = config();
        config.region = vec![Band::above(PointField::RotatedX, 0.0)];
        let report = run_survey(&cloud, &config).unwrap();

        assert_eq!(report.rejected_points, 1);
        assert!(report.points.iter().all(|p| p.rotated_x > 0.0));
        assert_eq!(report.points.len(), 30 * 20);
    }

    #[test]
    fn test_degenerate_zone_does_not_fail_section() {
        let mut section = section();
        section.zones.push(ZoneConfig::new(
            "offshore",
            vec![Band::above(PointField::RotatedX, 5000.0)],
            PlotLimits::new((0.0, 1.0), (0.0, 1.0)),
        ));
        let frame = LocalFrame::new(config().frame).unwrap();
        let points = transform_validated(&planar_beach(), &frame).points;

        let report = analyze_section(&points, &section).unwrap();
        let offshore = report.zone("offshore").unwrap();
        assert_eq!(offshore.point_count, 0);
        assert_eq!(offshore.result, Err(RegressionError::TooFewPoints(0)));
        assert!(report.zone("beach").unwrap().result.is_ok());
    }

    #[test]
    fn test_invalid_section_is_an_error() {
        let mut config = config();
        config.sections[0].transects.width = 0.0;
        assert!(run_survey(&planar_beach(), &config).is_err());
    }

    #[test]
    fn test_render_section() {
        let dir = tempdir().unwrap();
        let mut config = config();
        config.sections[0].zones[0]
            .chords
            .push(SlopeChord::new("beach slope", (-50.0, 3.5), (50.0, -1.5)));
        let report = run_survey(&planar_beach(), &config).unwrap();

        let written = render_section(
            dir.path(),
            &config.name,
            &report.sections[0],
            &config.sections[0],
            &config.render,
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("synthetic_test_beach.png"));
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_select_region() {
        let frame = LocalFrame::new(config().frame).unwrap();
        let points = transform_validated(&planar_beach(), &frame).points;
        let region = RegionFilter::from_bands(vec![Band::below(PointField::RotatedY, 1.0)]);
        assert_eq!(select_region(&points, &region).len(), 41);
    }
}

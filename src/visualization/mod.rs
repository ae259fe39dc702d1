//! Figure rendering for transects and plan views.
//!
//! Every figure is a PNG written through the plotters bitmap backend. Text
//! (captions and axis labels) is only drawn when
//! [`RenderSettings::draw_labels`] is set, since it needs a system font.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transforms::TransformedPoint;
use crate::processors::filtering::near_zero_elevation;
use crate::processors::regression::{SlopeChord, SlopeFit};
use crate::processors::smoothing::smooth_profile;
use crate::processors::transects::TransectSet;

/// Errors that can occur during rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    Plotting(String),

    #[error("nothing to plot")]
    Empty,

    #[error("invalid {axis} limits: [{min}, {max}]")]
    InvalidLimits { axis: &'static str, min: f64, max: f64 },
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Point cap for scatter figures; larger inputs are strided.
const MAX_SCATTER_POINTS: usize = 1_000_000;

/// Line colours for successive transects.
/// Blue, green, red and orange chord annotations.
const CHORD_COLORS: &[(u8, u8, u8)] = &[(0, 0, 255), (0, 128, 0), (255, 0, 0), (255, 165, 0)];

const TRANSECT_COLORS: &[(u8, u8, u8)] = &[
    (31, 119, 180),
    (255, 127, 14),
    (44, 160, 44),
    (214, 39, 40),
    (148, 103, 189),
    (140, 86, 75),
    (227, 119, 194),
    (127, 127, 127),
    (188, 189, 34),
    (23, 190, 207),
];

/// Red-to-blue diverging ramp, low to high.
const RDBU: &[(u8, u8, u8)] = &[
    (103, 0, 31),
    (178, 24, 43),
    (214, 96, 77),
    (244, 165, 130),
    (253, 219, 199),
    (247, 247, 247),
    (209, 229, 240),
    (146, 197, 222),
    (67, 147, 195),
    (33, 102, 172),
    (5, 48, 97),
];

const MISSING_COLOR: RGBColor = RGBColor(160, 160, 160);

fn default_width_in() -> f64 {
    6.4
}

fn default_height_in() -> f64 {
    4.8
}

fn default_dpi() -> u32 {
    300
}

/// Output size of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_width_in")]
    pub width_in: f64,

    #[serde(default = "default_height_in")]
    pub height_in: f64,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Draw captions and axis labels.
    #[serde(default)]
    pub draw_labels: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width_in: default_width_in(),
            height_in: default_height_in(),
            dpi: default_dpi(),
            draw_labels: false,
        }
    }
}

impl RenderSettings {
    /// Pixel dimensions: inches times DPI, at least one pixel each way.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| ((inches * self.dpi as f64).round().max(1.0)) as u32;
        (px(self.width_in), px(self.height_in))
    }
}

/// Axis window and annotation for a transect figure.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePlot {
    pub title: String,
    pub xlim: (f64, f64),
    pub ylim: (f64, f64),
    /// Rolling-mean window applied to each profile before drawing.
    pub smoothing: Option<usize>,
    /// Chords drawn on top of the profiles, listed in a legend when labels
    /// are on.
    pub chords: Vec<SlopeChord>,
}

fn check_limits(axis: &'static str, (min, max): (f64, f64)) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(RenderError::InvalidLimits { axis, min, max });
    }
    Ok(())
}

fn plotting_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Plotting(e.to_string())
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Colour for `value` on the reversed red-blue ramp: `vmin` is deep blue,
/// `vmax` deep red, values outside the range saturate.
pub fn diverging_color(value: f64, vmin: f64, vmax: f64) -> RGBColor {
    if value.is_nan() || !(vmax > vmin) {
        return MISSING_COLOR;
    }
    let t = ((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0);
    // reversed ramp
    let pos = (1.0 - t) * (RDBU.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(RDBU.len() - 1);
    let frac = pos - lo as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (a, b) = (RDBU[lo], RDBU[hi]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Plot every transect as an elevation profile, plus an optional fitted line.
///
/// # Arguments
///
/// * `output_path` - PNG path; parent directories are created
/// * `transects` - Profiles to draw, one line each
/// * `overlay` - Fit drawn across the full x window
/// * `opts` - Title, axis window and optional smoothing
/// * `settings` - Figure size
///
/// # Errors
///
/// Returns [`RenderError::Empty`] when no transect has points and
/// [`RenderError::InvalidLimits`] for an empty or non-finite window.
pub fn plot_transects(
    output_path: &Path,
    transects: &TransectSet,
    overlay: Option<&SlopeFit>,
    opts: &ProfilePlot,
    settings: &RenderSettings,
) -> Result<()> {
    if transects.total_points() == 0 {
        return Err(RenderError::Empty);
    }
    check_limits("x", opts.xlim)?;
    check_limits("y", opts.ylim)?;
    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, settings.pixel_size()).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if settings.draw_labels {
        let caption = match overlay {
            Some(fit) => format!("{} (linear fit slope: {:.2})", opts.title, fit.slope),
            None => opts.title.clone(),
        };
        builder
            .caption(caption, ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50);
    }
    let mut chart = builder
        .build_cartesian_2d(opts.xlim.0..opts.xlim.1, opts.ylim.0..opts.ylim.1)
        .map_err(plotting_error)?;

    let mut mesh = chart.configure_mesh();
    if settings.draw_labels {
        mesh.x_desc("Cross-shore Distance (m)").y_desc("Elevation (m)");
    }
    mesh.draw().map_err(plotting_error)?;

    for (i, transect) in transects.non_empty().enumerate() {
        let profile: Vec<(f64, f64)> = match opts.smoothing {
            Some(window) => smooth_profile(transect, window),
            None => transect
                .points
                .iter()
                .map(|p| (p.rotated_x, p.elevation_m))
                .collect(),
        };
        let (r, g, b) = TRANSECT_COLORS[i % TRANSECT_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                profile.into_iter().filter(|(x, z)| x.is_finite() && z.is_finite()),
                &RGBColor(r, g, b),
            ))
            .map_err(plotting_error)?;
    }

    if let Some(fit) = overlay {
        let (x0, x1) = opts.xlim;
        chart
            .draw_series(LineSeries::new(
                [(x0, fit.predict(x0)), (x1, fit.predict(x1))],
                &BLACK,
            ))
            .map_err(plotting_error)?;
    }

    for (i, chord) in opts.chords.iter().enumerate() {
        let (r, g, b) = CHORD_COLORS[i % CHORD_COLORS.len()];
        let color = RGBColor(r, g, b);
        let series = chart
            .draw_series(LineSeries::new([chord.start, chord.end], &color))
            .map_err(plotting_error)?;
        if settings.draw_labels {
            series
                .label(chord.legend())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }
    if settings.draw_labels && !opts.chords.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(WHITE)
            .border_style(BLACK)
            .draw()
            .map_err(plotting_error)?;
    }

    root.present().map_err(plotting_error)?;
    Ok(())
}

/// Padded data bounds of `(x, y)` pairs.
fn compute_bounds(points: &[(f64, f64, RGBColor)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y, _) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;
    (x_min - x_padding, x_max + x_padding, y_min - y_padding, y_max + y_padding)
}

fn draw_scatter(
    output_path: &Path,
    points: &[(f64, f64, RGBColor)],
    caption: Option<&str>,
    settings: &RenderSettings,
) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = compute_bounds(points);
    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, settings.pixel_size()).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if let Some(caption) = caption {
        builder
            .caption(caption, ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plotting_error)?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().disable_y_mesh();
    if caption.is_some() {
        mesh.x_desc("Rotated cross-shore (m)")
            .y_desc("Rotated along-shore (m)");
    }
    mesh.draw().map_err(plotting_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y, color)| Circle::new((*x, *y), 1, color.filled())),
        )
        .map_err(plotting_error)?;

    root.present().map_err(plotting_error)?;
    Ok(())
}

fn finite_xy(points: &[TransformedPoint]) -> impl Iterator<Item = &TransformedPoint> {
    let step = (points.len() / MAX_SCATTER_POINTS).max(1);
    points
        .iter()
        .step_by(step)
        .filter(|p| p.rotated_x.is_finite() && p.rotated_y.is_finite())
}

/// Plan view of points in the rotated frame, coloured by elevation.
///
/// Elevations at or below `vmin` are deep blue and at or above `vmax` deep
/// red.
pub fn plot_plan_view(
    output_path: &Path,
    points: &[TransformedPoint],
    title: &str,
    vmin: f64,
    vmax: f64,
    settings: &RenderSettings,
) -> Result<()> {
    check_limits("color", (vmin, vmax))?;
    let colored: Vec<(f64, f64, RGBColor)> = finite_xy(points)
        .map(|p| (p.rotated_x, p.rotated_y, diverging_color(p.elevation_m, vmin, vmax)))
        .collect();
    if colored.is_empty() {
        return Err(RenderError::Empty);
    }

    draw_scatter(
        output_path,
        &colored,
        settings.draw_labels.then_some(title),
        settings,
    )
}

/// Scatter of the points within `tolerance` of zero elevation.
///
/// With a well-chosen frame the waterline runs parallel to the along-shore
/// axis.
pub fn plot_shoreline_check(
    output_path: &Path,
    points: &[TransformedPoint],
    tolerance: f64,
    settings: &RenderSettings,
) -> Result<()> {
    let shoreline = near_zero_elevation(tolerance).apply(points);
    let dots: Vec<(f64, f64, RGBColor)> = finite_xy(&shoreline)
        .map(|p| (p.rotated_x, p.rotated_y, BLACK))
        .collect();
    if dots.is_empty() {
        return Err(RenderError::Empty);
    }

    draw_scatter(
        output_path,
        &dots,
        settings.draw_labels.then_some("Zero-elevation contour"),
        settings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::regression::fit_points;
    use crate::processors::transects::build_transects;
    use tempfile::tempdir;

    fn small() -> RenderSettings {
        RenderSettings {
            width_in: 2.0,
            height_in: 1.5,
            dpi: 60,
            draw_labels: false,
        }
    }

    fn beach() -> Vec<TransformedPoint> {
        let mut points = Vec::new();
        for y in [0.2, 10.5] {
            for i in 0..20 {
                let x = -50.0 + 5.0 * i as f64;
                points.push(TransformedPoint {
                    easting: 0.0,
                    northing: 0.0,
                    elevation_m: -0.05 * x + if i % 2 == 0 { 0.1 } else { -0.1 },
                    rotated_x: x,
                    rotated_y: y,
                });
            }
        }
        points
    }

    fn profile_plot() -> ProfilePlot {
        ProfilePlot {
            title: "test".to_string(),
            xlim: (-60.0, 60.0),
            ylim: (-4.0, 4.0),
            smoothing: None,
            chords: Vec::new(),
        }
    }

    #[test]
    fn test_pixel_size() {
        assert_eq!(RenderSettings::default().pixel_size(), (1920, 1440));
        assert_eq!(small().pixel_size(), (120, 90));
    }

    #[test]
    fn test_diverging_color() {
        assert_eq!(diverging_color(-4.0, -4.0, 4.0), RGBColor(5, 48, 97));
        assert_eq!(diverging_color(4.0, -4.0, 4.0), RGBColor(103, 0, 31));
        assert_eq!(diverging_color(0.0, -4.0, 4.0), RGBColor(247, 247, 247));
        assert_eq!(diverging_color(-40.0, -4.0, 4.0), RGBColor(5, 48, 97));
        assert_eq!(diverging_color(f64::NAN, -4.0, 4.0), MISSING_COLOR);
    }

    #[test]
    fn test_plot_transects_with_overlay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("figs").join("transects.png");
        let points = beach();
        let set = build_transects(&points, 0.0, 20.0, 1.0, 10.0).unwrap();
        let fit = fit_points(&set.pooled()).unwrap();

        plot_transects(&path, &set, Some(&fit), &profile_plot(), &small()).unwrap();
        assert!(path.exists());

        let smoothed = ProfilePlot {
            smoothing: Some(3),
            ..profile_plot()
        };
        let path2 = dir.path().join("smoothed.png");
        plot_transects(&path2, &set, None, &smoothed, &small()).unwrap();
        assert!(path2.exists());
    }

    #[test]
    fn test_plot_transects_with_chords() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chords.png");
        let points = beach();
        let set = build_transects(&points, 0.0, 20.0, 1.0, 10.0).unwrap();
        let annotated = ProfilePlot {
            chords: vec![
                SlopeChord::new("beach slope", (-40.0, 2.0), (40.0, -2.0)),
                // Runs past the x window.
                SlopeChord::new("bar slope", (20.0, -1.0), (90.0, -6.0)),
            ],
            ..profile_plot()
        };

        plot_transects(&path, &set, None, &annotated, &small()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_plot_transects_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.png");

        let empty = build_transects(&[], 0.0, 20.0, 1.0, 10.0).unwrap();
        assert!(matches!(
            plot_transects(&path, &empty, None, &profile_plot(), &small()),
            Err(RenderError::Empty)
        ));

        let points = beach();
        let set = build_transects(&points, 0.0, 20.0, 1.0, 10.0).unwrap();
        let flipped = ProfilePlot {
            xlim: (60.0, -60.0),
            ..profile_plot()
        };
        assert!(matches!(
            plot_transects(&path, &set, None, &flipped, &small()),
            Err(RenderError::InvalidLimits { axis: "x", .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_plot_plan_view_and_shoreline() {
        let dir = tempdir().unwrap();
        let points = beach();

        let plan = dir.path().join("plan.png");
        plot_plan_view(&plan, &points, "plan", -4.0, 4.0, &small()).unwrap();
        assert!(plan.exists());

        let shore = dir.path().join("shore.png");
        plot_shoreline_check(&shore, &points, 0.2, &small()).unwrap();
        assert!(shore.exists());
    }

    #[test]
    fn test_shoreline_check_without_waterline() {
        let dir = tempdir().unwrap();
        let dry: Vec<TransformedPoint> = beach()
            .into_iter()
            .map(|p| TransformedPoint {
                elevation_m: p.elevation_m + 10.0,
                ..p
            })
            .collect();
        assert!(matches!(
            plot_shoreline_check(&dir.path().join("x.png"), &dry, 0.2, &small()),
            Err(RenderError::Empty)
        ));
    }
}

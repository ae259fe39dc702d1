//! Command-line interface for beach slope analysis.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_point_cloud, PointCloud};
use crate::core::raster::load_geotiff;
use crate::core::transforms::{
    orient_cross_shore, transform_validated, CrossShoreOrientation, LocalFrame,
    LocalFrameParameters, TransformedPoint,
};
use crate::core::writers::{write_fits_csv, write_points_csv, write_transects_csv};
use crate::processors::comparison::{compare_slopes, finite_mean, ModelBundle};
use crate::processors::filtering::{below_elevation, Band, PointField, RegionFilter};
use crate::visualization::{self, RenderSettings};
use crate::{pipeline, SurveyConfig};

#[derive(Parser)]
#[command(name = "beach-slopes")]
#[command(about = "Beach slope extraction from airborne lidar surveys", version)]
pub struct Cli {
    /// Path to YAML survey config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Built-in survey preset, used when no config file is given
    #[arg(short, long, global = true, default_value = "camp-pendleton")]
    preset: String,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Frame parameters given on the command line.
#[derive(Args)]
struct FrameArgs {
    /// Northing of the frame origin
    #[arg(long, allow_negative_numbers = true)]
    origin_northing: f64,
    /// Easting of the frame origin
    #[arg(long, allow_negative_numbers = true)]
    origin_easting: f64,
    /// Shoreline angle in degrees from north
    #[arg(long, allow_negative_numbers = true)]
    rotation_deg: f64,
    /// Negate the cross-shore axis so distance increases offshore
    #[arg(long)]
    mirrored: bool,
}

impl FrameArgs {
    fn params(&self) -> LocalFrameParameters {
        LocalFrameParameters::new(self.origin_northing, self.origin_easting, self.rotation_deg)
    }

    fn orientation(&self) -> CrossShoreOrientation {
        if self.mirrored {
            CrossShoreOrientation::Mirrored
        } else {
            CrossShoreOrientation::AsRotated
        }
    }

    /// World `(northing, easting)` of the point `cross_shore` metres along
    /// the oriented cross-shore axis.
    fn axis_point(&self, cross_shore: f64) -> Result<(f64, f64)> {
        let local = LocalFrame::new(self.params()).context("invalid frame parameters")?;
        let rotated_x = match self.orientation() {
            CrossShoreOrientation::AsRotated => cross_shore,
            CrossShoreOrientation::Mirrored => -cross_shore,
        };
        Ok(local.to_world(rotated_x, 0.0))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Bin a survey into transects and fit beach slopes
    Analyze {
        /// LAS, CSV or GeoTIFF survey
        survey: PathBuf,
        /// Directory for figures and CSV exports
        #[arg(short, long, default_value = "figures")]
        output_dir: PathBuf,
        /// Also export transect members and fits as CSV
        #[arg(long)]
        csv: bool,
        /// Skip figure rendering
        #[arg(long)]
        no_plots: bool,
        /// Nodata value of a GeoTIFF survey
        #[arg(long, allow_negative_numbers = true)]
        nodata: Option<f64>,
    },

    /// Plot the zero-elevation contour in a candidate frame
    FrameCheck {
        /// LAS, CSV or GeoTIFF survey
        survey: PathBuf,
        #[command(flatten)]
        frame: FrameArgs,
        /// Elevation band around zero, in metres
        #[arg(long, default_value_t = 0.2)]
        tolerance: f64,
        /// Output PNG file path
        #[arg(short, long, default_value = "shoreline_check.png")]
        output: PathBuf,
        /// Also export the contour points as CSV
        #[arg(long)]
        points_csv: Option<PathBuf>,
    },

    /// Plan view of a survey in the rotated frame, coloured by elevation
    Map {
        /// LAS, CSV or GeoTIFF survey
        survey: PathBuf,
        #[command(flatten)]
        frame: FrameArgs,
        #[arg(long, allow_negative_numbers = true)]
        x_min: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        x_max: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y_min: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y_max: Option<f64>,
        /// Drop returns at or above this elevation
        #[arg(long, allow_negative_numbers = true)]
        max_elevation: Option<f64>,
        /// Elevation mapped to deep blue
        #[arg(long, default_value_t = -4.0, allow_negative_numbers = true)]
        vmin: f64,
        /// Elevation mapped to deep red
        #[arg(long, default_value_t = 4.0, allow_negative_numbers = true)]
        vmax: f64,
        /// Title for the plot
        #[arg(long)]
        title: Option<String>,
        /// Output PNG file path
        #[arg(short, long, default_value = "plan_view.png")]
        output: PathBuf,
    },

    /// Summarize a model result bundle, optionally against a survey
    Compare {
        /// JSON model bundle
        bundle: PathBuf,
        /// Survey analysed with the selected config for comparison
        #[arg(long)]
        survey: Option<PathBuf>,
    },

    /// Print size and georeferencing of a GeoTIFF
    RasterInfo {
        raster: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        nodata: Option<f64>,
    },

    /// Write the selected config (or preset) as YAML
    WriteConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn format_slope(result: Option<f64>) -> String {
    result.map_or_else(|| "n/a".to_string(), |s| format!("{:.4}", s))
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref(), &cli.preset) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Analyze { survey, output_dir, csv, no_plots, nodata } => {
            cmd_analyze(&survey, &output_dir, csv, no_plots, nodata, &config)
        }
        Commands::FrameCheck { survey, frame, tolerance, output, points_csv } => {
            let points_csv = points_csv.as_deref();
            cmd_frame_check(&survey, &frame, tolerance, &output, points_csv, &config.render)
        }
        Commands::Map {
            survey,
            frame,
            x_min,
            x_max,
            y_min,
            y_max,
            max_elevation,
            vmin,
            vmax,
            title,
            output,
        } => {
            let mut region = max_elevation.map(below_elevation).unwrap_or_default();
            for band in [
                x_min.map(|v| Band::above(PointField::RotatedX, v)),
                x_max.map(|v| Band::below(PointField::RotatedX, v)),
                y_min.map(|v| Band::above(PointField::RotatedY, v)),
                y_max.map(|v| Band::below(PointField::RotatedY, v)),
            ]
            .into_iter()
            .flatten()
            {
                region = region.with(band);
            }
            cmd_map(&survey, &frame, &region, vmin, vmax, title, &output, &config.render)
        }
        Commands::Compare { bundle, survey } => cmd_compare(&bundle, survey.as_deref(), &config),
        Commands::RasterInfo { raster, nodata } => cmd_raster_info(&raster, nodata),
        Commands::WriteConfig { path } => cmd_write_config(&path, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, preset: &str) -> Result<SurveyConfig> {
    let config = match path {
        Some(path) => {
            let cfg = SurveyConfig::from_yaml(path)?;
            info!("Loaded config from: {}", path.display());
            cfg
        }
        None => {
            info!("Using preset: {}", preset);
            SurveyConfig::preset(preset)?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Load a point survey, rasterizing GeoTIFFs to one point per valid cell.
fn load_survey(path: &Path, nodata: Option<f64>) -> Result<PointCloud> {
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false);

    let cloud = if is_tiff {
        load_geotiff(path, nodata)
            .with_context(|| format!("failed to load raster {}", path.display()))?
            .to_point_cloud()
    } else {
        load_point_cloud(path).with_context(|| format!("failed to load survey {}", path.display()))?
    };
    info!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

fn framed_points(cloud: &PointCloud, frame: &FrameArgs) -> Result<Vec<TransformedPoint>> {
    let local = LocalFrame::new(frame.params()).context("invalid frame parameters")?;
    let validated = transform_validated(cloud, &local);
    if !validated.rejected.is_empty() {
        warn!("dropped {} records with non-finite coordinates", validated.rejected.len());
    }
    let mut points = validated.points;
    orient_cross_shore(&mut points, frame.orientation());
    Ok(points)
}

fn cmd_analyze(
    survey: &Path,
    output_dir: &Path,
    csv: bool,
    no_plots: bool,
    nodata: Option<f64>,
    config: &SurveyConfig,
) -> Result<()> {
    let start = Instant::now();

    println!("Analyzing survey '{}'...", config.name);
    println!("Input: {}", survey.display());
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Loading survey...");
    let cloud = match load_survey(survey, nodata) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Fitting transects...");
    let report = pipeline::run_survey(&cloud, config);
    spinner.finish_and_clear();
    let report = report?;

    if csv || !no_plots {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
    }

    let mut figures = 0;
    for (section, section_config) in report.sections.iter().zip(&config.sections) {
        if !no_plots {
            let rendered = pipeline::render_section(
                output_dir,
                &config.name,
                section,
                section_config,
                &config.render,
            );
            match rendered {
                Ok(paths) => figures += paths.len(),
                Err(e) => warn!("figures for section '{}' failed: {}", section.name, e),
            }
        }

        if csv {
            let stem = format!("{}_{}", config.name, section.name);
            let transects_path = output_dir.join(format!("{}_transects.csv", stem));
            write_transects_csv(&transects_path, &section.transects)?;
            write_fits_csv(&output_dir.join(format!("{}_fits.csv", stem)), &section.fits)?;
        }

        let slopes = section.transect_slopes();
        let mut items = vec![
            ("Transects", section.transects.len().to_string()),
            ("Member points", section.transects.total_points().to_string()),
            ("Fitted transects", slopes.len().to_string()),
            ("Mean slope", format_slope(finite_mean(&slopes))),
        ];
        for zone in &section.zones {
            items.push((
                zone.name.as_str(),
                format!(
                    "{} ({} pts)",
                    format_slope(zone.result.as_ref().ok().map(|f| f.slope)),
                    zone.point_count
                ),
            ));
        }
        if let Some(pooled) = &section.pooled {
            items.push(("Pooled slope", format_slope(pooled.as_ref().ok().map(|f| f.slope))));
        }
        print_summary(&format!("Section '{}'", section.name), &items);
    }

    print_summary(
        "Analysis Complete",
        &[
            ("Input file", survey.display().to_string()),
            ("Points loaded", report.input_points.to_string()),
            ("Points rejected", report.rejected_points.to_string()),
            ("Points in region", report.points.len().to_string()),
            ("Sections", report.sections.len().to_string()),
            ("Figures written", figures.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

/// Distance along the cross-shore axis reported by `frame-check`.
const FRAME_CHECK_AXIS_M: f64 = 100.0;

fn cmd_frame_check(
    survey: &Path,
    frame: &FrameArgs,
    tolerance: f64,
    output: &Path,
    points_csv: Option<&Path>,
    settings: &RenderSettings,
) -> Result<()> {
    use crate::processors::filtering::near_zero_elevation;

    let start = Instant::now();

    let spinner = create_spinner("Loading survey...");
    let cloud = load_survey(survey, None);
    spinner.finish_and_clear();
    let points = framed_points(&cloud?, frame)?;
    let (axis_northing, axis_easting) = frame.axis_point(FRAME_CHECK_AXIS_M)?;

    let contour = near_zero_elevation(tolerance).apply(&points);
    if let Some(csv_path) = points_csv {
        write_points_csv(csv_path, &contour)?;
    }

    visualization::plot_shoreline_check(output, &points, tolerance, settings)
        .with_context(|| format!("failed to render {}", output.display()))?;

    print_summary(
        "Frame Check Complete",
        &[
            ("Input file", survey.display().to_string()),
            ("Output PNG", output.display().to_string()),
            ("Origin northing", frame.origin_northing.to_string()),
            ("Origin easting", frame.origin_easting.to_string()),
            ("Rotation (deg)", frame.rotation_deg.to_string()),
            (
                "Cross-shore +100 m (N, E)",
                format!("{:.1}, {:.1}", axis_northing, axis_easting),
            ),
            ("Contour points", contour.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_map(
    survey: &Path,
    frame: &FrameArgs,
    region: &RegionFilter,
    vmin: f64,
    vmax: f64,
    title: Option<String>,
    output: &Path,
    settings: &RenderSettings,
) -> Result<()> {
    let start = Instant::now();

    let plot_title = title.unwrap_or_else(|| {
        survey
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Survey".to_string())
    });

    let spinner = create_spinner("Loading survey...");
    let cloud = load_survey(survey, None);
    spinner.finish_and_clear();
    let points = framed_points(&cloud?, frame)?;
    let selected = pipeline::select_region(&points, region);

    visualization::plot_plan_view(output, &selected, &plot_title, vmin, vmax, settings)
        .with_context(|| format!("failed to render {}", output.display()))?;

    print_summary(
        "Plan View Complete",
        &[
            ("Input file", survey.display().to_string()),
            ("Output PNG", output.display().to_string()),
            ("Points plotted", selected.len().to_string()),
            ("Color range", format!("{} to {} m", vmin, vmax)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_compare(bundle_path: &Path, survey: Option<&Path>, config: &SurveyConfig) -> Result<()> {
    let bundle = ModelBundle::from_json(bundle_path)?;
    let model_slopes = bundle.model_slopes()?;

    println!("Model slopes: {:?}", model_slopes);
    let mut items = vec![
        ("Bundle", bundle_path.display().to_string()),
        ("Model slopes", model_slopes.len().to_string()),
        ("Model mean slope", format_slope(finite_mean(model_slopes))),
        (
            "Model transects",
            bundle
                .transect_count()
                .map_or_else(|| "n/a".to_string(), |n| n.to_string()),
        ),
    ];

    if let Some(survey) = survey {
        let spinner = create_spinner("Analyzing survey...");
        let report =
            load_survey(survey, None).and_then(|cloud| pipeline::run_survey(&cloud, config));
        spinner.finish_and_clear();
        let report = report?;

        let fits = report.all_fits();
        if fits.is_empty() {
            bail!("config '{}' defines no sections to compare", config.name);
        }
        let comparison = compare_slopes(&fits, &bundle)?;
        items.extend([
            ("Lidar transects", comparison.lidar_count.to_string()),
            ("Lidar mean |slope|", format!("{:.4}", comparison.lidar_mean)),
            ("Model mean |slope|", format!("{:.4}", comparison.model_mean)),
            ("Difference", format!("{:+.4}", comparison.difference)),
        ]);
    }

    print_summary("Model Comparison", &items);
    Ok(())
}

fn cmd_raster_info(raster: &Path, nodata: Option<f64>) -> Result<()> {
    let grid = load_geotiff(raster, nodata)
        .with_context(|| format!("failed to load raster {}", raster.display()))?;
    let bounds = grid.bounds();
    let gt = grid.transform.as_array();

    println!("Geotransform: {:?}", gt);
    print_summary(
        "Raster Info",
        &[
            ("File", raster.display().to_string()),
            ("Width", grid.width.to_string()),
            ("Height", grid.height.to_string()),
            ("Pixel size", format!("{} x {}", gt[1], gt[5])),
            ("X range", format!("{:.3} to {:.3}", bounds.min_x, bounds.max_x)),
            ("Y range", format!("{:.3} to {:.3}", bounds.min_y, bounds.max_y)),
            ("Valid cells", grid.to_point_cloud().len().to_string()),
        ],
    );
    Ok(())
}

fn cmd_write_config(path: &Path, config: &SurveyConfig) -> Result<()> {
    config.to_yaml(path)?;
    println!("Wrote config '{}' to {}", config.name, path.display());
    Ok(())
}

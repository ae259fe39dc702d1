//! Beach slope analysis of airborne lidar surveys.
//!
//! This crate provides tools for:
//! - Loading LAS/CSV point clouds and GeoTIFF elevation rasters
//! - Projecting survey points into a shore-normal local frame
//! - Binning points into along-shore transects
//! - Least squares slope fits per transect and per cross-shore zone
//! - Comparing lidar slopes with shoreline model output
//! - Rendering profile and plan-view figures
//!
//! # Example
//!
//! ```no_run
//! use beach_slopes::core::loaders::load_point_cloud;
//! use beach_slopes::pipeline::run_survey;
//! use beach_slopes::SurveyConfig;
//!
//! let cloud = load_point_cloud("survey.las").unwrap();
//! let report = run_survey(&cloud, &SurveyConfig::camp_pendleton()).unwrap();
//! for section in &report.sections {
//!     println!("{}: {:?}", section.name, section.transect_slopes());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod processors;
pub mod visualization;

pub use config::{PlotLimits, SectionConfig, SurveyConfig, ZoneConfig};
pub use self::core::loaders::{PointCloud, PointRecord};
pub use self::core::transforms::{LocalFrameParameters, TransformedPoint};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

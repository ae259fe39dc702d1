//! Survey configuration: frame, region, sections, zones and figure settings.
//!
//! Configurations are plain YAML. The built-in presets reproduce the
//! Camp Pendleton and Camp Lejeune survey analyses.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::transforms::{CrossShoreOrientation, LocalFrame, LocalFrameParameters};
use crate::processors::filtering::{Band, PointField, RegionFilter};
use crate::processors::regression::SlopeChord;
use crate::processors::transects::{TransectError, TransectSpec};
use crate::visualization::{ProfilePlot, RenderSettings};

/// Errors raised while loading, saving or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid frame: {0}")]
    Frame(#[from] crate::core::transforms::TransformError),

    #[error("section '{section}': {source}")]
    Transects {
        section: String,
        #[source]
        source: TransectError,
    },

    #[error("section '{section}' zone '{zone}': invalid plot limits")]
    PlotLimits { section: String, zone: String },

    #[error("unknown preset '{0}' (expected camp-pendleton, camp-lejeune or pendleton-anatomy)")]
    UnknownPreset(String),
}

/// Axis window of a profile figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotLimits {
    pub xlim: (f64, f64),
    pub ylim: (f64, f64),
}

impl PlotLimits {
    pub fn new(xlim: (f64, f64), ylim: (f64, f64)) -> Self {
        Self { xlim, ylim }
    }

    fn is_valid(&self) -> bool {
        [self.xlim, self.ylim]
            .iter()
            .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi)
    }

    pub fn profile_plot(&self, title: impl Into<String>, smoothing: Option<usize>) -> ProfilePlot {
        ProfilePlot {
            title: title.into(),
            xlim: self.xlim,
            ylim: self.ylim,
            smoothing,
            chords: Vec::new(),
        }
    }
}

/// A cross-shore zone (beach face, surf zone, bar...) fitted as one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,

    /// Bands selecting the zone's points from the section's transects.
    #[serde(default)]
    pub bands: Vec<Band>,

    pub plot: PlotLimits,

    /// Rolling-mean window for the drawn profiles
    #[serde(default)]
    pub smoothing: Option<usize>,

    /// Annotated chord slopes drawn over the profiles.
    #[serde(default)]
    pub chords: Vec<SlopeChord>,
}

impl ZoneConfig {
    pub fn new(name: &str, bands: Vec<Band>, plot: PlotLimits) -> Self {
        Self {
            name: name.to_string(),
            bands,
            plot,
            smoothing: None,
            chords: Vec::new(),
        }
    }

    pub fn filter(&self) -> RegionFilter {
        RegionFilter::from_bands(self.bands.clone())
    }

    /// Figure options for this zone: its limits, smoothing and chords.
    pub fn profile_plot(&self, title: impl Into<String>) -> ProfilePlot {
        ProfilePlot {
            chords: self.chords.clone(),
            ..self.plot.profile_plot(title, self.smoothing)
        }
    }
}

/// One along-shore stretch of beach sampled into transects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,

    pub transects: TransectSpec,

    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    /// Fit every point of the surveyed region at once and plot it with
    /// these limits.
    #[serde(default)]
    pub pooled: Option<PlotLimits>,
}

fn default_survey_name() -> String {
    "survey".to_string()
}

/// Full analysis configuration for one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default = "default_survey_name")]
    pub name: String,

    pub frame: LocalFrameParameters,

    #[serde(default)]
    pub orientation: CrossShoreOrientation,

    /// Bands applied to every transformed point before sectioning.
    #[serde(default)]
    pub region: Vec<Band>,

    #[serde(default)]
    pub sections: Vec<SectionConfig>,

    #[serde(default)]
    pub render: RenderSettings,
}

impl SurveyConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the frame, every transect spec and every plot window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        LocalFrame::new(self.frame)?;
        for section in &self.sections {
            section
                .transects
                .validate()
                .map_err(|source| ConfigError::Transects {
                    section: section.name.clone(),
                    source,
                })?;
            let zone_limits = section.zones.iter().map(|z| (z.name.as_str(), &z.plot));
            let pooled_limits = section.pooled.iter().map(|p| ("pooled", p));
            for (zone, limits) in zone_limits.chain(pooled_limits) {
                if !limits.is_valid() {
                    return Err(ConfigError::PlotLimits {
                        section: section.name.clone(),
                        zone: zone.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn region_filter(&self) -> RegionFilter {
        RegionFilter::from_bands(self.region.clone())
    }

    /// Look up a built-in preset by its command-line name.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "camp-pendleton" => Ok(Self::camp_pendleton()),
            "camp-lejeune" => Ok(Self::camp_lejeune()),
            "pendleton-anatomy" => Ok(Self::pendleton_anatomy()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// 2014 USACE survey of Camp Pendleton: AVTB, Red and unnamed beaches.
    pub fn camp_pendleton() -> Self {
        let beach_plot = PlotLimits::new((-150.0, 100.0), (-5.0, 6.0));
        let surf_plot = PlotLimits::new((-800.0, 50.0), (-12.0, 4.0));

        let section = |name: &str, y_min: f64, y_max: f64, gap: f64, surf: PlotLimits| {
            let across = |min: f64, max: f64| vec![Band::between(PointField::RotatedX, min, max)];
            SectionConfig {
                name: name.to_string(),
                transects: TransectSpec::new(y_min, y_max, 1.0, gap),
                zones: vec![
                    ZoneConfig::new("beach", across(-100.0, 65.0), beach_plot),
                    ZoneConfig::new("surf", across(-800.0, 10.0), surf),
                ],
                pooled: None,
            }
        };

        Self {
            name: "camp-pendleton".to_string(),
            frame: LocalFrameParameters::new(3_678_000.0, 460_500.0, 35.0),
            orientation: CrossShoreOrientation::AsRotated,
            region: Vec::new(),
            sections: vec![
                section("avtb", 6520.0, 7200.0, 100.0, surf_plot),
                section("red", 5100.0, 5500.0, 50.0, surf_plot),
                section(
                    "noname",
                    7100.0,
                    7400.0,
                    50.0,
                    PlotLimits::new((-1200.0, 500.0), (-12.0, 20.0)),
                ),
            ],
            render: RenderSettings::default(),
        }
    }

    /// 2014 NGS post-Sandy topobathy survey of Camp Lejeune.
    pub fn camp_lejeune() -> Self {
        Self {
            name: "camp-lejeune".to_string(),
            frame: LocalFrameParameters::new(3_825_700.0, 289_000.0, 305.0),
            orientation: CrossShoreOrientation::AsRotated,
            region: vec![
                Band::above(PointField::RotatedX, 0.0),
                Band::between(PointField::RotatedY, 1000.0, 2200.0),
            ],
            sections: vec![SectionConfig {
                name: "beach".to_string(),
                transects: TransectSpec::new(1100.0, 2200.0, 1.0, 100.0),
                zones: Vec::new(),
                pooled: Some(PlotLimits::new((0.0, 140.0), (-10.0, 10.0))),
            }],
            render: RenderSettings::default(),
        }
    }

    /// Zone-by-zone profile of the unnamed Pendleton beach, cross-shore
    /// distance increasing offshore.
    pub fn pendleton_anatomy() -> Self {
        let detail = PlotLimits::new((-90.0, 40.0), (-4.0, 4.0));
        let overview = PlotLimits::new((-100.0, 1000.0), (-12.0, 7.0));
        let across = |min: f64, max: f64| vec![Band::between(PointField::RotatedX, min, max)];

        let zones = vec![
            ZoneConfig::new("beach", across(-35.0, 78.0), detail),
            // tidal range of +/- 1 m
            ZoneConfig::new(
                "beach2",
                vec![Band::between(PointField::ElevationM, -1.0, 1.1)],
                detail,
            ),
            ZoneConfig::new("surf", across(-10.0, 800.0), overview),
            ZoneConfig::new("surf2", across(0.0, 280.0), overview),
            ZoneConfig::new("bar", across(190.0, 350.0), overview),
            ZoneConfig {
                chords: vec![
                    SlopeChord::new("littoral slope", (0.0, 0.0), (1250.0, -11.8)),
                    SlopeChord::new("surf zone slope", (0.0, 0.0), (340.0, -4.0)),
                    SlopeChord::new("beach slope", (71.0, -1.0), (-43.0, 1.0)),
                    SlopeChord::new("sand bar slope", (190.0, -1.9), (350.0, -6.0)),
                ],
                ..ZoneConfig::new("littoral", across(0.0, 1200.0), overview)
            },
        ]
        .into_iter()
        .map(|zone| ZoneConfig {
            smoothing: Some(10),
            ..zone
        })
        .collect();

        Self {
            name: "pendleton-anatomy".to_string(),
            frame: LocalFrameParameters::new(3_678_000.0, 460_500.0, 35.0),
            orientation: CrossShoreOrientation::Mirrored,
            region: Vec::new(),
            sections: vec![SectionConfig {
                name: "noname".to_string(),
                transects: TransectSpec::new(7100.0, 7400.0, 1.0, 20.0),
                zones,
                pooled: None,
            }],
            render: RenderSettings::default(),
        }
    }
}

//! Loaders for lidar survey point clouds.
//!
//! This module provides:
//! - ASPRS LAS survey files (via the `las` crate)
//! - Delimited XYZ text exports with easting, northing and elevation columns
//!
//! All loaders produce the same columnar [`PointCloud`] in the survey's own
//! planar horizontal datum and metre-based vertical datum.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use las::{Read, Reader};
use log::debug;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("LAS decoding error in {path}: {message}")]
    Las { path: PathBuf, message: String },

    #[error("TIFF decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Unsupported point cloud format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Raster has no georeferencing tags: {0}")]
    MissingGeoreference(PathBuf),

    #[error("Unsupported raster sample format in {0}")]
    UnsupportedSampleFormat(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// One surveyed point in real-world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    /// Metres east in the survey's planar projection.
    pub easting: f64,
    /// Metres north in the survey's planar projection.
    pub northing: f64,
    /// Metres above the vertical datum (negative below).
    pub elevation_m: f64,
}

impl PointRecord {
    pub fn new(easting: f64, northing: f64, elevation_m: f64) -> Self {
        Self {
            easting,
            northing,
            elevation_m,
        }
    }
}

/// Columnar container for a loaded survey.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub easting: Vec<f64>,
    pub northing: Vec<f64>,
    pub elevation_m: Vec<f64>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            easting: Vec::with_capacity(capacity),
            northing: Vec::with_capacity(capacity),
            elevation_m: Vec::with_capacity(capacity),
        }
    }

    /// Builds a cloud from row records, preserving their order.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PointRecord>,
    {
        let mut cloud = Self::new();
        for record in records {
            cloud.push(record.easting, record.northing, record.elevation_m);
        }
        cloud
    }

    /// Returns the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.easting.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.easting.is_empty()
    }

    #[inline]
    pub fn push(&mut self, easting: f64, northing: f64, elevation_m: f64) {
        self.easting.push(easting);
        self.northing.push(northing);
        self.elevation_m.push(elevation_m);
    }

    /// Returns the record at `index`, if any.
    pub fn get(&self, index: usize) -> Option<PointRecord> {
        Some(PointRecord {
            easting: *self.easting.get(index)?,
            northing: *self.northing.get(index)?,
            elevation_m: *self.elevation_m.get(index)?,
        })
    }

    /// Iterates over the cloud as row records.
    pub fn iter(&self) -> impl Iterator<Item = PointRecord> + '_ {
        self.easting
            .iter()
            .zip(&self.northing)
            .zip(&self.elevation_m)
            .map(|((&easting, &northing), &elevation_m)| PointRecord {
                easting,
                northing,
                elevation_m,
            })
    }
}

/// Load a lidar survey from an ASPRS LAS file.
///
/// The file is expected to be referenced to a planar (e.g. UTM) horizontal
/// datum and a metre-based vertical datum; scaled x/y/z become
/// easting/northing/elevation.
///
/// # Errors
///
/// Returns an error if the file is missing, cannot be decoded, or holds no
/// points.
pub fn load_las<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    // Opening ourselves keeps a missing file an Io error rather than a LAS one.
    let file = File::open(path)?;
    let mut reader = Reader::new(BufReader::new(file)).map_err(|e| LoadError::Las {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let expected = reader.header().number_of_points() as usize;
    let mut cloud = PointCloud::with_capacity(expected);

    for point in reader.points() {
        let point = point.map_err(|e| LoadError::Las {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cloud.push(point.x, point.y, point.z);
    }

    if cloud.is_empty() {
        return Err(LoadError::EmptyFile(path.to_path_buf()));
    }

    debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

fn find_column(col_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| col_map.get(*name).copied())
}

/// Load a survey from a delimited text export.
///
/// The file must have a header row. Columns are matched case-insensitively:
/// `easting` or `x`, `northing` or `y`, and `elevation_m`, `elevation` or `z`.
/// Comma and semicolon delimiters are both accepted; the delimiter is sniffed
/// from the header line.
///
/// # Errors
///
/// Returns an error if a channel is missing, a value fails to parse, or the
/// file has no data rows.
pub fn load_xyz_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let mut header_line = String::new();
    if BufReader::new(File::open(path)?).read_line(&mut header_line)? == 0 {
        return Err(LoadError::EmptyFile(path.to_path_buf()));
    }
    let delimiter = if header_line.contains(';') { b';' } else { b',' };

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let mut missing = Vec::new();
    let e_idx = find_column(&col_map, &["easting", "x"]);
    let n_idx = find_column(&col_map, &["northing", "y"]);
    let z_idx = find_column(&col_map, &["elevation_m", "elevation", "z"]);
    if e_idx.is_none() {
        missing.push("easting");
    }
    if n_idx.is_none() {
        missing.push("northing");
    }
    if z_idx.is_none() {
        missing.push("elevation_m");
    }
    let (Some(e_idx), Some(n_idx), Some(z_idx)) = (e_idx, n_idx, z_idx) else {
        return Err(LoadError::MissingColumns(missing.join(", ")));
    };

    let mut cloud = PointCloud::with_capacity(10_000);

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());

        let parse = |idx: usize, name: &str| -> Result<f64> {
            let raw = record.get(idx).ok_or_else(|| LoadError::Parse {
                line,
                message: format!("missing {} value", name),
            })?;
            raw.parse().map_err(|_| LoadError::Parse {
                line,
                message: format!("invalid {} value: {}", name, raw),
            })
        };

        let easting = parse(e_idx, "easting")?;
        let northing = parse(n_idx, "northing")?;
        let elevation = parse(z_idx, "elevation")?;
        cloud.push(easting, northing, elevation);
    }

    if cloud.is_empty() {
        return Err(LoadError::EmptyFile(path.to_path_buf()));
    }

    debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Load a survey, picking the decoder from the file extension.
pub fn load_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "las" | "laz" => load_las(path),
        "csv" | "txt" | "xyz" => load_xyz_csv(path),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

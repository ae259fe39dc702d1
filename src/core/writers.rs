//! CSV writers for transformed points, transects and slope fits.
//!
//! Every writer creates missing parent directories and buffers its output.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::transforms::TransformedPoint;
use crate::processors::regression::TransectFit;
use crate::processors::transects::TransectSet;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a CSV writer on `path` after creating its parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn finish(mut writer: csv::Writer<BufWriter<File>>, path_str: String) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })
}

fn point_fields(p: &TransformedPoint) -> [String; 5] {
    [
        format!("{:.3}", p.easting),
        format!("{:.3}", p.northing),
        format!("{:.3}", p.elevation_m),
        format!("{:.3}", p.rotated_x),
        format!("{:.3}", p.rotated_y),
    ]
}

/// Write transformed points with both world and shore-normal coordinates.
///
/// Columns: `easting,northing,elevation_m,rotated_x,rotated_y`.
///
/// # Errors
///
/// Returns an error if the parent directories or the file cannot be created,
/// or a row cannot be written.
pub fn write_points_csv(path: &Path, points: &[TransformedPoint]) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record(["easting", "northing", "elevation_m", "rotated_x", "rotated_y"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for p in points {
        csv_writer
            .write_record(&point_fields(p))
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    finish(csv_writer, path_str)
}

/// Write every transect member, tagged with its transect id.
///
/// A point shared by two overlapping transects appears once per transect.
/// Columns: `transect_id,easting,northing,elevation_m,rotated_x,rotated_y`.
///
/// # Errors
///
/// Returns an error if the parent directories or the file cannot be created,
/// or a row cannot be written.
pub fn write_transects_csv(path: &Path, set: &TransectSet) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record([
            "transect_id",
            "easting",
            "northing",
            "elevation_m",
            "rotated_x",
            "rotated_y",
        ])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (transect_id, p) in set.iter_points() {
        let [easting, northing, elevation, x, y] = point_fields(p);
        csv_writer
            .write_record(&[transect_id.to_string(), easting, northing, elevation, x, y])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    finish(csv_writer, path_str)
}

/// Write one row per transect fit.
///
/// Failed fits keep their row with empty statistics and the failure message
/// in the `error` column.
///
/// # Errors
///
/// Returns an error if the parent directories or the file cannot be created,
/// or a row cannot be written.
pub fn write_fits_csv(path: &Path, fits: &[TransectFit]) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record([
            "transect_id",
            "point_count",
            "slope",
            "intercept",
            "r",
            "p_value",
            "std_err",
            "error",
        ])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for fit in fits {
        let mut row = vec![fit.transect_id.to_string(), fit.point_count.to_string()];
        match &fit.result {
            Ok(f) => {
                row.extend([
                    format!("{:.6}", f.slope),
                    format!("{:.6}", f.intercept),
                    format!("{:.6}", f.correlation),
                    format!("{:.6e}", f.p_value),
                    format!("{:.6}", f.std_err),
                    String::new(),
                ]);
            }
            Err(e) => {
                row.extend(std::iter::repeat(String::new()).take(5));
                row.push(e.source.to_string());
            }
        }
        csv_writer.write_record(&row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    finish(csv_writer, path_str)
}

//! GeoTIFF bathymetry grids.
//!
//! A raster is decoded into an [`ElevationGrid`] plus its affine
//! [`GeoTransform`]. Grids can be flattened into a [`PointCloud`] so raster
//! bathymetry runs through the same frame transform and transect builder as
//! lidar points.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::loaders::{LoadError, PointCloud, Result};

/// Affine pixel-to-world mapping in GDAL coefficient order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub column_rotation: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

/// World-coordinate extent of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl GeoTransform {
    pub fn from_array(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            column_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.column_rotation,
            self.pixel_height,
        ]
    }

    /// World coordinates of a (possibly fractional) pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.column_rotation + row * self.pixel_height,
        )
    }

    /// Corner extent of a `width` x `height` raster.
    ///
    /// Assumes a north-up layout where the origin is the top-left corner.
    pub fn bounds(&self, width: usize, height: usize) -> RasterBounds {
        let (w, h) = (width as f64, height as f64);
        RasterBounds {
            min_x: self.origin_x,
            min_y: self.origin_y + w * self.column_rotation + h * self.pixel_height,
            max_x: self.origin_x + w * self.pixel_width + h * self.row_rotation,
            max_y: self.origin_y,
        }
    }
}

/// Single-band elevation raster.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    pub width: usize,
    pub height: usize,
    /// Row-major samples, `height` rows of `width` values.
    pub data: Vec<f64>,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
}

impl ElevationGrid {
    /// Sample at `(col, row)`; `None` out of range or for nodata cells.
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let value = self.data[row * self.width + col];
        if self.is_valid(value) {
            Some(value)
        } else {
            None
        }
    }

    fn is_valid(&self, value: f64) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nd| value != nd)
    }

    pub fn bounds(&self) -> RasterBounds {
        self.transform.bounds(self.width, self.height)
    }

    /// One record per valid cell, located at the cell centre.
    pub fn to_point_cloud(&self) -> PointCloud {
        let mut cloud = PointCloud::with_capacity(self.data.len());
        for row in 0..self.height {
            for col in 0..self.width {
                let value = self.data[row * self.width + col];
                if !self.is_valid(value) {
                    continue;
                }
                let (x, y) = self
                    .transform
                    .pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
                cloud.push(x, y, value);
            }
        }
        cloud
    }
}

/// Build the geotransform from GeoTIFF model tags.
///
/// ModelTransformation wins when present; otherwise the first tiepoint and
/// the pixel scale are combined into a north-up transform.
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform> {
    if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(GeoTransform::from_array([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            // Tiepoint (i, j, k, x, y, z) anchors raster (i, j) to world (x, y).
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            Ok(GeoTransform::from_array([
                x - i * scale[0],
                scale[0],
                0.0,
                y + j * scale[1],
                0.0,
                -scale[1],
            ]))
        }
        _ => Err(LoadError::MissingGeoreference(path.to_path_buf())),
    }
}

fn samples_to_f64(result: DecodingResult, path: &Path) -> Result<Vec<f64>> {
    let data = match result {
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        _ => return Err(LoadError::UnsupportedSampleFormat(path.to_path_buf())),
    };
    Ok(data)
}

/// Samples per pixel, rejecting band-sequential layouts.
fn interleaved_band_count<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<usize> {
    let samples_per_pixel = match decoder.find_tag(Tag::SamplesPerPixel)? {
        Some(value) => value.into_u32()? as usize,
        None => 1,
    };
    let planar_configuration = match decoder.find_tag(Tag::PlanarConfiguration)? {
        Some(value) => value.into_u16()?,
        None => 1,
    };
    if samples_per_pixel == 0 || (samples_per_pixel > 1 && planar_configuration != 1) {
        return Err(LoadError::UnsupportedSampleFormat(path.to_path_buf()));
    }
    Ok(samples_per_pixel)
}

/// Load band 1 of a GeoTIFF as an elevation grid.
///
/// # Arguments
///
/// * `path` - Path to the GeoTIFF
/// * `nodata` - Sentinel value to treat as missing, if the product uses one
///
/// # Errors
///
/// Returns an error if the file cannot be decoded, carries no
/// georeferencing, or stores its bands as separate planes.
pub fn load_geotiff<P: AsRef<Path>>(path: P, nodata: Option<f64>) -> Result<ElevationGrid> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let transform = read_geotransform(&mut decoder, path)?;
    let bands = interleaved_band_count(&mut decoder, path)?;
    let data = samples_to_f64(decoder.read_image()?, path)?;

    let (width, height) = (width as usize, height as usize);
    if data.len() < width * height * bands {
        return Err(LoadError::UnsupportedSampleFormat(path.to_path_buf()));
    }

    debug!(
        "Loaded {}x{} raster ({} band(s)) from {} with transform {:?}",
        width,
        height,
        bands,
        path.display(),
        transform.as_array()
    );

    Ok(ElevationGrid {
        width,
        height,
        data: data.into_iter().step_by(bands).take(width * height).collect(),
        transform,
        nodata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;
    use tiff::encoder::{colortype, ImageEncoder, TiffEncoder, TiffKind};

    const PIXEL_SCALE: [f64; 3] = [2.0, 2.0, 0.0];
    const TIEPOINT: [f64; 6] = [0.0, 0.0, 0.0, 460_000.0, 3_680_000.0, 0.0];

    fn georeference<W, C, K>(image: &mut ImageEncoder<'_, W, C, K>)
    where
        W: std::io::Write + std::io::Seek,
        C: colortype::ColorType,
        K: TiffKind,
    {
        let dir = image.encoder();
        dir.write_tag(Tag::ModelPixelScaleTag, &PIXEL_SCALE[..]).unwrap();
        dir.write_tag(Tag::ModelTiepointTag, &TIEPOINT[..]).unwrap();
    }

    fn north_up() -> GeoTransform {
        GeoTransform::from_array([460_000.0, 2.0, 0.0, 3_680_000.0, 0.0, -2.0])
    }

    #[test]
    fn test_geotransform_array_order() {
        let gt = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(GeoTransform::from_array(gt).as_array(), gt);
    }

    #[test]
    fn test_bounds_north_up() {
        let bounds = north_up().bounds(100, 50);
        assert_relative_eq!(bounds.min_x, 460_000.0);
        assert_relative_eq!(bounds.max_x, 460_200.0);
        assert_relative_eq!(bounds.max_y, 3_680_000.0);
        assert_relative_eq!(bounds.min_y, 3_679_900.0);
    }

    #[test]
    fn test_pixel_to_world() {
        let (x, y) = north_up().pixel_to_world(10.0, 5.0);
        assert_relative_eq!(x, 460_020.0);
        assert_relative_eq!(y, 3_679_990.0);
    }

    #[test]
    fn test_grid_skips_nodata_cells() {
        let grid = ElevationGrid {
            width: 2,
            height: 2,
            data: vec![-1.0, -9999.0, f64::NAN, 3.0],
            transform: north_up(),
            nodata: Some(-9999.0),
        };

        assert_eq!(grid.get(0, 0), Some(-1.0));
        assert_eq!(grid.get(1, 0), None);
        assert_eq!(grid.get(0, 1), None);
        assert_eq!(grid.get(2, 0), None);

        let cloud = grid.to_point_cloud();
        assert_eq!(cloud.len(), 2);
        assert_relative_eq!(cloud.easting[0], 460_001.0);
        assert_relative_eq!(cloud.northing[0], 3_679_999.0);
        assert_relative_eq!(cloud.elevation_m[1], 3.0);
        assert_relative_eq!(cloud.easting[1], 460_003.0);
        assert_relative_eq!(cloud.northing[1], 3_679_997.0);
    }

    #[test]
    fn test_load_geotiff_single_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bathy.tif");
        let mut tiff = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        let mut image = tiff.new_image::<colortype::Gray32Float>(2, 2).unwrap();
        georeference(&mut image);
        image.write_data(&[-1.5f32, -2.0, -9999.0, 0.25]).unwrap();

        let grid = load_geotiff(&path, Some(-9999.0)).unwrap();
        assert_eq!((grid.width, grid.height), (2, 2));
        assert_eq!(grid.data, vec![-1.5, -2.0, -9999.0, 0.25]);
        assert_eq!(grid.transform, north_up());
        assert_eq!(grid.to_point_cloud().len(), 3);
    }

    #[test]
    fn test_load_geotiff_keeps_first_interleaved_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let mut tiff = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        let mut image = tiff.new_image::<colortype::RGB8>(2, 2).unwrap();
        georeference(&mut image);
        image
            .write_data(&[10u8, 1, 2, 20, 1, 2, 30, 1, 2, 40, 1, 2])
            .unwrap();

        let grid = load_geotiff(&path, None).unwrap();
        assert_eq!(grid.data, vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(grid.get(1, 1), Some(40.0));
    }

    #[test]
    fn test_load_geotiff_missing_file() {
        assert!(matches!(
            load_geotiff("/no/such/bathy.tif", None),
            Err(LoadError::Io(_))
        ));
    }
}

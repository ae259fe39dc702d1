//! Survey I/O and the shore-normal coordinate frame.

pub mod loaders;
pub mod raster;
pub mod transforms;
pub mod writers;

pub use loaders::{load_point_cloud, LoadError, PointCloud, PointRecord};
pub use raster::{load_geotiff, ElevationGrid, GeoTransform};
pub use transforms::{
    transform, transform_validated, LocalFrame, LocalFrameParameters, TransformedPoint,
};
pub use writers::{write_fits_csv, write_points_csv, write_transects_csv, WriteError};

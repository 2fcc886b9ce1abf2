//! Common geospatial types shared across the esm-products workspace.

pub mod bbox;
pub mod crs;
pub mod geotransform;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use geotransform::GeoTransform;

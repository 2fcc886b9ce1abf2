//! Coordinate Reference System types.
//!
//! Products are only ever emitted on a geographic WGS-84 grid, so the code
//! set is deliberately closed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OGC WKT for EPSG:4326, as written into `spatial_ref` attributes.
const EPSG_4326_WKT: &str = concat!(
    "GEOGCS[\"WGS 84\",",
    "DATUM[\"WGS_1984\",",
    "SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],",
    "AUTHORITY[\"EPSG\",\"6326\"]],",
    "PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],",
    "UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],",
    "AXIS[\"Latitude\",NORTH],",
    "AXIS[\"Longitude\",EAST],",
    "AUTHORITY[\"EPSG\",\"4326\"]]"
);

/// Supported CRS codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    #[default]
    Epsg4326,
}

impl CrsCode {
    /// Well-known text for this CRS.
    pub fn wkt(&self) -> &'static str {
        match self {
            CrsCode::Epsg4326 => EPSG_4326_WKT,
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

//! Geographic extent of a product grid.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Smallest box enclosing every finite sample of both coordinate axes.
    ///
    /// Returns `None` when either axis has no finite value.
    pub fn from_coordinates(lons: &[f64], lats: &[f64]) -> Option<Self> {
        let (min_lon, max_lon) = finite_range(lons)?;
        let (min_lat, max_lat) = finite_range(lats)?;
        Some(Self::new(min_lon, min_lat, max_lon, max_lat))
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

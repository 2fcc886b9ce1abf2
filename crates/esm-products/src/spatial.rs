//! Latitude/longitude grid normalization.
//!
//! Latitude is emitted north-to-south with its two extreme samples
//! re-extrapolated from their interior neighbours (the source grids carry a
//! one-sample edge registration error). Longitude is wrapped into the
//! [-180, 180] convention and emitted west-to-east without edge correction.

use esm_common::{BoundingBox, CrsCode, GeoTransform};
use ndarray::{ArrayD, Axis};
use serde::Serialize;

use crate::dims::{LAT, LON};
use crate::error::{EngineError, Result};

/// Minimum latitude samples for edge correction.
pub const MIN_LAT_SAMPLES: usize = 3;

/// Minimum longitude samples for a spacing estimate.
pub const MIN_LON_SAMPLES: usize = 2;

/// A sort permutation over one coordinate axis and the corrected values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialIndex {
    /// Original coordinate index for each output position
    pub order: Vec<usize>,
    /// Output coordinate values
    pub corrected_values: Vec<f64>,
}

impl SpatialIndex {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reindex `array` along `axis` so that output position `i` holds source
    /// position `order[i]`.
    pub fn reindex<T: Clone>(&self, array: &ArrayD<T>, axis: usize) -> Result<ArrayD<T>> {
        if axis >= array.ndim() || array.len_of(Axis(axis)) != self.order.len() {
            return Err(EngineError::Shape {
                variable: String::new(),
                shape: array.shape().to_vec(),
                dimensions: array.ndim(),
            });
        }
        Ok(array.select(Axis(axis), &self.order))
    }
}

/// Sort latitude descending and correct the two edge samples.
pub fn normalize_latitude(raw: &[f64]) -> Result<SpatialIndex> {
    if raw.len() < MIN_LAT_SAMPLES {
        return Err(EngineError::GridTooSmall {
            axis: LAT,
            len: raw.len(),
            min: MIN_LAT_SAMPLES,
        });
    }

    let mut order: Vec<usize> = (0..raw.len()).collect();
    order.sort_by(|&a, &b| raw[b].total_cmp(&raw[a]));
    let mut v: Vec<f64> = order.iter().map(|&i| raw[i]).collect();

    let n = v.len();
    v[0] = v[1] + (v[1] - v[2]);
    v[n - 1] = v[n - 2] - (v[n - 3] - v[n - 2]);

    ensure_monotonic(LAT, &v, |a, b| a > b)?;
    Ok(SpatialIndex {
        order,
        corrected_values: v,
    })
}

/// Wrap longitudes above 180 by -360 and sort ascending.
pub fn normalize_longitude(raw: &[f64]) -> Result<SpatialIndex> {
    if raw.is_empty() {
        return Err(EngineError::GridTooSmall {
            axis: LON,
            len: 0,
            min: 1,
        });
    }

    let wrapped: Vec<f64> = raw
        .iter()
        .map(|&v| if v > 180.0 { v - 360.0 } else { v })
        .collect();

    let mut order: Vec<usize> = (0..wrapped.len()).collect();
    order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
    let v: Vec<f64> = order.iter().map(|&i| wrapped[i]).collect();

    ensure_monotonic(LON, &v, |a, b| a < b)?;
    Ok(SpatialIndex {
        order,
        corrected_values: v,
    })
}

fn ensure_monotonic(axis: &str, values: &[f64], ordered: impl Fn(f64, f64) -> bool) -> Result<()> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(EngineError::InvalidGrid(format!(
            "{} value at position {} is not finite",
            axis, i
        )));
    }
    match values.windows(2).position(|w| !ordered(w[0], w[1])) {
        Some(i) => Err(EngineError::InvalidGrid(format!(
            "{} values {} and {} at positions {} and {} are not strictly monotonic",
            axis,
            values[i],
            values[i + 1],
            i,
            i + 1
        ))),
        None => Ok(()),
    }
}

/// Grid-mapping information for a corrected grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMapping {
    pub geotransform: GeoTransform,
    pub crs: CrsCode,
}

/// Affine transform of the corrected grid, anchored at the upper-left corner.
///
/// The corner sits half a cell west of `lon[0]` and half a cell north of
/// `lat[0]`, so pixel centre (0.5, 0.5) maps back to the first sample.
/// Latitude spacing comes from two interior samples so the re-extrapolated
/// extremes never feed the estimate.
pub fn grid_transform(lat: &[f64], lon: &[f64]) -> Result<GridMapping> {
    if lat.len() < MIN_LAT_SAMPLES {
        return Err(EngineError::GridTooSmall {
            axis: LAT,
            len: lat.len(),
            min: MIN_LAT_SAMPLES,
        });
    }
    if lon.len() < MIN_LON_SAMPLES {
        return Err(EngineError::GridTooSmall {
            axis: LON,
            len: lon.len(),
            min: MIN_LON_SAMPLES,
        });
    }

    let dlon = lon[1] - lon[0];
    let dlat = lat[2] - lat[1];

    Ok(GridMapping {
        geotransform: GeoTransform::north_up(lon[0] - dlon / 2.0, dlon, lat[0] - dlat / 2.0, dlat),
        crs: CrsCode::Epsg4326,
    })
}

/// Normalized lat/lon axes of one source grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialGrid {
    pub lat: SpatialIndex,
    pub lon: SpatialIndex,
    pub mapping: GridMapping,
}

impl SpatialGrid {
    /// Normalize both axes; the transform is computed from the finalized
    /// corrected values.
    pub fn from_coordinates(raw_lat: &[f64], raw_lon: &[f64]) -> Result<Self> {
        let lat = normalize_latitude(raw_lat)?;
        let lon = normalize_longitude(raw_lon)?;
        let mapping = grid_transform(&lat.corrected_values, &lon.corrected_values)?;
        Ok(Self { lat, lon, mapping })
    }

    /// Geographic extent of the corrected sample centres.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_coordinates(&self.lon.corrected_values, &self.lat.corrected_values)
    }

    /// Reindex both horizontal axes of an array already in canonical axis
    /// order (lat second-to-last, lon last).
    pub fn reindex_canonical<T: Clone>(&self, array: &ArrayD<T>) -> Result<ArrayD<T>> {
        let ndim = array.ndim();
        if ndim < 2 {
            return Err(EngineError::Shape {
                variable: String::new(),
                shape: array.shape().to_vec(),
                dimensions: ndim,
            });
        }
        let out = self.lat.reindex(array, ndim - 2)?;
        self.lon.reindex(&out, ndim - 1)
    }
}

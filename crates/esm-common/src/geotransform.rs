//! Affine grid transforms in the GDAL six-coefficient convention.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine mapping from (column, row) pixel indices to (lon, lat).
///
/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
///
/// Anchored at the upper-left pixel corner, so `pixel_height` is negative
/// for north-up grids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a north-up transform without rotation terms.
    pub fn north_up(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// The six coefficients in GDAL order.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Geographic position of fractional pixel coordinates. Whole numbers
    /// are pixel corners; `x.5` is a pixel centre.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }
}

/// Space-separated GDAL form, as stored in the `GeoTransform` attribute.
impl fmt::Display for GeoTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.coefficients();
        write!(f, "{} {} {} {} {} {}", a, b, c, d, e, g)
    }
}

//! Canonical axis ordering.
//!
//! Every spatially indexed output variable has latitude as its second-to-last
//! axis and longitude as its last, whatever order the source declared. Other
//! axes keep their relative order.

use ndarray::{ArrayD, IxDyn};
use tracing::warn;

use crate::error::{EngineError, Result};

pub const LAT: &str = "lat";
pub const LON: &str = "lon";

/// Which of the two horizontal axes a dimension tuple carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAxes {
    /// Both lat and lon
    Both,
    /// Exactly one of them
    Partial,
    /// Neither
    None,
}

impl SpatialAxes {
    pub fn classify<S: AsRef<str>>(axes: &[S]) -> Self {
        let has_lat = axes.iter().any(|a| a.as_ref() == LAT);
        let has_lon = axes.iter().any(|a| a.as_ref() == LON);
        match (has_lat, has_lon) {
            (true, true) => Self::Both,
            (false, false) => Self::None,
            _ => Self::Partial,
        }
    }
}

/// Output axis order as indices into the original axes.
///
/// Output axis `i` is original axis `order[i]`; always a bijection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPermutation {
    order: Vec<usize>,
}

impl AxisPermutation {
    /// Identity permutation over `n` axes.
    pub fn identity(n: usize) -> Self {
        Self {
            order: (0..n).collect(),
        }
    }

    /// Canonical permutation for a dimension-name tuple.
    ///
    /// Tuples lacking either lat or lon map to the identity; a tuple with
    /// only one of them is logged as unexpected.
    pub fn for_axes<S: AsRef<str>>(axes: &[S]) -> Self {
        match SpatialAxes::classify(axes) {
            SpatialAxes::None => Self::identity(axes.len()),
            SpatialAxes::Partial => {
                let names: Vec<&str> = axes.iter().map(|a| a.as_ref()).collect();
                warn!(axes = ?names, "Only one of lat/lon present, keeping source axis order");
                Self::identity(axes.len())
            }
            SpatialAxes::Both => {
                let position = |name: &str| axes.iter().position(|a| a.as_ref() == name);
                let mut order: Vec<usize> = axes
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.as_ref() != LAT && a.as_ref() != LON)
                    .map(|(i, _)| i)
                    .collect();
                order.extend(position(LAT));
                order.extend(position(LON));
                Self { order }
            }
        }
    }

    /// Original-axis indices in output order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(i, &o)| i == o)
    }

    /// Permutation that undoes this one.
    pub fn inverse(&self) -> Self {
        let mut order = vec![0; self.order.len()];
        for (i, &o) in self.order.iter().enumerate() {
            order[o] = i;
        }
        Self { order }
    }

    /// Reorder a sequence (e.g. dimension names) into output order.
    pub fn apply_to<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.order.iter().map(|&i| items[i].clone()).collect()
    }

    /// Transpose an array into output axis order, in standard layout.
    pub fn transpose<T: Clone>(&self, array: ArrayD<T>) -> Result<ArrayD<T>> {
        if array.ndim() != self.order.len() {
            return Err(EngineError::Shape {
                variable: String::new(),
                shape: array.shape().to_vec(),
                dimensions: self.order.len(),
            });
        }
        if self.is_identity() {
            return Ok(array);
        }
        let permuted = array.permuted_axes(IxDyn(&self.order));
        Ok(permuted.as_standard_layout().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn names(order: &AxisPermutation, axes: &[&str]) -> Vec<String> {
        order
            .apply_to(axes)
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_identity_without_spatial_axes() {
        let axes = ["time", "bins", "lev"];
        let perm = AxisPermutation::for_axes(&axes);
        assert!(perm.is_identity());
        assert_eq!(perm.order(), &[0, 1, 2]);
    }

    #[test]
    fn test_lat_lon_moved_to_end() {
        let axes = ["time", "lat", "bins", "lon"];
        let perm = AxisPermutation::for_axes(&axes);
        assert_eq!(perm.order(), &[0, 2, 1, 3]);
        assert_eq!(names(&perm, &axes), vec!["time", "bins", "lat", "lon"]);
    }

    #[test]
    fn test_lon_before_lat_is_swapped() {
        let axes = ["lon", "lat", "lev", "time"];
        let perm = AxisPermutation::for_axes(&axes);
        assert_eq!(names(&perm, &axes), vec!["lev", "time", "lat", "lon"]);
    }

    #[test]
    fn test_already_canonical_is_identity() {
        let perm = AxisPermutation::for_axes(&["time", "lat", "lon"]);
        assert!(perm.is_identity());
    }

    #[test]
    fn test_partial_spatial_axes_is_identity() {
        let axes = ["lat", "time"];
        assert_eq!(SpatialAxes::classify(&axes), SpatialAxes::Partial);
        assert!(AxisPermutation::for_axes(&axes).is_identity());
    }

    #[test]
    fn test_lat_lon_always_trailing() {
        let cases: &[&[&str]] = &[
            &["lat", "lon"],
            &["lon", "lat"],
            &["lat", "time", "lon"],
            &["lon", "bins", "lev", "lat", "time"],
            &["time", "lev", "lon", "bins", "lat"],
        ];
        for axes in cases {
            let out = names(&AxisPermutation::for_axes(axes), axes);
            let n = out.len();
            assert_eq!(out[n - 2], "lat", "{:?}", axes);
            assert_eq!(out[n - 1], "lon", "{:?}", axes);

            let others: Vec<&str> = axes.iter().copied().filter(|a| *a != "lat" && *a != "lon").collect();
            assert_eq!(&out[..n - 2], others.as_slice(), "{:?}", axes);
        }
    }

    #[test]
    fn test_transpose_then_inverse_restores_array() {
        let axes = ["lon", "time", "lat", "bins"];
        let original = Array::from_shape_fn(IxDyn(&[4, 2, 3, 5]), |ix| {
            (ix[0] * 1000 + ix[1] * 100 + ix[2] * 10 + ix[3]) as f64
        });

        let perm = AxisPermutation::for_axes(&axes);
        let transposed = perm.transpose(original.clone()).unwrap();
        assert_eq!(transposed.shape(), &[2, 5, 3, 4]);
        // Output element (time=1, bins=4, lat=2, lon=3) came from (lon=3, time=1, lat=2, bins=4).
        assert_eq!(transposed[[1, 4, 2, 3]], original[[3, 1, 2, 4]]);

        let inverse = perm.inverse();
        assert_eq!(inverse.apply_to(&perm.apply_to(&axes)), axes.to_vec());
        let restored = inverse.transpose(transposed).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_transpose_rejects_rank_mismatch() {
        let perm = AxisPermutation::for_axes(&["lat", "lon"]);
        let array = ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2]));
        assert!(perm.transpose(array).is_err());
    }
}

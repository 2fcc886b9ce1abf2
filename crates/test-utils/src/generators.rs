//! Test data generators for synthetic model output.
//!
//! These generators create predictable, verifiable coordinate axes and
//! arrays so tests can check exactly where each value ended up after
//! transposition and reindexing.

use ndarray::{ArrayD, Dimension, IxDyn};

/// Latitude centres running south to north, the usual model ordering.
///
/// # Example
///
/// ```
/// use test_utils::latitudes;
///
/// let lat = latitudes(-90.0, 45.0, 5);
/// assert_eq!(lat, vec![-90.0, -45.0, 0.0, 45.0, 90.0]);
/// ```
pub fn latitudes(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Creates an array whose every cell encodes its own index.
///
/// A cell at index `[i0, i1, ..., in]` holds `i0 * 10^n + i1 * 10^(n-1) + ...`,
/// so with axes shorter than ten the digits spell out the index. For a
/// `[2, 3]` array, cell `[1, 2]` holds `12.0`.
///
/// # Example
///
/// ```
/// use test_utils::create_index_array;
///
/// let data = create_index_array(&[2, 3]);
/// assert_eq!(data[[1, 2]], 12.0);
/// ```
pub fn create_index_array(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(shape), |index| {
        index
            .slice()
            .iter()
            .fold(0.0, |acc, &i| acc * 10.0 + i as f64)
    })
}

/// Creates an index array with NaN at the given flat positions.
///
/// Useful for testing missing data handling.
pub fn create_array_with_nans(shape: &[usize], nan_positions: &[usize]) -> ArrayD<f64> {
    let mut data = create_index_array(shape);
    for (i, value) in data.iter_mut().enumerate() {
        if nan_positions.contains(&i) {
            *value = f64::NAN;
        }
    }
    data
}

/// Creates an aerosol-optical-depth-like field in [0, 1).
///
/// Values rise smoothly with the index along the last two axes.
pub fn create_aod_array(shape: &[usize]) -> ArrayD<f64> {
    let ndim = shape.len();
    let rows = if ndim >= 2 { shape[ndim - 2] } else { 1 };
    let cols = shape.last().copied().unwrap_or(1);
    ArrayD::from_shape_fn(IxDyn(shape), |index| {
        let idx = index.slice();
        let row = if ndim >= 2 { idx[ndim - 2] } else { 0 };
        let col = idx.last().copied().unwrap_or(0);
        let y = row as f64 / rows.max(1) as f64;
        let x = col as f64 / cols.max(1) as f64;
        (x + y) / 2.0
    })
}

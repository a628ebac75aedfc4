//! Euclidean distance between a point and a centroid

/// Euclidean distance between two equal-length vectors
///
/// Inputs are generated in `[0, 1)`, so no NaN/Inf handling is done.
///
/// # Example
///
/// ```
/// use dkmeans::cluster::distance;
///
/// assert_eq!(distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
/// ```
#[inline]
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

//! Design matrix helpers for linear models.

use ndarray::{Array2, ArrayBase, Axis, Data, Ix2, concatenate};

/// Appends an intercept column of ones as the last column of `design`.
///
/// Existing columns and row order are unchanged.
///
/// # Examples
///
/// ```
/// use moss_stats::design::add_constant;
/// use ndarray::array;
///
/// let x = array![[2.0, 3.0], [4.0, 5.0]];
/// assert_eq!(add_constant(&x), array![[2.0, 3.0, 1.0], [4.0, 5.0, 1.0]]);
/// ```
#[must_use]
pub fn add_constant<S>(design: &ArrayBase<S, Ix2>) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let ones = Array2::ones((design.nrows(), 1));
    concatenate(Axis(1), &[design.view(), ones.view()])
        .expect("intercept column should always match the design row count")
}

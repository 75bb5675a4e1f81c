//! Descriptive reductions over slices and array axes.
//!
//! The slice functions ([`mean`], [`variance`], [`std_dev`], [`median`]) are the
//! building blocks used by the resampling engines. [`Reducer`] lifts them to
//! N-dimensional arrays, either over every element or independently along one axis,
//! and is the default statistic of the bootstrap.

use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension, arr0};
use serde::{Deserialize, Serialize};

/// Arithmetic mean of a non-empty slice.
///
/// # Panics
///
/// Panics if `values` is empty.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "cannot reduce an empty dataset");
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance with `ddof` delta degrees of freedom (`0` for the population variance,
/// `1` for the unbiased sample variance).
///
/// # Panics
///
/// Panics if `values` is empty.
///
/// # Examples
///
/// ```
/// use moss_stats::descriptive::variance;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(variance(&values, 0), 2.0);
/// assert_eq!(variance(&values, 1), 2.5);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn variance(values: &[f64], ddof: usize) -> f64 {
    let mean = mean(values);
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    sum_sq / (values.len() as f64 - ddof as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
///
/// # Panics
///
/// Panics if `values` is empty.
#[must_use]
pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    variance(values, ddof).sqrt()
}

/// Median of a non-empty slice; the mean of the two central values for even lengths.
///
/// # Panics
///
/// Panics if `values` is empty.
///
/// # Examples
///
/// ```
/// use moss_stats::descriptive::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
/// assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
/// ```
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "cannot reduce an empty dataset");
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        f64::midpoint(sorted[mid - 1], sorted[mid])
    } else {
        sorted[mid]
    }
}

/// A named reduction that can be applied to a whole array or along one axis.
///
/// Reducers parse from their variant name, so they can be selected from configuration:
///
/// ```
/// use moss_stats::descriptive::Reducer;
///
/// let reducer: Reducer = "Median".parse().unwrap();
/// assert_eq!(reducer, Reducer::Median);
/// ```
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Mean,
    Median,
    /// Population standard deviation (`ddof = 0`).
    Std,
    Min,
    Max,
    Sum,
}

impl Reducer {
    /// Reduces a non-empty slice to a single value.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    #[must_use]
    pub fn reduce_slice(self, values: &[f64]) -> f64 {
        assert!(!values.is_empty(), "cannot reduce an empty dataset");
        match self {
            Self::Mean => mean(values),
            Self::Median => median(values),
            Self::Std => std_dev(values, 0),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => values.iter().sum(),
        }
    }

    /// Reduces an array.
    ///
    /// With `axis = None` every element participates and a 0-dimensional array is
    /// returned; otherwise each lane along `axis` is reduced and the axis is removed.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is out of bounds or the reduced lanes are empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use moss_stats::descriptive::Reducer;
    /// use ndarray::{Axis, array};
    ///
    /// let data = array![[1.0, 10.0], [3.0, 20.0]];
    /// assert_eq!(Reducer::Max.reduce(&data, None).first(), Some(&20.0));
    /// assert_eq!(
    ///     Reducer::Mean.reduce(&data, Some(Axis(0))),
    ///     array![2.0, 15.0].into_dyn()
    /// );
    /// ```
    #[must_use]
    pub fn reduce<S, D>(self, data: &ArrayBase<S, D>, axis: Option<Axis>) -> ArrayD<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let data = data.view().into_dyn();
        match axis {
            None => {
                let values = data.iter().copied().collect::<Vec<_>>();
                arr0(self.reduce_slice(&values)).into_dyn()
            }
            Some(axis) => data.map_axis(axis, |lane| self.reduce_slice(&lane.to_vec())),
        }
    }
}

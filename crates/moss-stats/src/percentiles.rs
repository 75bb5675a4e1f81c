//! Order statistics with linear interpolation.
//!
//! All functions in this module use the "linear" definition of a percentile: for a
//! sorted dataset of `n` values, the `q`-th percentile sits at fractional rank
//! `q / 100 * (n - 1)` and is interpolated between the two neighbouring order
//! statistics. The 50th percentile is therefore the median.

use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn, arr0};
use serde::{Deserialize, Serialize};

/// Precomputed percentile values for a dataset.
///
/// This structure stores percentile-value pairs for efficient lookup
/// of commonly used percentile points.
///
/// # Examples
///
/// ```
/// use moss_stats::percentiles::Percentiles;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
///
/// assert_eq!(percentiles.get(50.0), Some(5.5));
/// assert_eq!(percentiles.get(25.0), Some(3.25));
/// ```
#[derive(Debug, Clone)]
pub struct Percentiles {
    /// Percentile-value pairs in the order they were requested.
    /// Each tuple contains (percentile, value) where percentile is 0.0-100.0.
    values: Vec<(f64, f64)>,
}

impl Percentiles {
    /// Computes percentiles from sorted values.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is empty or not sorted in ascending order, or if any
    /// percentile point lies outside `[0, 100]`.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], percentile_points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let values = percentile_points
            .iter()
            .map(|&p| (p, compute_percentile(sorted_values, p)))
            .collect();
        Self { values }
    }

    /// Computes percentiles from unsorted values.
    ///
    /// The values are copied and sorted internally.
    ///
    /// # Examples
    ///
    /// ```
    /// use moss_stats::percentiles::Percentiles;
    ///
    /// let values = vec![5.0, 2.0, 8.0, 1.0, 9.0];
    /// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
    ///
    /// assert_eq!(percentiles.get(50.0), Some(5.0));
    /// ```
    #[must_use]
    pub fn new(values: &[f64], percentile_points: &[f64]) -> Self {
        Self::from_sorted(&sorted(values.iter().copied()), percentile_points)
    }

    /// Gets the value at a specific percentile.
    ///
    /// Returns `None` if the percentile was not precomputed.
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values.iter().find_map(|(p, value)| {
            if (*p - percentile).abs() < f64::EPSILON {
                Some(*value)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over all (percentile, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().copied()
    }

    /// Returns all percentile-value pairs as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[(f64, f64)] {
        &self.values
    }
}

/// Computes a single percentile value from sorted data.
///
/// The percentile is located at rank `percentile / 100 * (n - 1)`; when that rank
/// falls between two order statistics the result is linearly interpolated.
///
/// # Panics
///
/// Panics if `sorted_values` is empty or if `percentile` lies outside `[0, 100]`.
///
/// # Examples
///
/// ```
/// use moss_stats::percentiles::compute_percentile;
///
/// let values = [10.0, 20.0, 30.0];
/// assert_eq!(compute_percentile(&values, 50.0), 20.0);
/// assert_eq!(compute_percentile(&values, 25.0), 15.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    assert!(
        !sorted_values.is_empty(),
        "cannot compute a percentile of an empty dataset"
    );
    assert!(
        (0.0..=100.0).contains(&percentile),
        "percentile must lie in [0, 100], got {percentile}"
    );

    let rank = percentile / 100.0 * (sorted_values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted_values[lower];
    }
    let fraction = rank - rank.floor();
    let (low, high) = (sorted_values[lower], sorted_values[upper]);
    low + (high - low) * fraction
}

/// Computes a single percentile of unsorted values.
///
/// # Panics
///
/// Panics under the same conditions as [`compute_percentile`].
#[must_use]
pub fn score_at_percentile(values: &[f64], percentile: f64) -> f64 {
    compute_percentile(&sorted(values.iter().copied()), percentile)
}

/// Computes one percentile of an array.
///
/// With `axis = None` the array is flattened and a 0-dimensional array is returned.
/// Otherwise the percentile is computed independently for every lane along `axis`
/// and that axis is removed from the output shape.
///
/// # Panics
///
/// Panics if `axis` is out of bounds, if a lane is empty, or if `percentile` lies
/// outside `[0, 100]`.
///
/// # Examples
///
/// ```
/// use moss_stats::percentiles::percentile;
/// use ndarray::{Axis, array};
///
/// let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
/// assert_eq!(percentile(&data, 50.0, None).first(), Some(&3.5));
/// assert_eq!(
///     percentile(&data, 50.0, Some(Axis(1))),
///     array![2.0, 5.0].into_dyn()
/// );
/// ```
#[must_use]
pub fn percentile<S, D>(data: &ArrayBase<S, D>, percentile: f64, axis: Option<Axis>) -> ArrayD<f64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    percentiles(data, &[percentile], axis).index_axis_move(Axis(0), 0)
}

/// Computes several percentiles of an array.
///
/// The output has a leading axis of length `percentile_points.len()`, followed by the
/// shape produced by a single [`percentile`] call. Each lane is sorted only once
/// regardless of how many percentile points are requested.
///
/// # Panics
///
/// Panics under the same conditions as [`percentile`].
///
/// # Examples
///
/// ```
/// use moss_stats::percentiles::percentiles;
/// use ndarray::Array1;
///
/// let data = Array1::range(0.0, 101.0, 1.0);
/// let out = percentiles(&data, &[10.0, 20.0], None);
/// assert_eq!(out.shape(), &[2]);
/// assert_eq!(out[[0]], 10.0);
/// assert_eq!(out[[1]], 20.0);
/// ```
#[must_use]
pub fn percentiles<S, D>(
    data: &ArrayBase<S, D>,
    percentile_points: &[f64],
    axis: Option<Axis>,
) -> ArrayD<f64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let data = data.view().into_dyn();
    let sorted_lanes = match axis {
        None => arr0(sorted(data.iter().copied())).into_dyn(),
        Some(axis) => data.map_axis(axis, |lane| sorted(lane.iter().copied())),
    };

    let mut shape = vec![percentile_points.len()];
    shape.extend_from_slice(sorted_lanes.shape());
    let mut out = ArrayD::zeros(IxDyn(&shape));
    for (&p, mut plane) in percentile_points.iter().zip(out.outer_iter_mut()) {
        plane.zip_mut_with(&sorted_lanes, |value, lane| {
            *value = compute_percentile(lane, p);
        });
    }
    out
}

/// How ties are treated by [`percentile_of_score`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum RankKind {
    /// Average percentage ranking of the score, ties counted half.
    #[default]
    Rank,
    /// Percentage of values less than or equal to the score.
    Weak,
    /// Percentage of values strictly less than the score.
    Strict,
    /// Average of the weak and strict percentages.
    Mean,
}

/// Computes the percentile rank of `score` relative to `values`.
///
/// This is the inverse of [`score_at_percentile`] and returns a value in `[0, 100]`.
///
/// # Panics
///
/// Panics if `values` is empty.
///
/// # Examples
///
/// ```
/// use moss_stats::percentiles::{RankKind, percentile_of_score};
///
/// let values = [1.0, 2.0, 3.0, 3.0, 4.0];
/// assert_eq!(percentile_of_score(&values, 3.0, RankKind::Weak), 80.0);
/// assert_eq!(percentile_of_score(&values, 3.0, RankKind::Strict), 40.0);
/// assert_eq!(percentile_of_score(&values, 3.0, RankKind::Mean), 60.0);
/// assert_eq!(percentile_of_score(&values, 3.0, RankKind::Rank), 70.0);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn percentile_of_score(values: &[f64], score: f64, kind: RankKind) -> f64 {
    assert!(
        !values.is_empty(),
        "cannot rank a score against an empty dataset"
    );

    let n = values.len() as f64;
    let below = values.iter().filter(|&&v| v < score).count();
    let at_or_below = values.iter().filter(|&&v| v <= score).count();
    let as_percent = |count: usize| count as f64 * 100.0 / n;

    match kind {
        RankKind::Weak => as_percent(at_or_below),
        RankKind::Strict => as_percent(below),
        RankKind::Mean => (as_percent(below) + as_percent(at_or_below)) / 2.0,
        RankKind::Rank => {
            let has_ties = usize::from(at_or_below > below);
            (below + at_or_below + has_ties) as f64 * 50.0 / n
        }
    }
}

fn sorted<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values = values.into_iter().collect::<Vec<_>>();
    values.sort_by(f64::total_cmp);
    values
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, Axis};
    use rand::{Rng as _, SeedableRng as _};
    use rand_distr::{Distribution as _, StandardNormal};
    use rand_pcg::Pcg64;

    use super::*;
    use crate::descriptive::median;

    fn random_matrix(seed: u64, rows: usize, cols: usize) -> Array2<f64> {
        let mut rng = Pcg64::seed_from_u64(seed);
        Array2::from_shape_simple_fn((rows, cols), || StandardNormal.sample(&mut rng))
    }

    fn scalar(a: ArrayD<f64>) -> f64 {
        a.into_dimensionality::<ndarray::Ix0>().unwrap().into_scalar()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    /// Sort, then interpolate between the two order statistics around rank `(n - 1) p / 100`.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn sort_and_interpolate(values: &[f64], p: f64) -> f64 {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let rank = (sorted.len() - 1) as f64 * p / 100.0;
        let lo = rank.floor() as usize;
        let hi = (lo + 1).min(sorted.len() - 1);
        sorted[lo] + (rank - rank.floor()) * (sorted[hi] - sorted[lo])
    }

    fn random_fractional_points(seed: u64, count: usize) -> Vec<f64> {
        let mut rng = Pcg64::seed_from_u64(seed);
        (0..count)
            .map(|_| rng.random_range(0.0..=100.0_f64))
            .collect()
    }

    #[test]
    fn test_single_percentile_of_range() {
        let data = Array1::range(0.0, 101.0, 1.0);
        assert_eq!(scalar(percentile(&data, 5.0, None)), 5.0);
    }

    #[test]
    fn test_integer_percentiles_of_range_are_exact() {
        let data = Array1::range(0.0, 101.0, 1.0);
        let points = [0.0, 13.0, 42.0, 77.0, 100.0];
        let out = percentiles(&data, &points, None);
        assert_eq!(out.shape(), &[points.len()]);
        for (value, expected) in out.iter().zip(points) {
            assert_eq!(*value, expected);
        }
    }

    #[test]
    fn test_interpolation_between_ranks() {
        let values = [10.0, 20.0, 30.0];
        assert_eq!(score_at_percentile(&values, 50.0), 20.0);
        assert_eq!(score_at_percentile(&values, 75.0), 25.0);
        assert_eq!(score_at_percentile(&[30.0, 10.0, 20.0], 0.0), 10.0);
        assert_eq!(score_at_percentile(&[30.0, 10.0, 20.0], 100.0), 30.0);
    }

    #[test]
    fn test_fractional_percentiles_match_numpy() {
        // numpy.percentile([3, 1, 4, 1, 5, 9, 2, 6], [12.5, 37.5, 90.0])
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        assert_close(score_at_percentile(&values, 12.5), 1.0);
        assert_close(score_at_percentile(&values, 37.5), 2.625);
        assert_close(score_at_percentile(&values, 90.0), 6.9);
    }

    #[test]
    fn test_random_fractional_percentiles_of_normal_data() {
        let points = random_fractional_points(11, 20);
        assert!(points.iter().all(|p| p.fract() != 0.0));

        let data = random_matrix(12, 57, 1).into_shape_with_order(57).unwrap();
        let flat = data.to_vec();
        let out = percentiles(&data, &points, None);
        assert_eq!(out.shape(), &[points.len()]);
        for (value, &p) in out.iter().zip(&points) {
            assert_close(*value, sort_and_interpolate(&flat, p));
            assert_close(score_at_percentile(&flat, p), sort_and_interpolate(&flat, p));
        }
    }

    #[test]
    fn test_random_fractional_percentiles_along_each_axis() {
        let points = random_fractional_points(13, 20);
        let data = random_matrix(14, 23, 6);
        for axis in 0..2 {
            let out = percentiles(&data, &points, Some(Axis(axis)));
            for (plane, &p) in out.outer_iter().zip(&points) {
                for (value, lane) in plane.iter().zip(data.lanes(Axis(axis))) {
                    assert_close(*value, sort_and_interpolate(&lane.to_vec(), p));
                }
            }
        }
    }

    #[test]
    fn test_fiftieth_percentile_is_median_flattened() {
        let data = random_matrix(1, 10, 10);
        let flat = data.iter().copied().collect::<Vec<_>>();
        assert_close(scalar(percentile(&data, 50.0, None)), median(&flat));
    }

    #[test]
    fn test_fiftieth_percentile_is_median_along_each_axis() {
        let data = random_matrix(2, 10, 10);
        for axis in 0..2 {
            let out = percentile(&data, 50.0, Some(Axis(axis)));
            assert_eq!(out.shape(), &[10]);
            for (value, lane) in out.iter().zip(data.lanes(Axis(axis))) {
                assert_close(*value, median(&lane.to_vec()));
            }
        }
    }

    #[test]
    fn test_multiple_percentiles_along_axis() {
        let data = random_matrix(3, 10, 7);
        let out = percentiles(&data, &[50.0, 95.0], Some(Axis(0)));
        assert_eq!(out.shape(), &[2, 7]);
        for (value, lane) in out.index_axis(Axis(0), 0).iter().zip(data.columns()) {
            assert_close(*value, median(&lane.to_vec()));
        }
        for (p50, p95) in out
            .index_axis(Axis(0), 0)
            .iter()
            .zip(out.index_axis(Axis(0), 1))
        {
            assert!(p50 <= p95);
        }
    }

    #[test]
    fn test_three_dimensional_axis() {
        let data = ndarray::Array3::from_shape_fn((2, 3, 5), |(i, j, k)| {
            f64::from(u32::try_from(i * 100 + j * 10 + k).unwrap())
        });
        let out = percentile(&data, 50.0, Some(Axis(2)));
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out[[1, 2]], 122.0);
    }

    #[test]
    fn test_precomputed_table_matches_free_function() {
        let values = [4.0, 1.0, 3.0, 2.0];
        let table = Percentiles::new(&values, &[10.0, 50.0]);
        assert_eq!(table.get(10.0), Some(score_at_percentile(&values, 10.0)));
        assert_eq!(table.get(50.0), Some(2.5));
        assert_eq!(table.get(90.0), None);
        assert_eq!(table.as_slice().len(), 2);
    }

    #[test]
    fn test_percentile_of_score_kinds() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_of_score(&values, 0.0, RankKind::Weak), 0.0);
        assert_eq!(percentile_of_score(&values, 5.0, RankKind::Strict), 100.0);
        assert_eq!(percentile_of_score(&values, 2.5, RankKind::Rank), 50.0);
        assert_eq!(percentile_of_score(&values, 2.0, RankKind::Rank), 50.0);
    }

    #[test]
    fn test_rank_kind_from_str() {
        assert_eq!("Strict".parse::<RankKind>().unwrap(), RankKind::Strict);
        assert!("sideways".parse::<RankKind>().is_err());
    }

    #[test]
    #[should_panic(expected = "percentile must lie in [0, 100]")]
    fn test_out_of_range_percentile_panics() {
        let _ = score_at_percentile(&[1.0, 2.0], 101.0);
    }

    #[test]
    #[should_panic(expected = "empty dataset")]
    fn test_empty_input_panics() {
        let _ = score_at_percentile(&[], 50.0);
    }
}

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng as _;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RandomizationError, Tail, tail_p_value};
use crate::{descriptive, rng::RandomSeed};

/// One-sample sign-flip randomization test configuration.
///
/// Under the null hypothesis the sample is symmetric around `h_0`, so flipping the
/// sign of any centered observation yields an equally likely sample. Each iteration
/// flips every observation's sign with probability one half and recomputes the
/// t-statistic.
///
/// # Example
///
/// ```
/// use moss_stats::randomize::OneSampleRandomization;
/// use moss_stats::rng::RandomSeed;
/// use ndarray::array;
///
/// let sample = array![0.8, 1.3, 0.4, 1.9, 1.1, 0.7, 1.6, 0.9];
/// let result = OneSampleRandomization {
///     n_iter: 2000,
///     seed: Some(RandomSeed::new(7)),
///     ..OneSampleRandomization::default()
/// }
/// .test(sample.view())
/// .unwrap();
/// assert!(result.t_statistic > 0.0);
/// assert!(result.p_value < 0.05);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneSampleRandomization {
    /// Number of sign-flip iterations.
    pub n_iter: usize,
    /// Hypothesized population mean.
    pub h_0: f64,
    /// Correct for multiple tests with the per-iteration maximum statistic.
    pub corrected: bool,
    pub seed: Option<RandomSeed>,
    /// Keep the null distribution in the result.
    pub return_dist: bool,
}

impl Default for OneSampleRandomization {
    fn default() -> Self {
        Self {
            n_iter: 10_000,
            h_0: 0.0,
            corrected: true,
            seed: None,
            return_dist: false,
        }
    }
}

/// Result of a single one-sample test.
#[derive(Debug, Clone, PartialEq)]
pub struct OneSampleTest {
    pub t_statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Null t-statistics, one per iteration.
    pub null_distribution: Option<Array1<f64>>,
}

/// Result of one-sample tests run on every column of a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiOneSampleTest {
    pub t_statistics: Array1<f64>,
    pub p_values: Array1<f64>,
    /// Null t-statistics with shape `(n_tests, n_iter)`.
    pub null_distribution: Option<Array2<f64>>,
}

impl OneSampleRandomization {
    /// Tests whether `sample` has mean `h_0`.
    ///
    /// # Errors
    ///
    /// - [`RandomizationError::TooFewObservations`] if the sample has fewer than 2 values
    /// - [`RandomizationError::NoIterations`] if `n_iter` is zero
    pub fn test(&self, sample: ArrayView1<'_, f64>) -> Result<OneSampleTest, RandomizationError> {
        let multi = self.test_multi(sample.insert_axis(Axis(1)))?;
        Ok(OneSampleTest {
            t_statistic: multi.t_statistics[0],
            p_value: multi.p_values[0],
            null_distribution: multi
                .null_distribution
                .map(|null| null.index_axis_move(Axis(0), 0)),
        })
    }

    /// Tests every column of an `(n_obs, n_tests)` matrix.
    ///
    /// Each iteration draws one sign per observation and applies it to all tests, so
    /// dependence between tests is preserved under the null. With
    /// [`corrected`](Self::corrected) set and more than one test, every p-value is read
    /// off the distribution of the per-iteration maximum `|t|`, which controls the
    /// family-wise error rate.
    ///
    /// # Errors
    ///
    /// Same as [`test`](Self::test).
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(n_iter = self.n_iter, n_obs = samples.nrows(), n_tests = samples.ncols())
    )]
    pub fn test_multi(
        &self,
        samples: ArrayView2<'_, f64>,
    ) -> Result<MultiOneSampleTest, RandomizationError> {
        let (n_obs, n_tests) = samples.dim();
        if n_obs < 2 {
            return Err(RandomizationError::TooFewObservations { n_obs });
        }
        if self.n_iter == 0 {
            return Err(RandomizationError::NoIterations);
        }

        let centered = samples.mapv(|v| v - self.h_0);
        let observed = column_t_statistics(&centered);

        let seed = RandomSeed::resolve(self.seed);
        let draws = (0..self.n_iter)
            .into_par_iter()
            .map(|i| {
                let mut rng = seed.stream(i);
                let signs = Array1::from_shape_fn(n_obs, |_| {
                    if rng.random_bool(0.5) { -1.0 } else { 1.0 }
                });
                let flipped = &centered * &signs.insert_axis(Axis(1));
                column_t_statistics(&flipped)
            })
            .collect::<Vec<_>>();
        let null = Array2::from_shape_fn((n_tests, self.n_iter), |(test, iter)| draws[iter][test]);

        let p_values = if self.corrected && n_tests > 1 {
            let max_null = draws
                .iter()
                .map(|t| t.fold(0.0, |acc: f64, v| acc.max(v.abs())))
                .collect::<Vec<_>>();
            observed.mapv(|t| tail_p_value(&max_null, t, Tail::Both))
        } else {
            Array1::from_shape_fn(n_tests, |test| {
                tail_p_value(&null.row(test).to_vec(), observed[test], Tail::Both)
            })
        };
        debug!(seed = seed.value(), "built sign-flip null distribution");

        Ok(MultiOneSampleTest {
            t_statistics: observed,
            p_values,
            null_distribution: self.return_dist.then_some(null),
        })
    }
}

/// Runs a one-sample sign-flip test of `sample` against a mean of zero.
///
/// # Errors
///
/// See [`OneSampleRandomization::test`].
pub fn randomize_onesample(
    sample: ArrayView1<'_, f64>,
    n_iter: usize,
    seed: Option<RandomSeed>,
    return_dist: bool,
) -> Result<OneSampleTest, RandomizationError> {
    OneSampleRandomization {
        n_iter,
        seed,
        return_dist,
        ..OneSampleRandomization::default()
    }
    .test(sample)
}

/// One-sample t-statistic of each column: mean over its standard error.
#[expect(clippy::cast_precision_loss)]
fn column_t_statistics(samples: &Array2<f64>) -> Array1<f64> {
    let n = samples.nrows() as f64;
    samples
        .columns()
        .into_iter()
        .map(|column| {
            let values = column.to_vec();
            descriptive::mean(&values) / (descriptive::std_dev(&values, 1) / n.sqrt())
        })
        .collect()
}

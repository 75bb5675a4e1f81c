use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayView2, Axis, Data, Ix2};
use rand::seq::SliceRandom as _;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RandomizationError, Tail, tail_p_value};
use crate::rng::RandomSeed;

/// Permutation test for every pairwise correlation between variables.
///
/// The null distribution is built by shuffling each variable's observations
/// independently, which destroys the association between variables while keeping
/// each variable's marginal distribution.
///
/// # Example
///
/// ```
/// use moss_stats::randomize::{CorrmatRandomization, Tail};
/// use moss_stats::rng::RandomSeed;
/// use ndarray::array;
///
/// let data = array![
///     [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
///     [1.1, 2.3, 2.9, 4.2, 4.8, 6.1, 7.2, 7.9],
///     [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0],
/// ];
/// let result = CorrmatRandomization {
///     tail: Tail::Upper,
///     n_iter: 1000,
///     seed: Some(RandomSeed::new(3)),
///     ..CorrmatRandomization::default()
/// }
/// .test(data.view())
/// .unwrap();
/// assert!(result.p_values[[0, 1]] < 0.05);
/// assert_eq!(result.p_values[[1, 0]], result.p_values[[0, 1]]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrmatRandomization {
    pub tail: Tail,
    /// Pool the most extreme correlation of every iteration into a single null.
    pub corrected: bool,
    pub n_iter: usize,
    pub seed: Option<RandomSeed>,
    pub return_dist: bool,
}

impl Default for CorrmatRandomization {
    fn default() -> Self {
        Self {
            tail: Tail::Both,
            corrected: true,
            n_iter: 10_000,
            seed: None,
            return_dist: false,
        }
    }
}

/// Result of a correlation matrix randomization test.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrmatTest {
    /// Observed `(k, k)` correlation matrix.
    pub observed: Array2<f64>,
    /// Symmetric `(k, k)` p-value matrix with a zero diagonal.
    pub p_values: Array2<f64>,
    /// Null correlations with shape `(k, k, n_iter)`.
    pub null_distribution: Option<Array3<f64>>,
}

impl CorrmatRandomization {
    /// Tests every pair of rows of a `(k variables, n observations)` matrix.
    ///
    /// With [`corrected`](Self::corrected) set, every cell's p-value is computed against
    /// the per-iteration extreme over all pairs (`max |r|` for [`Tail::Both`], `max r`
    /// for [`Tail::Upper`], `min r` for [`Tail::Lower`]). Corrected p-values are never
    /// smaller than uncorrected ones.
    ///
    /// # Errors
    ///
    /// - [`RandomizationError::TooFewVariables`] if `k < 2`
    /// - [`RandomizationError::TooFewObservations`] if `n < 2`
    /// - [`RandomizationError::NoIterations`] if `n_iter` is zero
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(n_iter = self.n_iter, n_vars = data.nrows(), n_obs = data.ncols())
    )]
    pub fn test(&self, data: ArrayView2<'_, f64>) -> Result<CorrmatTest, RandomizationError> {
        let (n_vars, n_obs) = data.dim();
        if n_vars < 2 {
            return Err(RandomizationError::TooFewVariables { n_vars });
        }
        if n_obs < 2 {
            return Err(RandomizationError::TooFewObservations { n_obs });
        }
        if self.n_iter == 0 {
            return Err(RandomizationError::NoIterations);
        }

        let observed = corrcoef(&data);
        let seed = RandomSeed::resolve(self.seed);
        let draws = (0..self.n_iter)
            .into_par_iter()
            .map(|i| {
                let mut rng = seed.stream(i);
                let mut shuffled = Array2::zeros((n_vars, n_obs));
                for (source, mut target) in data.outer_iter().zip(shuffled.outer_iter_mut()) {
                    let mut order = (0..n_obs).collect::<Vec<_>>();
                    order.shuffle(&mut rng);
                    target.assign(&source.select(Axis(0), &order));
                }
                corrcoef(&shuffled)
            })
            .collect::<Vec<_>>();

        let pairs = (0..n_vars)
            .flat_map(|i| (i + 1..n_vars).map(move |j| (i, j)))
            .collect::<Vec<_>>();
        let pooled = self.corrected.then(|| {
            draws
                .iter()
                .map(|r| pooled_extreme(r, &pairs, self.tail))
                .collect::<Vec<_>>()
        });

        let mut p_values = Array2::zeros((n_vars, n_vars));
        for &(i, j) in &pairs {
            let cell_null;
            let null = match &pooled {
                Some(pooled) => pooled,
                None => {
                    cell_null = draws.iter().map(|r| r[[i, j]]).collect::<Vec<_>>();
                    &cell_null
                }
            };
            let p = tail_p_value(null, observed[[i, j]], self.tail);
            p_values[[i, j]] = p;
            p_values[[j, i]] = p;
        }
        debug!(seed = seed.value(), n_pairs = pairs.len(), "built permutation null distribution");

        let null_distribution = self.return_dist.then(|| {
            Array3::from_shape_fn((n_vars, n_vars, self.n_iter), |(i, j, iter)| {
                draws[iter][[i, j]]
            })
        });
        Ok(CorrmatTest {
            observed,
            p_values,
            null_distribution,
        })
    }
}

/// Runs a correlation matrix randomization test.
///
/// # Errors
///
/// See [`CorrmatRandomization::test`].
pub fn randomize_corrmat(
    data: ArrayView2<'_, f64>,
    tail: Tail,
    corrected: bool,
    n_iter: usize,
    seed: Option<RandomSeed>,
    return_dist: bool,
) -> Result<CorrmatTest, RandomizationError> {
    CorrmatRandomization {
        tail,
        corrected,
        n_iter,
        seed,
        return_dist,
    }
    .test(data)
}

/// Pearson correlation matrix of the rows of `data`.
///
/// The diagonal is exactly `1` and off-diagonal values are clipped to `[-1, 1]`. Rows
/// with zero variance produce `NaN` correlations.
///
/// # Examples
///
/// ```
/// use moss_stats::randomize::corrcoef;
/// use ndarray::array;
///
/// let r = corrcoef(&array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [3.0, 2.0, 1.0]]);
/// assert!((r[[0, 1]] - 1.0).abs() < 1e-12);
/// assert!((r[[0, 2]] + 1.0).abs() < 1e-12);
/// assert_eq!(r[[2, 2]], 1.0);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn corrcoef<S>(data: &ArrayBase<S, Ix2>) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let n_vars = data.nrows();
    let n_obs = data.ncols() as f64;
    let standardized = data
        .outer_iter()
        .map(|row| {
            let centered = &row - row.sum() / n_obs;
            let norm = centered.dot(&centered).sqrt();
            centered / norm
        })
        .collect::<Vec<Array1<f64>>>();

    let mut corr = Array2::eye(n_vars);
    for i in 0..n_vars {
        for j in i + 1..n_vars {
            let r = standardized[i].dot(&standardized[j]).clamp(-1.0, 1.0);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

fn pooled_extreme(corr: &Array2<f64>, pairs: &[(usize, usize)], tail: Tail) -> f64 {
    let values = pairs.iter().map(|&(i, j)| corr[[i, j]]);
    match tail {
        Tail::Both => values.map(f64::abs).fold(f64::NEG_INFINITY, f64::max),
        Tail::Upper => values.fold(f64::NEG_INFINITY, f64::max),
        Tail::Lower => values.fold(f64::INFINITY, f64::min),
    }
}

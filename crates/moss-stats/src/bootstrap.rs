//! Bootstrap resampling of arbitrary statistics.
//!
//! The engine resamples one or more arrays with replacement along their first axis
//! (the observation axis) and evaluates a [`Statistic`] on every resample. All arrays
//! passed to one call are resampled with the *same* index vector, so paired
//! observations stay paired.
//!
//! # Variants
//!
//! - **Plain**: draw `n` indices uniformly from `[0, n)`.
//! - **Units** ([`Bootstrap::units`]): resample whole sampling units (clusters) with
//!   replacement, then observations within each selected unit.
//! - **Smoothed** ([`Bootstrap::smooth`]): after resampling, add Gaussian noise with
//!   standard deviation `sd / sqrt(n)` to every value, where `sd` is the population
//!   standard deviation of the value's lane along the observation axis. This breaks
//!   ties that otherwise make statistics such as the median degenerate.
//!
//! # Example
//!
//! ```
//! use moss_stats::{
//!     bootstrap::{Bootstrap, Statistic},
//!     descriptive::Reducer,
//!     rng::RandomSeed,
//! };
//! use ndarray::Array1;
//!
//! let data = Array1::range(0.0, 20.0, 1.0).into_dyn();
//! let boot = Bootstrap {
//!     n_boot: 500,
//!     seed: Some(RandomSeed::new(0)),
//!     ..Bootstrap::default()
//! };
//! let dist = boot.run(&[data.view()], &Statistic::from(Reducer::Median)).unwrap();
//! assert_eq!(dist.shape(), &[500]);
//! ```

use std::{collections::BTreeMap, fmt, str::FromStr};

use ndarray::{ArrayBase, ArrayD, ArrayViewD, Axis, IxDyn, ShapeError};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{descriptive, descriptive::Reducer, rng::RandomSeed};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BootstrapError {
    #[display("all input arrays must have the same length along the observation axis, got {lengths:?}")]
    ArgumentLength { lengths: Vec<usize> },
    #[display("invalid statistic: {reason}")]
    InvalidStatistic { reason: String },
    #[display("bootstrap needs at least one input array with at least one observation")]
    NoObservations,
    #[display("smoothed bootstrap cannot be combined with sampling units")]
    SmoothWithUnits,
    #[display("statistic returned results of differing shapes")]
    StatisticShape(ShapeError),
}

/// Number of arrays a [`Statistic`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Any,
}

impl Arity {
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => n == count,
            Self::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::Any => f.write_str("any number of"),
        }
    }
}

type StatisticFn = dyn Fn(&[ArrayViewD<'_, f64>], Option<Axis>) -> ArrayD<f64> + Send + Sync;

/// A statistic evaluated on every resample.
///
/// A statistic receives the resampled arrays in the order they were passed to the
/// bootstrap, plus the optional reduction axis configured by [`Bootstrap::axis`].
/// It returns a 0-dimensional array for scalar statistics or any fixed shape for
/// vector-valued ones. Its [`Arity`] is checked against the number of input arrays
/// before any resampling happens.
///
/// # Examples
///
/// ```
/// use moss_stats::bootstrap::Statistic;
/// use moss_stats::descriptive::Reducer;
/// use ndarray::arr0;
///
/// let mean = Statistic::from(Reducer::Mean);
/// let range = Statistic::unary(|x| {
///     let max = x.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
///     let min = x.fold(f64::INFINITY, |a, &b| a.min(b));
///     arr0(max - min).into_dyn()
/// });
/// let by_name: Statistic = "median".parse().unwrap();
/// ```
pub struct Statistic {
    arity: Arity,
    func: Box<StatisticFn>,
}

impl Statistic {
    /// Wraps a closure taking every resampled array and the reduction axis.
    pub fn new<F>(arity: Arity, func: F) -> Self
    where
        F: Fn(&[ArrayViewD<'_, f64>], Option<Axis>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self {
            arity,
            func: Box::new(func),
        }
    }

    /// Wraps a closure over a single array. The reduction axis is ignored.
    pub fn unary<F>(func: F) -> Self
    where
        F: Fn(ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self::new(Arity::Exactly(1), move |samples, _axis| {
            func(samples[0].view())
        })
    }

    /// Wraps a closure over two arrays. The reduction axis is ignored.
    pub fn binary<F>(func: F) -> Self
    where
        F: Fn(ArrayViewD<'_, f64>, ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self::new(Arity::Exactly(2), move |samples, _axis| {
            func(samples[0].view(), samples[1].view())
        })
    }

    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Evaluates the statistic on already resampled arrays.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::InvalidStatistic`] if the statistic cannot take `samples.len()`
    /// arrays.
    pub fn evaluate(
        &self,
        samples: &[ArrayViewD<'_, f64>],
        axis: Option<Axis>,
    ) -> Result<ArrayD<f64>, BootstrapError> {
        self.check_arity(samples.len())?;
        Ok((self.func)(samples, axis))
    }

    fn check_arity(&self, count: usize) -> Result<(), BootstrapError> {
        if self.arity.accepts(count) {
            Ok(())
        } else {
            Err(BootstrapError::InvalidStatistic {
                reason: format!(
                    "statistic takes {} arrays but {count} were given",
                    self.arity
                ),
            })
        }
    }
}

impl fmt::Debug for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statistic")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl Default for Statistic {
    fn default() -> Self {
        Reducer::default().into()
    }
}

impl From<Reducer> for Statistic {
    fn from(reducer: Reducer) -> Self {
        Self::new(Arity::Exactly(1), move |samples, axis| {
            reducer.reduce(&samples[0], axis)
        })
    }
}

/// Looks a statistic up by reducer name (`"mean"`, `"median"`, `"std"`, ...).
impl FromStr for Statistic {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Reducer>()
            .map(Self::from)
            .map_err(|_| BootstrapError::InvalidStatistic {
                reason: format!("'{s}' does not name a known reducer"),
            })
    }
}

/// Bootstrap configuration.
///
/// ```
/// use moss_stats::bootstrap::Bootstrap;
///
/// let boot: Bootstrap = serde_json::from_str(r#"{"n_boot": 200, "smooth": true}"#).unwrap();
/// assert_eq!(boot.n_boot, 200);
/// assert!(boot.units.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bootstrap {
    /// Number of resamples.
    pub n_boot: usize,
    /// Reduction axis forwarded to the statistic.
    pub axis: Option<usize>,
    /// Sampling-unit label of every observation.
    pub units: Option<Vec<i64>>,
    /// Add kernel noise to each resample.
    pub smooth: bool,
    /// Seed for reproducible resampling; drawn from entropy when `None`.
    pub seed: Option<RandomSeed>,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            n_boot: 10_000,
            axis: None,
            units: None,
            smooth: false,
            seed: None,
        }
    }
}

impl Bootstrap {
    /// Resamples `args` and evaluates `statistic` on each of the `n_boot` resamples.
    ///
    /// Returns an array of shape `(n_boot, ...)`, where `...` is the shape of a single
    /// statistic value. Row `i` always comes from iteration `i`'s random stream.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::NoObservations`] if `args` is empty or has no observations
    /// - [`BootstrapError::ArgumentLength`] if the arrays (or `units`) disagree in length
    /// - [`BootstrapError::InvalidStatistic`] if the statistic cannot take `args.len()` arrays
    /// - [`BootstrapError::SmoothWithUnits`] if both `smooth` and `units` are set
    /// - [`BootstrapError::StatisticShape`] if the statistic's output shape varies
    #[tracing::instrument(level = "debug", skip_all, fields(n_boot = self.n_boot, n_args = args.len()))]
    pub fn run(
        &self,
        args: &[ArrayViewD<'_, f64>],
        statistic: &Statistic,
    ) -> Result<ArrayD<f64>, BootstrapError> {
        let n = observation_count(args)?;
        statistic.check_arity(args.len())?;
        if self.smooth && self.units.is_some() {
            return Err(BootstrapError::SmoothWithUnits);
        }
        let units = self
            .units
            .as_deref()
            .map(|labels| UnitIndex::new(labels, n))
            .transpose()?;

        let seed = RandomSeed::resolve(self.seed);
        let axis = self.axis.map(Axis);
        debug!(n, seed = seed.value(), smooth = self.smooth, "resampling");

        let results = (0..self.n_boot)
            .into_par_iter()
            .map(|i| {
                let mut rng = seed.stream(i);
                let indices = match &units {
                    Some(units) => units.resample(&mut rng),
                    None => resample_indices(&mut rng, n),
                };
                let mut samples = args
                    .iter()
                    .map(|a| a.select(Axis(0), &indices))
                    .collect::<Vec<_>>();
                if self.smooth {
                    for sample in &mut samples {
                        add_kernel_noise(sample, &mut rng);
                    }
                }
                let views = samples.iter().map(ArrayBase::view).collect::<Vec<_>>();
                (statistic.func)(&views, axis)
            })
            .collect::<Vec<_>>();

        stack_distribution(&results)
    }
}

/// Runs a bootstrap with default settings (10 000 resamples, unseeded).
///
/// # Errors
///
/// See [`Bootstrap::run`].
pub fn bootstrap(
    args: &[ArrayViewD<'_, f64>],
    statistic: &Statistic,
) -> Result<ArrayD<f64>, BootstrapError> {
    Bootstrap::default().run(args, statistic)
}

fn observation_count(args: &[ArrayViewD<'_, f64>]) -> Result<usize, BootstrapError> {
    if args.iter().any(|a| a.ndim() == 0) {
        return Err(BootstrapError::NoObservations);
    }
    let lengths = args
        .iter()
        .map(|a| a.len_of(Axis(0)))
        .collect::<Vec<_>>();
    let Some(&n) = lengths.first() else {
        return Err(BootstrapError::NoObservations);
    };
    if lengths.iter().any(|&len| len != n) {
        return Err(BootstrapError::ArgumentLength { lengths });
    }
    if n == 0 {
        return Err(BootstrapError::NoObservations);
    }
    Ok(n)
}

fn resample_indices<R>(rng: &mut R, n: usize) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    (0..n).map(|_| rng.random_range(0..n)).collect()
}

/// Observation indices grouped by sampling unit, ordered by unit label.
#[derive(Debug)]
struct UnitIndex {
    members: Vec<Vec<usize>>,
}

impl UnitIndex {
    fn new(labels: &[i64], n: usize) -> Result<Self, BootstrapError> {
        if labels.len() != n {
            return Err(BootstrapError::ArgumentLength {
                lengths: vec![n, labels.len()],
            });
        }
        let mut groups = BTreeMap::<i64, Vec<usize>>::new();
        for (i, &label) in labels.iter().enumerate() {
            groups.entry(label).or_default().push(i);
        }
        Ok(Self {
            members: groups.into_values().collect(),
        })
    }

    /// Two-stage resample: units with replacement, then observations within each unit.
    fn resample<R>(&self, rng: &mut R) -> Vec<usize>
    where
        R: Rng + ?Sized,
    {
        let n_units = self.members.len();
        let mut indices = vec![];
        for _ in 0..n_units {
            let members = &self.members[rng.random_range(0..n_units)];
            indices.extend(resample_indices(rng, members.len()).into_iter().map(|j| members[j]));
        }
        indices
    }
}

#[expect(clippy::cast_precision_loss)]
fn add_kernel_noise<R>(sample: &mut ArrayD<f64>, rng: &mut R)
where
    R: Rng + ?Sized,
{
    let n = sample.len_of(Axis(0));
    for mut lane in sample.lanes_mut(Axis(0)) {
        let bandwidth = descriptive::std_dev(&lane.to_vec(), 0) / (n as f64).sqrt();
        for value in &mut lane {
            let z: f64 = rng.sample(StandardNormal);
            *value += bandwidth * z;
        }
    }
}

fn stack_distribution(results: &[ArrayD<f64>]) -> Result<ArrayD<f64>, BootstrapError> {
    if results.is_empty() {
        return Ok(ArrayD::zeros(IxDyn(&[0])));
    }
    let views = results.iter().map(ArrayBase::view).collect::<Vec<_>>();
    ndarray::stack(Axis(0), &views).map_err(BootstrapError::StatisticShape)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, Axis, arr0, array, concatenate};
    use rand::SeedableRng as _;
    use rand_distr::Distribution as _;
    use rand_pcg::Pcg64;

    use super::*;

    fn seeded(n_boot: usize, seed: u64) -> Bootstrap {
        Bootstrap {
            n_boot,
            seed: Some(RandomSeed::new(seed)),
            ..Bootstrap::default()
        }
    }

    fn random_normal(seed: u64, n: usize) -> Array1<f64> {
        let mut rng = Pcg64::seed_from_u64(seed);
        Array1::from_shape_simple_fn(n, || StandardNormal.sample(&mut rng))
    }

    #[test]
    fn test_constant_input_gives_constant_distribution() {
        let ones = Array1::<f64>::ones(10).into_dyn();
        for reducer in [Reducer::Mean, Reducer::Median] {
            let out = seeded(5, 0)
                .run(&[ones.view()], &Statistic::from(reducer))
                .unwrap();
            assert_eq!(out, Array1::<f64>::ones(5).into_dyn());
        }
    }

    #[test]
    fn test_smoothed_constant_input_stays_constant() {
        let ones = Array1::<f64>::ones(10).into_dyn();
        let boot = Bootstrap {
            smooth: true,
            ..seeded(20, 1)
        };
        let out = boot
            .run(&[ones.view()], &Statistic::from(Reducer::Median))
            .unwrap();
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_default_length() {
        let data = random_normal(2, 100).into_dyn();
        let out = bootstrap(&[data.view()], &Statistic::default()).unwrap();
        assert_eq!(out.len(), 10_000);
    }

    #[test]
    fn test_requested_length() {
        let data = random_normal(3, 100).into_dyn();
        for n_boot in [1, 17, 100] {
            let out = seeded(n_boot, 3)
                .run(&[data.view()], &Statistic::default())
                .unwrap();
            assert_eq!(out.shape(), &[n_boot]);
        }
    }

    #[test]
    fn test_zero_resamples_gives_empty_distribution() {
        let data = random_normal(4, 10).into_dyn();
        let out = seeded(0, 4)
            .run(&[data.view()], &Statistic::default())
            .unwrap();
        assert_eq!(out.shape(), &[0]);
    }

    #[test]
    fn test_mean_stays_within_data_range() {
        let data = random_normal(5, 100);
        let min = data.fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let out = seeded(10_000, 5)
            .run(&[data.into_dyn().view()], &Statistic::default())
            .unwrap();
        assert!(out.iter().all(|&v| min <= v && v <= max));
    }

    #[test]
    fn test_multiple_arrays_share_resampling_indices() {
        let x = Array2::from_shape_fn((10, 2), |(_, j)| if j == 0 { 1.0 } else { 10.0 }).into_dyn();
        let y = Array2::from_elem((10, 2), 5.0).into_dyn();
        let column_max = Statistic::binary(|x, y| {
            concatenate(Axis(0), &[x.view(), y.view()])
                .unwrap()
                .fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b))
        });
        let out = seeded(2, 6).run(&[x.view(), y.view()], &column_max).unwrap();
        assert_eq!(out, array![[5.0, 10.0], [5.0, 10.0]].into_dyn());
    }

    #[test]
    fn test_paired_arrays_stay_paired() {
        let x = Array1::range(0.0, 50.0, 1.0).into_dyn();
        let y = x.mapv(|v| 2.0 * v);
        let max_ratio_error = Statistic::binary(|x, y| {
            let error = x
                .iter()
                .zip(y.iter())
                .map(|(a, b)| (2.0 * a - b).abs())
                .fold(0.0, f64::max);
            arr0(error).into_dyn()
        });
        let out = seeded(200, 7)
            .run(&[x.view(), y.view()], &max_ratio_error)
            .unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let a = Array1::range(0.0, 5.0, 1.0).into_dyn();
        let b = Array1::range(0.0, 10.0, 1.0).into_dyn();
        let stat = Statistic::new(Arity::Any, |samples, _| arr0(samples[0].sum()).into_dyn());
        let err = seeded(10, 8).run(&[a.view(), b.view()], &stat).unwrap_err();
        assert!(matches!(err, BootstrapError::ArgumentLength { .. }));
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let data = random_normal(9, 20).into_dyn();
        let pair = Statistic::binary(|x, _| x.to_owned());
        let err = seeded(10, 9).run(&[data.view()], &pair).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidStatistic { .. }));
    }

    #[test]
    fn test_evaluate_checks_arity() {
        let data = array![1.0, 2.0, 3.0].into_dyn();
        let pair = Statistic::binary(|x, y| arr0(x.sum() + y.sum()).into_dyn());

        let err = pair.evaluate(&[data.view()], None).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidStatistic { .. }));
        let err = pair.evaluate(&[], None).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidStatistic { .. }));

        let total = pair.evaluate(&[data.view(), data.view()], None).unwrap();
        assert_eq!(total.first(), Some(&12.0));
    }

    #[test]
    fn test_unknown_statistic_name_is_rejected() {
        let err = "average".parse::<Statistic>().unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidStatistic { .. }));
        assert!("Median".parse::<Statistic>().is_ok());
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let err = seeded(10, 10).run(&[], &Statistic::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::NoObservations));

        let empty = Array1::<f64>::zeros(0).into_dyn();
        let err = seeded(10, 10)
            .run(&[empty.view()], &Statistic::default())
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NoObservations));
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let data = random_normal(11, 40).into_dyn();
        let a = seeded(300, 11).run(&[data.view()], &Statistic::default()).unwrap();
        let b = seeded(300, 11).run(&[data.view()], &Statistic::default()).unwrap();
        let c = seeded(300, 12).run(&[data.view()], &Statistic::default()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_axis_is_forwarded_to_reducer() {
        let mut rng = Pcg64::seed_from_u64(13);
        let data = Array2::from_shape_simple_fn((25, 3), || StandardNormal.sample(&mut rng));
        let boot = Bootstrap {
            axis: Some(0),
            ..seeded(50, 13)
        };
        let out = boot
            .run(&[data.into_dyn().view()], &Statistic::from(Reducer::Mean))
            .unwrap();
        assert_eq!(out.shape(), &[50, 3]);
    }

    #[test]
    fn test_units_resample_whole_clusters() {
        let data = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0].into_dyn();
        let boot = Bootstrap {
            units: Some(vec![0, 0, 0, 1, 1, 1]),
            ..seeded(200, 14)
        };
        let out = boot
            .run(&[data.view()], &Statistic::from(Reducer::Mean))
            .unwrap();
        for &value in &out {
            assert!([1.0, 3.0, 5.0].contains(&value), "unexpected mean {value}");
        }
        assert!(out.iter().any(|&v| v == 3.0));
    }

    #[test]
    fn test_units_length_mismatch_is_rejected() {
        let data = random_normal(15, 6).into_dyn();
        let boot = Bootstrap {
            units: Some(vec![0, 1, 2]),
            ..seeded(10, 15)
        };
        let err = boot.run(&[data.view()], &Statistic::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::ArgumentLength { .. }));
    }

    #[test]
    fn test_smooth_with_units_is_rejected() {
        let data = random_normal(16, 4).into_dyn();
        let boot = Bootstrap {
            units: Some(vec![0, 0, 1, 1]),
            smooth: true,
            ..seeded(10, 16)
        };
        let err = boot.run(&[data.view()], &Statistic::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::SmoothWithUnits));
    }

    #[test]
    fn test_smoothed_median_leaves_observed_values() {
        let data = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0].into_dyn();
        let boot = Bootstrap {
            smooth: true,
            ..seeded(100, 17)
        };
        let out = boot
            .run(&[data.view()], &Statistic::from(Reducer::Median))
            .unwrap();
        assert!(out.iter().any(|v| !data.iter().any(|d| d == v)));
    }

    #[test]
    fn test_inconsistent_statistic_shape_is_reported() {
        let data = Array1::range(0.0, 10.0, 1.0).into_dyn();
        let ragged = Statistic::unary(|x| {
            let len = if x.sum() < 45.0 { 1 } else { 2 };
            Array1::<f64>::zeros(len).into_dyn()
        });
        let err = seeded(200, 18).run(&[data.view()], &ragged).unwrap_err();
        assert!(matches!(err, BootstrapError::StatisticShape(_)));
    }

    #[test]
    fn test_default_config_from_empty_json() {
        let boot: Bootstrap = serde_json::from_str("{}").unwrap();
        assert_eq!(boot, Bootstrap::default());
    }
}

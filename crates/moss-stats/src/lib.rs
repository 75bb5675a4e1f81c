//! Resampling statistics and signal utilities for small-to-medium numeric datasets.
//!
//! This crate provides a collection of statistical tools including:
//!
//! - **Bootstrap**: Resampling distributions of arbitrary statistics, with optional
//!   sampling units and smoothing
//! - **Percentiles**: Interpolated percentiles along any axis, and percentile ranks
//! - **Randomization tests**: Sign-flip one-sample tests and permutation tests of
//!   correlation matrices, with family-wise error correction
//! - **High-pass filtering**: Removal of slow drift from time series
//! - **Design matrices**: Intercept columns for linear models
//!
//! Every resampling procedure takes an optional [`rng::RandomSeed`]. With a fixed seed,
//! results are reproducible bit for bit even though iterations run in parallel.
//!
//! # Modules
//!
//! - [`bootstrap`]: Bootstrap engine and the [`bootstrap::Statistic`] type
//! - [`descriptive`]: Axis-aware descriptive reductions
//! - [`design`]: Design matrix construction
//! - [`highpass`]: Cosine-basis high-pass filter
//! - [`percentiles`]: Percentile computation and percentile ranks
//! - [`randomize`]: Randomization (permutation) tests
//! - [`rng`]: Seeds and per-iteration random streams
//!
//! # Examples
//!
//! ## Bootstrapping a confidence interval
//!
//! ```
//! use moss_stats::{
//!     bootstrap::{Bootstrap, Statistic},
//!     percentiles::percentiles,
//!     rng::RandomSeed,
//! };
//! use ndarray::array;
//!
//! let data = array![2.1, 3.4, 1.9, 4.2, 3.3, 2.8, 3.9, 2.5].into_dyn();
//! let dist = Bootstrap {
//!     n_boot: 1000,
//!     seed: Some(RandomSeed::new(1)),
//!     ..Bootstrap::default()
//! }
//! .run(&[data.view()], &Statistic::default())
//! .unwrap();
//!
//! let ci = percentiles(&dist, &[2.5, 97.5], None);
//! let bounds = ci.iter().copied().collect::<Vec<_>>();
//! assert!(bounds[0] < bounds[1]);
//! ```
//!
//! ## Computing percentiles
//!
//! ```
//! use moss_stats::percentiles::Percentiles;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
//! assert_eq!(percentiles.get(50.0), Some(3.0));
//! ```
//!
//! ## Testing a sample mean
//!
//! ```
//! use moss_stats::{randomize::randomize_onesample, rng::RandomSeed};
//! use ndarray::array;
//!
//! let sample = array![0.5, -0.2, 0.1, 0.4, -0.3, 0.2];
//! let result = randomize_onesample(sample.view(), 1000, Some(RandomSeed::new(0)), false).unwrap();
//! assert!((0.0..=1.0).contains(&result.p_value));
//! ```

pub mod bootstrap;
pub mod descriptive;
pub mod design;
pub mod highpass;
pub mod percentiles;
pub mod randomize;
pub mod rng;

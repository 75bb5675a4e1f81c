//! Permutation and sign-flip randomization tests.
//!
//! Both tests build an empirical null distribution by re-randomizing the data `n_iter`
//! times and recomputing the test statistic, then read the p-value off that
//! distribution with [`percentile_of_score`]:
//!
//! - [`OneSampleRandomization`] - one-sample t-test against `h_0`, null built by
//!   randomly flipping the sign of each observation
//! - [`CorrmatRandomization`] - pairwise correlation matrix, null built by shuffling
//!   each variable's observation order independently
//!
//! Iteration `i` draws only from [`RandomSeed::stream`]`(i)`, so a fixed seed gives
//! bit-identical null distributions no matter how the iterations are scheduled.
//!
//! P-values count ties as "at least as extreme" and are not shifted by one; a p-value
//! of `0` means no null draw reached the observed statistic.
//!
//! [`RandomSeed::stream`]: crate::rng::RandomSeed::stream

use serde::{Deserialize, Serialize};

use crate::percentiles::{RankKind, percentile_of_score};

pub use self::{corrmat::*, onesample::*};

mod corrmat;
mod onesample;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RandomizationError {
    #[display("randomization test needs at least 2 observations, got {n_obs}")]
    TooFewObservations { n_obs: usize },
    #[display("correlation test needs at least 2 variables, got {n_vars}")]
    TooFewVariables { n_vars: usize },
    #[display("randomization test needs at least one iteration")]
    NoIterations,
}

/// Which tail(s) of the null distribution count as extreme.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Tail {
    /// Null values at least as large as the observed value.
    Upper,
    /// Null values at most as large as the observed value.
    Lower,
    /// Null magnitudes at least as large as the observed magnitude.
    #[default]
    Both,
}

/// Fraction of `null` at least as extreme as `observed` in the given tail.
///
/// # Panics
///
/// Panics if `null` is empty.
///
/// # Examples
///
/// ```
/// use moss_stats::randomize::{Tail, tail_p_value};
///
/// let null = [-3.0, -1.0, 0.0, 1.0, 2.0];
/// assert_eq!(tail_p_value(&null, 2.0, Tail::Upper), 0.2);
/// assert_eq!(tail_p_value(&null, -1.0, Tail::Lower), 0.4);
/// assert_eq!(tail_p_value(&null, 2.0, Tail::Both), 0.4);
/// ```
#[must_use]
pub fn tail_p_value(null: &[f64], observed: f64, tail: Tail) -> f64 {
    let p = match tail {
        Tail::Upper => 100.0 - percentile_of_score(null, observed, RankKind::Strict),
        Tail::Lower => percentile_of_score(null, observed, RankKind::Weak),
        Tail::Both => {
            let magnitudes = null.iter().map(|v| v.abs()).collect::<Vec<_>>();
            100.0 - percentile_of_score(&magnitudes, observed.abs(), RankKind::Strict)
        }
    };
    (p / 100.0).clamp(0.0, 1.0)
}

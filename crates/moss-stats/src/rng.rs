//! Seeded random streams for the resampling engines.
//!
//! Every iterative procedure in this crate derives the random stream of iteration
//! `i` from the pair `(seed, i)` alone. Iterations can therefore run in any order,
//! or in parallel, and still produce bit-identical distributions for a fixed seed.
//!
//! # Example
//!
//! ```
//! use moss_stats::rng::RandomSeed;
//! use rand::Rng as _;
//!
//! let seed = RandomSeed::new(42);
//! let a: f64 = seed.stream(7).random();
//! let b: f64 = seed.stream(7).random();
//! assert_eq!(a, b);
//! ```

use std::fmt::Write as _;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seed for deterministic resampling.
///
/// A 64-bit seed, serialized as a 16-character hex string. Using the same seed
/// produces the same bootstrap or null distribution.
///
/// # Example
///
/// ```
/// use moss_stats::rng::RandomSeed;
/// use rand::Rng as _;
///
/// // Generate a random seed
/// let seed: RandomSeed = rand::rng().random();
///
/// // Or fix one for reproducible results
/// let seed = RandomSeed::from(1234);
/// assert_eq!(seed.value(), 1234);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RandomSeed(u64);

impl RandomSeed {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Draws a fresh seed from the thread-local entropy source.
    #[must_use]
    pub fn from_entropy() -> Self {
        rand::rng().random()
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the independent random stream for iteration `index`.
    #[must_use]
    pub fn stream(self, index: usize) -> Pcg64 {
        Pcg64::seed_from_u64(mix(self.0, index as u64))
    }

    /// Uses the given seed, or draws one from entropy when none was configured.
    pub(crate) fn resolve(seed: Option<Self>) -> Self {
        seed.unwrap_or_else(Self::from_entropy)
    }
}

impl From<u64> for RandomSeed {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for RandomSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut hex_str = String::with_capacity(16);
        write!(&mut hex_str, "{:016x}", self.0).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex_str)
    }
}

impl<'de> Deserialize<'de> for RandomSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 16 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 16 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u64::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self(num))
    }
}

/// Allows generating random `RandomSeed` values with `rng.random()`.
impl Distribution<RandomSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RandomSeed {
        RandomSeed(rng.random())
    }
}

/// `SplitMix64` finalizer over `base + counter * golden_gamma`.
///
/// Neighbouring counters map to unrelated seeds, so per-iteration streams do not
/// start from correlated states.
fn mix(base: u64, counter: u64) -> u64 {
    let mut z = base.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

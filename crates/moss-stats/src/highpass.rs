//! High-pass filtering of time series by regressing out a low-frequency cosine basis.
//!
//! The filter matrix is the residual-forming projection `I - F (FᵀF)⁻¹ Fᵀ`, where the
//! columns of `F` are the orthonormal DCT-II cosines whose period (in timepoints) is
//! longer than the cutoff. Applying it to a series removes every component slower than
//! the cutoff and leaves faster components untouched.
//!
//! Shortening the cutoff period only ever adds columns to `F`, so the removed subspaces
//! are nested and a shorter cutoff always removes at least as much low-frequency power.

use nalgebra::DMatrix;
use ndarray::{Array, Array2, ArrayBase, Axis, Data, DataMut, Dimension};
use tracing::debug;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum HighpassError {
    #[display("highpass filtering needs 1-D or 2-D data, got {ndim} dimensions")]
    Dimensionality { ndim: usize },
    #[display("cutoff period must be positive, got {cutoff}")]
    NonPositiveCutoff { cutoff: f64 },
    #[display(
        "cutoff period {cutoff} is too short for {n_timepoints} timepoints ({n_basis} cosine columns)"
    )]
    CutoffTooShort {
        cutoff: f64,
        n_timepoints: usize,
        n_basis: usize,
    },
    #[display("cosine basis with {n_basis} columns is singular for {n_timepoints} timepoints")]
    SingularBasis { n_timepoints: usize, n_basis: usize },
}

/// Number of DCT-II columns with a period longer than `cutoff` timepoints.
///
/// Column `k` has period `2n / k`; the constant column `k = 0` is always included.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn basis_size(n_timepoints: usize, cutoff: f64) -> usize {
    let count = (2.0 * n_timepoints as f64 / cutoff).ceil();
    if count.is_finite() {
        (count as usize).max(1)
    } else {
        usize::MAX
    }
}

#[expect(clippy::cast_precision_loss)]
fn cosine_basis(n_timepoints: usize, n_basis: usize) -> DMatrix<f64> {
    let n = n_timepoints as f64;
    DMatrix::from_fn(n_timepoints, n_basis, |t, k| {
        if k == 0 {
            1.0 / n.sqrt()
        } else {
            let phase = std::f64::consts::PI * k as f64 * (2.0 * t as f64 + 1.0) / (2.0 * n);
            (2.0 / n).sqrt() * phase.cos()
        }
    })
}

/// Builds the `n_timepoints × n_timepoints` high-pass filter matrix.
///
/// The matrix is exactly symmetric, and each row's largest-magnitude entry sits on the
/// diagonal. Cutoffs are accepted only while the `K` cosine columns satisfy
/// `2 (2K - 1) < n_timepoints`, which is roughly a cutoff longer than eight timepoints.
///
/// # Errors
///
/// - [`HighpassError::NonPositiveCutoff`] if `cutoff_period` is not a positive number
/// - [`HighpassError::CutoffTooShort`] if the cutoff needs too many cosine columns for
///   the diagonal to dominate
/// - [`HighpassError::SingularBasis`] if the cosine Gram matrix cannot be inverted
///
/// # Examples
///
/// ```
/// use moss_stats::highpass::fsl_highpass_matrix;
///
/// let f = fsl_highpass_matrix(64, 32.0).unwrap();
/// assert_eq!(f.dim(), (64, 64));
/// assert_eq!(f[[3, 5]], f[[5, 3]]);
/// ```
#[tracing::instrument(level = "debug")]
pub fn fsl_highpass_matrix(
    n_timepoints: usize,
    cutoff_period: f64,
) -> Result<Array2<f64>, HighpassError> {
    if cutoff_period.is_nan() || cutoff_period <= 0.0 {
        return Err(HighpassError::NonPositiveCutoff {
            cutoff: cutoff_period,
        });
    }
    let n_basis = basis_size(n_timepoints, cutoff_period);
    // Every projection entry is bounded by (2K - 1) / n, so the residual diagonal
    // strictly dominates its row when 2 (2K - 1) < n.
    if n_basis.saturating_mul(4) >= n_timepoints.saturating_add(2) {
        return Err(HighpassError::CutoffTooShort {
            cutoff: cutoff_period,
            n_timepoints,
            n_basis,
        });
    }

    let basis = cosine_basis(n_timepoints, n_basis);
    let gram = basis.transpose() * &basis;
    let Some(gram_inv) = gram.try_inverse() else {
        return Err(HighpassError::SingularBasis {
            n_timepoints,
            n_basis,
        });
    };
    let projection = &basis * gram_inv * basis.transpose();
    debug!(n_basis, "built cosine basis");

    Ok(Array2::from_shape_fn(
        (n_timepoints, n_timepoints),
        |(i, j)| {
            let p = 0.5 * (projection[(i, j)] + projection[(j, i)]);
            if i == j { 1.0 - p } else { -p }
        },
    ))
}

/// Filters `data` along axis 0 and returns the result, leaving `data` untouched.
///
/// 2-D input is filtered column by column.
///
/// # Errors
///
/// - [`HighpassError::Dimensionality`] if `data` is not 1-D or 2-D
/// - any error of [`fsl_highpass_matrix`]
///
/// # Examples
///
/// ```
/// use moss_stats::highpass::fsl_highpass_filter;
/// use ndarray::Array1;
///
/// let drift = Array1::linspace(0.0, 1.0, 50);
/// let filtered = fsl_highpass_filter(&drift, 10.0).unwrap();
/// assert_eq!(filtered.len(), 50);
/// assert!(filtered.sum().abs() < 1e-9);
/// ```
pub fn fsl_highpass_filter<S, D>(
    data: &ArrayBase<S, D>,
    cutoff_period: f64,
) -> Result<Array<f64, D>, HighpassError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut filtered = data.to_owned();
    fsl_highpass_filter_inplace(&mut filtered, cutoff_period)?;
    Ok(filtered)
}

/// Filters `data` along axis 0, overwriting it.
///
/// # Errors
///
/// Same as [`fsl_highpass_filter`]. On error `data` is left unchanged.
pub fn fsl_highpass_filter_inplace<S, D>(
    data: &mut ArrayBase<S, D>,
    cutoff_period: f64,
) -> Result<(), HighpassError>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    let ndim = data.ndim();
    if !(1..=2).contains(&ndim) {
        return Err(HighpassError::Dimensionality { ndim });
    }
    let matrix = fsl_highpass_matrix(data.len_of(Axis(0)), cutoff_period)?;
    for mut lane in data.lanes_mut(Axis(0)) {
        let filtered = matrix.dot(&lane);
        lane.assign(&filtered);
    }
    Ok(())
}

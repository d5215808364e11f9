//! The rank characteristics, described as data.
//!
//! A [`Characteristic`] names what is computed per aperture; the engine
//! pairs it with a pattern and a source matrix. Per-point inputs come either
//! as one scalar for the whole call or as a matrix read alongside the
//! source — both behave identically.

use core::fmt;

use crate::error::{Error, Result, bail};
use crate::histogram::Histogram;
use crate::matrix::Matrix;

/// Filler sentinel: "mean between values" returns its lower bound when the
/// range is empty.
pub const FILL_MIN_VALUE: f64 = f64::NEG_INFINITY;

/// Filler sentinel: "mean between values" returns its upper bound when the
/// range is empty.
pub const FILL_MAX_VALUE: f64 = f64::INFINITY;

/// Filler sentinel: "mean between values" returns the nearest aperture
/// content (or the midpoint) when the range is empty.
pub const FILL_NEAREST_VALUE: f64 = f64::NAN;

/// A per-point real input: one scalar for every position, or a matrix of
/// the source's shape read position by position.
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    /// The same value at every position.
    Value(f64),
    /// Per-position values, read with [`Matrix::get_double`].
    Matrix(&'a Matrix),
}

impl Arg<'_> {
    /// The value at ordinal `i`, rejecting NaN.
    pub(crate) fn at(&self, i: usize, what: &'static str) -> Result<f64> {
        let v = match self {
            Self::Value(v) => *v,
            Self::Matrix(m) => m.get_double(i),
        };
        if v.is_nan() {
            bail!(Error::InvalidNumericArgument(what));
        }
        Ok(v)
    }

    pub(crate) fn matrix(&self) -> Option<&Matrix> {
        match self {
            Self::Value(_) => None,
            Self::Matrix(m) => Some(m),
        }
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Matrix(m) => f.debug_tuple("Matrix").field(&m.dims()).finish(),
        }
    }
}

/// What to compute for every aperture position.
pub enum Characteristic<'a> {
    /// The value of the given rank index, `v(r)/σ`.
    Percentile {
        /// Rank index in `[0, N]`.
        index: Arg<'a>,
    },
    /// The rank of the given value, `r(v·σ)`.
    Rank {
        /// The value whose rank is taken.
        value: Arg<'a>,
    },
    /// The mean aperture value between two rank indices.
    MeanBetweenPercentiles {
        /// Lower rank index.
        from: Arg<'a>,
        /// Upper rank index.
        to: Arg<'a>,
        /// Returned when `from >= to`.
        filler: f64,
    },
    /// The mean aperture value between two value bounds.
    MeanBetweenValues {
        /// Lower value bound.
        min: Arg<'a>,
        /// Upper value bound.
        max: Arg<'a>,
        /// Returned (or interpreted as a sentinel) when the range selects
        /// nothing; see [`FILL_MIN_VALUE`], [`FILL_MAX_VALUE`],
        /// [`FILL_NEAREST_VALUE`].
        filler: f64,
    },
    /// `f(v, v(r₁)/σ, v(r₂)/σ)` with `v` the source value at the position.
    PercentilePair {
        /// First rank index.
        from: Arg<'a>,
        /// Second rank index.
        to: Arg<'a>,
        /// The combining function.
        f: &'a (dyn Fn(f64, f64, f64) -> f64 + Sync),
    },
    /// The aperture mean, `Σ/N` plus `0.5` for fixed-point sources.
    Mean,
    /// A function of the raw aperture sum.
    SumFunction {
        /// Applied to the aperture sum.
        f: &'a (dyn Fn(f64) -> f64 + Sync),
    },
}

impl Characteristic<'_> {
    /// Whether this characteristic runs on the aperture-sum accumulator
    /// instead of the histogram.
    pub(crate) fn uses_sum(&self) -> bool {
        matches!(self, Self::Mean | Self::SumFunction { .. })
    }

    pub(crate) fn args(&self) -> [Option<&Arg<'_>>; 2] {
        match self {
            Self::Percentile { index } => [Some(index), None],
            Self::Rank { value } => [Some(value), None],
            Self::MeanBetweenPercentiles { from, to, .. }
            | Self::MeanBetweenValues { min: from, max: to, .. }
            | Self::PercentilePair { from, to, .. } => [Some(from), Some(to)],
            Self::Mean | Self::SumFunction { .. } => [None, None],
        }
    }
}

impl fmt::Debug for Characteristic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile { index } => f.debug_struct("Percentile").field("index", index).finish(),
            Self::Rank { value } => f.debug_struct("Rank").field("value", value).finish(),
            Self::MeanBetweenPercentiles { from, to, filler } => f
                .debug_struct("MeanBetweenPercentiles")
                .field("from", from)
                .field("to", to)
                .field("filler", filler)
                .finish(),
            Self::MeanBetweenValues { min, max, filler } => f
                .debug_struct("MeanBetweenValues")
                .field("min", min)
                .field("max", max)
                .field("filler", filler)
                .finish(),
            Self::PercentilePair { from, to, .. } => f
                .debug_struct("PercentilePair")
                .field("from", from)
                .field("to", to)
                .finish_non_exhaustive(),
            Self::Mean => f.write_str("Mean"),
            Self::SumFunction { .. } => f.debug_struct("SumFunction").finish_non_exhaustive(),
        }
    }
}

/// The mean aperture value between the rank indices `r1 < r2`, or `filler`.
pub(crate) fn mean_between_percentiles(
    h: &Histogram,
    interpolated: bool,
    sigma: f64,
    r1: f64,
    r2: f64,
    filler: f64,
) -> f64 {
    let n = h.total() as f64;
    let r1 = r1.clamp(0.0, n);
    let r2 = r2.clamp(0.0, n);
    if r1 < r2 {
        (h.sum_to_rank(r2, interpolated) - h.sum_to_rank(r1, interpolated)) / ((r2 - r1) * sigma)
    } else {
        filler
    }
}

/// The mean aperture value between the value bounds `v1 < v2`, or one of the
/// four corner modes selected by the filler sentinel.
pub(crate) fn mean_between_values(
    h: &Histogram,
    interpolated: bool,
    sigma: f64,
    v1: f64,
    v2: f64,
    filler: f64,
) -> f64 {
    let rho1 = h.rank_of(v1 * sigma, interpolated);
    let rho2 = h.rank_of(v2 * sigma, interpolated);
    if v1 < v2 && rho1 < rho2 {
        let s1 = h.sum_to_rank(rho1, interpolated);
        let s2 = h.sum_to_rank(rho2, interpolated);
        return (s2 - s1) / ((rho2 - rho1) * sigma);
    }
    if filler == FILL_MIN_VALUE {
        v1
    } else if filler == FILL_MAX_VALUE {
        v2
    } else if filler.is_nan() {
        if v1 >= v2 {
            0.5 * (v1 + v2)
        } else if rho1 == rho2 && rho1 == 0.0 {
            // The whole aperture lies above the range.
            v2
        } else if rho1 == rho2 && rho2 == h.total() as f64 {
            // The whole aperture lies below the range.
            v1
        } else {
            0.5 * (v1 + v2)
        }
    } else {
        filler
    }
}

//! Error types for rank morphology operations.

use core::fmt;

/// The error type shared by all rank morphology operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Pattern and matrix have different numbers of dimensions.
    DimensionMismatch {
        /// Number of dimensions of the matrix.
        matrix: usize,
        /// Number of dimensions of the pattern.
        pattern: usize,
    },
    /// A matrix shape is invalid, or two matrices that must share a shape
    /// do not.
    ShapeMismatch,
    /// Invalid precision descriptor.
    BadPrecision(&'static str),
    /// Dilation or erosion level outside `[0, 1]`.
    BadLevel(f64),
    /// NaN was supplied where a real number is required.
    InvalidNumericArgument(&'static str),
    /// The pattern has too many points to enumerate.
    TooManyPoints,
    /// The pattern contains no points.
    EmptyPattern,
    /// A tile halo leaves the representable index range.
    OutOfRange,
    /// The computation was cancelled through its context.
    Interrupted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { matrix, pattern } => {
                write!(
                    f,
                    "pattern has {pattern} dimension(s), matrix has {matrix}"
                )
            }
            Self::ShapeMismatch => write!(f, "invalid or mismatched matrix shape"),
            Self::BadPrecision(reason) => write!(f, "invalid precision descriptor: {reason}"),
            Self::BadLevel(level) => {
                write!(f, "dilation/erosion level {level} is outside [0, 1]")
            }
            Self::InvalidNumericArgument(what) => write!(f, "{what} must not be NaN"),
            Self::TooManyPoints => write!(f, "pattern has too many points"),
            Self::EmptyPattern => write!(f, "pattern contains no points"),
            Self::OutOfRange => write!(f, "tile halo exceeds the representable index range"),
            Self::Interrupted => write!(f, "computation was cancelled"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for rank morphology operations.
pub type Result<T> = core::result::Result<T, Error>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err)
    };
}

pub(crate) use bail;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        let e = Error::DimensionMismatch {
            matrix: 2,
            pattern: 3,
        };
        assert_eq!(e.to_string(), "pattern has 3 dimension(s), matrix has 2");
        assert_eq!(
            Error::BadPrecision("empty bit levels").to_string(),
            "invalid precision descriptor: empty bit levels"
        );
    }
}

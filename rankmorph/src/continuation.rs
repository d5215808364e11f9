//! Boundary continuation: how reads outside the source matrix resolve.

use crate::matrix::Matrix;

/// Policy for reading source positions outside the matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Continuation {
    /// Flatten the coordinates to the linear index space and wrap modulo the
    /// total size, so walking past the end of one row continues in the next.
    /// The default of non-tiled rank operations.
    PseudoCyclic,
    /// Per-axis modulo.
    Cyclic,
    /// Reflect at the boundaries.
    Mirror,
    /// Substitute a fixed value for every out-of-range read.
    Constant(f64),
    /// Clamp to the nearest in-range index.
    Nearest,
}

/// An out-of-range read resolves either to an in-range cell or to the
/// continuation constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell {
    At(usize),
    Outside,
}

fn mirror(c: i64, d: i64) -> i64 {
    let period = 2 * d;
    let mut m = c.rem_euclid(period);
    if m >= d {
        m = period - 1 - m;
    }
    m
}

impl Continuation {
    /// Resolve possibly out-of-range coordinates against `matrix`.
    pub(crate) fn resolve(self, matrix: &Matrix, coords: &[i64]) -> Cell {
        let dims = matrix.dims();
        let strides = matrix.strides();
        match self {
            Self::PseudoCyclic => Cell::At(matrix.pseudo_cyclic_index(coords)),
            Self::Cyclic => {
                let mut idx = 0_usize;
                for (k, &c) in coords.iter().enumerate() {
                    idx += c.rem_euclid(dims[k] as i64) as usize * strides[k];
                }
                Cell::At(idx)
            }
            Self::Mirror => {
                let mut idx = 0_usize;
                for (k, &c) in coords.iter().enumerate() {
                    idx += mirror(c, dims[k] as i64) as usize * strides[k];
                }
                Cell::At(idx)
            }
            Self::Constant(_) => match matrix.index(coords) {
                Some(idx) => Cell::At(idx),
                None => Cell::Outside,
            },
            Self::Nearest => {
                let mut idx = 0_usize;
                for (k, &c) in coords.iter().enumerate() {
                    idx += c.clamp(0, dims[k] as i64 - 1) as usize * strides[k];
                }
                Cell::At(idx)
            }
        }
    }

    /// The substituted value of [`Continuation::Constant`], if any.
    pub(crate) fn constant(self) -> Option<f64> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }
}

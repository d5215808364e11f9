//! Shared input builders for the rankmorph benchmarks.

use rankmorph::{Matrix, Pattern};

/// A deterministic pseudo-random byte matrix.
pub fn noise_matrix(dims: &[usize]) -> Matrix {
    let len: usize = dims.iter().product();
    let mut state = 0x2545F491_u32;
    let data = (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect();
    Matrix::from_u8(dims, data).expect("valid benchmark dimensions")
}

/// A centred square pattern of the given radius.
pub fn square_pattern(radius: i64) -> Pattern {
    Pattern::rectangular(&[-radius, -radius], &[radius, radius])
        .expect("valid benchmark pattern")
}

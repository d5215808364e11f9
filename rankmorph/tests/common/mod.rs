//! Naive reference implementations used to cross-check the streaming
//! engine: gather every aperture from scratch, resolve boundaries by hand
//! and compute characteristics from the sorted values.

use rankmorph::{Continuation, Matrix, Pattern};

fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(dims.len());
    let mut acc = 1;
    for &d in dims {
        strides.push(acc);
        acc *= d;
    }
    strides
}

fn resolve(src: &Matrix, continuation: Continuation, at: &[i64]) -> f64 {
    let dims = src.dims();
    let strides = strides(dims);
    let len: usize = dims.iter().product();
    match continuation {
        Continuation::PseudoCyclic => {
            let mut idx = 0_i128;
            for (k, &c) in at.iter().enumerate() {
                idx += i128::from(c) * strides[k] as i128;
            }
            src.get_double(idx.rem_euclid(len as i128) as usize)
        }
        Continuation::Cyclic => {
            let mut idx = 0;
            for (k, &c) in at.iter().enumerate() {
                idx += c.rem_euclid(dims[k] as i64) as usize * strides[k];
            }
            src.get_double(idx)
        }
        Continuation::Mirror => {
            let mut idx = 0;
            for (k, &c) in at.iter().enumerate() {
                let d = dims[k] as i64;
                let mut m = c.rem_euclid(2 * d);
                if m >= d {
                    m = 2 * d - 1 - m;
                }
                idx += m as usize * strides[k];
            }
            src.get_double(idx)
        }
        Continuation::Nearest => {
            let mut idx = 0;
            for (k, &c) in at.iter().enumerate() {
                idx += c.clamp(0, dims[k] as i64 - 1) as usize * strides[k];
            }
            src.get_double(idx)
        }
        Continuation::Constant(c) => {
            let in_bounds = at
                .iter()
                .enumerate()
                .all(|(k, &c)| c >= 0 && (c as usize) < dims[k]);
            if in_bounds {
                let mut idx = 0;
                for (k, &c) in at.iter().enumerate() {
                    idx += c as usize * strides[k];
                }
                src.get_double(idx)
            } else {
                // A substituted byte-matrix cell truncates the constant.
                f64::from(c as u8)
            }
        }
    }
}

/// Every position of `src` as coordinates, in scan order.
pub fn positions(src: &Matrix) -> Vec<Vec<i64>> {
    let dims = src.dims();
    let mut all = Vec::with_capacity(src.len());
    for mut rest in 0..src.len() {
        let mut coords = Vec::with_capacity(dims.len());
        for &d in dims {
            coords.push((rest % d) as i64);
            rest /= d;
        }
        all.push(coords);
    }
    all
}

/// The aperture of `pattern` at `x`: source values at `x − p`.
pub fn aperture(
    src: &Matrix,
    pattern: &Pattern,
    continuation: Continuation,
    x: &[i64],
) -> Vec<f64> {
    pattern
        .points()
        .map(|p| {
            let at: Vec<i64> = x.iter().zip(p).map(|(&c, &q)| c - q).collect();
            resolve(src, continuation, &at)
        })
        .collect()
}

/// Simple-model percentile of a byte aperture: the `⌊r⌋`-th sorted value,
/// clamped into the sample range.
pub fn naive_percentile(values: &[f64], r: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let k = (r.floor().max(0.0) as usize).min(sorted.len() - 1);
    sorted[k]
}

/// Simple-model rank of an integer value in a byte aperture: the count of
/// strictly smaller samples.
pub fn naive_rank(values: &[f64], v: f64) -> f64 {
    values.iter().filter(|&&s| s < v.floor()).count() as f64
        + (v - v.floor()) * values.iter().filter(|&&s| s == v.floor()).count() as f64
}

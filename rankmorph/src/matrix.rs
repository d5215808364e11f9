//! Dense n-dimensional matrices over the closed element set.
//!
//! Axis 0 varies fastest: the linear index of coordinates `(c0, …, c_{n-1})`
//! is `c0 + d0·(c1 + d1·(c2 + …))`. All scans and destination writes follow
//! this order.

use crate::element::{ElementType, Quantizer};
use crate::error::{Error, Result, bail};

/// Per-type sample storage.
#[derive(Debug, Clone)]
enum Samples {
    Bit(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Samples {
    fn len(&self) -> usize {
        match self {
            Self::Bit(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }
}

/// A dense n-dimensional matrix.
#[derive(Debug, Clone)]
pub struct Matrix {
    dims: Vec<usize>,
    strides: Vec<usize>,
    samples: Samples,
}

fn strides_for(dims: &[usize]) -> Result<(Vec<usize>, usize)> {
    if dims.is_empty() {
        bail!(Error::ShapeMismatch);
    }
    let mut strides = Vec::with_capacity(dims.len());
    let mut len = 1_usize;
    for &d in dims {
        if d == 0 {
            bail!(Error::ShapeMismatch);
        }
        strides.push(len);
        len = len.checked_mul(d).ok_or(Error::OutOfRange)?;
    }
    // Linear offsets must stay addressable in i64 arithmetic.
    if i64::try_from(len).is_err() {
        bail!(Error::OutOfRange);
    }
    Ok((strides, len))
}

impl Matrix {
    fn from_samples(dims: &[usize], samples: Samples) -> Result<Self> {
        let (strides, len) = strides_for(dims)?;
        if samples.len() != len {
            bail!(Error::ShapeMismatch);
        }
        Ok(Self {
            dims: dims.to_vec(),
            strides,
            samples,
        })
    }

    /// Create a zero-filled matrix of the given element type and dimensions.
    pub fn new(elem: ElementType, dims: &[usize]) -> Result<Self> {
        let (strides, len) = strides_for(dims)?;
        let samples = match elem {
            ElementType::Bit => Samples::Bit(vec![false; len]),
            ElementType::U8 => Samples::U8(vec![0; len]),
            ElementType::U16 => Samples::U16(vec![0; len]),
            ElementType::U32 => Samples::U32(vec![0; len]),
            ElementType::U64 => Samples::U64(vec![0; len]),
            ElementType::F32 => Samples::F32(vec![0.0; len]),
            ElementType::F64 => Samples::F64(vec![0.0; len]),
        };
        Ok(Self {
            dims: dims.to_vec(),
            strides,
            samples,
        })
    }

    /// Create a bit matrix from `data` in scan order.
    pub fn from_bits(dims: &[usize], data: Vec<bool>) -> Result<Self> {
        Self::from_samples(dims, Samples::Bit(data))
    }

    /// Create an 8-bit matrix from `data` in scan order.
    pub fn from_u8(dims: &[usize], data: Vec<u8>) -> Result<Self> {
        Self::from_samples(dims, Samples::U8(data))
    }

    /// Create a 16-bit matrix from `data` in scan order.
    pub fn from_u16(dims: &[usize], data: Vec<u16>) -> Result<Self> {
        Self::from_samples(dims, Samples::U16(data))
    }

    /// Create a 32-bit matrix from `data` in scan order.
    pub fn from_u32(dims: &[usize], data: Vec<u32>) -> Result<Self> {
        Self::from_samples(dims, Samples::U32(data))
    }

    /// Create a 64-bit matrix from `data` in scan order.
    pub fn from_u64(dims: &[usize], data: Vec<u64>) -> Result<Self> {
        Self::from_samples(dims, Samples::U64(data))
    }

    /// Create a 32-bit floating-point matrix from `data` in scan order.
    pub fn from_f32(dims: &[usize], data: Vec<f32>) -> Result<Self> {
        Self::from_samples(dims, Samples::F32(data))
    }

    /// Create a 64-bit floating-point matrix from `data` in scan order.
    pub fn from_f64(dims: &[usize], data: Vec<f64>) -> Result<Self> {
        Self::from_samples(dims, Samples::F64(data))
    }

    /// The element type of this matrix.
    pub fn elem_type(&self) -> ElementType {
        match &self.samples {
            Samples::Bit(_) => ElementType::Bit,
            Samples::U8(_) => ElementType::U8,
            Samples::U16(_) => ElementType::U16,
            Samples::U32(_) => ElementType::U32,
            Samples::U64(_) => ElementType::U64,
            Samples::F32(_) => ElementType::F32,
            Samples::F64(_) => ElementType::F64,
        }
    }

    /// The dimensions `d_0, …, d_{n-1}`.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The number of dimensions.
    pub fn dim_count(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the matrix has no elements (never true for a valid matrix).
    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }

    /// Whether `other` has the same dimensions.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.dims == other.dims
    }

    pub(crate) fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// The linear index of in-range coordinates, or `None` when any
    /// coordinate is out of range.
    pub fn index(&self, coords: &[i64]) -> Option<usize> {
        debug_assert_eq!(coords.len(), self.dims.len());
        let mut idx = 0_usize;
        for (k, &c) in coords.iter().enumerate() {
            if c < 0 || c as usize >= self.dims[k] {
                return None;
            }
            idx += c as usize * self.strides[k];
        }
        Some(idx)
    }

    /// The pseudo-cyclic linear index: coordinates are flattened with the
    /// usual stride schedule and the result is wrapped modulo the total
    /// size, so walking out of one row continues in the next.
    pub fn pseudo_cyclic_index(&self, coords: &[i64]) -> usize {
        debug_assert_eq!(coords.len(), self.dims.len());
        let mut idx = 0_i128;
        for (k, &c) in coords.iter().enumerate() {
            idx += i128::from(c) * self.strides[k] as i128;
        }
        idx.rem_euclid(self.samples.len() as i128) as usize
    }

    /// Read the raw integer value of a fixed-point element.
    ///
    /// For floating-point matrices this truncates the sample toward zero;
    /// fixed-point callers are the only intended users.
    pub fn get_raw(&self, i: usize) -> u64 {
        match &self.samples {
            Samples::Bit(v) => u64::from(v[i]),
            Samples::U8(v) => u64::from(v[i]),
            Samples::U16(v) => u64::from(v[i]),
            Samples::U32(v) => u64::from(v[i]),
            Samples::U64(v) => v[i],
            Samples::F32(v) => v[i] as u64,
            Samples::F64(v) => v[i] as u64,
        }
    }

    /// Read an element as a real number: the integer value for fixed-point
    /// types, the raw sample for floating-point types.
    pub fn get_double(&self, i: usize) -> f64 {
        match &self.samples {
            Samples::Bit(v) => f64::from(v[i]),
            Samples::U8(v) => f64::from(v[i]),
            Samples::U16(v) => f64::from(v[i]),
            Samples::U32(v) => f64::from(v[i]),
            Samples::U64(v) => v[i] as f64,
            Samples::F32(v) => f64::from(v[i]),
            Samples::F64(v) => v[i],
        }
    }

    /// Write a real result into an element, casting into the element type:
    /// saturating truncation toward zero for the integer types (NaN → 0),
    /// `y != 0` for bit elements.
    pub fn set_double(&mut self, i: usize, y: f64) {
        match &mut self.samples {
            Samples::Bit(v) => v[i] = y != 0.0,
            Samples::U8(v) => v[i] = y as u8,
            Samples::U16(v) => v[i] = y as u16,
            Samples::U32(v) => v[i] = y as u32,
            Samples::U64(v) => v[i] = y as u64,
            Samples::F32(v) => v[i] = y as f32,
            Samples::F64(v) => v[i] = y,
        }
    }

    /// Write a raw fixed-point value; both matrices of a copy must share the
    /// element type.
    pub(crate) fn set_raw(&mut self, i: usize, v: u64) {
        match &mut self.samples {
            Samples::Bit(s) => s[i] = v != 0,
            Samples::U8(s) => s[i] = v as u8,
            Samples::U16(s) => s[i] = v as u16,
            Samples::U32(s) => s[i] = v as u32,
            Samples::U64(s) => s[i] = v,
            Samples::F32(_) | Samples::F64(_) => {
                debug_assert!(false, "raw write into a floating-point matrix");
            }
        }
    }

    /// Copy element `from` of `src` into element `to` of `self` without a
    /// round trip through `f64` (exactness matters for `U64`).
    pub(crate) fn copy_element(&mut self, to: usize, src: &Self, from: usize) {
        match (&mut self.samples, &src.samples) {
            (Samples::F32(d), Samples::F32(s)) => d[to] = s[from],
            (Samples::F64(d), Samples::F64(s)) => d[to] = s[from],
            _ => {
                let v = src.get_raw(from);
                self.set_raw(to, v);
            }
        }
    }

    /// Quantize element `i` into a histogram bin.
    #[inline]
    pub(crate) fn quantized(&self, i: usize, q: Quantizer) -> u32 {
        match &self.samples {
            Samples::Bit(v) => q.raw(u64::from(v[i])),
            Samples::U8(v) => q.raw(u64::from(v[i])),
            Samples::U16(v) => q.raw(u64::from(v[i])),
            Samples::U32(v) => q.raw(u64::from(v[i])),
            Samples::U64(v) => q.raw(v[i]),
            Samples::F32(v) => q.real(f64::from(v[i])),
            Samples::F64(v) => q.real(v[i]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_index_is_axis0_fastest() {
        let m = Matrix::new(ElementType::U8, &[3, 2]).unwrap();
        assert_eq!(m.index(&[0, 0]), Some(0));
        assert_eq!(m.index(&[2, 0]), Some(2));
        assert_eq!(m.index(&[0, 1]), Some(3));
        assert_eq!(m.index(&[2, 1]), Some(5));
        assert_eq!(m.index(&[3, 0]), None);
        assert_eq!(m.index(&[0, -1]), None);
    }

    #[test]
    fn pseudo_cyclic_index_wraps_flattened() {
        let m = Matrix::new(ElementType::U8, &[3, 3]).unwrap();
        // One step left of the origin is the last element.
        assert_eq!(m.pseudo_cyclic_index(&[-1, 0]), 8);
        // One step right of the last element is the origin.
        assert_eq!(m.pseudo_cyclic_index(&[3, 2]), 0);
        assert_eq!(m.pseudo_cyclic_index(&[1, 1]), 4);
    }

    #[test]
    fn set_double_casts_with_saturation() {
        let mut m = Matrix::new(ElementType::U8, &[4]).unwrap();
        m.set_double(0, -3.5);
        m.set_double(1, 17.9);
        m.set_double(2, 300.0);
        m.set_double(3, f64::NAN);
        let got: Vec<f64> = (0..4).map(|i| m.get_double(i)).collect();
        assert_eq!(got, vec![0.0, 17.0, 255.0, 0.0]);

        let mut b = Matrix::new(ElementType::Bit, &[2]).unwrap();
        b.set_double(0, 0.25);
        b.set_double(1, 0.0);
        assert_eq!(b.get_double(0), 1.0);
        assert_eq!(b.get_double(1), 0.0);
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        assert!(Matrix::new(ElementType::U8, &[]).is_err());
        assert!(Matrix::new(ElementType::U8, &[3, 0]).is_err());
        assert!(Matrix::from_u8(&[4], vec![1, 2, 3]).is_err());
    }
}

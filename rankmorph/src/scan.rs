//! Streaming aperture scan.
//!
//! The scanner walks an output region in scan order (axis 0 fastest) and
//! keeps a sink informed of exactly which source cells enter and leave the
//! aperture at every step, so the sink can maintain a histogram or a running
//! sum incrementally. For every step vector `Δ` the offsets that change are
//! known up front: an offset `o` enters when `o + Δ` is not an offset, and
//! leaves when `o − Δ` is not one. Unit steps along axis 0 and one wrap
//! vector per higher axis (the odometer carry) cover the whole scan.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::context::Context;
use crate::continuation::{Cell, Continuation};
use crate::error::{Error, Result, bail};
use crate::matrix::Matrix;
use crate::pattern::Pattern;

/// The rectangular set of output positions a scan produces, in source
/// coordinates. Outputs are emitted in scan order with ordinals
/// `0..dims.product()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRegion {
    origin: Vec<usize>,
    dims: Vec<usize>,
}

impl OutputRegion {
    /// The region covering a whole matrix of the given dimensions.
    pub fn full(dims: &[usize]) -> Self {
        Self {
            origin: vec![0; dims.len()],
            dims: dims.to_vec(),
        }
    }

    /// A region of the given dimensions starting at `origin`.
    pub fn new(origin: &[usize], dims: &[usize]) -> Self {
        debug_assert_eq!(origin.len(), dims.len());
        Self {
            origin: origin.to_vec(),
            dims: dims.to_vec(),
        }
    }

    /// The region's extent along each axis.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The region's first position along each axis.
    pub fn origin(&self) -> &[usize] {
        &self.origin
    }

    /// The number of output positions.
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Whether the region is degenerate.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiver of aperture updates and output positions.
///
/// `add`/`remove` keep the sink's running state equal to the current
/// aperture; `emit` asks for the output of ordinal `ord`, whose position has
/// the linear source index `pos`.
pub(crate) trait ScanSink {
    fn add(&mut self, cell: Cell);
    fn remove(&mut self, cell: Cell);
    fn emit(&mut self, ord: usize, pos: usize) -> Result<()>;
}

/// One precomputed step of the scan: the coordinate delta plus the offset
/// indices whose cells change.
#[derive(Debug)]
struct Step {
    delta: Vec<i64>,
    delta_lin: i64,
    enters: Vec<u32>,
    leaves: Vec<u32>,
}

/// A configured scan of one pattern over one source matrix.
#[derive(Debug)]
pub(crate) struct Scanner<'a> {
    src: &'a Matrix,
    region: OutputRegion,
    continuation: Continuation,
    n: usize,
    /// Flattened read offsets `o = −p`, `n` coordinates each.
    offsets: Vec<i64>,
    lin_offsets: Vec<i64>,
    /// `steps[k]` is taken when the odometer carries into axis `k`.
    steps: Vec<Step>,
    /// Per-axis read offset bounds, for the interior fast path.
    off_lo: Vec<i64>,
    off_hi: Vec<i64>,
}

fn linear_offset(offset: &[i64], strides: &[usize]) -> Result<i64> {
    let mut acc = 0_i128;
    for (k, &c) in offset.iter().enumerate() {
        acc += i128::from(c) * strides[k] as i128;
    }
    i64::try_from(acc).map_err(|_| Error::OutOfRange)
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(
        src: &'a Matrix,
        region: OutputRegion,
        pattern: &Pattern,
        continuation: Continuation,
    ) -> Result<Self> {
        let n = src.dim_count();
        debug_assert_eq!(pattern.dim_count(), n);
        debug_assert_eq!(region.origin.len(), n);
        for k in 0..n {
            debug_assert!(region.origin[k] + region.dims[k] <= src.dims()[k]);
        }

        // Read offsets are the negated pattern points.
        let count = pattern.point_count();
        let mut offsets = Vec::with_capacity(count * n);
        let mut off_lo = vec![i64::MAX; n];
        let mut off_hi = vec![i64::MIN; n];
        for p in pattern.points() {
            for (k, &c) in p.iter().enumerate() {
                let o = c.checked_neg().ok_or(Error::OutOfRange)?;
                offsets.push(o);
                off_lo[k] = off_lo[k].min(o);
                off_hi[k] = off_hi[k].max(o);
            }
        }
        // Keep coordinate arithmetic far from the i64 edge.
        for k in 0..n {
            let reach = off_lo[k].unsigned_abs().max(off_hi[k].unsigned_abs());
            if reach >= (i64::MAX as u64) / 4 {
                bail!(Error::OutOfRange);
            }
        }

        let member: FxHashSet<&[i64]> = offsets.chunks_exact(n).collect();
        let strides = src.strides();
        let lin_offsets = offsets
            .chunks_exact(n)
            .map(|o| linear_offset(o, strides))
            .collect::<Result<Vec<_>>>()?;

        let mut steps = Vec::with_capacity(n);
        let mut shifted: Vec<i64> = vec![0; n];
        for axis in 0..n {
            let mut delta = vec![0_i64; n];
            delta[axis] = 1;
            for (prev, d) in delta.iter_mut().enumerate().take(axis) {
                *d = -((region.dims[prev] - 1) as i64);
            }
            let delta_lin = linear_offset(&delta, strides)?;

            let mut enters = Vec::new();
            let mut leaves = Vec::new();
            for (i, o) in offsets.chunks_exact(n).enumerate() {
                for k in 0..n {
                    shifted[k] = o[k] + delta[k];
                }
                if !member.contains(shifted.as_slice()) {
                    enters.push(i as u32);
                }
                for k in 0..n {
                    shifted[k] = o[k] - delta[k];
                }
                if !member.contains(shifted.as_slice()) {
                    leaves.push(i as u32);
                }
            }
            steps.push(Step {
                delta,
                delta_lin,
                enters,
                leaves,
            });
        }

        Ok(Self {
            src,
            region,
            continuation,
            n,
            offsets,
            lin_offsets,
            steps,
            off_lo,
            off_hi,
        })
    }

    fn in_safe_zone(&self, base: &[i64]) -> bool {
        let dims = self.src.dims();
        for k in 0..self.n {
            if base[k] + self.off_lo[k] < 0 || base[k] + self.off_hi[k] >= dims[k] as i64 {
                return false;
            }
        }
        true
    }

    #[inline]
    fn cell(&self, base: &[i64], base_lin: i64, safe: bool, i: usize) -> Cell {
        if safe {
            Cell::At((base_lin + self.lin_offsets[i]) as usize)
        } else {
            let o = &self.offsets[i * self.n..(i + 1) * self.n];
            let mut coords: SmallVec<[i64; 4]> = SmallVec::with_capacity(self.n);
            for k in 0..self.n {
                coords.push(base[k] + o[k]);
            }
            self.continuation.resolve(self.src, &coords)
        }
    }

    /// Run the scan, feeding `sink` and polling `ctx` at least once per
    /// output row.
    pub(crate) fn run(&self, sink: &mut dyn ScanSink, ctx: &dyn Context) -> Result<()> {
        let dims = &self.region.dims;
        let total = self.region.len();
        let strides = self.src.strides();

        let mut base: Vec<i64> = self.region.origin.iter().map(|&c| c as i64).collect();
        let mut base_lin = linear_offset(&base, strides)?;
        let mut safe = self.in_safe_zone(&base);

        for i in 0..self.lin_offsets.len() {
            sink.add(self.cell(&base, base_lin, safe, i));
        }
        sink.emit(0, base_lin as usize)?;

        let mut counters = vec![0_usize; self.n];
        for ord in 1..total {
            let mut axis = 0;
            loop {
                if counters[axis] + 1 < dims[axis] {
                    counters[axis] += 1;
                    break;
                }
                counters[axis] = 0;
                axis += 1;
            }
            let step = &self.steps[axis];
            for &i in &step.leaves {
                sink.remove(self.cell(&base, base_lin, safe, i as usize));
            }
            for (k, d) in step.delta.iter().enumerate() {
                base[k] += d;
            }
            base_lin += step.delta_lin;
            safe = self.in_safe_zone(&base);
            for &i in &step.enters {
                sink.add(self.cell(&base, base_lin, safe, i as usize));
            }
            if axis > 0 {
                if ctx.is_cancelled() {
                    bail!(Error::Interrupted);
                }
                ctx.report(ord as f64 / total as f64);
            }
            sink.emit(ord, base_lin as usize)?;
        }
        Ok(())
    }
}

//! Tiled execution: splits an output into rectangular tiles, materializes
//! each tile's read window through the boundary continuation and runs the
//! wrapped engine on the window.
//!
//! Tiling is observable only through destination values: a tiled and a
//! non-tiled run with the same continuation produce identical results,
//! because every window cell is resolved against the full source matrix
//! before the tile is scanned.

use log::trace;

use crate::characteristic::{Arg, Characteristic};
use crate::context::Context;
use crate::continuation::{Cell, Continuation};
use crate::element::ElementType;
use crate::engine::{RankEngine, check_region, validate};
use crate::error::{Error, Result, bail};
use crate::matrix::Matrix;
use crate::pattern::Pattern;
use crate::precision::Precision;
use crate::scan::OutputRegion;

/// Tile layout configuration.
#[derive(Debug, Clone)]
pub struct TilerConfig {
    /// Tile extent per axis; the last entry repeats for higher axes.
    pub tile_dims: Vec<usize>,
    /// Process tiles on the rayon pool (needs the `parallel` feature;
    /// ignored without it).
    pub parallel: bool,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            tile_dims: vec![256],
            parallel: false,
        }
    }
}

impl TilerConfig {
    /// Uniform tiles of `extent` along every axis.
    pub fn with_extent(extent: usize) -> Self {
        Self {
            tile_dims: vec![extent.max(1)],
            parallel: false,
        }
    }

    fn extent(&self, axis: usize) -> usize {
        self.tile_dims
            .get(axis)
            .or(self.tile_dims.last())
            .copied()
            .unwrap_or(256)
            .max(1)
    }
}

/// One output tile: its offset and extent within the outer region.
#[derive(Debug, Clone)]
struct Tile {
    off: Vec<usize>,
    dims: Vec<usize>,
}

impl Tile {
    fn len(&self) -> usize {
        self.dims.iter().product()
    }
}

/// An engine that runs another [`RankEngine`] tile by tile.
#[derive(Debug, Clone)]
pub struct TilingEngine<E> {
    engine: E,
    config: TilerConfig,
}

impl<E> TilingEngine<E> {
    /// Wrap `engine` with the given tile layout.
    pub fn new(engine: E, config: TilerConfig) -> Self {
        Self { engine, config }
    }

    /// The wrapped engine.
    pub fn inner(&self) -> &E {
        &self.engine
    }
}

/// The per-axis read reach of a pattern, extended to include the output
/// position itself: offsets in `[lo, hi]` cover every source cell an output
/// can depend on.
fn read_reach(pattern: &Pattern) -> (Vec<i64>, Vec<i64>) {
    let (min, max) = pattern.bounding_box();
    // Saturation keeps absurd coordinates finite; the later checked window
    // arithmetic turns them into `OutOfRange`.
    let lo: Vec<i64> = max.iter().map(|&m| m.saturating_neg().min(0)).collect();
    let hi: Vec<i64> = min.iter().map(|&m| m.saturating_neg().max(0)).collect();
    (lo, hi)
}

fn split_ordinal(mut ord: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = Vec::with_capacity(dims.len());
    for &d in dims {
        coords.push(ord % d);
        ord /= d;
    }
    coords
}

fn join_coords(coords: &[usize], dims: &[usize]) -> usize {
    let mut ord = 0_usize;
    let mut stride = 1_usize;
    for (k, &c) in coords.iter().enumerate() {
        ord += c * stride;
        stride *= dims[k];
    }
    ord
}

impl<E: RankEngine + Sync> TilingEngine<E> {
    fn tiles(&self, outer: &OutputRegion) -> Vec<Tile> {
        let dims = outer.dims();
        let n = dims.len();
        let counts: Vec<usize> = (0..n).map(|k| dims[k].div_ceil(self.config.extent(k))).collect();
        let total: usize = counts.iter().product();
        let mut tiles = Vec::with_capacity(total);
        for t in 0..total {
            let grid = split_ordinal(t, &counts);
            let mut off = Vec::with_capacity(n);
            let mut tdims = Vec::with_capacity(n);
            for k in 0..n {
                let o = grid[k] * self.config.extent(k);
                off.push(o);
                tdims.push(self.config.extent(k).min(dims[k] - o));
            }
            tiles.push(Tile { off, dims: tdims });
        }
        tiles
    }

    /// Materialize the source window of one tile, resolving out-of-matrix
    /// cells through the continuation against the full source.
    fn build_window(
        &self,
        src: &Matrix,
        outer: &OutputRegion,
        tile: &Tile,
        reach: &(Vec<i64>, Vec<i64>),
    ) -> Result<(Matrix, OutputRegion)> {
        let n = src.dim_count();
        let (lo, hi) = reach;
        let mut start = Vec::with_capacity(n);
        let mut wdims = Vec::with_capacity(n);
        let mut worigin = Vec::with_capacity(n);
        for k in 0..n {
            let tile_origin = (outer.origin()[k] + tile.off[k]) as i64;
            let s = tile_origin.checked_add(lo[k]).ok_or(Error::OutOfRange)?;
            let reach_span = hi[k].checked_sub(lo[k]).ok_or(Error::OutOfRange)?;
            let span = usize::try_from(reach_span)
                .ok()
                .and_then(|r| tile.dims[k].checked_add(r))
                .ok_or(Error::OutOfRange)?;
            // The far edge must stay addressable as well.
            let span_i = i64::try_from(span).map_err(|_| Error::OutOfRange)?;
            s.checked_add(span_i).ok_or(Error::OutOfRange)?;
            start.push(s);
            wdims.push(span);
            worigin.push((-lo[k]) as usize);
        }

        let constant = self.engine.continuation().constant().unwrap_or(0.0);
        let mut window = Matrix::new(src.elem_type(), &wdims)?;
        let mut coords = start.clone();
        for i in 0..window.len() {
            match self.engine.continuation().resolve(src, &coords) {
                Cell::At(j) => window.copy_element(i, src, j),
                Cell::Outside => window.set_double(i, constant),
            }
            for k in 0..n {
                coords[k] += 1;
                if coords[k] < start[k] + wdims[k] as i64 {
                    break;
                }
                coords[k] = start[k];
            }
        }
        Ok((window, OutputRegion::new(&worigin, &tile.dims)))
    }

    /// Copy the tile rectangle of a per-point argument matrix; argument
    /// dependence is the point itself, so no halo is needed.
    fn window_arg(
        &self,
        src: &Matrix,
        outer: &OutputRegion,
        tile: &Tile,
        arg: &Arg<'_>,
    ) -> Result<Option<Matrix>> {
        let Some(m) = arg.matrix() else {
            return Ok(None);
        };
        let n = src.dim_count();
        let mut window = Matrix::new(ElementType::F64, &tile.dims)?;
        let origin: Vec<i64> = (0..n)
            .map(|k| (outer.origin()[k] + tile.off[k]) as i64)
            .collect();
        let mut coords = origin.clone();
        for i in 0..window.len() {
            let j = m.index(&coords).ok_or(Error::OutOfRange)?;
            window.set_double(i, m.get_double(j));
            for k in 0..n {
                coords[k] += 1;
                if coords[k] < origin[k] + tile.dims[k] as i64 {
                    break;
                }
                coords[k] = origin[k];
            }
        }
        Ok(Some(window))
    }

    fn run_tile(
        &self,
        src: &Matrix,
        outer: &OutputRegion,
        tile: &Tile,
        reach: &(Vec<i64>, Vec<i64>),
        ch: &Characteristic<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Vec<f64>> {
        trace!("tile at {:?}, extent {:?}", tile.off, tile.dims);
        let (window, wregion) = self.build_window(src, outer, tile, reach)?;
        let [a0, a1] = ch.args();
        let w0 = match a0 {
            Some(a) => self.window_arg(src, outer, tile, a)?,
            None => None,
        };
        let w1 = match a1 {
            Some(a) => self.window_arg(src, outer, tile, a)?,
            None => None,
        };
        let wch = rebind(ch, w0.as_ref(), w1.as_ref());

        let mut buf = vec![0.0; tile.len()];
        self.engine
            .compute_region(&window, &wregion, &wch, pattern, ctx, &mut |ord, y| {
                buf[ord] = y;
            })?;
        Ok(buf)
    }
}

fn rebind_arg<'w>(orig: &Arg<'w>, window: Option<&'w Matrix>) -> Arg<'w> {
    match window {
        Some(m) => Arg::Matrix(m),
        None => *orig,
    }
}

/// The tile-local variant of a characteristic: matrix arguments are swapped
/// for their tile windows, everything else is carried over.
fn rebind<'w>(
    ch: &Characteristic<'w>,
    w0: Option<&'w Matrix>,
    w1: Option<&'w Matrix>,
) -> Characteristic<'w> {
    match ch {
        Characteristic::Percentile { index } => Characteristic::Percentile {
            index: rebind_arg(index, w0),
        },
        Characteristic::Rank { value } => Characteristic::Rank {
            value: rebind_arg(value, w0),
        },
        Characteristic::MeanBetweenPercentiles { from, to, filler } => {
            Characteristic::MeanBetweenPercentiles {
                from: rebind_arg(from, w0),
                to: rebind_arg(to, w1),
                filler: *filler,
            }
        }
        Characteristic::MeanBetweenValues { min, max, filler } => {
            Characteristic::MeanBetweenValues {
                min: rebind_arg(min, w0),
                max: rebind_arg(max, w1),
                filler: *filler,
            }
        }
        Characteristic::PercentilePair { from, to, f } => Characteristic::PercentilePair {
            from: rebind_arg(from, w0),
            to: rebind_arg(to, w1),
            f: *f,
        },
        Characteristic::Mean => Characteristic::Mean,
        Characteristic::SumFunction { f } => Characteristic::SumFunction { f: *f },
    }
}

impl<E: RankEngine + Sync> RankEngine for TilingEngine<E> {
    fn precision(&self) -> &Precision {
        self.engine.precision()
    }

    fn continuation(&self) -> Continuation {
        self.engine.continuation()
    }

    fn compute_region(
        &self,
        src: &Matrix,
        region: &OutputRegion,
        ch: &Characteristic<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
        out: &mut dyn FnMut(usize, f64),
    ) -> Result<()> {
        validate(src, ch, pattern)?;
        check_region(src, region)?;
        let reach = read_reach(pattern);
        let tiles = self.tiles(region);
        let total = tiles.len();

        #[cfg(feature = "parallel")]
        if self.config.parallel {
            use rayon::prelude::*;

            let buffers = tiles
                .par_iter()
                .map(|tile| self.run_tile(src, region, tile, &reach, ch, pattern, ctx))
                .collect::<Result<Vec<_>>>()?;
            for (tile, buf) in tiles.iter().zip(buffers) {
                emit_tile(region, tile, &buf, out);
            }
            ctx.report(1.0);
            return Ok(());
        }

        for (done, tile) in tiles.iter().enumerate() {
            if ctx.is_cancelled() {
                bail!(Error::Interrupted);
            }
            let buf = self.run_tile(src, region, tile, &reach, ch, pattern, ctx)?;
            emit_tile(region, tile, &buf, out);
            ctx.report((done + 1) as f64 / total as f64);
        }
        Ok(())
    }
}

fn emit_tile(outer: &OutputRegion, tile: &Tile, buf: &[f64], out: &mut dyn FnMut(usize, f64)) {
    let n = outer.dims().len();
    let mut local = vec![0_usize; n];
    let mut coords = tile.off.clone();
    for &y in buf {
        out(join_coords(&coords, outer.dims()), y);
        for k in 0..n {
            local[k] += 1;
            coords[k] += 1;
            if local[k] < tile.dims[k] {
                break;
            }
            local[k] = 0;
            coords[k] = tile.off[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoContext;
    use crate::engine::BasicRankEngine;

    fn checkerboard(dims: &[usize]) -> Matrix {
        let len: usize = dims.iter().product();
        Matrix::from_u8(dims, (0..len).map(|i| (i * 83 % 256) as u8).collect()).unwrap()
    }

    fn assert_same(a: &Matrix, b: &Matrix) {
        assert!(a.same_shape(b));
        for i in 0..a.len() {
            assert_eq!(a.get_double(i), b.get_double(i), "at {i}");
        }
    }

    #[test]
    fn tiling_is_invisible() {
        let src = checkerboard(&[13, 11]);
        let pattern = Pattern::rectangular(&[-2, -2], &[2, 2]).unwrap();
        for continuation in [
            Continuation::PseudoCyclic,
            Continuation::Cyclic,
            Continuation::Mirror,
            Continuation::Nearest,
            Continuation::Constant(77.3),
        ] {
            let plain = BasicRankEngine::new(Precision::bits8(), continuation);
            let tiled = TilingEngine::new(plain.clone(), TilerConfig::with_extent(4));
            let a = plain
                .percentile(&src, Arg::Value(12.0), &pattern, &NoContext)
                .unwrap();
            let b = tiled
                .percentile(&src, Arg::Value(12.0), &pattern, &NoContext)
                .unwrap();
            assert_same(&a, &b);
        }
    }

    #[test]
    fn tiling_is_invisible_for_one_sided_patterns() {
        // Patterns that reach only forward or only backward still need the
        // output box inside the window.
        let src = checkerboard(&[10]);
        for points in [vec![vec![1_i64], vec![2], vec![3]], vec![vec![-2_i64], vec![-1]]] {
            let pattern = Pattern::new(1, points).unwrap();
            let plain = BasicRankEngine::new(Precision::bits8(), Continuation::Mirror);
            let tiled = TilingEngine::new(plain.clone(), TilerConfig::with_extent(3));
            let a = plain.mean(&src, &pattern, &NoContext).unwrap();
            let b = tiled.mean(&src, &pattern, &NoContext).unwrap();
            assert_same(&a, &b);
        }
    }

    #[test]
    fn tiled_matrix_arguments_are_windowed() {
        let src = checkerboard(&[9, 6]);
        let ranks =
            Matrix::from_f64(&[9, 6], (0..54).map(|i| (i % 4) as f64).collect()).unwrap();
        let pattern = Pattern::rectangular(&[-1, -1], &[1, 1]).unwrap();
        let plain = BasicRankEngine::new(Precision::bits8(), Continuation::Cyclic);
        let tiled = TilingEngine::new(plain.clone(), TilerConfig::with_extent(4));
        let a = plain
            .percentile(&src, Arg::Matrix(&ranks), &pattern, &NoContext)
            .unwrap();
        let b = tiled
            .percentile(&src, Arg::Matrix(&ranks), &pattern, &NoContext)
            .unwrap();
        assert_same(&a, &b);
    }

    #[test]
    fn halo_overflow_is_rejected_before_allocation() {
        let src = checkerboard(&[8]);
        let pattern = Pattern::new(1, [[i64::MIN + 2]]).unwrap();
        let plain = BasicRankEngine::new(Precision::bits8(), Continuation::Nearest);
        let tiled = TilingEngine::new(plain, TilerConfig::with_extent(4));
        let got = tiled.percentile(&src, Arg::Value(0.0), &pattern, &NoContext);
        assert_eq!(got.unwrap_err(), Error::OutOfRange);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_tiles_match_sequential() {
        let src = checkerboard(&[17, 9]);
        let pattern = Pattern::rectangular(&[-1, -2], &[2, 1]).unwrap();
        let plain = BasicRankEngine::new(Precision::bits8(), Continuation::PseudoCyclic);
        let mut config = TilerConfig::with_extent(5);
        config.parallel = true;
        let tiled = TilingEngine::new(plain.clone(), config);
        let a = plain
            .percentile(&src, Arg::Value(6.0), &pattern, &NoContext)
            .unwrap();
        let b = tiled
            .percentile(&src, Arg::Value(6.0), &pattern, &NoContext)
            .unwrap();
        assert_same(&a, &b);
    }
}

//! The rank engine: validation, destination allocation and the per-point
//! sinks that turn histogram state into characteristic outputs.

use log::debug;

use crate::characteristic::{Arg, Characteristic, mean_between_percentiles, mean_between_values};
use crate::context::Context;
use crate::continuation::{Cell, Continuation};
use crate::element::{ElementType, Quantizer, cast_fixed, sigma};
use crate::error::{Error, Result, bail};
use crate::histogram::Histogram;
use crate::matrix::Matrix;
use crate::pattern::Pattern;
use crate::precision::Precision;
use crate::scan::{OutputRegion, ScanSink, Scanner};

/// Check everything that must hold before any buffer is allocated or
/// touched: pattern dimensionality, argument shapes, scalar arguments.
pub(crate) fn validate(src: &Matrix, ch: &Characteristic<'_>, pattern: &Pattern) -> Result<()> {
    if pattern.dim_count() != src.dim_count() {
        bail!(Error::DimensionMismatch {
            matrix: src.dim_count(),
            pattern: pattern.dim_count(),
        });
    }
    for arg in ch.args().into_iter().flatten() {
        match arg {
            Arg::Value(v) => {
                if v.is_nan() {
                    bail!(Error::InvalidNumericArgument("scalar argument"));
                }
            }
            Arg::Matrix(m) => {
                if !m.same_shape(src) {
                    bail!(Error::ShapeMismatch);
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn check_region(src: &Matrix, region: &OutputRegion) -> Result<()> {
    if region.dims().len() != src.dim_count() {
        bail!(Error::ShapeMismatch);
    }
    for (k, (&o, &d)) in region.origin().iter().zip(region.dims()).enumerate() {
        if d == 0 || o.checked_add(d).is_none_or(|end| end > src.dims()[k]) {
            bail!(Error::OutOfRange);
        }
    }
    Ok(())
}

/// The continuation constant as it would read from a virtual cell of the
/// source's element type (fixed-point constants are cast like any stored
/// result).
fn constant_cell(elem: ElementType, continuation: Continuation) -> f64 {
    let c = continuation.constant().unwrap_or(0.0);
    match elem {
        ElementType::F64 => c,
        ElementType::F32 => f64::from(c as f32),
        _ => cast_fixed(elem, c) as f64,
    }
}

/// Histogram-backed sink covering the five rank characteristics.
struct HistSink<'a, 'o> {
    src: &'a Matrix,
    hist: Histogram,
    quant: Quantizer,
    const_bin: u32,
    sigma: f64,
    interpolated: bool,
    ch: &'a Characteristic<'a>,
    out: &'o mut dyn FnMut(usize, f64),
}

impl ScanSink for HistSink<'_, '_> {
    fn add(&mut self, cell: Cell) {
        let bin = match cell {
            Cell::At(i) => self.src.quantized(i, self.quant),
            Cell::Outside => self.const_bin,
        };
        self.hist.add(bin);
    }

    fn remove(&mut self, cell: Cell) {
        let bin = match cell {
            Cell::At(i) => self.src.quantized(i, self.quant),
            Cell::Outside => self.const_bin,
        };
        self.hist.remove(bin);
    }

    fn emit(&mut self, ord: usize, pos: usize) -> Result<()> {
        let h = &self.hist;
        let y = match self.ch {
            Characteristic::Percentile { index } => {
                let r = index.at(ord, "rank index")?;
                h.value_at(r, self.interpolated) / self.sigma
            }
            Characteristic::Rank { value } => {
                let v = value.at(ord, "rank value")?;
                h.rank_of(v * self.sigma, self.interpolated)
            }
            Characteristic::MeanBetweenPercentiles { from, to, filler } => {
                let r1 = from.at(ord, "lower rank index")?;
                let r2 = to.at(ord, "upper rank index")?;
                mean_between_percentiles(h, self.interpolated, self.sigma, r1, r2, *filler)
            }
            Characteristic::MeanBetweenValues { min, max, filler } => {
                let v1 = min.at(ord, "lower value bound")?;
                let v2 = max.at(ord, "upper value bound")?;
                mean_between_values(h, self.interpolated, self.sigma, v1, v2, *filler)
            }
            Characteristic::PercentilePair { from, to, f } => {
                let r1 = from.at(ord, "first rank index")?;
                let r2 = to.at(ord, "second rank index")?;
                let v1 = h.value_at(r1, self.interpolated) / self.sigma;
                let v2 = h.value_at(r2, self.interpolated) / self.sigma;
                f(self.src.get_double(pos), v1, v2)
            }
            Characteristic::Mean | Characteristic::SumFunction { .. } => {
                unreachable!("sum characteristics run on the sum sink")
            }
        };
        (self.out)(ord, y);
        Ok(())
    }
}

/// Running aperture sum; exact integer accumulation where the element type
/// allows it.
#[derive(Clone, Copy)]
enum SumAcc {
    Int(u64),
    Float(f64),
}

/// Sum-backed sink covering the aperture-sum characteristics.
struct SumSink<'a, 'o> {
    src: &'a Matrix,
    acc: SumAcc,
    const_raw: u64,
    const_real: f64,
    points: f64,
    delta: f64,
    ch: &'a Characteristic<'a>,
    out: &'o mut dyn FnMut(usize, f64),
}

impl ScanSink for SumSink<'_, '_> {
    fn add(&mut self, cell: Cell) {
        match &mut self.acc {
            SumAcc::Int(a) => {
                *a += match cell {
                    Cell::At(i) => self.src.get_raw(i),
                    Cell::Outside => self.const_raw,
                };
            }
            SumAcc::Float(a) => {
                *a += match cell {
                    Cell::At(i) => self.src.get_double(i),
                    Cell::Outside => self.const_real,
                };
            }
        }
    }

    fn remove(&mut self, cell: Cell) {
        match &mut self.acc {
            SumAcc::Int(a) => {
                *a -= match cell {
                    Cell::At(i) => self.src.get_raw(i),
                    Cell::Outside => self.const_raw,
                };
            }
            SumAcc::Float(a) => {
                *a -= match cell {
                    Cell::At(i) => self.src.get_double(i),
                    Cell::Outside => self.const_real,
                };
            }
        }
    }

    fn emit(&mut self, ord: usize, _pos: usize) -> Result<()> {
        let s = match self.acc {
            SumAcc::Int(a) => a as f64,
            SumAcc::Float(a) => a,
        };
        let y = match self.ch {
            Characteristic::Mean => s / self.points + self.delta,
            Characteristic::SumFunction { f } => f(s),
            _ => unreachable!("histogram characteristics run on the histogram sink"),
        };
        (self.out)(ord, y);
        Ok(())
    }
}

/// Computes rank characteristics over apertures of a structuring element.
///
/// The five characteristic methods and the dilation/erosion adapters are
/// provided on top of one streaming core, [`RankEngine::compute_region`];
/// [`RankEngine::compute`] materializes a destination of the source's
/// element type.
pub trait RankEngine {
    /// The histogram precision this engine scans with.
    fn precision(&self) -> &Precision;

    /// The boundary continuation applied to out-of-matrix reads.
    fn continuation(&self) -> Continuation;

    /// Stream characteristic values for every position of `region`, in scan
    /// order, into `out` (called with the output ordinal and the value).
    fn compute_region(
        &self,
        src: &Matrix,
        region: &OutputRegion,
        ch: &Characteristic<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
        out: &mut dyn FnMut(usize, f64),
    ) -> Result<()>;

    /// Compute a characteristic into a newly allocated matrix of the
    /// source's element type.
    ///
    /// All validation happens before the destination is allocated.
    fn compute(
        &self,
        src: &Matrix,
        ch: &Characteristic<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        validate(src, ch, pattern)?;
        let mut dest = Matrix::new(src.elem_type(), src.dims())?;
        let region = OutputRegion::full(src.dims());
        self.compute_region(src, &region, ch, pattern, ctx, &mut |i, y| {
            dest.set_double(i, y);
        })?;
        Ok(dest)
    }

    /// The value of rank `index` inside every aperture, `v(r)/σ`.
    fn percentile(
        &self,
        src: &Matrix,
        index: Arg<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(src, &Characteristic::Percentile { index }, pattern, ctx)
    }

    /// The rank of `value` inside every aperture, `r(v·σ)`.
    fn rank(
        &self,
        src: &Matrix,
        value: Arg<'_>,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(src, &Characteristic::Rank { value }, pattern, ctx)
    }

    /// The mean aperture value between the rank indices `from` and `to`.
    fn mean_between_percentiles(
        &self,
        src: &Matrix,
        from: Arg<'_>,
        to: Arg<'_>,
        filler: f64,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(
            src,
            &Characteristic::MeanBetweenPercentiles { from, to, filler },
            pattern,
            ctx,
        )
    }

    /// The mean aperture value between the value bounds `min` and `max`.
    fn mean_between_values(
        &self,
        src: &Matrix,
        min: Arg<'_>,
        max: Arg<'_>,
        filler: f64,
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(
            src,
            &Characteristic::MeanBetweenValues { min, max, filler },
            pattern,
            ctx,
        )
    }

    /// `f(v, v(from)/σ, v(to)/σ)` for every position, with `v` the source
    /// value there.
    fn function_of_percentile_pair(
        &self,
        src: &Matrix,
        from: Arg<'_>,
        to: Arg<'_>,
        f: &(dyn Fn(f64, f64, f64) -> f64 + Sync),
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(
            src,
            &Characteristic::PercentilePair { from, to, f },
            pattern,
            ctx,
        )
    }

    /// The aperture mean. Fixed-point sources get `+0.5`, which rounds to
    /// nearest once the result is cast back into a fixed-point destination.
    fn mean(&self, src: &Matrix, pattern: &Pattern, ctx: &dyn Context) -> Result<Matrix> {
        self.compute(src, &Characteristic::Mean, pattern, ctx)
    }

    /// `f` applied to the raw aperture sum.
    fn function_of_sum(
        &self,
        src: &Matrix,
        f: &(dyn Fn(f64) -> f64 + Sync),
        pattern: &Pattern,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        self.compute(src, &Characteristic::SumFunction { f }, pattern, ctx)
    }

    /// Dilation at `level` in `[0, 1]`: the percentile of rank
    /// `level·(N−1)`. Level 1 is the classical dilation (aperture maximum).
    ///
    /// For fixed-point sources in the simple model the rank index is rounded
    /// half-up instead of floored, which keeps dilation and erosion
    /// symmetric around level 0.5.
    fn dilation(
        &self,
        src: &Matrix,
        pattern: &Pattern,
        level: f64,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        let index = self.dilation_index(src, pattern, level)?;
        self.percentile(src, Arg::Value(index), pattern, ctx)
    }

    /// Erosion at `level` in `[0, 1]`: the percentile of rank `level·(N−1)`
    /// over the symmetric pattern. Level 0 is the classical erosion
    /// (aperture minimum).
    fn erosion(
        &self,
        src: &Matrix,
        pattern: &Pattern,
        level: f64,
        ctx: &dyn Context,
    ) -> Result<Matrix> {
        let index = self.dilation_index(src, pattern, level)?;
        self.percentile(src, Arg::Value(index), &pattern.symmetric(), ctx)
    }

    /// The rank index used by [`RankEngine::dilation`] and
    /// [`RankEngine::erosion`].
    #[doc(hidden)]
    fn dilation_index(&self, src: &Matrix, pattern: &Pattern, level: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&level) {
            bail!(Error::BadLevel(level));
        }
        let mut index = level * (pattern.point_count() as f64 - 1.0);
        if !src.elem_type().is_float() && !self.precision().is_interpolated() {
            index = (index + 0.5).floor();
        }
        Ok(index)
    }
}

/// The streaming rank engine: one histogram per scan, no tiling.
#[derive(Debug, Clone)]
pub struct BasicRankEngine {
    precision: Precision,
    continuation: Continuation,
}

impl BasicRankEngine {
    /// Create an engine with the given precision and boundary continuation.
    pub fn new(precision: Precision, continuation: Continuation) -> Self {
        Self {
            precision,
            continuation,
        }
    }
}

impl RankEngine for BasicRankEngine {
    fn precision(&self) -> &Precision {
        &self.precision
    }

    fn continuation(&self) -> Continuation {
        self.continuation
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

        let elem = src.elem_type();
        let scanner = Scanner::new(src, region.clone(), pattern, self.continuation)?;

        if ch.uses_sum() {
            let exact = !elem.is_float() && elem.bit_width() <= 32;
            let mut sink = SumSink {
                src,
                acc: if exact {
                    SumAcc::Int(0)
                } else {
                    SumAcc::Float(0.0)
                },
                const_raw: if elem.is_float() {
                    0
                } else {
                    cast_fixed(elem, self.continuation.constant().unwrap_or(0.0))
                },
                const_real: constant_cell(elem, self.continuation),
                points: pattern.point_count() as f64,
                delta: if elem.is_float() { 0.0 } else { 0.5 },
                ch,
                out,
            };
            return scanner.run(&mut sink, ctx);
        }

        let mu = self.precision.effective_mu(elem);
        let quant = Quantizer::new(elem, mu);
        debug!(
            "rank scan: {} positions, {} pattern points, {} bins",
            region.len(),
            pattern.point_count(),
            1_u64 << mu,
        );
        let mut sink = HistSink {
            src,
            hist: Histogram::new(mu, &self.precision.coarse_levels(mu)),
            quant,
            const_bin: quant.real(constant_cell(elem, self.continuation)),
            sigma: sigma(elem, mu),
            interpolated: self.precision.is_interpolated(),
            ch,
            out,
        };
        scanner.run(&mut sink, ctx)
    }
}

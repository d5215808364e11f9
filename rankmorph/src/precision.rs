//! Precision descriptors: how many histogram bins a scan uses and whether
//! queries interpolate inside bins.

use crate::element::ElementType;
use crate::error::{Error, Result, bail};

/// Histogram precision: an increasing list of bit levels plus the
/// interpolation model.
///
/// The last level fixes the histogram length `M = 2^μ` (capped at the bit
/// width of fixed-point sources); the earlier levels become the coarse
/// levels of the multi-level count tree that accelerates rank queries. The
/// `interpolated` flag selects the precise (piecewise-linear) model instead
/// of the simple one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precision {
    bit_levels: Vec<u32>,
    interpolated: bool,
}

impl Precision {
    /// Create a descriptor from explicit bit levels.
    ///
    /// Levels must be strictly increasing, each within `1..=30`, at most 31
    /// entries.
    pub fn new(bit_levels: &[u32], interpolated: bool) -> Result<Self> {
        if bit_levels.is_empty() {
            bail!(Error::BadPrecision("empty bit levels"));
        }
        if bit_levels.len() > 31 {
            bail!(Error::BadPrecision("more than 31 bit levels"));
        }
        for (i, &level) in bit_levels.iter().enumerate() {
            if !(1..=30).contains(&level) {
                bail!(Error::BadPrecision("bit level outside 1..=30"));
            }
            if i > 0 && bit_levels[i - 1] >= level {
                bail!(Error::BadPrecision("bit levels must strictly increase"));
            }
        }
        Ok(Self {
            bit_levels: bit_levels.to_vec(),
            interpolated,
        })
    }

    /// 256-bin histograms, single level.
    pub fn bits8() -> Self {
        Self {
            bit_levels: vec![8],
            interpolated: false,
        }
    }

    /// 65536-bin histograms with one coarse level of 256 blocks.
    pub fn bits16() -> Self {
        Self {
            bit_levels: vec![8, 16],
            interpolated: false,
        }
    }

    /// 2²²-bin histograms with two coarse levels.
    pub fn bits22() -> Self {
        Self {
            bit_levels: vec![8, 16, 22],
            interpolated: false,
        }
    }

    /// Switch between the simple and the precise interpolation model.
    pub fn interpolated(mut self, interpolated: bool) -> Self {
        self.interpolated = interpolated;
        self
    }

    /// The configured bit levels.
    pub fn bit_levels(&self) -> &[u32] {
        &self.bit_levels
    }

    /// Whether the precise (piecewise-linear) model is selected.
    pub fn is_interpolated(&self) -> bool {
        self.interpolated
    }

    /// The effective histogram depth μ for a source element type: the last
    /// bit level, capped at the bit width of fixed-point sources.
    pub(crate) fn effective_mu(&self, elem: ElementType) -> u32 {
        let last = *self.bit_levels.last().unwrap_or(&8);
        if elem.is_float() {
            last
        } else {
            last.min(elem.bit_width())
        }
    }

    /// The coarse tree levels: configured levels strictly below μ.
    pub(crate) fn coarse_levels(&self, mu: u32) -> Vec<u32> {
        self.bit_levels
            .iter()
            .copied()
            .filter(|&l| l < mu)
            .collect()
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::bits16()
    }
}

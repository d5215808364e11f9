//! Structuring elements: finite sets of integer displacement vectors.

use crate::error::{Error, Result, bail};

/// The largest number of points a pattern may enumerate.
const MAX_POINTS: usize = i32::MAX as usize;

/// A structuring element: a finite, non-empty set of n-dimensional integer
/// displacement vectors.
///
/// The aperture of a pattern at output position `x` is the multiset of
/// source values read at `x − p` for every point `p`; the symmetric pattern
/// swaps the roles of dilation and erosion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    dim: usize,
    // Flattened points, `dim` coordinates each, sorted and deduplicated.
    points: Vec<i64>,
}

impl Pattern {
    /// Create a pattern from explicit points.
    ///
    /// Points are deduplicated. Fails with [`Error::EmptyPattern`] when no
    /// point remains, [`Error::DimensionMismatch`] when a point has the
    /// wrong number of coordinates and [`Error::TooManyPoints`] past the
    /// enumeration limit.
    pub fn new<I, P>(dim: usize, points: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[i64]>,
    {
        if dim == 0 {
            bail!(Error::DimensionMismatch {
                matrix: 0,
                pattern: 0,
            });
        }
        let mut collected: Vec<Vec<i64>> = Vec::new();
        for p in points {
            let p = p.as_ref();
            if p.len() != dim {
                bail!(Error::DimensionMismatch {
                    matrix: dim,
                    pattern: p.len(),
                });
            }
            collected.push(p.to_vec());
            if collected.len() > MAX_POINTS {
                bail!(Error::TooManyPoints);
            }
        }
        collected.sort_unstable();
        collected.dedup();
        if collected.is_empty() {
            bail!(Error::EmptyPattern);
        }
        Ok(Self {
            dim,
            points: collected.into_iter().flatten().collect(),
        })
    }

    /// Create the rectangular pattern containing every integer point of the
    /// box `min..=max`.
    pub fn rectangular(min: &[i64], max: &[i64]) -> Result<Self> {
        if min.is_empty() || min.len() != max.len() {
            bail!(Error::DimensionMismatch {
                matrix: min.len(),
                pattern: max.len(),
            });
        }
        let dim = min.len();
        let mut count = 1_usize;
        for k in 0..dim {
            if min[k] > max[k] {
                bail!(Error::EmptyPattern);
            }
            let side = max[k]
                .checked_sub(min[k])
                .and_then(|d| d.checked_add(1))
                .ok_or(Error::TooManyPoints)?;
            count = usize::try_from(side)
                .ok()
                .and_then(|s| count.checked_mul(s))
                .ok_or(Error::TooManyPoints)?;
            if count > MAX_POINTS {
                bail!(Error::TooManyPoints);
            }
        }

        let mut points = Vec::with_capacity(count * dim);
        let mut current = min.to_vec();
        loop {
            points.extend_from_slice(&current);
            // Odometer over the box, axis 0 fastest.
            let mut axis = 0;
            loop {
                if axis == dim {
                    return Ok(Self { dim, points });
                }
                if current[axis] < max[axis] {
                    current[axis] += 1;
                    break;
                }
                current[axis] = min[axis];
                axis += 1;
            }
        }
    }

    /// The number of dimensions of every point.
    pub fn dim_count(&self) -> usize {
        self.dim
    }

    /// The number of points, `N`.
    pub fn point_count(&self) -> usize {
        self.points.len() / self.dim
    }

    /// Iterate over the points in an unspecified but stable order.
    pub fn points(&self) -> impl DoubleEndedIterator<Item = &[i64]> {
        self.points.chunks_exact(self.dim)
    }

    /// The symmetric pattern `{−p : p ∈ P}`.
    pub fn symmetric(&self) -> Self {
        // Negation reverses the lexicographic order, so walking the sorted
        // points backwards keeps the flattened list sorted.
        let mut points = Vec::with_capacity(self.points.len());
        for p in self.points().rev() {
            points.extend(p.iter().map(|&c| -c));
        }
        Self {
            dim: self.dim,
            points,
        }
    }

    /// The bounding box `(min, max)` of the point set, per axis.
    pub fn bounding_box(&self) -> (Vec<i64>, Vec<i64>) {
        let mut min = vec![i64::MAX; self.dim];
        let mut max = vec![i64::MIN; self.dim];
        for p in self.points() {
            for k in 0..self.dim {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        (min, max)
    }
}

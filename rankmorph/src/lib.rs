/*!
Rank-based mathematical morphology over n-dimensional matrices.

`rankmorph` computes rank characteristics of a source matrix under an
arbitrary-shape structuring element (a [`Pattern`]): percentiles, ranks,
means between percentiles or value bounds, and user functions of the
aperture sum or of a percentile pair. Classical dilation and erosion are the
max- and min-percentiles.

The engine maintains a histogram of the sliding aperture incrementally, so
the cost per output position depends on how many cells enter and leave the
aperture, not on its size. Large matrices can be processed tile by tile
through [`TilingEngine`], with out-of-matrix reads resolved by a configurable
boundary [`Continuation`].

# Example

```rust
use rankmorph::{
    Arg, BasicRankEngine, Continuation, Matrix, NoContext, Pattern, Precision, RankEngine,
};

let src = Matrix::from_u8(&[5], vec![3, 7, 1, 9, 4]).unwrap();
let window = Pattern::rectangular(&[-1], &[1]).unwrap();
let engine = BasicRankEngine::new(Precision::bits8(), Continuation::PseudoCyclic);

// The median of each three-element aperture.
let median = engine
    .percentile(&src, Arg::Value(1.0), &window, &NoContext)
    .unwrap();
assert_eq!(median.get_double(1), 3.0);

// Classical dilation: the aperture maximum.
let dilated = engine.dilation(&src, &window, 1.0, &NoContext).unwrap();
assert_eq!(dilated.get_double(0), 7.0);
```

## Safety

This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

mod characteristic;
mod context;
mod continuation;
mod element;
mod engine;
mod error;
mod histogram;
mod matrix;
mod pattern;
mod precision;
mod scan;
mod tiling;

pub use characteristic::{
    Arg, Characteristic, FILL_MAX_VALUE, FILL_MIN_VALUE, FILL_NEAREST_VALUE,
};
pub use context::{CancelFlag, Context, NoContext};
pub use continuation::Continuation;
pub use element::ElementType;
pub use engine::{BasicRankEngine, RankEngine};
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use pattern::Pattern;
pub use precision::Precision;
pub use scan::OutputRegion;
pub use tiling::{TilerConfig, TilingEngine};

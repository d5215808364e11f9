//! Property tests against the naive reference: the streaming engine must
//! agree with per-aperture recomputation for arbitrary matrices, patterns
//! and continuations.

mod common;

use proptest::prelude::*;
use rankmorph::{
    Arg, BasicRankEngine, Continuation, Matrix, NoContext, Pattern, Precision, RankEngine,
    TilerConfig, TilingEngine,
};

fn continuations() -> impl Strategy<Value = Continuation> {
    prop_oneof![
        Just(Continuation::PseudoCyclic),
        Just(Continuation::Cyclic),
        Just(Continuation::Mirror),
        Just(Continuation::Nearest),
        Just(Continuation::Constant(31.0)),
    ]
}

fn case_1d() -> impl Strategy<Value = (Matrix, Pattern)> {
    (1_usize..=12).prop_flat_map(|d| {
        (
            proptest::collection::vec(any::<u8>(), d),
            proptest::collection::vec(-3_i64..=3, 1..=5),
        )
            .prop_map(move |(data, pts)| {
                let m = Matrix::from_u8(&[d], data).unwrap();
                let p = Pattern::new(1, pts.iter().map(|&x| [x])).unwrap();
                (m, p)
            })
    })
}

fn case_2d() -> impl Strategy<Value = (Matrix, Pattern)> {
    (1_usize..=7, 1_usize..=6).prop_flat_map(|(w, h)| {
        (
            proptest::collection::vec(any::<u8>(), w * h),
            proptest::collection::vec((-3_i64..=3, -3_i64..=3), 1..=6),
        )
            .prop_map(move |(data, pts)| {
                let m = Matrix::from_u8(&[w, h], data).unwrap();
                let p = Pattern::new(2, pts.iter().map(|&(x, y)| [x, y])).unwrap();
                (m, p)
            })
    })
}

fn cases() -> impl Strategy<Value = (Matrix, Pattern)> {
    prop_oneof![case_1d(), case_2d()]
}

fn engine(continuation: Continuation) -> BasicRankEngine {
    BasicRankEngine::new(Precision::bits8(), continuation)
}

fn values(m: &Matrix) -> Vec<f64> {
    (0..m.len()).map(|i| m.get_double(i)).collect()
}

proptest! {
    /// Dilation is the elementwise aperture maximum; erosion over the
    /// symmetric pattern is the minimum.
    #[test]
    fn dilation_and_erosion_match_extremes(
        (src, pattern) in cases(),
        continuation in continuations(),
    ) {
        let e = engine(continuation);
        let dilated = e.dilation(&src, &pattern, 1.0, &NoContext).unwrap();
        let eroded = e.erosion(&src, &pattern, 0.0, &NoContext).unwrap();
        for (i, x) in common::positions(&src).into_iter().enumerate() {
            let win = common::aperture(&src, &pattern, continuation, &x);
            let max = win.iter().copied().fold(f64::MIN, f64::max);
            prop_assert_eq!(dilated.get_double(i), max);
            let sym = common::aperture(&src, &pattern.symmetric(), continuation, &x);
            let min = sym.iter().copied().fold(f64::MAX, f64::min);
            prop_assert_eq!(eroded.get_double(i), min);
        }
    }

    /// Percentiles agree with sorting each aperture.
    #[test]
    fn percentile_matches_sorted_apertures(
        (src, pattern) in cases(),
        continuation in continuations(),
        frac in 0.0_f64..=1.0,
    ) {
        let e = engine(continuation);
        let r = frac * pattern.point_count() as f64;
        let got = e.percentile(&src, Arg::Value(r), &pattern, &NoContext).unwrap();
        for (i, x) in common::positions(&src).into_iter().enumerate() {
            let win = common::aperture(&src, &pattern, continuation, &x);
            prop_assert_eq!(got.get_double(i), common::naive_percentile(&win, r));
        }
    }

    /// Ranks agree with counting the aperture.
    #[test]
    fn rank_matches_counting(
        (src, pattern) in cases(),
        continuation in continuations(),
        v in 0_u16..=256,
    ) {
        let e = engine(continuation);
        let v = f64::from(v);
        let got = e.rank(&src, Arg::Value(v), &pattern, &NoContext).unwrap();
        for (i, x) in common::positions(&src).into_iter().enumerate() {
            let win = common::aperture(&src, &pattern, continuation, &x);
            prop_assert_eq!(got.get_double(i), common::naive_rank(&win, v));
        }
    }

    /// Rank/percentile round trip: ranking a percentile image and taking
    /// the percentile of those ranks reproduces the image exactly in the
    /// simple model over bytes.
    #[test]
    fn rank_percentile_round_trip(
        (src, pattern) in cases(),
        frac in 0.0_f64..=1.0,
    ) {
        let e = engine(Continuation::PseudoCyclic);
        let r = frac * (pattern.point_count() - 1) as f64;
        let first = e.percentile(&src, Arg::Value(r), &pattern, &NoContext).unwrap();
        let ranks = e.rank(&src, Arg::Matrix(&first), &pattern, &NoContext).unwrap();
        let second = e.percentile(&src, Arg::Matrix(&ranks), &pattern, &NoContext).unwrap();
        prop_assert_eq!(values(&first), values(&second));
    }

    /// Percentiles are monotone in the rank index, in both models.
    #[test]
    fn percentiles_are_monotone(
        (src, pattern) in cases(),
        continuation in continuations(),
        fracs in (0.0_f64..=1.0, 0.0_f64..=1.0),
        interpolated in any::<bool>(),
    ) {
        let e = BasicRankEngine::new(
            Precision::bits8().interpolated(interpolated),
            continuation,
        );
        let n = pattern.point_count() as f64;
        let (lo, hi) = if fracs.0 <= fracs.1 { fracs } else { (fracs.1, fracs.0) };
        let a = e.percentile(&src, Arg::Value(lo * n), &pattern, &NoContext).unwrap();
        let b = e.percentile(&src, Arg::Value(hi * n), &pattern, &NoContext).unwrap();
        for i in 0..src.len() {
            prop_assert!(a.get_double(i) <= b.get_double(i));
        }
    }

    /// Tiling never changes results, for any tile extent and continuation.
    #[test]
    fn tiling_is_equivalent(
        (src, pattern) in cases(),
        continuation in continuations(),
        extent in 1_usize..=5,
        frac in 0.0_f64..=1.0,
    ) {
        let plain = engine(continuation);
        let tiled = TilingEngine::new(plain.clone(), TilerConfig::with_extent(extent));
        let r = frac * pattern.point_count() as f64;
        let a = plain.percentile(&src, Arg::Value(r), &pattern, &NoContext).unwrap();
        let b = tiled.percentile(&src, Arg::Value(r), &pattern, &NoContext).unwrap();
        prop_assert_eq!(values(&a), values(&b));

        let am = plain.mean(&src, &pattern, &NoContext).unwrap();
        let bm = tiled.mean(&src, &pattern, &NoContext).unwrap();
        prop_assert_eq!(values(&am), values(&bm));
    }

    /// The aperture mean agrees with naive summation (+0.5 for bytes,
    /// truncated by the destination cast).
    #[test]
    fn mean_matches_naive_sums(
        (src, pattern) in cases(),
        continuation in continuations(),
    ) {
        let e = engine(continuation);
        let got = e.mean(&src, &pattern, &NoContext).unwrap();
        for (i, x) in common::positions(&src).into_iter().enumerate() {
            let win = common::aperture(&src, &pattern, continuation, &x);
            let mean = win.iter().sum::<f64>() / win.len() as f64 + 0.5;
            prop_assert_eq!(got.get_double(i), (mean as u8) as f64);
        }
    }
}

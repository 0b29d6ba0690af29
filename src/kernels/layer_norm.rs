//! Layer Normalization
//!
//! Normalizes each (b, t) position's channel vector to zero mean and unit
//! variance, then applies a learned per-channel scale and shift:
//!
//! ```text
//! 1. mean = sum(x) / C
//! 2. var  = sum((x - mean)²) / C          (population, no Bessel correction)
//! 3. rstd = 1 / sqrt(var + 1e-5)
//! 4. y    = rstd * (x - mean) * weight + bias
//! ```
//!
//! Both the population variance and the 1e-5 epsilon are load-bearing
//! numerical contracts: the external differentiation tool reconstructs
//! the backward pass from the cached `mean` and `rstd` buffers, so the
//! statistics written here must match what the gradients assume.

use rayon::prelude::*;

/// Epsilon added to the variance before taking the reciprocal square root
pub const LAYERNORM_EPS: f32 = 1e-5;

/// Layer normalization forward pass
///
/// `out` and `inp` are (B, T, C); `mean` and `rstd` are (B, T) buffers
/// that persist the per-position statistics for the backward pass;
/// `weight` and `bias` are the learned (C) scale and shift.
pub fn layernorm_forward(
    out: &mut [f32],
    mean: &mut [f32],
    rstd: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: &[f32],
    batch_size: usize,
    seq_len: usize,
    channels: usize,
) {
    let positions = batch_size * seq_len;
    assert_eq!(inp.len(), positions * channels);
    assert_eq!(out.len(), positions * channels);
    assert_eq!(mean.len(), positions);
    assert_eq!(rstd.len(), positions);
    assert_eq!(weight.len(), channels);
    assert_eq!(bias.len(), channels);

    out.par_chunks_mut(channels)
        .zip(mean.par_iter_mut())
        .zip(rstd.par_iter_mut())
        .enumerate()
        .for_each(|(bt, ((out_bt, mean_bt), rstd_bt))| {
            let x = &inp[bt * channels..(bt + 1) * channels];

            let mut m = 0.0f32;
            for &xi in x {
                m += xi;
            }
            m /= channels as f32;

            let mut v = 0.0f32;
            for &xi in x {
                let xshift = xi - m;
                v += xshift * xshift;
            }
            v /= channels as f32;

            let s = 1.0 / (v + LAYERNORM_EPS).sqrt();
            for i in 0..channels {
                let n = s * (x[i] - m);
                out_bt[i] = n * weight[i] + bias[i];
            }

            // Cache the statistics for the backward pass
            *mean_bt = m;
            *rstd_bt = s;
        });
}

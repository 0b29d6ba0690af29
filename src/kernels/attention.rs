//! Causal Self-Attention
//!
//! The only kernel that mixes information across the time axis; every
//! other operation treats each (b, t) position independently (and nothing
//! mixes across the batch).
//!
//! The input is a fused (B, T, 3C) buffer: at each position the first C
//! entries hold the query sub-vectors for all heads, the next C the keys,
//! and the last C the values (head h occupies `h*hs..(h+1)*hs` of each
//! section, hs = C/NH). For each (b, t, h):
//!
//! 1. Score the query at `t` against the keys at every `t2 <= t`, scaled
//!    by 1/sqrt(hs). Positions after `t` are never scored (causality).
//! 2. Softmax the scored prefix, subtracting the running max before
//!    exponentiating. Weights at `t2 > t` are written as explicit zeros
//!    so downstream consumers can scan the full (T) row.
//! 3. Accumulate the weighted sum of the values at `t2 <= t` into the
//!    (t, h) output slice.
//!
//! Both the pre-softmax scores (`preatt`) and the post-softmax weights
//! (`att`) are retained in full (B, NH, T, T) for the backward pass.
//!
//! The running max starts at the fixed literal -10000.0 rather than the
//! exact row minimum; the reference implementation does the same, and the
//! end-to-end loss scenario is validated against this choice.

use rayon::prelude::*;

/// Causal multi-head attention forward pass
///
/// `out` is (B, T, C); `preatt` and `att` are (B, NH, T, T); `inp` is the
/// fused (B, T, 3C) QKV buffer. `channels` must be divisible by
/// `num_heads`.
pub fn attention_forward(
    out: &mut [f32],
    preatt: &mut [f32],
    att: &mut [f32],
    inp: &[f32],
    batch_size: usize,
    seq_len: usize,
    channels: usize,
    num_heads: usize,
) {
    assert!(channels % num_heads == 0, "channels must divide into heads");
    let c3 = channels * 3;
    let hs = channels / num_heads;
    let scale = 1.0 / (hs as f32).sqrt();
    let tt = seq_len * seq_len;

    assert_eq!(inp.len(), batch_size * seq_len * c3);
    assert_eq!(out.len(), batch_size * seq_len * channels);
    assert_eq!(preatt.len(), batch_size * num_heads * tt);
    assert_eq!(att.len(), batch_size * num_heads * tt);

    // Scores and softmax, one (b, h) score matrix per worker
    preatt
        .par_chunks_mut(tt)
        .zip(att.par_chunks_mut(tt))
        .enumerate()
        .for_each(|(bh, (preatt_bh, att_bh))| {
            let b = bh / num_heads;
            let h = bh % num_heads;
            for t in 0..seq_len {
                let query = &inp[b * seq_len * c3 + t * c3 + h * hs..][..hs];
                let preatt_t = &mut preatt_bh[t * seq_len..(t + 1) * seq_len];
                let att_t = &mut att_bh[t * seq_len..(t + 1) * seq_len];

                // query dot key over the causal prefix, tracking the max
                let mut maxval = -10000.0f32;
                for t2 in 0..=t {
                    let key = &inp[b * seq_len * c3 + t2 * c3 + h * hs + channels..][..hs];
                    let mut val = 0.0f32;
                    for i in 0..hs {
                        val += query[i] * key[i];
                    }
                    val *= scale;
                    if val > maxval {
                        maxval = val;
                    }
                    preatt_t[t2] = val;
                }

                // exponentiate and accumulate the normalizer
                let mut expsum = 0.0f32;
                for t2 in 0..=t {
                    let expv = (preatt_t[t2] - maxval).exp();
                    expsum += expv;
                    att_t[t2] = expv;
                }
                let expsum_inv = if expsum == 0.0 { 0.0 } else { 1.0 / expsum };

                // normalize the prefix; the masked tail is explicit zero
                for t2 in 0..seq_len {
                    if t2 <= t {
                        att_t[t2] *= expsum_inv;
                    } else {
                        att_t[t2] = 0.0;
                    }
                }
            }
        });

    // Weighted value accumulation, one (b, t) output vector per worker
    let att = &*att;
    out.par_chunks_mut(channels)
        .enumerate()
        .for_each(|(bt, out_bt)| {
            let b = bt / seq_len;
            let t = bt % seq_len;
            out_bt.fill(0.0);
            for h in 0..num_heads {
                let att_t = &att[b * num_heads * tt + h * tt + t * seq_len..][..seq_len];
                let out_h = &mut out_bt[h * hs..(h + 1) * hs];
                for t2 in 0..=t {
                    let value = &inp[b * seq_len * c3 + t2 * c3 + h * hs + 2 * channels..][..hs];
                    let a = att_t[t2];
                    for i in 0..hs {
                        out_h[i] += a * value[i];
                    }
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_qkv(rng: &mut StdRng, batch_size: usize, seq_len: usize, channels: usize) -> Vec<f32> {
        (0..batch_size * seq_len * 3 * channels)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect()
    }

    fn run(
        inp: &[f32],
        batch_size: usize,
        seq_len: usize,
        channels: usize,
        num_heads: usize,
    ) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let tt = seq_len * seq_len;
        let mut out = vec![0.0; batch_size * seq_len * channels];
        let mut preatt = vec![0.0; batch_size * num_heads * tt];
        let mut att = vec![0.0; batch_size * num_heads * tt];
        attention_forward(
            &mut out,
            &mut preatt,
            &mut att,
            inp,
            batch_size,
            seq_len,
            channels,
            num_heads,
        );
        (out, preatt, att)
    }

    #[test]
    fn test_attention_weights_rows_sum_to_one() {
        let (b, t, c, nh) = (2, 4, 8, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let inp = random_qkv(&mut rng, b, t, c);
        let (_, _, att) = run(&inp, b, t, c, nh);

        for bh in 0..b * nh {
            for ti in 0..t {
                let row = &att[bh * t * t + ti * t..bh * t * t + (ti + 1) * t];
                let sum: f32 = row[..=ti].iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "row sum was {}", sum);
                // Future positions carry explicit zeros
                assert!(row[ti + 1..].iter().all(|&w| w == 0.0));
            }
        }
    }

    #[test]
    fn test_causality_future_positions_do_not_matter() {
        let (b, t, c, nh) = (1, 5, 8, 2);
        let mut rng = StdRng::seed_from_u64(99);
        let inp = random_qkv(&mut rng, b, t, c);
        let (out_before, _, _) = run(&inp, b, t, c, nh);

        // Arbitrarily corrupt the fused QKV content at positions >= 3
        let mut corrupted = inp.clone();
        for pos in 3..t {
            for i in 0..3 * c {
                corrupted[pos * 3 * c + i] = rng.random_range(-100.0..100.0);
            }
        }
        let (out_after, _, _) = run(&corrupted, b, t, c, nh);

        // Outputs at positions 0..3 are bit-identical
        assert_eq!(&out_before[..3 * c], &out_after[..3 * c]);
        // And the corrupted tail really did change something
        assert_ne!(&out_before[3 * c..], &out_after[3 * c..]);
    }

    #[test]
    fn test_first_position_copies_its_value() {
        // At t = 0 the softmax over a single score is 1.0, so the output
        // is exactly the value vector at position 0
        let (b, t, c, nh) = (1, 3, 4, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let inp = random_qkv(&mut rng, b, t, c);
        let (out, _, att) = run(&inp, b, t, c, nh);

        for h in 0..nh {
            assert!((att[h * t * t] - 1.0).abs() < 1e-6);
        }
        let hs = c / nh;
        for h in 0..nh {
            for i in 0..hs {
                let value = inp[h * hs + i + 2 * c];
                assert!((out[h * hs + i] - value).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_uniform_weights_for_zero_queries() {
        // Zero Q and K make every prefix score equal, so the weights over
        // the prefix are uniform
        let (b, t, c, nh) = (1, 4, 4, 1);
        let mut inp = vec![0.0; b * t * 3 * c];
        // Distinct values so a uniform average is observable
        for pos in 0..t {
            for i in 0..c {
                inp[pos * 3 * c + 2 * c + i] = pos as f32;
            }
        }
        let (out, _, att) = run(&inp, b, t, c, nh);

        let last_row = &att[(t - 1) * t..t * t];
        for &w in &last_row[..t] {
            assert!((w - 0.25).abs() < 1e-6);
        }
        // Average of values 0,1,2,3 is 1.5
        assert!((out[(t - 1) * c] - 1.5).abs() < 1e-5);
    }
}

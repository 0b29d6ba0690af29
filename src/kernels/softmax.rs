//! Vocabulary Softmax
//!
//! Converts each (b, t) row of logits into a probability distribution
//! over the real vocabulary. Rows are `Vp` (padded vocabulary) wide but
//! only the first `V` entries are meaningful: the max, the exponentials,
//! and the normalizer all run over `0..V`, and the padded tail `V..Vp`
//! is forced to zero regardless of what the logits held there.
//!
//! Numerical stability comes from subtracting the row max before
//! exponentiating; the running max starts at -10000.0, matching the
//! reference implementation. A row whose exponentials all underflow to
//! zero yields a defined all-zero distribution rather than NaN.

use rayon::prelude::*;

/// Softmax forward pass over the real vocabulary of padded rows
///
/// `probs` and `logits` are (B, T, Vp); `vocab_size` (V) is the number
/// of leading entries per row that participate.
pub fn softmax_forward(
    probs: &mut [f32],
    logits: &[f32],
    batch_size: usize,
    seq_len: usize,
    vocab_size: usize,
    padded_vocab_size: usize,
) {
    assert!(vocab_size <= padded_vocab_size);
    assert_eq!(logits.len(), batch_size * seq_len * padded_vocab_size);
    assert_eq!(probs.len(), logits.len());

    probs
        .par_chunks_mut(padded_vocab_size)
        .zip(logits.par_chunks(padded_vocab_size))
        .for_each(|(probs_bt, logits_bt)| {
            let mut maxval = -10000.0f32;
            for &l in &logits_bt[..vocab_size] {
                if l > maxval {
                    maxval = l;
                }
            }
            let mut sum = 0.0f32;
            for i in 0..vocab_size {
                probs_bt[i] = (logits_bt[i] - maxval).exp();
                sum += probs_bt[i];
            }
            let sum_inv = if sum == 0.0 { 0.0 } else { 1.0 / sum };
            for p in &mut probs_bt[..vocab_size] {
                *p *= sum_inv;
            }
            // the padded tail never carries probability mass
            for p in &mut probs_bt[vocab_size..] {
                *p = 0.0;
            }
        });
}

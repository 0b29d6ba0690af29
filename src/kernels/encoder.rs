//! Embedding Lookup
//!
//! Converts token ids into the model's input activations: at each (b, t)
//! position the output vector is the sum of the token embedding row for
//! the id at that position and the position embedding row for `t`.
//!
//! Token ids must already have been validated against the vocabulary by
//! the orchestrator; this kernel indexes the embedding table directly.

use rayon::prelude::*;

/// Embedding lookup forward pass
///
/// `out` is (B, T, C); `tokens` is (B, T) of token ids; `wte` is (Vp, C)
/// token embeddings; `wpe` is (maxT, C) position embeddings.
pub fn encoder_forward(
    out: &mut [f32],
    tokens: &[usize],
    wte: &[f32],
    wpe: &[f32],
    batch_size: usize,
    seq_len: usize,
    channels: usize,
) {
    assert_eq!(tokens.len(), batch_size * seq_len);
    assert_eq!(out.len(), batch_size * seq_len * channels);
    assert_eq!(wte.len() % channels, 0, "wte must be whole (C) rows");
    assert!(
        wpe.len() >= seq_len * channels,
        "wpe covers {} positions, need {}",
        wpe.len() / channels,
        seq_len
    );

    out.par_chunks_mut(channels)
        .enumerate()
        .for_each(|(bt, out_bt)| {
            let t = bt % seq_len;
            let ix = tokens[bt];
            let wte_ix = &wte[ix * channels..(ix + 1) * channels];
            let wpe_t = &wpe[t * channels..(t + 1) * channels];
            for i in 0..channels {
                out_bt[i] = wte_ix[i] + wpe_t[i];
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_sums_token_and_position() {
        let (b, t, c) = (1, 2, 3);
        // Two tokens in the vocab, distinct rows
        let wte = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        // Position rows
        let wpe = vec![0.25, 0.5, 0.75, 0.125, 0.25, 0.375];
        let tokens = vec![1, 0];
        let mut out = vec![0.0; b * t * c];

        encoder_forward(&mut out, &tokens, &wte, &wpe, b, t, c);

        assert_eq!(&out[0..3], &[10.25, 20.5, 30.75]);
        assert_eq!(&out[3..6], &[1.125, 2.25, 3.375]);
    }

    #[test]
    #[should_panic(expected = "wpe covers")]
    fn test_short_position_table_rejected() {
        let (b, t, c) = (1, 4, 2);
        let wte = vec![0.0; 4 * c];
        // Only two position rows for a four-position sequence
        let wpe = vec![0.0; 2 * c];
        let tokens = vec![0, 1, 2, 3];
        let mut out = vec![0.0; b * t * c];
        encoder_forward(&mut out, &tokens, &wte, &wpe, b, t, c);
    }

    #[test]
    fn test_encoder_position_repeats_across_batch() {
        let (b, t, c) = (2, 2, 2);
        let wte = vec![0.0; 4 * c];
        let wpe = vec![1.0, 2.0, 3.0, 4.0];
        let tokens = vec![0, 1, 2, 3];
        let mut out = vec![0.0; b * t * c];

        encoder_forward(&mut out, &tokens, &wte, &wpe, b, t, c);

        // With zero token embeddings the output is just wpe per position,
        // identically for both batch rows
        assert_eq!(&out[0..4], &out[4..8]);
        assert_eq!(&out[0..2], &[1.0, 2.0]);
    }
}

//! Cross-Entropy Loss
//!
//! Per (b, t) position, the loss is the negative log probability the
//! model assigned to the correct next token: `-ln(probs[target])`. The
//! orchestrator averages these into the single scalar the training loop
//! minimizes.
//!
//! Target ids are validated by the orchestrator before any kernel runs.

/// Cross-entropy forward pass
///
/// `losses` is (B, T); `probs` is (B, T, Vp); `targets` is (B, T) of
/// correct token indices into the real vocabulary.
pub fn crossentropy_forward(
    losses: &mut [f32],
    probs: &[f32],
    targets: &[usize],
    batch_size: usize,
    seq_len: usize,
    padded_vocab_size: usize,
) {
    let positions = batch_size * seq_len;
    assert_eq!(losses.len(), positions);
    assert_eq!(targets.len(), positions);
    assert_eq!(probs.len(), positions * padded_vocab_size);

    for (bt, loss) in losses.iter_mut().enumerate() {
        let ix = targets[bt];
        *loss = -probs[bt * padded_vocab_size + ix].ln();
    }
}

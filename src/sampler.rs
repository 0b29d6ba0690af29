//! Token Sampling
//!
//! Draws the next token from a probability distribution produced by the
//! forward pass. The random source is xorshift*, a tiny deterministic
//! generator whose exact bit sequence is easy to reproduce across
//! implementations, which makes generation runs comparable by seed.

/// Deterministic xorshift* random source
pub struct Sampler {
    state: u64,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        ((self.state.wrapping_mul(0x2545F4914F6CDD1D)) >> 32) as u32
    }

    /// Uniform float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16777216.0
    }

    /// Sample an index from `probs`, which should sum to 1
    pub fn sample(&mut self, probs: &[f32]) -> usize {
        let coin = self.next_f32();
        sample_mult(probs, coin)
    }
}

/// Walk the CDF of `probs` until it passes `coin`
///
/// Rounding can leave the cumulative sum just under 1.0, so a coin in
/// that sliver falls through to the last index.
pub fn sample_mult(probs: &[f32], coin: f32) -> usize {
    let mut cdf = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cdf += p;
        if coin < cdf {
            return i;
        }
    }
    probs.len() - 1
}

//! Model Configuration
//!
//! Defines the architecture hyperparameters for a GPT-2 style model. The
//! configuration is immutable after load: every tensor size and arena
//! offset in the crate is a closed-form function of these six numbers, so
//! mutating them under a live model would invalidate every view handed
//! out by the layout module.
//!
//! # Padded Vocabulary
//!
//! The vocabulary is stored padded to a multiple of 128 rows
//! (`padded_vocab_size`). The final projection and the probability rows
//! are `padded_vocab_size` wide so the dominant matmul runs over a nicely
//! aligned output dimension; only the first `vocab_size` entries are ever
//! meaningful, and softmax forces the padded tail to zero.

use serde::{Deserialize, Serialize};

/// Hyperparameters of a GPT-2 style model
///
/// # Fields
///
/// - `max_seq_len`: Maximum sequence length (context window), e.g. 1024
/// - `vocab_size`: Number of real tokens in the vocabulary, e.g. 50257
/// - `padded_vocab_size`: Vocabulary rounded up for throughput, e.g. 50304
/// - `num_layers`: Number of transformer blocks
/// - `num_heads`: Number of attention heads per layer
/// - `channels`: Embedding dimension (width of the model)
///
/// # Invariants
///
/// - `channels % num_heads == 0` (head size is `channels / num_heads`)
/// - `padded_vocab_size >= vocab_size`
///
/// Both are checked by [`Config::assert_valid`], which the layout and
/// model constructors call before sizing any arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub max_seq_len: usize,
    pub vocab_size: usize,
    pub padded_vocab_size: usize,
    pub num_layers: usize,
    pub num_heads: usize,
    pub channels: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::gpt2_small()
    }
}

impl Config {
    /// Create a tiny config for quick experiments and tests
    ///
    /// Single layer, two heads, eight channels. The vocabulary is left
    /// unpadded so tiny models stay hand-computable.
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            max_seq_len: 64,
            vocab_size,
            padded_vocab_size: vocab_size,
            num_layers: 1,
            num_heads: 2,
            channels: 8,
        }
    }

    /// Create a small config for experiments
    pub fn small(vocab_size: usize) -> Self {
        Self {
            max_seq_len: 128,
            vocab_size,
            padded_vocab_size: padded_vocab(vocab_size),
            num_layers: 3,
            num_heads: 4,
            channels: 128,
        }
    }

    /// GPT-2 Small: 12 layers, 12 heads, 768 channels, 1024 context
    ///
    /// Matches the checkpoint layout of the original 124M-parameter model
    /// (50257 real tokens padded to 50304).
    pub fn gpt2_small() -> Self {
        Self {
            max_seq_len: 1024,
            vocab_size: 50257,
            padded_vocab_size: 50304,
            num_layers: 12,
            num_heads: 12,
            channels: 768,
        }
    }

    /// Dimension of a single attention head
    pub fn head_size(&self) -> usize {
        self.channels / self.num_heads
    }

    /// Check the structural invariants, panicking on violation
    ///
    /// Configuration errors are caller contract violations; there is no
    /// recovery path, so they abort immediately.
    pub fn assert_valid(&self) {
        assert!(
            self.channels % self.num_heads == 0,
            "channels ({}) must be divisible by num_heads ({})",
            self.channels,
            self.num_heads
        );
        assert!(
            self.padded_vocab_size >= self.vocab_size,
            "padded_vocab_size ({}) must be >= vocab_size ({})",
            self.padded_vocab_size,
            self.vocab_size
        );
        assert!(self.num_layers > 0, "model must have at least one layer");
        assert!(self.max_seq_len > 0, "max_seq_len must be positive");
    }
}

/// Round a vocabulary size up to the next multiple of 128
///
/// 128 is the alignment the reference checkpoints use; it keeps the
/// output dimension of the tied final projection friendly to wide loads.
pub fn padded_vocab(vocab_size: usize) -> usize {
    vocab_size.div_ceil(128) * 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_vocab_rounds_up() {
        assert_eq!(padded_vocab(50257), 50304);
        assert_eq!(padded_vocab(128), 128);
        assert_eq!(padded_vocab(129), 256);
        assert_eq!(padded_vocab(1), 128);
    }

    #[test]
    fn test_head_size() {
        let config = Config::gpt2_small();
        assert_eq!(config.head_size(), 64);
    }

    #[test]
    fn test_presets_are_valid() {
        Config::tiny(10).assert_valid();
        Config::small(512).assert_valid();
        Config::gpt2_small().assert_valid();
    }

    #[test]
    #[should_panic(expected = "divisible by num_heads")]
    fn test_indivisible_heads_rejected() {
        let mut config = Config::tiny(10);
        config.num_heads = 3;
        config.assert_valid();
    }

    #[test]
    #[should_panic(expected = "padded_vocab_size")]
    fn test_underpadded_vocab_rejected() {
        let mut config = Config::tiny(10);
        config.padded_vocab_size = 9;
        config.assert_valid();
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::gpt2_small();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

//! Touchstone: GPT-2 Forward Pass Over Flat Buffers
//!
//! A CPU reference implementation of the forward-pass numerical core of a
//! decoder-only (GPT-2 style) transformer, built from scratch: embedding
//! lookup, layer normalization, dense projections, causal self-attention,
//! GELU, residual connections, softmax, and cross-entropy loss.
//!
//! Everything operates over flat `f32` buffers with manually computed
//! strides. All parameters live in one contiguous arena and all
//! intermediate activations in another, each logical tensor assigned a
//! deterministic offset by the [`layout`] module. This mirrors how the
//! arenas are consumed downstream: a reverse-mode differentiation tool
//! fills a gradient arena with the exact same layout, and the optimizer
//! walks all four arenas (parameters, gradients, first/second moments) by
//! a single shared flat index.
//!
//! # Modules
//!
//! - [`config`] - Model hyperparameters
//! - [`layout`] - Tensor element counts, offsets, and arena views
//! - [`kernels`] - The forward-pass compute kernels
//! - [`model`] - The orchestrator composing kernels into the full network
//! - [`checkpoint`] - Flat-buffer model serialization
//! - [`grads`] - Gradient arena mirroring the parameter layout
//! - [`optimizer`] - AdamW over flat arenas
//! - [`sampler`] - Multinomial sampling from the output distribution
//!
//! # Example
//!
//! ```rust
//! use touchstone::{Config, Gpt2};
//!
//! // A tiny randomly initialized model
//! let config = Config::tiny(16);
//! let mut model = Gpt2::random(&config, 42);
//!
//! // One forward pass with targets yields the mean cross-entropy loss
//! let inputs = vec![1, 2, 3, 4];
//! let targets = vec![2, 3, 4, 5];
//! let loss = model.forward(&inputs, Some(&targets), 1, 4);
//! assert!(loss > 0.0);
//! ```

pub mod checkpoint;
pub mod config;
pub mod grads;
pub mod kernels;
pub mod layout;
pub mod model;
pub mod optimizer;
pub mod sampler;

// Re-export main types for convenience
pub use config::Config;
pub use grads::GradientArena;
pub use layout::{ActivationLayout, ParameterLayout};
pub use model::{Gpt2, NO_LOSS};
pub use optimizer::AdamW;

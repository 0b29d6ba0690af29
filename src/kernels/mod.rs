//! Forward-Pass Compute Kernels
//!
//! This module contains the numerical kernels the model orchestrator
//! composes into the full network. Each kernel is a free function over
//! flat `f32` slices with explicit (B, T, C, ...) extents; none of them
//! allocates, and every output buffer is a view into the activation arena
//! handed in by the caller.
//!
//! ## Kernels
//!
//! - **encoder**: token + position embedding lookup
//! - **layer_norm**: per-position normalization with cached statistics
//! - **matmul**: the dominant-cost dense projection (tiled + naive paths)
//! - **attention**: causal self-attention over a fused QKV buffer
//! - **activation**: GELU nonlinearity
//! - **residual**: elementwise sum of the two residual streams
//! - **softmax**: row softmax over the real vocabulary of a padded row
//! - **cross_entropy**: per-position negative log likelihood
//!
//! ## Parallelism
//!
//! Kernels fan out over independent (batch, time, [head]) iteration
//! points with Rayon. Each worker writes to a disjoint chunk of the
//! output obtained via `par_chunks_mut`, so there is no synchronization
//! anywhere: ordering alone satisfies the two real data dependencies (the
//! time axis inside attention and the layer axis in the orchestrator).

pub mod activation;
pub mod attention;
pub mod cross_entropy;
pub mod encoder;
pub mod layer_norm;
pub mod matmul;
pub mod residual;
pub mod softmax;

// Re-export the forward functions for convenience
pub use activation::gelu_forward;
pub use attention::attention_forward;
pub use cross_entropy::crossentropy_forward;
pub use encoder::encoder_forward;
pub use layer_norm::layernorm_forward;
pub use matmul::{matmul_forward, matmul_forward_naive};
pub use residual::residual_forward;
pub use softmax::softmax_forward;
